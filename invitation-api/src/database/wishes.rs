use crate::database::AsyncDbConnection;
use anyhow::Result;
use rusqlite::{params, OptionalExtension};
use shared_types::{NewWish, NewWishReply, Wish, WishReply};
use std::collections::HashMap;

/// Wishes of an event, newest first, with their replies attached.
pub async fn list_wishes(
    conn: AsyncDbConnection,
    event_id: i64,
    approved_only: bool,
) -> Result<Vec<Wish>> {
    let conn = conn.lock().await?;

    let mut stmt = conn.prepare(
        "SELECT id, event_id, guest_id, guest_name, content, image_url, likes_count,
                is_approved, created_at
         FROM wishes
         WHERE event_id = ?1 AND (?2 = 0 OR is_approved = 1)
         ORDER BY created_at DESC, id DESC",
    )?;

    let mut wishes = stmt
        .query_map(params![event_id, approved_only], |row| {
            Ok(Wish {
                id: row.get(0)?,
                event_id: row.get(1)?,
                guest_id: row.get(2)?,
                guest_name: row.get(3)?,
                content: row.get(4)?,
                image_url: row.get(5)?,
                likes_count: row.get(6)?,
                is_approved: row.get(7)?,
                created_at: row.get(8)?,
                replies: Vec::new(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT r.id, r.wish_id, r.guest_id, r.author_name, r.content, r.created_at
         FROM wish_replies r
         JOIN wishes w ON w.id = r.wish_id
         WHERE w.event_id = ?
         ORDER BY r.created_at, r.id",
    )?;

    let mut replies: HashMap<i64, Vec<WishReply>> = HashMap::new();
    let rows = stmt.query_map([event_id], |row| {
        Ok(WishReply {
            id: row.get(0)?,
            wish_id: row.get(1)?,
            guest_id: row.get(2)?,
            author_name: row.get(3)?,
            content: row.get(4)?,
            created_at: row.get(5)?,
        })
    })?;
    for reply in rows {
        let reply = reply?;
        replies.entry(reply.wish_id).or_default().push(reply);
    }

    for wish in &mut wishes {
        if let Some(list) = replies.remove(&wish.id) {
            wish.replies = list;
        }
    }

    Ok(wishes)
}

pub async fn insert_wish(
    conn: AsyncDbConnection,
    event_id: i64,
    wish: &NewWish,
    is_approved: bool,
) -> Result<i64> {
    let conn = conn.lock().await?;
    let now = chrono::Utc::now().timestamp_millis();

    let id: i64 = conn.query_row(
        "INSERT INTO wishes (event_id, guest_id, guest_name, content, image_url, is_approved, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         RETURNING id",
        params![
            event_id,
            wish.guest_id,
            wish.guest_name,
            wish.content,
            wish.image_url,
            is_approved,
            now
        ],
        |row| row.get(0),
    )?;

    Ok(id)
}

/// Returns false when the wish does not belong to the event.
pub async fn approve_wish(conn: AsyncDbConnection, event_id: i64, wish_id: i64) -> Result<bool> {
    let conn = conn.lock().await?;

    let updated = conn.execute(
        "UPDATE wishes SET is_approved = 1 WHERE id = ? AND event_id = ?",
        params![wish_id, event_id],
    )?;

    Ok(updated > 0)
}

pub async fn delete_wish(conn: AsyncDbConnection, event_id: i64, wish_id: i64) -> Result<bool> {
    let mut conn = conn.lock().await?;

    let tx = conn.transaction()?;
    tx.execute("DELETE FROM wish_likes WHERE wish_id = ?", [wish_id])?;
    tx.execute("DELETE FROM wish_replies WHERE wish_id = ?", [wish_id])?;
    let deleted = tx.execute(
        "DELETE FROM wishes WHERE id = ? AND event_id = ?",
        params![wish_id, event_id],
    )?;
    if deleted == 0 {
        tx.rollback()?;
        return Ok(false);
    }
    tx.commit()?;

    Ok(true)
}

/// Like or unlike a wish on behalf of `liker_key`. Returns the new like
/// count, or None when the wish is not an approved wish of the event.
pub async fn toggle_like(
    conn: AsyncDbConnection,
    event_id: i64,
    wish_id: i64,
    liker_key: &str,
) -> Result<Option<i64>> {
    let mut conn = conn.lock().await?;
    let now = chrono::Utc::now().timestamp_millis();

    let tx = conn.transaction()?;
    let exists: Option<i64> = tx
        .query_row(
            "SELECT id FROM wishes WHERE id = ? AND event_id = ? AND is_approved = 1",
            params![wish_id, event_id],
            |row| row.get(0),
        )
        .optional()?;
    if exists.is_none() {
        return Ok(None);
    }

    let removed = tx.execute(
        "DELETE FROM wish_likes WHERE wish_id = ? AND liker_key = ?",
        params![wish_id, liker_key],
    )?;
    if removed == 0 {
        tx.execute(
            "INSERT INTO wish_likes (wish_id, liker_key, created_at) VALUES (?, ?, ?)",
            params![wish_id, liker_key, now],
        )?;
    }

    let count: i64 = tx.query_row(
        "UPDATE wishes
         SET likes_count = (SELECT COUNT(*) FROM wish_likes WHERE wish_id = ?1)
         WHERE id = ?1
         RETURNING likes_count",
        [wish_id],
        |row| row.get(0),
    )?;
    tx.commit()?;

    Ok(Some(count))
}

/// Returns None when the parent wish is not an approved wish of the event.
pub async fn insert_reply(
    conn: AsyncDbConnection,
    event_id: i64,
    reply: &NewWishReply,
) -> Result<Option<i64>> {
    let conn = conn.lock().await?;
    let now = chrono::Utc::now().timestamp_millis();

    let id: Option<i64> = conn
        .query_row(
            "INSERT INTO wish_replies (wish_id, guest_id, author_name, content, created_at)
             SELECT id, ?, ?, ?, ? FROM wishes WHERE id = ? AND event_id = ? AND is_approved = 1
             RETURNING id",
            params![
                reply.guest_id,
                reply.author_name,
                reply.content,
                now,
                reply.wish_id,
                event_id
            ],
            |row| row.get(0),
        )
        .optional()?;

    Ok(id)
}
