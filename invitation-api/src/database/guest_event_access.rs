use crate::database::AsyncDbConnection;
use anyhow::Result;
use rusqlite::params;
use shared_types::GuestEventAccess;

pub async fn list_for_guest(
    conn: AsyncDbConnection,
    guest_id: i64,
    event_id: i64,
) -> Result<Vec<GuestEventAccess>> {
    let conn = conn.lock().await?;

    let mut stmt = conn.prepare(
        "SELECT guest_id, event_id, event_detail_index, can_access
         FROM guest_event_access
         WHERE guest_id = ? AND event_id = ?",
    )?;

    let rows = stmt
        .query_map(params![guest_id, event_id], |row| {
            Ok(GuestEventAccess {
                guest_id: row.get(0)?,
                event_id: row.get(1)?,
                event_detail_index: row.get(2)?,
                can_access: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Upsert one row per (guest, index) pair in a single transaction.
pub async fn upsert_access(
    conn: AsyncDbConnection,
    event_id: i64,
    guest_ids: &[i64],
    event_detail_indices: &[String],
    can_access: bool,
) -> Result<usize> {
    let mut conn = conn.lock().await?;
    let now = chrono::Utc::now().timestamp();

    let tx = conn.transaction()?;
    let mut written = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO guest_event_access (guest_id, event_id, event_detail_index, can_access, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(guest_id, event_id, event_detail_index) DO UPDATE SET
                 can_access = excluded.can_access,
                 updated_at = excluded.updated_at",
        )?;
        for guest_id in guest_ids {
            for index in event_detail_indices {
                written += stmt.execute(params![guest_id, event_id, index, can_access, now])?;
            }
        }
    }
    tx.commit()?;

    Ok(written)
}
