use crate::database::AsyncDbConnection;
use crate::helpers::public_id::generate_public_id;
use anyhow::Result;
use rusqlite::{params, OptionalExtension, Row};
use shared_types::{Guest, RsvpData};

const GUEST_COLUMNS: &str = "id, custom_id, event_id, name, viewed, viewed_at, accepted,
                accepted_at, rsvp_data, created_at, updated_at";

fn row_to_guest(row: &Row) -> rusqlite::Result<Guest> {
    let rsvp_data_json: Option<String> = row.get(8)?;
    let rsvp_data = rsvp_data_json
        .as_deref()
        .and_then(|raw| serde_json::from_str::<RsvpData>(raw).ok())
        .filter(|data| !data.is_empty());

    Ok(Guest {
        id: row.get(0)?,
        custom_id: row.get(1)?,
        event_id: row.get(2)?,
        name: row.get(3)?,
        viewed: row.get(4)?,
        viewed_at: row.get(5)?,
        accepted: row.get(6)?,
        accepted_at: row.get(7)?,
        rsvp_data,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Insert a pending guest. A public id is generated when none is given.
pub async fn insert_guest(
    conn: AsyncDbConnection,
    event_id: i64,
    name: &str,
    custom_id: Option<&str>,
) -> Result<i64> {
    let conn = conn.lock().await?;
    let now = chrono::Utc::now().timestamp();
    let custom_id = custom_id
        .map(str::to_string)
        .unwrap_or_else(generate_public_id);

    let id: i64 = conn.query_row(
        "INSERT INTO guests (event_id, custom_id, name, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?)
         RETURNING id",
        params![event_id, custom_id, name, now, now],
        |row| row.get(0),
    )?;

    Ok(id)
}

pub async fn get_guest(conn: AsyncDbConnection, id: i64) -> Result<Option<Guest>> {
    let conn = conn.lock().await?;

    let guest = conn
        .query_row(
            &format!("SELECT {GUEST_COLUMNS} FROM guests WHERE id = ?"),
            [id],
            row_to_guest,
        )
        .optional()?;

    Ok(guest)
}

/// Resolve a guest of one event by public id, falling back to durable id.
pub async fn find_guest(
    conn: AsyncDbConnection,
    event_id: i64,
    reference: &str,
) -> Result<Option<Guest>> {
    let conn = conn.lock().await?;

    let by_custom = conn
        .query_row(
            &format!("SELECT {GUEST_COLUMNS} FROM guests WHERE event_id = ? AND custom_id = ?"),
            params![event_id, reference],
            row_to_guest,
        )
        .optional()?;
    if by_custom.is_some() {
        return Ok(by_custom);
    }

    let Ok(id) = reference.parse::<i64>() else {
        return Ok(None);
    };

    let guest = conn
        .query_row(
            &format!("SELECT {GUEST_COLUMNS} FROM guests WHERE event_id = ? AND id = ?"),
            params![event_id, id],
            row_to_guest,
        )
        .optional()?;

    Ok(guest)
}

pub async fn list_guest_ids(conn: AsyncDbConnection, event_id: i64) -> Result<Vec<i64>> {
    let conn = conn.lock().await?;

    let mut stmt = conn.prepare("SELECT id FROM guests WHERE event_id = ? ORDER BY id")?;
    let ids = stmt
        .query_map([event_id], |row| row.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ids)
}

/// A single monotonic change to a guest's status columns. Each write only
/// touches its own columns, so writes racing each other never undo one
/// another.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressWrite {
    Viewed,
    Accepted,
    /// First answers; only lands while no answers are stored.
    FirstAnswers(RsvpData),
    /// Replacement answers for an already submitted RSVP.
    Answers(RsvpData),
}

impl ProgressWrite {
    pub fn name(&self) -> &'static str {
        match self {
            ProgressWrite::Viewed => "viewed",
            ProgressWrite::Accepted => "accepted",
            ProgressWrite::FirstAnswers(_) => "first-answers",
            ProgressWrite::Answers(_) => "answers",
        }
    }
}

/// Apply one progress write. Returns false when the guest is missing or the
/// write's precondition no longer holds (answers without acceptance, first
/// answers over existing ones); callers re-read and decide again.
pub async fn record_progress(
    conn: AsyncDbConnection,
    guest_id: i64,
    write: &ProgressWrite,
    now: i64,
) -> Result<bool> {
    let conn = conn.lock().await?;

    let updated = match write {
        ProgressWrite::Viewed => conn.execute(
            "UPDATE guests
             SET viewed = 1, viewed_at = COALESCE(viewed_at, ?1), updated_at = ?1
             WHERE id = ?2",
            params![now, guest_id],
        )?,
        ProgressWrite::Accepted => conn.execute(
            "UPDATE guests
             SET accepted = 1, accepted_at = COALESCE(accepted_at, ?1), updated_at = ?1
             WHERE id = ?2",
            params![now, guest_id],
        )?,
        ProgressWrite::FirstAnswers(answers) => conn.execute(
            "UPDATE guests
             SET rsvp_data = ?1, updated_at = ?2
             WHERE id = ?3 AND accepted = 1
               AND (rsvp_data IS NULL OR rsvp_data = '' OR rsvp_data = '{}')",
            params![serde_json::to_string(answers)?, now, guest_id],
        )?,
        ProgressWrite::Answers(answers) => conn.execute(
            "UPDATE guests
             SET rsvp_data = ?1, updated_at = ?2
             WHERE id = ?3 AND accepted = 1",
            params![serde_json::to_string(answers)?, now, guest_id],
        )?,
    };

    Ok(updated > 0)
}
