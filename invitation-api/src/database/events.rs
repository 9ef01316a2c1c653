use crate::database::AsyncDbConnection;
use anyhow::Result;
use rusqlite::{params, OptionalExtension, Row};
use serde_json::{Map, Value};
use shared_types::{Event, EventDetails, RsvpConfig, TemplateContract};

const EVENT_COLUMNS: &str = "id, custom_id, name, details, rsvp_config, template_contract,
                template_url, template_is_external, created_at, updated_at";

pub struct NewEvent {
    pub custom_id: Option<String>,
    pub name: String,
    pub details: Map<String, Value>,
    pub rsvp_config: RsvpConfig,
    pub template_contract: TemplateContract,
    pub template_url: Option<String>,
    pub template_is_external: bool,
}

fn row_to_event(row: &Row) -> rusqlite::Result<Event> {
    let details: Option<String> = row.get(3)?;
    let rsvp_config: Option<String> = row.get(4)?;
    let template_contract: String = row.get(5)?;

    Ok(Event {
        id: row.get(0)?,
        custom_id: row.get(1)?,
        name: row.get(2)?,
        details: EventDetails::from_stored(details.as_deref()),
        rsvp_config: RsvpConfig::from_stored(rsvp_config.as_deref()),
        template_contract: TemplateContract::from_stored(&template_contract),
        template_url: row.get(6)?,
        template_is_external: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

pub async fn insert_event(conn: AsyncDbConnection, event: NewEvent) -> Result<i64> {
    let conn = conn.lock().await?;
    let now = chrono::Utc::now().timestamp();

    let details_json = serde_json::to_string(&event.details)?;
    let rsvp_config_json = serde_json::to_string(&event.rsvp_config)?;

    let id: i64 = conn.query_row(
        "INSERT INTO events
         (custom_id, name, details, rsvp_config, template_contract, template_url,
          template_is_external, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING id",
        params![
            event.custom_id,
            event.name,
            details_json,
            rsvp_config_json,
            event.template_contract.as_str(),
            event.template_url,
            event.template_is_external,
            now,
            now
        ],
        |row| row.get(0),
    )?;

    Ok(id)
}

pub async fn get_event(conn: AsyncDbConnection, id: i64) -> Result<Option<Event>> {
    let conn = conn.lock().await?;

    let event = conn
        .query_row(
            &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?"),
            [id],
            row_to_event,
        )
        .optional()?;

    Ok(event)
}

/// Resolve an event by its public id, falling back to the durable id.
pub async fn find_event(conn: AsyncDbConnection, reference: &str) -> Result<Option<Event>> {
    let conn = conn.lock().await?;

    let by_custom = conn
        .query_row(
            &format!("SELECT {EVENT_COLUMNS} FROM events WHERE custom_id = ?"),
            [reference],
            row_to_event,
        )
        .optional()?;
    if by_custom.is_some() {
        return Ok(by_custom);
    }

    let Ok(id) = reference.parse::<i64>() else {
        return Ok(None);
    };

    let event = conn
        .query_row(
            &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?"),
            [id],
            row_to_event,
        )
        .optional()?;

    Ok(event)
}

pub async fn update_details(
    conn: AsyncDbConnection,
    id: i64,
    details: &Map<String, Value>,
) -> Result<()> {
    let conn = conn.lock().await?;
    let now = chrono::Utc::now().timestamp();

    conn.execute(
        "UPDATE events SET details = ?, updated_at = ? WHERE id = ?",
        params![serde_json::to_string(details)?, now, id],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::{seed_wedding, temp_database};

    #[tokio::test]
    async fn test_find_event_by_public_or_durable_id() {
        let (_dir, conn) = temp_database();
        let seeded = seed_wedding(&conn).await;

        let by_custom = find_event(conn.clone(), "E1").await.unwrap().unwrap();
        assert_eq!(by_custom.id, seeded.event_id);
        assert_eq!(by_custom.details.sub_events().len(), 3);

        let by_id = find_event(conn.clone(), &seeded.event_id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_id.public_id(), "E1");

        assert!(find_event(conn.clone(), "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_rsvp_config_column_reads_as_simple() {
        let (_dir, conn) = temp_database();
        let seeded = seed_wedding(&conn).await;

        {
            let db = conn.lock().await.unwrap();
            db.execute(
                "UPDATE events SET rsvp_config = '{broken', template_contract = 'v9' WHERE id = ?",
                [seeded.event_id],
            )
            .unwrap();
        }

        let event = get_event(conn.clone(), seeded.event_id).await.unwrap().unwrap();
        assert_eq!(event.rsvp_config, RsvpConfig::default());
        assert_eq!(event.template_contract, TemplateContract::ExtendedParams);
    }
}
