use crate::database::AsyncDbConnection;
use anyhow::Result;
use rusqlite::params;
use shared_types::{RsvpFieldDef, RsvpFieldType};

pub async fn insert_field(
    conn: AsyncDbConnection,
    event_id: i64,
    field_name: &str,
    field_label: &str,
    field_type: RsvpFieldType,
    is_required: bool,
    field_options: &[&str],
    display_order: i64,
) -> Result<i64> {
    let conn = conn.lock().await?;
    let options_json = serde_json::to_string(field_options)?;

    let id: i64 = conn.query_row(
        "INSERT INTO rsvp_fields
         (event_id, field_name, field_label, field_type, is_required, field_options, display_order)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         RETURNING id",
        params![
            event_id,
            field_name,
            field_label,
            field_type.as_str(),
            is_required,
            options_json,
            display_order
        ],
        |row| row.get(0),
    )?;

    Ok(id)
}

/// Field definitions for an event, in display order. Rows with an unknown
/// field type are skipped.
pub async fn list_fields(conn: AsyncDbConnection, event_id: i64) -> Result<Vec<RsvpFieldDef>> {
    let conn = conn.lock().await?;

    let mut stmt = conn.prepare(
        "SELECT id, field_name, field_label, field_type, is_required, field_options,
                placeholder_text, display_order
         FROM rsvp_fields
         WHERE event_id = ?
         ORDER BY display_order, id",
    )?;

    let rows = stmt
        .query_map([event_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, bool>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, i64>(7)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut fields = Vec::with_capacity(rows.len());
    for (id, field_name, field_label, field_type, is_required, options, placeholder_text, display_order) in rows {
        let Some(field_type) = RsvpFieldType::parse(&field_type) else {
            tracing::warn!("Skipping RSVP field {} with unknown type '{}'", id, field_type);
            continue;
        };
        fields.push(RsvpFieldDef {
            id,
            field_name,
            field_label,
            field_type,
            is_required,
            field_options: serde_json::from_str(&options).unwrap_or_default(),
            placeholder_text,
            display_order,
        });
    }

    Ok(fields)
}
