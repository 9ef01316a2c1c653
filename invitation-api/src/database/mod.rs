pub mod events;
pub mod guest_event_access;
pub mod guests;
pub mod migrations;
pub mod rsvp_fields;
pub mod store;
pub mod wishes;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub use store::InvitationStore;

#[derive(Clone)]
pub struct AsyncDbConnection {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl AsyncDbConnection {
    pub fn new(pool: Pool<SqliteConnectionManager>) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn lock(&self) -> anyhow::Result<PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| anyhow::anyhow!("Failed to get DB connection from pool: {}", e))
    }

    pub fn is_healthy(&self) -> bool {
        self.pool.get().is_ok()
    }
}

pub struct Database {
    pub async_connection: AsyncDbConnection,
}

impl Database {
    /// Create a new database connection pool and run migrations
    pub fn new(db_path: &PathBuf) -> anyhow::Result<Self> {
        // Ensure directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Run migrations on a dedicated connection before the pool opens
        {
            let conn = Connection::open(db_path)?;
            migrations::run_migrations(&conn)?;
        }

        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.busy_timeout(Duration::from_secs(5))?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });

        let pool = Pool::builder().max_size(8).build(manager)?;

        Ok(Database {
            async_connection: AsyncDbConnection::new(pool),
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use serde_json::json;
    use shared_types::{RsvpConfig, RsvpFieldType, RsvpType, TemplateContract};

    /// A migrated database in a temp dir; keep the guard alive for the test.
    pub fn temp_database() -> (tempfile::TempDir, AsyncDbConnection) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(&dir.path().join("test.db")).unwrap();
        (dir, db.async_connection)
    }

    pub struct Seeded {
        pub event_id: i64,
        pub guest_id: i64,
    }

    /// Event `E1` (detailed RSVP, two custom fields, edits allowed, three
    /// sub-events) with pending guest `G1`.
    pub async fn seed_wedding(conn: &AsyncDbConnection) -> Seeded {
        let config = RsvpConfig {
            rsvp_type: RsvpType::Detailed,
            has_custom_fields: true,
            allow_edit_after_submit: true,
            ..RsvpConfig::default()
        };
        let details = json!({
            "brideName": "Ana",
            "groomName": "Ben",
            "weddingDate": "2026-06-20",
            "venueName": "Old Mill",
            "events": [
                {"title": "Ceremony", "time": "14:00"},
                {"title": "Reception", "time": "18:00"},
                {"title": "Brunch", "time": "10:00"}
            ],
            "photos": ["https://cdn.example/p1.jpg", "https://cdn.example/p2.jpg"]
        });

        let event_id = events::insert_event(
            conn.clone(),
            events::NewEvent {
                custom_id: Some("E1".to_string()),
                name: "Ana & Ben".to_string(),
                details: details.as_object().cloned().unwrap_or_default(),
                rsvp_config: config,
                template_contract: TemplateContract::ExtendedParams,
                template_url: None,
                template_is_external: false,
            },
        )
        .await
        .unwrap();

        rsvp_fields::insert_field(conn.clone(), event_id, "meal", "Meal", RsvpFieldType::Radio, true, &["fish", "veg"], 1)
            .await
            .unwrap();
        rsvp_fields::insert_field(conn.clone(), event_id, "song", "Song request", RsvpFieldType::Text, false, &[], 2)
            .await
            .unwrap();

        let guest_id = guests::insert_guest(conn.clone(), event_id, "Guest One", Some("G1"))
            .await
            .unwrap();

        Seeded { event_id, guest_id }
    }
}
