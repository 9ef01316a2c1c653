use rusqlite::Connection;

/// Run all database migrations
pub fn run_migrations(conn: &Connection) -> anyhow::Result<()> {
    // Create events table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            custom_id VARCHAR UNIQUE,
            name VARCHAR NOT NULL,
            details VARCHAR NOT NULL DEFAULT '{}',
            rsvp_config VARCHAR,
            template_contract VARCHAR NOT NULL DEFAULT 'extended-params',
            template_url VARCHAR,
            template_is_external BOOLEAN NOT NULL DEFAULT 0,
            created_at BIGINT NOT NULL,
            updated_at BIGINT NOT NULL
        )",
        [],
    )?;

    // Create guests table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS guests (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id INTEGER NOT NULL,
            custom_id VARCHAR,
            name VARCHAR NOT NULL,
            viewed BOOLEAN NOT NULL DEFAULT 0,
            viewed_at BIGINT,
            accepted BOOLEAN NOT NULL DEFAULT 0,
            accepted_at BIGINT,
            rsvp_data VARCHAR,
            created_at BIGINT NOT NULL,
            updated_at BIGINT NOT NULL,
            UNIQUE (event_id, custom_id),
            FOREIGN KEY (event_id) REFERENCES events (id) ON DELETE CASCADE
        )",
        [],
    )?;

    // Create rsvp_fields table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS rsvp_fields (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id INTEGER NOT NULL,
            field_name VARCHAR NOT NULL,
            field_label VARCHAR NOT NULL,
            field_type VARCHAR NOT NULL,
            is_required BOOLEAN NOT NULL DEFAULT 0,
            field_options VARCHAR NOT NULL DEFAULT '[]',
            placeholder_text VARCHAR,
            display_order INTEGER NOT NULL DEFAULT 0,
            UNIQUE (event_id, field_name),
            FOREIGN KEY (event_id) REFERENCES events (id) ON DELETE CASCADE
        )",
        [],
    )?;

    // Create guest_event_access table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS guest_event_access (
            guest_id INTEGER NOT NULL,
            event_id INTEGER NOT NULL,
            event_detail_index VARCHAR NOT NULL,
            can_access BOOLEAN NOT NULL DEFAULT 1,
            updated_at BIGINT NOT NULL,
            PRIMARY KEY (guest_id, event_id, event_detail_index),
            FOREIGN KEY (guest_id) REFERENCES guests (id) ON DELETE CASCADE,
            FOREIGN KEY (event_id) REFERENCES events (id) ON DELETE CASCADE
        )",
        [],
    )?;

    // Create wishes table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS wishes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id INTEGER NOT NULL,
            guest_id INTEGER,
            guest_name VARCHAR NOT NULL,
            content VARCHAR NOT NULL,
            image_url VARCHAR,
            likes_count INTEGER NOT NULL DEFAULT 0,
            is_approved BOOLEAN NOT NULL DEFAULT 0,
            created_at BIGINT NOT NULL,
            FOREIGN KEY (event_id) REFERENCES events (id) ON DELETE CASCADE
        )",
        [],
    )?;

    // Create wish_likes table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS wish_likes (
            wish_id INTEGER NOT NULL,
            liker_key VARCHAR NOT NULL,
            created_at BIGINT NOT NULL,
            PRIMARY KEY (wish_id, liker_key),
            FOREIGN KEY (wish_id) REFERENCES wishes (id) ON DELETE CASCADE
        )",
        [],
    )?;

    // Create wish_replies table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS wish_replies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            wish_id INTEGER NOT NULL,
            guest_id INTEGER,
            author_name VARCHAR NOT NULL,
            content VARCHAR NOT NULL,
            created_at BIGINT NOT NULL,
            FOREIGN KEY (wish_id) REFERENCES wishes (id) ON DELETE CASCADE
        )",
        [],
    )?;

    // Create indexes for performance
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_guests_event
            ON guests(event_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_rsvp_fields_event_order
            ON rsvp_fields(event_id, display_order)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_wishes_event_created
            ON wishes(event_id, created_at)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_wish_replies_wish
            ON wish_replies(wish_id)",
        [],
    )?;

    Ok(())
}
