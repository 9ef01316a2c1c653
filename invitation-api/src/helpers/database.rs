use std::path::PathBuf;

/// Returns the path to the invitations database
///
/// # Platform-specific paths
///
/// - **macOS**: `~/Library/Application Support/invitations/invitations.db`
/// - **Linux**: `~/.local/share/invitations/invitations.db`
/// - **Windows**: `%LOCALAPPDATA%\invitations\invitations.db`
pub fn get_db_path() -> anyhow::Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine local data directory"))?;

    Ok(data_dir.join("invitations").join("invitations.db"))
}

/// Open (and migrate) the database at the default location
pub fn initialize_database() -> anyhow::Result<std::sync::Arc<crate::database::Database>> {
    let db_path = get_db_path()?;
    let db = crate::database::Database::new(&db_path)?;
    Ok(std::sync::Arc::new(db))
}
