pub mod database;
pub mod frame_sessions;
pub mod public_id;
