use rand::{distributions::Alphanumeric, Rng};

const PUBLIC_ID_LEN: usize = 8;

/// Short, URL-safe id shown to guests in invitation links.
pub fn generate_public_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PUBLIC_ID_LEN)
        .map(char::from)
        .collect()
}
