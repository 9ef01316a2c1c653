use shared_types::origin_of;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginVerdict {
    Allowed,
    /// Not in the allowed set, let through because development mode is on.
    AllowedInDevMode,
    Rejected,
}

impl OriginVerdict {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, OriginVerdict::Rejected)
    }
}

/// The set of origins allowed to post into one frame session: the host page,
/// every known template deployment and the event's own external template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginPolicy {
    allowed: HashSet<String>,
    dev_mode: bool,
}

impl OriginPolicy {
    pub fn new<'a>(
        page_origin: &'a str,
        template_origins: impl IntoIterator<Item = &'a String>,
        event_template_origin: Option<&'a str>,
        dev_mode: bool,
    ) -> Self {
        let allowed = std::iter::once(page_origin)
            .chain(template_origins.into_iter().map(String::as_str))
            .chain(event_template_origin)
            .filter_map(normalize)
            .collect();

        Self { allowed, dev_mode }
    }

    pub fn check(&self, origin: &str) -> OriginVerdict {
        let allowed = normalize(origin).is_some_and(|o| self.allowed.contains(&o));
        match (allowed, self.dev_mode) {
            (true, _) => OriginVerdict::Allowed,
            (false, true) => {
                tracing::warn!("Development mode: allowing message from unlisted origin {}", origin);
                OriginVerdict::AllowedInDevMode
            }
            (false, false) => OriginVerdict::Rejected,
        }
    }

    pub fn allowed_origins(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(String::as_str)
    }
}

/// Sandboxed frames report "null", which never parses to a tuple origin.
fn normalize(origin: &str) -> Option<String> {
    origin_of(origin)
}
