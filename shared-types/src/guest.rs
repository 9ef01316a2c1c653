//! Guest lifecycle for one event.
//!
//! Status is never stored. It is derived from `viewed`, `accepted` and
//! `rsvp_data` by [`GuestStatus::derive`], and every caller (URL encoding,
//! outbound payloads, host UI) goes through that one function.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

use crate::event::{public_id, RsvpConfig};

/// Answers to the custom RSVP fields, keyed by `field_name`.
pub type RsvpData = Map<String, Value>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GuestStatus {
    Pending,
    Viewed,
    Accepted,
    Submitted,
}

impl GuestStatus {
    pub fn derive(viewed: bool, accepted: bool, rsvp_data: Option<&RsvpData>) -> Self {
        let has_answers = rsvp_data.is_some_and(|data| !data.is_empty());
        if accepted && has_answers {
            GuestStatus::Submitted
        } else if accepted {
            GuestStatus::Accepted
        } else if viewed {
            GuestStatus::Viewed
        } else {
            GuestStatus::Pending
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GuestStatus::Pending => "pending",
            GuestStatus::Viewed => "viewed",
            GuestStatus::Accepted => "accepted",
            GuestStatus::Submitted => "submitted",
        }
    }

    pub fn has_responded(&self) -> bool {
        *self >= GuestStatus::Accepted
    }

    /// The response-level status templates render (`null` until accepted).
    pub fn response(&self) -> Option<GuestStatus> {
        self.has_responded().then_some(*self)
    }
}

impl std::fmt::Display for GuestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Guest {
    pub id: i64,
    pub custom_id: Option<String>,
    pub event_id: i64,
    pub name: String,
    pub viewed: bool,
    pub viewed_at: Option<i64>,
    pub accepted: bool,
    pub accepted_at: Option<i64>,
    #[ts(type = "Record<string, unknown> | null")]
    pub rsvp_data: Option<RsvpData>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// The guest-owned, persisted part of a [`Guest`].
#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GuestProgress {
    pub viewed: bool,
    pub viewed_at: Option<i64>,
    pub accepted: bool,
    pub accepted_at: Option<i64>,
    #[ts(type = "Record<string, unknown> | null")]
    pub rsvp_data: Option<RsvpData>,
}

impl GuestProgress {
    pub fn status(&self) -> GuestStatus {
        GuestStatus::derive(self.viewed, self.accepted, self.rsvp_data.as_ref())
    }
}

/// A guest action, as reported by the template.
#[derive(Debug, Clone, PartialEq)]
pub enum GuestTransition {
    MarkViewed,
    Accept,
    Submit(RsvpData),
    Edit(RsvpData),
}

impl GuestTransition {
    pub fn name(&self) -> &'static str {
        match self {
            GuestTransition::MarkViewed => "mark-viewed",
            GuestTransition::Accept => "accept",
            GuestTransition::Submit(_) => "submit",
            GuestTransition::Edit(_) => "edit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Cannot {action} before accepting the invitation")]
    NotAccepted { action: &'static str },
    #[error("Cannot edit an RSVP that has not been submitted")]
    NotSubmitted,
    #[error("This event does not allow editing a submitted RSVP")]
    EditNotAllowed,
    #[error("RSVP answers cannot be empty")]
    EmptyAnswers,
}

impl Guest {
    pub fn public_id(&self) -> String {
        public_id(self.custom_id.as_deref(), self.id)
    }

    pub fn status(&self) -> GuestStatus {
        GuestStatus::derive(self.viewed, self.accepted, self.rsvp_data.as_ref())
    }

    pub fn progress(&self) -> GuestProgress {
        GuestProgress {
            viewed: self.viewed,
            viewed_at: self.viewed_at,
            accepted: self.accepted,
            accepted_at: self.accepted_at,
            rsvp_data: self.rsvp_data.clone(),
        }
    }

    pub fn with_progress(mut self, progress: GuestProgress) -> Self {
        self.viewed = progress.viewed;
        self.viewed_at = progress.viewed_at;
        self.accepted = progress.accepted;
        self.accepted_at = progress.accepted_at;
        self.rsvp_data = progress.rsvp_data;
        self
    }

    /// Applies a transition to the current progress.
    ///
    /// Returns `Ok(None)` when the transition is a no-op (already viewed,
    /// already accepted, identical answers), `Ok(Some(next))` with the full
    /// progress to persist otherwise. Status never decreases.
    pub fn apply(
        &self,
        transition: &GuestTransition,
        now: i64,
        config: &RsvpConfig,
    ) -> Result<Option<GuestProgress>, TransitionError> {
        let current = self.progress();
        let status = current.status();

        let next = match transition {
            GuestTransition::MarkViewed => {
                if current.viewed {
                    return Ok(None);
                }
                GuestProgress {
                    viewed: true,
                    viewed_at: current.viewed_at.or(Some(now)),
                    ..current
                }
            }
            GuestTransition::Accept => {
                if current.accepted {
                    return Ok(None);
                }
                GuestProgress {
                    accepted: true,
                    accepted_at: current.accepted_at.or(Some(now)),
                    ..current
                }
            }
            GuestTransition::Submit(answers) | GuestTransition::Edit(answers)
                if answers.is_empty() =>
            {
                return Err(TransitionError::EmptyAnswers);
            }
            GuestTransition::Submit(answers) => match status {
                GuestStatus::Pending | GuestStatus::Viewed => {
                    return Err(TransitionError::NotAccepted { action: "submit" });
                }
                GuestStatus::Accepted => GuestProgress {
                    rsvp_data: Some(answers.clone()),
                    ..current
                },
                // Resubmission of a submitted RSVP is an edit.
                GuestStatus::Submitted => {
                    return self.apply(&GuestTransition::Edit(answers.clone()), now, config);
                }
            },
            GuestTransition::Edit(answers) => {
                match status {
                    GuestStatus::Pending | GuestStatus::Viewed => {
                        return Err(TransitionError::NotAccepted { action: "edit" });
                    }
                    GuestStatus::Accepted => return Err(TransitionError::NotSubmitted),
                    GuestStatus::Submitted => {}
                }
                if current.rsvp_data.as_ref() == Some(answers) {
                    return Ok(None);
                }
                if !config.allow_edit_after_submit {
                    return Err(TransitionError::EditNotAllowed);
                }
                GuestProgress {
                    rsvp_data: Some(answers.clone()),
                    ..current
                }
            }
        };

        debug_assert!(next.status() >= status);
        Ok(Some(next))
    }
}

/// Which RSVP affordances the template should show.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ButtonFlags {
    pub show_accept_button: bool,
    pub show_submit_button: bool,
    pub show_edit_button: bool,
}

impl ButtonFlags {
    pub fn compute(status: GuestStatus, config: &RsvpConfig, field_count: usize) -> Self {
        Self {
            show_accept_button: !status.has_responded(),
            show_submit_button: status == GuestStatus::Accepted
                && config.collects_custom_fields(field_count),
            show_edit_button: status == GuestStatus::Submitted && config.allow_edit_after_submit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RsvpType;
    use serde_json::json;

    fn guest() -> Guest {
        Guest {
            id: 1,
            custom_id: Some("g1".to_string()),
            event_id: 1,
            name: "Guest One".to_string(),
            viewed: false,
            viewed_at: None,
            accepted: false,
            accepted_at: None,
            rsvp_data: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn answers(value: serde_json::Value) -> RsvpData {
        value.as_object().unwrap().clone()
    }

    fn detailed(allow_edit: bool) -> RsvpConfig {
        RsvpConfig {
            rsvp_type: RsvpType::Detailed,
            allow_edit_after_submit: allow_edit,
            ..RsvpConfig::default()
        }
    }

    fn step(g: Guest, t: GuestTransition, now: i64, config: &RsvpConfig) -> Guest {
        match g.apply(&t, now, config).unwrap() {
            Some(progress) => g.with_progress(progress),
            None => g,
        }
    }

    #[test]
    fn test_status_derivation() {
        assert_eq!(GuestStatus::derive(false, false, None), GuestStatus::Pending);
        assert_eq!(GuestStatus::derive(true, false, None), GuestStatus::Viewed);
        assert_eq!(GuestStatus::derive(true, true, None), GuestStatus::Accepted);
        assert_eq!(
            GuestStatus::derive(false, true, Some(&RsvpData::new())),
            GuestStatus::Accepted
        );
        let data = answers(json!({"meal": "fish"}));
        assert_eq!(GuestStatus::derive(false, true, Some(&data)), GuestStatus::Submitted);
        // Answers without acceptance do not count as a submission.
        assert_eq!(GuestStatus::derive(true, false, Some(&data)), GuestStatus::Viewed);
    }

    #[test]
    fn test_mark_viewed_is_idempotent() {
        let config = RsvpConfig::default();
        let g = step(guest(), GuestTransition::MarkViewed, 100, &config);
        assert!(g.viewed);
        assert_eq!(g.viewed_at, Some(100));

        assert_eq!(g.apply(&GuestTransition::MarkViewed, 200, &config), Ok(None));
        let again = step(g, GuestTransition::MarkViewed, 200, &config);
        assert_eq!(again.viewed_at, Some(100));
    }

    #[test]
    fn test_accept_twice_keeps_first_timestamp() {
        let config = RsvpConfig::default();
        let g = step(guest(), GuestTransition::Accept, 10, &config);
        assert_eq!(g.status(), GuestStatus::Accepted);
        assert_eq!(g.apply(&GuestTransition::Accept, 20, &config), Ok(None));
        assert_eq!(g.accepted_at, Some(10));
    }

    #[test]
    fn test_submit_before_accept_is_rejected() {
        let config = detailed(true);
        let g = step(guest(), GuestTransition::MarkViewed, 1, &config);
        let result = g.apply(&GuestTransition::Submit(answers(json!({"a": 1}))), 2, &config);
        assert_eq!(result, Err(TransitionError::NotAccepted { action: "submit" }));
    }

    #[test]
    fn test_empty_answers_rejected() {
        let config = detailed(true);
        let g = step(guest(), GuestTransition::Accept, 1, &config);
        assert_eq!(
            g.apply(&GuestTransition::Submit(RsvpData::new()), 2, &config),
            Err(TransitionError::EmptyAnswers)
        );
    }

    #[test]
    fn test_edit_requires_permission() {
        let config = detailed(false);
        let g = step(guest(), GuestTransition::Accept, 1, &config);
        let g = step(g, GuestTransition::Submit(answers(json!({"a": 1}))), 2, &config);
        assert_eq!(g.status(), GuestStatus::Submitted);

        assert_eq!(
            g.apply(&GuestTransition::Edit(answers(json!({"a": 2}))), 3, &config),
            Err(TransitionError::EditNotAllowed)
        );
        // Same answers again is a no-op, not an error.
        assert_eq!(
            g.apply(&GuestTransition::Submit(answers(json!({"a": 1}))), 3, &config),
            Ok(None)
        );
    }

    #[test]
    fn test_edit_before_submit_rejected() {
        let config = detailed(true);
        let g = step(guest(), GuestTransition::Accept, 1, &config);
        assert_eq!(
            g.apply(&GuestTransition::Edit(answers(json!({"a": 2}))), 3, &config),
            Err(TransitionError::NotSubmitted)
        );
    }

    #[test]
    fn test_status_is_monotonic() {
        let config = detailed(true);
        let sequence = vec![
            GuestTransition::MarkViewed,
            GuestTransition::Accept,
            GuestTransition::MarkViewed,
            GuestTransition::Submit(answers(json!({"a": 1}))),
            GuestTransition::Accept,
            GuestTransition::Edit(answers(json!({"a": 2}))),
            GuestTransition::MarkViewed,
        ];

        let mut g = guest();
        let mut last = g.status();
        for (i, t) in sequence.into_iter().enumerate() {
            g = step(g, t, i as i64, &config);
            assert!(g.status() >= last);
            last = g.status();
        }
        assert_eq!(last, GuestStatus::Submitted);
        assert_eq!(g.rsvp_data, Some(answers(json!({"a": 2}))));
    }

    #[test]
    fn test_button_flags() {
        let config = RsvpConfig {
            rsvp_type: RsvpType::Detailed,
            has_custom_fields: true,
            allow_edit_after_submit: true,
            ..RsvpConfig::default()
        };

        let flags = ButtonFlags::compute(GuestStatus::Accepted, &config, 2);
        assert_eq!(
            flags,
            ButtonFlags {
                show_accept_button: false,
                show_submit_button: true,
                show_edit_button: false,
            }
        );

        let flags = ButtonFlags::compute(GuestStatus::Submitted, &config, 2);
        assert!(!flags.show_submit_button);
        assert!(flags.show_edit_button);

        let flags = ButtonFlags::compute(GuestStatus::Viewed, &RsvpConfig::default(), 0);
        assert!(flags.show_accept_button);
        assert!(!flags.show_submit_button);

        // Simple RSVP with no fields never asks for a form.
        let flags = ButtonFlags::compute(GuestStatus::Accepted, &RsvpConfig::default(), 0);
        assert!(!flags.show_submit_button);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&GuestStatus::Submitted).unwrap(), "\"submitted\"");
        assert_eq!(GuestStatus::Viewed.response(), None);
        assert_eq!(GuestStatus::Accepted.response(), Some(GuestStatus::Accepted));
    }
}
