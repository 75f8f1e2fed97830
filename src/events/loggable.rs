use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity levels for activity logs.
/// Controls retention and filtering in the project activity feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Membership, ownership and deletion changes: never auto-delete
    Critical,
    /// Regular project edits
    #[default]
    Important,
    /// Read-side or bookkeeping events
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }
}

/// Trait for entities that can be recorded in the activity log.
pub trait Loggable: Serialize + Send + Sync {
    /// The entity type name (e.g., "project", "member").
    /// This becomes the prefix in event names like "member.invited"
    fn entity_type() -> &'static str;

    /// The id the event is filed under
    fn subject_id(&self) -> Uuid;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "deleted" | "ownership_transferred" => Severity::Critical,
            "registered" | "login" => Severity::Noise,
            _ => self.severity(),
        }
    }
}
