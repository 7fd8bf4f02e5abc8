// error.rs — Error types for the planning engine.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during planning operations.
#[derive(Debug, Error)]
pub enum PlanningError {
    /// The requested activity does not exist (or was deleted).
    #[error("activity not found: {0}")]
    ActivityNotFound(Uuid),

    /// No activity owns a goal with this id.
    #[error("goal not found: {0}")]
    GoalNotFound(Uuid),

    /// The activity has no alert with this id.
    #[error("alert {alert_id} not found on activity {activity_id}")]
    AlertNotFound { activity_id: Uuid, alert_id: Uuid },

    /// Input was rejected. `field` names the offending input so callers can
    /// render the message next to it.
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Another writer committed a newer version of the activity first.
    #[error("activity {activity_id} was modified concurrently (expected version {expected}, found {found})")]
    ConcurrentModification {
        activity_id: Uuid,
        expected: u64,
        found: u64,
    },

    /// A reference-data collaborator (plots, crops, roster) could not answer.
    #[error("{service} unavailable: {reason}")]
    DependencyUnavailable { service: String, reason: String },

    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize activity data.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A configuration file could not be parsed.
    #[error("config error in {path}: {reason}")]
    ConfigError { path: String, reason: String },
}

impl PlanningError {
    /// Rejected input on `field`.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        PlanningError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// A collaborator such as the plot registry or roster did not answer.
    pub fn unavailable(service: impl Into<String>, reason: impl Into<String>) -> Self {
        PlanningError::DependencyUnavailable {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// True for the "entity is gone" family, as opposed to bad input.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PlanningError::ActivityNotFound(_)
                | PlanningError::GoalNotFound(_)
                | PlanningError::AlertNotFound { .. }
        )
    }

    /// True when the caller sent something the rules reject.
    pub fn is_validation(&self) -> bool {
        matches!(self, PlanningError::Validation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_distinct_from_validation() {
        let missing = PlanningError::ActivityNotFound(Uuid::new_v4());
        let bad = PlanningError::validation("progress", "cannot decrease");
        assert!(missing.is_not_found());
        assert!(!missing.is_validation());
        assert!(bad.is_validation());
        assert!(!bad.is_not_found());
    }

    #[test]
    fn validation_message_names_the_field() {
        let err = PlanningError::validation("planned_end", "must not precede planned_start");
        assert_eq!(
            err.to_string(),
            "invalid planned_end: must not precede planned_start"
        );
    }
}
