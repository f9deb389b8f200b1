use serde::{Deserialize, Serialize};
use std::fmt;

/// Task lifecycle states.
///
/// The machine is strictly monotonic: CREATED → RUNNING → (COMPLETED | ERROR).
/// Terminal states are immutable once set; a CREATED record may additionally
/// be deleted by saga compensation before any worker has claimed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Record persisted, message enqueued, no worker has claimed it yet
    Created,
    /// A worker won the claim and is executing the handler
    Running,
    /// Handler finished successfully; output payload recorded
    Completed,
    /// Handler (or payload deserialization) failed; error message recorded
    Error,
}

impl TaskStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Check if this is an active state (a worker holds the claim)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Whether the state machine permits a transition to `next`
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Error)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "CREATED"),
            Self::Running => write!(f, "RUNNING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(Self::Created),
            "RUNNING" => Ok(Self::Running),
            "COMPLETED" => Ok(Self::Completed),
            "ERROR" => Ok(Self::Error),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Created
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_terminal_check() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Error.is_terminal());
        assert!(!TaskStatus::Created.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }

    #[test]
    fn test_allowed_transitions() {
        assert!(TaskStatus::Created.can_transition_to(TaskStatus::Running));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Completed));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Error));

        assert!(!TaskStatus::Created.can_transition_to(TaskStatus::Completed));
        assert!(!TaskStatus::Running.can_transition_to(TaskStatus::Created));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Running));
        assert!(!TaskStatus::Error.can_transition_to(TaskStatus::Running));
    }

    #[test]
    fn test_string_conversion() {
        assert_eq!(TaskStatus::Running.to_string(), "RUNNING");
        assert_eq!(
            "COMPLETED".parse::<TaskStatus>().unwrap(),
            TaskStatus::Completed
        );
        assert!("completed".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_serde_wire_vocabulary() {
        let json = serde_json::to_string(&TaskStatus::Created).unwrap();
        assert_eq!(json, "\"CREATED\"");

        let parsed: TaskStatus = serde_json::from_str("\"ERROR\"").unwrap();
        assert_eq!(parsed, TaskStatus::Error);
    }

    fn any_status() -> impl Strategy<Value = TaskStatus> {
        prop_oneof![
            Just(TaskStatus::Created),
            Just(TaskStatus::Running),
            Just(TaskStatus::Completed),
            Just(TaskStatus::Error),
        ]
    }

    proptest! {
        #[test]
        fn prop_no_transition_leaves_terminal(from in any_status(), to in any_status()) {
            if from.is_terminal() {
                prop_assert!(!from.can_transition_to(to));
            }
        }

        #[test]
        fn prop_display_parse_round_trip(status in any_status()) {
            let parsed: TaskStatus = status.to_string().parse().unwrap();
            prop_assert_eq!(parsed, status);
        }
    }
}
