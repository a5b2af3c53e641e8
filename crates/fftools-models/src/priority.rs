//! Process scheduling priority.

use serde::{Deserialize, Serialize};

/// Scheduling priority for a spawned tool process.
///
/// When no priority is requested the child inherits the parent's. How each
/// level maps onto the operating system's scheduler is a platform concern
/// and lives with the process spawning code, not here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Idle,
    BelowNormal,
    #[default]
    Normal,
    AboveNormal,
    High,
    Realtime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&Priority::BelowNormal).unwrap(),
            "\"below_normal\""
        );
        let back: Priority = serde_json::from_str("\"realtime\"").unwrap();
        assert_eq!(back, Priority::Realtime);
    }
}
