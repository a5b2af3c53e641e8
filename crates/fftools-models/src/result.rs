//! Conversion results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record of one completed ffmpeg run.
///
/// Created once when a run finishes and never mutated. `arguments` is the
/// caller-supplied parameter string, without any flags the session injected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Wall-clock time the run started
    pub started_at: DateTime<Utc>,
    /// Wall-clock time the run finished
    pub ended_at: DateTime<Utc>,
    /// The caller-supplied argument string
    pub arguments: String,
}

impl ConversionResult {
    /// Total wall-clock duration of the run.
    pub fn duration(&self) -> chrono::Duration {
        self.ended_at - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn duration_spans_start_to_end() {
        let result = ConversionResult {
            started_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            ended_at: Utc.timestamp_opt(1_700_000_090, 0).unwrap(),
            arguments: "-i in.mkv out.mp4".to_string(),
        };
        assert_eq!(result.duration().num_seconds(), 90);
        assert!(result.started_at <= result.ended_at);
    }
}
