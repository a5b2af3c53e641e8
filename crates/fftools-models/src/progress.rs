//! Conversion progress snapshots.

use serde::{Deserialize, Serialize};

/// Progress information parsed from one ffmpeg status line.
///
/// Fields ffmpeg reports as `N/A` stay `None`. A snapshot is ephemeral:
/// it describes the moment the line was printed and is not retained after
/// delivery to subscribers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionProgress {
    /// Frames processed so far
    pub frame: Option<u64>,
    /// Current encoding rate in frames per second
    pub fps: Option<f64>,
    /// Output written so far, in kilobytes
    pub size_kb: Option<u64>,
    /// Processed output duration in milliseconds
    pub out_time_ms: i64,
    /// Current output bitrate in kbit/s
    pub bitrate_kbps: Option<f64>,
    /// Encoding speed relative to realtime (1.5 = 1.5x)
    pub speed: Option<f64>,
}

impl ConversionProgress {
    /// Calculate progress percentage given total duration in milliseconds.
    pub fn percentage(&self, total_duration_ms: i64) -> f64 {
        if total_duration_ms <= 0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / total_duration_ms as f64) * 100.0).min(100.0)
    }

    /// Estimate time remaining in seconds.
    pub fn eta_seconds(&self, total_duration_ms: i64) -> Option<f64> {
        let speed = self.speed?;
        if speed <= 0.0 || self.out_time_ms <= 0 {
            return None;
        }

        let remaining_ms = total_duration_ms - self.out_time_ms;
        if remaining_ms <= 0 {
            return Some(0.0);
        }

        Some((remaining_ms as f64 / 1000.0) / speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percentage() {
        let progress = ConversionProgress {
            out_time_ms: 5000,
            ..Default::default()
        };

        assert!((progress.percentage(10000) - 50.0).abs() < 0.01);
        assert!((progress.percentage(5000) - 100.0).abs() < 0.01);
        // over-reporting clamps
        assert!((progress.percentage(2500) - 100.0).abs() < 0.01);
        assert_eq!(progress.percentage(0), 0.0);
    }

    #[test]
    fn test_eta_calculation() {
        let progress = ConversionProgress {
            out_time_ms: 5000,
            speed: Some(2.0), // 2x realtime
            ..Default::default()
        };

        // 5 seconds remaining at 2x speed = 2.5 seconds ETA
        let eta = progress.eta_seconds(10000).unwrap();
        assert!((eta - 2.5).abs() < 0.01);

        // no speed reported yet -> no estimate
        let unknown = ConversionProgress {
            out_time_ms: 5000,
            ..Default::default()
        };
        assert!(unknown.eta_seconds(10000).is_none());
    }
}
