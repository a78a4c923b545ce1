//! Heartbeat monitor for simulated platform comms.

use serde::{Deserialize, Serialize};

/// Heartbeat status enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HeartbeatStatus {
    /// Heartbeat is current
    Alive,
    /// Past 80% of the timeout
    Warning,
    /// Past the timeout; commands are refused and running tasks fail
    Expired,
}

/// Classifies heartbeat age against the comms timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatMonitor {
    timeout_ms: u64,
}

impl HeartbeatMonitor {
    pub fn new(timeout_s: f64) -> Self {
        Self {
            timeout_ms: (timeout_s.max(0.0) * 1000.0).round() as u64,
        }
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Status of a heartbeat last seen at `last_ms`, checked at `now_ms`.
    pub fn check(&self, last_ms: u64, now_ms: u64) -> HeartbeatStatus {
        let elapsed = now_ms.saturating_sub(last_ms);

        if elapsed > self.timeout_ms {
            HeartbeatStatus::Expired
        } else if elapsed >= self.timeout_ms * 4 / 5 {
            HeartbeatStatus::Warning
        } else {
            HeartbeatStatus::Alive
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_alive() {
        let monitor = HeartbeatMonitor::new(5.0);
        assert_eq!(monitor.check(1_000, 3_000), HeartbeatStatus::Alive);
    }

    #[test]
    fn test_heartbeat_warning() {
        let monitor = HeartbeatMonitor::new(5.0);
        // 80% of 5 s is 4 s
        assert_eq!(monitor.check(1_000, 5_000), HeartbeatStatus::Warning);
        assert_eq!(monitor.check(1_000, 6_000), HeartbeatStatus::Warning);
    }

    #[test]
    fn test_heartbeat_expired() {
        let monitor = HeartbeatMonitor::new(5.0);
        assert_eq!(monitor.check(1_000, 6_001), HeartbeatStatus::Expired);
        assert_eq!(monitor.check(0, 7_000), HeartbeatStatus::Expired);
    }

    #[test]
    fn test_clock_skew_is_alive() {
        let monitor = HeartbeatMonitor::new(5.0);
        assert_eq!(monitor.check(9_000, 1_000), HeartbeatStatus::Alive);
    }
}
