// Failure gate for the generation backend
//
// Tracks consecutive failures of the external text-generation service. Once
// the threshold is reached the gate opens and calls fail fast for a cooldown
// window; after the window one probe per cooldown interval is let through
// until a success closes the gate again. Keeps a dead backend from stacking
// up timeout-bound requests while the fallback tier carries traffic.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct BackendHealthConfig {
    /// Consecutive failures before the gate opens.
    pub failure_threshold: usize,
    /// How long the gate stays shut before a probe is allowed.
    pub cooldown: Duration,
}

impl Default for BackendHealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
        }
    }
}

#[derive(Clone)]
pub struct BackendHealth {
    state: Arc<RwLock<GateState>>,
    config: BackendHealthConfig,
}

struct GateState {
    consecutive_failures: usize,
    open_until: Option<Instant>,
    total_failures: u64,
    total_successes: u64,
}

/// Point-in-time view for health reporting.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BackendHealthSnapshot {
    pub open: bool,
    pub consecutive_failures: usize,
    pub total_failures: u64,
    pub total_successes: u64,
}

impl BackendHealth {
    pub fn new(config: BackendHealthConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(GateState {
                consecutive_failures: 0,
                open_until: None,
                total_failures: 0,
                total_successes: 0,
            })),
            config,
        }
    }

    /// Whether a call to the backend should be attempted right now.
    ///
    /// When the cooldown has elapsed this admits a single probe and re-arms
    /// the window, so a dead backend sees one request per cooldown interval.
    pub fn allow_request(&self) -> bool {
        let mut state = self.state.write();
        match state.open_until {
            None => true,
            Some(deadline) => {
                if Instant::now() >= deadline {
                    state.open_until = Some(Instant::now() + self.config.cooldown);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.write();
        state.total_successes += 1;
        state.consecutive_failures = 0;
        state.open_until = None;
    }

    pub fn record_failure(&self) {
        let mut state = self.state.write();
        state.total_failures += 1;
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.config.failure_threshold {
            state.open_until = Some(Instant::now() + self.config.cooldown);
        }
    }

    pub fn is_open(&self) -> bool {
        self.state
            .read()
            .open_until
            .map(|deadline| Instant::now() < deadline)
            .unwrap_or(false)
    }

    pub fn snapshot(&self) -> BackendHealthSnapshot {
        let state = self.state.read();
        BackendHealthSnapshot {
            open: state
                .open_until
                .map(|deadline| Instant::now() < deadline)
                .unwrap_or(false),
            consecutive_failures: state.consecutive_failures,
            total_failures: state.total_failures,
            total_successes: state.total_successes,
        }
    }
}

impl Default for BackendHealth {
    fn default() -> Self {
        Self::new(BackendHealthConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(threshold: usize, cooldown_ms: u64) -> BackendHealth {
        BackendHealth::new(BackendHealthConfig {
            failure_threshold: threshold,
            cooldown: Duration::from_millis(cooldown_ms),
        })
    }

    #[test]
    fn opens_after_threshold_failures() {
        let health = gate(3, 60_000);
        assert!(health.allow_request());

        health.record_failure();
        health.record_failure();
        assert!(!health.is_open());
        health.record_failure();

        assert!(health.is_open());
        assert!(!health.allow_request());
    }

    #[test]
    fn success_closes_the_gate() {
        let health = gate(2, 50);
        health.record_failure();
        health.record_failure();
        assert!(health.is_open());

        std::thread::sleep(Duration::from_millis(80));

        // Probe admitted after cooldown, success closes the gate fully
        assert!(health.allow_request());
        health.record_success();
        assert!(!health.is_open());
        assert!(health.allow_request());
    }

    #[test]
    fn only_one_probe_per_cooldown_window() {
        let health = gate(1, 50);
        health.record_failure();
        assert!(!health.allow_request());

        std::thread::sleep(Duration::from_millis(80));
        assert!(health.allow_request());
        // The probe re-armed the window; the next caller is still gated
        assert!(!health.allow_request());
    }

    #[test]
    fn failed_probe_keeps_the_gate_open() {
        let health = gate(1, 50);
        health.record_failure();
        std::thread::sleep(Duration::from_millis(80));
        assert!(health.allow_request());
        health.record_failure();
        assert!(!health.allow_request());
    }
}
