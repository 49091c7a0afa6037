//! Per-key minimum interval between successful runs.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Remembers when each key last completed and refuses to run it again
/// before `interval` has passed. State is in memory only.
#[derive(Debug)]
pub struct IntervalGate {
    interval: Duration,
    last_success: Mutex<HashMap<String, Instant>>,
}

impl IntervalGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_success: Mutex::new(HashMap::new()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether `key` may run now.
    pub fn ready(&self, key: &str) -> bool {
        self.remaining(key).is_none()
    }

    /// Time left before `key` may run again, if it is still cooling down.
    pub fn remaining(&self, key: &str) -> Option<Duration> {
        let last = self.lock().get(key).copied()?;
        let elapsed = last.elapsed();
        (elapsed < self.interval).then(|| self.interval - elapsed)
    }

    /// Record a successful run of `key`.
    pub fn mark(&self, key: &str) {
        self.lock().insert(key.to_string(), Instant::now());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Instant>> {
        self.last_success.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn gate_opens_after_interval() {
        let gate = IntervalGate::new(Duration::from_secs(600));
        assert!(gate.ready("0"));

        gate.mark("0");
        assert!(!gate.ready("0"));
        assert!(gate.ready("3"), "keys are independent");

        tokio::time::advance(Duration::from_secs(599)).await;
        assert_eq!(gate.remaining("0"), Some(Duration::from_secs(1)));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(gate.ready("0"));
    }
}
