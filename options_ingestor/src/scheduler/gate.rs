use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

/// Pause shared by every worker of one scheduler run.
///
/// When the upstream answers with `Retry-After`, the worker that saw it
/// extends the gate and every worker waits on it before its next request.
#[derive(Debug, Clone, Default)]
pub struct RetryGate {
    until: Arc<Mutex<Option<Instant>>>,
}

impl RetryGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes the gate for `wait` from now. Never shortens an existing hold.
    pub fn hold_for(&self, wait: Duration) {
        let deadline = Instant::now() + wait;
        let mut until = self.until.lock().unwrap_or_else(|p| p.into_inner());
        if until.is_none_or(|current| current < deadline) {
            *until = Some(deadline);
        }
    }

    /// Current hold deadline, if it lies in the future.
    pub fn deadline(&self) -> Option<Instant> {
        let until = self.until.lock().unwrap_or_else(|p| p.into_inner());
        until.filter(|t| *t > Instant::now())
    }

    /// Waits until the gate is open.
    pub async fn wait(&self) {
        // Loop: another worker may extend the hold while we sleep.
        while let Some(deadline) = self.deadline() {
            tokio::time::sleep_until(deadline).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn wait_honours_longest_hold() {
        let gate = RetryGate::new();
        let start = Instant::now();
        gate.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        gate.hold_for(Duration::from_secs(5));
        gate.hold_for(Duration::from_secs(2));
        gate.wait().await;
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert!(gate.deadline().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn clones_share_the_hold() {
        let gate = RetryGate::new();
        let other = gate.clone();
        let start = Instant::now();
        other.hold_for(Duration::from_secs(3));
        gate.wait().await;
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }
}
