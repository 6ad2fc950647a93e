use tokio::time::Duration;

/// Upper bound on a single backoff delay.
pub const MAX_DELAY: Duration = Duration::from_secs(10);

/// Yields linearly increasing delays, `delta * epoch`, capped at [MAX_DELAY].
///
/// The dialing replica waits one delay between failed attempts to reach its peer, so a
/// peer that starts late is picked up quickly while a dead one is not hammered.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    epoch: u32,
    delta: Duration,
}

impl LinearBackoff {
    pub fn new(delta: Duration) -> Self {
        LinearBackoff { epoch: 0, delta }
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Advances one epoch and returns how long to wait before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        self.epoch = self.epoch.saturating_add(1);
        std::cmp::min(self.delta * self.epoch, MAX_DELAY)
    }
}
