use std::time::Duration;
use tokio::time::Instant;

/// Whole-second race clock that can be re-based after a pause.
#[derive(Debug, Clone, Copy)]
pub struct RaceClock {
    started_at: Instant,
}

impl RaceClock {
    pub fn start() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }

    /// A running clock that already shows `elapsed_secs`
    pub fn resume_at(elapsed_secs: u64) -> Self {
        let now = Instant::now();
        let started_at = now
            .checked_sub(Duration::from_secs(elapsed_secs))
            .unwrap_or(now);
        Self { started_at }
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Time charged for a run: never below one second
    pub fn freeze(&self) -> u64 {
        self.elapsed_secs().max(1)
    }
}
