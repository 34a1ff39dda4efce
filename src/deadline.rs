use std::time::{Duration, Instant};

/// An absolute point in wall-clock time past which a search must stop and
/// report its incumbent. Passed by value down every recursive call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn at(instant: Instant) -> Self {
        Self(instant)
    }

    pub fn after(budget: Duration) -> Self {
        let now = Instant::now();
        // Durations too large to represent are treated as "never"
        Self(now.checked_add(budget).unwrap_or(now + Duration::from_secs(86_400 * 365)))
    }

    pub fn instant(&self) -> Instant {
        self.0
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.0
    }

    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    /// The earlier of two deadlines.
    pub fn min(self, other: Deadline) -> Deadline {
        if other.0 < self.0 { other } else { self }
    }
}
