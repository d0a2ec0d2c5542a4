//! Cooperative virtual time
//!
//! The instrumentation layer runs under the page's single-threaded cooperative
//! scheduler: the only asynchrony is time-based. Instead of wall-clock timers,
//! everything here runs on a logical tick counter so that ordering and quiet
//! periods are deterministic under test. [`Debounce`] models a deferred action
//! whose deadline is superseded by each new trigger; the previous timer needs
//! no explicit cancellation because re-arming replaces it.

/// Logical time unit for the cooperative scheduler.
pub type Tick = u64;

/// Monotonic logical clock owned by the page context.
#[derive(Debug, Clone, Copy, Default)]
pub struct VirtualClock {
    now: Tick,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self { now: 0 }
    }

    pub fn now(&self) -> Tick {
        self.now
    }

    /// Move time forward; returns the new now.
    pub fn advance(&mut self, ticks: Tick) -> Tick {
        self.now = self.now.saturating_add(ticks);
        self.now
    }
}

/// A re-armable deferred deadline.
///
/// Each `poke` pushes the deadline to `now + wait`; `fire_if_due` consumes the
/// deadline once the quiet interval has elapsed with no further pokes.
#[derive(Debug, Clone)]
pub struct Debounce {
    wait: Tick,
    deadline: Option<Tick>,
}

impl Debounce {
    pub fn new(wait: Tick) -> Self {
        Self { wait, deadline: None }
    }

    /// Re-arm: supersedes any pending deadline.
    pub fn poke(&mut self, now: Tick) {
        self.deadline = Some(now.saturating_add(self.wait));
    }

    /// Consume and report a due deadline. Not due (or not armed) leaves the
    /// deadline in place.
    pub fn fire_if_due(&mut self, now: Tick) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Tick> {
        self.deadline
    }

    pub fn wait(&self) -> Tick {
        self.wait
    }
}
