//! Single-slot step scheduler counted in game ticks.
//!
//! Deferred battle steps (enemy turn, next enemy) wait here. A real-time
//! front end feeds elapsed ticks to `battle::logic::tick`; the CLI and tests
//! fire them at once with `battle::logic::run_pending`.

/// At most one pending step. A new step can only be scheduled once the
/// previous one has fired or been cancelled.
#[derive(Clone, Debug, PartialEq)]
pub struct Scheduler<T> {
    slot: Option<(T, u32)>,
}

impl<T: Copy> Scheduler<T> {
    pub fn new() -> Self {
        Self { slot: None }
    }

    /// Returns false (and keeps the existing step) if something is pending.
    pub fn schedule(&mut self, step: T, delay_ticks: u32) -> bool {
        if self.slot.is_some() {
            return false;
        }
        self.slot = Some((step, delay_ticks));
        true
    }

    pub fn pending(&self) -> Option<T> {
        self.slot.map(|(step, _)| step)
    }

    pub fn is_idle(&self) -> bool {
        self.slot.is_none()
    }

    pub fn cancel(&mut self) -> Option<T> {
        self.slot.take().map(|(step, _)| step)
    }

    /// Count down by `ticks`. Hands the step back once it is due and
    /// frees the slot; leftover ticks are discarded.
    pub fn advance(&mut self, ticks: u32) -> Option<T> {
        let (step, remaining) = self.slot.as_mut()?;
        *remaining = remaining.saturating_sub(ticks);
        if *remaining == 0 {
            let step = *step;
            self.slot = None;
            Some(step)
        } else {
            None
        }
    }

    /// Fire the pending step immediately regardless of its countdown.
    pub fn take_now(&mut self) -> Option<T> {
        self.cancel()
    }
}

impl<T: Copy> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}
