//! Post-press cooldown window.

use core::{ops::Add, time::Duration};

/// Optional deadline before which the agent stays idle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CooldownWindow<I> {
    deadline: Option<I>,
}

impl<I> CooldownWindow<I>
where
    I: Copy + Ord,
{
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    pub const fn deadline(&self) -> Option<I> {
        self.deadline
    }

    /// Arms the window to expire `length` after `start`.
    pub fn arm(&mut self, start: I, length: Duration)
    where
        I: Add<Duration, Output = I>,
    {
        self.deadline = Some(start + length);
    }

    /// Returns `true` when a deadline is set and still in the future.
    pub fn is_active(&self, now: I) -> bool {
        matches!(self.deadline, Some(deadline) if now < deadline)
    }

    /// Drops a deadline that has passed. Returns `true` when one was cleared.
    pub fn expire(&mut self, now: I) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

impl<I> Default for CooldownWindow<I>
where
    I: Copy + Ord,
{
    fn default() -> Self {
        Self::new()
    }
}
