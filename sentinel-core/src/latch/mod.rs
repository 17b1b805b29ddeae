//! Event latch holding observations until a report is acknowledged.
//!
//! Flags only ever go from `false` to `true` on observation. The single way
//! back is [`EventLatch::clear_on_ack`], which the agent calls after the
//! management service confirmed a report. A chassis opening that lasts a
//! single tick therefore survives any number of failed report attempts.

/// Facts accumulated since the last acknowledged report.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct LatchedState {
    pub alive: bool,
    pub opened: bool,
}

impl LatchedState {
    pub const fn new(alive: bool, opened: bool) -> Self {
        Self { alive, opened }
    }
}

/// OR-accumulating latch plus the opened-event suppression flag.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct EventLatch {
    latched: LatchedState,
    opened_suppressed: bool,
    power_change_pending: bool,
    last_power_on: Option<bool>,
}

impl EventLatch {
    pub const fn new() -> Self {
        Self {
            latched: LatchedState::new(false, false),
            opened_suppressed: false,
            power_change_pending: false,
            last_power_on: None,
        }
    }

    pub const fn latched(&self) -> LatchedState {
        self.latched
    }

    pub const fn opened_suppressed(&self) -> bool {
        self.opened_suppressed
    }

    pub const fn power_change_pending(&self) -> bool {
        self.power_change_pending
    }

    /// Folds one tick's observation into the latch.
    ///
    /// When `track_power_changes` is set, a change of `power_on` relative to
    /// the previous observation raises the pending flag.
    pub fn observe(&mut self, power_on: bool, chassis_open: bool, track_power_changes: bool) {
        self.latched.alive |= power_on;
        self.latched.opened |= chassis_open;

        if track_power_changes
            && let Some(previous) = self.last_power_on
            && previous != power_on
        {
            self.power_change_pending = true;
        }
        self.last_power_on = Some(power_on);
    }

    /// Clears suppression once the switch is seen closed again.
    ///
    /// Only the flag is cleared. An opening latched meanwhile is still
    /// pending and gets reported.
    pub fn resolve_suppression(&mut self, chassis_open: bool) {
        if self.opened_suppressed && !chassis_open {
            self.opened_suppressed = false;
        }
    }

    /// Returns `true` when latched facts warrant a report before the next
    /// heartbeat.
    pub const fn is_report_required(&self) -> bool {
        !self.opened_suppressed && (self.latched.opened || self.power_change_pending)
    }

    /// Resets the latch after `delivered` was acknowledged.
    ///
    /// Suppression is armed only when the acknowledged report carried an
    /// opening, so a heartbeat never masks a fresh intrusion.
    pub fn clear_on_ack(&mut self, delivered: LatchedState) {
        self.latched = LatchedState::default();
        self.power_change_pending = false;
        if delivered.opened {
            self.opened_suppressed = true;
        }
    }
}
