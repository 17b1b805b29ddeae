//! Report cadence: a fixed heartbeat floor combined with event urgency.

/// Why a report is due on this tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReportTrigger {
    Heartbeat,
    Event,
}

/// Cyclic heartbeat counter in `[0, cycle)`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ReportScheduler {
    counter: u32,
    cycle: u32,
}

impl ReportScheduler {
    /// Starts at zero so the first tick carries a report.
    pub const fn new(cycle: u32) -> Self {
        Self {
            counter: 0,
            cycle: if cycle == 0 { 1 } else { cycle },
        }
    }

    pub const fn counter(&self) -> u32 {
        self.counter
    }

    pub const fn cycle(&self) -> u32 {
        self.cycle
    }

    /// Returns the trigger for this tick, if any. Heartbeat wins when both apply.
    pub const fn due(&self, report_required: bool) -> Option<ReportTrigger> {
        if self.counter == 0 {
            Some(ReportTrigger::Heartbeat)
        } else if report_required {
            Some(ReportTrigger::Event)
        } else {
            None
        }
    }

    /// Moves the floor forward; called every processed tick regardless of
    /// whether a report was attempted or delivered.
    pub fn advance(&mut self) {
        self.counter = (self.counter + 1) % self.cycle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_fires_once_per_cycle() {
        let mut scheduler = ReportScheduler::new(4);
        let mut fired = 0;
        for _ in 0..12 {
            if scheduler.due(false).is_some() {
                fired += 1;
            }
            scheduler.advance();
        }
        assert_eq!(fired, 3);
    }

    #[test]
    fn event_makes_any_tick_due() {
        let mut scheduler = ReportScheduler::new(10);
        scheduler.advance();
        assert_eq!(scheduler.due(false), None);
        assert_eq!(scheduler.due(true), Some(ReportTrigger::Event));
    }

    #[test]
    fn counter_wraps_at_cycle() {
        let mut scheduler = ReportScheduler::new(3);
        for _ in 0..3 {
            scheduler.advance();
        }
        assert_eq!(scheduler.counter(), 0);
        assert_eq!(scheduler.due(true), Some(ReportTrigger::Heartbeat));
    }
}
