//! Network link supervision.
//!
//! The platform owns the actual Wi-Fi association. The supervisor only polls
//! its status once per tick and, while the link is not up, issues
//! fire-and-forget connect requests at a bounded cadence. Nothing is issued
//! during the startup grace period because the connect-on-boot request is
//! usually still negotiating.

use core::fmt;

/// Connectivity as reported by the platform.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LinkState {
    Down,
    Connecting,
    Up,
}

impl LinkState {
    pub const fn is_up(self) -> bool {
        matches!(self, LinkState::Up)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LinkState::Down => "down",
            LinkState::Connecting => "connecting",
            LinkState::Up => "up",
        })
    }
}

/// Narrow interface to the platform's network stack.
pub trait LinkControl {
    /// Returns the current link state without blocking.
    fn poll(&mut self) -> LinkState;

    /// Starts a connection attempt and returns immediately.
    fn request_connect(&mut self);
}

/// Change in link state observed between two ticks.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LinkTransition {
    Established,
    Lost,
}

/// Outcome of one supervision step.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LinkStep {
    pub state: LinkState,
    pub transition: Option<LinkTransition>,
    pub reconnect_requested: bool,
}

/// Reconnect cadence and startup grace bookkeeping.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LinkSupervisor {
    state: LinkState,
    reconnect_counter: u32,
    reconnect_cycle: u32,
    grace_counter: u32,
    grace_ticks: u32,
}

impl LinkSupervisor {
    /// Creates a supervisor that assumes the link starts down.
    pub const fn new(reconnect_cycle: u32, grace_ticks: u32) -> Self {
        Self {
            state: LinkState::Down,
            reconnect_counter: 0,
            reconnect_cycle: if reconnect_cycle == 0 {
                1
            } else {
                reconnect_cycle
            },
            grace_counter: 0,
            grace_ticks,
        }
    }

    /// Last state observed by [`step`](Self::step).
    pub const fn state(&self) -> LinkState {
        self.state
    }

    pub const fn reconnect_counter(&self) -> u32 {
        self.reconnect_counter
    }

    /// Returns `true` while reconnect attempts are still suppressed.
    pub const fn in_grace_period(&self) -> bool {
        self.grace_counter < self.grace_ticks
    }

    /// Polls the platform and applies the reconnect policy for one tick.
    pub fn step<L: LinkControl + ?Sized>(&mut self, link: &mut L) -> LinkStep {
        let previous = self.state;
        let state = link.poll();
        self.state = state;

        let transition = match (previous.is_up(), state.is_up()) {
            (false, true) => Some(LinkTransition::Established),
            (true, false) => Some(LinkTransition::Lost),
            _ => None,
        };

        let in_grace = self.in_grace_period();
        if in_grace {
            self.grace_counter += 1;
        }

        let mut reconnect_requested = false;
        if state.is_up() {
            self.reconnect_counter = 0;
        } else if !in_grace {
            if self.reconnect_counter == 0 {
                link.request_connect();
                reconnect_requested = true;
            }
            self.reconnect_counter = (self.reconnect_counter + 1) % self.reconnect_cycle;
        }

        LinkStep {
            state,
            transition,
            reconnect_requested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedLink {
        state: LinkState,
        connect_requests: u32,
    }

    impl ScriptedLink {
        fn new(state: LinkState) -> Self {
            Self {
                state,
                connect_requests: 0,
            }
        }
    }

    impl LinkControl for ScriptedLink {
        fn poll(&mut self) -> LinkState {
            self.state
        }

        fn request_connect(&mut self) {
            self.connect_requests += 1;
        }
    }

    #[test]
    fn grace_period_suppresses_reconnects() {
        let mut supervisor = LinkSupervisor::new(4, 10);
        let mut link = ScriptedLink::new(LinkState::Down);

        for _ in 0..10 {
            let step = supervisor.step(&mut link);
            assert!(!step.reconnect_requested);
        }
        assert_eq!(link.connect_requests, 0);
        assert!(!supervisor.in_grace_period());

        let step = supervisor.step(&mut link);
        assert!(step.reconnect_requested);
        assert_eq!(link.connect_requests, 1);
    }

    #[test]
    fn reconnects_once_per_cycle_while_down() {
        let mut supervisor = LinkSupervisor::new(5, 0);
        let mut link = ScriptedLink::new(LinkState::Down);

        for _ in 0..15 {
            supervisor.step(&mut link);
        }
        assert_eq!(link.connect_requests, 3);
    }

    #[test]
    fn connecting_is_retried_on_the_same_cadence() {
        let mut supervisor = LinkSupervisor::new(3, 0);
        let mut link = ScriptedLink::new(LinkState::Connecting);

        for _ in 0..6 {
            supervisor.step(&mut link);
        }
        assert_eq!(link.connect_requests, 2);
    }

    #[test]
    fn link_up_resets_counter_and_reports_transitions() {
        let mut supervisor = LinkSupervisor::new(5, 0);
        let mut link = ScriptedLink::new(LinkState::Down);

        supervisor.step(&mut link);
        supervisor.step(&mut link);
        assert_eq!(supervisor.reconnect_counter(), 2);

        link.state = LinkState::Up;
        let step = supervisor.step(&mut link);
        assert_eq!(step.transition, Some(LinkTransition::Established));
        assert_eq!(supervisor.reconnect_counter(), 0);

        link.state = LinkState::Down;
        let step = supervisor.step(&mut link);
        assert_eq!(step.transition, Some(LinkTransition::Lost));
        assert!(
            step.reconnect_requested,
            "first tick after a drop should retry immediately"
        );
    }
}
