//! Diagnostics events emitted by the agent and a bounded history of them.
//!
//! The core never logs by itself. Each tick returns the events it produced;
//! the firmware mirrors them to defmt and the emulator prints them. Targets
//! that want a status view keep the most recent ones in an [`EventLog`].

use core::fmt;

use heapless::{HistoryBuf, OldestOrdered};

use crate::latch::LatchedState;
use crate::schedule::ReportTrigger;
use crate::session::ReportError;

/// Identifier assigned to recorded events.
pub type EventId = u32;

/// Diagnostics emitted while processing a tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AgentEvent {
    LinkEstablished,
    LinkLost,
    ReconnectRequested,
    ChassisOpened,
    PowerChanged { on: bool },
    /// A report was due but the link was not up.
    ReportDeferred(ReportTrigger),
    ReportDelivered {
        trigger: ReportTrigger,
        latched: LatchedState,
    },
    ReportFailed {
        trigger: ReportTrigger,
        error: ReportError,
    },
    /// Acknowledged report whose command field could not be interpreted.
    MalformedCommand,
    PowerButtonPulsed,
    CooldownStarted,
    CooldownEnded,
}

impl AgentEvent {
    const LINK_ESTABLISHED: u16 = 0x0001;
    const LINK_LOST: u16 = 0x0002;
    const RECONNECT_REQUESTED: u16 = 0x0003;
    const CHASSIS_OPENED: u16 = 0x0010;
    const POWER_CHANGED: u16 = 0x0011;
    const REPORT_DEFERRED: u16 = 0x0020;
    const REPORT_DELIVERED: u16 = 0x0021;
    const REPORT_FAILED: u16 = 0x0022;
    const MALFORMED_COMMAND: u16 = 0x0023;
    const POWER_BUTTON_PULSED: u16 = 0x0030;
    const COOLDOWN_STARTED: u16 = 0x0031;
    const COOLDOWN_ENDED: u16 = 0x0032;

    /// Compact discriminant for transports that cannot carry text.
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            AgentEvent::LinkEstablished => Self::LINK_ESTABLISHED,
            AgentEvent::LinkLost => Self::LINK_LOST,
            AgentEvent::ReconnectRequested => Self::RECONNECT_REQUESTED,
            AgentEvent::ChassisOpened => Self::CHASSIS_OPENED,
            AgentEvent::PowerChanged { .. } => Self::POWER_CHANGED,
            AgentEvent::ReportDeferred(_) => Self::REPORT_DEFERRED,
            AgentEvent::ReportDelivered { .. } => Self::REPORT_DELIVERED,
            AgentEvent::ReportFailed { .. } => Self::REPORT_FAILED,
            AgentEvent::MalformedCommand => Self::MALFORMED_COMMAND,
            AgentEvent::PowerButtonPulsed => Self::POWER_BUTTON_PULSED,
            AgentEvent::CooldownStarted => Self::COOLDOWN_STARTED,
            AgentEvent::CooldownEnded => Self::COOLDOWN_ENDED,
        }
    }

    /// Returns `true` for events worth a warning rather than an info line.
    #[must_use]
    pub const fn is_warning(&self) -> bool {
        matches!(
            self,
            AgentEvent::LinkLost
                | AgentEvent::ReportFailed { .. }
                | AgentEvent::MalformedCommand
        )
    }
}

impl fmt::Display for ReportTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportTrigger::Heartbeat => "heartbeat",
            ReportTrigger::Event => "event",
        })
    }
}

impl fmt::Display for AgentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentEvent::LinkEstablished => f.write_str("link-established"),
            AgentEvent::LinkLost => f.write_str("link-lost"),
            AgentEvent::ReconnectRequested => f.write_str("reconnect-requested"),
            AgentEvent::ChassisOpened => f.write_str("chassis-opened"),
            AgentEvent::PowerChanged { on } => {
                write!(f, "power-changed {}", if *on { "on" } else { "off" })
            }
            AgentEvent::ReportDeferred(trigger) => write!(f, "report-deferred {trigger} link-down"),
            AgentEvent::ReportDelivered { trigger, latched } => write!(
                f,
                "report-delivered {trigger} alive={} opened={}",
                latched.alive, latched.opened
            ),
            AgentEvent::ReportFailed { trigger, error } => {
                write!(f, "report-failed {trigger} ({error})")
            }
            AgentEvent::MalformedCommand => f.write_str("malformed-command ignored"),
            AgentEvent::PowerButtonPulsed => f.write_str("power-button-pulsed"),
            AgentEvent::CooldownStarted => f.write_str("cooldown-started"),
            AgentEvent::CooldownEnded => f.write_str("cooldown-ended"),
        }
    }
}

/// Total number of events retained by default.
pub const EVENT_LOG_CAPACITY: usize = 64;

/// Event stored in the history ring.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EventRecord<I> {
    pub id: EventId,
    pub timestamp: I,
    pub event: AgentEvent,
}

/// Fixed-size history of recent events.
pub struct EventLog<I, const CAPACITY: usize = EVENT_LOG_CAPACITY>
where
    I: Copy,
{
    ring: HistoryBuf<EventRecord<I>, CAPACITY>,
    next_event_id: EventId,
}

impl<I, const CAPACITY: usize> EventLog<I, CAPACITY>
where
    I: Copy,
{
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Stores `event`, evicting the oldest entry when full.
    pub fn record(&mut self, event: AgentEvent, timestamp: I) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.ring.write(EventRecord {
            id,
            timestamp,
            event,
        });
        id
    }

    /// Stores every event in `events` with the same timestamp.
    pub fn record_all(&mut self, events: &[AgentEvent], timestamp: I) {
        for event in events {
            self.record(*event, timestamp);
        }
    }

    pub fn oldest_first(&self) -> OldestOrdered<'_, EventRecord<I>> {
        self.ring.oldest_ordered()
    }

    pub fn latest(&self) -> Option<&EventRecord<I>> {
        self.ring.recent()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl<I, const CAPACITY: usize> Default for EventLog<I, CAPACITY>
where
    I: Copy,
{
    fn default() -> Self {
        Self::new()
    }
}
