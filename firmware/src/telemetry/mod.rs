//! Diagnostics history and logging for the tick loop.
//!
//! Every event a tick produces is kept in a fixed-capacity ring for later
//! inspection and mirrored to defmt (or stdout on host builds) so bring-up can
//! follow the agent over RTT.

use sentinel_core::agent::TickReport;
use sentinel_core::session::SessionId;
use sentinel_core::telemetry::{AgentEvent, EventLog, EventRecord};

use crate::clock::AgentInstant;
use crate::modem::ModemError;

/// Total number of diagnostics retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

pub struct TelemetryRecorder {
    log: EventLog<AgentInstant, TELEMETRY_RING_CAPACITY>,
}

impl TelemetryRecorder {
    pub const fn new() -> Self {
        Self {
            log: EventLog::new(),
        }
    }

    /// Stores and logs every event from one tick.
    pub fn record_tick(&mut self, report: &TickReport<AgentInstant>, timestamp: AgentInstant) {
        for event in &report.events {
            self.log.record(*event, timestamp);
            log_event(event, timestamp);
        }
    }

    pub fn latest(&self) -> Option<&EventRecord<AgentInstant>> {
        self.log.latest()
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }
}

impl Default for TelemetryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "none")]
fn log_event(event: &AgentEvent, timestamp: AgentInstant) {
    if event.is_warning() {
        defmt::warn!(
            "agent: {} t={}ms",
            defmt::Display2Format(event),
            timestamp.as_millis()
        );
    } else {
        defmt::info!(
            "agent: {} t={}ms",
            defmt::Display2Format(event),
            timestamp.as_millis()
        );
    }
}

#[cfg(not(target_os = "none"))]
fn log_event(event: &AgentEvent, timestamp: AgentInstant) {
    println!("agent: {event} t={}ms", timestamp.as_millis());
}

#[cfg(target_os = "none")]
pub fn log_boot(session_id: &SessionId, name: &str) {
    defmt::info!(
        "agent: boot pc={} session={}",
        name,
        session_id.as_str()
    );
}

#[cfg(not(target_os = "none"))]
pub fn log_boot(session_id: &SessionId, name: &str) {
    println!("agent: boot pc={name} session={session_id}");
}

#[cfg(target_os = "none")]
pub fn log_modem_error(context: &str, error: ModemError) {
    defmt::warn!("modem: {} ({})", context, defmt::Display2Format(&error));
}

#[cfg(not(target_os = "none"))]
pub fn log_modem_error(context: &str, error: ModemError) {
    println!("modem: {context} ({error})");
}
