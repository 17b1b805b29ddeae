#![no_std]

// Portable logic for the PC sentinel agent.
//
// Everything here builds without the standard library so the same state
// machine runs in the firmware and in the host emulator. Hardware and network
// access happen only through the port traits the targets implement.

pub mod agent;
pub mod command;
pub mod config;
pub mod cooldown;
pub mod latch;
pub mod link;
pub mod schedule;
pub mod session;
pub mod signals;
pub mod telemetry;

pub use agent::{Agent, AgentState, Platform, ReportAttempt, Tick, TickOutcome, TickReport};
pub use config::{AgentConfig, Identity};
pub use telemetry::{AgentEvent, EventLog};
