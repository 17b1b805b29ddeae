//! Agent timing, polarity, and identity configuration.
//!
//! Every cadence in the agent is expressed as a number of ticks. The values
//! below are the deployed defaults; [`AgentConfig`] derives the tick counts
//! from the durations so firmware and host targets agree on the same
//! schedule.

use core::time::Duration;

use crate::session::CommandLocation;
use crate::signals::ActiveLevel;

/// Fixed period of one control-loop iteration.
pub const TICK_PERIOD: Duration = Duration::from_millis(50);
/// Heartbeat floor: a report is due at least this often.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(60);
/// Spacing between reconnect attempts while the link is down.
pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(5);
/// Window after boot during which the connect-on-boot request is left alone.
pub const STARTUP_GRACE: Duration = Duration::from_secs(10);
/// How long the actuator holds the power button.
pub const POWER_PULSE: Duration = Duration::from_millis(500);
/// Quiet period after a press so the PC can finish changing power state.
pub const POST_PRESS_COOLDOWN: Duration = Duration::from_secs(10);

/// Power-sense line reads low while the PC is on (SATA rail pulls it down).
pub const POWER_ON_LEVEL: ActiveLevel = ActiveLevel::Low;
/// Chassis switch reads high while the case is open.
pub const CHASSIS_OPEN_LEVEL: ActiveLevel = ActiveLevel::High;

/// Name reported when a deployment does not provide one.
pub const DEFAULT_DEVICE_NAME: &str = "sentinel";

/// Stable identity fields included in every report.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Identity {
    pub name: &'static str,
    pub id: Option<&'static str>,
}

impl Identity {
    /// Identity carrying only a device name.
    pub const fn named(name: &'static str) -> Self {
        Self { name, id: None }
    }

    /// Attaches a stable device id.
    #[must_use]
    pub const fn with_id(mut self, id: &'static str) -> Self {
        self.id = Some(id);
        self
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::named(DEFAULT_DEVICE_NAME)
    }
}

/// Complete agent configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AgentConfig {
    pub tick_period: Duration,
    pub report_interval: Duration,
    pub reconnect_interval: Duration,
    pub startup_grace: Duration,
    pub power_pulse: Duration,
    pub cooldown: Duration,
    pub power_on_level: ActiveLevel,
    pub chassis_open_level: ActiveLevel,
    /// Treat a change of the power-sense line as an urgent report trigger.
    pub report_on_power_change: bool,
    pub command_location: CommandLocation,
    pub identity: Identity,
}

impl AgentConfig {
    /// Deployed defaults.
    pub const fn new() -> Self {
        Self {
            tick_period: TICK_PERIOD,
            report_interval: REPORT_INTERVAL,
            reconnect_interval: RECONNECT_INTERVAL,
            startup_grace: STARTUP_GRACE,
            power_pulse: POWER_PULSE,
            cooldown: POST_PRESS_COOLDOWN,
            power_on_level: POWER_ON_LEVEL,
            chassis_open_level: CHASSIS_OPEN_LEVEL,
            report_on_power_change: true,
            command_location: CommandLocation::TopLevel,
            identity: Identity::named(DEFAULT_DEVICE_NAME),
        }
    }

    #[must_use]
    pub const fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    #[must_use]
    pub const fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    #[must_use]
    pub const fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    #[must_use]
    pub const fn with_power_pulse(mut self, pulse: Duration) -> Self {
        self.power_pulse = pulse;
        self
    }

    #[must_use]
    pub const fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    #[must_use]
    pub const fn with_polarity(mut self, power_on: ActiveLevel, chassis_open: ActiveLevel) -> Self {
        self.power_on_level = power_on;
        self.chassis_open_level = chassis_open;
        self
    }

    #[must_use]
    pub const fn with_command_location(mut self, location: CommandLocation) -> Self {
        self.command_location = location;
        self
    }

    #[must_use]
    pub const fn with_power_change_reports(mut self, enabled: bool) -> Self {
        self.report_on_power_change = enabled;
        self
    }

    /// Ticks between heartbeat reports (M).
    #[must_use]
    pub fn report_cycle_ticks(&self) -> u32 {
        ticks_for(self.report_interval, self.tick_period)
    }

    /// Ticks between reconnect attempts (N).
    #[must_use]
    pub fn reconnect_cycle_ticks(&self) -> u32 {
        ticks_for(self.reconnect_interval, self.tick_period)
    }

    /// Ticks in the startup grace period; zero disables it.
    #[must_use]
    pub fn grace_ticks(&self) -> u32 {
        span_ticks(self.startup_grace, self.tick_period)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Whole ticks that fit in `span`.
fn span_ticks(span: Duration, tick: Duration) -> u32 {
    let tick_us = tick.as_micros();
    if tick_us == 0 {
        return 0;
    }
    u32::try_from(span.as_micros() / tick_us).unwrap_or(u32::MAX)
}

/// Modulus for a cyclic counter; a zero-length cycle would never fire.
fn ticks_for(span: Duration, tick: Duration) -> u32 {
    let count = span_ticks(span, tick);
    if count == 0 { 1 } else { count }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_derive_deployed_cadences() {
        let config = AgentConfig::new();
        assert_eq!(config.report_cycle_ticks(), 1_200);
        assert_eq!(config.reconnect_cycle_ticks(), 100);
        assert_eq!(config.grace_ticks(), 200);
    }

    #[test]
    fn cadences_never_collapse_to_zero() {
        let config = AgentConfig::new()
            .with_tick_period(Duration::from_secs(1))
            .with_reconnect_interval(Duration::from_millis(10))
            .with_startup_grace(Duration::ZERO);
        assert_eq!(config.reconnect_cycle_ticks(), 1);
        assert_eq!(config.grace_ticks(), 0);

        let zero_tick = AgentConfig::new().with_tick_period(Duration::ZERO);
        assert_eq!(zero_tick.report_cycle_ticks(), 1);
    }

    #[test]
    fn oversized_spans_saturate() {
        let config = AgentConfig::new()
            .with_tick_period(Duration::from_micros(1))
            .with_report_interval(Duration::from_secs(1 << 40))
            .with_startup_grace(Duration::from_secs(u64::from(u32::MAX)));
        assert_eq!(config.report_cycle_ticks(), u32::MAX);
        assert_eq!(config.grace_ticks(), u32::MAX);
    }

    #[test]
    fn identity_builder_keeps_name() {
        let identity = Identity::named("office-pc").with_id("a1");
        assert_eq!(identity.name, "office-pc");
        assert_eq!(identity.id, Some("a1"));
    }
}
