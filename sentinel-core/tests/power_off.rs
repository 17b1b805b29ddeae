mod common;

use core::time::Duration;

use common::{ACK, Harness, MockInstant, POWER_OFF, Reply};
use sentinel_core::agent::{ReportAttempt, TickOutcome};
use sentinel_core::command::{ActuatorAction, Execution};
use sentinel_core::config::{AgentConfig, POST_PRESS_COOLDOWN, POWER_PULSE};
use sentinel_core::session::{CommandLocation, CommandWrapper};
use sentinel_core::telemetry::AgentEvent;

#[test]
fn power_off_pulses_once_then_cools_down() {
    let mut harness = Harness::new(AgentConfig::new());
    harness.platform.reply = POWER_OFF;

    let events = harness.tick();
    assert!(events.ends_with(&[AgentEvent::PowerButtonPulsed, AgentEvent::CooldownStarted]));
    assert_eq!(
        harness.platform.actions,
        vec![ActuatorAction::Press, ActuatorAction::Release]
    );
    assert_eq!(harness.platform.held, POWER_PULSE);

    let deadline = MockInstant::default() + POWER_PULSE + POST_PRESS_COOLDOWN;
    assert_eq!(harness.state.cooldown.deadline(), Some(deadline));

    harness.platform.reply = POWER_OFF;
    harness.platform.chassis_high = true;
    let counter = harness.state.scheduler.counter();
    while harness.now < deadline {
        assert!(harness.tick().is_empty());
    }
    assert_eq!(harness.platform.posts(), 1);
    assert_eq!(harness.platform.presses(), 1);
    assert_eq!(harness.state.scheduler.counter(), counter, "counter frozen");

    harness.platform.reply = ACK;
    let resumed = harness.tick();
    assert_eq!(resumed[0], AgentEvent::CooldownEnded);
    assert!(resumed.contains(&AgentEvent::ChassisOpened));
    assert_eq!(harness.platform.posts(), 2);
    assert_eq!(harness.platform.presses(), 1);
}

#[test]
fn cooling_tick_reports_outcome() {
    let config = AgentConfig::new();
    let mut harness = Harness::new(config);
    harness.platform.reply = POWER_OFF;
    harness.tick();

    let tick = harness
        .agent
        .tick(harness.state, &mut harness.platform, harness.now);
    assert_eq!(tick.report.outcome, TickOutcome::CoolingDown);
    assert!(tick.report.events.is_empty());
    assert_eq!(tick.state, harness.state);
}

#[test]
fn malformed_command_is_acknowledged_without_pulse() {
    let mut harness = Harness::new(AgentConfig::new());
    harness.platform.reply = Reply::Status(200, br#"{"turnOffPC":"now"}"#);

    let events = harness.tick();
    assert_eq!(events.last(), Some(&AgentEvent::MalformedCommand));
    assert!(harness.platform.actions.is_empty());
    assert_eq!(harness.state.cooldown.deadline(), None);
    assert!(!harness.state.latch.latched().alive);
}

#[test]
fn rejected_status_keeps_latch() {
    let mut harness = Harness::new(AgentConfig::new());
    harness.platform.reply = Reply::Status(503, b"");

    harness.tick();
    assert!(harness.state.latch.latched().alive);
    assert!(harness.platform.actions.is_empty());
}

#[test]
fn nested_command_location_is_honored() {
    let config =
        AgentConfig::new().with_command_location(CommandLocation::Nested(CommandWrapper::Data));
    let mut harness = Harness::new(config);

    harness.platform.reply = POWER_OFF;
    harness.tick();
    assert!(harness.platform.actions.is_empty(), "top-level flag ignored");

    harness.platform.reply = Reply::Status(200, br#"{"data":{"turnOffPC":true}}"#);
    harness.platform.power_high = true;
    let tick = harness
        .agent
        .tick(harness.state, &mut harness.platform, harness.now);
    match tick.report.outcome {
        TickOutcome::Processed(ReportAttempt::Delivered {
            execution: Execution::PoweredOff { cooldown_until },
            ..
        }) => assert_eq!(
            cooldown_until,
            harness.now + Duration::from_millis(500) + Duration::from_secs(10)
        ),
        other => panic!("expected power-off, got {other:?}"),
    }
    assert_eq!(harness.platform.presses(), 1);
}
