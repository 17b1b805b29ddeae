//! The per-tick control loop tying the components together.
//!
//! All mutable bookkeeping lives in one [`AgentState`] value. Targets call
//! [`Agent::tick`] once per period with the state returned by the previous
//! call, their hardware ports, and the current instant. The tick never blocks
//! except inside the report round trip and the actuator pulse.

use core::{ops::Add, time::Duration};

use heapless::Vec;

use crate::command::{ActuatorDriver, CommandExecutor, Execution};
use crate::config::AgentConfig;
use crate::cooldown::CooldownWindow;
use crate::latch::{EventLatch, LatchedState};
use crate::link::{LinkControl, LinkSupervisor, LinkTransition};
use crate::schedule::{ReportScheduler, ReportTrigger};
use crate::session::{RemoteSession, ReportError, ReportTransport, SessionId};
use crate::signals::{Sample, SignalInputs, SignalSampler};
use crate::telemetry::AgentEvent;

/// Maximum diagnostics a single tick can produce.
pub const TICK_EVENT_CAPACITY: usize = 8;

/// Every port the agent needs from its target.
pub trait Platform: SignalInputs + LinkControl + ReportTransport + ActuatorDriver {}

impl<T> Platform for T where T: SignalInputs + LinkControl + ReportTransport + ActuatorDriver + ?Sized
{}

/// Counters and flags carried from one tick to the next.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AgentState<I> {
    pub link: LinkSupervisor,
    pub latch: EventLatch,
    pub scheduler: ReportScheduler,
    pub cooldown: CooldownWindow<I>,
    /// Inputs seen on the last processed tick, used for edge diagnostics.
    pub last_sample: Option<Sample>,
}

/// What happened to the report decision on a processed tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReportAttempt<I> {
    NotDue,
    /// Due, but the link was not up.
    Deferred(ReportTrigger),
    Delivered {
        trigger: ReportTrigger,
        latched: LatchedState,
        execution: Execution<I>,
    },
    Failed {
        trigger: ReportTrigger,
        error: ReportError,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TickOutcome<I> {
    /// The cooldown window was active; nothing was sampled or reported.
    CoolingDown,
    Processed(ReportAttempt<I>),
}

impl<I> TickOutcome<I> {
    pub const fn is_cooling_down(&self) -> bool {
        matches!(self, TickOutcome::CoolingDown)
    }

    pub const fn attempt(&self) -> Option<&ReportAttempt<I>> {
        match self {
            TickOutcome::CoolingDown => None,
            TickOutcome::Processed(attempt) => Some(attempt),
        }
    }
}

/// Outcome plus the diagnostics produced along the way.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TickReport<I> {
    pub outcome: TickOutcome<I>,
    pub events: Vec<AgentEvent, TICK_EVENT_CAPACITY>,
}

impl<I> TickReport<I> {
    fn new(outcome: TickOutcome<I>) -> Self {
        Self {
            outcome,
            events: Vec::new(),
        }
    }
}

/// Result of one tick: the state to pass to the next one and what happened.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tick<I> {
    pub state: AgentState<I>,
    pub report: TickReport<I>,
}

/// Immutable per-boot agent: configuration plus the components derived from it.
#[derive(Clone, Debug)]
pub struct Agent {
    config: AgentConfig,
    sampler: SignalSampler,
    session: RemoteSession,
    executor: CommandExecutor,
}

impl Agent {
    pub fn new(config: AgentConfig, session_id: SessionId) -> Self {
        Self {
            sampler: SignalSampler::new(config.power_on_level, config.chassis_open_level),
            session: RemoteSession::new(config.identity, session_id, config.command_location),
            executor: CommandExecutor::new(config.power_pulse, config.cooldown),
            config,
        }
    }

    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub const fn session(&self) -> &RemoteSession {
        &self.session
    }

    /// Fresh state: link down, latch empty, heartbeat due on the first tick.
    pub fn initial_state<I>(&self) -> AgentState<I>
    where
        I: Copy + Ord,
    {
        AgentState {
            link: LinkSupervisor::new(
                self.config.reconnect_cycle_ticks(),
                self.config.grace_ticks(),
            ),
            latch: EventLatch::new(),
            scheduler: ReportScheduler::new(self.config.report_cycle_ticks()),
            cooldown: CooldownWindow::new(),
            last_sample: None,
        }
    }

    /// Issues the connect-on-boot request and returns the initial state.
    ///
    /// The startup grace period starts counting on the first tick so this
    /// request has time to associate before the supervisor retries.
    pub fn boot<L, I>(&self, link: &mut L) -> AgentState<I>
    where
        L: LinkControl + ?Sized,
        I: Copy + Ord,
    {
        link.request_connect();
        self.initial_state()
    }

    /// Runs one control-loop iteration at `now`.
    pub fn tick<P, I>(&self, mut state: AgentState<I>, platform: &mut P, now: I) -> Tick<I>
    where
        P: Platform + ?Sized,
        I: Copy + Ord + Add<Duration, Output = I>,
    {
        if state.cooldown.is_active(now) {
            return Tick {
                state,
                report: TickReport::new(TickOutcome::CoolingDown),
            };
        }

        let mut report = TickReport::new(TickOutcome::Processed(ReportAttempt::NotDue));
        let events = &mut report.events;

        if state.cooldown.expire(now) {
            emit(events, AgentEvent::CooldownEnded);
        }

        let link = state.link.step(platform);
        match link.transition {
            Some(LinkTransition::Established) => emit(events, AgentEvent::LinkEstablished),
            Some(LinkTransition::Lost) => emit(events, AgentEvent::LinkLost),
            None => {}
        }
        if link.reconnect_requested {
            emit(events, AgentEvent::ReconnectRequested);
        }

        let sample = self.sampler.sample(platform);
        let previous = state.last_sample;
        if sample.chassis_open && !previous.is_some_and(|last| last.chassis_open) {
            emit(events, AgentEvent::ChassisOpened);
        }
        if let Some(last) = previous
            && last.power_on != sample.power_on
        {
            emit(
                events,
                AgentEvent::PowerChanged {
                    on: sample.power_on,
                },
            );
        }
        state.last_sample = Some(sample);

        state.latch.resolve_suppression(sample.chassis_open);
        state.latch.observe(
            sample.power_on,
            sample.chassis_open,
            self.config.report_on_power_change,
        );

        let attempt = match state.scheduler.due(state.latch.is_report_required()) {
            None => ReportAttempt::NotDue,
            Some(trigger) if !link.state.is_up() => {
                emit(events, AgentEvent::ReportDeferred(trigger));
                ReportAttempt::Deferred(trigger)
            }
            Some(trigger) => self.report(&mut state, platform, trigger, now, events),
        };

        state.scheduler.advance();
        report.outcome = TickOutcome::Processed(attempt);
        Tick { state, report }
    }

    fn report<P, I>(
        &self,
        state: &mut AgentState<I>,
        platform: &mut P,
        trigger: ReportTrigger,
        now: I,
        events: &mut Vec<AgentEvent, TICK_EVENT_CAPACITY>,
    ) -> ReportAttempt<I>
    where
        P: Platform + ?Sized,
        I: Copy + Ord + Add<Duration, Output = I>,
    {
        let latched = state.latch.latched();
        match self.session.report(platform, latched) {
            Ok(ack) => {
                emit(events, AgentEvent::ReportDelivered { trigger, latched });
                let execution = self.executor.execute(
                    ack,
                    latched,
                    &mut state.latch,
                    &mut state.cooldown,
                    platform,
                    now,
                );
                match execution {
                    Execution::Acknowledged => {}
                    Execution::IgnoredMalformed => emit(events, AgentEvent::MalformedCommand),
                    Execution::PoweredOff { .. } => {
                        emit(events, AgentEvent::PowerButtonPulsed);
                        emit(events, AgentEvent::CooldownStarted);
                    }
                }
                ReportAttempt::Delivered {
                    trigger,
                    latched,
                    execution,
                }
            }
            Err(error) => {
                emit(events, AgentEvent::ReportFailed { trigger, error });
                ReportAttempt::Failed { trigger, error }
            }
        }
    }
}

fn emit(events: &mut Vec<AgentEvent, TICK_EVENT_CAPACITY>, event: AgentEvent) {
    // The capacity covers the longest possible tick; overflow drops the event.
    let _ = events.push(event);
}
