#![allow(dead_code)]

use core::ops::Add;
use core::time::Duration;

use sentinel_core::agent::{Agent, AgentState, Tick};
use sentinel_core::command::{ActuatorAction, ActuatorDriver};
use sentinel_core::config::AgentConfig;
use sentinel_core::link::{LinkControl, LinkState};
use sentinel_core::session::{HttpReply, ReportTransport, SessionId};
use sentinel_core::signals::{InputLine, Level, SignalInputs};
use sentinel_core::telemetry::AgentEvent;

/// Microsecond clock for driving the agent in tests.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct MockInstant(pub u64);

impl MockInstant {
    pub fn from_millis(ms: u64) -> Self {
        Self(ms * 1_000)
    }
}

impl Add<Duration> for MockInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + u64::try_from(rhs.as_micros()).expect("duration fits"))
    }
}

/// Service behavior for the next reports.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Unreachable,
    Status(u16, &'static [u8]),
}

pub const ACK: Reply = Reply::Status(200, b"{}");
pub const POWER_OFF: Reply = Reply::Status(200, br#"{"turnOffPC":true}"#);

pub struct MockPlatform {
    pub link: LinkState,
    pub connect_requests: u32,
    pub power_high: bool,
    pub chassis_high: bool,
    pub reply: Reply,
    pub bodies: Vec<String>,
    pub actions: Vec<ActuatorAction>,
    pub held: Duration,
}

impl MockPlatform {
    /// PC on (power-sense low), chassis closed, link up, service acknowledging.
    pub fn new() -> Self {
        Self {
            link: LinkState::Up,
            connect_requests: 0,
            power_high: false,
            chassis_high: false,
            reply: ACK,
            bodies: Vec::new(),
            actions: Vec::new(),
            held: Duration::ZERO,
        }
    }

    pub fn posts(&self) -> usize {
        self.bodies.len()
    }

    pub fn presses(&self) -> usize {
        self.actions
            .iter()
            .filter(|action| **action == ActuatorAction::Press)
            .count()
    }
}

impl SignalInputs for MockPlatform {
    fn read(&mut self, line: InputLine) -> Level {
        match line {
            InputLine::PowerSense => Level::from_high(self.power_high),
            InputLine::ChassisSense => Level::from_high(self.chassis_high),
        }
    }
}

impl LinkControl for MockPlatform {
    fn poll(&mut self) -> LinkState {
        self.link
    }

    fn request_connect(&mut self) {
        self.connect_requests += 1;
    }
}

impl ReportTransport for MockPlatform {
    type Error = ();

    fn post(&mut self, body: &[u8], response: &mut [u8]) -> Result<HttpReply, ()> {
        self.bodies
            .push(String::from_utf8(body.to_vec()).expect("utf-8 body"));
        match self.reply {
            Reply::Unreachable => Err(()),
            Reply::Status(status, reply) => {
                response[..reply.len()].copy_from_slice(reply);
                Ok(HttpReply::new(status, reply.len()))
            }
        }
    }
}

impl ActuatorDriver for MockPlatform {
    fn apply(&mut self, action: ActuatorAction) {
        self.actions.push(action);
    }

    fn hold(&mut self, duration: Duration) {
        self.held += duration;
    }
}

/// Agent plus state advanced in fixed steps.
pub struct Harness {
    pub agent: Agent,
    pub state: AgentState<MockInstant>,
    pub platform: MockPlatform,
    pub now: MockInstant,
    pub ticks: u32,
}

impl Harness {
    pub fn new(config: AgentConfig) -> Self {
        let agent = Agent::new(config, SessionId::from_seed(7));
        let mut platform = MockPlatform::new();
        let state = agent.boot(&mut platform);
        Self {
            agent,
            state,
            platform,
            now: MockInstant::default(),
            ticks: 0,
        }
    }

    /// Runs one tick and returns its events.
    pub fn tick(&mut self) -> Vec<AgentEvent> {
        let Tick { state, report } = self.agent.tick(self.state, &mut self.platform, self.now);
        self.state = state;
        self.ticks += 1;
        self.now = self.now + self.agent.config().tick_period;
        report.events.iter().copied().collect()
    }

    pub fn run(&mut self, ticks: u32) -> Vec<AgentEvent> {
        (0..ticks).flat_map(|_| self.tick()).collect()
    }
}
