//! Simulated PC, access point, and management service around the agent.

use std::fmt;
use std::ops::Add;
use std::time::Duration;

use sentinel_core::command::{ActuatorAction, ActuatorDriver};
use sentinel_core::link::{LinkControl, LinkState};
use sentinel_core::session::{HttpReply, ReportTransport};
use sentinel_core::signals::{ActiveLevel, InputLine, Level, SignalInputs};

use crate::grammar::ServerMode;

/// Link polls a connect request takes before the association completes.
pub const CONNECT_POLLS: u32 = 3;

/// Simulated time since the emulator booted.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct SimInstant(Duration);

impl SimInstant {
    pub const BOOT: Self = Self(Duration::ZERO);

    pub const fn since_boot(self) -> Duration {
        self.0
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl fmt::Display for SimInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{:.3}s", self.0.as_secs_f64())
    }
}

/// Transport failures of the simulated network.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SimError {
    NoRoute,
    ConnectionRefused,
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::NoRoute => f.write_str("no route to service"),
            SimError::ConnectionRefused => f.write_str("connection refused"),
        }
    }
}

pub struct World {
    power_on_level: ActiveLevel,
    chassis_open_level: ActiveLevel,
    pc_powered: bool,
    chassis_open: bool,
    button_pressed: bool,
    pulses: u32,
    network_available: bool,
    link: LinkState,
    polls_until_up: u32,
    connect_requests: u32,
    server_mode: ServerMode,
    requests: u32,
    last_request: Option<String>,
    blocked: Duration,
}

impl World {
    /// Powered PC, closed chassis, reachable access point, healthy service.
    pub fn new(power_on_level: ActiveLevel, chassis_open_level: ActiveLevel) -> Self {
        Self {
            power_on_level,
            chassis_open_level,
            pc_powered: true,
            chassis_open: false,
            button_pressed: false,
            pulses: 0,
            network_available: true,
            link: LinkState::Down,
            polls_until_up: 0,
            connect_requests: 0,
            server_mode: ServerMode::Ok,
            requests: 0,
            last_request: None,
            blocked: Duration::ZERO,
        }
    }

    pub fn set_power(&mut self, on: bool) {
        self.pc_powered = on;
    }

    pub fn set_chassis(&mut self, open: bool) {
        self.chassis_open = open;
    }

    /// Makes the access point reachable, or drops the association.
    pub fn set_network(&mut self, available: bool) {
        self.network_available = available;
        if !available {
            self.link = LinkState::Down;
        }
    }

    pub fn set_server_mode(&mut self, mode: ServerMode) {
        self.server_mode = mode;
    }

    /// Time spent inside blocking port calls since the last call.
    pub fn take_blocked(&mut self) -> Duration {
        std::mem::take(&mut self.blocked)
    }

    pub fn pc_powered(&self) -> bool {
        self.pc_powered
    }

    pub fn chassis_open(&self) -> bool {
        self.chassis_open
    }

    pub fn network_available(&self) -> bool {
        self.network_available
    }

    pub fn server_mode(&self) -> ServerMode {
        self.server_mode
    }

    pub fn pulses(&self) -> u32 {
        self.pulses
    }

    pub fn connect_requests(&self) -> u32 {
        self.connect_requests
    }

    pub fn requests(&self) -> u32 {
        self.requests
    }

    pub fn last_request(&self) -> Option<&str> {
        self.last_request.as_deref()
    }
}

impl SignalInputs for World {
    fn read(&mut self, line: InputLine) -> Level {
        let (active, polarity) = match line {
            InputLine::PowerSense => (self.pc_powered, self.power_on_level),
            InputLine::ChassisSense => (self.chassis_open, self.chassis_open_level),
        };
        if active {
            polarity.active()
        } else {
            polarity.inactive()
        }
    }
}

impl LinkControl for World {
    fn poll(&mut self) -> LinkState {
        if !self.network_available {
            self.link = LinkState::Down;
        } else if self.link == LinkState::Connecting {
            if self.polls_until_up == 0 {
                self.link = LinkState::Up;
            } else {
                self.polls_until_up -= 1;
            }
        }
        self.link
    }

    fn request_connect(&mut self) {
        self.connect_requests += 1;
        if self.network_available && self.link != LinkState::Up {
            self.link = LinkState::Connecting;
            self.polls_until_up = CONNECT_POLLS;
        }
    }
}

impl ReportTransport for World {
    type Error = SimError;

    fn post(&mut self, body: &[u8], response: &mut [u8]) -> Result<HttpReply, SimError> {
        self.requests += 1;
        self.last_request = Some(String::from_utf8_lossy(body).into_owned());
        if self.link != LinkState::Up {
            return Err(SimError::NoRoute);
        }

        let (status, reply): (u16, &[u8]) = match self.server_mode {
            ServerMode::Ok => (200, br#"{"status":"ok"}"#),
            ServerMode::Down => return Err(SimError::ConnectionRefused),
            ServerMode::Garbage => (200, b"<html>502 Bad Gateway</html>"),
            ServerMode::Malformed => (200, br#"{"turnOffPC":"soon"}"#),
            ServerMode::PowerOff => {
                self.server_mode = ServerMode::Ok;
                (200, br#"{"turnOffPC":true}"#)
            }
            ServerMode::Reject(status) => (status, b""),
        };

        let len = reply.len().min(response.len());
        response[..len].copy_from_slice(&reply[..len]);
        let mut http = HttpReply::new(status, len);
        http.truncated = len < reply.len();
        Ok(http)
    }
}

impl ActuatorDriver for World {
    fn apply(&mut self, action: ActuatorAction) {
        match action {
            ActuatorAction::Press => self.button_pressed = true,
            ActuatorAction::Release => {
                // A momentary front-panel press toggles the PC's power state.
                if std::mem::take(&mut self.button_pressed) {
                    self.pulses += 1;
                    self.pc_powered = !self.pc_powered;
                }
            }
        }
    }

    fn hold(&mut self, duration: Duration) {
        self.blocked += duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::config::{CHASSIS_OPEN_LEVEL, POWER_ON_LEVEL};

    fn world() -> World {
        World::new(POWER_ON_LEVEL, CHASSIS_OPEN_LEVEL)
    }

    #[test]
    fn inputs_follow_configured_polarity() {
        let mut world = world();
        assert_eq!(world.read(InputLine::PowerSense), Level::Low);
        assert_eq!(world.read(InputLine::ChassisSense), Level::Low);
        world.set_chassis(true);
        assert_eq!(world.read(InputLine::ChassisSense), Level::High);
    }

    #[test]
    fn connect_completes_after_a_few_polls() {
        let mut world = world();
        world.request_connect();
        for _ in 0..CONNECT_POLLS {
            assert_eq!(world.poll(), LinkState::Connecting);
        }
        assert_eq!(world.poll(), LinkState::Up);

        world.set_network(false);
        assert_eq!(world.poll(), LinkState::Down);
        world.request_connect();
        assert_eq!(world.poll(), LinkState::Down);
    }

    #[test]
    fn power_off_reply_is_one_shot() {
        let mut world = world();
        world.request_connect();
        for _ in 0..=CONNECT_POLLS {
            world.poll();
        }
        world.set_server_mode(ServerMode::PowerOff);

        let mut response = [0u8; 64];
        let reply = world.post(b"{}", &mut response).expect("reply");
        assert_eq!(&response[..reply.body_len], br#"{"turnOffPC":true}"#);
        assert_eq!(world.server_mode(), ServerMode::Ok);
    }

    #[test]
    fn button_pulse_toggles_power() {
        let mut world = world();
        world.apply(ActuatorAction::Press);
        world.hold(Duration::from_millis(500));
        world.apply(ActuatorAction::Release);
        assert!(!world.pc_powered());
        assert_eq!(world.pulses(), 1);
        assert_eq!(world.take_blocked(), Duration::from_millis(500));
        assert_eq!(world.take_blocked(), Duration::ZERO);
    }
}
