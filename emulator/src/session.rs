use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use sentinel_core::agent::{Agent, AgentState, Tick};
use sentinel_core::config::{AgentConfig, Identity};
use sentinel_core::session::SessionId;
use sentinel_core::telemetry::EventLog;

use crate::grammar::{ChassisAction, Command, parse_command};
use crate::world::{SimInstant, World};

/// Events kept for the `history` command.
const HISTORY_CAPACITY: usize = 128;
const DEFAULT_HISTORY_LINES: usize = 10;

pub const EMULATED_PC_NAME: &str = "emulated-pc";

pub const HELP_TOPICS: &[(&str, &str)] = &[
    ("tick", "tick [count]                  - run control-loop iterations"),
    ("run", "run <n>(ms|s|m)               - run for a span of simulated time"),
    ("power", "power on|off                  - set the PC's power-sense line"),
    (
        "chassis",
        "chassis open|closed|blip      - move the intrusion switch",
    ),
    ("network", "network up|down               - toggle the access point"),
    (
        "server",
        "server ok|down|garbage|malformed|power-off|reject <status>\n                                - set how the service answers",
    ),
    ("status", "status                        - display agent and world state"),
    ("history", "history [count]               - show recent agent events"),
    ("help", "help [topic]                  - show help for a command"),
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    Interactive,
    Intrusion,
    Outage,
    PowerOff,
}

impl TranscriptProfile {
    /// Default transcript location; interactive sessions only log on request.
    pub fn log_path(self) -> Option<&'static str> {
        match self {
            TranscriptProfile::Interactive => None,
            TranscriptProfile::Intrusion => Some("evidence/emulator-intrusion.log"),
            TranscriptProfile::Outage => Some("evidence/emulator-outage.log"),
            TranscriptProfile::PowerOff => Some("evidence/emulator-power-off.log"),
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Interactive => "PC Sentinel Emulator interactive transcript",
            TranscriptProfile::Intrusion => "PC Sentinel Emulator chassis intrusion transcript",
            TranscriptProfile::Outage => "PC Sentinel Emulator service outage transcript",
            TranscriptProfile::PowerOff => "PC Sentinel Emulator remote power-off transcript",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("interactive") {
            Ok(Self::Interactive)
        } else if tag.eq_ignore_ascii_case("intrusion") {
            Ok(Self::Intrusion)
        } else if tag.eq_ignore_ascii_case("outage") {
            Ok(Self::Outage)
        } else if tag.eq_ignore_ascii_case("power-off") {
            Ok(Self::PowerOff)
        } else {
            Err(format!("Unknown transcript profile `{tag}`"))
        }
    }
}

pub struct Session {
    agent: Agent,
    state: AgentState<SimInstant>,
    world: World,
    history: EventLog<SimInstant, HISTORY_CAPACITY>,
    now: SimInstant,
    ticks: u64,
    blip_pending: bool,
    transcript: Option<TranscriptLogger>,
}

impl Session {
    /// Boots an agent against a fresh world, logging to `transcript` or the
    /// profile's default path.
    pub fn new(profile: TranscriptProfile, seed: u64, transcript: Option<&Path>) -> io::Result<Self> {
        let path = transcript.or_else(|| profile.log_path().map(Path::new));
        let logger = match path {
            Some(path) => Some(TranscriptLogger::new(path, profile)?),
            None => None,
        };
        let mut session = Self::detached(seed);
        session.transcript = logger;
        Ok(session)
    }

    /// Session without a transcript.
    pub fn detached(seed: u64) -> Self {
        let config = AgentConfig::new().with_identity(Identity::named(EMULATED_PC_NAME));
        let agent = Agent::new(config, SessionId::from_seed(seed));
        let mut world = World::new(config.power_on_level, config.chassis_open_level);
        let state = agent.boot(&mut world);

        Self {
            agent,
            state,
            world,
            history: EventLog::new(),
            now: SimInstant::BOOT,
            ticks: 0,
            blip_pending: false,
            transcript: None,
        }
    }

    pub fn banner(&self) -> String {
        format!(
            "booted pc={} session={} tick={}",
            self.agent.session().identity().name,
            self.agent.session().session_id(),
            format_duration_short(self.agent.config().tick_period)
        )
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.now.since_boot();
        self.record(elapsed, TranscriptRole::Host, &[trimmed.to_string()])?;

        let lines = match parse_command(trimmed) {
            Ok(command) => self.execute(command),
            Err(err) => vec![format!("ERR syntax {err}")],
        };

        self.record(elapsed, TranscriptRole::Emulator, &lines)?;
        Ok(lines)
    }

    fn execute(&mut self, command: Command<'_>) -> Vec<String> {
        match command {
            Command::Tick(count) => self.advance(count),
            Command::Run(span) => {
                let ticks = ticks_in(span, self.agent.config().tick_period);
                self.advance(ticks)
            }
            Command::Power(on) => {
                self.world.set_power(on);
                vec![format!("OK power {}", on_off(on))]
            }
            Command::Chassis(action) => {
                match action {
                    ChassisAction::Open => self.world.set_chassis(true),
                    ChassisAction::Closed => self.world.set_chassis(false),
                    ChassisAction::Blip => {
                        self.world.set_chassis(true);
                        self.blip_pending = true;
                    }
                }
                vec![format!("OK chassis {}", describe_chassis(action))]
            }
            Command::Network(up) => {
                self.world.set_network(up);
                vec![format!("OK network {}", if up { "up" } else { "down" })]
            }
            Command::Server(mode) => {
                self.world.set_server_mode(mode);
                vec![format!("OK server {mode}")]
            }
            Command::Status => self.status_lines(),
            Command::History(count) => self.history_lines(count.unwrap_or(DEFAULT_HISTORY_LINES)),
            Command::Help(topic) => help_lines(topic),
        }
    }

    /// Runs `ticks` iterations, printing every event they produce.
    fn advance(&mut self, ticks: u32) -> Vec<String> {
        let mut lines = Vec::new();
        let mut cooling = 0u32;

        for _ in 0..ticks {
            let now = self.now;
            let Tick { state, report } = self.agent.tick(self.state, &mut self.world, now);
            self.state = state;
            self.ticks += 1;
            if report.outcome.is_cooling_down() {
                cooling += 1;
            }

            self.history.record_all(&report.events, now);
            for event in &report.events {
                lines.push(format!("[{now}] {event}"));
            }

            if std::mem::take(&mut self.blip_pending) {
                self.world.set_chassis(false);
            }
            self.now = now + self.agent.config().tick_period + self.world.take_blocked();
        }

        lines.push(format!(
            "OK advanced {ticks} ticks t={} cooling={cooling}",
            self.now
        ));
        lines
    }

    fn status_lines(&self) -> Vec<String> {
        let state = &self.state;
        let latched = state.latch.latched();
        let grace = if state.link.in_grace_period() {
            "active"
        } else {
            "done"
        };
        let cooldown = match state.cooldown.deadline() {
            Some(deadline) if state.cooldown.is_active(self.now) => format!("until {deadline}"),
            _ => "idle".to_string(),
        };

        vec![
            format!(
                "agent t={} ticks={} session={}",
                self.now,
                self.ticks,
                self.agent.session().session_id()
            ),
            format!(
                "link state={} reconnect-counter={} grace={grace}",
                state.link.state(),
                state.link.reconnect_counter()
            ),
            format!(
                "latch alive={} opened={} suppressed={} power-change-pending={}",
                latched.alive,
                latched.opened,
                state.latch.opened_suppressed(),
                state.latch.power_change_pending()
            ),
            format!(
                "scheduler counter={}/{} cooldown={cooldown}",
                state.scheduler.counter(),
                state.scheduler.cycle()
            ),
            format!(
                "world pc={} chassis={} network={} server={}",
                on_off(self.world.pc_powered()),
                if self.world.chassis_open() {
                    "open"
                } else {
                    "closed"
                },
                if self.world.network_available() {
                    "up"
                } else {
                    "down"
                },
                self.world.server_mode()
            ),
            format!(
                "counters requests={} connect-requests={} pulses={}",
                self.world.requests(),
                self.world.connect_requests(),
                self.world.pulses()
            ),
            format!(
                "last-request {}",
                self.world.last_request().unwrap_or("none")
            ),
        ]
    }

    fn history_lines(&self, count: usize) -> Vec<String> {
        if self.history.is_empty() {
            return vec!["history empty".to_string()];
        }
        let skip = self.history.len().saturating_sub(count);
        self.history
            .oldest_first()
            .skip(skip)
            .map(|record| format!("#{:<4} [{}] {}", record.id, record.timestamp, record.event))
            .collect()
    }

    fn record(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        lines: &[String],
    ) -> io::Result<()> {
        if let Some(transcript) = self.transcript.as_mut() {
            for line in lines {
                transcript.append_line(elapsed, role, line)?;
            }
        }
        Ok(())
    }
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path, profile: TranscriptProfile) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header(profile)?;
        Ok(logger)
    }

    fn write_header(&mut self, profile: TranscriptProfile) -> io::Result<()> {
        writeln!(self.writer, "# {}", profile.header())?;
        writeln!(
            self.writer,
            "# Timestamps are simulated milliseconds since boot"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

#[derive(Clone, Copy)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

fn help_lines(topic: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    match topic {
        Some(target) => {
            if let Some((_, detail)) = HELP_TOPICS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(target))
            {
                lines.push((*detail).to_string());
            } else {
                lines.push(format!("No help available for `{target}`."));
                lines.push(format!("Available topics: {}", help_topic_list()));
            }
        }
        None => {
            lines.push("Available commands:".to_string());
            for (_, detail) in HELP_TOPICS {
                lines.push(format!("  {detail}"));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
        }
    }
    lines
}

fn help_topic_list() -> String {
    HELP_TOPICS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Whole ticks needed to cover `span`, rounding up.
fn ticks_in(span: Duration, tick: Duration) -> u32 {
    let tick_us = tick.as_micros().max(1);
    u32::try_from(span.as_micros().div_ceil(tick_us)).unwrap_or(u32::MAX)
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

fn describe_chassis(action: ChassisAction) -> &'static str {
    match action {
        ChassisAction::Open => "open",
        ChassisAction::Closed => "closed",
        ChassisAction::Blip => "blip (closes after one tick)",
    }
}

fn format_duration_short(duration: Duration) -> String {
    if duration.as_secs() == 0 {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{:.3}s", duration.as_secs_f64())
    }
}
