//! Command grammar for the emulator REPL.

use std::fmt;
use std::time::Duration;

use winnow::ascii::{Caseless, digit1, space0, space1};
use winnow::combinator::{alt, eof, opt, preceded, terminated};
use winnow::prelude::*;
use winnow::token::take_while;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChassisAction {
    Open,
    Closed,
    /// Open for exactly one tick, then closed again.
    Blip,
}

/// Behavior of the simulated management service.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ServerMode {
    Ok,
    Down,
    Garbage,
    Malformed,
    /// Answers the next report with a power-off command, then reverts to `Ok`.
    PowerOff,
    Reject(u16),
}

impl fmt::Display for ServerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMode::Ok => f.write_str("ok"),
            ServerMode::Down => f.write_str("down"),
            ServerMode::Garbage => f.write_str("garbage"),
            ServerMode::Malformed => f.write_str("malformed"),
            ServerMode::PowerOff => f.write_str("power-off"),
            ServerMode::Reject(status) => write!(f, "reject {status}"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Command<'a> {
    Tick(u32),
    Run(Duration),
    Power(bool),
    Chassis(ChassisAction),
    Network(bool),
    Server(ServerMode),
    Status,
    History(Option<usize>),
    Help(Option<&'a str>),
}

/// Parses one REPL line.
pub fn parse_command(line: &str) -> Result<Command<'_>, String> {
    command.parse(line.trim()).map_err(|err| err.to_string())
}

fn command<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    terminated(
        alt((
            tick, run, power, chassis, network, server, status, history, help,
        )),
        (space0, eof),
    )
    .parse_next(input)
}

fn tick<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    preceded(Caseless("tick"), opt(preceded(space1, count)))
        .map(|count| Command::Tick(count.unwrap_or(1)))
        .parse_next(input)
}

fn run<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    preceded((Caseless("run"), space1), duration)
        .map(Command::Run)
        .parse_next(input)
}

fn power<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    preceded(
        (Caseless("power"), space1),
        alt((Caseless("on").value(true), Caseless("off").value(false))),
    )
    .map(Command::Power)
    .parse_next(input)
}

fn chassis<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    preceded(
        (Caseless("chassis"), space1),
        alt((
            Caseless("open").value(ChassisAction::Open),
            Caseless("closed").value(ChassisAction::Closed),
            Caseless("close").value(ChassisAction::Closed),
            Caseless("blip").value(ChassisAction::Blip),
        )),
    )
    .map(Command::Chassis)
    .parse_next(input)
}

fn network<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    preceded(
        (Caseless("network"), space1),
        alt((Caseless("up").value(true), Caseless("down").value(false))),
    )
    .map(Command::Network)
    .parse_next(input)
}

fn server<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    preceded(
        (Caseless("server"), space1),
        alt((
            Caseless("ok").value(ServerMode::Ok),
            Caseless("down").value(ServerMode::Down),
            Caseless("garbage").value(ServerMode::Garbage),
            Caseless("malformed").value(ServerMode::Malformed),
            Caseless("power-off").value(ServerMode::PowerOff),
            preceded((Caseless("reject"), space1), digit1.parse_to::<u16>())
                .map(ServerMode::Reject),
        )),
    )
    .map(Command::Server)
    .parse_next(input)
}

fn status<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    Caseless("status").value(Command::Status).parse_next(input)
}

fn history<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    preceded(
        Caseless("history"),
        opt(preceded(space1, digit1.parse_to::<usize>())),
    )
    .map(Command::History)
    .parse_next(input)
}

fn help<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    preceded(
        Caseless("help"),
        opt(preceded(
            space1,
            take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '-'),
        )),
    )
    .map(Command::Help)
    .parse_next(input)
}

fn count(input: &mut &str) -> ModalResult<u32> {
    digit1.parse_to().parse_next(input)
}

#[derive(Clone, Copy)]
enum Unit {
    Millis,
    Seconds,
    Minutes,
}

/// `<n>ms`, `<n>s`, or `<n>m`.
fn duration(input: &mut &str) -> ModalResult<Duration> {
    (
        digit1.parse_to::<u64>(),
        alt((
            Caseless("ms").value(Unit::Millis),
            Caseless("s").value(Unit::Seconds),
            Caseless("m").value(Unit::Minutes),
        )),
    )
        .map(|(value, unit)| match unit {
            Unit::Millis => Duration::from_millis(value),
            Unit::Seconds => Duration::from_secs(value),
            Unit::Minutes => Duration::from_secs(value.saturating_mul(60)),
        })
        .parse_next(input)
}
