use std::io;

#[allow(dead_code)]
#[path = "../grammar.rs"]
mod grammar;
#[allow(dead_code)]
#[path = "../session.rs"]
mod session;
#[allow(dead_code)]
#[path = "../world.rs"]
mod world;

use session::{Session, TranscriptProfile};

/// Fixed so the recorded session ids stay stable between captures.
const CAPTURE_SEED: u64 = 0x5E47_1AE1;

fn main() -> io::Result<()> {
    record_profile(TranscriptProfile::Intrusion)?;
    record_profile(TranscriptProfile::Outage)?;
    record_profile(TranscriptProfile::PowerOff)?;
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    let mut session = Session::new(profile, CAPTURE_SEED, None)?;
    let script: &[&str] = match profile {
        TranscriptProfile::Interactive => &[],
        TranscriptProfile::Intrusion => INTRUSION,
        TranscriptProfile::Outage => OUTAGE,
        TranscriptProfile::PowerOff => POWER_OFF,
    };
    for line in script {
        let _ = session.handle_command(line)?;
    }
    Ok(())
}

const INTRUSION: &[&str] = &[
    "status",
    "tick 4",
    "chassis blip",
    "tick 3",
    "chassis open",
    "run 1m",
    "chassis closed",
    "tick 2",
    "history 8",
];

const OUTAGE: &[&str] = &[
    "tick 4",
    "network down",
    "chassis blip",
    "run 12s",
    "status",
    "network up",
    "run 6s",
    "server garbage",
    "power off",
    "tick",
    "server reject 503",
    "tick",
    "server ok",
    "tick",
    "status",
];

const POWER_OFF: &[&str] = &[
    "tick 4",
    "server malformed",
    "chassis blip",
    "tick 2",
    "server power-off",
    "chassis blip",
    "tick",
    "status",
    "tick 100",
    "run 15s",
    "status",
    "history 6",
];
