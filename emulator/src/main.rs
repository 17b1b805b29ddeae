mod grammar;
mod session;
mod world;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use session::{Session, TranscriptProfile};

const USAGE: &str = "Usage: sentinel-emulator [--profile <interactive|intrusion|outage|power-off>] [--transcript <path>] [--seed <n>]";

struct Options {
    profile: TranscriptProfile,
    transcript: Option<PathBuf>,
    seed: Option<u64>,
}

fn main() -> io::Result<()> {
    let options = parse_options(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let seed = options.seed.unwrap_or_else(clock_seed);
    let mut session = Session::new(options.profile, seed, options.transcript.as_deref())?;
    let mut line = String::new();

    writeln!(writer, "PC Sentinel Emulator {}", session.banner())?;
    writeln!(writer, "Type `help` for commands or `exit` to quit.")?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        let responses = session.handle_command(trimmed)?;
        for response in responses {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            u64::try_from(elapsed.as_nanos() & u128::from(u64::MAX)).unwrap_or(0)
        })
}

fn parse_options(mut args: impl Iterator<Item = String>) -> Result<Options, String> {
    let mut options = Options {
        profile: TranscriptProfile::Interactive,
        transcript: None,
        seed: None,
    };

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };
        let mut value = || {
            inline
                .clone()
                .or_else(|| args.next())
                .ok_or_else(|| format!("Expected value after {flag}"))
        };

        match flag.as_str() {
            "--profile" => options.profile = TranscriptProfile::from_tag(&value()?)?,
            "--transcript" => options.transcript = Some(PathBuf::from(value()?)),
            "--seed" => {
                let raw = value()?;
                options.seed = Some(
                    raw.parse()
                        .map_err(|_| format!("Invalid seed `{raw}`"))?,
                );
            }
            other => options.profile = TranscriptProfile::from_tag(other)?,
        }
    }

    Ok(options)
}
