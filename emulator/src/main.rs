mod session;

use std::env;
use std::io;
use std::path::PathBuf;
use std::process;

use gnss_core::config::overrides::OverrideKey;
use gnss_core::config::{AcquisitionConfig, apply_overrides};
use gnss_core::mailbox::FixMailbox;

use session::{ConsoleTelemetry, ModemProfile, Session};

static FIX_MAILBOX: FixMailbox = FixMailbox::new();

struct Options {
    profile: ModemProfile,
    cycles: Option<u32>,
    transcript: Option<PathBuf>,
    verbose: bool,
    config: AcquisitionConfig,
}

fn main() -> io::Result<()> {
    let options = parse_options(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{}", usage());
        process::exit(2);
    });

    let stdout = io::stdout();
    let mut telemetry = ConsoleTelemetry::new(stdout.lock(), options.verbose);
    if let Some(path) = options.transcript.as_deref() {
        telemetry = telemetry.with_transcript(path)?;
    }

    println!(
        "GNSS acquisition emulator ({:?} modem): {} attempts, {} x {}ms wait, threshold {:.1}",
        options.profile,
        options.config.max_attempts,
        options.config.wait_timeout_ticks,
        options.config.poll_interval.as_millis(),
        options.config.confidence_threshold
    );

    let mut session = Session::new(options.profile, options.config, &FIX_MAILBOX, telemetry);
    let outcome = session.run(options.cycles);
    session.telemetry_mut().finish()?;

    let (accepted, rejected) = session.telemetry().report_counts();
    match outcome {
        Ok(cycles) => {
            println!("Completed {cycles} cycles ({accepted} accepted, {rejected} low confidence).");
            Ok(())
        }
        Err(error) => {
            eprintln!(
                "Positioning stopped after {} cycles: {error}",
                session.cycles_completed()
            );
            process::exit(1);
        }
    }
}

fn usage() -> String {
    let keys: Vec<&str> = OverrideKey::ALL.iter().map(|key| key.name()).collect();
    format!(
        "Usage: emulator [--profile <{}>] [--cycles <n>] [--transcript <path>] [--verbose] [key=value ...]\n  keys: {}",
        ModemProfile::TAGS,
        keys.join(", ")
    )
}

fn parse_options(mut args: impl Iterator<Item = String>) -> Result<Options, String> {
    let mut profile = ModemProfile::Nominal;
    let mut cycles = None;
    let mut transcript = None;
    let mut verbose = false;
    let mut overrides = Vec::new();

    while let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--profile=") {
            profile = ModemProfile::from_tag(value)?;
        } else if arg == "--profile" {
            let value = args.next().ok_or("Expected value after --profile")?;
            profile = ModemProfile::from_tag(&value)?;
        } else if let Some(value) = arg.strip_prefix("--cycles=") {
            cycles = Some(parse_cycles(value)?);
        } else if arg == "--cycles" {
            let value = args.next().ok_or("Expected value after --cycles")?;
            cycles = Some(parse_cycles(&value)?);
        } else if arg == "--transcript" {
            let value = args.next().ok_or("Expected path after --transcript")?;
            transcript = Some(PathBuf::from(value));
        } else if arg == "--verbose" || arg == "-v" {
            verbose = true;
        } else if arg.starts_with("--") {
            return Err(format!("Unknown option `{arg}`"));
        } else {
            overrides.push(arg);
        }
    }

    let joined = overrides.join(" ");
    let config = apply_overrides(AcquisitionConfig::default(), &joined)
        .map_err(|err| format!("Invalid override: {err}"))?;
    config
        .validate()
        .map_err(|err| format!("Invalid configuration: {err}"))?;

    Ok(Options {
        profile,
        cycles,
        transcript,
        verbose,
        config,
    })
}

fn parse_cycles(value: &str) -> Result<u32, String> {
    value
        .parse()
        .map_err(|_| format!("Invalid cycle count `{value}`"))
}
