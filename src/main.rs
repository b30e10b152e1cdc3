use std::process;
use std::time::Duration;

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use lib::stress::{self, StressConfig};
use lib::{AssertionError, Shared, assert_condition};
use rand::Rng;
use tracing::Level;

#[derive(Debug, Clone, Default)]
struct Payload {
    id: u32,
    label: String,
}

fn random_payload(_: &Payload) -> Payload {
    let id = rand::rng().random_range(0..u32::MAX);
    Payload {
        id,
        label: format!("String data {id}"),
    }
}

fn build_cli() -> Command {
    Command::new("sync-checker")
        .about("Exercises the optimistic access checker")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("Raise log verbosity (repeat for more)"),
        )
        .subcommand(Command::new("ok").about("Single-threaded write and read, exits cleanly"))
        .subcommand(
            Command::new("race")
                .about("Writers and readers without synchronization, expected to abort")
                .arg(number_arg("writers", "1", "Writer threads"))
                .arg(number_arg("readers", "1", "Reader threads"))
                .arg(number_arg("iterations", "200", "Operations per thread"))
                .arg(number_arg("delay-ms", "5", "Sleep inside every write, reads hold twice as long")),
        )
        .subcommand(
            Command::new("lifetime")
                .about("Drops the shared value after leaking handles, aborts if any leaked")
                .arg(number_arg("leaked", "1", "Handles to forget before the drop")),
        )
        .subcommand(
            Command::new("readers")
                .about("Concurrent read-only access, exits cleanly")
                .arg(number_arg("threads", "8", "Reader threads"))
                .arg(number_arg("iterations", "200", "Reads per thread"))
                .arg(number_arg("delay-ms", "1", "Half the sleep inside every read")),
        )
}

fn number_arg(name: &'static str, default: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .value_parser(value_parser!(usize))
        .default_value(default)
        .help(help)
}

fn number(matches: &ArgMatches, name: &str) -> usize {
    matches.get_one::<usize>(name).copied().unwrap_or_default()
}

fn delay(matches: &ArgMatches) -> Duration {
    Duration::from_millis(number(matches, "delay-ms") as u64)
}

fn main() {
    let matches = build_cli().get_matches();

    let level = match matches.get_count("verbose") {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(&matches) {
        eprintln!("{err}");
        process::exit(2);
    }
}

fn run(matches: &ArgMatches) -> Result<(), AssertionError> {
    match matches.subcommand() {
        Some(("ok", _)) => ok(),
        Some(("race", sub)) => race(StressConfig {
            readers: number(sub, "readers"),
            writers: number(sub, "writers"),
            iterations: number(sub, "iterations"),
            body_delay: delay(sub),
        }),
        Some(("lifetime", sub)) => lifetime(number(sub, "leaked")),
        Some(("readers", sub)) => readers(StressConfig {
            readers: number(sub, "threads"),
            writers: 0,
            iterations: number(sub, "iterations"),
            body_delay: delay(sub),
        }),
        other => Err(AssertionError::InvalidArgument(format!(
            "unknown scenario {:?}",
            other.map(|(name, _)| name)
        ))),
    }
}

fn ok() -> Result<(), AssertionError> {
    let shared = Shared::new(Payload::default());
    let handle = shared.get_ref();

    handle.write(Payload {
        id: 1023,
        label: "Hello world!".to_string(),
    });
    handle.read_only_access(|payload| println!("str={}", payload.label));

    let payload = handle.read();
    assert_condition!(
        payload.id == 1023,
        AssertionError::InvalidState,
        "read back id {} after writing 1023",
        payload.id
    );

    Ok(())
}

fn race(config: StressConfig) -> Result<(), AssertionError> {
    assert_condition!(
        config.writers > 0,
        AssertionError::InvalidArgument,
        "a race needs at least one writer"
    );

    let shared = Shared::new(Payload::default());
    let report = stress::run(&shared.get_ref(), &config, random_payload)?;

    println!("no overlap observed: {report:?}");
    Ok(())
}

fn lifetime(leaked: usize) -> Result<(), AssertionError> {
    let shared = Shared::new(Payload::default());
    for _ in 0..leaked {
        std::mem::forget(shared.get_ref());
    }

    let handle = shared.get_ref();
    handle.read_only_access(|payload| println!("{} : {}", payload.id, payload.label));
    drop(handle);

    println!("dropping with {} live handle(s)", shared.live_refs());
    drop(shared);
    println!("dropped cleanly");

    Ok(())
}

fn readers(config: StressConfig) -> Result<(), AssertionError> {
    let shared = Shared::new(Payload {
        id: 7,
        label: "read only".to_string(),
    });
    let report = stress::run(&shared.get_ref(), &config, Payload::clone)?;

    println!("reads completed: {}", report.reads);
    Ok(())
}
