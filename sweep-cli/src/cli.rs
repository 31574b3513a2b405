//! Application definition.

use anyhow::{Context, Result};
use clap::{App, Arg, ArgMatches};
use simplelog::{LevelFilter, SimpleLogger, TermLogger, TerminalMode};
use sweep::{OutputMode, ProcessLauncher, Progress, RunConfig, RunSummary, Runner};

use crate::dry_run::DryRunLauncher;
use crate::util;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn app<'a, 'b>() -> App<'a, 'b> {
    App::new("sweep")
        .version(VERSION)
        .about("Run an ns-3 DASH experiment once per seed, several seeds at a time.\n\
                Parameters (cores, Users, Repetition, StopTime, AdaptationLogicToUse) \n\
                are read from the environment and a .env file, or from a config file.")
        .arg(Arg::with_name("verbosity")
            .long("verbosity")
            .short("v")
            .takes_value(true)
            .default_value("info")
            .value_name("verb")
            .help("Set the verbosity of the log output"))
        .arg(Arg::with_name("config")
            .display_order(1)
            .long("config")
            .short("c")
            .takes_value(true)
            .value_name("path")
            .help("Read parameters from a toml or yaml file instead of the environment"))
        .arg(Arg::with_name("env-file")
            .display_order(2)
            .long("env-file")
            .takes_value(true)
            .value_name("path")
            .conflicts_with("config")
            .help("Load environment variables from this file (defaults to ./.env if present)"))
        .arg(Arg::with_name("dry-run")
            .display_order(3)
            .long("dry-run")
            .short("n")
            .help("Print the simulator command for each seed instead of running it"))
        .arg(Arg::with_name("show-output")
            .display_order(4)
            .long("show-output")
            .conflicts_with("dry-run")
            .help("Let simulator stdout and stderr through to the terminal"))
}

pub fn app_matches() -> ArgMatches<'static> {
    app().get_matches()
}

/// Loads the config and runs the whole sweep.
///
/// Failed simulator runs are logged but never turn into an error here.
pub fn start(matches: ArgMatches) -> Result<()> {
    setup_log_verbosity(&matches);

    let config = load_config(&matches)?;
    println!("Starting users: {}", config.client_count());

    let summary = run_sweep(&config, &matches);
    let failed = summary.failed();
    if !failed.is_empty() {
        warn!("seeds that did not finish cleanly: {:?}", failed);
    }

    println!("Done.");
    Ok(())
}

fn load_config(matches: &ArgMatches) -> Result<RunConfig> {
    if let Some(path) = matches.value_of("config") {
        return RunConfig::from_path(path)
            .with_context(|| format!("failed loading sweep config from file: {}", path));
    }
    util::load_env_file(matches.value_of("env-file"))?;
    RunConfig::from_env().context("failed reading sweep config from the environment")
}

fn run_sweep(config: &RunConfig, matches: &ArgMatches) -> RunSummary {
    info!(
        "running {} repetitions of {} ({}) on {} cores",
        config.repetitions(),
        config.scenario(),
        config.protocol(),
        config.cores()
    );
    if matches.is_present("dry-run") {
        return Runner::new(config, DryRunLauncher)
            .with_progress(Progress::Silent)
            .run();
    }
    let output = if matches.is_present("show-output") {
        OutputMode::Inherit
    } else {
        OutputMode::Discard
    };
    Runner::new(config, ProcessLauncher::new(output)).run()
}

fn level_filter(verbosity: Option<&str>) -> LevelFilter {
    match verbosity {
        Some(s) => match s {
            "0" | "none" => LevelFilter::Off,
            "1" | "err" | "error" | "min" => LevelFilter::Error,
            "2" | "warn" | "warning" | "default" => LevelFilter::Warn,
            "3" | "info" => LevelFilter::Info,
            "4" | "debug" => LevelFilter::Debug,
            "5" | "trace" | "max" | "all" => LevelFilter::Trace,
            _ => LevelFilter::Warn,
        },
        _ => LevelFilter::Warn,
    }
}

/// Log lines carry a timestamp only at error level; worker threads log a
/// lot of `seed N done`, so the thread id is shown from debug down.
fn logger_config() -> simplelog::Config {
    simplelog::ConfigBuilder::new()
        .set_time_level(LevelFilter::Error)
        .set_time_format_str("%H:%M:%S")
        .set_thread_level(LevelFilter::Debug)
        .set_target_level(LevelFilter::Trace)
        .set_location_level(LevelFilter::Off)
        .build()
}

fn setup_log_verbosity(matches: &ArgMatches) {
    let level = level_filter(matches.value_of("verbosity"));
    // no terminal attached, e.g. output piped to a file
    if TermLogger::init(level, logger_config(), TerminalMode::Mixed).is_err() {
        let _ = SimpleLogger::init(level, logger_config());
    }
}
