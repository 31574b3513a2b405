//! Command line program for running seed sweeps of ns-3 DASH experiments.

#[macro_use]
extern crate log;

extern crate anyhow;
extern crate clap;
extern crate colored;

extern crate sweep_core as sweep;

pub mod cli;
mod dry_run;
mod util;

use std::process;

use colored::*;

/// Exit status when the sweep could not be started at all.
const EXIT_CONFIG_ERROR: i32 = 1;

fn main() {
    if let Err(e) = cli::start(cli::app_matches()) {
        report(&e);
        process::exit(EXIT_CONFIG_ERROR);
    }
}

/// Prints the error to stderr with every cause below it, one per line.
fn report(e: &anyhow::Error) {
    eprintln!("{}{}", "error: ".red().bold(), e);
    let mut causes = e.chain().skip(1).peekable();
    if causes.peek().is_some() {
        eprintln!("caused by:");
        for cause in causes {
            eprintln!("    {}", cause);
        }
    }
}
