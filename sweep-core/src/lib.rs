//! This library implements the core of the seed sweep runner.
//!
//! A sweep repeats a single simulator experiment once per random seed,
//! spreading the repetitions over a fixed number of worker threads. The
//! simulator itself is an external program (an ns-3 `waf` build running one
//! of the DASH streaming scenarios); this library only decides *what* to run
//! and *how many at once*.
//!
//! Programming interface is centered around three pieces:
//!
//! - [`RunConfig`], the immutable set of sweep parameters, loaded once from
//!   the environment or from a config file,
//! - [`build_command`], which turns a config and a seed into an
//!   [`Invocation`],
//! - [`Runner`], the bounded worker pool that launches one invocation per
//!   seed through a [`Launcher`] and returns once all of them have settled.
//!
//! ## Example
//!
//! ```ignore
//! extern crate sweep_core as sweep;
//! use sweep::{ProcessLauncher, RunConfig, Runner};
//!
//! pub fn main() {
//!     let config = RunConfig::from_env().unwrap();
//!     let summary = Runner::new(&config, ProcessLauncher::default()).run();
//!     println!("{} failed", summary.failed().len());
//! }
//! ```
//!
//! [`RunConfig`]: config/struct.RunConfig.html
//! [`build_command`]: command/fn.build_command.html
//! [`Invocation`]: command/struct.Invocation.html
//! [`Runner`]: runner/struct.Runner.html
//! [`Launcher`]: runner/trait.Launcher.html

#[macro_use]
extern crate serde;
#[macro_use]
extern crate log;

// reexports
pub use command::{build_command, Invocation, Scenario};
pub use config::{ConfigSource, EnvSource, RunConfig};
pub use error::{Error, Result};
pub use runner::{Launcher, Outcome, OutputMode, ProcessLauncher, Progress, RunSummary, Runner};

pub mod command;
pub mod config;
pub mod error;
pub mod runner;

/// Seed handed to a single simulator run.
pub type Seed = u32;

/// Simulator launcher used when none is configured.
pub const DEFAULT_PROGRAM: &str = "./waf";

// configuration keys, named the way the experiment environment files name them
pub const KEY_CORES: &str = "cores";
pub const KEY_USERS: &str = "Users";
pub const KEY_REPETITION: &str = "Repetition";
pub const KEY_STOP_TIME: &str = "StopTime";
pub const KEY_ADAPTATION_LOGIC: &str = "AdaptationLogicToUse";
pub const KEY_SCENARIO: &str = "Scenario";
pub const KEY_PROGRAM: &str = "SimProgram";

pub const FEATURE_NAME_YAML: &str = "yaml";
#[cfg(feature = "yaml")]
pub const FEATURE_YAML: bool = true;
#[cfg(not(feature = "yaml"))]
pub const FEATURE_YAML: bool = false;
