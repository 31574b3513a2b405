//! Building simulator command lines.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::RunConfig;
use crate::error::Error;
use crate::Seed;

/// Simulator scenario a sweep drives.
///
/// Each scenario is a separate ns-3 program and names its adaptation logic
/// option differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    /// Binary tree topology, bottom-up caching.
    DashBtreeBotup,
    /// Binary tree topology with the HAS logic selected by full class path.
    BinaryTree,
}

impl Scenario {
    pub const ALL: [Scenario; 2] = [Scenario::DashBtreeBotup, Scenario::BinaryTree];

    /// Program name as known to `waf --run`.
    pub fn name(&self) -> &'static str {
        match self {
            Scenario::DashBtreeBotup => "dash-btree-botup",
            Scenario::BinaryTree => "binary-tree-scenario",
        }
    }

    fn logic_arg(&self, protocol: &str) -> String {
        match self {
            Scenario::DashBtreeBotup => format!("--AdaptationLogicToUse={}", protocol),
            Scenario::BinaryTree => format!("--HASLogic=dash::player::{}", protocol),
        }
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Scenario::DashBtreeBotup
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .iter()
            .find(|scenario| scenario.name() == s)
            .copied()
            .ok_or_else(|| Error::UnknownScenario(s.to_string()))
    }
}

/// Fully formed command for a single seed.
///
/// Arguments are kept as a list and handed to the OS as-is, no shell is
/// involved. The `Display` impl renders a shell-quoted line for logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    seed: Seed,
    program: PathBuf,
    args: Vec<String>,
}

impl Invocation {
    pub fn new<P: Into<PathBuf>>(seed: Seed, program: P, args: Vec<String>) -> Invocation {
        Invocation {
            seed,
            program: program.into(),
            args,
        }
    }

    pub fn seed(&self) -> Seed {
        self.seed
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let program = self.program.to_string_lossy();
        let words = std::iter::once(program.as_ref()).chain(self.args.iter().map(|a| a.as_str()));
        match shlex::try_join(words.clone()) {
            Ok(line) => f.write_str(&line),
            // nul bytes can't be quoted, fall back to plain words
            Err(_) => f.write_str(&words.collect::<Vec<_>>().join(" ")),
        }
    }
}

/// Builds the simulator command for one seed.
///
/// Output depends only on the arguments. The scenario line handed to
/// `waf --run` is a single argument, `waf` splits it on its own.
pub fn build_command(config: &RunConfig, seed: Seed) -> Invocation {
    let scenario = config.scenario();
    let run = format!(
        "{} --stopTime={} --Client={} --seed={} {}",
        scenario.name(),
        config.stop_time(),
        config.client_count(),
        seed,
        scenario.logic_arg(config.protocol()),
    );
    Invocation::new(seed, config.program(), vec!["--run".to_string(), run])
}

#[test]
fn dash_btree_botup_command() {
    let config = RunConfig::new(2, 5, 600, 15, "RateBasedAdaptationLogic").unwrap();
    let invocation = build_command(&config, 3);
    assert_eq!(invocation.seed(), 3);
    assert_eq!(invocation.program(), Path::new("./waf"));
    assert_eq!(
        invocation.args(),
        &[
            "--run".to_string(),
            "dash-btree-botup --stopTime=600 --Client=15 --seed=3 \
             --AdaptationLogicToUse=RateBasedAdaptationLogic"
                .to_string(),
        ]
    );
}

#[test]
fn binary_tree_command() {
    let config = RunConfig::new(1, 1, 600, 15, "RateAndBufferBasedAdaptationLogic")
        .unwrap()
        .with_scenario(Scenario::BinaryTree)
        .with_program("/opt/ns-3/waf");
    let invocation = build_command(&config, 0);
    assert_eq!(invocation.program(), Path::new("/opt/ns-3/waf"));
    assert_eq!(
        invocation.args()[1],
        "binary-tree-scenario --stopTime=600 --Client=15 --seed=0 \
         --HASLogic=dash::player::RateAndBufferBasedAdaptationLogic"
    );
}

#[test]
fn build_command_is_deterministic() {
    let config = RunConfig::new(4, 10, 300, 8, "RateBasedAdaptationLogic").unwrap();
    for seed in 0..10 {
        assert_eq!(build_command(&config, seed), build_command(&config, seed));
    }
    assert_ne!(build_command(&config, 1), build_command(&config, 2));
}

#[test]
fn invocation_display_quotes_run_argument() {
    let invocation = Invocation::new(
        7,
        "./waf",
        vec!["--run".to_string(), "dash-btree-botup --seed=7".to_string()],
    );
    let line = invocation.to_string();
    assert!(line.starts_with("./waf --run "));
    assert_eq!(
        shlex::split(&line).unwrap(),
        vec!["./waf", "--run", "dash-btree-botup --seed=7"]
    );
}

#[test]
fn scenario_names_round_trip() {
    for scenario in &Scenario::ALL {
        assert_eq!(scenario.name().parse::<Scenario>().unwrap(), *scenario);
    }
    assert!("dash-btree-mv".parse::<Scenario>().is_err());
}
