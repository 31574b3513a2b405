//! Sweep configuration.
//!
//! [`RunConfig`] is built once at startup and only ever read afterwards.
//! Values are looked up by key through a [`ConfigSource`], which is the
//! process environment in the usual case. Config files (`toml`, and `yaml`
//! with the `yaml` feature) use the same top-level keys.
//!
//! [`RunConfig`]: struct.RunConfig.html
//! [`ConfigSource`]: trait.ConfigSource.html

use std::collections::HashMap;
use std::env;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::command::Scenario;
use crate::error::{Error, Result};
use crate::{
    Seed, DEFAULT_PROGRAM, KEY_ADAPTATION_LOGIC, KEY_CORES, KEY_PROGRAM, KEY_REPETITION,
    KEY_SCENARIO, KEY_STOP_TIME, KEY_USERS,
};

/// Key-value lookup that config values are read from.
pub trait ConfigSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads config values from the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Top-level value found in a config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Text(String),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Int(i) => i.to_string(),
            Scalar::Text(s) => s,
        }
    }
}

fn flatten(values: HashMap<String, Scalar>) -> HashMap<String, String> {
    values
        .into_iter()
        .map(|(k, v)| (k, v.into_string()))
        .collect()
}

/// Immutable set of parameters for a single sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    cores: usize,
    repetitions: Seed,
    stop_time: u32,
    client_count: u32,
    protocol: String,
    scenario: Scenario,
    program: PathBuf,
}

impl RunConfig {
    /// Creates a validated config using the default scenario and program.
    pub fn new(
        cores: usize,
        repetitions: Seed,
        stop_time: u32,
        client_count: u32,
        protocol: &str,
    ) -> Result<RunConfig> {
        let config = RunConfig {
            cores,
            repetitions,
            stop_time,
            client_count,
            protocol: protocol.trim().to_string(),
            scenario: Scenario::default(),
            program: PathBuf::from(DEFAULT_PROGRAM),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_scenario(mut self, scenario: Scenario) -> RunConfig {
        self.scenario = scenario;
        self
    }

    pub fn with_program<P: Into<PathBuf>>(mut self, program: P) -> RunConfig {
        self.program = program.into();
        self
    }

    /// Reads the config from the process environment.
    pub fn from_env() -> Result<RunConfig> {
        RunConfig::from_source(&EnvSource)
    }

    /// Reads the config from any key-value source.
    ///
    /// All five sweep parameters are required. `Scenario` and `SimProgram`
    /// fall back to their defaults when absent or blank.
    pub fn from_source<S: ConfigSource + ?Sized>(source: &S) -> Result<RunConfig> {
        let cores = parse_value::<usize, S>(source, KEY_CORES)?;
        let client_count = parse_value::<u32, S>(source, KEY_USERS)?;
        let repetitions = parse_value::<Seed, S>(source, KEY_REPETITION)?;
        let stop_time = parse_value::<u32, S>(source, KEY_STOP_TIME)?;
        let protocol = required(source, KEY_ADAPTATION_LOGIC)?;

        let scenario = match optional(source, KEY_SCENARIO) {
            Some(name) => name.parse::<Scenario>()?,
            None => Scenario::default(),
        };
        let program = match optional(source, KEY_PROGRAM) {
            Some(p) => PathBuf::from(p),
            None => PathBuf::from(DEFAULT_PROGRAM),
        };

        let config = RunConfig {
            cores,
            repetitions,
            stop_time,
            client_count,
            protocol,
            scenario,
            program,
        };
        config.validate()?;
        debug!("loaded run config: {:?}", config);
        Ok(config)
    }

    /// Reads the config from a file, picking the format by extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<RunConfig> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => RunConfig::from_toml_str(&fs::read_to_string(path)?),
            #[cfg(feature = "yaml")]
            Some("yaml") | Some("yml") => RunConfig::from_yaml_str(&fs::read_to_string(path)?),
            _ => Err(Error::UnsupportedConfigFormat(
                path.to_string_lossy().to_string(),
            )),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<RunConfig> {
        let values: HashMap<String, Scalar> = toml::from_str(text)?;
        RunConfig::from_source(&flatten(values))
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(text: &str) -> Result<RunConfig> {
        let values: HashMap<String, Scalar> = serde_yaml::from_str(text)?;
        RunConfig::from_source(&flatten(values))
    }

    fn validate(&self) -> Result<()> {
        if self.cores == 0 {
            return Err(Error::InvalidValue(
                KEY_CORES,
                "must be at least 1".to_string(),
            ));
        }
        if self.stop_time == 0 {
            return Err(Error::InvalidValue(
                KEY_STOP_TIME,
                "must be positive".to_string(),
            ));
        }
        if self.client_count == 0 {
            return Err(Error::InvalidValue(
                KEY_USERS,
                "must be positive".to_string(),
            ));
        }
        if self.protocol.is_empty() {
            return Err(Error::InvalidValue(
                KEY_ADAPTATION_LOGIC,
                "must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Maximum number of simulator runs in flight at once.
    pub fn cores(&self) -> usize {
        self.cores
    }

    /// Number of seeds in the sweep, `0..repetitions`.
    pub fn repetitions(&self) -> Seed {
        self.repetitions
    }

    /// Simulated duration, in seconds.
    pub fn stop_time(&self) -> u32 {
        self.stop_time
    }

    pub fn client_count(&self) -> u32 {
        self.client_count
    }

    /// Name of the adaptation logic the simulated players use.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn scenario(&self) -> Scenario {
        self.scenario
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

fn required<S: ConfigSource + ?Sized>(source: &S, key: &'static str) -> Result<String> {
    match source.get(key) {
        Some(value) => Ok(value.trim().to_string()),
        None => Err(Error::MissingConfig(key)),
    }
}

fn optional<S: ConfigSource + ?Sized>(source: &S, key: &'static str) -> Option<String> {
    source
        .get(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_value<T, S>(source: &S, key: &'static str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    S: ConfigSource + ?Sized,
{
    let value = required(source, key)?;
    value.parse::<T>().map_err(|e| Error::InvalidConfig {
        key,
        reason: e.to_string(),
        value,
    })
}
