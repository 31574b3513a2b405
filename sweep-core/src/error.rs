//! Error types.

use std::io;

pub type Result<T> = core::result::Result<T, Error>;

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::IoError(e.to_string())
    }
}

/// Crate-wide error type.
///
/// Everything here is a configuration problem detected before any worker
/// starts. Failures of individual simulator runs are not errors, they are
/// reported as [`Outcome`]s.
///
/// [`Outcome`]: ../runner/enum.Outcome.html
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    IoError(String),

    #[error("missing config value: {0}")]
    MissingConfig(&'static str),
    #[error("invalid config value for {key}: \"{value}\" ({reason})")]
    InvalidConfig {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("invalid config value for {0}: {1}")]
    InvalidValue(&'static str, String),
    #[error("unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("toml deserialization error: {0}")]
    TomlDeserError(#[from] toml::de::Error),
    #[cfg(feature = "yaml")]
    #[error("yaml deserialization error: {0}")]
    YamlDeserError(#[from] serde_yaml::Error),
    #[error("unsupported config file format: {0}")]
    UnsupportedConfigFormat(String),
}

impl Error {
    /// Returns the config key the error is about, if any.
    pub fn config_key(&self) -> Option<&'static str> {
        match self {
            Error::MissingConfig(key) => Some(*key),
            Error::InvalidConfig { key, .. } => Some(*key),
            Error::InvalidValue(key, _) => Some(*key),
            Error::UnknownScenario(_) => Some(crate::KEY_SCENARIO),
            _ => None,
        }
    }
}
