//! Error types for casa-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while resolving deployment settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting was not provided by the file or the environment.
    #[error("missing required setting {key}")]
    Missing { key: &'static str },

    /// A setting was present but could not be interpreted.
    #[error("invalid value '{value}' for {key}; expected: {expected}")]
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    /// Failure reading a settings or secret file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on the settings file, with its path.
    #[error("failed to parse settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, value: &str, expected: &'static str) -> Self {
        ConfigError::Invalid {
            key,
            value: value.to_owned(),
            expected,
        }
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
