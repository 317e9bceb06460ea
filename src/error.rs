use std::path::PathBuf;
use thiserror::Error;

use crate::format::FileFormat;

#[derive(Debug, Error)]
pub enum LayerfigError {
    #[error(
        "Could not find app config. Found {}, but you did not define an environment ({vars}).",
        found.display()
    )]
    NoEnvironment { found: PathBuf, vars: String },

    #[error(
        "Could not find app config. Found {}, but your environment was {environment}.",
        found.display()
    )]
    WrongEnvironment {
        found: PathBuf,
        environment: String,
    },

    #[error("Could not find app config. Expected an environment variable or file.")]
    NothingFound,

    #[error("Validation failed in \"{path}\": {message}")]
    InvalidOptions { path: String, message: String },

    #[error(
        "A parsing extension returned as non-applicable when using validate_options. \
         This isn't supported."
    )]
    NonApplicableValidated,

    #[error("Tried to read a config value before the config was loaded")]
    NotLoaded,

    #[error("Failed to parse {origin} as {format}: {reason}")]
    ParseError {
        origin: String,
        format: FileFormat,
        reason: String,
    },

    #[error("Could not detect the format of {origin}")]
    UnknownFormat { origin: String },

    #[error("Failed to read {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unknown key '{key}' in {path}")]
    UnknownKey { key: String, path: PathBuf },

    #[error("Unknown keys in meta file")]
    UnknownKeys(Vec<LayerfigError>),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] confique::Error),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Extension failed in \"{path}\": {reason}")]
    Extension { path: String, reason: String },

    #[error("Config failed validation: {message}")]
    InvalidConfig { message: String },
}
