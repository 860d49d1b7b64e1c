use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("could not open `{path}`: {source}")]
    Open { path: PathBuf, source: csv::Error },
    #[error("malformed row {row} in `{path}`: {source}")]
    Row {
        path: PathBuf,
        row: usize,
        source: csv::Error,
    },
    #[error("invalid sales record on row {row} in `{path}`: {reason}")]
    InvalidRecord {
        path: PathBuf,
        row: usize,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("scoring policy rejected: {0}")]
    Policy(String),
}

#[derive(Debug, Error)]
pub enum NarrativeError {
    #[error("narrative request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("narrative service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("narrative response contained no text")]
    EmptyResponse,
}
