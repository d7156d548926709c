pub(crate) mod bootstrap;
mod commands;
mod frame_log;
mod persistence;
mod runner;

use std::env;
use std::io;
use std::path::PathBuf;

use engine::ConfigError;
use thiserror::Error;

pub(crate) use runner::run;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("invalid value '{value}' for {var}: expected {expected}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parse config json {path} at {json_path}: {source}")]
    ConfigParse {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to read command script: {0}")]
    ReadScript(#[source] io::Error),
    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),
}
