use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use engine::{LoopConfig, SimTuning, WorldConfig, WorldSeed};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::AppError;

pub(crate) const SEED_ENV_VAR: &str = "DWARFHOLD_SEED";
pub(crate) const CONFIG_ENV_VAR: &str = "DWARFHOLD_CONFIG";
pub(crate) const SCRIPT_ENV_VAR: &str = "DWARFHOLD_SCRIPT";
pub(crate) const SAVE_DIR_ENV_VAR: &str = "DWARFHOLD_SAVE_DIR";
pub(crate) const REALTIME_ENV_VAR: &str = "DWARFHOLD_REALTIME";
const DEFAULT_SAVE_DIR: &str = "saves";

/// Optional overrides read from the `DWARFHOLD_CONFIG` file. Missing sections
/// and fields keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct FileConfig {
    pub(crate) world: WorldConfig,
    pub(crate) tuning: SimTuning,
    #[serde(rename = "loop")]
    pub(crate) loop_config: LoopConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ScriptSource {
    Stdin,
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RunnerSettings {
    pub(crate) seed: WorldSeed,
    pub(crate) world: WorldConfig,
    pub(crate) tuning: SimTuning,
    pub(crate) loop_config: LoopConfig,
    pub(crate) script: ScriptSource,
    pub(crate) save_dir: PathBuf,
    pub(crate) realtime: bool,
}

pub(crate) fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

pub(crate) fn settings_from_env() -> Result<RunnerSettings, AppError> {
    settings_from_lookup(read_env_var)
}

fn read_env_var(var: &'static str) -> Result<Option<String>, AppError> {
    match env::var(var) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(source) => Err(AppError::EnvVar { var, source }),
    }
}

pub(crate) fn settings_from_lookup<F>(lookup: F) -> Result<RunnerSettings, AppError>
where
    F: Fn(&'static str) -> Result<Option<String>, AppError>,
{
    let file_config = match non_empty(lookup(CONFIG_ENV_VAR)?) {
        Some(path) => load_file_config(Path::new(&path))?,
        None => FileConfig::default(),
    };
    file_config.world.validate()?;
    file_config.tuning.validate()?;

    let seed = match non_empty(lookup(SEED_ENV_VAR)?) {
        Some(raw) => parse_seed(&raw)?,
        None => {
            let seed = WorldSeed(rand::random::<f64>());
            info!(%seed, "seed_generated");
            seed
        }
    };

    let script = match non_empty(lookup(SCRIPT_ENV_VAR)?) {
        Some(path) => ScriptSource::File(PathBuf::from(path)),
        None => ScriptSource::Stdin,
    };
    let save_dir = non_empty(lookup(SAVE_DIR_ENV_VAR)?)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SAVE_DIR));
    let realtime = match non_empty(lookup(REALTIME_ENV_VAR)?) {
        Some(raw) => parse_flag(REALTIME_ENV_VAR, &raw)?,
        None => false,
    };

    let settings = RunnerSettings {
        seed,
        world: file_config.world,
        tuning: file_config.tuning,
        loop_config: file_config.loop_config,
        script,
        save_dir,
        realtime,
    };
    info!(
        seed = %settings.seed,
        width = settings.world.width,
        height = settings.world.height,
        save_dir = %settings.save_dir.display(),
        realtime = settings.realtime,
        "runner_settings"
    );
    Ok(settings)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn parse_seed(raw: &str) -> Result<WorldSeed, AppError> {
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(WorldSeed(value)),
        _ => Err(AppError::InvalidEnv {
            var: SEED_ENV_VAR,
            value: raw.to_string(),
            expected: "a finite number",
        }),
    }
}

fn parse_flag(var: &'static str, raw: &str) -> Result<bool, AppError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::InvalidEnv {
            var,
            value: raw.to_string(),
            expected: "1 or 0",
        }),
    }
}

pub(crate) fn load_file_config(path: &Path) -> Result<FileConfig, AppError> {
    let raw = fs::read_to_string(path).map_err(|source| AppError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    parse_file_config(&raw, path)
}

fn parse_file_config(raw: &str, path: &Path) -> Result<FileConfig, AppError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, FileConfig>(&mut deserializer).map_err(|error| {
        AppError::ConfigParse {
            path: path.to_path_buf(),
            json_path: error.path().to_string(),
            source: error.into_inner(),
        }
    })
}
