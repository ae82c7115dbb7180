//! Robot configuration – reads `~/.rivet/config.toml`.
//!
//! ```toml
//! mode = "simulated"
//! tick_period_ms = 20
//! max_volts = 12.0
//! replay_log = "/var/log/rivet/match-42"
//!
//! [safety_limits]
//! Intake = 40.0
//!
//! [parameters."Shooter/Flywheel/kP"]
//! live = 0.0007
//! simulated = 0.001
//! replay = 0.0007
//! ```
//!
//! Every field is optional; missing ones keep the built-in values.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rivet_kernel::defaults::ParameterTable;
use rivet_kernel::interlock::SafetyLimits;
use rivet_runtime::RobotConfig;
use rivet_types::{ExecutionMode, NOMINAL_VOLTS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value: {0}")]
    Invalid(String),
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mode: ExecutionMode,
    pub tick_period_ms: u64,
    pub max_volts: f64,
    /// Per-mechanism current ceilings in amps, layered over the built-ins.
    pub safety_limits: SafetyLimits,
    /// Per-mode defaults layered over the built-in table.
    pub parameters: ParameterTable,
    /// Directory of `<Mechanism>.jsonl` replay logs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay_log: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Simulated,
            tick_period_ms: 20,
            max_volts: NOMINAL_VOLTS,
            safety_limits: SafetyLimits::new(),
            parameters: ParameterTable::new(),
            replay_log: None,
        }
    }
}

impl Config {
    /// Resolve into the robot's startup configuration.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] for a zero tick period or a non-positive
    /// voltage clamp.
    pub fn into_robot_config(self) -> Result<RobotConfig, ConfigError> {
        if self.tick_period_ms == 0 {
            return Err(ConfigError::Invalid("tick_period_ms must be > 0".into()));
        }
        if !(self.max_volts > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "max_volts must be > 0, got {}",
                self.max_volts
            )));
        }
        let mut limits = SafetyLimits::builtin();
        limits.merge(self.safety_limits);
        let mut parameters = ParameterTable::builtin();
        parameters.merge(self.parameters);
        Ok(RobotConfig {
            mode: self.mode,
            period: Duration::from_millis(self.tick_period_ms),
            max_volts: self.max_volts,
            limits,
            parameters,
            replay_dir: self.replay_log,
            ..RobotConfig::default()
        })
    }
}

/// `~/.rivet/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".rivet").join("config.toml")
}

/// Load `path`, or the defaults when it does not exist, then apply
/// environment overrides.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let mut cfg = load_from(path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// `None` when `path` does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(cfg))
}

/// Apply `RIVET_*` environment overrides.
///
/// | Variable | Config field |
/// |---|---|
/// | `RIVET_MODE` | `mode` |
/// | `RIVET_TICK_MS` | `tick_period_ms` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("RIVET_MODE")
        && let Ok(mode) = v.parse::<ExecutionMode>()
    {
        cfg.mode = mode;
    }
    if let Ok(v) = std::env::var("RIVET_TICK_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.tick_period_ms = ms;
    }
}
