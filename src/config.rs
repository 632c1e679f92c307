//! Application-level configuration loading, including the advisory phase
//! timer hints pushed to clients.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::lifecycle::TastingPhase;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "BLIND_DRAM_BACK_CONFIG_PATH";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    timers: PhaseTimers,
}

/// Suggested countdown per tasting phase, in seconds. Purely advisory: the
/// server never advances a phase on its own; the moderator paces the table.
#[derive(Debug, Clone)]
pub struct PhaseTimers {
    pub pour: u64,
    pub nosing: u64,
    pub tasting_neat: u64,
    pub tasting_water: u64,
    pub scoring: u64,
    pub palate_reset: u64,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the
    /// baked-in timer hints.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(path = %path.display(), "loaded phase timer hints from config");
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Advisory countdown for the given phase, in seconds.
    pub fn timer_hint_secs(&self, phase: TastingPhase) -> u64 {
        match phase {
            TastingPhase::Pour => self.timers.pour,
            TastingPhase::Nosing => self.timers.nosing,
            TastingPhase::TastingNeat => self.timers.tasting_neat,
            TastingPhase::TastingWater => self.timers.tasting_water,
            TastingPhase::Scoring => self.timers.scoring,
            TastingPhase::PalateReset => self.timers.palate_reset,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timers: PhaseTimers {
                pour: 60,
                nosing: 120,
                tasting_neat: 180,
                tasting_water: 150,
                scoring: 180,
                palate_reset: 90,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    phase_timer_secs: RawPhaseTimers,
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the per-phase timer overrides. Missing entries keep
/// their default.
struct RawPhaseTimers {
    pour: Option<u64>,
    nosing: Option<u64>,
    tasting_neat: Option<u64>,
    tasting_water: Option<u64>,
    scoring: Option<u64>,
    palate_reset: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default().timers;
        let raw = value.phase_timer_secs;
        Self {
            timers: PhaseTimers {
                pour: raw.pour.unwrap_or(defaults.pour),
                nosing: raw.nosing.unwrap_or(defaults.nosing),
                tasting_neat: raw.tasting_neat.unwrap_or(defaults.tasting_neat),
                tasting_water: raw.tasting_water.unwrap_or(defaults.tasting_water),
                scoring: raw.scoring.unwrap_or(defaults.scoring),
                palate_reset: raw.palate_reset.unwrap_or(defaults.palate_reset),
            },
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
