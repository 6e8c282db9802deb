//! Runtime and seed configuration
//!
//! All tunable parameters in one place. Loaded from TOML at startup,
//! falls back to defaults if no config file exists. Every field is
//! checked by `validate()` before a runtime is built from it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable overriding the journal path.
pub const ENV_LOG_PATH: &str = "CIEL_LOG_PATH";
/// Environment variable overriding the jitter RNG seed.
pub const ENV_SEED: &str = "CIEL_SEED";

/// The only initial profile the seed builder knows.
pub const GAUSSIAN_CHIRP: &str = "gaussian-chirp";

/// Smallest grid the runtime accepts.
pub const MIN_GRID: usize = 8;
/// Sanity ceiling on grid size.
pub const MAX_GRID: usize = 1024;
/// Upper bound on both integration timesteps.
pub const MAX_DT: f64 = 0.1;

/// Homeostat rate policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HomeostatMode {
    /// `λ_eff = λ_rate`.
    Plain,
    /// `λ_eff = clip(λ_rate · (1 + 0.8·|err|), 0.05, 0.5)`.
    Adaptive,
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Side length of the square grid.
    pub grid_n: usize,
    /// Phase gain applied to the homeostat scalar by the drift operator.
    pub drift_gain: f64,
    /// Harmonic range swept by the drift as the scalar moves through [0, 1].
    pub harmonic_sweep: (u32, u32),
    /// Half-width of the uniform phase jitter (radians).
    pub jitter: f64,
    /// Renormalize ψ after each drift.
    pub renorm: bool,
    /// Step kernel timestep.
    pub kernel_dt: f64,
    /// Kernel sub-steps per runtime tick.
    pub kernel_substeps: u32,
    /// Homeostat base rate.
    pub homeostat_rate: f64,
    /// Homeostat integration timestep.
    pub homeostat_dt: f64,
    /// Homeostat rate policy.
    pub homeostat_mode: HomeostatMode,
    /// Memory synchronizer retention factor.
    pub memory_alpha: f64,
    /// Memory synchronizer input factor.
    pub memory_beta: f64,
    /// Clock base frequency in Hz.
    pub base_hz: f64,
    /// Jitter RNG seed. `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Journal sink. `None` disables journaling.
    pub log_path: Option<PathBuf>,
    /// Coherence floor below which a tick is flagged by the ethics gate.
    pub ethics_min_coherence: f64,
    /// Prefer the parallel array backend when compiled in.
    pub enable_acceleration: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            grid_n: 64,
            drift_gain: 0.05,
            harmonic_sweep: (1, 4),
            jitter: 0.01,
            renorm: true,
            kernel_dt: 0.05,
            kernel_substeps: 1,
            homeostat_rate: 0.2,
            homeostat_dt: 0.05,
            homeostat_mode: HomeostatMode::Adaptive,
            memory_alpha: 0.92,
            memory_beta: 0.08,
            base_hz: 7.83,
            seed: None,
            log_path: None,
            ethics_min_coherence: 0.2,
            enable_acceleration: false,
        }
    }
}

impl RuntimeConfig {
    /// Load config from a TOML file. A missing file yields defaults;
    /// a file that does not parse is an invalid configuration.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let config: Self = toml::from_str(&content).map_err(|e| {
                    Error::invalid_config(format!("{}: {}", path.display(), e))
                })?;
                tracing::info!("Loaded config from {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Apply `CIEL_LOG_PATH` and `CIEL_SEED` from the process environment.
    pub fn with_env(self) -> Result<Self> {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(path) = lookup(ENV_LOG_PATH).filter(|p| !p.trim().is_empty()) {
            self.log_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = lookup(ENV_SEED) {
            let seed = raw.trim().parse::<u64>().map_err(|_| {
                Error::invalid_config(format!("{} must be an unsigned integer, got {:?}", ENV_SEED, raw))
            })?;
            self.seed = Some(seed);
        }
        Ok(self)
    }

    /// Check every field against its declared domain.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_GRID..=MAX_GRID).contains(&self.grid_n) {
            return Err(Error::invalid_config(format!(
                "grid_n must be in [{}, {}], got {}",
                MIN_GRID, MAX_GRID, self.grid_n
            )));
        }
        non_negative("drift_gain", self.drift_gain)?;
        let (h_min, h_max) = self.harmonic_sweep;
        if h_min == 0 || h_min > h_max {
            return Err(Error::invalid_config(format!(
                "harmonic_sweep must satisfy 1 <= h_min <= h_max, got ({}, {})",
                h_min, h_max
            )));
        }
        non_negative("jitter", self.jitter)?;
        timestep("kernel_dt", self.kernel_dt)?;
        if self.kernel_substeps == 0 {
            return Err(Error::invalid_config("kernel_substeps must be >= 1"));
        }
        non_negative("homeostat_rate", self.homeostat_rate)?;
        timestep("homeostat_dt", self.homeostat_dt)?;
        non_negative("memory_alpha", self.memory_alpha)?;
        non_negative("memory_beta", self.memory_beta)?;
        if !self.base_hz.is_finite() || self.base_hz <= 0.0 {
            return Err(Error::invalid_config(format!("base_hz must be > 0, got {}", self.base_hz)));
        }
        if !(0.0..=1.0).contains(&self.ethics_min_coherence) {
            return Err(Error::invalid_config(format!(
                "ethics_min_coherence must be in [0, 1], got {}",
                self.ethics_min_coherence
            )));
        }
        Ok(())
    }

    /// Render the config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

/// Initial state options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Grid side length.
    pub n: usize,
    /// RNG seed handed to the runtime's jitter source.
    pub seed: Option<u64>,
    /// Profile name. Only `gaussian-chirp` is accepted.
    pub initial_profile: String,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            n: 64,
            seed: None,
            initial_profile: GAUSSIAN_CHIRP.to_string(),
        }
    }
}

impl SeedConfig {
    pub fn new(n: usize) -> Self {
        Self { n, ..Self::default() }
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_GRID..=MAX_GRID).contains(&self.n) {
            return Err(Error::invalid_config(format!(
                "seed grid n must be in [{}, {}], got {}",
                MIN_GRID, MAX_GRID, self.n
            )));
        }
        if self.initial_profile != GAUSSIAN_CHIRP {
            return Err(Error::invalid_config(format!(
                "unknown initial_profile {:?} (expected {:?})",
                self.initial_profile, GAUSSIAN_CHIRP
            )));
        }
        Ok(())
    }
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_config(format!("{} must be >= 0, got {}", name, value)))
    }
}

fn timestep(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 && value <= MAX_DT {
        Ok(())
    } else {
        Err(Error::invalid_config(format!("{} must be in (0, {}], got {}", name, MAX_DT, value)))
    }
}
