//! Runtime composer: clock + drift + kernel + homeostat + memory + reporter.
//!
//! One tick:
//!   1. ψ ← drift(ψ, σ_scalar)
//!   2. state ← kernel(state, dt), k times
//!   3. σ_scalar ← homeostat(ψ)
//!   4. m ← memory(σ, ψ)
//!   5. metrics = reporter(state) ∪ {sigma_scalar, memory_mean, harmonic, status}

use ciel_core::metrics::{STATUS_KEY, STATUS_NON_FINITE};
use ciel_core::{Error, Metrics, Result, RuntimeConfig};
use rand::RngCore;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::{select_backend, ArrayBackend};
use crate::clock::Clock;
use crate::drift::{DriftOperator, DriftParams, Harmonic};
use crate::homeostat::Homeostat;
use crate::kernel::StepKernel;
use crate::memory::MemorySync;
use crate::reporter::{Reporter, COHERENCE};
use crate::state::FieldState;

pub const SIGMA_SCALAR: &str = "sigma_scalar";
pub const MEMORY_MEAN: &str = "memory_mean";
pub const HARMONIC: &str = "harmonic";

#[derive(Debug)]
pub struct Runtime {
    config: RuntimeConfig,
    backend: Arc<dyn ArrayBackend>,
    drift: DriftOperator,
    kernel: StepKernel,
    homeostat: Homeostat,
    memory: MemorySync,
    reporter: Reporter,
    ticks: u64,
}

impl Runtime {
    /// Runtime with default parameters on an `grid_n` grid.
    pub fn build(backend: Arc<dyn ArrayBackend>, grid_n: usize) -> Result<Self> {
        let config = RuntimeConfig { grid_n, ..RuntimeConfig::default() };
        Self::from_config(&config, backend)
    }

    /// Runtime from a full config; the backend is chosen from
    /// `enable_acceleration`.
    pub fn from_config_default_backend(config: &RuntimeConfig) -> Result<Self> {
        Self::from_config(config, select_backend(config.enable_acceleration))
    }

    pub fn from_config(config: &RuntimeConfig, backend: Arc<dyn ArrayBackend>) -> Result<Self> {
        config.validate()?;

        let (h_min, h_max) = config.harmonic_sweep;
        let params = DriftParams {
            drift_gain: config.drift_gain,
            harmonic: Harmonic::Sweep { min: h_min, max: h_max },
            jitter: config.jitter,
            renorm: config.renorm,
        };
        let clock = Clock::new(config.base_hz);
        let drift = match config.seed {
            Some(seed) => DriftOperator::seeded(params, clock, seed)?,
            None => DriftOperator::new(params, clock)?,
        }
        .with_backend(backend.clone());

        let homeostat = Homeostat::new(
            config.homeostat_rate,
            config.homeostat_dt,
            0.0,
            config.homeostat_mode,
        )?
        .with_backend(backend.clone());

        info!(
            grid_n = config.grid_n,
            backend = backend.name(),
            seed = ?config.seed,
            "runtime built"
        );

        Ok(Self {
            config: config.clone(),
            kernel: StepKernel::new(backend.clone()),
            memory: MemorySync::new(config.memory_alpha, config.memory_beta)
                .with_backend(backend.clone()),
            reporter: Reporter::new(backend.clone()),
            backend,
            drift,
            homeostat,
            ticks: 0,
        })
    }

    /// Swap the drift clock (e.g. for a `ManualSource`).
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.drift = self.drift.with_clock(clock);
        self
    }

    /// Swap the drift jitter RNG.
    pub fn with_rng(mut self, rng: Box<dyn RngCore + Send>) -> Self {
        self.drift = self.drift.with_rng(rng);
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn sigma_scalar(&self) -> f64 {
        self.homeostat.sigma()
    }

    pub fn memory(&self) -> Option<&crate::numeric::RealField> {
        self.memory.buffer()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// One tick with `k` kernel steps of length `dt`.
    pub fn step(&mut self, mut state: FieldState, k: u32, dt: f64) -> Result<(FieldState, Metrics)> {
        let n = self.config.grid_n;
        if state.shape() != (n, n) {
            return Err(Error::shape_mismatch((n, n), state.shape()));
        }
        if k == 0 {
            return Err(Error::invalid_config("kernel step count must be >= 1"));
        }
        if !dt.is_finite() || dt <= 0.0 || dt > ciel_core::config::MAX_DT {
            return Err(Error::invalid_config(format!("kernel dt must be in (0, 0.1], got {}", dt)));
        }

        let psi = self.drift.step(state.psi(), self.homeostat.sigma(), None);
        state.set_psi(psi);

        let state = self.kernel.run(&state, k, dt);

        let sigma_scalar = self.homeostat.step(state.psi());
        let memory_mean = self.backend.mean(self.memory.update(state.sigma(), state.psi()));

        let mut metrics = self.reporter.metrics_with_status(&state);
        metrics.insert(SIGMA_SCALAR, sigma_scalar);
        metrics.insert(MEMORY_MEAN, memory_mean);
        metrics.insert(HARMONIC, self.drift.last_harmonic());

        self.ticks += 1;
        if metrics.get_str(STATUS_KEY) == Some(STATUS_NON_FINITE) {
            warn!(tick = self.ticks, "state went non-finite");
        } else if !self.ethics_ok(&metrics) {
            warn!(
                tick = self.ticks,
                coherence = metrics.get_f64(COHERENCE),
                floor = self.config.ethics_min_coherence,
                "coherence below ethics floor"
            );
        }
        debug!(tick = self.ticks, sigma_scalar, "tick");

        Ok((state, metrics))
    }

    /// One tick with the configured sub-step count and kernel timestep.
    pub fn tick(&mut self, state: FieldState) -> Result<(FieldState, Metrics)> {
        let (k, dt) = (self.config.kernel_substeps, self.config.kernel_dt);
        self.step(state, k, dt)
    }

    /// Coherence at or above the configured floor.
    pub fn ethics_ok(&self, metrics: &Metrics) -> bool {
        metrics
            .get_f64(COHERENCE)
            .map(|c| c >= self.config.ethics_min_coherence)
            .unwrap_or(false)
    }
}
