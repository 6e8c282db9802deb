//! Homeostat (RCDE calibrator): a scalar that follows the energy of ψ.
//!
//!   target = mean(|ψ|²)
//!   err    = target − σ
//!   σ'     = clip(σ + dt · λ_eff · err, 0, 1.5)
//!
//! Plain mode uses `λ_eff = λ_rate`; adaptive mode speeds up on large
//! errors, `λ_eff = clip(λ_rate · (1 + 0.8·|err|), 0.05, 0.5)`.

use ciel_core::{Error, HomeostatMode, Result};
use std::sync::Arc;

use crate::backend::{ArrayBackend, CpuBackend};
use crate::numeric::ComplexField;

pub const SIGMA_BOUNDS: (f64, f64) = (0.0, 1.5);
pub const ADAPTIVE_RATE_BOUNDS: (f64, f64) = (0.05, 0.5);
const ADAPTIVE_GAIN: f64 = 0.8;

#[derive(Debug, Clone)]
pub struct Homeostat {
    rate: f64,
    dt: f64,
    sigma: f64,
    mode: HomeostatMode,
    backend: Arc<dyn ArrayBackend>,
}

impl Homeostat {
    /// Build a homeostat; `sigma` is clipped into bounds.
    pub fn new(rate: f64, dt: f64, sigma: f64, mode: HomeostatMode) -> Result<Self> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(Error::invalid_config(format!("homeostat rate must be >= 0, got {}", rate)));
        }
        if !dt.is_finite() || dt <= 0.0 || dt > ciel_core::config::MAX_DT {
            return Err(Error::invalid_config(format!("homeostat dt must be in (0, 0.1], got {}", dt)));
        }
        Ok(Self {
            rate,
            dt,
            sigma: clip_sigma(sigma),
            mode,
            backend: Arc::new(CpuBackend),
        })
    }

    pub fn plain(rate: f64, dt: f64, sigma: f64) -> Result<Self> {
        Self::new(rate, dt, sigma, HomeostatMode::Plain)
    }

    pub fn adaptive(rate: f64, dt: f64, sigma: f64) -> Result<Self> {
        Self::new(rate, dt, sigma, HomeostatMode::Adaptive)
    }

    pub fn with_backend(mut self, backend: Arc<dyn ArrayBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn mode(&self) -> HomeostatMode {
        self.mode
    }

    /// Rate actually applied for a given error.
    pub fn effective_rate(&self, err: f64) -> f64 {
        match self.mode {
            HomeostatMode::Plain => self.rate,
            HomeostatMode::Adaptive => {
                let (lo, hi) = ADAPTIVE_RATE_BOUNDS;
                (self.rate * (1.0 + ADAPTIVE_GAIN * err.abs())).clamp(lo, hi)
            }
        }
    }

    /// Track the energy of `psi`; returns the new scalar.
    pub fn step(&mut self, psi: &ComplexField) -> f64 {
        let target = self.backend.mean_abs_sq(psi);
        self.step_toward(target)
    }

    /// Track an explicit target.
    pub fn step_toward(&mut self, target: f64) -> f64 {
        let err = target - self.sigma;
        let next = self.sigma + self.dt * self.effective_rate(err) * err;
        // NaN targets leave the scalar where it was
        if next.is_finite() {
            self.sigma = clip_sigma(next);
        }
        self.sigma
    }

    /// Steps after which a constant target is tracked within 0.05,
    /// `ceil(5 / (λ · dt))`. Adaptive mode counts with the slowest rate
    /// it can apply, `clip(λ_rate, 0.05, 0.5)`.
    pub fn settle_steps(&self) -> usize {
        let rate = match self.mode {
            HomeostatMode::Plain => self.rate,
            HomeostatMode::Adaptive => {
                let (lo, hi) = ADAPTIVE_RATE_BOUNDS;
                self.rate.clamp(lo, hi)
            }
        };
        let rate_dt = rate * self.dt;
        if rate_dt <= 0.0 {
            return 0;
        }
        (5.0 / rate_dt).ceil() as usize
    }
}

fn clip_sigma(sigma: f64) -> f64 {
    if sigma.is_nan() {
        return SIGMA_BOUNDS.0;
    }
    sigma.clamp(SIGMA_BOUNDS.0, SIGMA_BOUNDS.1)
}
