//! Phase-drift operator.
//!
//! Rotates ψ by `drift_gain · σ + phase`, where the phase comes from the
//! clock at a harmonic picked from σ plus uniform jitter. Each operator
//! owns its jitter RNG; seed it for reproducible runs.

use ciel_core::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::fmt;
use std::sync::Arc;

use crate::backend::{ArrayBackend, CpuBackend};
use crate::clock::Clock;
use crate::numeric::ComplexField;

/// How the drift picks its harmonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Harmonic {
    Fixed(u32),
    /// `round(min + (max − min) · clip(σ, 0, 1))`.
    Sweep { min: u32, max: u32 },
}

impl Harmonic {
    pub fn pick(&self, sigma_scalar: f64) -> u32 {
        match *self {
            Harmonic::Fixed(h) => h,
            Harmonic::Sweep { min, max } => {
                let s = if sigma_scalar.is_nan() { 0.0 } else { sigma_scalar.clamp(0.0, 1.0) };
                let h = (f64::from(min) + f64::from(max - min) * s).round() as u32;
                h.clamp(min, max)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct DriftParams {
    pub drift_gain: f64,
    pub harmonic: Harmonic,
    pub jitter: f64,
    pub renorm: bool,
}

impl Default for DriftParams {
    fn default() -> Self {
        Self {
            drift_gain: 0.05,
            harmonic: Harmonic::Sweep { min: 1, max: 4 },
            jitter: 0.0,
            renorm: true,
        }
    }
}

impl DriftParams {
    pub fn validate(&self) -> Result<()> {
        if !self.drift_gain.is_finite() || self.drift_gain < 0.0 {
            return Err(Error::invalid_config(format!("drift_gain must be >= 0, got {}", self.drift_gain)));
        }
        if !self.jitter.is_finite() || self.jitter < 0.0 {
            return Err(Error::invalid_config(format!("jitter must be >= 0, got {}", self.jitter)));
        }
        match self.harmonic {
            Harmonic::Fixed(0) => Err(Error::invalid_config("harmonic must be >= 1")),
            Harmonic::Sweep { min, max } if min == 0 || min > max => Err(Error::invalid_config(
                format!("harmonic sweep must satisfy 1 <= min <= max, got ({}, {})", min, max),
            )),
            _ => Ok(()),
        }
    }
}

pub struct DriftOperator {
    params: DriftParams,
    clock: Clock,
    rng: Box<dyn RngCore + Send>,
    backend: Arc<dyn ArrayBackend>,
    last_harmonic: u32,
}

impl fmt::Debug for DriftOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriftOperator")
            .field("params", &self.params)
            .field("clock", &self.clock)
            .field("backend", &self.backend.name())
            .field("last_harmonic", &self.last_harmonic)
            .finish()
    }
}

impl DriftOperator {
    /// Operator with an entropy-seeded RNG.
    pub fn new(params: DriftParams, clock: Clock) -> Result<Self> {
        params.validate()?;
        let last_harmonic = params.harmonic.pick(0.0);
        Ok(Self {
            params,
            clock,
            rng: Box::new(StdRng::from_entropy()),
            backend: Arc::new(CpuBackend),
            last_harmonic,
        })
    }

    /// Operator with a reproducible jitter sequence.
    pub fn seeded(params: DriftParams, clock: Clock, seed: u64) -> Result<Self> {
        Ok(Self::new(params, clock)?.with_rng(Box::new(StdRng::seed_from_u64(seed))))
    }

    pub fn with_rng(mut self, rng: Box<dyn RngCore + Send>) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn ArrayBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn params(&self) -> &DriftParams {
        &self.params
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Harmonic used by the most recent `step`.
    pub fn last_harmonic(&self) -> u32 {
        self.last_harmonic
    }

    /// Total rotation applied for the given scalar and time, jitter included.
    fn angle(&mut self, sigma_scalar: f64, t: Option<f64>) -> f64 {
        let h = self.params.harmonic.pick(sigma_scalar);
        self.last_harmonic = h;
        let mut phase = self.clock.phase(h, t);
        if self.params.jitter > 0.0 {
            // unit draw then scale; `-j..=j` overflows for huge j
            phase += self.rng.gen_range(-1.0..=1.0) * self.params.jitter;
        }
        self.params.drift_gain * sigma_scalar + phase
    }

    /// `ψ · exp(i·(gain·σ + phase))`, renormalized when configured.
    pub fn step(&mut self, psi: &ComplexField, sigma_scalar: f64, t: Option<f64>) -> ComplexField {
        let theta = self.angle(sigma_scalar, t);
        let rotated = self.backend.rotate_phase(psi, theta);
        if self.params.renorm {
            self.backend.normalize(&rotated)
        } else {
            rotated
        }
    }
}
