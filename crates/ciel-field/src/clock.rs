//! Monotonic phase clock.
//!
//! `phase(k, t) = (2π · base_hz · k · (t − t0)) mod 2π`, where `t0` is read
//! from the time source when the clock is built. Time sources are
//! monotonic; wall time is never consulted.

use ndarray::Array2;
use num_complex::Complex64;
use std::f64::consts::TAU;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::numeric::ComplexField;

/// Default base frequency in Hz.
pub const DEFAULT_BASE_HZ: f64 = 7.83;

/// Producer of monotonic seconds.
pub trait TimeSource: Send + Sync + fmt::Debug {
    fn now_secs(&self) -> f64;
}

/// Seconds since the source was created, from `Instant`.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicSource {
    origin: Instant,
}

impl MonotonicSource {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicSource {
    fn now_secs(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Hand-driven source for replay and tests. Shareable; `set` and
/// `advance` are visible to every clock holding it.
#[derive(Debug, Default)]
pub struct ManualSource {
    bits: AtomicU64,
}

impl ManualSource {
    pub fn new(secs: f64) -> Self {
        Self { bits: AtomicU64::new(secs.to_bits()) }
    }

    pub fn set(&self, secs: f64) {
        self.bits.store(secs.to_bits(), Ordering::SeqCst);
    }

    pub fn advance(&self, secs: f64) {
        let now = self.now_secs();
        self.set(now + secs);
    }
}

impl TimeSource for ManualSource {
    fn now_secs(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}

#[derive(Debug, Clone)]
pub struct Clock {
    base_hz: f64,
    t0: f64,
    source: Arc<dyn TimeSource>,
}

impl Clock {
    /// Clock on a fresh monotonic source.
    pub fn new(base_hz: f64) -> Self {
        Self::with_source(base_hz, Arc::new(MonotonicSource::new()))
    }

    /// Clock on an injected source; `t0` is captured now.
    pub fn with_source(base_hz: f64, source: Arc<dyn TimeSource>) -> Self {
        let t0 = source.now_secs();
        Self { base_hz, t0, source }
    }

    pub fn base_hz(&self) -> f64 {
        self.base_hz
    }

    pub fn t0(&self) -> f64 {
        self.t0
    }

    pub fn now(&self) -> f64 {
        self.source.now_secs()
    }

    /// Phase of harmonic `k` at time `t` (or now), in `[0, 2π)`.
    pub fn phase(&self, k: u32, t: Option<f64>) -> f64 {
        let t = t.unwrap_or_else(|| self.now());
        let raw = TAU * self.base_hz * f64::from(k) * (t - self.t0);
        wrap_phase(raw)
    }

    /// Constant field `amp · exp(i · phase(k))` broadcast over `shape`.
    pub fn carrier(&self, shape: (usize, usize), amp: f64, k: u32) -> ComplexField {
        Array2::from_elem(shape, Complex64::from_polar(amp, self.phase(k, None)))
    }
}

/// Reduce an angle into `[0, 2π)`. Non-finite input maps to 0.
pub fn wrap_phase(theta: f64) -> f64 {
    if !theta.is_finite() {
        return 0.0;
    }
    let wrapped = theta.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_phase_range() {
        assert_eq!(wrap_phase(0.0), 0.0);
        assert_eq!(wrap_phase(TAU), 0.0);
        assert!(wrap_phase(-1e-18) < TAU);
        assert!((wrap_phase(-0.5) - (TAU - 0.5)).abs() < 1e-12);
        assert_eq!(wrap_phase(f64::NAN), 0.0);
    }

    #[test]
    fn manual_source_advances() {
        let src = ManualSource::new(1.0);
        src.advance(0.25);
        assert_eq!(src.now_secs(), 1.25);
        src.set(-3.0);
        assert_eq!(src.now_secs(), -3.0);
    }

    #[test]
    fn monotonic_source_never_goes_back() {
        let src = MonotonicSource::new();
        let a = src.now_secs();
        let b = src.now_secs();
        assert!(b >= a);
    }
}
