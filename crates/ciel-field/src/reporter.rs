//! Scalar diagnostics derived from a state.

use ciel_core::metrics::{STATUS_KEY, STATUS_NON_FINITE, STATUS_OK};
use ciel_core::Metrics;
use std::sync::Arc;

use crate::backend::{ArrayBackend, CpuBackend};
use crate::numeric;
use crate::state::FieldState;

pub const COHERENCE: &str = "coherence";
pub const SIGMA_MEAN: &str = "sigma_mean";
pub const OMEGA_VAR: &str = "omega_var";

#[derive(Debug, Clone)]
pub struct Reporter {
    backend: Arc<dyn ArrayBackend>,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(Arc::new(CpuBackend))
    }
}

impl Reporter {
    pub fn new(backend: Arc<dyn ArrayBackend>) -> Self {
        Self { backend }
    }

    /// `{coherence, sigma_mean, omega_var}`. Pure.
    pub fn metrics(&self, state: &FieldState) -> Metrics {
        let omega = state.omega();
        let omega_mean = self.backend.mean(omega);
        let omega_var = self
            .backend
            .mean(&omega.mapv(|w| (w - omega_mean) * (w - omega_mean)));
        Metrics::new()
            .with(COHERENCE, numeric::coherence(state.psi()))
            .with(SIGMA_MEAN, self.backend.mean(state.sigma()))
            .with(OMEGA_VAR, omega_var)
    }

    /// `metrics` plus a `status` of `ok` or `non-finite`.
    pub fn metrics_with_status(&self, state: &FieldState) -> Metrics {
        let status = if state.is_finite() { STATUS_OK } else { STATUS_NON_FINITE };
        self.metrics(state).with(STATUS_KEY, status)
    }
}
