//! Memory synchronizer: an exponential moving average of |ψ|.
//!
//!   m' = α·m + β·|ψ|
//!
//! The buffer starts as a copy of the first σ it is shown. α + β need not
//! be 1.

use std::sync::Arc;

use crate::backend::{ArrayBackend, CpuBackend};
use crate::numeric::{ComplexField, RealField};

pub const DEFAULT_ALPHA: f64 = 0.92;
pub const DEFAULT_BETA: f64 = 0.08;

#[derive(Debug, Clone)]
pub struct MemorySync {
    alpha: f64,
    beta: f64,
    buffer: Option<RealField>,
    backend: Arc<dyn ArrayBackend>,
}

impl Default for MemorySync {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHA, DEFAULT_BETA)
    }
}

impl MemorySync {
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self {
            alpha,
            beta,
            buffer: None,
            backend: Arc::new(CpuBackend),
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn ArrayBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Fold the current |ψ| into the buffer and return it.
    pub fn update(&mut self, sigma: &RealField, psi: &ComplexField) -> &RealField {
        let magnitude = self.backend.abs(psi);
        let (alpha, beta) = (self.alpha, self.beta);
        let previous = match self.buffer.take() {
            Some(m) if m.dim() == sigma.dim() => m,
            _ => sigma.clone(),
        };
        let next = self
            .backend
            .zip_real(&previous, &magnitude, &move |m, a| alpha * m + beta * a);
        self.buffer.insert(next)
    }

    pub fn buffer(&self) -> Option<&RealField> {
        self.buffer.as_ref()
    }

    /// Forget the buffer; the next update re-seeds from σ.
    pub fn reset(&mut self) {
        self.buffer = None;
    }
}
