//! Explicit finite-difference step kernel.
//!
//!   ψ' = ψ + i·dt·L(ψ)
//!   σ' = σ + dt·(|ψ|² − σ)
//!   λ' = λ
//!   ω' = ω + dt·(σ' − σ)
//!   ψ' ← ψ' / ‖ψ'‖
//!
//! The kernel never fails. NaN in the input propagates to the output and
//! shows up in the reporter's `status`.

use num_complex::Complex64;
use std::sync::Arc;

use crate::backend::{ArrayBackend, CpuBackend};
use crate::state::FieldState;

/// Default kernel timestep.
pub const DEFAULT_DT: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct StepKernel {
    backend: Arc<dyn ArrayBackend>,
}

impl Default for StepKernel {
    fn default() -> Self {
        Self::new(Arc::new(CpuBackend))
    }
}

impl StepKernel {
    pub fn new(backend: Arc<dyn ArrayBackend>) -> Self {
        Self { backend }
    }

    /// Advance `state` by one tick of length `dt`.
    pub fn step(&self, state: &FieldState, dt: f64) -> FieldState {
        let b = self.backend.as_ref();
        let psi = state.psi();
        let sigma = state.sigma();

        let lap = b.laplacian_complex(psi);
        let idt = Complex64::new(0.0, dt);
        let psi_next = b.zip_complex(psi, &lap, &move |p, l| p + idt * l);

        let intensity = b.abs_sq(psi);
        let sigma_next = b.zip_real(sigma, &intensity, &move |s, i| s + dt * (i - s));

        let d_sigma = b.zip_real(&sigma_next, sigma, &|next, prev| next - prev);
        let omega_next = b.zip_real(state.omega(), &d_sigma, &move |w, ds| w + dt * ds);

        let psi_next = b.normalize(&psi_next);

        FieldState::from_parts_unchecked(psi_next, sigma_next, state.lambda().clone(), omega_next)
    }

    /// Apply `step` `k` times.
    pub fn run(&self, state: &FieldState, k: u32, dt: f64) -> FieldState {
        let mut current = state.clone();
        for _ in 0..k {
            current = self.step(&current, dt);
        }
        current
    }
}
