//! Ciel Field — the field-evolution runtime
//!
//! A complex field ψ on an n×n grid, carried together with σ (local
//! intensity), λ (coupling, reserved) and ω (σ integrator):
//! - numeric: Laplacian, RMS norm, coherence, seed builder
//! - clock: monotonic phase oracle on an injectable time source
//! - kernel: explicit finite-difference step
//! - homeostat: scalar tracking the energy of ψ
//! - drift: clock-keyed phase rotation with seeded jitter
//! - memory: moving average of |ψ|
//! - reporter: scalar diagnostics
//! - runtime: all of the above composed into one `step`

pub mod backend;
pub mod clock;
pub mod drift;
pub mod homeostat;
pub mod kernel;
pub mod memory;
pub mod numeric;
pub mod reporter;
pub mod runtime;
pub mod state;

pub use backend::{select_backend, ArrayBackend, CpuBackend};
pub use clock::{Clock, ManualSource, MonotonicSource, TimeSource};
pub use drift::{DriftOperator, DriftParams, Harmonic};
pub use homeostat::Homeostat;
pub use kernel::StepKernel;
pub use memory::MemorySync;
pub use numeric::{coherence, laplacian, rms_norm, seed, seed_from_config, ComplexField, RealField};
pub use reporter::Reporter;
pub use runtime::Runtime;
pub use state::FieldState;

#[cfg(feature = "parallel")]
pub use backend::ParallelBackend;
