//! Ciel Lab — experiments, journaling and sessions on top of the field runtime
//!
//! - registry: named zero-argument experiments, batch runs
//! - experiments: the seven built-in probes
//! - journal: append-only JSON-lines metrics sink
//! - session: a runtime driving one state, journaling every tick

pub mod experiments;
pub mod journal;
pub mod registry;
pub mod session;

pub use experiments::{builtin_registry, LabConfig, BUILTIN_EXPERIMENTS};
pub use journal::Journal;
pub use registry::{Experiment, FnExperiment, Registry, RunReport};
pub use session::Session;
