//! A runtime, the state it is driving, and an optional journal.
//!
//! `advance` steps once and journals the tick's metrics. If the journal
//! append fails the error is returned, but the state has already moved on.

use ciel_core::{Error, Metrics, Result, RuntimeConfig};
use ciel_field::{numeric, FieldState, Runtime};
use tracing::info;

use crate::journal::Journal;

#[derive(Debug)]
pub struct Session {
    runtime: Runtime,
    state: FieldState,
    journal: Option<Journal>,
    tick: u64,
}

impl Session {
    pub fn new(runtime: Runtime, state: FieldState) -> Result<Self> {
        let n = runtime.config().grid_n;
        if state.shape() != (n, n) {
            return Err(Error::shape_mismatch((n, n), state.shape()));
        }
        Ok(Self {
            runtime,
            state,
            journal: None,
            tick: 0,
        })
    }

    /// Runtime, seed state and journal all taken from one config.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self> {
        let runtime = Runtime::from_config_default_backend(config)?;
        let mut session = Self::new(runtime, numeric::seed(config.grid_n))?;
        if let Some(path) = &config.log_path {
            info!(path = %path.display(), "journaling ticks");
            session.journal = Some(Journal::new(path));
        }
        Ok(session)
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn state(&self) -> &FieldState {
        &self.state
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn journal(&self) -> Option<&Journal> {
        self.journal.as_ref()
    }

    /// Ticks completed so far.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// One runtime tick with the configured sub-steps and timestep.
    pub fn advance(&mut self) -> Result<Metrics> {
        let (next, metrics) = self.runtime.tick(self.state.clone())?;
        self.state = next;
        self.tick += 1;
        if let Some(journal) = &self.journal {
            journal.log(self.tick, &metrics)?;
        }
        Ok(metrics)
    }

    /// Advance `ticks` times; returns the last tick's metrics.
    pub fn run(&mut self, ticks: u32) -> Result<Metrics> {
        let mut last = Metrics::new();
        for _ in 0..ticks {
            last = self.advance()?;
        }
        Ok(last)
    }

    pub fn into_state(self) -> FieldState {
        self.state
    }
}
