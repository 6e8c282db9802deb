//! Experiment registry and trait definitions
//!
//! Each experiment is a named, zero-argument procedure that returns a
//! metrics record. Experiments are added by name; adding a name twice
//! keeps the later one.

use ciel_core::{Error, Metrics, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// A named probe. Implement this to add a new experiment.
pub trait Experiment: Send + Sync {
    /// Unique experiment name (e.g. "norm_stability").
    fn name(&self) -> &str;

    /// One-line description for listings.
    fn description(&self) -> &str {
        ""
    }

    /// Run the probe. Errors propagate to the caller of `Registry::run`.
    fn execute(&self) -> Result<Metrics>;
}

/// Adapter turning a closure into an `Experiment`.
pub struct FnExperiment<F> {
    name: String,
    description: String,
    f: F,
}

impl<F> FnExperiment<F>
where
    F: Fn() -> Result<Metrics> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            f,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl<F> Experiment for FnExperiment<F>
where
    F: Fn() -> Result<Metrics> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn execute(&self) -> Result<Metrics> {
        (self.f)()
    }
}

/// Results of a batch run, in the order the names were requested.
/// A name requested twice keeps its first position and its last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    entries: Vec<(String, Metrics)>,
}

impl RunReport {
    fn record(&mut self, name: &str, metrics: Metrics) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = metrics,
            None => self.entries.push((name.to_string(), metrics)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Metrics> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, m)| m)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Metrics)> {
        self.entries.iter().map(|(n, m)| (n.as_str(), m))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for RunReport {
    type Item = (String, Metrics);
    type IntoIter = std::vec::IntoIter<(String, Metrics)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

pub struct Registry {
    experiments: HashMap<String, Arc<dyn Experiment>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("experiments", &self.list())
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self { experiments: HashMap::new() }
    }

    /// Register an experiment. Replaces any existing one with the same name.
    pub fn register(&mut self, experiment: impl Experiment + 'static) -> Result<()> {
        let name = experiment.name().to_string();
        if name.is_empty() {
            return Err(Error::invalid_config("experiment name must not be empty"));
        }
        if self.experiments.insert(name.clone(), Arc::new(experiment)).is_some() {
            debug!(experiment = %name, "replaced registration");
        }
        Ok(())
    }

    /// Register a closure under `name`.
    pub fn add<F>(&mut self, name: impl Into<String>, f: F) -> Result<()>
    where
        F: Fn() -> Result<Metrics> + Send + Sync + 'static,
    {
        self.register(FnExperiment::new(name, f))
    }

    /// Remove an experiment by name.
    pub fn remove(&mut self, name: &str) -> bool {
        self.experiments.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Experiment>> {
        self.experiments.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.experiments.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.experiments.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    /// Run one experiment; unknown names are an error here.
    pub fn run_one(&self, name: &str) -> Result<Metrics> {
        let experiment = self
            .get(name)
            .ok_or_else(|| Error::UnknownExperiment(name.to_string()))?;
        info!(experiment = %name, "running");
        experiment.execute()
    }

    /// Run each named experiment once per mention, in order. Unknown
    /// names are skipped; the first failing experiment aborts the batch.
    pub fn run<I, S>(&self, names: I) -> Result<RunReport>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = RunReport::default();
        for name in names {
            let name = name.as_ref();
            match self.experiments.get(name) {
                Some(experiment) => {
                    info!(experiment = %name, "running");
                    let metrics = experiment.execute()?;
                    report.record(name, metrics);
                }
                None => debug!(experiment = %name, "skipping unknown experiment"),
            }
        }
        Ok(report)
    }
}
