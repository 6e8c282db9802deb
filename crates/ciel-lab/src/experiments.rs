//! Built-in experiments.
//!
//! Every probe runs on a hand-driven clock and a seeded jitter RNG, so the
//! same `LabConfig` always yields the same metrics.

use ciel_core::{Error, Metrics, Result, RuntimeConfig};
use ciel_field::clock::wrap_phase;
use ciel_field::numeric::{mean_abs_sq, overlap};
use ciel_field::{
    coherence, seed, select_backend, Clock, DriftOperator, DriftParams, FieldState, Harmonic,
    Homeostat, ManualSource, Runtime, StepKernel,
};
use ndarray::{s, Zip};
use num_complex::Complex64;
use std::f64::consts::{PI, TAU};
use std::sync::Arc;

use crate::registry::{FnExperiment, Registry};
use crate::session::Session;

pub const NORM_STABILITY: &str = "norm_stability";
pub const PHASE_DRIFT: &str = "phase_drift";
pub const HOMEOSTAT_CONVERGENCE: &str = "homeostat_convergence";
pub const PAIRED_EMPATHY: &str = "paired_empathy";
pub const BOOT_RITUAL: &str = "boot_ritual";
pub const DISSOCIATION: &str = "dissociation";
pub const PARADOX_STRESS: &str = "paradox_stress";

pub const BUILTIN_EXPERIMENTS: [&str; 7] = [
    NORM_STABILITY,
    PHASE_DRIFT,
    HOMEOSTAT_CONVERGENCE,
    PAIRED_EMPATHY,
    BOOT_RITUAL,
    DISSOCIATION,
    PARADOX_STRESS,
];

const NORM_TOLERANCE: f64 = 1e-6;
const PHASE_TOLERANCE: f64 = 1e-9;
const EMPATHY_COUPLING: f64 = 0.1;

/// Parameters shared by the built-in experiments.
#[derive(Debug, Clone)]
pub struct LabConfig {
    /// Ticks (or kernel steps) per experiment.
    pub steps: u32,
    /// Grid side length.
    pub grid_n: usize,
    /// Jitter seed.
    pub seed: u64,
    /// Base runtime parameters; `grid_n` and `seed` above override theirs.
    pub runtime: RuntimeConfig,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            steps: 50,
            grid_n: 32,
            seed: 7,
            runtime: RuntimeConfig::default(),
        }
    }
}

impl LabConfig {
    pub fn validate(&self) -> Result<()> {
        if self.steps == 0 {
            return Err(Error::invalid_config("steps must be >= 1"));
        }
        self.runtime_config().validate()
    }

    /// Runtime config with the lab's grid and seed applied.
    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            grid_n: self.grid_n,
            seed: Some(self.seed),
            ..self.runtime.clone()
        }
    }

    /// Runtime on a hand-driven clock starting at t = 0.
    fn runtime_with(&self, config: &RuntimeConfig) -> Result<(Runtime, Arc<ManualSource>)> {
        let source = Arc::new(ManualSource::new(0.0));
        let clock = Clock::with_source(config.base_hz, source.clone());
        let runtime = Runtime::from_config(config, select_backend(config.enable_acceleration))?
            .with_clock(clock);
        Ok((runtime, source))
    }

    fn tick_secs(&self, config: &RuntimeConfig) -> f64 {
        config.kernel_dt * f64::from(config.kernel_substeps)
    }
}

/// Registry holding all seven built-ins bound to `config`.
pub fn builtin_registry(config: LabConfig) -> Result<Registry> {
    config.validate()?;
    let mut registry = Registry::new();
    let entries: [(&str, &str, fn(&LabConfig) -> Result<Metrics>); 7] = [
        (NORM_STABILITY, "kernel keeps ψ at unit RMS", norm_stability),
        (PHASE_DRIFT, "drift rotates ψ by the clock phase", phase_drift),
        (HOMEOSTAT_CONVERGENCE, "homeostat settles on field energy", homeostat_convergence),
        (PAIRED_EMPATHY, "two coupled runtimes attune", paired_empathy),
        (BOOT_RITUAL, "full runtime wakes from the seed", boot_ritual),
        (DISSOCIATION, "split-phase seed against an intact one", dissociation),
        (PARADOX_STRESS, "runtime under heavy drift and jitter", paradox_stress),
    ];
    for (name, description, probe) in entries {
        let cfg = config.clone();
        registry.register(FnExperiment::new(name, move || probe(&cfg)).describe(description))?;
    }
    Ok(registry)
}

fn rms(psi: &ndarray::Array2<Complex64>) -> f64 {
    mean_abs_sq(psi).sqrt()
}

/// Shortest distance between two angles.
fn angular_distance(a: f64, b: f64) -> f64 {
    let d = wrap_phase(a - b);
    d.min(TAU - d)
}

/// Step the bare kernel and watch the RMS norm.
pub fn norm_stability(config: &LabConfig) -> Result<Metrics> {
    let rc = config.runtime_config();
    let kernel = StepKernel::new(select_backend(rc.enable_acceleration));
    let mut state = seed(config.grid_n);
    let mut max_err: f64 = 0.0;
    for _ in 0..config.steps {
        state = kernel.step(&state, rc.kernel_dt);
        let err = (rms(state.psi()) - 1.0).abs();
        max_err = if err.is_nan() { f64::NAN } else { max_err.max(err) };
    }
    let stable = max_err < NORM_TOLERANCE;
    Ok(Metrics::new()
        .with("steps", config.steps)
        .with("max_norm_error", max_err)
        .with("final_norm", rms(state.psi()))
        .with("coherence", coherence(state.psi()))
        .with("status", if stable { "stable" } else { "unstable" }))
}

/// Apply the drift without jitter at successive times and compare the
/// measured global rotation with the clock's prediction.
pub fn phase_drift(config: &LabConfig) -> Result<Metrics> {
    let rc = config.runtime_config();
    let sigma_scalar = 0.5;
    let params = DriftParams {
        drift_gain: rc.drift_gain,
        harmonic: Harmonic::Fixed(rc.harmonic_sweep.0),
        jitter: 0.0,
        renorm: true,
    };
    let clock = Clock::with_source(rc.base_hz, Arc::new(ManualSource::new(0.0)));
    let mut drift = DriftOperator::seeded(params, clock.clone(), config.seed)?;
    let psi = seed(config.grid_n).psi().clone();

    let mut max_phase_err: f64 = 0.0;
    let mut max_modulus_err: f64 = 0.0;
    let mut last_shift = 0.0;
    let mut last_expected = 0.0;
    for i in 0..config.steps {
        let t = f64::from(i) * rc.kernel_dt;
        let out = drift.step(&psi, sigma_scalar, Some(t));

        let inner: Complex64 = Zip::from(&psi)
            .and(&out)
            .fold(Complex64::default(), |acc, a, b| acc + a.conj() * b);
        let shift = wrap_phase(inner.arg());
        let expected = wrap_phase(rc.drift_gain * sigma_scalar + clock.phase(drift.last_harmonic(), Some(t)));
        max_phase_err = max_phase_err.max(angular_distance(shift, expected));

        let modulus_err = Zip::from(&psi)
            .and(&out)
            .fold(0.0f64, |acc, a, b| acc.max((a.norm() - b.norm()).abs()));
        max_modulus_err = max_modulus_err.max(modulus_err);

        last_shift = shift;
        last_expected = expected;
    }
    let locked = max_phase_err < PHASE_TOLERANCE && max_modulus_err < NORM_TOLERANCE;
    Ok(Metrics::new()
        .with("phase_shift", last_shift)
        .with("expected_shift", last_expected)
        .with("max_phase_error", max_phase_err)
        .with("modulus_error", max_modulus_err)
        .with("status", if locked { "locked" } else { "slipped" }))
}

/// Hold a unit-norm field and let the homeostat settle on it.
pub fn homeostat_convergence(config: &LabConfig) -> Result<Metrics> {
    let rc = config.runtime_config();
    let mut homeostat = Homeostat::new(rc.homeostat_rate, rc.homeostat_dt, 0.0, rc.homeostat_mode)?;
    let psi = seed(config.grid_n).psi().clone();
    let target = mean_abs_sq(&psi);
    let steps = homeostat.settle_steps().max(config.steps as usize);
    for _ in 0..steps {
        homeostat.step(&psi);
    }
    let error = (homeostat.sigma() - target).abs();
    Ok(Metrics::new()
        .with("steps", steps)
        .with("sigma_scalar", homeostat.sigma())
        .with("target", target)
        .with("error", error)
        .with("converged", error < 0.05))
}

/// Two runtimes, one on the seed and one on its mirrored chirp, pulled
/// toward each other a little after every tick.
pub fn paired_empathy(config: &LabConfig) -> Result<Metrics> {
    let rc = config.runtime_config();
    let (mut rt_a, clock_a) = config.runtime_with(&rc)?;
    let rc_b = RuntimeConfig { seed: Some(config.seed.wrapping_add(1)), ..rc.clone() };
    let (mut rt_b, clock_b) = config.runtime_with(&rc_b)?;

    let mut a = seed(config.grid_n);
    let mirrored = a.psi().mapv(|z| z.conj());
    let mut b = a.clone().with_psi(mirrored)?;
    let overlap_initial = overlap(a.psi(), b.psi());

    let dt = config.tick_secs(&rc);
    for _ in 0..config.steps {
        let (next_a, _) = rt_a.tick(a)?;
        let (next_b, _) = rt_b.tick(b)?;
        let (psi_a, psi_b) = attune(next_a.psi(), next_b.psi());
        a = next_a.with_psi(psi_a)?;
        b = next_b.with_psi(psi_b)?;
        clock_a.advance(dt);
        clock_b.advance(dt);
    }
    let overlap_final = overlap(a.psi(), b.psi());
    let finite = a.is_finite() && b.is_finite();
    let status = if !finite {
        "non-finite"
    } else if overlap_final > overlap_initial {
        "attuned"
    } else {
        "estranged"
    };
    Ok(Metrics::new()
        .with("overlap_initial", overlap_initial)
        .with("overlap_final", overlap_final)
        .with("coherence_a", coherence(a.psi()))
        .with("coherence_b", coherence(b.psi()))
        .with("status", status))
}

/// Blend each field toward the other, then renormalize both.
fn attune(
    a: &ndarray::Array2<Complex64>,
    b: &ndarray::Array2<Complex64>,
) -> (ndarray::Array2<Complex64>, ndarray::Array2<Complex64>) {
    let k = EMPATHY_COUPLING;
    let mut next_a = a.clone();
    let mut next_b = b.clone();
    Zip::from(&mut next_a)
        .and(&mut next_b)
        .and(a)
        .and(b)
        .for_each(|na, nb, &x, &y| {
            *na = x * (1.0 - k) + y * k;
            *nb = y * (1.0 - k) + x * k;
        });
    let (ra, rb) = (rms(&next_a), rms(&next_b));
    if ra > 0.0 {
        next_a.mapv_inplace(|z| z / ra);
    }
    if rb > 0.0 {
        next_b.mapv_inplace(|z| z / rb);
    }
    (next_a, next_b)
}

/// Build the full runtime from the lab config and run it from the seed.
pub fn boot_ritual(config: &LabConfig) -> Result<Metrics> {
    let rc = config.runtime_config();
    let (runtime, clock) = config.runtime_with(&rc)?;
    let mut session = Session::new(runtime, seed(config.grid_n))?;
    let dt = config.tick_secs(&rc);
    let mut last = Metrics::new();
    for _ in 0..config.steps {
        last = session.advance()?;
        clock.advance(dt);
    }
    let ethics_ok = session.runtime().ethics_ok(&last);
    let status = if !session.state().is_finite() {
        "non-finite"
    } else if ethics_ok {
        "awake"
    } else {
        "dormant"
    };
    Ok(Metrics::new()
        .with("ticks", session.tick_count() as usize)
        .with("coherence", last.get_f64("coherence").unwrap_or(f64::NAN))
        .with("sigma_scalar", session.runtime().sigma_scalar())
        .with("ethics_ok", ethics_ok)
        .with("status", status))
}

/// Invert the phase of the right half of the seed and evolve it beside
/// an intact copy.
pub fn dissociation(config: &LabConfig) -> Result<Metrics> {
    let rc = config.runtime_config();
    let kernel = StepKernel::new(select_backend(rc.enable_acceleration));
    let intact = seed(config.grid_n);
    let split = split_phase(&intact)?;
    let coherence_initial = coherence(split.psi());

    let intact = kernel.run(&intact, config.steps, rc.kernel_dt);
    let split = kernel.run(&split, config.steps, rc.kernel_dt);
    let half_overlap = overlap(intact.psi(), split.psi());
    Ok(Metrics::new()
        .with("coherence_initial", coherence_initial)
        .with("coherence_final", coherence(split.psi()))
        .with("coherence_intact", coherence(intact.psi()))
        .with("half_overlap", half_overlap)
        .with("dissociation_index", 1.0 - half_overlap))
}

fn split_phase(state: &FieldState) -> Result<FieldState> {
    let mut psi = state.psi().clone();
    let half = psi.ncols() / 2;
    let flip = Complex64::from_polar(1.0, PI);
    psi.slice_mut(s![.., half..]).mapv_inplace(|z| z * flip);
    state.clone().with_psi(psi)
}

/// Run the full runtime with heavy drift gain, wide harmonic sweep and
/// full-radian jitter; the norm must still hold.
pub fn paradox_stress(config: &LabConfig) -> Result<Metrics> {
    let rc = RuntimeConfig {
        drift_gain: 2.0,
        jitter: 1.0,
        harmonic_sweep: (1, 16),
        renorm: true,
        ..config.runtime_config()
    };
    let (mut runtime, clock) = config.runtime_with(&rc)?;
    let dt = config.tick_secs(&rc);
    let mut state = seed(config.grid_n);
    let mut max_norm_err: f64 = 0.0;
    let mut min_coherence = f64::INFINITY;
    let mut finite = true;
    for _ in 0..config.steps {
        let (next, metrics) = runtime.tick(state)?;
        state = next;
        clock.advance(dt);
        finite &= state.is_finite();
        max_norm_err = max_norm_err.max((rms(state.psi()) - 1.0).abs());
        if let Some(c) = metrics.get_f64("coherence") {
            min_coherence = min_coherence.min(c);
        }
    }
    let held = finite && max_norm_err < NORM_TOLERANCE;
    Ok(Metrics::new()
        .with("max_norm_error", max_norm_err)
        .with("min_coherence", min_coherence)
        .with("sigma_scalar", runtime.sigma_scalar())
        .with("finite", finite)
        .with("status", if held { "held" } else { "broken" }))
}
