//! Integration tests for ciel-lab: registry, journal, session, built-ins

use ciel_core::{Error, Metrics, RuntimeConfig};
use ciel_field::{numeric, Runtime};
use ciel_lab::experiments::{
    BOOT_RITUAL, DISSOCIATION, HOMEOSTAT_CONVERGENCE, NORM_STABILITY, PAIRED_EMPATHY,
    PARADOX_STRESS, PHASE_DRIFT,
};
use ciel_lab::{builtin_registry, Journal, LabConfig, Registry, Session, BUILTIN_EXPERIMENTS};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn small_lab() -> LabConfig {
    LabConfig {
        steps: 10,
        grid_n: 16,
        seed: 3,
        runtime: RuntimeConfig::default(),
    }
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn test_registry_runs_in_request_order_and_skips_unknown() {
    let mut registry = Registry::new();
    registry.add("a", || Ok(Metrics::new().with("x", 1.0))).unwrap();
    registry.add("b", || Ok(Metrics::new().with("y", 2.0))).unwrap();

    let report = registry.run(["b", "zzz", "a"]).unwrap();
    assert_eq!(report.names(), vec!["b", "a"]);
    assert_eq!(report.get("a").unwrap().get_f64("x"), Some(1.0));
    assert_eq!(report.get("b").unwrap().get_f64("y"), Some(2.0));
    assert!(report.get("zzz").is_none());
}

#[test]
fn test_registry_unknown_only_gives_empty_report() {
    let registry = Registry::new();
    let report = registry.run(["nope"]).unwrap();
    assert!(report.is_empty());
}

#[test]
fn test_registry_repeated_name_runs_twice_keeps_last() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut registry = Registry::new();
    registry
        .add("count", move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Metrics::new().with("call", n))
        })
        .unwrap();

    let report = registry.run(["count", "count"]).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(report.len(), 1);
    assert_eq!(report.get("count").unwrap().get_f64("call"), Some(2.0));
}

#[test]
fn test_registry_register_replaces() {
    let mut registry = Registry::new();
    registry.add("a", || Ok(Metrics::new().with("v", 1.0))).unwrap();
    registry.add("a", || Ok(Metrics::new().with("v", 9.0))).unwrap();
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.run_one("a").unwrap().get_f64("v"), Some(9.0));
}

#[test]
fn test_registry_empty_name_rejected() {
    let mut registry = Registry::new();
    let err = registry.add("", || Ok(Metrics::new())).unwrap_err();
    assert!(err.is_invalid_config());
    assert!(registry.is_empty());
}

#[test]
fn test_registry_accepts_any_non_empty_name() {
    let mut registry = Registry::new();
    registry.add(" ", || Ok(Metrics::new().with("v", 1.0))).unwrap();
    assert!(registry.contains(" "));
    assert_eq!(registry.run([" "]).unwrap().len(), 1);
}

#[test]
fn test_registry_debug_lists_names() {
    let mut registry = Registry::new();
    registry.add("b", || Ok(Metrics::new())).unwrap();
    registry.add("a", || Ok(Metrics::new())).unwrap();
    assert_eq!(format!("{:?}", registry), r#"Registry { experiments: ["a", "b"] }"#);
}

#[test]
fn test_registry_error_propagates() {
    let mut registry = Registry::new();
    registry.add("ok", || Ok(Metrics::new())).unwrap();
    registry
        .add("bad", || Err(Error::experiment("bad", "experiment failed")))
        .unwrap();
    let err = registry.run(["ok", "bad"]).unwrap_err();
    assert!(matches!(err, Error::Experiment { .. }));
}

#[test]
fn test_registry_run_one_unknown() {
    let registry = Registry::new();
    let err = registry.run_one("ghost").unwrap_err();
    assert!(matches!(err, Error::UnknownExperiment(ref n) if n == "ghost"));
}

#[test]
fn test_registry_list_sorted_and_remove() {
    let mut registry = Registry::new();
    for name in ["c", "a", "b"] {
        registry.add(name, || Ok(Metrics::new())).unwrap();
    }
    assert_eq!(registry.list(), vec!["a", "b", "c"]);
    assert!(registry.remove("b"));
    assert!(!registry.remove("b"));
    assert!(!registry.contains("b"));
}

// ============================================================================
// Journal
// ============================================================================

#[test]
fn test_journal_appends_one_line_per_record() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("run.jsonl");
    let journal = Journal::new(&path);
    assert!(!path.exists());

    journal.log(1, &Metrics::new().with("coh", 0.5)).unwrap();
    journal.log(2, &Metrics::new().with("coh", 0.6)).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    for (i, line) in lines.iter().enumerate() {
        let v: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(v["step"], serde_json::json!(i + 1));
        assert!(v["t"].as_f64().unwrap() > 0.0);
        assert!(v["coh"].is_number());
    }
}

#[test]
fn test_journal_never_truncates() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("run.jsonl");
    std::fs::write(&path, "{\"step\":0,\"t\":0.0}\n").unwrap();

    let journal = Journal::new(&path);
    journal.log_at(1, 10.0, &Metrics::new()).unwrap();
    Journal::new(&path).log_at(2, 11.0, &Metrics::new()).unwrap();

    let records = Journal::read_records(&path).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[2]["step"], 2);
    assert_eq!(records[2]["t"], 11.0);
}

#[test]
fn test_journal_step_and_t_override_metrics() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("run.jsonl");
    let metrics = Metrics::new().with("step", 99usize).with("t", -1.0).with("status", "ok");
    Journal::new(&path).log_at(4, 2.5, &metrics).unwrap();

    let records = Journal::read_records(&path).unwrap();
    assert_eq!(records[0]["step"], 4);
    assert_eq!(records[0]["t"], 2.5);
    assert_eq!(records[0]["status"], "ok");
}

#[test]
fn test_journal_creates_parent_dirs() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("deep").join("er").join("run.jsonl");
    Journal::new(&path).log(1, &Metrics::new()).unwrap();
    assert!(path.exists());
}

#[test]
fn test_journal_sink_unavailable() {
    let tmp = TempDir::new().unwrap();
    let blocker = tmp.path().join("file");
    std::fs::write(&blocker, "not a dir").unwrap();
    let journal = Journal::new(blocker.join("run.jsonl"));

    let err = journal.log(1, &Metrics::new()).unwrap_err();
    assert!(matches!(err, Error::SinkUnavailable { .. }));
}

// ============================================================================
// Session
// ============================================================================

#[test]
fn test_session_journals_every_tick() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("session.jsonl");
    let config = RuntimeConfig {
        grid_n: 16,
        seed: Some(5),
        log_path: Some(path.clone()),
        ..Default::default()
    };
    let mut session = Session::from_config(&config).unwrap();
    let last = session.run(3).unwrap();

    assert_eq!(session.tick_count(), 3);
    assert!(last.contains_key("coherence"));
    let records = Journal::read_records(&path).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[2]["step"], 3);
    assert_eq!(records[0]["status"], "ok");
}

#[test]
fn test_session_wrong_shape() {
    let config = RuntimeConfig { grid_n: 16, ..Default::default() };
    let runtime = Runtime::from_config_default_backend(&config).unwrap();
    let err = Session::new(runtime, numeric::seed(8)).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));
}

#[test]
fn test_session_advances_state_even_when_sink_fails() {
    let tmp = TempDir::new().unwrap();
    let blocker = tmp.path().join("file");
    std::fs::write(&blocker, "x").unwrap();
    let config = RuntimeConfig { grid_n: 16, seed: Some(1), ..Default::default() };
    let mut session = Session::from_config(&config)
        .unwrap()
        .with_journal(Journal::new(blocker.join("run.jsonl")));
    let before = session.state().clone();

    assert!(session.advance().is_err());
    assert_eq!(session.tick_count(), 1);
    assert_ne!(session.state(), &before);
}

// ============================================================================
// Built-in experiments
// ============================================================================

#[test]
fn test_builtins_all_registered() {
    let registry = builtin_registry(small_lab()).unwrap();
    assert_eq!(registry.len(), 7);
    for name in BUILTIN_EXPERIMENTS {
        assert!(registry.contains(name), "{} missing", name);
        assert!(!registry.get(name).unwrap().description().is_empty());
    }
}

#[test]
fn test_builtins_run_finite() {
    let registry = builtin_registry(small_lab()).unwrap();
    let report = registry.run(BUILTIN_EXPERIMENTS).unwrap();
    assert_eq!(report.len(), 7);
    for (name, metrics) in report.iter() {
        assert!(!metrics.is_empty(), "{} empty", name);
        if name != PARADOX_STRESS {
            assert!(metrics.is_finite(), "{} produced non-finite metrics", name);
        }
    }
}

#[test]
fn test_builtin_outcomes() {
    let registry = builtin_registry(small_lab()).unwrap();

    let m = registry.run_one(NORM_STABILITY).unwrap();
    assert_eq!(m.get_str("status"), Some("stable"));
    assert!(m.get_f64("max_norm_error").unwrap() < 1e-6);

    let m = registry.run_one(PHASE_DRIFT).unwrap();
    assert_eq!(m.get_str("status"), Some("locked"));

    let m = registry.run_one(HOMEOSTAT_CONVERGENCE).unwrap();
    assert_eq!(m.get_bool("converged"), Some(true));
    assert!(m.get_f64("error").unwrap() < 0.05);

    let m = registry.run_one(PAIRED_EMPATHY).unwrap();
    assert_eq!(m.get_str("status"), Some("attuned"));
    assert!(m.get_f64("overlap_final").unwrap() > m.get_f64("overlap_initial").unwrap());

    let m = registry.run_one(BOOT_RITUAL).unwrap();
    assert_eq!(m.get_f64("ticks"), Some(10.0));
    assert_eq!(m.get_str("status"), Some("awake"));

    let m = registry.run_one(DISSOCIATION).unwrap();
    let index = m.get_f64("dissociation_index").unwrap();
    assert!((0.0..=1.0).contains(&index));
    assert!(m.get_f64("coherence_initial").unwrap() < m.get_f64("coherence_intact").unwrap());

    let m = registry.run_one(PARADOX_STRESS).unwrap();
    assert_eq!(m.get_bool("finite"), Some(true));
    assert_eq!(m.get_str("status"), Some("held"));
}

#[test]
fn test_builtins_deterministic() {
    let a = builtin_registry(small_lab()).unwrap().run(BUILTIN_EXPERIMENTS).unwrap();
    let b = builtin_registry(small_lab()).unwrap().run(BUILTIN_EXPERIMENTS).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_lab_config_validation() {
    let bad = LabConfig { steps: 0, ..small_lab() };
    assert!(builtin_registry(bad).is_err());
    let bad = LabConfig { grid_n: 2, ..small_lab() };
    assert!(builtin_registry(bad).unwrap_err().is_invalid_config());
}
