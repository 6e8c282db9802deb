//! Integration tests for the ciel command surface

use ciel::cli::{
    exit_code, list_experiments, run_experiment, show_config, usage_exit_code, Cli, Commands,
    RunOptions,
};
use ciel_core::Error;
use ciel_lab::BUILTIN_EXPERIMENTS;
use clap::Parser;
use std::collections::HashMap;
use tempfile::TempDir;

fn no_env(_: &str) -> Option<String> {
    None
}

fn quick(name: &str) -> RunOptions {
    RunOptions {
        steps: Some(5),
        grid: Some(16),
        ..RunOptions::new(name)
    }
}

// ============================================================================
// run
// ============================================================================

#[test]
fn test_run_writes_one_line_to_stdout() {
    let mut buf = Vec::new();
    let metrics = run_experiment(&quick("norm_stability"), no_env, &mut buf).unwrap();
    assert_eq!(metrics.get_str("status"), Some("stable"));

    let text = String::from_utf8(buf).unwrap();
    assert_eq!(text.lines().count(), 1);
    assert!(text.ends_with('\n'));
    let v: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
    assert_eq!(v["step"], 5);
    assert_eq!(v["experiment"], "norm_stability");
    assert!(v["t"].is_number());
    assert!(v["max_norm_error"].is_number());
}

#[test]
fn test_run_out_appends() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("results").join("out.jsonl");
    let opts = RunOptions {
        out: Some(path.clone()),
        ..quick("dissociation")
    };
    let mut buf = Vec::new();
    run_experiment(&opts, no_env, &mut buf).unwrap();
    run_experiment(&opts, no_env, &mut buf).unwrap();

    assert!(buf.is_empty());
    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 2);
}

#[test]
fn test_run_stdout_default_ignores_log_path_env() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("env.jsonl");
    let env: HashMap<&str, String> =
        [("CIEL_LOG_PATH", path.display().to_string())].into_iter().collect();
    let mut buf = Vec::new();
    run_experiment(&quick("phase_drift"), |k| env.get(k).cloned(), &mut buf).unwrap();
    assert_eq!(String::from_utf8(buf).unwrap().lines().count(), 1);
    assert!(!path.exists());
}

#[test]
fn test_run_unknown_experiment() {
    let mut buf = Vec::new();
    let err = run_experiment(&quick("levitation"), no_env, &mut buf).unwrap_err();
    assert!(matches!(err, Error::UnknownExperiment(_)));
    assert_eq!(exit_code(&err), 2);
    assert!(buf.is_empty());
}

#[test]
fn test_run_invalid_grid() {
    let opts = RunOptions {
        grid: Some(4),
        ..quick("norm_stability")
    };
    let err = run_experiment(&opts, no_env, &mut Vec::new()).unwrap_err();
    assert_eq!(exit_code(&err), 3);
}

#[test]
fn test_run_invalid_config_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("ciel.toml");
    std::fs::write(&path, "kernel_dt = 0.0\n").unwrap();
    let opts = RunOptions {
        config: Some(path),
        ..quick("norm_stability")
    };
    let err = run_experiment(&opts, no_env, &mut Vec::new()).unwrap_err();
    assert_eq!(exit_code(&err), 3);
}

#[test]
fn test_run_bad_seed_env() {
    let env = |k: &str| (k == "CIEL_SEED").then(|| "not-a-number".to_string());
    let err = run_experiment(&quick("norm_stability"), env, &mut Vec::new()).unwrap_err();
    assert_eq!(exit_code(&err), 3);
}

// ============================================================================
// Config resolution
// ============================================================================

#[test]
fn test_lab_config_precedence() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("ciel.toml");
    std::fs::write(&path, "grid_n = 24\nseed = 100\n").unwrap();

    let from_file = RunOptions {
        config: Some(path.clone()),
        ..RunOptions::new("x")
    };
    let lab = from_file.lab_config(no_env).unwrap();
    assert_eq!(lab.grid_n, 24);
    assert_eq!(lab.seed, 100);
    assert_eq!(lab.steps, 50);

    let env = |k: &str| (k == "CIEL_SEED").then(|| "9".to_string());
    assert_eq!(from_file.lab_config(env).unwrap().seed, 9);

    let flags = RunOptions {
        grid: Some(12),
        seed: Some(1),
        steps: Some(3),
        ..from_file
    };
    let lab = flags.lab_config(env).unwrap();
    assert_eq!((lab.grid_n, lab.seed, lab.steps), (12, 1, 3));

    let lab = RunOptions::new("x").lab_config(no_env).unwrap();
    assert_eq!((lab.grid_n, lab.seed), (32, 7));
}

// ============================================================================
// Command line parsing
// ============================================================================

#[test]
fn test_malformed_flags_exit_invalid_config() {
    for args in [
        vec!["ciel", "run", "norm_stability", "--steps", "abc"],
        vec!["ciel", "run", "norm_stability", "--grid", "-4"],
        vec!["ciel", "run"],
    ] {
        let err = Cli::try_parse_from(args.iter().copied()).unwrap_err();
        assert_eq!(usage_exit_code(&err), 3, "{:?}", args);
    }
}

#[test]
fn test_help_exits_zero() {
    let err = Cli::try_parse_from(["ciel", "help"]).unwrap_err();
    assert_eq!(usage_exit_code(&err), 0);
}

#[test]
fn test_run_flags_parse() {
    let cli = Cli::try_parse_from(["ciel", "run", "dissociation", "--steps", "4", "--seed", "2"]).unwrap();
    match cli.command {
        Commands::Run { name, steps, seed, out, .. } => {
            assert_eq!(name, "dissociation");
            assert_eq!(steps, Some(4));
            assert_eq!(seed, Some(2));
            assert!(out.is_none());
        }
        other => panic!("unexpected command {:?}", other),
    }
}

// ============================================================================
// list / config
// ============================================================================

#[test]
fn test_list_prints_every_builtin() {
    let mut buf = Vec::new();
    list_experiments(&mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();
    let names: Vec<&str> = text.lines().collect();
    assert_eq!(names.len(), BUILTIN_EXPERIMENTS.len());
    for name in BUILTIN_EXPERIMENTS {
        assert!(names.contains(&name));
    }
}

#[test]
fn test_show_config_defaults() {
    let mut buf = Vec::new();
    show_config(None, &mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();
    assert!(text.contains("grid_n = 64"));
    assert!(text.contains("kernel_dt"));
}
