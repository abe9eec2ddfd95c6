//! Exit status tests for the binaries.
//!
//! Every run happens in an empty temp directory so no `.env` file is picked up,
//! and the environment fallbacks are cleared.

use std::process::{Command, Output};

const ENV_VARS: &[&str] = &[
    "LOADGEN_PAYLOAD",
    "LOADGEN_PAYLOAD_FILE",
    "LOADGEN_COUNT",
    "LOADGEN_DELAY",
    "LOADGEN_TOPIC",
    "LOADGEN_SUBSCRIPTION",
    "GOOGLE_CLOUD_PROJECT",
    "PUBSUB_EMULATOR_HOST",
    "AGGREGATOR_SUBSCRIPTION",
    "LOG_LEVEL",
];

fn run(bin: &str, args: &[&str]) -> Output {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = Command::new(bin);
    cmd.args(args).current_dir(dir.path());
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.output().unwrap()
}

fn load_gen(args: &[&str]) -> Output {
    run(env!("CARGO_BIN_EXE_pubsub-load-gen"), args)
}

// ============================================================================
// pubsub-load-gen
// ============================================================================

#[test]
fn test_missing_payload_exits_1() {
    let out = load_gen(&["--count", "1"]);
    assert_eq!(out.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("payload not specified"), "stderr: {stderr}");
    // Fails before any client is created
    assert!(!stderr.contains("creating pubsub client"), "stderr: {stderr}");
}

#[test]
fn test_empty_payload_exits_1() {
    let out = load_gen(&["--payload", "", "--count", "1"]);
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn test_unreachable_backend_exits_1() {
    let out = load_gen(&[
        "--payload",
        "x",
        "--count",
        "1",
        "--delay",
        "1ms",
        "--emulator-host",
        "127.0.0.1:9",
        "--project",
        "p",
        "--output",
        "none",
    ]);
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
}

#[test]
fn test_missing_scenario_file_exits_1() {
    let out = load_gen(&["--config", "does-not-exist.yaml"]);
    assert_eq!(out.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("does-not-exist.yaml"), "stderr: {stderr}");
}

#[test]
fn test_conflicting_payload_flags_rejected() {
    let out = load_gen(&["--payload", "x", "--payload-file", "payload.json"]);
    // clap usage error
    assert_eq!(out.status.code(), Some(2));
}

// ============================================================================
// impression-aggregator
// ============================================================================

#[test]
fn test_aggregator_requires_grouping_keys() {
    let out = run(env!("CARGO_BIN_EXE_impression-aggregator"), &[]);
    assert_eq!(out.status.code(), Some(2));
}
