//! Smoke tests for the `evoke` binary.
//!
//! Verify the binary starts, documents its configuration, and refuses to run
//! without it. None of this needs AWS or Fly credentials.

use std::process::Command;

fn evoke() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_evoke"));
    for key in [
        "EVOKE_ENV",
        "EVOKE_SQS_QUEUE_URL",
        "EVOKE_SQS_LONG_POLL_SECONDS",
        "EVOKE_EVENTS_PER_MACHINE",
        "EVOKE_FLY_APP",
        "EVOKE_FLY_REGION",
        "EVOKE_FLY_TOKEN",
        "FLY_APP_NAME",
        "FLY_REGION",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn binary_responds_to_help() {
    let output = evoke().arg("--help").output().expect("failed to execute evoke");
    assert!(output.status.success(), "evoke --help should exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("EVOKE_SQS_QUEUE_URL"));
    assert!(stdout.contains("EVOKE_FLY_TOKEN"));
}

#[test]
fn refuses_to_start_without_configuration() {
    let output = evoke().output().expect("failed to execute evoke");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("must be set"));
}
