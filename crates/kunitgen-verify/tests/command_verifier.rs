use std::path::Path;

use kunitgen_core::{reduce_log, GeneratedArtifact, Verifier, VerifierSettings, VerifyError};
use kunitgen_verify::CommandVerifier;
use tempfile::tempdir;

fn sh(script: &str) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), script.to_string()]
}

fn artifact(dir: &Path) -> GeneratedArtifact {
    let path = dir.join("amd_gpio_probe_kunit_test.c");
    std::fs::write(&path, "#include <kunit/test.h>\n").unwrap();
    GeneratedArtifact {
        unit_name: "amd_gpio_probe".to_string(),
        name: "amd_gpio_probe_kunit_test".to_string(),
        path,
    }
}

fn settings(work: &Path, command: Vec<String>) -> VerifierSettings {
    VerifierSettings {
        command,
        working_dir: work.to_path_buf(),
        log_file: "compilation_log/compile_error.txt".into(),
        staging_dir: None,
        capture_output: true,
        timeout_secs: 30,
    }
}

#[tokio::test]
async fn captured_output_becomes_the_log() {
    let dir = tempdir().unwrap();
    let verifier = CommandVerifier::new(settings(
        dir.path(),
        sh("echo 'x.c:1:2: error: boom'; echo '    boom();' >&2; exit 1"),
    ));

    let log = verifier.verify(&artifact(dir.path())).await.unwrap();
    let report = reduce_log(&log);
    assert!(report.had_any_error);
    assert_eq!(report.blocks[0].message, "error: boom");
    assert_eq!(report.blocks[0].code_line.as_deref(), Some("    boom();"));
}

#[tokio::test]
async fn exit_status_does_not_decide_the_verdict() {
    let dir = tempdir().unwrap();
    let verifier = CommandVerifier::new(settings(dir.path(), sh("echo '[PASSED]'; exit 3")));

    let run = verifier.run(&artifact(dir.path())).await.unwrap();
    assert_eq!(run.exit_code, 3);
    assert!(!reduce_log(&run.log).had_any_error);
}

#[tokio::test]
async fn missing_log_is_unavailable() {
    let dir = tempdir().unwrap();
    let mut s = settings(dir.path(), sh("true"));
    s.capture_output = false;
    let verifier = CommandVerifier::new(s);

    let err = verifier.verify(&artifact(dir.path())).await.unwrap_err();
    assert!(matches!(err, VerifyError::Unavailable { .. }));
}

#[tokio::test]
async fn stale_log_is_removed_before_running() {
    let dir = tempdir().unwrap();
    let log_dir = dir.path().join("compilation_log");
    std::fs::create_dir_all(&log_dir).unwrap();
    std::fs::write(log_dir.join("compile_error.txt"), "old.c:1: error: stale\n").unwrap();

    let mut s = settings(dir.path(), sh("true"));
    s.capture_output = false;
    let verifier = CommandVerifier::new(s);

    let err = verifier.verify(&artifact(dir.path())).await.unwrap_err();
    assert!(matches!(err, VerifyError::Unavailable { .. }));
}

#[tokio::test]
async fn command_may_write_its_own_log() {
    let dir = tempdir().unwrap();
    let mut s = settings(
        dir.path(),
        sh("mkdir -p compilation_log && echo 'all good' > compilation_log/compile_error.txt"),
    );
    s.capture_output = false;
    let verifier = CommandVerifier::new(s);

    let log = verifier.verify(&artifact(dir.path())).await.unwrap();
    assert_eq!(log, "all good\n");
}

#[tokio::test]
async fn artifact_is_staged_before_the_run() {
    let dir = tempdir().unwrap();
    let mut s = settings(dir.path(), sh("cat drivers/gpio/amd_gpio_probe_kunit_test.c"));
    s.staging_dir = Some("drivers/gpio".into());
    let verifier = CommandVerifier::new(s);

    let log = verifier.verify(&artifact(dir.path())).await.unwrap();
    assert!(log.contains("#include <kunit/test.h>"));
    assert!(dir.path().join("drivers/gpio/amd_gpio_probe_kunit_test.c").exists());
}

#[tokio::test]
async fn slow_command_times_out() {
    let dir = tempdir().unwrap();
    let mut s = settings(dir.path(), sh("sleep 5"));
    s.timeout_secs = 1;
    let verifier = CommandVerifier::new(s);

    let err = verifier.verify(&artifact(dir.path())).await.unwrap_err();
    assert!(matches!(err, VerifyError::TimedOut { seconds: 1 }));
}

#[tokio::test]
async fn missing_executable_is_invocation_error() {
    let dir = tempdir().unwrap();
    let verifier = CommandVerifier::new(settings(
        dir.path(),
        vec!["/nonexistent/kunit.py".to_string()],
    ));

    let err = verifier.verify(&artifact(dir.path())).await.unwrap_err();
    assert!(matches!(err, VerifyError::Invocation(_)));
}
