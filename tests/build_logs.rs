use std::fs;
use std::sync::Arc;

use makeherd::discover::Target;
use makeherd::exec::run_build;
use makeherd::jobserver::TokenChannel;

mod common;
use common::{TestResult, fake_make, test_context};

fn target() -> Target {
    Target {
        group: "grp".to_string(),
        name: "one".to_string(),
    }
}

#[tokio::test]
async fn log_artifact_matches_output_and_is_overwritten() -> TestResult {
    let dir = tempfile::tempdir()?;
    let script = fake_make(dir.path(), r#"echo "$CONTENT""#)?;
    let logs = dir.path().join("logs");
    fs::create_dir(&logs)?;

    let mut ctx = test_context(dir.path(), &script);
    ctx.log_dir = Some(logs.clone());
    ctx.env.push(("CONTENT".to_string(), "first".to_string()));

    let result = run_build(&ctx, &target()).await;
    assert!(result.success);
    assert_eq!(result.output, b"first\n");
    let log_path = result.log_path.expect("log path recorded");
    assert_eq!(log_path, logs.join("grp_one.log"));
    assert_eq!(fs::read(&log_path)?, b"first\n");

    // Second run replaces the artifact wholesale; no append semantics.
    ctx.env[0].1 = "second".to_string();
    let result = run_build(&ctx, &target()).await;
    assert!(result.success);
    assert_eq!(fs::read(&log_path)?, b"second\n");
    Ok(())
}

#[tokio::test]
async fn stderr_is_captured_alongside_stdout() -> TestResult {
    let dir = tempfile::tempdir()?;
    let script = fake_make(dir.path(), "echo out\necho err 1>&2\nexit 3")?;

    let result = run_build(&test_context(dir.path(), &script), &target()).await;
    assert!(!result.success);

    let output = String::from_utf8(result.output)?;
    assert!(output.contains("out\n"));
    assert!(output.contains("err\n"));
    Ok(())
}

#[tokio::test]
async fn spawn_failure_becomes_a_failed_result() -> TestResult {
    let dir = tempfile::tempdir()?;
    let mut ctx = test_context(dir.path(), dir.path());
    ctx.make_program = dir
        .path()
        .join("no-such-binary")
        .to_string_lossy()
        .into_owned();

    let result = run_build(&ctx, &target()).await;
    assert!(!result.success);
    assert!(String::from_utf8_lossy(&result.output).contains("makeherd:"));
    Ok(())
}

#[tokio::test]
async fn token_is_returned_after_a_failed_build() -> TestResult {
    let dir = tempfile::tempdir()?;
    let script = fake_make(dir.path(), "exit 1")?;

    let channel = Arc::new(TokenChannel::create(1)?);
    let mut ctx = test_context(dir.path(), &script);
    ctx.channel = Some(Arc::clone(&channel));

    // With a single token, the second build can only start if the first
    // failure released it.
    for _ in 0..2 {
        let result = run_build(&ctx, &target()).await;
        assert!(!result.success);
    }

    let reclaimed = channel.acquire()?;
    drop(reclaimed);
    Ok(())
}

#[tokio::test]
async fn makeflags_reach_the_child() -> TestResult {
    let dir = tempfile::tempdir()?;
    let script = fake_make(dir.path(), r#"echo "flags=$MAKEFLAGS""#)?;

    let channel = Arc::new(TokenChannel::create(2)?);
    let mut ctx = test_context(dir.path(), &script);
    ctx.env.push((
        "MAKEFLAGS".to_string(),
        format!("-j2 {}", channel.auth_string()),
    ));
    ctx.channel = Some(channel);

    let result = run_build(&ctx, &target()).await;
    assert!(result.success);
    let output = String::from_utf8(result.output)?;
    assert!(output.contains("flags=-j2 --jobserver-auth="));
    Ok(())
}
