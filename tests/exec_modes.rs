// tests/exec_modes.rs
#![cfg(unix)]

mod common;
use crate::common::{MemorySink, init_tracing, with_timeout};

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use taskflow::errors::TaskflowError;
use taskflow::exec::{ExecInput, ExecMode, ExecTask, OutputStream};
use taskflow::result::{EXIT_IDLE_TIMEOUT, EXIT_TIMEOUT, TimeoutKind};
use taskflow::task::{Task, TaskContext};

type TestResult = Result<(), Box<dyn std::error::Error>>;

async fn run(task: &mut ExecTask) -> taskflow::result::TaskResult {
    let mut ctx = TaskContext::new();
    with_timeout(task.run(&mut ctx)).await
}

#[tokio::test]
async fn captured_output_becomes_the_message() -> TestResult {
    init_tracing();
    let mut task = ExecTask::new("echo hello")?.print_output(false);
    assert_eq!(task.mode(), ExecMode::Captured);

    let result = run(&mut task).await;

    assert!(result.is_success());
    assert_eq!(result.message(), "hello");
    assert!(result.elapsed().is_some());
    Ok(())
}

#[tokio::test]
async fn non_zero_exit_is_a_failure_with_that_code() -> TestResult {
    let mut task = ExecTask::new("echo partial; exit 3")?.silent(true);

    let result = run(&mut task).await;

    assert!(!result.is_success());
    assert_eq!(result.exit_code(), 3);
    assert_eq!(result.message(), "partial");
    Ok(())
}

#[tokio::test]
async fn streamed_lines_reach_the_sink_and_the_result() -> TestResult {
    let sink = MemorySink::new();
    let mut task = ExecTask::new("echo out1; echo err1 1>&2; echo out2")?
        .output_sink(sink.clone());
    assert_eq!(task.mode(), ExecMode::Streamed);

    let result = run(&mut task).await;

    assert!(result.is_success());
    assert_eq!(sink.lines(OutputStream::Stdout), vec!["out1", "out2"]);
    assert_eq!(sink.lines(OutputStream::Stderr), vec!["err1"]);
    assert_eq!(result.message(), "out1\nout2");
    assert_eq!(result.get("stderr").and_then(|v| v.as_str()), Some("err1"));
    Ok(())
}

#[tokio::test]
async fn overall_timeout_kills_the_process() -> TestResult {
    init_tracing();
    let mut task = ExecTask::new("sleep 5")?
        .silent(true)
        .timeout(Duration::from_secs(1))?;

    let started = Instant::now();
    let result = run(&mut task).await;
    let elapsed = started.elapsed();

    assert!(!result.is_success());
    assert_eq!(result.exit_code(), EXIT_TIMEOUT);
    assert_eq!(result.timeout_kind(), Some(TimeoutKind::Overall));
    assert!(elapsed >= Duration::from_millis(900), "returned too early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(2500), "returned too late: {elapsed:?}");
    Ok(())
}

#[tokio::test]
async fn idle_timeout_fires_before_a_longer_overall_timeout() -> TestResult {
    let mut task = ExecTask::new("sleep 5")?
        .silent(true)
        .timeout(Duration::from_secs(4))?
        .idle_timeout(Duration::from_millis(500))?;

    let started = Instant::now();
    let result = run(&mut task).await;

    assert_eq!(result.exit_code(), EXIT_IDLE_TIMEOUT);
    assert_eq!(result.timeout_kind(), Some(TimeoutKind::Idle));
    assert!(started.elapsed() < Duration::from_secs(2));
    Ok(())
}

#[tokio::test]
async fn output_keeps_idle_timeout_at_bay() -> TestResult {
    let mut task = ExecTask::new("for i in 1 2 3 4; do echo tick; sleep 0.3; done")?
        .silent(true)
        .idle_timeout(Duration::from_secs(1))?;

    let result = run(&mut task).await;

    assert!(result.is_success(), "{result}");
    assert_eq!(result.message(), "tick\ntick\ntick\ntick");
    Ok(())
}

#[tokio::test]
async fn partial_lines_keep_idle_timeout_at_bay() -> TestResult {
    let mut task = ExecTask::new("for i in 1 2 3 4; do printf .; sleep 0.5; done; echo")?
        .silent(true)
        .idle_timeout(Duration::from_secs(1))?;

    let result = run(&mut task).await;

    assert!(result.is_success(), "{result}");
    assert_eq!(result.message(), "....");
    Ok(())
}

#[tokio::test]
async fn invalid_utf8_output_keeps_the_exit_code() -> TestResult {
    let mut task = ExecTask::new(r"printf 'caf\351\n'; printf 'tail'; exit 0")?.silent(true);

    let result = run(&mut task).await;

    assert!(result.is_success(), "{result}");
    assert_eq!(result.exit_code(), 0);
    assert_eq!(result.message(), "caf\u{fffd}\ntail");
    Ok(())
}

#[tokio::test]
async fn zero_timeouts_are_configuration_errors() -> TestResult {
    let err = ExecTask::new("true")?.timeout(Duration::ZERO).unwrap_err();
    assert!(matches!(err, TaskflowError::ConfigError(_)));

    let err = ExecTask::new("true")?.idle_timeout(Duration::ZERO).unwrap_err();
    assert!(matches!(err, TaskflowError::ConfigError(_)));

    let err = ExecTask::new("   ").unwrap_err();
    assert!(matches!(err, TaskflowError::ConfigError(_)));
    Ok(())
}

#[tokio::test]
async fn background_returns_before_the_process_ends() -> TestResult {
    init_tracing();
    let mut task = ExecTask::new("sleep 3")?.background(true).silent(true);
    assert_eq!(task.mode(), ExecMode::Background);

    let started = Instant::now();
    let result = run(&mut task).await;

    assert!(result.is_success());
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(result.get("background").and_then(|v| v.as_bool()), Some(true));
    assert!(result.get("pid").is_some());
    assert!(task.is_running());

    task.stop();
    assert!(!task.is_running());
    assert!(task.pid().is_none());
    Ok(())
}

/// A dead child is either gone from `/proc` or a zombie awaiting reaping.
#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => !stat
            .rsplit_once(')')
            .is_some_and(|(_, rest)| rest.trim_start().starts_with('Z')),
        Err(_) => false,
    }
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn dropping_the_task_stops_its_background_child() -> TestResult {
    let mut task = ExecTask::new("exec sleep 30")?.background(true).silent(true);
    assert!(run(&mut task).await.is_success());
    let pid = task.pid().ok_or("background child has no pid")?;
    assert!(process_alive(pid));

    drop(task);

    let mut alive = true;
    for _ in 0..100 {
        alive = process_alive(pid);
        if !alive {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!alive, "process {pid} still running after drop");
    Ok(())
}

#[tokio::test]
async fn finished_background_process_is_not_running() -> TestResult {
    let mut task = ExecTask::new("true")?.background(true).silent(true);
    assert!(run(&mut task).await.is_success());

    let mut running = true;
    for _ in 0..50 {
        running = task.is_running();
        if !running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!running);
    Ok(())
}

#[tokio::test]
async fn missing_working_directory_is_a_start_failure() -> TestResult {
    let mut task = ExecTask::new("echo never")?
        .silent(true)
        .dir("/definitely/not/a/real/dir");

    let result = run(&mut task).await;

    assert!(!result.is_success());
    assert!(result.message().contains("spawning process"), "{}", result.message());
    Ok(())
}

#[tokio::test]
async fn working_directory_is_applied() -> TestResult {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("marker.txt"), "")?;
    let mut task = ExecTask::new("ls")?.silent(true).dir(dir.path());

    let result = run(&mut task).await;

    assert!(result.is_success());
    assert_eq!(result.message(), "marker.txt");
    Ok(())
}

#[tokio::test]
async fn env_replaces_the_inherited_environment() -> TestResult {
    let mut task = ExecTask::new(r#"echo "$TASKFLOW_TEST_VALUE ${HOME:-unset}""#)?
        .silent(true)
        .env_var("TASKFLOW_TEST_VALUE", "42");

    let result = run(&mut task).await;

    assert!(result.is_success());
    assert_eq!(result.message(), "42 unset");
    Ok(())
}

#[tokio::test]
async fn text_input_is_fed_to_stdin() -> TestResult {
    let mut task = ExecTask::new("cat")?
        .silent(true)
        .input("line one\nline two\n");

    let result = run(&mut task).await;

    assert!(result.is_success());
    assert_eq!(result.message(), "line one\nline two");
    Ok(())
}

#[tokio::test]
async fn file_input_is_streamed_to_stdin() -> TestResult {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, "from file")?;
    let mut task = ExecTask::new("cat")?
        .silent(true)
        .input(ExecInput::File(file.path().to_path_buf()));

    let result = run(&mut task).await;

    assert!(result.is_success());
    assert_eq!(result.message(), "from file");
    Ok(())
}

#[tokio::test]
async fn task_name_is_the_command() -> TestResult {
    let task = ExecTask::new("echo named")?;
    assert_eq!(task.name(), "echo named");
    let sink: Arc<dyn taskflow::exec::OutputSink> = MemorySink::new();
    let _ = ExecTask::new("true")?.output_sink(sink);
    Ok(())
}
