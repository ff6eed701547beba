// tests/cli_run.rs
#![cfg(unix)]

use std::io::Write;

use tempfile::NamedTempFile;
use taskflow::cli::{CliArgs, LogLevel};
use taskflow::logging::resolve_level;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn args(file: &NamedTempFile, pipeline: Option<&str>) -> CliArgs {
    CliArgs {
        pipeline: pipeline.map(str::to_string),
        file: file.path().to_string_lossy().into_owned(),
        keep_going: false,
        list: false,
        dry_run: false,
        log_level: None,
    }
}

fn pipeline_file(contents: &str) -> std::io::Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(contents.as_bytes())?;
    Ok(file)
}

#[tokio::test]
async fn successful_pipeline_exits_zero() -> TestResult {
    let file = pipeline_file(
        r#"
[settings]
default = "ok"

[pipeline.ok]
steps = [{ exec = "true", silent = true }]

[pipeline.bad]
steps = [{ exec = "exit 4", silent = true }]
"#,
    )?;

    assert_eq!(taskflow::run(args(&file, None)).await?, 0);
    assert_eq!(taskflow::run(args(&file, Some("bad"))).await?, 4);
    Ok(())
}

#[tokio::test]
async fn dry_run_and_list_execute_nothing() -> TestResult {
    let dir = tempfile::tempdir()?;
    let target = dir.path().join("created");
    let file = pipeline_file(&format!(
        "[pipeline.p]\nsteps = [{{ touch = \"{}\" }}]\n",
        target.display()
    ))?;

    let mut dry = args(&file, None);
    dry.dry_run = true;
    assert_eq!(taskflow::run(dry).await?, 0);

    let mut list = args(&file, None);
    list.list = true;
    assert_eq!(taskflow::run(list).await?, 0);

    assert!(!target.exists());
    Ok(())
}

#[tokio::test]
async fn ambiguous_pipeline_choice_is_an_error() -> TestResult {
    let file = pipeline_file(
        r#"
[pipeline.a]
steps = [{ exec = "true" }]

[pipeline.b]
steps = [{ exec = "true" }]
"#,
    )?;
    assert!(taskflow::run(args(&file, None)).await.is_err());
    Ok(())
}

#[test]
fn log_level_priority() {
    assert_eq!(
        resolve_level(Some(LogLevel::Debug), Some("error")),
        tracing::Level::DEBUG
    );
    assert_eq!(resolve_level(None, Some("warning")), tracing::Level::WARN);
    assert_eq!(resolve_level(None, Some("chatty")), tracing::Level::INFO);
    assert_eq!(resolve_level(None, None), tracing::Level::INFO);
}
