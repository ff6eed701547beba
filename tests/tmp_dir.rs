// tests/tmp_dir.rs

mod common;
use crate::common::init_tracing;

use std::fs;

use taskflow::collection::Collection;
use taskflow::task::{Task, TaskContext};
use taskflow::tasks::{CodeTask, TmpDir};

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[test]
fn path_is_reserved_without_touching_disk() {
    let base = tempfile::tempdir().unwrap();
    let tmp = TmpDir::reserve_in("scratch-", base.path());

    let first = tmp.path();
    assert_eq!(first, tmp.path());
    assert!(first.starts_with(base.path()));
    assert!(
        first
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("scratch-") && n.len() > "scratch-".len())
    );
    assert!(!first.exists());
}

#[test]
fn reservations_are_unique_unless_random_part_is_dropped() {
    let base = tempfile::tempdir().unwrap();
    let a = TmpDir::reserve_in("x", base.path());
    let b = TmpDir::reserve_in("x", base.path());
    assert_ne!(a.path(), b.path());

    let fixed = TmpDir::reserve_in("fixed", base.path()).without_random_part();
    assert_eq!(fixed.path(), base.path().join("fixed"));
}

#[tokio::test]
async fn directory_lives_until_the_completion_sweep() -> TestResult {
    init_tracing();
    let base = tempfile::tempdir()?;
    let tmp = TmpDir::reserve_in("work", base.path());
    let path = tmp.path();

    let mut c = Collection::new();
    c.add(tmp);
    let seen = path.clone();
    c.add(CodeTask::new("write into tmp", move || {
        fs::write(seen.join("artifact.txt"), "data")?;
        Ok(())
    }));

    let pending = c.execute_without_completion().await?;
    assert!(pending.result().is_success());
    assert!(path.join("artifact.txt").exists());
    assert_eq!(pending.pending(), 1);

    let result = pending.complete().await;
    assert!(result.is_success());
    assert!(!path.exists());
    Ok(())
}

#[tokio::test]
async fn directory_is_removed_when_a_later_task_fails() -> TestResult {
    let base = tempfile::tempdir()?;
    let tmp = TmpDir::reserve_in("work", base.path());
    let path = tmp.path();

    let mut c = Collection::new();
    c.add(tmp);
    c.add(CodeTask::new("fail", || anyhow::bail!("later step broke")));

    let result = c.execute().await?;
    assert!(!result.is_success());
    assert_eq!(result.message(), "later step broke");
    assert!(!path.exists());
    Ok(())
}

#[tokio::test]
async fn run_reports_path_and_defers_deletion() {
    let base = tempfile::tempdir().unwrap();
    let mut tmp = TmpDir::reserve_in("direct", base.path());
    let mut ctx = TaskContext::new();

    let result = tmp.run(&mut ctx).await;

    assert!(result.is_success());
    let reported = result.get("path").and_then(|v| v.as_str()).unwrap().to_string();
    assert_eq!(std::path::PathBuf::from(reported), tmp.path());
    assert!(tmp.path().is_dir());
    assert!(ctx.has_deferred());
}

#[tokio::test]
async fn failed_materialization_registers_nothing() {
    let base = tempfile::tempdir().unwrap();
    let blocker = base.path().join("not-a-dir");
    fs::write(&blocker, "file").unwrap();

    let mut tmp = TmpDir::reserve_in("child", &blocker);
    let mut ctx = TaskContext::new();
    let result = tmp.run(&mut ctx).await;

    assert!(!result.is_success());
    assert!(!ctx.has_deferred());
}
