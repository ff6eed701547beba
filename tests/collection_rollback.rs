// tests/collection_rollback.rs

mod common;
use crate::common::{EventLog, RecordingTask, init_tracing, names, with_timeout};

use std::time::Duration;

use taskflow::collection::{Collection, CollectionOptions, CollectionState};
use taskflow::errors::TaskflowError;
use taskflow::task::{Task, TaskContext};

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::test]
async fn scoped_rollback_and_completion_of_succeeded_task() -> TestResult {
    init_tracing();
    let log = EventLog::new();
    let mut c = Collection::new();

    let a = c.add(RecordingTask::ok("A", &log));
    c.add_completion_for(a, RecordingTask::ok("C1", &log))?;
    c.add_rollback_for(a, RecordingTask::ok("R1", &log))?;
    c.add(RecordingTask::failing("B", "B broke", &log));

    let result = with_timeout(c.execute()).await?;

    assert_eq!(log.events(), names(&["A", "B", "R1", "C1"]));
    assert!(!result.is_success());
    assert_eq!(result.task(), "B");
    assert_eq!(result.message(), "B broke");
    assert_eq!(result.get("collection").and_then(|v| v.as_str()), Some("collection"));
    assert_eq!(c.state(), CollectionState::CompletedWithRollback);
    Ok(())
}

#[tokio::test]
async fn all_succeed_runs_completions_but_no_rollback() -> TestResult {
    init_tracing();
    let log = EventLog::new();
    let mut c = Collection::new().named("build");

    let a = c.add(RecordingTask::ok("A", &log).with_rollback("undo A"));
    c.add_rollback_for(a, RecordingTask::ok("R1", &log))?;
    c.add_rollback(RecordingTask::ok("G", &log));
    c.add_completion(RecordingTask::ok("C1", &log));
    c.add(RecordingTask::ok("B", &log));

    let result = c.execute().await?;

    assert!(result.is_success());
    assert_eq!(result.task(), "build");
    assert_eq!(result.get("tasks").and_then(|v| v.as_u64()), Some(2));
    assert!(result.elapsed().is_some());
    assert_eq!(log.events(), names(&["A", "B", "C1"]));
    assert_eq!(c.state(), CollectionState::CompletedOk);
    Ok(())
}

#[tokio::test]
async fn first_failure_stops_and_unwinds_in_reverse() -> TestResult {
    init_tracing();
    let log = EventLog::new();
    let mut c = Collection::new();

    for i in 1..=5 {
        let name = format!("t{i}");
        let task = if i == 3 {
            RecordingTask::failing(&name, "third failed", &log)
        } else {
            RecordingTask::ok(&name, &log)
        };
        c.add(task.with_rollback(&format!("rb{i}")));
        c.add_completion(RecordingTask::ok(&format!("c{i}"), &log));
    }

    let result = c.execute().await?;

    assert_eq!(
        log.events(),
        names(&["t1", "t2", "t3", "rb2", "rb1", "c1", "c2", "c3", "c4", "c5"])
    );
    assert_eq!(result.message(), "third failed");
    assert_eq!(result.get("failed_tasks").and_then(|v| v.as_u64()), Some(1));
    Ok(())
}

#[tokio::test]
async fn keep_going_runs_everything_and_keeps_first_failure() -> TestResult {
    init_tracing();
    let log = EventLog::new();
    let mut c = Collection::with_options(CollectionOptions {
        stop_on_fail: false,
        ..CollectionOptions::default()
    });

    c.add(RecordingTask::ok("A", &log).with_rollback("undo A"));
    c.add(RecordingTask::failing("B", "b failed", &log).with_rollback("undo B"));
    c.add(RecordingTask::failing("C", "c failed", &log));
    c.add(RecordingTask::ok("D", &log).with_rollback("undo D"));

    let result = c.execute().await?;

    assert!(!result.is_success());
    assert_eq!(result.message(), "b failed");
    assert_eq!(result.get("failed_tasks").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(
        log.events(),
        names(&["A", "B", "C", "D", "undo D", "undo A"])
    );
    Ok(())
}

#[tokio::test]
async fn keep_going_without_failures_succeeds() -> TestResult {
    let log = EventLog::new();
    let mut c = Collection::with_options(CollectionOptions {
        stop_on_fail: false,
        rollback: true,
    });
    c.add(RecordingTask::ok("A", &log));
    c.add(RecordingTask::ok("B", &log));

    assert!(c.execute().await?.is_success());
    assert_eq!(log.events(), names(&["A", "B"]));
    Ok(())
}

#[tokio::test]
async fn disabled_rollback_aborts_but_still_completes() -> TestResult {
    init_tracing();
    let log = EventLog::new();
    let mut c = Collection::with_options(CollectionOptions {
        stop_on_fail: true,
        rollback: false,
    });

    c.add(RecordingTask::ok("A", &log).with_rollback("undo A"));
    c.add_rollback(RecordingTask::ok("G", &log));
    c.add_completion(RecordingTask::ok("C", &log));
    c.add(RecordingTask::failing("B", "nope", &log));

    let result = c.execute().await?;

    assert!(!result.is_success());
    assert_eq!(log.events(), names(&["A", "B", "C"]));
    assert_eq!(c.state(), CollectionState::Aborted);
    Ok(())
}

#[tokio::test]
async fn nothing_rolls_back_when_first_task_fails() -> TestResult {
    let log = EventLog::new();
    let mut c = Collection::new();

    let a = c.add(RecordingTask::failing("A", "boom", &log).with_rollback("undo A"));
    c.add_rollback_for(a, RecordingTask::ok("R-scoped", &log))?;
    c.add_rollback(RecordingTask::ok("G", &log));

    c.execute().await?;

    assert_eq!(log.events(), names(&["A"]));
    Ok(())
}

#[tokio::test]
async fn global_rollback_past_the_failure_point_does_not_run() -> TestResult {
    let log = EventLog::new();
    let mut c = Collection::new();

    c.add_rollback(RecordingTask::ok("G-before", &log));
    c.add(RecordingTask::ok("A", &log));
    c.add(RecordingTask::failing("B", "boom", &log));
    c.add(RecordingTask::ok("C", &log));
    c.add_rollback(RecordingTask::ok("G-after", &log));

    c.execute().await?;

    assert_eq!(log.events(), names(&["A", "B", "G-before"]));
    Ok(())
}

#[tokio::test]
async fn scoped_rollbacks_follow_primary_order_not_registration_order() -> TestResult {
    let log = EventLog::new();
    let mut c = Collection::new();

    let a = c.add(RecordingTask::ok("A", &log).with_rollback("undo A"));
    let b = c.add(RecordingTask::ok("B", &log).with_rollback("undo B"));
    c.add_rollback_for(b, RecordingTask::ok("RB", &log))?;
    c.add_rollback_for(a, RecordingTask::ok("RA", &log))?;
    c.add(RecordingTask::failing("C", "boom", &log));

    c.execute().await?;

    assert_eq!(
        log.events(),
        names(&["A", "B", "C", "RB", "undo B", "RA", "undo A"])
    );
    Ok(())
}

#[tokio::test]
async fn rollback_entries_interleave_by_registration_order() -> TestResult {
    let log = EventLog::new();
    let mut c = Collection::new();

    c.add(RecordingTask::ok("P1", &log).with_rollback("undo P1"));
    c.add_rollback(RecordingTask::ok("G", &log));
    c.add(RecordingTask::ok("P2", &log).with_rollback("undo P2"));
    c.add(RecordingTask::failing("P3", "boom", &log));

    c.execute().await?;

    assert_eq!(
        log.events(),
        names(&["P1", "P2", "P3", "undo P2", "G", "undo P1"])
    );
    Ok(())
}

#[tokio::test]
async fn failing_rollback_does_not_stop_the_sweep() -> TestResult {
    init_tracing();
    let log = EventLog::new();
    let mut c = Collection::new();

    let p1 = c.add(RecordingTask::ok("P1", &log).with_rollback("undo P1"));
    c.add_rollback_for(p1, RecordingTask::failing("R-bad", "cannot undo", &log))?;
    c.add(RecordingTask::failing("P2", "original failure", &log));

    let result = c.execute().await?;

    assert_eq!(log.events(), names(&["P1", "P2", "R-bad", "undo P1"]));
    assert_eq!(result.message(), "original failure");
    Ok(())
}

#[tokio::test]
async fn completion_failures_are_reported_without_changing_outcome() -> TestResult {
    init_tracing();
    let log = EventLog::new();
    let mut c = Collection::new();

    c.add(RecordingTask::ok("A", &log));
    c.add_completion(RecordingTask::failing("C-bad", "cleanup failed", &log));
    c.add_completion(RecordingTask::ok("C2", &log));

    let result = c.execute().await?;

    assert!(result.is_success());
    assert_eq!(log.events(), names(&["A", "C-bad", "C2"]));
    let errors = result
        .get("completion_errors")
        .and_then(|v| v.as_array())
        .expect("completion_errors present");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].as_str().unwrap_or_default().contains("cleanup failed"));
    Ok(())
}

#[tokio::test]
async fn deferred_completions_run_after_registered_ones() -> TestResult {
    let log = EventLog::new();
    let mut c = Collection::new();

    c.add_completion(RecordingTask::ok("C0", &log));
    c.add(RecordingTask::ok("A", &log).deferring("cleanup A"));
    c.add(RecordingTask::failing("B", "boom", &log));

    c.execute().await?;

    assert_eq!(log.events(), names(&["A", "B", "C0", "cleanup A"]));
    Ok(())
}

#[tokio::test]
async fn second_execute_is_protocol_misuse() -> TestResult {
    let log = EventLog::new();
    let mut c = Collection::new();
    c.add(RecordingTask::ok("A", &log));

    c.execute().await?;
    let err = c.execute().await.unwrap_err();

    assert!(matches!(err, TaskflowError::ProtocolMisuse(_)));
    assert_eq!(log.count("A"), 1);
    Ok(())
}

#[tokio::test]
async fn second_run_through_task_trait_fails_softly() {
    let log = EventLog::new();
    let mut c = Collection::new().named("once");
    c.add(RecordingTask::ok("A", &log));

    let mut ctx = TaskContext::new();
    assert!(c.run(&mut ctx).await.is_success());
    let again = c.run(&mut ctx).await;

    assert!(!again.is_success());
    assert_eq!(again.task(), "once");
    assert!(again.message().contains("already run"));
    assert_eq!(log.count("A"), 1);
}

#[tokio::test]
async fn foreign_task_id_is_rejected() {
    let log = EventLog::new();
    let mut first = Collection::new();
    let mut second = Collection::new();

    let id = first.add(RecordingTask::ok("A", &log));
    let err = second
        .add_rollback_for(id, RecordingTask::ok("R", &log))
        .unwrap_err();
    assert!(matches!(err, TaskflowError::ProtocolMisuse(_)));

    let err = second
        .add_completion_for(id, RecordingTask::ok("C", &log))
        .unwrap_err();
    assert!(matches!(err, TaskflowError::ProtocolMisuse(_)));
}

#[tokio::test]
async fn nested_collection_failure_unwinds_outer() -> TestResult {
    init_tracing();
    let log = EventLog::new();

    let mut inner = Collection::new().named("inner");
    inner.add(RecordingTask::ok("I1", &log).with_rollback("undo I1"));
    inner.add(RecordingTask::failing("I2", "inner broke", &log));
    inner.add_completion(RecordingTask::ok("inner done", &log));

    let mut outer = Collection::new().named("outer");
    outer.add(RecordingTask::ok("O1", &log).with_rollback("undo O1"));
    outer.add(inner);
    outer.add(RecordingTask::ok("O3", &log));
    outer.add_completion(RecordingTask::ok("outer done", &log));

    let result = outer.execute().await?;

    assert_eq!(
        log.events(),
        names(&["O1", "I1", "I2", "undo I1", "inner done", "undo O1", "outer done"])
    );
    assert!(!result.is_success());
    assert_eq!(result.message(), "inner broke");
    Ok(())
}

#[tokio::test]
async fn pending_completion_defers_the_sweep() -> TestResult {
    let log = EventLog::new();
    let mut c = Collection::new();
    c.add(RecordingTask::ok("A", &log));
    c.add_completion(RecordingTask::ok("C", &log));

    let pending = c.execute_without_completion().await?;
    assert!(pending.result().is_success());
    assert_eq!(pending.pending(), 1);
    assert_eq!(log.events(), names(&["A"]));

    let result = pending.complete().await;
    assert!(result.is_success());
    assert_eq!(log.events(), names(&["A", "C"]));
    Ok(())
}

#[tokio::test]
async fn dropped_guard_still_runs_completions() -> TestResult {
    init_tracing();
    let log = EventLog::new();
    let mut c = Collection::new();
    c.add(RecordingTask::ok("A", &log));
    c.add_completion(RecordingTask::ok("C", &log));

    let pending = c.execute_without_completion().await?;
    drop(pending);

    for _ in 0..50 {
        if log.count("C") == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(log.events(), names(&["A", "C"]));
    Ok(())
}

#[tokio::test]
async fn empty_collection_succeeds() -> TestResult {
    let mut c = Collection::new();
    assert!(c.is_empty());
    let result = c.execute().await?;
    assert!(result.is_success());
    Ok(())
}
