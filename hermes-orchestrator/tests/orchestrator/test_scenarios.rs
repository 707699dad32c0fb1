//! Workflow scenarios against a scripted task runner

use std::sync::{Arc, Mutex};
use std::time::Duration;

use hermes_orchestrator::notifier::spawn_progress_report;
use hermes_orchestrator::orchestrator::run_outcome;
use hermes_orchestrator::OrchestratorError;
use hermes_sdk::{OutputStream, RunnerEvent, WorkflowStatus};

use super::common::*;

#[tokio::test]
async fn test_calculator_success_path() {
    let runner = FakeRunner::scripted(vec![
        RunnerEvent::stdout("Loading agent..."),
        RunnerEvent::stdout("Step 1: Generating test cases"),
        RunnerEvent::stdout("Step 2: Generating initial code"),
        RunnerEvent::stdout("All tests passed"),
        exited(0, ""),
    ]);
    let orchestrator = orchestrator_with(runner.clone());

    let started = orchestrator.start_workflow(CALCULATOR_TASK).await.unwrap();
    assert_eq!(started.description, CALCULATOR_TASK);

    let run = wait_for_completion(&orchestrator).await;
    assert_eq!(run.status, WorkflowStatus::Completed);
    assert_eq!(run.progress, 100);
    assert_eq!(run.exit_code, Some(0));
    assert!(run.error.is_none());
    assert!(run.end_time.is_some());
    assert!(run.has_reached("Generating test case"));
    assert!(run.has_reached("Generating initial code"));
    assert!(!run.has_reached("Agent debate in progress"));
    assert!(run_outcome(&run).is_ok());

    let command = runner.last_command().unwrap();
    assert_eq!(
        command.args,
        vec![
            "hermes-core/zswe_agent/main.py".to_string(),
            CALCULATOR_TASK.to_string(),
            "--yes".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_calculator_completes_at_generating_initial_code() {
    let runner = FakeRunner::scripted(vec![
        RunnerEvent::stdout("Step 1: generating test"),
        RunnerEvent::stdout("Step 2: generating code"),
        exited(0, ""),
    ]);
    let orchestrator = orchestrator_with(runner);

    orchestrator.start_workflow(CALCULATOR_TASK).await.unwrap();
    let run = wait_for_completion(&orchestrator).await;

    assert_eq!(run.status, WorkflowStatus::Completed);
    assert_eq!(run.progress, 100);
    assert_eq!(run.current_step.as_deref(), Some("Generating initial code"));
    let labels: Vec<&str> = run.milestones.iter().map(|m| m.label.as_str()).collect();
    assert_eq!(labels, vec!["Generating test case", "Generating initial code"]);
}

#[tokio::test]
async fn test_failure_before_any_milestone_keeps_zero_progress() {
    let runner = FakeRunner::scripted(vec![
        RunnerEvent::stderr("syntax error"),
        exited(1, "syntax error"),
    ]);
    let orchestrator = orchestrator_with(runner);

    orchestrator.start_workflow(CALCULATOR_TASK).await.unwrap();
    let run = wait_for_completion(&orchestrator).await;

    assert_eq!(run.status, WorkflowStatus::Failed);
    assert_eq!(run.progress, 0);
    assert_eq!(run.exit_code, Some(1));
    assert_eq!(run.error.as_deref(), Some("syntax error"));
    assert!(run.milestones.is_empty());
    assert!(run.current_step.is_none());
}

#[tokio::test]
async fn test_failure_path_reports_stderr() {
    let runner = FakeRunner::scripted(vec![
        RunnerEvent::stdout("Step 1: Generating test cases"),
        RunnerEvent::stderr("syntax error"),
        exited(1, "syntax error\n"),
    ]);
    let orchestrator = orchestrator_with(runner);

    orchestrator.start_workflow(CALCULATOR_TASK).await.unwrap();
    let run = wait_for_completion(&orchestrator).await;

    assert_eq!(run.status, WorkflowStatus::Failed);
    assert_eq!(run.error.as_deref(), Some("syntax error"));
    assert_eq!(run.exit_code, Some(1));
    // Progress stays where the last milestone left it
    assert_eq!(run.progress, 25);

    match run_outcome(&run) {
        Err(OrchestratorError::Execution(message)) => assert_eq!(message, "syntax error"),
        other => panic!("expected execution error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_failure_without_stderr_gets_placeholder() {
    let runner = FakeRunner::scripted(vec![exited(2, "   \n")]);
    let orchestrator = orchestrator_with(runner);

    orchestrator.start_workflow(CALCULATOR_TASK).await.unwrap();
    let run = wait_for_completion(&orchestrator).await;

    assert_eq!(run.status, WorkflowStatus::Failed);
    let error = run.error.unwrap();
    assert!(!error.is_empty());
    assert!(error.contains('2'));
}

#[tokio::test]
async fn test_out_of_order_milestones_never_regress() {
    let runner = FakeRunner::manual();
    let orchestrator = orchestrator_with(runner.clone());
    orchestrator.start_workflow(CALCULATOR_TASK).await.unwrap();

    runner.send(RunnerEvent::stdout("=== Debate Round 1 ==="));
    let run = wait_for(&orchestrator, |run| run.progress == 75).await;
    assert_eq!(run.current_step.as_deref(), Some("Agent debate in progress"));

    runner.send(RunnerEvent::stdout("Step 1: Generating test cases"));
    let run = wait_for(&orchestrator, |run| run.has_reached("Generating test case")).await;
    assert_eq!(run.progress, 75);
    assert_eq!(run.current_step.as_deref(), Some("Generating test case"));

    runner.send(exited(0, ""));
    let run = wait_for_completion(&orchestrator).await;
    assert_eq!(run.progress, 100);
}

#[tokio::test]
async fn test_repeated_marker_counts_once() {
    let runner = FakeRunner::scripted(vec![
        RunnerEvent::stdout("Debate Round 1"),
        RunnerEvent::stdout("Debate Round 2"),
        RunnerEvent::stdout("Debate Round 3"),
        exited(0, ""),
    ]);
    let orchestrator = orchestrator_with(runner);

    orchestrator.start_workflow(CALCULATOR_TASK).await.unwrap();
    let run = wait_for_completion(&orchestrator).await;

    let debates = run
        .milestones
        .iter()
        .filter(|m| m.label == "Agent debate in progress")
        .count();
    assert_eq!(debates, 1);
}

#[tokio::test]
async fn test_stderr_is_not_classified() {
    let runner = FakeRunner::manual();
    let orchestrator = orchestrator_with(runner.clone());
    orchestrator.start_workflow(CALCULATOR_TASK).await.unwrap();

    runner.send(RunnerEvent::stderr("Step 1: warning from a library"));
    runner.send(RunnerEvent::stdout("Step 2: Generating initial code"));
    let run = wait_for(&orchestrator, |run| run.progress == 50).await;
    assert!(!run.has_reached("Generating test case"));

    runner.send(exited(0, ""));
    wait_for_completion(&orchestrator).await;
}

#[tokio::test]
async fn test_second_start_is_rejected_while_running() {
    let runner = FakeRunner::manual();
    let orchestrator = orchestrator_with(runner.clone());

    let first = orchestrator.start_workflow(CALCULATOR_TASK).await.unwrap();
    runner.send(RunnerEvent::stdout("Step 1: Generating test cases"));
    wait_for(&orchestrator, |run| run.progress == 25).await;

    let err = orchestrator
        .start_workflow("Write a parser")
        .await
        .unwrap_err();
    match &err {
        OrchestratorError::Concurrency { step, progress } => {
            assert_eq!(step, "Generating test case");
            assert_eq!(*progress, 25);
        }
        other => panic!("expected concurrency error, got {other:?}"),
    }
    assert!(!err.is_blocking());
    assert_eq!(runner.starts(), 1);

    let current = orchestrator.snapshot().unwrap();
    assert_eq!(current.id, first.id);
    assert_eq!(current.description, CALCULATOR_TASK);
    assert_eq!(current.status, WorkflowStatus::Running);

    // Once terminal, a new run may start
    runner.send(exited(0, ""));
    wait_for_completion(&orchestrator).await;
    let second = orchestrator.start_workflow("Write a parser").await.unwrap();
    assert_ne!(second.id, first.id);
    assert_eq!(runner.starts(), 2);
}

#[tokio::test]
async fn test_empty_description_starts_nothing() {
    let runner = FakeRunner::manual();
    let orchestrator = orchestrator_with(runner.clone());

    for description in ["", "   ", "\n\t"] {
        let err = orchestrator.start_workflow(description).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation));
        assert!(err.is_blocking());
    }

    assert_eq!(runner.starts(), 0);
    assert!(orchestrator.snapshot().is_none());
    assert!(orchestrator.wait_for_completion().await.is_none());
}

#[tokio::test]
async fn test_description_is_trimmed() {
    let runner = FakeRunner::scripted(vec![exited(0, "")]);
    let orchestrator = orchestrator_with(runner.clone());

    let run = orchestrator
        .start_workflow("  Create a simple calculator function \n")
        .await
        .unwrap();
    assert_eq!(run.description, CALCULATOR_TASK);
    assert_eq!(runner.last_command().unwrap().args[1], CALCULATOR_TASK);
}

#[tokio::test]
async fn test_spawn_failure_fails_the_run() {
    let runner = FakeRunner::failing("No such file or directory (os error 2)");
    let orchestrator = orchestrator_with(runner.clone());

    let err = orchestrator.start_workflow(CALCULATOR_TASK).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Spawn(ref m) if m.contains("os error 2")));
    assert!(err.is_blocking());

    let run = orchestrator.snapshot().unwrap();
    assert_eq!(run.status, WorkflowStatus::Failed);
    assert!(run.error.unwrap().contains("os error 2"));
    assert_eq!(runner.starts(), 0);

    // A failed run does not block the next attempt
    assert!(matches!(
        orchestrator.start_workflow(CALCULATOR_TASK).await,
        Err(OrchestratorError::Spawn(_))
    ));
}

#[tokio::test]
async fn test_stream_closed_without_exit_is_failure() {
    let runner = FakeRunner::scripted(vec![RunnerEvent::stdout("Step 1: Generating test cases")]);
    let orchestrator = orchestrator_with(runner);

    orchestrator.start_workflow(CALCULATOR_TASK).await.unwrap();
    let run = wait_for_completion(&orchestrator).await;

    assert_eq!(run.status, WorkflowStatus::Failed);
    assert_eq!(run.exit_code, None);
    assert!(run.error.unwrap().contains("without reporting an exit status"));
}

#[tokio::test]
async fn test_output_is_buffered_in_order() {
    let runner = FakeRunner::scripted(vec![
        RunnerEvent::stdout("one"),
        RunnerEvent::stderr("warn"),
        RunnerEvent::stdout("two"),
        exited(0, ""),
    ]);
    let orchestrator = orchestrator_with(runner);

    let run = orchestrator.start_workflow(CALCULATOR_TASK).await.unwrap();
    wait_for_completion(&orchestrator).await;

    let output = orchestrator.recent_output(None);
    let lines: Vec<&str> = output.iter().map(|l| l.line.as_str()).collect();
    assert_eq!(lines, vec!["one", "warn", "two"]);
    assert_eq!(output[1].stream, OutputStream::Stderr);
    assert!(output.iter().all(|l| l.run_id == run.id));

    let tail = orchestrator.recent_output(Some(1));
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].line, "two");
}

#[tokio::test]
async fn test_push_subscriber_sees_every_transition() {
    let runner = FakeRunner::scripted(vec![
        RunnerEvent::stdout("Step 1: Generating test cases"),
        exited(0, ""),
    ]);
    let orchestrator = orchestrator_with(runner);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let subscription = orchestrator.board().on_change(move |run| {
        sink.lock().unwrap().push((run.status, run.progress));
    });

    orchestrator.start_workflow(CALCULATOR_TASK).await.unwrap();
    wait_for_completion(&orchestrator).await;
    orchestrator.board().unsubscribe(subscription);

    let seen = seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            (WorkflowStatus::Pending, 0),
            (WorkflowStatus::Running, 0),
            (WorkflowStatus::Running, 25),
            (WorkflowStatus::Completed, 100),
        ]
    );
}

#[tokio::test]
async fn test_panicking_subscriber_does_not_stall_the_run() {
    let runner = FakeRunner::scripted(vec![
        RunnerEvent::stdout("Step 1: Generating test cases"),
        exited(0, ""),
    ]);
    let orchestrator = orchestrator_with(runner.clone());
    orchestrator.board().on_change(|run| {
        if run.progress == 25 {
            panic!("subscriber bug");
        }
    });

    orchestrator.start_workflow(CALCULATOR_TASK).await.unwrap();
    let run = wait_for_completion(&orchestrator).await;
    assert_eq!(run.status, WorkflowStatus::Completed);
    assert_eq!(run.progress, 100);

    // The finished run no longer holds the single-flight slot
    orchestrator.start_workflow(CALCULATOR_TASK).await.unwrap();
    assert_eq!(runner.starts(), 2);
    wait_for_completion(&orchestrator).await;
}

#[tokio::test]
async fn test_progress_report_follows_run() {
    let runner = FakeRunner::manual();
    let orchestrator = orchestrator_with(runner.clone());
    orchestrator.start_workflow(CALCULATOR_TASK).await.unwrap();

    let updates = Arc::new(Mutex::new(Vec::new()));
    let sink = updates.clone();
    let report = spawn_progress_report(orchestrator.board(), move |update| {
        sink.lock().unwrap().push(update);
    });

    runner.send(RunnerEvent::stdout("Step 1: Generating test cases"));
    wait_for(&orchestrator, |run| run.progress == 25).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    runner.send(RunnerEvent::stdout("Step 2: Generating initial code"));
    wait_for(&orchestrator, |run| run.progress == 50).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    runner.send(exited(0, ""));
    let finished = tokio::time::timeout(Duration::from_secs(5), report)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(finished, Some(WorkflowStatus::Completed));

    let updates = updates.lock().unwrap();
    let messages: Vec<&str> = updates.iter().map(|u| u.message.as_str()).collect();
    assert_eq!(messages, vec!["Generating test case", "Generating initial code"]);
    assert_eq!(updates[0].increment, 25);
    assert_eq!(updates[1].increment, 25);
}

#[tokio::test]
async fn test_poll_subscriber_sees_latest_snapshot() {
    let runner = FakeRunner::scripted(vec![exited(0, "")]);
    let orchestrator = orchestrator_with(runner);
    orchestrator.start_workflow(CALCULATOR_TASK).await.unwrap();
    wait_for_completion(&orchestrator).await;

    let seen = Arc::new(Mutex::new(None));
    let sink = seen.clone();
    let poller = orchestrator
        .board()
        .poll_every(Duration::from_millis(10), move |snapshot| {
            *sink.lock().unwrap() = snapshot.map(|run| run.status);
            std::ops::ControlFlow::Break(())
        });
    tokio::time::timeout(Duration::from_secs(5), poller)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), Some(WorkflowStatus::Completed));
}
