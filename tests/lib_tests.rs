mod common;

use catfind::engine::{
    Arity, CancelToken, CommandStatus, CommandTemplate, FailureBudget, RetryPolicy,
    RetryableRunner, StatementTemplate, TaskQueue,
};
use catfind::{CatfindError, CommandError, QueueError, TemplateError};
use common::Scripted;
use std::sync::Arc;
use std::time::Duration;

const MAX: usize = 65536;

fn runner(
    exec: &Arc<Scripted>,
    retry: Option<u32>,
    force: bool,
    max_failures: u64,
) -> RetryableRunner {
    RetryableRunner::new(
        exec.clone(),
        retry.map(|retries| RetryPolicy {
            retries,
            delay: Duration::ZERO,
        }),
        force,
        Arc::new(FailureBudget::new(max_failures)),
        CancelToken::new(),
    )
}

// --- CommandTemplate ---

#[test]
fn test_render_places_leaf_once_per_placeholder() {
    let leaf = "/zone/home/a b.txt";
    let templates = [
        "ls -l %s",
        "cp %s %s.bak",
        "f %s %s %s",
        "%s:%s:%s:%s",
    ];
    for (k, t) in templates.iter().enumerate() {
        let template = CommandTemplate::new(t, MAX).unwrap();
        assert_eq!(template.arity().count(), k + 1);
        let out = template.render(leaf).unwrap();
        assert_eq!(out.to_str().unwrap().matches(leaf).count(), k + 1, "template {t}");
    }
}

#[test]
fn test_render_without_placeholder_quotes_leaf() {
    let template = CommandTemplate::new("ils -l", MAX).unwrap();
    assert_eq!(template.arity(), Arity::Zero);
    assert_eq!(template.render("/zone/x").unwrap(), "ils -l '/zone/x'");
}

#[test]
fn test_render_rejects_single_quote() {
    for t in ["echo", "echo %s"] {
        let template = CommandTemplate::new(t, MAX).unwrap();
        assert!(matches!(
            template.render("/zone/it's"),
            Err(TemplateError::SingleQuote { .. })
        ));
    }
}

#[test]
fn test_more_than_four_placeholders() {
    assert!(matches!(
        CommandTemplate::new("%s %s %s %s %s", MAX),
        Err(TemplateError::TooManyPlaceholders { count: 5, .. })
    ));
}

#[test]
fn test_malformed_and_empty_templates() {
    assert!(matches!(
        CommandTemplate::new("rm %", MAX),
        Err(TemplateError::Malformed { .. })
    ));
    assert!(matches!(CommandTemplate::new("  ", MAX), Err(TemplateError::Empty)));
    let literal = CommandTemplate::new("printf 100%% %s", MAX).unwrap();
    assert_eq!(literal.render("/a").unwrap(), "printf 100% /a");
}

#[test]
fn test_render_enforces_command_length() {
    let template = CommandTemplate::new("echo %s", 12).unwrap();
    assert_eq!(template.render("/zone/").unwrap(), "echo /zone/");
    assert!(matches!(
        template.render("/zone/long"),
        Err(TemplateError::TooLong { len: 15, max: 12, .. })
    ));
}

#[test]
fn test_statement_template_needs_id_placeholder() {
    assert!(matches!(
        StatementTemplate::new("DELETE FROM t", MAX),
        Err(TemplateError::MissingPlaceholder { .. })
    ));
    let s = StatementTemplate::new("UPDATE t SET x = 1 WHERE id = %s", MAX).unwrap();
    assert_eq!(s.render(42).unwrap(), "UPDATE t SET x = 1 WHERE id = 42");
}

// --- RetryableRunner and FailureBudget ---

#[test]
fn test_retry_succeeds_on_third_attempt() {
    let exec = Arc::new(Scripted::new(&[
        CommandStatus::Exited(1),
        CommandStatus::Exited(1),
        CommandStatus::Exited(0),
    ]));
    let runner = runner(&exec, Some(3), false, 10);
    let outcome = runner.run("flaky").unwrap();
    assert!(outcome.success());
    assert_eq!(outcome.retried, 2);
    assert_eq!(runner.budget().used(), 2);
    assert_eq!(exec.calls().len(), 3);
}

#[test]
fn test_still_failing_is_not_fatal() {
    let exec = Arc::new(Scripted::always(CommandStatus::Exited(3)));
    let runner = runner(&exec, Some(2), false, 10);
    let outcome = runner.run_checked("broken").unwrap();
    assert_eq!(outcome.status, CommandStatus::Exited(3));
    assert_eq!(outcome.retried, 2);
    // The last, still-failing attempt takes nothing.
    assert_eq!(runner.budget().used(), 2);
}

#[test]
fn test_budget_exhaustion_is_fatal() {
    let exec = Arc::new(Scripted::always(CommandStatus::Exited(1)));
    let runner = runner(&exec, Some(3), false, 1);
    let err = runner.run("broken").unwrap_err();
    assert!(matches!(err, CommandError::BudgetExhausted { max: 1, .. }));
    assert_eq!(exec.calls().len(), 2);
    assert!(runner.budget().is_exhausted());
}

#[test]
fn test_budget_counts_across_commands() {
    let budget = FailureBudget::new(2);
    assert_eq!(budget.consume("a").unwrap(), 1);
    assert_eq!(budget.consume("b").unwrap(), 0);
    assert!(budget.consume("c").is_err());
    assert_eq!(budget.used(), 2);
}

#[test]
fn test_nonzero_exit_without_force_is_fatal() {
    let exec = Arc::new(Scripted::always(CommandStatus::Exited(2)));
    let err = runner(&exec, None, false, 0)
        .run_checked("false")
        .unwrap_err();
    assert!(matches!(err, CommandError::Failed { code: 2, .. }));
}

#[test]
fn test_force_tolerates_nonzero_exit() {
    let exec = Arc::new(Scripted::always(CommandStatus::Exited(2)));
    let outcome = runner(&exec, None, true, 0).run_checked("false").unwrap();
    assert_eq!(outcome.status, CommandStatus::Exited(2));
}

#[test]
fn test_interrupt_signal_bypasses_force() {
    let exec = Arc::new(Scripted::always(CommandStatus::Signaled(libc::SIGINT)));
    let err = runner(&exec, None, true, 0).run_checked("sleep").unwrap_err();
    assert!(matches!(err, CommandError::Interrupted { .. }));
    assert_eq!(CatfindError::from(err).exit_code(), 130);
}

#[test]
fn test_other_signal_respects_force() {
    let exec = Arc::new(Scripted::always(CommandStatus::Signaled(libc::SIGKILL)));
    assert!(runner(&exec, None, true, 0).run_checked("x").is_ok());
    assert!(matches!(
        runner(&exec, None, false, 0).run_checked("x"),
        Err(CommandError::Signaled { .. })
    ));
}

#[test]
fn test_cancelled_runner_runs_nothing() {
    let exec = Arc::new(Scripted::default());
    let cancel = CancelToken::new();
    cancel.cancel();
    let runner = RetryableRunner::new(
        exec.clone(),
        None,
        false,
        Arc::new(FailureBudget::new(0)),
        cancel,
    );
    assert!(matches!(
        runner.run("x"),
        Err(CommandError::Interrupted { .. })
    ));
    assert!(exec.calls().is_empty());
}

// --- TaskQueue ---

fn queue(exec: &Arc<Scripted>, tasks: usize, capacity: usize) -> TaskQueue {
    TaskQueue::new(tasks, capacity, Arc::new(runner(exec, None, false, 0))).unwrap()
}

#[test]
fn test_full_queue_runs_exactly_one_batch() {
    let exec = Arc::new(Scripted::default());
    let mut q = queue(&exec, 3, 2);
    let mut reports = Vec::new();
    for i in 0..6 {
        reports.push(q.enqueue(format!("cmd {i}")).unwrap());
    }
    assert!(reports[..5].iter().all(Option::is_none));
    let report = reports[5].unwrap();
    assert_eq!(report.executed, 6);
    assert_eq!(report.workers, 3);
    assert_eq!(q.batches(), 1);
    assert!(q.is_empty());
    assert!(!q.is_running());

    let mut calls = exec.calls();
    calls.sort();
    let expected: Vec<String> = (0..6).map(|i| format!("cmd {i}")).collect();
    assert_eq!(calls, expected);
}

#[test]
fn test_partial_flush_runs_enqueued_commands_once() {
    let exec = Arc::new(Scripted::default());
    let mut q = queue(&exec, 3, 2);
    for i in 0..4 {
        assert!(q.enqueue(format!("cmd {i}")).unwrap().is_none());
    }
    assert_eq!(q.queued(), 4);
    let report = q.flush().unwrap().unwrap();
    assert_eq!(report.executed, 4);
    assert_eq!(exec.calls().len(), 4);
    assert!(q.is_empty());
    assert!(q.flush().unwrap().is_none());
    assert_eq!(exec.calls().len(), 4);
}

#[test]
fn test_flush_on_empty_queue_is_noop() {
    let exec = Arc::new(Scripted::default());
    let mut q = queue(&exec, 2, 2);
    assert!(q.flush().unwrap().is_none());
    assert_eq!(q.batches(), 0);
    assert!(exec.calls().is_empty());
}

#[test]
fn test_task_runs_its_commands_in_order() {
    let exec = Arc::new(Scripted::default());
    let mut q = queue(&exec, 2, 3);
    for i in 0..6 {
        q.enqueue(format!("cmd {i}")).unwrap();
    }
    let calls = exec.calls();
    let pos = |c: &str| calls.iter().position(|x| x == c).unwrap();
    assert!(pos("cmd 0") < pos("cmd 1") && pos("cmd 1") < pos("cmd 2"));
    assert!(pos("cmd 3") < pos("cmd 4") && pos("cmd 4") < pos("cmd 5"));
}

#[test]
fn test_filling_resumes_after_batch() {
    let exec = Arc::new(Scripted::default());
    let mut q = queue(&exec, 2, 1);
    for i in 0..5 {
        q.enqueue(format!("cmd {i}")).unwrap();
    }
    assert_eq!(q.batches(), 2);
    assert_eq!(q.queued(), 1);
    assert_eq!(q.tasks()[0].len(), 1);
    q.flush().unwrap();
    assert_eq!(q.executed(), 5);
}

#[test]
fn test_worker_failure_is_fatal_at_join() {
    let exec = Arc::new(Scripted::always(CommandStatus::Exited(1)));
    let mut q = queue(&exec, 2, 1);
    assert!(q.enqueue("a").unwrap().is_none());
    let err = q.enqueue("b").unwrap_err();
    assert!(matches!(
        err,
        QueueError::Worker {
            source: CommandError::Failed { .. },
            ..
        }
    ));
    assert!(q.is_empty());
    assert!(!q.is_running());
}

#[test]
fn test_budget_is_shared_by_workers() {
    let exec = Arc::new(Scripted::always(CommandStatus::Exited(1)));
    let shared = Arc::new(runner(&exec, Some(1), false, 1));
    let mut q = TaskQueue::new(2, 1, Arc::clone(&shared)).unwrap();
    q.enqueue("a").unwrap();
    let err = q.enqueue("b").unwrap_err();
    assert!(matches!(
        err,
        QueueError::Worker {
            source: CommandError::BudgetExhausted { .. },
            ..
        }
    ));
    assert_eq!(CatfindError::from(err).exit_code(), 5);
    assert_eq!(shared.budget().used(), 1);
}

#[test]
fn test_queue_size_limits() {
    let exec = Arc::new(Scripted::default());
    let r = Arc::new(runner(&exec, None, false, 0));
    assert!(matches!(
        TaskQueue::new(0, 4, Arc::clone(&r)),
        Err(QueueError::Size { .. })
    ));
    assert!(matches!(
        TaskQueue::new(65, 4, Arc::clone(&r)),
        Err(QueueError::Size { max: 64, .. })
    ));
    assert!(TaskQueue::new(64, 1, r).is_ok());
}
