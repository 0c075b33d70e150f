//! End-to-end scheduling behavior: queue ordering, retries, timeouts,
//! cancellation, pipeline context and the shared parallel deadline.

use async_trait::async_trait;
use maestro_core::{TaskPriority, TaskStatus, Worker, WorkerError};
use maestro_runtime::{Orchestrator, OrchestratorConfig, TaskSpec, WorkerCall};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Echoes its payload back, recording every payload it was given.
struct EchoWorker {
    name: String,
    seen: Mutex<Vec<String>>,
}

impl EchoWorker {
    fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().expect("test lock").clone()
    }
}

#[async_trait]
impl Worker for EchoWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, payload: &str) -> Result<String, WorkerError> {
        self.seen.lock().expect("test lock").push(payload.to_string());
        Ok(payload.to_string())
    }
}

/// Always fails, counting attempts.
struct FailingWorker {
    attempts: AtomicUsize,
}

impl FailingWorker {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            attempts: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Worker for FailingWorker {
    fn name(&self) -> &str {
        "failing"
    }

    async fn run(&self, _payload: &str) -> Result<String, WorkerError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(WorkerError::new("deliberate failure"))
    }
}

/// Sleeps for the duration encoded in its payload (millis), then echoes.
struct SleepyWorker;

#[async_trait]
impl Worker for SleepyWorker {
    fn name(&self) -> &str {
        "sleepy"
    }

    async fn run(&self, payload: &str) -> Result<String, WorkerError> {
        let millis: u64 = payload.parse().unwrap_or(10);
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(format!("slept {millis}"))
    }
}

/// Tracks how many runs are in flight at once.
struct GaugeWorker {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl GaugeWorker {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Worker for GaugeWorker {
    fn name(&self) -> &str {
        "gauge"
    }

    async fn run(&self, payload: &str) -> Result<String, WorkerError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(payload.to_string())
    }
}

#[tokio::test]
async fn process_queue_returns_results_in_priority_order() {
    let orchestrator = Orchestrator::new();
    orchestrator.register_worker(Arc::new(SleepyWorker));

    // The critical task sleeps longest and finishes last; results must
    // still come back in drained (priority) order.
    orchestrator.queue_task(TaskSpec::new("sleepy", "1").priority(TaskPriority::Low));
    orchestrator.queue_task(TaskSpec::new("sleepy", "60").priority(TaskPriority::Critical));
    orchestrator.queue_task(TaskSpec::new("sleepy", "20").priority(TaskPriority::Normal));

    let done = orchestrator.process_queue(3).await;
    let results: Vec<&str> = done.iter().filter_map(|t| t.result.as_deref()).collect();
    assert_eq!(results, vec!["slept 60", "slept 20", "slept 1"]);
    assert!(done.iter().all(|t| t.status == TaskStatus::Completed));
}

#[tokio::test]
async fn equal_priority_tasks_keep_submission_order() {
    let orchestrator = Orchestrator::new();
    let echo = EchoWorker::new("echo");
    orchestrator.register_worker(echo.clone());

    for payload in ["first", "second", "third"] {
        orchestrator.queue_task(TaskSpec::new("echo", payload));
    }
    let done = orchestrator.process_queue(1).await;
    let results: Vec<&str> = done.iter().filter_map(|t| t.result.as_deref()).collect();
    assert_eq!(results, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn bounded_concurrency_is_respected() {
    let orchestrator = Orchestrator::new();
    let gauge = GaugeWorker::new();
    orchestrator.register_worker(gauge.clone());

    for i in 0..6 {
        orchestrator.queue_task(TaskSpec::new("gauge", format!("task-{i}")));
    }
    let done = orchestrator.process_queue(2).await;

    assert_eq!(done.len(), 6);
    assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(gauge.current.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancelled_task_is_never_dispatched() {
    let orchestrator = Orchestrator::new();
    let echo = EchoWorker::new("echo");
    orchestrator.register_worker(echo.clone());

    let keep = orchestrator.queue_task(TaskSpec::new("echo", "keep"));
    let victim = orchestrator.queue_task(TaskSpec::new("echo", "drop"));

    assert!(orchestrator.cancel_task(victim.id));
    assert_eq!(orchestrator.queue_status().pending, 1);

    let done = orchestrator.process_queue(2).await;
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].id, keep.id);
    assert_eq!(echo.seen(), vec!["keep".to_string()]);

    let cancelled = orchestrator.get_task(victim.id).expect("kept in history");
    assert_eq!(cancelled.status, TaskStatus::Cancelled);
}

#[tokio::test]
async fn failing_worker_exhausts_retry_budget() {
    let orchestrator = Orchestrator::new();
    let failing = FailingWorker::new();
    orchestrator.register_worker(failing.clone());

    orchestrator.queue_task(TaskSpec::new("failing", "doomed").max_retries(3));
    let done = orchestrator.process_queue(1).await;

    assert_eq!(done[0].status, TaskStatus::Failed);
    assert_eq!(done[0].retry_count, 3);
    // Initial attempt plus exactly three retries.
    assert_eq!(failing.attempts.load(Ordering::SeqCst), 4);
    assert!(
        done[0]
            .error
            .as_deref()
            .unwrap_or("")
            .contains("deliberate failure")
    );
}

#[tokio::test(start_paused = true)]
async fn timeouts_exhaust_the_same_budget() {
    let orchestrator = Orchestrator::new();
    orchestrator.register_worker(Arc::new(SleepyWorker));

    orchestrator.queue_task(
        TaskSpec::new("sleepy", "600000")
            .timeout(Duration::from_millis(50))
            .max_retries(2),
    );
    let done = orchestrator.process_queue(1).await;

    assert_eq!(done[0].status, TaskStatus::TimedOut);
    assert_eq!(done[0].retry_count, 2);
    assert!(done[0].error.as_deref().unwrap_or("").contains("timed out"));
}

#[tokio::test]
async fn unknown_worker_fails_without_retries() {
    let orchestrator = Orchestrator::new();
    orchestrator.queue_task(TaskSpec::new("ghost", "anything").max_retries(5));
    let done = orchestrator.process_queue(1).await;

    assert_eq!(done[0].status, TaskStatus::Failed);
    assert_eq!(done[0].retry_count, 0);
    assert!(
        done[0]
            .error
            .as_deref()
            .unwrap_or("")
            .contains("not registered")
    );
}

#[tokio::test]
async fn pipeline_substitutes_context_between_steps() {
    let orchestrator = Orchestrator::new();
    let echo = EchoWorker::new("echo");
    orchestrator.register_worker(echo.clone());

    let steps = vec![
        WorkerCall::new("echo", "alpha"),
        WorkerCall::new("echo", "got {previous}"),
        WorkerCall::new("echo", "first was {step_1}"),
    ];
    let results = orchestrator.pipeline(&steps, false).await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0], "alpha");
    assert_eq!(results[1], "got alpha");
    assert_eq!(results[2], "first was alpha");
    assert_eq!(
        echo.seen(),
        vec![
            "alpha".to_string(),
            "got alpha".to_string(),
            "first was alpha".to_string(),
        ]
    );
}

#[tokio::test]
async fn pipeline_stops_on_error_with_partial_results() {
    let orchestrator = Orchestrator::new();
    let echo = EchoWorker::new("echo");
    orchestrator.register_worker(echo.clone());
    orchestrator.register_worker(FailingWorker::new());

    let steps = vec![
        WorkerCall::new("echo", "one"),
        WorkerCall::new("failing", "two"),
        WorkerCall::new("echo", "three"),
    ];
    let results = orchestrator.pipeline(&steps, true).await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0], "one");
    assert!(results[1].starts_with("[FAILED] "));
    // The third step never ran.
    assert_eq!(echo.seen(), vec!["one".to_string()]);
}

#[tokio::test]
async fn pipeline_without_stop_on_error_runs_every_step() {
    let orchestrator = Orchestrator::new();
    let echo = EchoWorker::new("echo");
    orchestrator.register_worker(echo.clone());
    orchestrator.register_worker(FailingWorker::new());

    let steps = vec![
        WorkerCall::new("failing", "boom"),
        WorkerCall::new("echo", "previous said {previous}"),
    ];
    let results = orchestrator.pipeline(&steps, false).await;

    assert_eq!(results.len(), 2);
    // The failure marker is visible to the next step's template.
    assert!(results[1].starts_with("previous said [FAILED]"));
}

#[tokio::test(start_paused = true)]
async fn parallel_reports_every_entry_after_the_shared_deadline() {
    let orchestrator = Orchestrator::with_config(
        // Per-task deadline longer than the batch deadline, so the
        // shared deadline is what fires.
        OrchestratorConfig::new().default_timeout(Duration::from_secs(3600)),
    );
    let echo = EchoWorker::new("echo");
    orchestrator.register_worker(echo.clone());
    orchestrator.register_worker(Arc::new(SleepyWorker));

    let steps = vec![
        WorkerCall::new("echo", "quick"),
        WorkerCall::new("sleepy", "600000"),
    ];
    let results = orchestrator.parallel(&steps, Duration::from_millis(100)).await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0], "quick");
    assert!(results[1].starts_with("[FAILED] timed out after"));
}

#[tokio::test]
async fn parallel_completes_without_deadline_pressure() {
    let orchestrator = Orchestrator::new();
    let echo = EchoWorker::new("echo");
    orchestrator.register_worker(echo.clone());

    let steps = vec![
        WorkerCall::new("echo", "a"),
        WorkerCall::new("echo", "b"),
        WorkerCall::new("echo", "c"),
    ];
    let results = orchestrator.parallel(&steps, Duration::from_secs(5)).await;
    assert_eq!(results, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn completion_listeners_fire_for_terminal_tasks() {
    let orchestrator = Orchestrator::new();
    let echo = EchoWorker::new("echo");
    orchestrator.register_worker(echo.clone());

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    orchestrator.on_task_complete(move |task| {
        assert!(task.status.is_terminal());
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    orchestrator.queue_task(TaskSpec::new("echo", "one"));
    orchestrator.queue_task(TaskSpec::new("echo", "two"));
    orchestrator.process_queue(2).await;
    orchestrator.delegate("echo", "three", None).await;

    assert_eq!(fired.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn history_is_capped_to_the_configured_limit() {
    let orchestrator =
        Orchestrator::with_config(OrchestratorConfig::new().history_limit(3));
    let echo = EchoWorker::new("echo");
    orchestrator.register_worker(echo.clone());

    for i in 0..5 {
        orchestrator.delegate("echo", &format!("call-{i}"), None).await;
    }

    let completed = orchestrator.completed_tasks();
    assert_eq!(completed.len(), 3);
    assert_eq!(completed[0].payload, "call-2");
    assert_eq!(completed[2].payload, "call-4");
}

#[tokio::test]
async fn journal_records_terminal_tasks() {
    let dir = tempfile::tempdir().expect("tempdir");
    let journal_path = dir.path().join("tasks.jsonl");
    let orchestrator = Orchestrator::with_config(
        OrchestratorConfig::new().journal_path(&journal_path),
    );
    let echo = EchoWorker::new("echo");
    orchestrator.register_worker(echo.clone());
    orchestrator.register_worker(FailingWorker::new());

    orchestrator.delegate("echo", "persisted", None).await;
    orchestrator
        .delegate("failing", "also persisted", Some(Duration::from_secs(1)))
        .await;

    let journal = maestro_runtime::TaskJournal::new(&journal_path, 100);
    let entries = journal.load().expect("journal loads");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].status, TaskStatus::Completed);
    assert_eq!(entries[1].status, TaskStatus::Failed);
    assert_eq!(entries[0].worker, "echo");
}
