//! The top-level scheduler: worker registry, priority queue and the
//! pipeline / parallel / workflow execution modes.
//!
//! The orchestrator never lets a failure escape as an error across the
//! queue boundary: every outcome is folded into the task's terminal
//! state, and batch operations always return a full result list.

use crate::config::OrchestratorConfig;
use crate::journal::TaskJournal;
use crate::template::substitute;
use crate::workflow::{StepStatus, Workflow, WorkflowRun, WorkflowStep};
use futures::future::join_all;
use maestro_core::{
    CapabilityError, Task, TaskError, TaskId, TaskPriority, TaskQueue, TaskStatus, Worker,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Submission parameters for [`Orchestrator::queue_task`]. Unset fields
/// fall back to the orchestrator's configured defaults.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    worker: String,
    payload: String,
    priority: TaskPriority,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    metadata: HashMap<String, serde_json::Value>,
}

impl TaskSpec {
    pub fn new(worker: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            worker: worker.into(),
            payload: payload.into(),
            priority: TaskPriority::default(),
            timeout: None,
            max_retries: None,
            metadata: HashMap::new(),
        }
    }

    pub fn priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// A `(worker, payload)` pair dispatched by [`Orchestrator::pipeline`]
/// and [`Orchestrator::parallel`].
#[derive(Debug, Clone)]
pub struct WorkerCall {
    pub worker: String,
    pub payload: String,
}

impl WorkerCall {
    pub fn new(worker: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            worker: worker.into(),
            payload: payload.into(),
        }
    }
}

/// Snapshot of queue and execution counters.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub pending: usize,
    pub active: usize,
    pub completed: usize,
    pub by_priority: BTreeMap<TaskPriority, usize>,
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} pending, {} active, {} completed",
            self.pending, self.active, self.completed
        )
    }
}

/// Best-effort callback fired for every task that reaches a terminal
/// state. Failures are logged and swallowed.
pub type CompletionListener = Arc<dyn Fn(&Task) -> Result<(), CapabilityError> + Send + Sync>;

/// The text surface of a terminal task: its result string, or a
/// `[FAILED] <reason>` marker.
pub fn render_result(task: &Task) -> String {
    match task.status {
        TaskStatus::Completed => task.result.clone().unwrap_or_default(),
        _ => format!(
            "[FAILED] {}",
            task.error.as_deref().unwrap_or("unknown failure")
        ),
    }
}

/// Decrements the active counter even when an executing future is
/// dropped at a batch deadline.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl<'a> ActiveGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Top-level scheduler owning the worker registry and the task queue.
pub struct Orchestrator {
    config: OrchestratorConfig,
    workers: RwLock<HashMap<String, Arc<dyn Worker>>>,
    queue: Mutex<TaskQueue>,
    next_id: AtomicU64,
    active: AtomicUsize,
    completed: Mutex<VecDeque<Task>>,
    listeners: Mutex<Vec<CompletionListener>>,
    journal: Option<TaskJournal>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::with_config(OrchestratorConfig::default())
    }

    pub fn with_config(config: OrchestratorConfig) -> Self {
        let journal = config
            .journal_path
            .clone()
            .map(|path| TaskJournal::new(path, config.history_limit));
        Self {
            config,
            workers: RwLock::new(HashMap::new()),
            queue: Mutex::new(TaskQueue::new()),
            next_id: AtomicU64::new(1),
            active: AtomicUsize::new(0),
            completed: Mutex::new(VecDeque::new()),
            listeners: Mutex::new(Vec::new()),
            journal,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Register a worker under the name it reports.
    pub fn register_worker(&self, worker: Arc<dyn Worker>) {
        let name = worker.name().to_string();
        info!(worker = %name, "registered worker");
        self.write_workers().insert(name, worker);
    }

    pub fn unregister_worker(&self, name: &str) -> bool {
        self.write_workers().remove(name).is_some()
    }

    /// Names of all registered workers, sorted.
    pub fn worker_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read_workers().keys().cloned().collect();
        names.sort();
        names
    }

    /// Add a best-effort completion listener.
    pub fn on_task_complete(
        &self,
        listener: impl Fn(&Task) -> Result<(), CapabilityError> + Send + Sync + 'static,
    ) {
        self.lock_listeners().push(Arc::new(listener));
    }

    /// Construct a task and insert it into the priority queue. Returns a
    /// snapshot of the pending task.
    pub fn queue_task(&self, spec: TaskSpec) -> Task {
        let task = self.build_task(spec);
        debug!(
            task = %task.id,
            worker = %task.worker,
            priority = %task.priority,
            "queued task"
        );
        self.lock_queue().push(task.clone());
        task
    }

    /// Remove a pending task from the queue and mark it cancelled.
    /// Running tasks are not preempted; unknown ids return `false`.
    pub fn cancel_task(&self, id: TaskId) -> bool {
        let removed = self.lock_queue().remove(id);
        match removed {
            Some(mut task) => {
                task.cancel();
                info!(task = %id, "task cancelled");
                self.finish(task);
                true
            }
            None => false,
        }
    }

    /// Queue and execution counters.
    pub fn queue_status(&self) -> QueueStatus {
        let (pending, by_priority) = {
            let queue = self.lock_queue();
            (queue.len(), queue.counts_by_priority())
        };
        QueueStatus {
            pending,
            active: self.active.load(Ordering::SeqCst),
            completed: self.lock_completed().len(),
            by_priority,
        }
    }

    /// Terminal tasks retained in memory, oldest first.
    pub fn completed_tasks(&self) -> Vec<Task> {
        self.lock_completed().iter().cloned().collect()
    }

    /// Look a task up by id in the retained history or the pending
    /// queue.
    pub fn get_task(&self, id: TaskId) -> Option<Task> {
        if let Some(task) = self
            .lock_completed()
            .iter()
            .rev()
            .find(|task| task.id == id)
        {
            return Some(task.clone());
        }
        self.lock_queue().get(id).cloned()
    }

    /// Dispatch one task to its worker, honoring the task's timeout and
    /// retry budget.
    ///
    /// A missing worker fails terminally with no retry. Timeouts and
    /// worker errors spend the retry budget with IMMEDIATE re-dispatch
    /// (task-level retries have no backoff, unlike tool-level retries);
    /// an exhausted budget ends in `TimedOut` or `Failed` respectively,
    /// with `retry_count == max_retries`. Never returns an error.
    pub async fn execute_task(&self, mut task: Task) -> Task {
        if task.status.is_terminal() {
            return task;
        }
        let Some(worker) = self.get_worker(&task.worker) else {
            let err = TaskError::WorkerNotFound {
                name: task.worker.clone(),
            };
            warn!(task = %task.id, worker = %task.worker, "worker not found");
            task.fail(err.to_string());
            self.finish(task.clone());
            return task;
        };

        task.start();
        let _active = ActiveGuard::new(&self.active);
        let timeout_ms = task.timeout.as_millis() as u64;

        loop {
            let outcome = tokio::time::timeout(task.timeout, worker.run(&task.payload)).await;
            match outcome {
                Ok(Ok(result)) => {
                    debug!(task = %task.id, "task completed");
                    task.complete(result);
                    break;
                }
                Ok(Err(err)) => {
                    let err = TaskError::ExecutionFailed {
                        worker: task.worker.clone(),
                        reason: err.reason,
                    };
                    if task.spend_retry() {
                        debug!(
                            task = %task.id,
                            retry = task.retry_count,
                            error = %err,
                            "retrying after worker failure"
                        );
                        continue;
                    }
                    warn!(task = %task.id, error = %err, "task failed");
                    task.fail(err.to_string());
                    break;
                }
                Err(_) => {
                    let err = TaskError::Timeout {
                        id: task.id,
                        timeout_ms,
                    };
                    if task.spend_retry() {
                        debug!(task = %task.id, retry = task.retry_count, "retrying after timeout");
                        continue;
                    }
                    warn!(task = %task.id, timeout_ms, "task timed out");
                    task.time_out(err.to_string());
                    break;
                }
            }
        }

        drop(_active);
        self.finish(task.clone());
        task
    }

    /// Ad-hoc single call outside the queue: build, execute, record, and
    /// return the text surface.
    pub async fn delegate(&self, worker: &str, payload: &str, timeout: Option<Duration>) -> String {
        let mut spec = TaskSpec::new(worker, payload);
        if let Some(timeout) = timeout {
            spec = spec.timeout(timeout);
        }
        let task = self.build_task(spec);
        let done = self.execute_task(task).await;
        render_result(&done)
    }

    /// Drain the entire current queue, executing up to `max_concurrent`
    /// tasks at a time. Results come back in drained (priority) order
    /// regardless of completion order.
    pub async fn process_queue(&self, max_concurrent: usize) -> Vec<Task> {
        let drained = self.lock_queue().drain();
        if drained.is_empty() {
            return Vec::new();
        }
        info!(
            tasks = drained.len(),
            max_concurrent = max_concurrent.max(1),
            "processing queue"
        );
        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let futures = drained.into_iter().map(|task| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore.acquire().await;
                self.execute_task(task).await
            }
        });
        join_all(futures).await
    }

    /// [`process_queue`](Self::process_queue) bounded by the configured
    /// `max_concurrent`.
    pub async fn drain(&self) -> Vec<Task> {
        self.process_queue(self.config.max_concurrent).await
    }

    /// Execute steps strictly sequentially. Before each step, `{key}`
    /// placeholders in the payload are substituted from a context that
    /// accumulates prior results under `step_<n>` (1-based) and
    /// `previous`. With `stop_on_error`, a failed step halts the
    /// pipeline and the partial results are returned.
    pub async fn pipeline(&self, steps: &[WorkerCall], stop_on_error: bool) -> Vec<String> {
        let mut context: HashMap<String, String> = HashMap::new();
        let mut results = Vec::with_capacity(steps.len());
        for (index, call) in steps.iter().enumerate() {
            let payload = substitute(&call.payload, &context);
            let task = self.build_task(TaskSpec::new(&call.worker, &payload));
            let done = self.execute_task(task).await;
            let failed = done.status != TaskStatus::Completed;
            let rendered = render_result(&done);
            context.insert(format!("step_{}", index + 1), rendered.clone());
            context.insert("previous".to_string(), rendered.clone());
            results.push(rendered);
            if stop_on_error && failed {
                warn!(step = index, "pipeline halted on failure");
                break;
            }
        }
        results
    }

    /// Execute all steps concurrently under ONE shared deadline. When
    /// the deadline expires, unfinished entries report a timeout marker
    /// while finished entries keep their real results; nothing is
    /// raised.
    pub async fn parallel(&self, steps: &[WorkerCall], timeout: Duration) -> Vec<String> {
        let slots: Vec<Mutex<Option<String>>> = steps.iter().map(|_| Mutex::new(None)).collect();
        {
            let slots = &slots;
            let futures = steps.iter().enumerate().map(|(index, call)| async move {
                let task = self.build_task(TaskSpec::new(&call.worker, &call.payload));
                let done = self.execute_task(task).await;
                let mut slot = slots[index].lock().unwrap_or_else(|e| e.into_inner());
                *slot = Some(render_result(&done));
            });
            if tokio::time::timeout(timeout, join_all(futures)).await.is_err() {
                warn!(
                    timeout = %humantime::format_duration(timeout),
                    "parallel batch hit shared deadline"
                );
            }
        }
        slots
            .into_iter()
            .map(|slot| {
                slot.into_inner()
                    .unwrap_or_else(|e| e.into_inner())
                    .unwrap_or_else(|| {
                        format!(
                            "[FAILED] timed out after {}",
                            humantime::format_duration(timeout)
                        )
                    })
            })
            .collect()
    }

    /// Run a workflow to its fixed point with a dependency-countdown
    /// ready queue: every step whose dependencies have all completed is
    /// dispatched (concurrently within a wave), its result optionally
    /// bound into the variable map, and its dependents' counters
    /// decremented. Dependents of a failed step are skipped with a
    /// failure marker.
    pub async fn run_workflow(
        &self,
        workflow: &Workflow,
        variables: HashMap<String, String>,
    ) -> WorkflowRun {
        let run_id = Uuid::new_v4();
        let mut vars = variables;
        let mut steps: Vec<WorkflowStep> = workflow.steps().to_vec();
        let step_count = steps.len();

        let mut indegree = vec![0usize; step_count];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); step_count];
        for (index, step) in steps.iter().enumerate() {
            indegree[index] = step.depends_on.len();
            for &dep in &step.depends_on {
                dependents[dep].push(index);
            }
        }
        let mut ready: Vec<usize> = (0..step_count).filter(|&i| indegree[i] == 0).collect();

        info!(
            workflow = %workflow.name(),
            run = %run_id,
            steps = step_count,
            "workflow started"
        );

        while !ready.is_empty() {
            let wave = std::mem::take(&mut ready);
            let dispatches: Vec<(usize, String, String)> = wave
                .iter()
                .map(|&index| {
                    (
                        index,
                        steps[index].worker.clone(),
                        substitute(&steps[index].template, &vars),
                    )
                })
                .collect();
            for &index in &wave {
                steps[index].status = StepStatus::Running;
            }

            let futures = dispatches
                .into_iter()
                .map(|(index, worker, payload)| async move {
                    debug!(run = %run_id, step = index, worker = %worker, "dispatching step");
                    let task = self.build_task(TaskSpec::new(&worker, &payload));
                    (index, self.execute_task(task).await)
                });

            for (index, done) in join_all(futures).await {
                let rendered = render_result(&done);
                if done.status == TaskStatus::Completed {
                    steps[index].status = StepStatus::Completed;
                    if let Some(var) = steps[index].output_var.clone() {
                        vars.insert(var, rendered.clone());
                    }
                    steps[index].result = Some(rendered);
                    for &dependent in &dependents[index] {
                        indegree[dependent] -= 1;
                        if indegree[dependent] == 0 {
                            ready.push(dependent);
                        }
                    }
                } else {
                    warn!(run = %run_id, step = index, "workflow step failed");
                    steps[index].status = StepStatus::Failed;
                    steps[index].result = Some(rendered);
                }
            }
        }

        // Whatever is still pending sits behind a failed dependency.
        let statuses: Vec<StepStatus> = steps.iter().map(|step| step.status).collect();
        for (index, step) in steps.iter_mut().enumerate() {
            if step.status == StepStatus::Pending {
                let blocked_on = step
                    .depends_on
                    .iter()
                    .copied()
                    .find(|&dep| statuses[dep] != StepStatus::Completed)
                    .unwrap_or(index);
                step.status = StepStatus::Skipped;
                step.result = Some(format!(
                    "[FAILED] dependency step {blocked_on} did not complete"
                ));
            }
        }

        let results: Vec<String> = steps
            .iter()
            .map(|step| step.result.clone().unwrap_or_default())
            .collect();
        info!(workflow = %workflow.name(), run = %run_id, "workflow finished");
        WorkflowRun {
            id: run_id,
            name: workflow.name().to_string(),
            step_count,
            results,
            variables: vars,
            steps,
        }
    }

    fn build_task(&self, spec: TaskSpec) -> Task {
        let id = TaskId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut task = Task::new(id, spec.worker, spec.payload)
            .with_priority(spec.priority)
            .with_timeout(spec.timeout.unwrap_or_else(|| self.config.timeout()))
            .with_max_retries(
                spec.max_retries
                    .unwrap_or(self.config.default_max_retries),
            );
        task.metadata = spec.metadata;
        task
    }

    fn get_worker(&self, name: &str) -> Option<Arc<dyn Worker>> {
        self.read_workers().get(name).cloned()
    }

    /// Record a terminal task: journal, listeners, then the capped
    /// in-memory history.
    fn finish(&self, task: Task) {
        if let Some(journal) = &self.journal {
            if let Err(err) = journal.append(&task) {
                warn!(task = %task.id, error = %err, "journal append failed");
            }
        }
        {
            let listeners = self.lock_listeners();
            for listener in listeners.iter() {
                if let Err(err) = listener(&task) {
                    warn!(task = %task.id, error = %err, "completion listener failed");
                }
            }
        }
        let mut completed = self.lock_completed();
        if completed.len() == self.config.history_limit {
            completed.pop_front();
        }
        completed.push_back(task);
    }

    // A poisoned lock only means another thread panicked mid-update; the
    // data itself stays usable.
    fn lock_queue(&self) -> MutexGuard<'_, TaskQueue> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_completed(&self) -> MutexGuard<'_, VecDeque<Task>> {
        self.completed.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Vec<CompletionListener>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn read_workers(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<dyn Worker>>> {
        self.workers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_workers(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<dyn Worker>>> {
        self.workers.write().unwrap_or_else(|e| e.into_inner())
    }
}
