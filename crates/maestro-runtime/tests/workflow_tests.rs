//! Workflow engine behavior: dependency ordering, variable propagation,
//! failure isolation and definition-time validation.

use async_trait::async_trait;
use maestro_core::{Worker, WorkerError};
use maestro_runtime::{Orchestrator, StepStatus, Workflow, WorkflowStep};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Records the payloads it was dispatched, in arrival order, and
/// returns `out:<payload>`.
struct RecordingWorker {
    name: String,
    seen: Mutex<Vec<String>>,
}

impl RecordingWorker {
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
impl Worker for RecordingWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, payload: &str) -> Result<String, WorkerError> {
        self.seen.lock().expect("test lock").push(payload.to_string());
        Ok(format!("out:{payload}"))
    }
}

struct FailingWorker;

#[async_trait]
impl Worker for FailingWorker {
    fn name(&self) -> &str {
        "failing"
    }

    async fn run(&self, _payload: &str) -> Result<String, WorkerError> {
        Err(WorkerError::new("step exploded"))
    }
}

fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

#[tokio::test]
async fn chain_runs_in_dependency_order_with_output_binding() {
    let orchestrator = Orchestrator::new();
    let worker = RecordingWorker::new("agent");
    orchestrator.register_worker(worker.clone());

    let workflow = Workflow::builder("chain")
        .step(WorkflowStep::new("agent", "collect {topic}"))
        .step(
            WorkflowStep::new("agent", "summarize")
                .with_depends_on([0])
                .with_output_var("summary"),
        )
        .step(WorkflowStep::new("agent", "publish: {summary}").with_depends_on([1]))
        .build()
        .expect("valid workflow");

    let run = orchestrator
        .run_workflow(&workflow, vars(&[("topic", "rust")]))
        .await;

    assert!(run.is_success());
    assert_eq!(run.step_count, 3);

    let seen = worker.seen();
    assert_eq!(seen[0], "collect rust");
    assert_eq!(seen[1], "summarize");
    // The third step's payload carries the second step's result,
    // substituted for {summary}.
    assert_eq!(seen[2], "publish: out:summarize");
    assert_eq!(run.results[2], "out:publish: out:summarize");

    // output_var bindings are visible in the final variable map.
    assert_eq!(run.variables.get("summary").map(String::as_str), Some("out:summarize"));
}

#[tokio::test]
async fn diamond_joins_after_both_branches() {
    let orchestrator = Orchestrator::new();
    let worker = RecordingWorker::new("agent");
    orchestrator.register_worker(worker.clone());

    let workflow = Workflow::builder("diamond")
        .step(WorkflowStep::new("agent", "root").with_output_var("r"))
        .step(
            WorkflowStep::new("agent", "left of {r}")
                .with_depends_on([0])
                .with_output_var("l"),
        )
        .step(
            WorkflowStep::new("agent", "right of {r}")
                .with_depends_on([0])
                .with_output_var("rr"),
        )
        .step(WorkflowStep::new("agent", "join {l} + {rr}").with_depends_on([1, 2]))
        .build()
        .expect("valid workflow");

    let run = orchestrator.run_workflow(&workflow, HashMap::new()).await;

    assert!(run.is_success());
    let seen = worker.seen();
    assert_eq!(seen[0], "root");
    // Branch order within a wave is unspecified; the join runs last and
    // sees both branch results.
    assert_eq!(seen[3], "join out:left of out:root + out:right of out:root");
}

#[tokio::test]
async fn failed_step_skips_its_dependents() {
    let orchestrator = Orchestrator::new();
    let worker = RecordingWorker::new("agent");
    orchestrator.register_worker(worker.clone());
    orchestrator.register_worker(Arc::new(FailingWorker));

    let workflow = Workflow::builder("partial")
        .step(WorkflowStep::new("agent", "fine"))
        .step(WorkflowStep::new("failing", "boom").with_depends_on([0]))
        .step(WorkflowStep::new("agent", "never runs").with_depends_on([1]))
        .build()
        .expect("valid workflow");

    let run = orchestrator.run_workflow(&workflow, HashMap::new()).await;

    assert!(!run.is_success());
    assert_eq!(run.steps[0].status, StepStatus::Completed);
    assert_eq!(run.steps[1].status, StepStatus::Failed);
    assert_eq!(run.steps[2].status, StepStatus::Skipped);
    assert!(run.results[1].starts_with("[FAILED] "));
    assert!(run.results[2].contains("dependency step 1"));
    // The dependent was never dispatched.
    assert_eq!(worker.seen(), vec!["fine".to_string()]);
}

#[tokio::test]
async fn independent_branch_survives_a_failure_elsewhere() {
    let orchestrator = Orchestrator::new();
    let worker = RecordingWorker::new("agent");
    orchestrator.register_worker(worker.clone());
    orchestrator.register_worker(Arc::new(FailingWorker));

    let workflow = Workflow::builder("split")
        .step(WorkflowStep::new("failing", "boom"))
        .step(WorkflowStep::new("agent", "independent"))
        .step(WorkflowStep::new("agent", "blocked").with_depends_on([0]))
        .build()
        .expect("valid workflow");

    let run = orchestrator.run_workflow(&workflow, HashMap::new()).await;

    assert_eq!(run.steps[0].status, StepStatus::Failed);
    assert_eq!(run.steps[1].status, StepStatus::Completed);
    assert_eq!(run.steps[2].status, StepStatus::Skipped);
    assert_eq!(worker.seen(), vec!["independent".to_string()]);
}

#[tokio::test]
async fn caller_variables_seed_the_first_wave() {
    let orchestrator = Orchestrator::new();
    let worker = RecordingWorker::new("agent");
    orchestrator.register_worker(worker.clone());

    let workflow = Workflow::builder("seeded")
        .step(WorkflowStep::new("agent", "hello {name}, mode={mode}"))
        .build()
        .expect("valid workflow");

    let run = orchestrator
        .run_workflow(&workflow, vars(&[("name", "ada"), ("mode", "fast")]))
        .await;

    assert!(run.is_success());
    assert_eq!(worker.seen(), vec!["hello ada, mode=fast".to_string()]);
    assert_eq!(run.name, "seeded");
}

#[tokio::test]
async fn unknown_worker_in_a_step_fails_that_step() {
    let orchestrator = Orchestrator::new();
    let worker = RecordingWorker::new("agent");
    orchestrator.register_worker(worker.clone());

    let workflow = Workflow::builder("missing-worker")
        .step(WorkflowStep::new("ghost", "anything"))
        .step(WorkflowStep::new("agent", "after").with_depends_on([0]))
        .build()
        .expect("valid workflow");

    let run = orchestrator.run_workflow(&workflow, HashMap::new()).await;

    assert_eq!(run.steps[0].status, StepStatus::Failed);
    assert!(run.results[0].contains("not registered"));
    assert_eq!(run.steps[1].status, StepStatus::Skipped);
}
