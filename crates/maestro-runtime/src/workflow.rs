//! Workflow definitions: a named DAG of steps with variable propagation.
//!
//! A workflow is validated when it is built: unknown dependency indices
//! and cycles are definition-time errors, so the engine never has to
//! detect a stuck graph at run time.

use maestro_core::WorkflowError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Execution state of one workflow step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Never dispatched because a dependency did not complete.
    Skipped,
}

/// One node of the workflow DAG. The step's position in the workflow is
/// its node id, referenced by other steps' `depends_on` sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub worker: String,
    /// Payload template; `{var}` placeholders are substituted from the
    /// workflow variables before dispatch.
    pub template: String,
    pub depends_on: Vec<usize>,
    /// When set, the step's result is bound into the workflow variables
    /// under this name.
    pub output_var: Option<String>,
    pub status: StepStatus,
    pub result: Option<String>,
}

impl WorkflowStep {
    pub fn new(worker: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            worker: worker.into(),
            template: template.into(),
            depends_on: Vec::new(),
            output_var: None,
            status: StepStatus::Pending,
            result: None,
        }
    }

    pub fn with_depends_on(mut self, deps: impl IntoIterator<Item = usize>) -> Self {
        self.depends_on = deps.into_iter().collect();
        self
    }

    pub fn with_output_var(mut self, var: impl Into<String>) -> Self {
        self.output_var = Some(var.into());
        self
    }
}

/// A validated workflow definition. Construct through
/// [`Workflow::builder`].
#[derive(Debug, Clone)]
pub struct Workflow {
    name: String,
    steps: Vec<WorkflowStep>,
}

impl Workflow {
    pub fn builder(name: impl Into<String>) -> WorkflowBuilder {
        WorkflowBuilder {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[WorkflowStep] {
        &self.steps
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

/// Builder that validates the dependency graph on `build`.
#[derive(Debug)]
pub struct WorkflowBuilder {
    name: String,
    steps: Vec<WorkflowStep>,
}

impl WorkflowBuilder {
    /// Append a step; its index becomes its node id.
    pub fn step(mut self, step: WorkflowStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Validate the definition: the workflow must be non-empty, every
    /// dependency index must exist, and the graph must be acyclic.
    pub fn build(self) -> Result<Workflow, WorkflowError> {
        let n = self.steps.len();
        if n == 0 {
            return Err(WorkflowError::EmptyWorkflow { name: self.name });
        }

        for (index, step) in self.steps.iter().enumerate() {
            for &dep in &step.depends_on {
                if dep >= n {
                    return Err(WorkflowError::UnknownDependency {
                        name: self.name,
                        step: index,
                        dependency: dep,
                    });
                }
            }
        }

        // Kahn's algorithm: every step left unprocessed sits on a cycle
        // (a self-dependency is the degenerate case).
        let mut indegree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (index, step) in self.steps.iter().enumerate() {
            indegree[index] = step.depends_on.len();
            for &dep in &step.depends_on {
                dependents[dep].push(index);
            }
        }
        let mut ready: Vec<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut processed = 0usize;
        while let Some(index) = ready.pop() {
            processed += 1;
            for &dependent in &dependents[index] {
                indegree[dependent] -= 1;
                if indegree[dependent] == 0 {
                    ready.push(dependent);
                }
            }
        }
        if processed < n {
            let step = (0..n)
                .find(|&i| indegree[i] > 0)
                .unwrap_or(0);
            return Err(WorkflowError::DependencyCycle {
                name: self.name,
                step,
            });
        }

        Ok(Workflow {
            name: self.name,
            steps: self.steps,
        })
    }
}

/// Outcome of one workflow execution.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowRun {
    pub id: Uuid,
    pub name: String,
    pub step_count: usize,
    /// Rendered result per step, in step-index order. Skipped steps
    /// carry a `[FAILED] dependency …` marker.
    pub results: Vec<String>,
    /// Caller-seeded variables extended by `output_var` bindings.
    pub variables: HashMap<String, String>,
    /// Final per-step state.
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowRun {
    /// Whether every step completed.
    pub fn is_success(&self) -> bool {
        self.steps
            .iter()
            .all(|step| step.status == StepStatus::Completed)
    }
}
