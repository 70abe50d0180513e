//! Run-scoped data: inputs, per-task results, and overall run state

use chrono::{DateTime, Utc};
use product_discovery_sdk::{PipelineError, RunStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel used when the caller leaves constraints blank
pub const NO_CONSTRAINTS: &str = "No specific constraints provided";
/// Sentinel used when industry/vertical are left blank
pub const NOT_SPECIFIED: &str = "Not specified";

/// Inputs for one discovery run. Immutable once the run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInput {
    pub product_idea: String,
    pub target_customer: String,
    pub constraints: String,
    pub industry: String,
    pub vertical: String,
}

impl RunInput {
    /// Build a run input, defaulting blank optional fields to the sentinel
    /// texts shown to the agents.
    pub fn new(
        product_idea: impl Into<String>,
        target_customer: impl Into<String>,
        constraints: Option<String>,
        industry: Option<String>,
        vertical: Option<String>,
    ) -> Self {
        let or_sentinel = |value: Option<String>, sentinel: &str| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| sentinel.to_string())
        };
        Self {
            product_idea: product_idea.into().trim().to_string(),
            target_customer: target_customer.into().trim().to_string(),
            constraints: or_sentinel(constraints, NO_CONSTRAINTS),
            industry: or_sentinel(industry, NOT_SPECIFIED),
            vertical: or_sentinel(vertical, NOT_SPECIFIED),
        }
    }

    /// Product idea and target customer are mandatory; everything else has
    /// a sentinel default.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.product_idea.is_empty() || self.target_customer.is_empty() {
            return Err(PipelineError::Validation(
                "product idea and target customer are required".to_string(),
            ));
        }
        Ok(())
    }

    /// Placeholder name/value pairs available to instruction templates
    pub fn placeholders(&self) -> [(&'static str, &str); 5] {
        [
            ("product_idea", self.product_idea.as_str()),
            ("target_customer", self.target_customer.as_str()),
            ("constraints", self.constraints.as_str()),
            ("industry", self.industry.as_str()),
            ("vertical", self.vertical.as_str()),
        ]
    }
}

/// Output of one task, created exactly once per task per run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub raw_text: String,
    pub completed_at: DateTime<Utc>,
}

impl TaskResult {
    pub fn new(task_id: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            raw_text: raw_text.into(),
            completed_at: Utc::now(),
        }
    }
}

/// State of one run, owned by the orchestrator for the run's lifetime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: Uuid,
    pub status: RunStatus,
    /// Insertion order equals execution order
    pub task_results: Vec<TaskResult>,
    pub error: Option<String>,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: RunStatus::Pending,
            task_results: Vec::new(),
            error: None,
        }
    }

    /// A failed state not produced by the pipeline itself (e.g. the run
    /// task panicked under the streaming facade)
    pub fn aborted(error: impl Into<String>) -> Self {
        let mut state = Self::new();
        state.status = RunStatus::Failed;
        state.error = Some(error.into());
        state
    }

    pub fn result_for(&self, task_id: &str) -> Option<&TaskResult> {
        self.task_results.iter().find(|r| r.task_id == task_id)
    }

    /// The final task's output, the pipeline's terminal narrative
    pub fn terminal_narrative(&self) -> Option<&str> {
        self.task_results.last().map(|r| r.raw_text.as_str())
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
