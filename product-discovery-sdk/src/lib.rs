// Re-export async trait for convenience
pub use async_trait::async_trait;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Status of a discovery run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// Error kinds surfaced by the pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Required run inputs missing; rejected before any task executes
    #[error("validation error: {0}")]
    Validation(String),

    /// Malformed static agent/task definitions; fatal, never recovered
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The agent executor failed for a task; fatal to the run
    #[error("task '{task}' dispatch failed: {message}")]
    TaskDispatch { task: String, message: String },

    /// The whole run exceeded the caller-supplied deadline
    #[error("run timed out after {0} seconds")]
    Timeout(u64),
}

/// Result type for agent executor implementations
pub type ExecutorResult = Result<String, Box<dyn std::error::Error + Send + Sync>>;

/// An agent persona: who executes a task and which tools it may call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub id: String,
    pub role: String,
    pub goal: String,
    #[serde(default)]
    pub backstory: String,
    #[serde(default)]
    pub tools: Vec<String>,
}

impl AgentDefinition {
    /// Render the persona as a system instruction for the executor
    pub fn persona(&self) -> String {
        let mut text = format!("You are {}.\nYour goal: {}", self.role, self.goal);
        if !self.backstory.is_empty() {
            text.push_str("\nBackground: ");
            text.push_str(&self.backstory);
        }
        text
    }
}

/// One unit of agent work with a fixed position in the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub id: String,
    /// Instruction template with `{placeholder}` references to run inputs
    /// and upstream task ids
    pub description: String,
    #[serde(default)]
    pub expected_output: String,
    /// Agent id responsible for this task
    pub agent: String,
    /// Upstream task ids whose output is injected as context
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Index in the pipeline; assigned from declaration order at load
    #[serde(skip)]
    pub position: usize,
}

/// Structured events emitted while a run executes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// Run accepted and started
    RunStarted { run_id: String },
    /// Task dispatched to its agent
    TaskStarted {
        task_id: String,
        agent: String,
        description: String,
        position: usize,
        total_tasks: usize,
    },
    /// Streaming agent reasoning text
    AgentMessage {
        task_id: String,
        agent: String,
        text: String,
    },
    /// Agent invoked a capability tool
    ToolInvoked {
        task_id: String,
        tool: String,
        arguments: String,
    },
    /// Capability tool returned
    ToolCompleted {
        task_id: String,
        tool: String,
        summary: String,
    },
    /// Task finished and its result was recorded
    TaskCompleted { task_id: String, summary: String },
    /// Task dispatch failed; the run aborts after this event
    TaskFailed { task_id: String, error: String },
    /// All tasks completed
    RunCompleted { run_id: String },
    /// Run reached a terminal failure
    RunFailed { run_id: String, error: String },
}

/// A timestamped progress fragment, append-only within one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub timestamp: DateTime<Utc>,
    pub event: RunEvent,
}

impl ProgressEvent {
    pub fn now(event: RunEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }

    /// Render as a single display line, `[HH:MM:SS] message`
    pub fn render(&self) -> String {
        format!("[{}] {}", self.timestamp.format("%H:%M:%S"), self.message())
    }

    fn message(&self) -> String {
        match &self.event {
            RunEvent::RunStarted { run_id } => format!("🚀 Run {} started", run_id),
            RunEvent::TaskStarted {
                task_id,
                agent,
                position,
                total_tasks,
                ..
            } => format!(
                "▶ Task {}/{}: {} ({})",
                position + 1,
                total_tasks,
                task_id,
                agent
            ),
            RunEvent::AgentMessage { agent, text, .. } => format!("💭 {}: {}", agent, text),
            RunEvent::ToolInvoked {
                tool, arguments, ..
            } => format!("🔧 Using tool: {} {}", tool, arguments),
            RunEvent::ToolCompleted { tool, summary, .. } => {
                format!("✓ Tool {}: {}", tool, summary)
            }
            RunEvent::TaskCompleted { task_id, summary } => {
                format!("✓ Task {} complete: {}", task_id, summary)
            }
            RunEvent::TaskFailed { task_id, error } => {
                format!("✗ Task {} failed: {}", task_id, error)
            }
            RunEvent::RunCompleted { run_id } => format!("🏁 Run {} completed", run_id),
            RunEvent::RunFailed { error, .. } => format!("❌ Run failed: {}", error),
        }
    }
}

struct ChannelInner {
    queue: VecDeque<ProgressEvent>,
    finished: bool,
}

/// Producer handle for a run's progress stream. Cloneable; emitting never
/// blocks the pipeline.
#[derive(Clone)]
pub struct ProgressSink {
    inner: Arc<Mutex<ChannelInner>>,
}

/// Consumer side of a run's progress stream.
///
/// Retention policy: events queue unbounded until drained; the channel is
/// run-scoped and dropped with the run, so the queue never outlives one
/// pipeline execution. Exactly one consumer per run.
pub struct ProgressChannel {
    inner: Arc<Mutex<ChannelInner>>,
}

/// Create a connected sink/channel pair for one run
pub fn progress_channel() -> (ProgressSink, ProgressChannel) {
    let inner = Arc::new(Mutex::new(ChannelInner {
        queue: VecDeque::new(),
        finished: false,
    }));
    (
        ProgressSink {
            inner: inner.clone(),
        },
        ProgressChannel { inner },
    )
}

impl ProgressSink {
    /// Append an event to the run's stream
    pub fn emit(&self, event: RunEvent) {
        let mut inner = self.inner.lock().unwrap();
        inner.queue.push_back(ProgressEvent::now(event));
    }

    /// Mark the run as terminal; already-queued events stay retrievable
    pub fn finish(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.finished = true;
    }
}

impl ProgressChannel {
    /// Take every event emitted since the previous drain, in emission
    /// order. Non-blocking; each event is returned exactly once.
    pub fn drain(&self) -> Vec<ProgressEvent> {
        let mut inner = self.inner.lock().unwrap();
        inner.queue.drain(..).collect()
    }

    /// Whether the producing run has reached a terminal state. Events
    /// emitted before the finish are still available to `drain`.
    pub fn is_finished(&self) -> bool {
        self.inner.lock().unwrap().finished
    }
}

/// A stateless research capability: query in, bounded text blob out.
///
/// Failures are reported as text in the return value, never as a panic or
/// an Err; a broken tool must not crash the task that invoked it.
#[async_trait]
pub trait CapabilityTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON schema of the arguments object, advertised to the executor
    fn parameters_schema(&self) -> serde_json::Value;
    async fn run(&self, arguments: serde_json::Value) -> String;
}

/// Executes one task instruction as the given agent, reporting progress
/// through the sink. Implementations own the language-model round-trips;
/// the orchestrator only sees the final text or the failure.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn execute(
        &self,
        agent: &AgentDefinition,
        task_id: &str,
        instruction: &str,
        tools: &[Arc<dyn CapabilityTool>],
        sink: &ProgressSink,
    ) -> ExecutorResult;
}

// ============================================================================
// Console Logging Macros (for the CLI entry point)
// ============================================================================

/// Logs a banner section header.
///
/// Outputs:
/// ```text
/// ═══ Product Discovery ═══
/// ```
#[macro_export]
macro_rules! log_banner {
    ($title:expr) => {
        println!("\x1b[1;36m═══ {} ═══\x1b[0m", $title);
    };
}

/// Logs an informational message.
#[macro_export]
macro_rules! log_info {
    ($message:expr) => {
        println!("\x1b[36mℹ {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[36mℹ {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs a warning message.
#[macro_export]
macro_rules! log_warning {
    ($message:expr) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs a success message.
#[macro_export]
macro_rules! log_success {
    ($message:expr) => {
        println!("\x1b[32m✓ {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[32m✓ {}\x1b[0m", format!($fmt, $($arg)*));
    };
}
