//! The product discovery pipeline: orchestrator, streaming facade,
//! run-scoped state, and the result interpreter

pub mod interpreter;
pub mod orchestrator;
pub mod run;
pub mod streaming;

pub use interpreter::{interpret, section_reports, SectionReports, StructuredSummary};
pub use orchestrator::Pipeline;
pub use run::{RunInput, RunState, TaskResult};
pub use streaming::{PartialView, POLL_INTERVAL};

#[cfg(test)]
pub(crate) mod testing {
    //! Mock agent executor for pipeline tests: records dispatch order and
    //! rendered instructions, returns canned outputs instantly

    use product_discovery_sdk::{
        async_trait, AgentDefinition, AgentExecutor, CapabilityTool, ExecutorResult,
        ProgressSink, RunEvent,
    };
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    pub struct MockExecutor {
        outputs: HashMap<String, String>,
        fail_on: Option<(String, String)>,
        delay: Option<Duration>,
        calls: Mutex<Vec<String>>,
        instructions: Mutex<HashMap<String, String>>,
    }

    impl MockExecutor {
        pub fn new() -> Self {
            Self {
                outputs: HashMap::new(),
                fail_on: None,
                delay: None,
                calls: Mutex::new(Vec::new()),
                instructions: Mutex::new(HashMap::new()),
            }
        }

        /// Return `text` for `task_id` instead of the default canned output
        pub fn with_output(mut self, task_id: &str, text: &str) -> Self {
            self.outputs.insert(task_id.to_string(), text.to_string());
            self
        }

        /// Fail the given task's dispatch with `message`
        pub fn fail_on(mut self, task_id: &str, message: &str) -> Self {
            self.fail_on = Some((task_id.to_string(), message.to_string()));
            self
        }

        /// Sleep this long per task, to let pollers observe an in-flight run
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Task ids in dispatch order
        pub fn dispatched_tasks(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        /// The rendered instruction the task was dispatched with
        pub fn instruction_for(&self, task_id: &str) -> Option<String> {
            self.instructions.lock().unwrap().get(task_id).cloned()
        }
    }

    #[async_trait]
    impl AgentExecutor for MockExecutor {
        async fn execute(
            &self,
            agent: &AgentDefinition,
            task_id: &str,
            instruction: &str,
            _tools: &[Arc<dyn CapabilityTool>],
            sink: &ProgressSink,
        ) -> ExecutorResult {
            self.calls.lock().unwrap().push(task_id.to_string());
            self.instructions
                .lock()
                .unwrap()
                .insert(task_id.to_string(), instruction.to_string());

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            if let Some((fail_task, message)) = &self.fail_on {
                if fail_task == task_id {
                    return Err(message.clone().into());
                }
            }

            sink.emit(RunEvent::AgentMessage {
                task_id: task_id.to_string(),
                agent: agent.role.clone(),
                text: format!("working on {}", task_id),
            });

            Ok(self
                .outputs
                .get(task_id)
                .cloned()
                .unwrap_or_else(|| format!("output of {}", task_id)))
        }
    }
}
