//! Pipeline orchestrator
//!
//! Executes the fixed task pipeline in position order, rendering each
//! task's instruction from the run inputs and upstream results, dispatching
//! it to the agent executor, and recording the per-task results. Progress
//! is forwarded to the run's [`ProgressSink`] as it happens; nothing is
//! buffered beyond the result table itself.
//!
//! Failure policy: the first executor failure aborts the remaining
//! pipeline. Already-recorded results and already-emitted progress events
//! stay retrievable for diagnostics, but no downstream task is attempted,
//! since it may depend on the failed task's output.

use product_discovery_sdk::{
    AgentDefinition, AgentExecutor, PipelineError, ProgressSink, RunEvent, RunStatus,
    TaskDefinition,
};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AgentRegistry, TaskRegistry};
use crate::pipeline::run::{RunInput, RunState, TaskResult};
use crate::tools::ToolSet;

fn preview(text: &str) -> String {
    let line = text.lines().next().unwrap_or("");
    if line.chars().count() <= 80 {
        line.to_string()
    } else {
        let cut: String = line.chars().take(80).collect();
        format!("{}...", cut.trim_end())
    }
}

/// The product discovery pipeline: static definitions plus an executor,
/// shareable across concurrent runs. Each run gets its own [`RunState`]
/// and progress channel; the pipeline itself is immutable.
pub struct Pipeline {
    agents: AgentRegistry,
    tasks: TaskRegistry,
    tools: ToolSet,
    executor: Arc<dyn AgentExecutor>,
    timeout: Option<Duration>,
}

impl Pipeline {
    /// Assemble a pipeline, rejecting structurally invalid definitions
    /// (unknown agents, unknown tools) before anything can run.
    pub fn new(
        agents: AgentRegistry,
        tasks: TaskRegistry,
        tools: ToolSet,
        executor: Arc<dyn AgentExecutor>,
    ) -> Result<Self, PipelineError> {
        tasks.validate_agents(&agents)?;
        for task in tasks.tasks() {
            if let Some(agent) = agents.get(&task.agent) {
                for tool in &agent.tools {
                    if !tools.contains(tool) {
                        return Err(PipelineError::Configuration(format!(
                            "agent '{}' references unknown tool '{}'",
                            agent.id, tool
                        )));
                    }
                }
            }
        }
        Ok(Self {
            agents,
            tasks,
            tools,
            executor,
            timeout: None,
        })
    }

    /// Abort the whole run if it exceeds this deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Execute the full pipeline for one run, reporting progress through
    /// the sink. Always returns a terminal state; errors are carried on
    /// `RunState.error` rather than propagated.
    pub async fn execute(&self, input: &RunInput, sink: ProgressSink) -> RunState {
        let mut state = RunState::new();
        let run_id = state.run_id.to_string();

        if let Err(e) = input.validate() {
            state.status = RunStatus::Failed;
            state.error = Some(e.to_string());
            sink.emit(RunEvent::RunFailed {
                run_id,
                error: e.to_string(),
            });
            sink.finish();
            return state;
        }

        state.status = RunStatus::Running;
        sink.emit(RunEvent::RunStarted {
            run_id: run_id.clone(),
        });

        let outcome = match self.timeout {
            Some(deadline) => {
                match tokio::time::timeout(
                    deadline,
                    self.run_tasks(input, &sink, &mut state.task_results),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(PipelineError::Timeout(deadline.as_secs())),
                }
            }
            None => self.run_tasks(input, &sink, &mut state.task_results).await,
        };

        match outcome {
            Ok(()) => {
                state.status = RunStatus::Completed;
                sink.emit(RunEvent::RunCompleted { run_id });
            }
            Err(e) => {
                state.status = RunStatus::Failed;
                state.error = Some(e.to_string());
                sink.emit(RunEvent::RunFailed {
                    run_id,
                    error: e.to_string(),
                });
            }
        }
        sink.finish();
        state
    }

    /// One-shot convenience: run to a terminal state without observing
    /// progress.
    pub async fn run(&self, input: &RunInput) -> RunState {
        let (sink, _channel) = product_discovery_sdk::progress_channel();
        self.execute(input, sink).await
    }

    async fn run_tasks(
        &self,
        input: &RunInput,
        sink: &ProgressSink,
        results: &mut Vec<TaskResult>,
    ) -> Result<(), PipelineError> {
        let total_tasks = self.tasks.len();

        for task in self.tasks.tasks() {
            let agent_def = self.agents.get(&task.agent).ok_or_else(|| {
                PipelineError::Configuration(format!(
                    "task '{}' references unknown agent '{}'",
                    task.id, task.agent
                ))
            })?;
            // Personas may reference run inputs too, so each task execution
            // gets a freshly rendered agent instantiation
            let agent = render_agent(agent_def, input);
            let tools = self.tools.resolve(&agent.tools)?;
            let instruction = render_instruction(task, input, results)?;

            sink.emit(RunEvent::TaskStarted {
                task_id: task.id.clone(),
                agent: agent.role.clone(),
                description: preview(&task.description),
                position: task.position,
                total_tasks,
            });

            match self
                .executor
                .execute(&agent, &task.id, &instruction, &tools, sink)
                .await
            {
                Ok(raw_text) => {
                    sink.emit(RunEvent::TaskCompleted {
                        task_id: task.id.clone(),
                        summary: preview(&raw_text),
                    });
                    results.push(TaskResult::new(&task.id, raw_text));
                }
                Err(e) => {
                    sink.emit(RunEvent::TaskFailed {
                        task_id: task.id.clone(),
                        error: e.to_string(),
                    });
                    return Err(PipelineError::TaskDispatch {
                        task: task.id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

fn substitute_inputs(text: &str, input: &RunInput) -> String {
    let mut text = text.to_string();
    for (name, value) in input.placeholders() {
        text = text.replace(&format!("{{{}}}", name), value);
    }
    text
}

/// Instantiate an agent for one run, resolving run-input placeholders in
/// its persona
fn render_agent(agent: &AgentDefinition, input: &RunInput) -> AgentDefinition {
    AgentDefinition {
        id: agent.id.clone(),
        role: substitute_inputs(&agent.role, input),
        goal: substitute_inputs(&agent.goal, input),
        backstory: substitute_inputs(&agent.backstory, input),
        tools: agent.tools.clone(),
    }
}

/// Render a task's instruction: run-input placeholders first, then each
/// declared upstream result substituted verbatim. A dependency without a
/// recorded result is a configuration error, surfaced immediately rather
/// than silently skipped.
fn render_instruction(
    task: &TaskDefinition,
    input: &RunInput,
    results: &[TaskResult],
) -> Result<String, PipelineError> {
    let mut text = substitute_inputs(&task.description, input);

    for dep in &task.depends_on {
        let result = results
            .iter()
            .find(|r| r.task_id == *dep)
            .ok_or_else(|| {
                PipelineError::Configuration(format!(
                    "task '{}' depends on '{}', which has no recorded result",
                    task.id, dep
                ))
            })?;

        let placeholder = format!("{{{}}}", dep);
        if text.contains(&placeholder) {
            text = text.replace(&placeholder, &result.raw_text);
        } else {
            // Dependency declared but not referenced in the template:
            // inject its output as an appended context section
            text.push_str(&format!("\n\nContext from {}:\n{}", dep, result.raw_text));
        }
    }

    if !task.expected_output.is_empty() {
        text.push_str(&format!("\n\nExpected output: {}", task.expected_output));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_AGENTS_YAML, DEFAULT_TASKS_YAML};
    use crate::pipeline::testing::MockExecutor;
    use product_discovery_sdk::progress_channel;

    fn default_pipeline(executor: Arc<MockExecutor>) -> Pipeline {
        let agents = AgentRegistry::from_yaml(DEFAULT_AGENTS_YAML).unwrap();
        let tasks = TaskRegistry::from_yaml(DEFAULT_TASKS_YAML).unwrap();
        Pipeline::new(agents, tasks, ToolSet::standard(reqwest::Client::new()), executor).unwrap()
    }

    fn sample_input() -> RunInput {
        RunInput::new("AI meal planner", "diabetics", None, None, None)
    }

    #[tokio::test]
    async fn test_full_pipeline_completes_in_position_order() {
        let executor = Arc::new(MockExecutor::new());
        let pipeline = default_pipeline(executor.clone());
        let (sink, _channel) = progress_channel();

        let state = pipeline.execute(&sample_input(), sink).await;

        assert_eq!(state.status, RunStatus::Completed);
        assert!(state.error.is_none());
        assert_eq!(state.task_results.len(), 6);

        let expected_order = vec![
            "market_landscape",
            "subreddit_discovery",
            "customer_pain",
            "opportunity_sizing",
            "risk_assumptions",
            "final_strategy",
        ];
        let dispatched = executor.dispatched_tasks();
        assert_eq!(dispatched, expected_order);

        let recorded: Vec<&str> = state
            .task_results
            .iter()
            .map(|r| r.task_id.as_str())
            .collect();
        assert_eq!(recorded, expected_order);

        // The terminal task's output is the run narrative
        assert_eq!(
            state.terminal_narrative(),
            Some("output of final_strategy")
        );
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_pipeline() {
        let executor =
            Arc::new(MockExecutor::new().fail_on("opportunity_sizing", "model unavailable"));
        let pipeline = default_pipeline(executor.clone());
        let (sink, channel) = progress_channel();

        let state = pipeline.execute(&sample_input(), sink).await;

        assert_eq!(state.status, RunStatus::Failed);
        let error = state.error.unwrap();
        assert!(error.contains("opportunity_sizing"));
        assert!(error.contains("model unavailable"));

        // Tasks 0..2 completed; the failed task produced no result; tasks
        // 4 and 5 were never dispatched
        assert_eq!(state.task_results.len(), 3);
        assert_eq!(
            executor.dispatched_tasks(),
            vec![
                "market_landscape",
                "subreddit_discovery",
                "customer_pain",
                "opportunity_sizing",
            ]
        );

        // Progress history up to the failure stays retrievable
        let events = channel.drain();
        assert!(events
            .iter()
            .any(|e| matches!(&e.event, RunEvent::TaskFailed { task_id, .. } if task_id == "opportunity_sizing")));
        assert!(events
            .iter()
            .any(|e| matches!(&e.event, RunEvent::RunFailed { .. })));
    }

    #[tokio::test]
    async fn test_empty_product_idea_fails_validation_without_dispatch() {
        let executor = Arc::new(MockExecutor::new());
        let pipeline = default_pipeline(executor.clone());
        let (sink, _channel) = progress_channel();

        let input = RunInput::new("", "diabetics", None, None, None);
        let state = pipeline.execute(&input, sink).await;

        assert_eq!(state.status, RunStatus::Failed);
        assert!(state.error.unwrap().contains("required"));
        assert!(state.task_results.is_empty());
        assert!(executor.dispatched_tasks().is_empty());
    }

    #[tokio::test]
    async fn test_context_substitution_is_verbatim() {
        let marker = "UNIQUE-SUBREDDIT-FINDINGS r/diabetes r/diabetes_t2\nwith a second line";
        let executor = Arc::new(MockExecutor::new().with_output("subreddit_discovery", marker));
        let pipeline = default_pipeline(executor.clone());
        let (sink, _channel) = progress_channel();

        let state = pipeline.execute(&sample_input(), sink).await;
        assert_eq!(state.status, RunStatus::Completed);

        // customer_pain references {subreddit_discovery} in its template
        let instruction = executor.instruction_for("customer_pain").unwrap();
        assert!(instruction.contains(marker));
        // The raw placeholder must be gone
        assert!(!instruction.contains("{subreddit_discovery}"));

        // The fan-in terminal task sees every upstream stream verbatim
        let terminal = executor.instruction_for("final_strategy").unwrap();
        for upstream in [
            "output of market_landscape",
            "output of opportunity_sizing",
            "output of risk_assumptions",
        ] {
            assert!(terminal.contains(upstream));
        }
    }

    #[tokio::test]
    async fn test_run_input_placeholders_rendered() {
        let executor = Arc::new(MockExecutor::new());
        let pipeline = default_pipeline(executor.clone());
        let (sink, _channel) = progress_channel();

        let input = RunInput::new(
            "AI meal planner",
            "diabetics",
            Some("FDA compliance".to_string()),
            Some("healthcare tech".to_string()),
            Some("B2C SaaS".to_string()),
        );
        pipeline.execute(&input, sink).await;

        let instruction = executor.instruction_for("market_landscape").unwrap();
        assert!(instruction.contains("AI meal planner"));
        assert!(instruction.contains("diabetics"));
        assert!(instruction.contains("healthcare tech"));
        assert!(!instruction.contains("{product_idea}"));
    }

    #[test]
    fn test_agent_persona_placeholders_rendered() {
        let agents = AgentRegistry::from_yaml(DEFAULT_AGENTS_YAML).unwrap();
        let input = sample_input();
        let agent = render_agent(agents.get("market_landscape_agent").unwrap(), &input);
        assert!(agent.goal.contains("AI meal planner"));
        assert!(!agent.goal.contains("{product_idea}"));
    }

    #[tokio::test]
    async fn test_unknown_tool_rejected_at_assembly() {
        let agents_yaml = r#"
agents:
  - id: lone_agent
    role: Analyst
    goal: analyze
    tools: [imaginary_tool]
"#;
        let tasks_yaml = r#"
tasks:
  - id: only_task
    agent: lone_agent
    description: do the thing
"#;
        let agents = AgentRegistry::from_yaml(agents_yaml).unwrap();
        let tasks = TaskRegistry::from_yaml(tasks_yaml).unwrap();
        let err = Pipeline::new(
            agents,
            tasks,
            ToolSet::empty(),
            Arc::new(MockExecutor::new()),
        )
        .err()
        .expect("unknown tool must be rejected at assembly");
        assert!(err.to_string().contains("imaginary_tool"));
    }

    #[tokio::test]
    async fn test_timeout_fails_run_with_distinct_error() {
        let executor = Arc::new(MockExecutor::new().with_delay(Duration::from_millis(50)));
        let pipeline =
            default_pipeline(executor).with_timeout(Duration::from_millis(10));
        let (sink, _channel) = progress_channel();

        let state = pipeline.execute(&sample_input(), sink).await;

        assert_eq!(state.status, RunStatus::Failed);
        assert!(state.error.unwrap().contains("timed out"));
        assert!(state.task_results.is_empty());
    }

    #[tokio::test]
    async fn test_dependency_context_appended_when_not_referenced() {
        let agents_yaml = r#"
agents:
  - id: a1
    role: Analyst
    goal: analyze
"#;
        let tasks_yaml = r#"
tasks:
  - id: first
    agent: a1
    description: "produce findings"
  - id: second
    agent: a1
    description: "no placeholder here"
    depends_on: [first]
"#;
        let agents = AgentRegistry::from_yaml(agents_yaml).unwrap();
        let tasks = TaskRegistry::from_yaml(tasks_yaml).unwrap();
        let executor = Arc::new(MockExecutor::new().with_output("first", "FIRST FINDINGS"));
        let pipeline =
            Pipeline::new(agents, tasks, ToolSet::empty(), executor.clone()).unwrap();
        let (sink, _channel) = progress_channel();

        let state = pipeline.execute(&sample_input(), sink).await;
        assert_eq!(state.status, RunStatus::Completed);

        let instruction = executor.instruction_for("second").unwrap();
        assert!(instruction.contains("Context from first:"));
        assert!(instruction.contains("FIRST FINDINGS"));
    }
}
