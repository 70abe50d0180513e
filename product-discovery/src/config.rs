//! Static agent and task definition registries
//!
//! Both registries are loaded once at process start from declarative YAML
//! (the built-in `config/agents.yaml` / `config/tasks.yaml`, or files
//! supplied on the command line) and never mutated during a run.
//!
//! Task declaration order is the pipeline order: a task's `position` is its
//! index in the YAML sequence, and every `depends_on` entry must name a task
//! with a strictly smaller position. That rules out cycles and forward
//! references by construction, so malformed pipelines are rejected at load
//! time rather than mid-run.

use product_discovery_sdk::{AgentDefinition, PipelineError, TaskDefinition};
use serde::Deserialize;
use std::collections::HashMap;

/// Built-in agent personas (from config/agents.yaml)
pub const DEFAULT_AGENTS_YAML: &str = include_str!("../config/agents.yaml");
/// Built-in task pipeline (from config/tasks.yaml)
pub const DEFAULT_TASKS_YAML: &str = include_str!("../config/tasks.yaml");

#[derive(Debug, Deserialize)]
struct AgentsFile {
    agents: Vec<AgentDefinition>,
}

#[derive(Debug, Deserialize)]
struct TasksFile {
    tasks: Vec<TaskDefinition>,
}

/// Static mapping from agent id to its definition
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    agents: HashMap<String, AgentDefinition>,
}

impl AgentRegistry {
    pub fn from_yaml(yaml: &str) -> Result<Self, PipelineError> {
        let file: AgentsFile = serde_yaml::from_str(yaml).map_err(|e| {
            PipelineError::Configuration(format!("failed to parse agents YAML: {}", e))
        })?;

        let mut agents = HashMap::new();
        for agent in file.agents {
            if agent.id.trim().is_empty() {
                return Err(PipelineError::Configuration(
                    "agent definition with empty id".to_string(),
                ));
            }
            let id = agent.id.clone();
            if agents.insert(id.clone(), agent).is_some() {
                return Err(PipelineError::Configuration(format!(
                    "duplicate agent id '{}'",
                    id
                )));
            }
        }
        if agents.is_empty() {
            return Err(PipelineError::Configuration(
                "agents YAML defines no agents".to_string(),
            ));
        }

        Ok(Self { agents })
    }

    pub fn get(&self, id: &str) -> Option<&AgentDefinition> {
        self.agents.get(id)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// The fixed pipeline: tasks in execution order
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    tasks: Vec<TaskDefinition>,
}

impl TaskRegistry {
    pub fn from_yaml(yaml: &str) -> Result<Self, PipelineError> {
        let file: TasksFile = serde_yaml::from_str(yaml).map_err(|e| {
            PipelineError::Configuration(format!("failed to parse tasks YAML: {}", e))
        })?;

        let mut tasks = file.tasks;
        if tasks.is_empty() {
            return Err(PipelineError::Configuration(
                "tasks YAML defines no tasks".to_string(),
            ));
        }

        let mut position_by_id: HashMap<String, usize> = HashMap::new();
        for (position, task) in tasks.iter_mut().enumerate() {
            if task.id.trim().is_empty() {
                return Err(PipelineError::Configuration(
                    "task definition with empty id".to_string(),
                ));
            }
            if position_by_id.insert(task.id.clone(), position).is_some() {
                return Err(PipelineError::Configuration(format!(
                    "duplicate task id '{}'",
                    task.id
                )));
            }
            task.position = position;
        }

        // Dependencies must point strictly backwards in the pipeline
        for task in &tasks {
            for dep in &task.depends_on {
                match position_by_id.get(dep) {
                    None => {
                        return Err(PipelineError::Configuration(format!(
                            "task '{}' depends on unknown task '{}'",
                            task.id, dep
                        )));
                    }
                    Some(&dep_position) if dep_position >= task.position => {
                        return Err(PipelineError::Configuration(format!(
                            "task '{}' (position {}) depends on '{}' (position {}), \
                             which does not precede it",
                            task.id, task.position, dep, dep_position
                        )));
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(Self { tasks })
    }

    /// Check that every task's producing agent exists
    pub fn validate_agents(&self, agents: &AgentRegistry) -> Result<(), PipelineError> {
        for task in &self.tasks {
            if agents.get(&task.agent).is_none() {
                return Err(PipelineError::Configuration(format!(
                    "task '{}' references unknown agent '{}'",
                    task.id, task.agent
                )));
            }
        }
        Ok(())
    }

    /// Tasks in ascending position order
    pub fn tasks(&self) -> &[TaskDefinition] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
