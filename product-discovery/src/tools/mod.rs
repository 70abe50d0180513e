//! Capability tool adapters
//!
//! Each adapter wraps one external research capability behind the uniform
//! [`CapabilityTool`] contract: a query plus parameters in, a bounded text
//! blob out. Failures (network errors, bad responses, missing credentials)
//! come back as error text inside the blob, so a broken tool can never
//! crash the task that invoked it.

pub mod reddit;
pub mod serper;
pub mod website;

pub use reddit::{RedditJsonTool, RedditRssTool};
pub use serper::{SerperRedditTool, SerperSearchTool};
pub use website::WebsiteSearchTool;

use product_discovery_sdk::{CapabilityTool, PipelineError};
use std::collections::HashMap;
use std::sync::Arc;

/// The set of capability tools available to agents, keyed by tool name
#[derive(Clone)]
pub struct ToolSet {
    tools: HashMap<String, Arc<dyn CapabilityTool>>,
}

impl ToolSet {
    pub fn empty() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// All shipped research tools, sharing one HTTP client
    pub fn standard(client: reqwest::Client) -> Self {
        let mut set = Self::empty();
        set.register(Arc::new(SerperSearchTool::from_env(client.clone())));
        set.register(Arc::new(SerperRedditTool::from_env(client.clone())));
        set.register(Arc::new(RedditJsonTool::new(client.clone())));
        set.register(Arc::new(RedditRssTool::new(client.clone())));
        set.register(Arc::new(WebsiteSearchTool::new(client)));
        set
    }

    pub fn register(&mut self, tool: Arc<dyn CapabilityTool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CapabilityTool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Resolve an agent's declared tool names; an unknown name is a
    /// configuration error surfaced at load time, not mid-run.
    pub fn resolve(
        &self,
        names: &[String],
    ) -> Result<Vec<Arc<dyn CapabilityTool>>, PipelineError> {
        names
            .iter()
            .map(|name| {
                self.get(name).ok_or_else(|| {
                    PipelineError::Configuration(format!("unknown capability tool '{}'", name))
                })
            })
            .collect()
    }
}

/// Truncate to a character budget, appending an ellipsis when cut
pub(crate) fn clip_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    }
}
