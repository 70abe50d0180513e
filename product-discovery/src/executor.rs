//! LLM-backed agent executor
//!
//! Speaks the OpenAI-compatible chat-completions protocol: the agent's
//! persona becomes the system message, the rendered task instruction the
//! user message, and the agent's capability tools are advertised as
//! callable functions. Tool round-trips run against the in-process
//! adapters, with every invocation and result forwarded to the run's
//! progress sink; the final assistant text is the task output.
//!
//! Endpoint configuration comes from the environment:
//! - `OPENAI_API_KEY` — required to dispatch (its absence fails the task)
//! - `OPENAI_BASE_URL` — defaults to the public OpenAI endpoint
//! - `DISCOVERY_MODEL` — model name, defaults to `gpt-4o-mini`

use product_discovery_sdk::{
    async_trait, AgentDefinition, AgentExecutor, CapabilityTool, ExecutorResult, ProgressSink,
    RunEvent,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MAX_ROUNDS: usize = 8;

/// One message in a chat-completions conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn plain(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain("user", content)
    }

    pub fn tool_result(tool_call_id: String, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id),
        }
    }
}

/// A function invocation requested by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments object, as the protocol ships it
    pub arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Advertise a capability tool as a callable function
fn tool_spec(tool: &dyn CapabilityTool) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name(),
            "description": tool.description(),
            "parameters": tool.parameters_schema(),
        }
    })
}

fn clip_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    }
}

/// Production agent executor driving an OpenAI-compatible endpoint
pub struct LlmExecutor {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    max_rounds: usize,
}

impl LlmExecutor {
    pub fn from_env(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            model: std::env::var("DISCOVERY_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    async fn chat(
        &self,
        api_key: &str,
        messages: &[ChatMessage],
        tools: &[Value],
    ) -> Result<ChatMessage, Box<dyn std::error::Error + Send + Sync>> {
        let url = format!(
            "{}/chat/completions",
            self.base_url.trim_end_matches('/')
        );

        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.to_vec());
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(format!(
                "model endpoint returned HTTP {}: {}",
                status,
                clip_chars(&detail, 200)
            )
            .into());
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| "model response contained no choices".into())
    }
}

#[async_trait]
impl AgentExecutor for LlmExecutor {
    async fn execute(
        &self,
        agent: &AgentDefinition,
        task_id: &str,
        instruction: &str,
        tools: &[Arc<dyn CapabilityTool>],
        sink: &ProgressSink,
    ) -> ExecutorResult {
        let api_key = self
            .api_key
            .clone()
            .ok_or("OPENAI_API_KEY not set; cannot dispatch agent")?;

        let specs: Vec<Value> = tools.iter().map(|t| tool_spec(t.as_ref())).collect();
        let mut messages = vec![
            ChatMessage::system(agent.persona()),
            ChatMessage::user(instruction.to_string()),
        ];

        for _round in 0..self.max_rounds {
            let reply = self.chat(&api_key, &messages, &specs).await?;

            let content = reply.content.clone();
            let calls = reply.tool_calls.clone().unwrap_or_default();

            if let Some(text) = content.as_deref().filter(|t| !t.trim().is_empty()) {
                sink.emit(RunEvent::AgentMessage {
                    task_id: task_id.to_string(),
                    agent: agent.role.clone(),
                    text: text.to_string(),
                });
            }

            messages.push(reply);

            if calls.is_empty() {
                return Ok(content.unwrap_or_default());
            }

            for call in calls {
                sink.emit(RunEvent::ToolInvoked {
                    task_id: task_id.to_string(),
                    tool: call.function.name.clone(),
                    arguments: clip_chars(&call.function.arguments, 120),
                });

                let output = match tools.iter().find(|t| t.name() == call.function.name) {
                    Some(tool) => {
                        let arguments = serde_json::from_str(&call.function.arguments)
                            .unwrap_or_else(|_| json!({}));
                        tool.run(arguments).await
                    }
                    None => format!("Error: unknown tool '{}'", call.function.name),
                };

                sink.emit(RunEvent::ToolCompleted {
                    task_id: task_id.to_string(),
                    tool: call.function.name.clone(),
                    summary: clip_chars(&output, 120),
                });

                messages.push(ChatMessage::tool_result(call.id, output));
            }
        }

        Err(format!(
            "agent '{}' exceeded {} tool rounds without a final answer",
            agent.id, self.max_rounds
        )
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_response_with_tool_calls() {
        let raw = r#"{
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "serper_search",
                            "arguments": "{\"query\": \"diabetes meal apps\"}"
                        }
                    }]
                }
            }]
        }"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        let message = &parsed.choices[0].message;
        assert!(message.content.is_none());
        let calls = message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "serper_search");
        assert!(calls[0].function.arguments.contains("diabetes"));
    }

    #[test]
    fn test_decode_plain_text_response() {
        let raw = r#"{
            "choices": [{
                "message": {"role": "assistant", "content": "Final report text"}
            }]
        }"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("Final report text")
        );
    }

    #[test]
    fn test_message_serialization_skips_absent_fields() {
        let rendered = serde_json::to_string(&ChatMessage::user("hello")).unwrap();
        assert!(!rendered.contains("tool_calls"));
        assert!(!rendered.contains("tool_call_id"));

        let rendered =
            serde_json::to_string(&ChatMessage::tool_result("call_1".to_string(), "ok")).unwrap();
        assert!(rendered.contains("\"tool_call_id\":\"call_1\""));
    }

    #[test]
    fn test_tool_spec_shape() {
        struct Dummy;

        #[async_trait]
        impl CapabilityTool for Dummy {
            fn name(&self) -> &str {
                "dummy"
            }
            fn description(&self) -> &str {
                "a dummy tool"
            }
            fn parameters_schema(&self) -> Value {
                json!({"type": "object", "properties": {}})
            }
            async fn run(&self, _arguments: Value) -> String {
                String::new()
            }
        }

        let spec = tool_spec(&Dummy);
        assert_eq!(spec["type"], "function");
        assert_eq!(spec["function"]["name"], "dummy");
        assert_eq!(spec["function"]["parameters"]["type"], "object");
    }
}
