//! Serper.dev search adapters (general web search and Reddit-via-Google)
//!
//! Serper exposes Google results over a simple JSON API. The key comes from
//! the `SERPER_API_KEY` environment variable; a missing key is reported as
//! error text in the tool result, never as a crash.

use product_discovery_sdk::{async_trait, CapabilityTool};
use serde_json::{json, Value};

use super::clip_chars;

const SERPER_URL: &str = "https://google.serper.dev/search";
const MAX_RESULTS: usize = 50;

async fn serper_search(
    client: &reqwest::Client,
    api_key: &Option<String>,
    query: &str,
    limit: usize,
) -> String {
    let Some(api_key) = api_key else {
        return "Error: SERPER_API_KEY not found in environment. \
                Add it to use this tool."
            .to_string();
    };

    let payload = json!({
        "q": query,
        "num": limit.min(MAX_RESULTS),
    });

    let response = client
        .post(SERPER_URL)
        .header("X-API-KEY", api_key)
        .header("Content-Type", "application/json")
        .json(&payload)
        .send()
        .await;

    match response {
        Ok(resp) if resp.status().is_success() => match resp.json::<Value>().await {
            Ok(data) => format_search_results(&data, query, limit),
            Err(e) => format!("Error with Serper API: {}", e),
        },
        Ok(resp) => format!("Error with Serper API: HTTP {}", resp.status()),
        Err(e) => format!("Error with Serper API: {}", e),
    }
}

/// Format Serper organic results as numbered title/preview/link blocks
fn format_search_results(data: &Value, query: &str, limit: usize) -> String {
    let organic = data
        .get("organic")
        .and_then(|v| v.as_array())
        .map(|v| v.as_slice())
        .unwrap_or(&[]);

    if organic.is_empty() {
        return format!("No Google results found for '{}'", query);
    }

    let mut output = format!("🔎 Found {} results via Google:\n\n", organic.len());
    for (i, result) in organic.iter().take(limit).enumerate() {
        let title = result.get("title").and_then(|v| v.as_str()).unwrap_or("");
        let snippet = result.get("snippet").and_then(|v| v.as_str()).unwrap_or("");
        let link = result.get("link").and_then(|v| v.as_str()).unwrap_or("");

        output.push_str(&format!("{}. {}\n", i + 1, title));
        if !snippet.is_empty() {
            output.push_str(&format!("   Preview: {}\n", clip_chars(snippet, 300)));
        }
        output.push_str(&format!("   Link: {}\n\n", link));
    }
    output
}

fn query_arg(arguments: &Value) -> Option<&str> {
    arguments
        .get("query")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|q| !q.is_empty())
}

fn limit_arg(arguments: &Value, default: usize) -> usize {
    arguments
        .get("limit")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .unwrap_or(default)
}

/// General web search for competitor and market research
pub struct SerperSearchTool {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl SerperSearchTool {
    pub fn from_env(client: reqwest::Client) -> Self {
        Self::with_key(client, std::env::var("SERPER_API_KEY").ok())
    }

    pub fn with_key(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl CapabilityTool for SerperSearchTool {
    fn name(&self) -> &str {
        "serper_search"
    }

    fn description(&self) -> &str {
        "Search the web via Google. Best for competitor research, market \
         reports, and industry statistics. Requires SERPER_API_KEY."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query"
                },
                "limit": {
                    "type": "integer",
                    "description": "Number of results to return (max 50)"
                }
            },
            "required": ["query"]
        })
    }

    async fn run(&self, arguments: Value) -> String {
        let Some(query) = query_arg(&arguments) else {
            return "Error: missing required 'query' argument".to_string();
        };
        let limit = limit_arg(&arguments, 10);
        serper_search(&self.client, &self.api_key, query, limit).await
    }
}

/// Google search scoped to Reddit, for discovering relevant subreddits and
/// cross-community discussions
pub struct SerperRedditTool {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl SerperRedditTool {
    pub fn from_env(client: reqwest::Client) -> Self {
        Self::with_key(client, std::env::var("SERPER_API_KEY").ok())
    }

    pub fn with_key(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl CapabilityTool for SerperRedditTool {
    fn name(&self) -> &str {
        "serper_reddit_search"
    }

    fn description(&self) -> &str {
        "Use Google to find Reddit discussions across subreddits. Best for \
         broad searches and discovering which subreddits are relevant. \
         Requires SERPER_API_KEY."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query"
                },
                "subreddit": {
                    "type": "string",
                    "description": "Restrict to one subreddit, or 'all' for every subreddit"
                },
                "limit": {
                    "type": "integer",
                    "description": "Number of results to return (max 50)"
                }
            },
            "required": ["query"]
        })
    }

    async fn run(&self, arguments: Value) -> String {
        let Some(query) = query_arg(&arguments) else {
            return "Error: missing required 'query' argument".to_string();
        };
        let subreddit = arguments
            .get("subreddit")
            .and_then(|v| v.as_str())
            .unwrap_or("all");
        let limit = limit_arg(&arguments, 20);

        let search_query = if subreddit == "all" {
            format!("site:reddit.com {}", query)
        } else {
            format!("site:reddit.com/r/{} {}", subreddit, query)
        };
        serper_search(&self.client, &self.api_key, &search_query, limit).await
    }
}
