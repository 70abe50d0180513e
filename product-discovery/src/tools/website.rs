//! Website content adapter, for scraping industry/report pages
//!
//! Fetches a page and reduces it to readable text: script/style blocks
//! dropped, tags stripped, whitespace collapsed, output clipped to a
//! bounded excerpt so one page can never flood an agent's context.

use lazy_static::lazy_static;
use product_discovery_sdk::{async_trait, CapabilityTool};
use regex::Regex;
use serde_json::{json, Value};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) ProductDiscovery/1.0";
const MAX_EXCERPT_CHARS: usize = 4000;

lazy_static! {
    static ref SCRIPT_RE: Regex = Regex::new(r"(?si)<(script|style|noscript)[^>]*>.*?</(script|style|noscript)>").unwrap();
    static ref TAG_RE: Regex = Regex::new(r"<[^>]+>").unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"[ \t\r\f]+").unwrap();
    static ref BLANK_LINES_RE: Regex = Regex::new(r"\n{3,}").unwrap();
}

/// Reduce an HTML document to a plain-text excerpt
fn extract_readable_text(html: &str) -> String {
    let without_scripts = SCRIPT_RE.replace_all(html, " ");
    let without_tags = TAG_RE.replace_all(&without_scripts, "\n");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    let collapsed = WHITESPACE_RE.replace_all(&decoded, " ");
    let text = BLANK_LINES_RE
        .replace_all(&collapsed, "\n\n")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if text.chars().count() > MAX_EXCERPT_CHARS {
        let cut: String = text.chars().take(MAX_EXCERPT_CHARS).collect();
        format!("{}\n... [content truncated]", cut.trim_end())
    } else {
        text
    }
}

/// Fetch a web page and return its readable text
pub struct WebsiteSearchTool {
    client: reqwest::Client,
}

impl WebsiteSearchTool {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CapabilityTool for WebsiteSearchTool {
    fn name(&self) -> &str {
        "website_search"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its readable text. Use it to read \
         market reports or industry statistics pages found via search."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Full URL of the page to read"
                }
            },
            "required": ["url"]
        })
    }

    async fn run(&self, arguments: Value) -> String {
        let Some(url) = arguments.get("url").and_then(|v| v.as_str()) else {
            return "Error: missing required 'url' argument".to_string();
        };
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return format!("Error: '{}' is not an http(s) URL", url);
        }

        let response = self
            .client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => {
                    let text = extract_readable_text(&body);
                    if text.is_empty() {
                        format!("No readable text found at {}", url)
                    } else {
                        text
                    }
                }
                Err(e) => format!("Error reading {}: {}", url, e),
            },
            Ok(resp) => format!("Error reading {}: HTTP {}", url, resp.status()),
            Err(e) => format!("Error reading {}: {}", url, e),
        }
    }
}
