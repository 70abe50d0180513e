//! Reddit search adapters (public JSON API and RSS feeds)
//!
//! Neither endpoint needs authentication; Reddit only asks for a desktop
//! User-Agent. The RSS adapter is the fallback path for when the JSON API
//! is slow, so its Atom parsing is deliberately best-effort.

use lazy_static::lazy_static;
use product_discovery_sdk::{async_trait, CapabilityTool};
use regex::Regex;
use serde_json::{json, Value};

use super::clip_chars;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) ProductDiscovery/1.0";
const DEFAULT_SUBREDDIT: &str = "Entrepreneur";
const MAX_RESULTS: usize = 50;

lazy_static! {
    static ref ATOM_ENTRY_RE: Regex = Regex::new(r"(?s)<entry>(.*?)</entry>").unwrap();
    static ref ATOM_TITLE_RE: Regex = Regex::new(r"(?s)<title[^>]*>(.*?)</title>").unwrap();
    static ref ATOM_LINK_RE: Regex = Regex::new(r#"<link[^>]*href="([^"]*)""#).unwrap();
    static ref ATOM_CONTENT_RE: Regex = Regex::new(r"(?s)<content[^>]*>(.*?)</content>").unwrap();
    static ref HTML_TAG_RE: Regex = Regex::new(r"<[^>]+>").unwrap();
}

fn subreddit_arg(arguments: &Value) -> &str {
    arguments
        .get("subreddit")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SUBREDDIT)
}

fn limit_arg(arguments: &Value) -> usize {
    arguments
        .get("limit")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .unwrap_or(20)
        .min(MAX_RESULTS)
}

/// Undo the entity encoding Reddit applies to feed payloads, then drop tags
fn strip_html(text: &str) -> String {
    let decoded = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    HTML_TAG_RE.replace_all(&decoded, "").trim().to_string()
}

struct FeedEntry {
    title: String,
    link: String,
    summary: String,
}

/// Best-effort Atom entry extraction from a Reddit search feed
fn parse_feed_entries(xml: &str) -> Vec<FeedEntry> {
    ATOM_ENTRY_RE
        .captures_iter(xml)
        .map(|entry| {
            let body = entry.get(1).map(|m| m.as_str()).unwrap_or("");
            let capture = |re: &Regex| {
                re.captures(body)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default()
            };
            FeedEntry {
                title: strip_html(&capture(&ATOM_TITLE_RE)),
                link: capture(&ATOM_LINK_RE),
                summary: strip_html(&capture(&ATOM_CONTENT_RE)),
            }
        })
        .collect()
}

/// Format Reddit JSON search results as numbered post blocks
fn format_posts(data: &Value, query: &str, subreddit: &str, limit: usize) -> String {
    let posts = data
        .get("data")
        .and_then(|d| d.get("children"))
        .and_then(|c| c.as_array())
        .map(|v| v.as_slice())
        .unwrap_or(&[]);

    if posts.is_empty() {
        return format!("No results found for '{}' in r/{}", query, subreddit);
    }

    let mut output = format!(
        "📊 Found {} Reddit posts for '{}' in r/{}:\n\n",
        posts.len(),
        query,
        subreddit
    );
    for (i, wrapper) in posts.iter().take(limit).enumerate() {
        let post = wrapper.get("data").cloned().unwrap_or_default();
        let title = post.get("title").and_then(|v| v.as_str()).unwrap_or("");
        let body = post.get("selftext").and_then(|v| v.as_str()).unwrap_or("");
        let score = post.get("score").and_then(|v| v.as_i64()).unwrap_or(0);
        let comments = post
            .get("num_comments")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        let permalink = post.get("permalink").and_then(|v| v.as_str()).unwrap_or("");

        output.push_str(&format!(
            "{}. [{}↑ {}💬] {}\n",
            i + 1,
            score,
            comments,
            title
        ));
        if body.len() > 50 {
            output.push_str(&format!("   Excerpt: {}\n", clip_chars(body, 350)));
        }
        output.push_str(&format!("   Link: https://reddit.com{}\n\n", permalink));
    }
    output
}

/// Search a subreddit through Reddit's public JSON endpoint
pub struct RedditJsonTool {
    client: reqwest::Client,
}

impl RedditJsonTool {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CapabilityTool for RedditJsonTool {
    fn name(&self) -> &str {
        "reddit_json_search"
    }

    fn description(&self) -> &str {
        "Search Reddit directly using the public JSON API. Fast and \
         reliable for finding pain points in a specific subreddit. No \
         authentication required."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query for Reddit posts"
                },
                "subreddit": {
                    "type": "string",
                    "description": "Subreddit to search"
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
        let Some(query) = arguments.get("query").and_then(|v| v.as_str()) else {
            return "Error: missing required 'query' argument".to_string();
        };
        let subreddit = subreddit_arg(&arguments);
        let limit = limit_arg(&arguments);

        let url = format!("https://www.reddit.com/r/{}/search.json", subreddit);
        let limit_param = limit.to_string();
        let response = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .query(&[
                ("q", query),
                ("limit", limit_param.as_str()),
                ("sort", "relevance"),
                ("t", "month"),
                ("restrict_sr", "1"),
            ])
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.json::<Value>().await {
                Ok(data) => format_posts(&data, query, subreddit, limit),
                Err(e) => format!("Error with Reddit JSON API: {}", e),
            },
            Ok(resp) => format!("Error with Reddit JSON API: HTTP {}", resp.status()),
            Err(e) => format!("Error with Reddit JSON API: {}", e),
        }
    }
}

/// Search a subreddit through its RSS/Atom feed
pub struct RedditRssTool {
    client: reqwest::Client,
}

impl RedditRssTool {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CapabilityTool for RedditRssTool {
    fn name(&self) -> &str {
        "reddit_rss_search"
    }

    fn description(&self) -> &str {
        "Search Reddit using RSS feeds. Good for recent discussions and \
         trending topics; an alternative when the JSON API is slow."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query for Reddit posts"
                },
                "subreddit": {
                    "type": "string",
                    "description": "Subreddit to search"
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
        let Some(query) = arguments.get("query").and_then(|v| v.as_str()) else {
            return "Error: missing required 'query' argument".to_string();
        };
        let subreddit = subreddit_arg(&arguments);
        let limit = limit_arg(&arguments);

        let url = format!("https://www.reddit.com/r/{}/search.rss", subreddit);
        let limit_param = limit.to_string();
        let response = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .query(&[
                ("q", query),
                ("restrict_sr", "1"),
                ("limit", limit_param.as_str()),
            ])
            .send()
            .await;

        let body = match response {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => body,
                Err(e) => return format!("Error with Reddit RSS: {}", e),
            },
            Ok(resp) => return format!("Error with Reddit RSS: HTTP {}", resp.status()),
            Err(e) => return format!("Error with Reddit RSS: {}", e),
        };

        let entries = parse_feed_entries(&body);
        if entries.is_empty() {
            return format!("No RSS results found for '{}' in r/{}", query, subreddit);
        }

        let mut output = format!(
            "📡 Found {} posts via RSS for '{}' in r/{}:\n\n",
            entries.len(),
            query,
            subreddit
        );
        for (i, entry) in entries.iter().take(limit).enumerate() {
            output.push_str(&format!("{}. {}\n", i + 1, entry.title));
            if !entry.summary.is_empty() {
                output.push_str(&format!(
                    "   Summary: {}\n",
                    clip_chars(&entry.summary, 250)
                ));
            }
            output.push_str(&format!("   Link: {}\n\n", entry.link));
        }
        output
    }
}
