//! Web search via the DuckDuckGo Instant Answer API

use crate::registry::{Tool, ToolResult};
use interlude_core::Arguments;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::warn;

const DEFAULT_ENDPOINT: &str = "https://api.duckduckgo.com/";
const MAX_RESULTS: usize = 5;

pub struct WebSearchTool {
    client: reqwest::Client,
    endpoint: String,
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

impl WebSearchTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn search(&self, query: &str) -> Result<Answer, reqwest::Error> {
        self.client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<Answer>()
            .await
    }
}

#[async_trait::async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information. Use this for recent news, \
         current events, or general web information."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The search query string" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Arguments) -> ToolResult {
        let Some(query) = args.get("query").and_then(Value::as_str) else {
            return ToolResult::error("missing required argument: query");
        };
        match self.search(query).await {
            Ok(answer) => ToolResult::text(format_results(query, &answer, MAX_RESULTS)),
            Err(e) => {
                warn!(tool = "web_search", "search failed: {}", e);
                ToolResult::text(format!(
                    "Search failed due to: {}. Please try a different search query or try again later.",
                    e
                ))
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct Answer {
    heading: String,
    abstract_text: String,
    #[serde(rename = "AbstractURL")]
    abstract_url: String,
    related_topics: Vec<Topic>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct Topic {
    text: String,
    #[serde(rename = "FirstURL")]
    first_url: String,
    /// Present on category groups, which nest further topics.
    topics: Vec<Topic>,
}

fn flatten<'a>(topics: &'a [Topic], out: &mut Vec<&'a Topic>) {
    for t in topics {
        if t.topics.is_empty() {
            if !t.text.is_empty() {
                out.push(t);
            }
        } else {
            flatten(&t.topics, out);
        }
    }
}

fn format_results(query: &str, answer: &Answer, max: usize) -> String {
    let mut entries: Vec<(String, String, String)> = Vec::new();
    if !answer.abstract_text.is_empty() {
        let title = if answer.heading.is_empty() {
            query.to_string()
        } else {
            answer.heading.clone()
        };
        entries.push((title, answer.abstract_text.clone(), answer.abstract_url.clone()));
    }
    let mut related = Vec::new();
    flatten(&answer.related_topics, &mut related);
    for topic in related {
        let title = topic
            .text
            .split(" - ")
            .next()
            .unwrap_or(&topic.text)
            .to_string();
        entries.push((title, topic.text.clone(), topic.first_url.clone()));
    }

    if entries.is_empty() {
        return format!("No search results found for: {}", query);
    }

    entries
        .into_iter()
        .take(max)
        .enumerate()
        .map(|(i, (title, summary, url))| {
            format!("{}. **{}**\n   {}\n   URL: {}\n", i + 1, title, summary, url)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_abstract_and_nested_topics() {
        let answer: Answer = serde_json::from_value(json!({
            "Heading": "Rust",
            "AbstractText": "A systems programming language.",
            "AbstractURL": "https://example.org/rust",
            "RelatedTopics": [
                { "Text": "Cargo - package manager", "FirstURL": "https://example.org/cargo" },
                { "Name": "Group", "Topics": [
                    { "Text": "Clippy - linter", "FirstURL": "https://example.org/clippy" }
                ]}
            ]
        }))
        .unwrap();
        let out = format_results("rust", &answer, 5);
        assert!(out.starts_with("1. **Rust**"));
        assert!(out.contains("2. **Cargo**"));
        assert!(out.contains("3. **Clippy**"));
        assert!(out.contains("URL: https://example.org/clippy"));
    }

    #[test]
    fn caps_result_count() {
        let topics: Vec<Value> = (0..10)
            .map(|i| json!({ "Text": format!("T{i} - x"), "FirstURL": "u" }))
            .collect();
        let answer: Answer = serde_json::from_value(json!({ "RelatedTopics": topics })).unwrap();
        let out = format_results("q", &answer, 5);
        assert!(out.contains("5. **T4**"));
        assert!(!out.contains("6."));
    }

    #[test]
    fn empty_answer_reports_no_results() {
        let out = format_results("nothing", &Answer::default(), 5);
        assert_eq!(out, "No search results found for: nothing");
    }
}
