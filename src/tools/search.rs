use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::{single_string_schema, string_arg, Tool};
use crate::core::config::settings::SearchSettings;
use crate::core::errors::ApiError;
use crate::core::text::clip_chars;

const WIKIPEDIA_API: &str = "https://en.wikipedia.org/w/api.php";
const ARXIV_API: &str = "https://export.arxiv.org/api/query";
const DUCKDUCKGO_API: &str = "https://api.duckduckgo.com/";

/// arXiv rejects very long queries.
const ARXIV_MAX_QUERY_CHARS: usize = 300;
const DUCKDUCKGO_MAX_RESULTS: usize = 5;

pub const NO_WIKIPEDIA_RESULT: &str = "No good Wikipedia Search Result was found";
pub const NO_ARXIV_RESULT: &str = "No good Arxiv Result was found";
pub const NO_DUCKDUCKGO_RESULT: &str = "No good DuckDuckGo Search Result was found";

/// Search tools in the order they are offered to the agent.
pub fn search_tools(settings: &SearchSettings) -> Result<Vec<Arc<dyn Tool>>, ApiError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .user_agent(concat!("agentic-rag/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(ApiError::internal)?;

    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(ArxivSearch::new(client.clone(), settings)),
        Arc::new(DuckDuckGoSearch::new(client.clone())),
        Arc::new(WikipediaSearch::new(client, settings)),
    ];
    Ok(tools)
}

async fn get_json(client: &Client, url: &str, label: &str) -> Result<Value, ApiError> {
    let response = client.get(url).send().await.map_err(ApiError::internal)?;
    if !response.status().is_success() {
        return Err(ApiError::Internal(format!(
            "{} search failed: {}",
            label,
            response.status()
        )));
    }
    response.json().await.map_err(ApiError::internal)
}

// ---------------------------------------------------------------------------
// Wikipedia
// ---------------------------------------------------------------------------

pub struct WikipediaSearch {
    client: Client,
    top_k: usize,
    max_chars: usize,
}

impl WikipediaSearch {
    pub fn new(client: Client, settings: &SearchSettings) -> Self {
        Self {
            client,
            top_k: settings.wikipedia_top_k.max(1),
            max_chars: settings.doc_content_chars_max,
        }
    }
}

#[async_trait]
impl Tool for WikipediaSearch {
    fn name(&self) -> &str {
        "WikipediaSearch"
    }

    fn description(&self) -> &str {
        "Use this tool when you want to search for information on Wikipedia by Terms, Keywords or any Topics."
    }

    fn parameters(&self) -> Value {
        single_string_schema("query", "Search query")
    }

    async fn call(&self, args: &Value) -> Result<String, ApiError> {
        let query = string_arg(args, "query")?;
        let url = format!(
            "{}?action=query&format=json&formatversion=2&generator=search&gsrsearch={}&gsrlimit={}&prop=extracts&exintro=1&explaintext=1&redirects=1",
            WIKIPEDIA_API,
            urlencoding::encode(&query),
            self.top_k
        );
        let payload = get_json(&self.client, &url, "Wikipedia").await?;
        Ok(format_wikipedia(&payload, self.max_chars))
    }
}

/// Renders a MediaWiki `generator=search` response as `Page:`/`Summary:`
/// blocks in search-rank order.
pub fn format_wikipedia(payload: &Value, max_chars: usize) -> String {
    let mut pages: Vec<(i64, String, String)> = payload
        .pointer("/query/pages")
        .and_then(|v| v.as_array())
        .map(|pages| {
            pages
                .iter()
                .filter_map(|page| {
                    let title = page.get("title")?.as_str()?.trim();
                    let extract = page.get("extract")?.as_str()?.trim();
                    if title.is_empty() || extract.is_empty() {
                        return None;
                    }
                    let rank = page.get("index").and_then(|v| v.as_i64()).unwrap_or(i64::MAX);
                    Some((rank, title.to_string(), extract.to_string()))
                })
                .collect()
        })
        .unwrap_or_default();

    if pages.is_empty() {
        return NO_WIKIPEDIA_RESULT.to_string();
    }
    pages.sort_by_key(|(rank, _, _)| *rank);

    let joined = pages
        .iter()
        .map(|(_, title, extract)| format!("Page: {}\nSummary: {}", title, extract))
        .collect::<Vec<_>>()
        .join("\n\n");
    clip_chars(&joined, max_chars)
}

// ---------------------------------------------------------------------------
// arXiv
// ---------------------------------------------------------------------------

pub struct ArxivSearch {
    client: Client,
    top_k: usize,
    max_chars: usize,
}

impl ArxivSearch {
    pub fn new(client: Client, settings: &SearchSettings) -> Self {
        Self {
            client,
            top_k: settings.arxiv_top_k.max(1),
            max_chars: settings.doc_content_chars_max,
        }
    }
}

#[async_trait]
impl Tool for ArxivSearch {
    fn name(&self) -> &str {
        "ArxivSearch"
    }

    fn description(&self) -> &str {
        "Use this tool to search for academic papers and research articles on ArXiv. Useful for scientific and technical topics."
    }

    fn parameters(&self) -> Value {
        single_string_schema("query", "Search query")
    }

    async fn call(&self, args: &Value) -> Result<String, ApiError> {
        let query = string_arg(args, "query")?;
        let url = format!(
            "{}?search_query={}&start=0&max_results={}",
            ARXIV_API,
            urlencoding::encode(&clip_chars(&query, ARXIV_MAX_QUERY_CHARS)),
            self.top_k
        );

        let response = self.client.get(&url).send().await.map_err(ApiError::internal)?;
        if !response.status().is_success() {
            return Err(ApiError::Internal(format!(
                "Arxiv search failed: {}",
                response.status()
            )));
        }
        let feed = response.text().await.map_err(ApiError::internal)?;
        Ok(format_arxiv(&parse_arxiv_feed(&feed)?, self.max_chars))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArxivEntry {
    pub published: String,
    pub title: String,
    pub authors: Vec<String>,
    pub summary: String,
}

fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extracts entries from an arXiv Atom feed. Entries without a summary
/// are skipped.
pub fn parse_arxiv_feed(feed: &str) -> Result<Vec<ArxivEntry>, ApiError> {
    let feed = feed_rs::parser::parse(feed.as_bytes())
        .map_err(|err| ApiError::Internal(format!("Invalid Arxiv feed: {}", err)))?;

    Ok(feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let summary = entry
                .summary
                .map(|text| squash(&text.content))
                .filter(|s| !s.is_empty())?;
            Some(ArxivEntry {
                published: entry
                    .updated
                    .or(entry.published)
                    .map(|date| date.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
                title: entry
                    .title
                    .map(|text| squash(&text.content))
                    .unwrap_or_default(),
                authors: entry
                    .authors
                    .into_iter()
                    .map(|person| squash(&person.name))
                    .collect(),
                summary,
            })
        })
        .collect())
}

pub fn format_arxiv(entries: &[ArxivEntry], max_chars: usize) -> String {
    if entries.is_empty() {
        return NO_ARXIV_RESULT.to_string();
    }
    let joined = entries
        .iter()
        .map(|entry| {
            format!(
                "Published: {}\nTitle: {}\nAuthors: {}\nSummary: {}",
                entry.published,
                entry.title,
                entry.authors.join(", "),
                entry.summary
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    clip_chars(&joined, max_chars)
}

// ---------------------------------------------------------------------------
// DuckDuckGo
// ---------------------------------------------------------------------------

pub struct DuckDuckGoSearch {
    client: Client,
}

impl DuckDuckGoSearch {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for DuckDuckGoSearch {
    fn name(&self) -> &str {
        "DuckDuckGoSearch"
    }

    fn description(&self) -> &str {
        "Search the internet using DuckDuckGo for any kinds of information. Use it for current information, general web content and facts, and prefer it for long queries. Do not use it for article or topic search (use WikipediaSearch or ArxivSearch instead)."
    }

    fn parameters(&self) -> Value {
        single_string_schema("query_string", "The search query string")
    }

    async fn call(&self, args: &Value) -> Result<String, ApiError> {
        let query = string_arg(args, "query_string")?;
        let url = format!(
            "{}?q={}&format=json&no_redirect=1&no_html=1",
            DUCKDUCKGO_API,
            urlencoding::encode(&query)
        );
        let payload = get_json(&self.client, &url, "DuckDuckGo").await?;
        let snippets = duckduckgo_snippets(&payload, DUCKDUCKGO_MAX_RESULTS);
        if snippets.is_empty() {
            return Ok(NO_DUCKDUCKGO_RESULT.to_string());
        }
        Ok(snippets.join(" "))
    }
}

/// Snippets from an instant-answer payload: the abstract first, then direct
/// results, then related topics (nested topic groups flattened).
pub fn duckduckgo_snippets(payload: &Value, max_results: usize) -> Vec<String> {
    let mut snippets = Vec::new();

    if let Some(text) = payload.get("AbstractText").and_then(|v| v.as_str()) {
        if !text.trim().is_empty() {
            snippets.push(text.trim().to_string());
        }
    }
    if let Some(items) = payload.get("Results").and_then(|v| v.as_array()) {
        collect_topics(items, &mut snippets);
    }
    if let Some(items) = payload.get("RelatedTopics").and_then(|v| v.as_array()) {
        collect_topics(items, &mut snippets);
    }

    snippets.truncate(max_results);
    snippets
}

fn collect_topics(items: &[Value], snippets: &mut Vec<String>) {
    for item in items {
        if let Some(topics) = item.get("Topics").and_then(|v| v.as_array()) {
            collect_topics(topics, snippets);
            continue;
        }
        let text = item.get("Text").and_then(|v| v.as_str()).unwrap_or("").trim();
        if !text.is_empty() {
            snippets.push(text.to_string());
        }
    }
}
