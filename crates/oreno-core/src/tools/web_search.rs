use super::tool::{parse_args, Tool, ToolResult};
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

const DUCKDUCKGO_HTML: &str = "https://html.duckduckgo.com/html/";
const DEFAULT_MAX_RESULTS: usize = 10;

static RESULT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a([^>]*class="[^"]*result__a[^"]*"[^>]*)>(.*?)</a>"#).expect("valid regex")
});
static RESULT_SNIPPET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<[a-z]+[^>]*class="[^"]*result__snippet[^"]*"[^>]*>(.*?)</[a-z]+>"#)
        .expect("valid regex")
});
static HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="([^"]*)""#).expect("valid regex"));
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

#[derive(Deserialize)]
struct SearchArgs {
    #[serde(alias = "Keyword")]
    keyword: String,
}

/// Keyword search against DuckDuckGo's HTML endpoint.
pub struct WebSearchTool {
    client: Client,
    endpoint: String,
    max_results: usize,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self::with_endpoint(DUCKDUCKGO_HTML)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .user_agent("Mozilla/5.0 (compatible; oreno)")
                .timeout(Duration::from_secs(20))
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "webSearch"
    }

    fn description(&self) -> &str {
        "Search the web for a keyword and return the top results as a JSON list of title, link and snippet."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "keyword": {
                    "type": "string",
                    "description": "web search keyword."
                }
            },
            "required": ["keyword"]
        })
    }

    async fn call(&self, args: &str) -> ToolResult {
        let args: SearchArgs = match parse_args(args) {
            Ok(a) => a,
            Err(result) => return result,
        };
        let keyword = args.keyword.trim();
        if keyword.is_empty() {
            return ToolResult::err("keyword must not be empty");
        }
        debug!("webSearch: {keyword}");

        let response = match self
            .client
            .get(&self.endpoint)
            .query(&[("q", keyword)])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return ToolResult::err(format!("Search request failed: {e}")),
        };
        let status = response.status();
        if !status.is_success() {
            return ToolResult::err(format!("Search failed with HTTP {}", status.as_u16()));
        }
        let html = match response.text().await {
            Ok(t) => t,
            Err(e) => return ToolResult::err(format!("Failed to read search results: {e}")),
        };

        let hits = parse_results(&html, self.max_results);
        match serde_json::to_string(&hits) {
            Ok(s) => ToolResult::ok(s),
            Err(e) => ToolResult::err(format!("Failed to encode search results: {e}")),
        }
    }
}

/// Pull result links and their snippets out of a DuckDuckGo HTML page.
fn parse_results(html: &str, limit: usize) -> Vec<SearchHit> {
    let links: Vec<_> = RESULT_LINK.captures_iter(html).collect();
    let mut hits = Vec::new();

    for (i, caps) in links.iter().enumerate() {
        if hits.len() >= limit {
            break;
        }
        let (Some(whole), Some(attrs), Some(title)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let Some(href) = HREF.captures(attrs.as_str()).and_then(|c| c.get(1)) else {
            continue;
        };
        let Some(link) = resolve_link(&decode_entities(href.as_str())) else {
            continue;
        };

        // The snippet for this hit sits between its link and the next one.
        let section_end = links
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(html.len());
        let snippet = RESULT_SNIPPET
            .captures(&html[whole.end()..section_end])
            .and_then(|c| c.get(1))
            .map(|m| clean_text(m.as_str()))
            .unwrap_or_default();

        hits.push(SearchHit {
            title: clean_text(title.as_str()),
            link,
            snippet,
        });
    }
    hits
}

/// Unwrap DuckDuckGo's `/l/?uddg=` redirect links and skip ad links.
fn resolve_link(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let url = Url::parse(&absolute).ok()?;
    if url.path().ends_with("/y.js") {
        return None;
    }
    if url.path() == "/l/" {
        return url
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned());
    }
    Some(absolute)
}

fn clean_text(fragment: &str) -> String {
    let stripped = TAG.replace_all(fragment, "");
    let decoded = decode_entities(&stripped);
    SPACES.replace_all(decoded.trim(), " ").into_owned()
}

fn decode_entities(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
