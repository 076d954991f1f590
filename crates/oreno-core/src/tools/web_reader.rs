use super::tool::{parse_args, Tool, ToolResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";

pub struct WebReaderTool {
    client: Client,
    timeout: Duration,
}

#[derive(Deserialize)]
struct ReaderArgs {
    #[serde(alias = "Url")]
    url: String,
}

impl WebReaderTool {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .user_agent(BROWSER_USER_AGENT)
                .build()
                .unwrap_or_default(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for WebReaderTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebReaderTool {
    fn name(&self) -> &str {
        "webReader"
    }

    fn description(&self) -> &str {
        "Reads and returns the content from the specified URL."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "URL of the page to retrieve"
                }
            },
            "required": ["url"]
        })
    }

    async fn call(&self, args: &str) -> ToolResult {
        let args: ReaderArgs = match parse_args(args) {
            Ok(a) => a,
            Err(result) => return result,
        };
        debug!("webReader GET {}", args.url);

        let response = match self
            .client
            .get(&args.url)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return ToolResult::err(format!("Request failed: {e}")),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return ToolResult::err(format!("Failed to read response body: {e}")),
        };

        if status.is_client_error() || status.is_server_error() {
            ToolResult::err(format!("HTTP {}\n\n{}", status.as_u16(), body))
        } else {
            ToolResult::ok(body)
        }
    }
}
