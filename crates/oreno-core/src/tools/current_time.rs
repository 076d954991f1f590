use super::tool::{Tool, ToolResult};
use async_trait::async_trait;
use chrono::{Local, SecondsFormat};
use serde_json::json;

pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "currentTime"
    }
    fn description(&self) -> &str {
        "Get the current date and time with timezone in a human-readable format."
    }
    fn parameters(&self) -> serde_json::Value {
        json!({ "type": "object", "properties": {} })
    }
    // Arguments are ignored; the model often sends `{}` or nothing at all.
    async fn call(&self, _args: &str) -> ToolResult {
        ToolResult::ok(Local::now().to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}
