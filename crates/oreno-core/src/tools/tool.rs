use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A function the model may call mid-turn.
///
/// `call` receives the raw JSON argument string and must not fail: any
/// problem is reported through [`ToolResult::err`] so the model can react to
/// it instead of the turn aborting.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> serde_json::Value;
    async fn call(&self, args: &str) -> ToolResult;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn err(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Decode a tool's JSON arguments, turning decode failures into an error result.
pub fn parse_args<T: DeserializeOwned>(args: &str) -> Result<T, ToolResult> {
    serde_json::from_str(args).map_err(|e| ToolResult::err(format!("invalid arguments: {e}")))
}
