pub mod agents;
pub mod config;
pub mod controller;
pub mod error;
pub mod log;
pub mod providers;
pub mod tools;

#[cfg(test)]
pub(crate) mod test_support;

pub use agents::{Agent, AgentEvent, OrenoAgent, OrenoAgentBuilder, Subscription};
pub use config::{OrenoConfig, ReasoningEffort, ReasoningSummary};
pub use controller::{Controller, Transcript};
pub use error::{LogError, SessionError};
pub use log::{InteractionLog, TurnKind, TurnRecord};
pub use providers::{
    ChunkStream, LlmProvider, Message, OpenAiProvider, Role, ScriptStep, ScriptedProvider,
    StreamChunk, TokenUsage, ToolCall,
};
pub use tools::{
    CurrentTimeTool, Tool, ToolDef, ToolRegistry, ToolResult, WebReaderTool, WebSearchTool,
};
