pub mod openai;
pub mod provider;
pub mod scripted;

pub use openai::OpenAiProvider;
pub use provider::{ChunkStream, LlmProvider, Message, Role, StreamChunk, TokenUsage, ToolCall};
pub use scripted::{ScriptStep, ScriptedProvider};
