use crate::agents::AgentEvent;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    Prompt,
    MessageDelta,
    ReasoningDelta,
    ToolCall,
    Error,
}

/// One immutable entry of the conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnRecord {
    Prompt { text: String },
    MessageDelta { text: String },
    ReasoningDelta { text: String },
    ToolCall { name: String, arguments: String },
    Error { message: String },
}

impl TurnRecord {
    pub fn prompt(text: impl Into<String>) -> Self {
        Self::Prompt { text: text.into() }
    }

    pub fn message(text: impl Into<String>) -> Self {
        Self::MessageDelta { text: text.into() }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self::ReasoningDelta { text: text.into() }
    }

    pub fn tool_call(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self::ToolCall {
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> TurnKind {
        match self {
            Self::Prompt { .. } => TurnKind::Prompt,
            Self::MessageDelta { .. } => TurnKind::MessageDelta,
            Self::ReasoningDelta { .. } => TurnKind::ReasoningDelta,
            Self::ToolCall { .. } => TurnKind::ToolCall,
            Self::Error { .. } => TurnKind::Error,
        }
    }

    /// Textual projection the presentation layer renders and diffs on.
    pub fn text(&self) -> String {
        match self {
            Self::Prompt { text } | Self::MessageDelta { text } | Self::ReasoningDelta { text } => {
                text.clone()
            }
            Self::ToolCall { name, arguments } => format!("{name}({arguments})"),
            Self::Error { message } => message.clone(),
        }
    }
}

impl From<AgentEvent> for TurnRecord {
    fn from(event: AgentEvent) -> Self {
        match event {
            AgentEvent::MessageDelta(text) => Self::MessageDelta { text },
            AgentEvent::ReasoningDelta(text) => Self::ReasoningDelta { text },
            AgentEvent::FunctionCall { name, arguments } => Self::ToolCall { name, arguments },
            AgentEvent::Error(message) => Self::Error { message },
        }
    }
}
