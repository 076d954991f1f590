use super::provider::{ChunkStream, LlmProvider, Message, StreamChunk, TokenUsage, ToolCall};
use crate::tools::tool::ToolDef;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};

/// One step of a scripted provider round.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Chunk(StreamChunk),
    /// Emit a mid-stream failure.
    Fail(String),
    /// Hold the round open until the `Notify` fires.
    Wait(Arc<Notify>),
}

impl ScriptStep {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Chunk(StreamChunk::Delta { text: text.into() })
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self::Chunk(StreamChunk::ReasoningDelta { text: text.into() })
    }

    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self::Chunk(StreamChunk::ToolCallReady {
            call: ToolCall {
                id: id.into(),
                name: name.into(),
                arguments: arguments.into(),
            },
        })
    }

    pub fn done() -> Self {
        Self::Chunk(StreamChunk::Done {
            usage: TokenUsage::default(),
        })
    }
}

/// Replays pre-recorded rounds instead of talking to a model. Each
/// `open_stream` call consumes the next round; the messages it was called
/// with are recorded for inspection.
#[derive(Default)]
pub struct ScriptedProvider {
    rounds: Mutex<VecDeque<std::result::Result<Vec<ScriptStep>, String>>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn round(self, steps: Vec<ScriptStep>) -> Self {
        self.push(Ok(steps));
        self
    }

    /// Queue a round whose `open_stream` call fails.
    pub fn refuse(self, reason: impl Into<String>) -> Self {
        self.push(Err(reason.into()));
        self
    }

    fn push(&self, round: std::result::Result<Vec<ScriptStep>, String>) {
        self.rounds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(round);
    }

    /// Message histories passed to each `open_stream` call, in call order.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn open_stream(&self, messages: &[Message], _tools: &[ToolDef]) -> Result<ChunkStream> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(messages.to_vec());

        let next = self
            .rounds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        let steps = match next {
            Some(Ok(steps)) => steps,
            Some(Err(reason)) => anyhow::bail!(reason),
            None => anyhow::bail!("scripted provider has no rounds left"),
        };

        let (tx, rx) = mpsc::channel(steps.len().max(1));
        tokio::spawn(async move {
            for step in steps {
                let item = match step {
                    ScriptStep::Chunk(chunk) => Ok(chunk),
                    ScriptStep::Fail(message) => Err(anyhow::anyhow!(message)),
                    ScriptStep::Wait(gate) => {
                        gate.notified().await;
                        continue;
                    }
                };
                if tx.send(item).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }
}
