use crate::config::OrenoConfig;
use crate::error::SessionError;
use crate::providers::provider::{
    ChunkStream, LlmProvider, Message, Role, StreamChunk, TokenUsage,
};
use crate::tools::registry::ToolRegistry;
use crate::tools::tool::ToolDef;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. \
     Use currentTime when the answer depends on today's date or time, \
     webSearch to find pages on the web, and webReader to read a page before quoting it.";

/// One streamed result of an agent session, in provider arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    MessageDelta(String),
    ReasoningDelta(String),
    FunctionCall { name: String, arguments: String },
    /// Terminal: nothing follows an error.
    Error(String),
}

/// Lazy, finite sequence of [`AgentEvent`]s for one prompt.
pub struct Subscription {
    rx: mpsc::Receiver<AgentEvent>,
}

impl Subscription {
    pub fn new(rx: mpsc::Receiver<AgentEvent>) -> Self {
        Self { rx }
    }

    /// Next event, or `None` once the session has closed.
    pub async fn next(&mut self) -> Option<AgentEvent> {
        self.rx.recv().await
    }
}

#[async_trait]
pub trait Agent: Send + Sync {
    async fn ask(&self, prompt: &str) -> Result<Subscription, SessionError>;
}

#[derive(Default)]
struct TokenCounter {
    input: AtomicU32,
    output: AtomicU32,
}

impl TokenCounter {
    fn add(&self, usage: &TokenUsage) {
        self.input.fetch_add(usage.input_tokens, Ordering::Relaxed);
        self.output.fetch_add(usage.output_tokens, Ordering::Relaxed);
    }
}

/// Agent session over an [`LlmProvider`] with a fixed tool table.
///
/// Completed exchanges are kept in memory so follow-up prompts carry the
/// earlier conversation.
pub struct OrenoAgent {
    provider: Arc<dyn LlmProvider>,
    registry: Arc<ToolRegistry>,
    system_prompt: String,
    max_turns: usize,
    max_tool_output_chars: usize,
    history: Arc<Mutex<Vec<Message>>>,
    tokens: Arc<TokenCounter>,
}

pub struct OrenoAgentBuilder {
    config: OrenoConfig,
    provider: Arc<dyn LlmProvider>,
    registry: ToolRegistry,
    system_prompt: Option<String>,
}

impl OrenoAgentBuilder {
    pub fn new(config: OrenoConfig, provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            config,
            provider,
            registry: ToolRegistry::builtin(),
            system_prompt: None,
        }
    }

    pub fn registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn build(self) -> Arc<OrenoAgent> {
        let system_prompt = self
            .system_prompt
            .or(self.config.system_prompt)
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        Arc::new(OrenoAgent {
            provider: self.provider,
            registry: Arc::new(self.registry),
            system_prompt,
            max_turns: self.config.max_turns.max(1),
            max_tool_output_chars: self.config.max_tool_output_chars,
            history: Arc::new(Mutex::new(Vec::new())),
            tokens: Arc::new(TokenCounter::default()),
        })
    }
}

impl OrenoAgent {
    pub fn total_tokens(&self) -> (u32, u32) {
        (
            self.tokens.input.load(Ordering::Relaxed),
            self.tokens.output.load(Ordering::Relaxed),
        )
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.names()
    }

    fn request_messages(&self, prompt: &str) -> Vec<Message> {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        let mut messages = Vec::with_capacity(history.len() + 2);
        if !self.system_prompt.is_empty() {
            messages.push(Message::system(&self.system_prompt));
        }
        messages.extend(history.iter().cloned());
        messages.push(Message::user(prompt));
        messages
    }
}

#[async_trait]
impl Agent for OrenoAgent {
    async fn ask(&self, prompt: &str) -> Result<Subscription, SessionError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(SessionError::Creation("prompt is empty".into()));
        }

        let messages = self.request_messages(prompt);
        let tool_defs = self.registry.tool_defs();
        let first = self
            .provider
            .open_stream(&messages, &tool_defs)
            .await
            .map_err(|e| SessionError::Creation(e.to_string()))?;

        let (tx, rx) = mpsc::channel(64);
        let pump = TurnPump {
            provider: Arc::clone(&self.provider),
            registry: Arc::clone(&self.registry),
            tool_defs,
            max_turns: self.max_turns,
            max_tool_output_chars: self.max_tool_output_chars,
            history: Arc::clone(&self.history),
            tokens: Arc::clone(&self.tokens),
        };
        tokio::spawn(pump.run(messages, first, tx));

        Ok(Subscription::new(rx))
    }
}

/// Drives provider rounds for one prompt: forwards chunks as events, runs
/// requested tools, and feeds their output into the next round.
struct TurnPump {
    provider: Arc<dyn LlmProvider>,
    registry: Arc<ToolRegistry>,
    tool_defs: Vec<ToolDef>,
    max_turns: usize,
    max_tool_output_chars: usize,
    history: Arc<Mutex<Vec<Message>>>,
    tokens: Arc<TokenCounter>,
}

impl TurnPump {
    async fn run(self, mut messages: Vec<Message>, first: ChunkStream, tx: mpsc::Sender<AgentEvent>) {
        // The user prompt is the last request message; everything from it on
        // is this exchange.
        let exchange_start = messages.len().saturating_sub(1);
        let mut pending = Some(first);

        for round in 0..self.max_turns {
            let mut stream = match pending.take() {
                Some(s) => s,
                None => match self.provider.open_stream(&messages, &self.tool_defs).await {
                    Ok(s) => s,
                    Err(e) => {
                        warn!("round {round}: provider refused follow-up: {e}");
                        let _ = tx.send(AgentEvent::Error(e.to_string())).await;
                        return;
                    }
                },
            };
            debug!("round {round}: streaming with {} messages", messages.len());

            let mut text = String::new();
            let mut calls = Vec::new();

            loop {
                let item = tokio::select! {
                    biased;
                    _ = tx.closed() => {
                        debug!("round {round}: subscription dropped while streaming");
                        return;
                    }
                    item = stream.recv() => item,
                };
                let Some(item) = item else { break };
                let event = match item {
                    Ok(StreamChunk::Delta { text: delta }) => {
                        text.push_str(&delta);
                        AgentEvent::MessageDelta(delta)
                    }
                    Ok(StreamChunk::ReasoningDelta { text }) => AgentEvent::ReasoningDelta(text),
                    Ok(StreamChunk::ToolCallReady { call }) => {
                        let event = AgentEvent::FunctionCall {
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                        };
                        calls.push(call);
                        event
                    }
                    Ok(StreamChunk::Done { usage }) => {
                        self.tokens.add(&usage);
                        continue;
                    }
                    Err(e) => {
                        warn!("round {round}: stream failed: {e}");
                        let _ = tx.send(AgentEvent::Error(e.to_string())).await;
                        return;
                    }
                };
                if tx.send(event).await.is_err() {
                    debug!("subscription dropped, stopping");
                    return;
                }
            }

            if tx.is_closed() {
                debug!("round {round}: subscription dropped, discarding exchange");
                return;
            }
            if calls.is_empty() {
                info!("round {round}: final message received");
                messages.push(Message::assistant(text));
                self.commit(messages.split_off(exchange_start));
                return;
            }

            info!("round {round}: got {} tool calls", calls.len());
            if !text.is_empty() {
                messages.push(Message::assistant(&text));
            }
            messages.push(Message::assistant_tool_calls(calls.clone()));

            for call in calls {
                debug!("Calling tool: {} with args: {}", call.name, call.arguments);
                let result = tokio::select! {
                    biased;
                    _ = tx.closed() => {
                        debug!("subscription dropped during tool {}", call.name);
                        return;
                    }
                    result = self.registry.invoke(&call.name, &call.arguments) => result,
                };
                if result.is_error {
                    warn!("tool {} reported: {}", call.name, result.content);
                }
                let content = clip(result.content, self.max_tool_output_chars);
                messages.push(Message::tool_result(content, &call.id));
            }
        }

        let _ = tx
            .send(AgentEvent::Error(format!(
                "Max turns ({}) exceeded",
                self.max_turns
            )))
            .await;
    }

    /// Append a finished exchange to the history used by follow-up prompts.
    fn commit(&self, exchange: Vec<Message>) {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.extend(exchange.into_iter().filter(|m| m.role != Role::System));
    }
}

fn clip(content: String, max_chars: usize) -> String {
    let total = content.chars().count();
    if total <= max_chars {
        return content;
    }
    let mut clipped: String = content.chars().take(max_chars).collect();
    clipped.push_str(&format!("\n[truncated {} of {} characters]", total - max_chars, total));
    clipped
}
