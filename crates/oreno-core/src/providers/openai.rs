use super::provider::{ChunkStream, LlmProvider, Message, Role, StreamChunk, TokenUsage, ToolCall};
use crate::config::{OrenoConfig, ReasoningEffort, ReasoningSummary};
use crate::tools::tool::ToolDef;
use anyhow::Result;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Streaming adapter for the OpenAI Responses API (`POST /responses`).
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    reasoning_effort: ReasoningEffort,
    reasoning_summary: ReasoningSummary,
}

impl OpenAiProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            reasoning_effort: ReasoningEffort::default(),
            reasoning_summary: ReasoningSummary::default(),
        }
    }

    pub fn from_config(config: &OrenoConfig) -> Self {
        Self::new(&config.base_url, &config.api_key, &config.model)
            .reasoning(config.reasoning_effort, config.reasoning_summary)
    }

    pub fn reasoning(mut self, effort: ReasoningEffort, summary: ReasoningSummary) -> Self {
        self.reasoning_effort = effort;
        self.reasoning_summary = summary;
        self
    }

    fn request_body(&self, messages: &[Message], tools: &[ToolDef]) -> Value {
        let (instructions, input) = build_input(messages);
        let mut body = json!({
            "model": self.model,
            "input": input,
            "stream": true,
            "reasoning": {
                "effort": self.reasoning_effort,
                "summary": self.reasoning_summary,
            },
        });
        if let Some(instructions) = instructions {
            body["instructions"] = json!(instructions);
        }
        let tools_val = build_tools(tools);
        if !tools_val.is_empty() {
            body["tools"] = json!(tools_val);
        }
        body
    }
}

/// Split the history into Responses API `instructions` and `input` items.
fn build_input(messages: &[Message]) -> (Option<String>, Vec<Value>) {
    let mut instructions: Option<String> = None;
    let mut input = Vec::with_capacity(messages.len());
    for m in messages {
        match m.role {
            Role::System => match &mut instructions {
                Some(existing) => {
                    existing.push_str("\n\n");
                    existing.push_str(&m.content);
                }
                None => instructions = Some(m.content.clone()),
            },
            Role::User => input.push(json!({ "role": "user", "content": m.content })),
            Role::Assistant => {
                if let Some(calls) = &m.tool_calls {
                    for c in calls {
                        input.push(json!({
                            "type": "function_call",
                            "call_id": c.id,
                            "name": c.name,
                            "arguments": c.arguments,
                        }));
                    }
                } else if !m.content.is_empty() {
                    input.push(json!({ "role": "assistant", "content": m.content }));
                }
            }
            Role::Tool => input.push(json!({
                "type": "function_call_output",
                "call_id": m.tool_call_id.clone().unwrap_or_default(),
                "output": m.content,
            })),
        }
    }
    (instructions, input)
}

fn build_tools(tools: &[ToolDef]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "name": t.name,
                "description": t.description,
                "parameters": t.parameters,
                "strict": false,
            })
        })
        .collect()
}

#[derive(Debug, PartialEq)]
enum SseEvent {
    Chunk(StreamChunk),
    Failed(String),
    Ignored,
}

fn parse_event(data: &Value) -> SseEvent {
    let text_delta = || data["delta"].as_str().unwrap_or_default().to_string();
    match data["type"].as_str().unwrap_or_default() {
        "response.output_text.delta" => SseEvent::Chunk(StreamChunk::Delta { text: text_delta() }),
        "response.reasoning_summary_text.delta" => {
            SseEvent::Chunk(StreamChunk::ReasoningDelta { text: text_delta() })
        }
        "response.output_item.done" if data["item"]["type"] == "function_call" => {
            let item = &data["item"];
            SseEvent::Chunk(StreamChunk::ToolCallReady {
                call: ToolCall {
                    id: item["call_id"].as_str().unwrap_or_default().to_string(),
                    name: item["name"].as_str().unwrap_or_default().to_string(),
                    arguments: item["arguments"].as_str().unwrap_or("{}").to_string(),
                },
            })
        }
        "response.completed" => {
            let u = &data["response"]["usage"];
            SseEvent::Chunk(StreamChunk::Done {
                usage: TokenUsage {
                    input_tokens: u["input_tokens"].as_u64().unwrap_or(0) as u32,
                    output_tokens: u["output_tokens"].as_u64().unwrap_or(0) as u32,
                },
            })
        }
        "response.failed" => SseEvent::Failed(
            data["response"]["error"]["message"]
                .as_str()
                .unwrap_or("response failed")
                .to_string(),
        ),
        "response.incomplete" => SseEvent::Failed(format!(
            "response incomplete: {}",
            data["response"]["incomplete_details"]["reason"]
                .as_str()
                .unwrap_or("unknown reason")
        )),
        "error" => SseEvent::Failed(
            data["message"]
                .as_str()
                .or_else(|| data["error"]["message"].as_str())
                .unwrap_or("stream error")
                .to_string(),
        ),
        _ => SseEvent::Ignored,
    }
}

/// Splits a byte stream into lines. Bytes are held until a full line is
/// available, so multibyte characters split across network reads survive.
#[derive(Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    fn next_line(&mut self) -> Option<Result<String, std::str::Utf8Error>> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=pos).collect();
        Some(
            std::str::from_utf8(&raw[..pos])
                .map(|line| line.trim_end_matches('\r').to_string()),
        )
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn open_stream(&self, messages: &[Message], tools: &[ToolDef]) -> Result<ChunkStream> {
        let body = self.request_body(messages, tools);
        let url = format!("{}/responses", self.base_url.trim_end_matches('/'));
        debug!("POST {url} with {} input messages", messages.len());

        let raw_resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        if !raw_resp.status().is_success() {
            let status = raw_resp.status();
            let body_text = raw_resp.text().await.unwrap_or_default();
            anyhow::bail!("status {status}: {body_text}");
        }

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let mut byte_stream = raw_resp.bytes_stream();
            let mut lines = LineBuffer::default();

            while let Some(chunk) = byte_stream.next().await {
                let bytes = match chunk {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx.send(Err(anyhow::anyhow!("stream read failed: {e}"))).await;
                        return;
                    }
                };
                lines.extend(&bytes);

                while let Some(line) = lines.next_line() {
                    let line = match line {
                        Ok(l) => l,
                        Err(e) => {
                            warn!("skipping SSE line that is not UTF-8: {e}");
                            continue;
                        }
                    };
                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim_start();
                    if data == "[DONE]" {
                        return;
                    }
                    let event: Value = match serde_json::from_str(data) {
                        Ok(v) => v,
                        Err(e) => {
                            warn!("skipping unparseable SSE payload: {e}");
                            continue;
                        }
                    };

                    let item = match parse_event(&event) {
                        SseEvent::Chunk(chunk) => Ok(chunk),
                        SseEvent::Failed(message) => Err(anyhow::anyhow!(message)),
                        SseEvent::Ignored => continue,
                    };
                    let failed = item.is_err();
                    if tx.send(item).await.is_err() || failed {
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}
