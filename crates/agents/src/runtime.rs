//! Managed LLM runtime client (Converse-style tool-use API)

use crate::http::{authorize, endpoint_url, json_or_service_error};
use crate::{AgentError, Result};
use async_trait::async_trait;
use budget_rag_core::Role;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, instrument};

/// One piece of a message
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text(String),
    /// The model asks for a tool call
    ToolUse { id: String, name: String, input: Value },
    /// Our answer to a tool call
    ToolResult { id: String, text: String, is_error: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text(text.into())],
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::Text(text.into())],
        }
    }

    /// Concatenated text blocks
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Tool calls requested in this message
    pub fn tool_uses(&self) -> Vec<(&str, &str, &Value)> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.as_str(), name.as_str(), input))
                }
                _ => None,
            })
            .collect()
    }
}

/// A tool advertised to the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConverseRequest {
    pub model_id: String,
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    Other,
}

impl StopReason {
    fn parse(value: &str) -> Self {
        match value {
            "end_turn" | "stop_sequence" => StopReason::EndTurn,
            "tool_use" => StopReason::ToolUse,
            "max_tokens" => StopReason::MaxTokens,
            _ => StopReason::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConverseResponse {
    pub message: Message,
    pub stop_reason: StopReason,
}

/// Runs one model turn
#[async_trait]
pub trait ModelRuntime: Send + Sync {
    async fn converse(&self, request: &ConverseRequest) -> Result<ConverseResponse>;
}

/// Model runtime reached over HTTP (`POST {endpoint}/model/{id}/converse`)
#[derive(Clone)]
pub struct HttpModelRuntime {
    client: Client,
    endpoint: String,
    bearer_token: Option<String>,
}

impl HttpModelRuntime {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            bearer_token: None,
        }
    }

    /// Builder: authenticate with a bearer token
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

#[async_trait]
impl ModelRuntime for HttpModelRuntime {
    #[instrument(skip(self, request), fields(model = %request.model_id))]
    async fn converse(&self, request: &ConverseRequest) -> Result<ConverseResponse> {
        let url = endpoint_url(&self.endpoint, &["model", request.model_id.as_str(), "converse"])?;
        debug!("Sending {} messages to the model", request.messages.len());

        let response = authorize(self.client.post(url), self.bearer_token.as_deref())
            .json(&request_body(request))
            .send()
            .await?;
        let value = json_or_service_error(response).await?;

        parse_response(&value)
    }
}

// ==========================================
// WIRE FORMAT
// ==========================================

fn request_body(request: &ConverseRequest) -> Value {
    let messages: Vec<Value> = request.messages.iter().map(message_to_wire).collect();
    let mut body = json!({
        "system": [{"text": request.system}],
        "messages": messages,
    });

    if !request.tools.is_empty() {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "toolSpec": {
                        "name": tool.name,
                        "description": tool.description,
                        "inputSchema": {"json": tool.input_schema},
                    }
                })
            })
            .collect();
        body["toolConfig"] = json!({ "tools": tools });
    }

    body
}

fn message_to_wire(message: &Message) -> Value {
    let content: Vec<Value> = message
        .content
        .iter()
        .map(|block| match block {
            ContentBlock::Text(text) => json!({ "text": text }),
            ContentBlock::ToolUse { id, name, input } => json!({
                "toolUse": {"toolUseId": id, "name": name, "input": input}
            }),
            ContentBlock::ToolResult { id, text, is_error } => json!({
                "toolResult": {
                    "toolUseId": id,
                    "content": [{"text": text}],
                    "status": if *is_error { "error" } else { "success" },
                }
            }),
        })
        .collect();

    json!({ "role": message.role.to_string(), "content": content })
}

fn parse_response(value: &Value) -> Result<ConverseResponse> {
    let message = value
        .pointer("/output/message")
        .ok_or_else(|| AgentError::Processing("Model response missing output.message".into()))?;

    let role = match message.get("role").and_then(|r| r.as_str()) {
        Some("user") => Role::User,
        _ => Role::Assistant,
    };

    let content = message
        .get("content")
        .and_then(|c| c.as_array())
        .map(|blocks| blocks.iter().filter_map(parse_block).collect())
        .unwrap_or_default();

    let stop_reason = value
        .get("stopReason")
        .and_then(|s| s.as_str())
        .map(StopReason::parse)
        .unwrap_or(StopReason::Other);

    Ok(ConverseResponse {
        message: Message { role, content },
        stop_reason,
    })
}

fn parse_block(block: &Value) -> Option<ContentBlock> {
    if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
        return Some(ContentBlock::Text(text.to_string()));
    }

    let tool_use = block.get("toolUse")?;
    Some(ContentBlock::ToolUse {
        id: tool_use.get("toolUseId")?.as_str()?.to_string(),
        name: tool_use.get("name")?.as_str()?.to_string(),
        input: tool_use.get("input").cloned().unwrap_or_else(|| json!({})),
    })
}
