//! API handler - turns a proxy-style HTTP event into an agent call

use crate::budget_agent::BudgetAgent;
use crate::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{error, info, instrument, warn};

pub const INVALID_JSON_MESSAGE: &str = "Invalid JSON in request body";
pub const MISSING_QUERY_MESSAGE: &str = "Missing 'query' parameter in request body";

/// Anything that can answer a query
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, query: &str) -> Result<String>;
}

#[async_trait]
impl Responder for BudgetAgent {
    async fn respond(&self, query: &str) -> Result<String> {
        self.ask(query).await
    }
}

/// Proxy integration response
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    /// JSON-encoded payload
    pub body: String,
}

impl ApiResponse {
    fn json(status_code: u16, payload: Value) -> Self {
        let headers = [
            ("Content-Type", "application/json"),
            ("Access-Control-Allow-Origin", "*"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            status_code,
            headers,
            body: payload.to_string(),
        }
    }

    /// Decoded body
    pub fn payload(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

/// Handle one request event. The event's `body` is a JSON string carrying
/// `query`; a missing body counts as `{}`.
#[instrument(skip_all)]
pub async fn handle_event(event: &Value, responder: &dyn Responder) -> ApiResponse {
    let request = match event.get("body") {
        None | Some(Value::Null) => json!({}),
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
            Ok(value) => value,
            Err(e) => {
                warn!("JSON decode error: {}", e);
                return ApiResponse::json(400, json!({ "error": INVALID_JSON_MESSAGE }));
            }
        },
        Some(other) => other.clone(),
    };

    let query = request
        .get("query")
        .and_then(Value::as_str)
        .filter(|q| !q.is_empty());
    let Some(query) = query else {
        warn!("Request missing 'query' parameter");
        return ApiResponse::json(400, json!({ "error": MISSING_QUERY_MESSAGE }));
    };

    info!("Processing query: {}", query);
    match responder.respond(query).await {
        Ok(response) => {
            info!("Query processed successfully");
            ApiResponse::json(200, json!({ "response": response }))
        }
        Err(e) => {
            error!("Unexpected error: {}", e);
            ApiResponse::json(
                500,
                json!({ "error": "Internal server error", "message": e.to_string() }),
            )
        }
    }
}
