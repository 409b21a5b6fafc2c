//! Conversational memory - bootstrap and session access for the managed memory service

use crate::http::{authorize, endpoint_url, json_or_service_error};
use crate::{AgentError, Result};
use async_trait::async_trait;
use budget_rag_core::{ConversationTurn, MemoryRecord, MemoryStatus, MemoryStrategy, Role};
use chrono::{DateTime, Local, TimeZone, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Memories whose id contains this marker belong to the budget agent
pub const MEMORY_NAME_PREFIX: &str = "BudgetAgentMemory";
const MEMORY_DESCRIPTION: &str = "Memory for budget document analysis with user preferences";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_MAX_POLLS: usize = 60;
/// Turns replayed into a new conversation
pub const DEFAULT_HISTORY_TURNS: usize = 20;

/// Where one conversation's events are stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySession {
    pub memory_id: String,
    pub actor_id: String,
    pub session_id: String,
}

impl MemorySession {
    /// Session ids derived from the local clock, as the agent has always named them
    pub fn starting_at<Tz: TimeZone>(memory_id: impl Into<String>, now: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            memory_id: memory_id.into(),
            actor_id: format!("user_{}", now.format("%H%M%S")),
            session_id: format!("session_{}", now.format("%Y%m%d_%H%M%S")),
        }
    }
}

/// Managed memory service contract
#[async_trait]
pub trait MemoryService: Send + Sync {
    async fn list_memories(&self) -> Result<Vec<MemoryRecord>>;

    async fn create_memory(
        &self,
        name: &str,
        description: &str,
        strategies: &[MemoryStrategy],
    ) -> Result<MemoryRecord>;

    async fn get_memory(&self, memory_id: &str) -> Result<MemoryRecord>;

    /// Append turns to a session
    async fn append_turns(&self, session: &MemorySession, turns: &[ConversationTurn])
        -> Result<()>;

    /// Most recent `max_turns` turns of a session, oldest first
    async fn recent_turns(
        &self,
        session: &MemorySession,
        max_turns: usize,
    ) -> Result<Vec<ConversationTurn>>;
}

/// Strategies attached to a newly created budget memory
pub fn default_strategies() -> Vec<MemoryStrategy> {
    vec![
        MemoryStrategy::SummaryMemoryStrategy {
            name: "SessionSummarizer".into(),
            namespaces: vec!["/summaries/{actorId}/{sessionId}".into()],
        },
        MemoryStrategy::UserPreferenceMemoryStrategy {
            name: "PreferenceLearner".into(),
            namespaces: vec!["/preferences/{actorId}".into()],
        },
        MemoryStrategy::SemanticMemoryStrategy {
            name: "FactExtractor".into(),
            namespaces: vec!["/facts/{actorId}".into()],
        },
    ]
}

/// Most recently created budget memory. Among equal timestamps the first
/// listed wins; memories without a timestamp rank last.
pub fn latest_budget_memory(memories: &[MemoryRecord]) -> Option<&MemoryRecord> {
    memories
        .iter()
        .filter(|m| m.id.contains(MEMORY_NAME_PREFIX))
        .fold(None, |best: Option<&MemoryRecord>, candidate| match best {
            Some(current) if candidate.created_at <= current.created_at => Some(current),
            _ => Some(candidate),
        })
}

/// Finds or creates the agent's memory and opens a fresh session on it
pub struct MemoryBootstrap<'a> {
    service: &'a dyn MemoryService,
    poll_interval: Duration,
    max_polls: usize,
}

impl<'a> MemoryBootstrap<'a> {
    pub fn new(service: &'a dyn MemoryService) -> Self {
        Self {
            service,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }

    /// Builder: how often to check a memory that is still being created
    pub fn with_polling(mut self, interval: Duration, max_polls: usize) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls.max(1);
        self
    }

    /// Reuse the newest budget memory, or create one. `None` means the agent
    /// runs without memory.
    pub async fn setup(&self) -> Option<MemorySession> {
        self.setup_at(Local::now()).await
    }

    #[instrument(skip(self, now))]
    pub async fn setup_at(&self, now: DateTime<Local>) -> Option<MemorySession> {
        let existing = match self.service.list_memories().await {
            Ok(memories) => latest_budget_memory(&memories).map(|m| m.id.clone()),
            Err(e) => {
                debug!("Listing memories failed: {}", e);
                None
            }
        };

        let memory_id = match existing {
            Some(id) => {
                info!("Reusing memory {}", id);
                id
            }
            None => {
                info!("No existing {} found, creating a new one", MEMORY_NAME_PREFIX);
                let name = format!("{}_{}", MEMORY_NAME_PREFIX, now.format("%Y%m%d_%H%M%S"));
                match self.create_and_wait(&name).await {
                    Ok(record) => {
                        info!("New memory created: {}", record.id);
                        record.id
                    }
                    Err(e) => {
                        warn!("Could not create memory: {}. Continuing without memory", e);
                        return None;
                    }
                }
            }
        };

        let session = MemorySession::starting_at(memory_id, &now);
        info!("Actor: {}, session: {}", session.actor_id, session.session_id);
        Some(session)
    }

    async fn create_and_wait(&self, name: &str) -> Result<MemoryRecord> {
        let mut record = self
            .service
            .create_memory(name, MEMORY_DESCRIPTION, &default_strategies())
            .await?;

        for _ in 0..self.max_polls {
            match record.status {
                MemoryStatus::Active => return Ok(record),
                MemoryStatus::Failed => {
                    return Err(AgentError::Processing(format!(
                        "Memory {} failed to become active",
                        record.id
                    )))
                }
                _ => {
                    tokio::time::sleep(self.poll_interval).await;
                    record = self.service.get_memory(&record.id).await?;
                }
            }
        }

        if record.is_active() {
            return Ok(record);
        }
        Err(AgentError::Processing(format!(
            "Memory {} was not active after {} checks",
            record.id, self.max_polls
        )))
    }
}

/// Find or create the budget memory with default polling
pub async fn setup_memory(service: &dyn MemoryService) -> Option<MemorySession> {
    MemoryBootstrap::new(service).setup().await
}

/// Memory service reached over HTTP.
///
/// Control operations (create, list, get) and data operations (events) live
/// on separate endpoints.
#[derive(Clone)]
pub struct HttpMemoryService {
    client: Client,
    control_endpoint: String,
    data_endpoint: String,
    bearer_token: Option<String>,
}

impl HttpMemoryService {
    pub fn new(control_endpoint: impl Into<String>, data_endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            control_endpoint: control_endpoint.into(),
            data_endpoint: data_endpoint.into(),
            bearer_token: None,
        }
    }

    /// Builder: authenticate with a bearer token
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    async fn post(&self, base: &str, segments: &[&str], body: &Value) -> Result<Value> {
        let url = endpoint_url(base, segments)?;
        let response = authorize(self.client.post(url), self.bearer_token.as_deref())
            .json(body)
            .send()
            .await?;
        json_or_service_error(response).await
    }
}

#[async_trait]
impl MemoryService for HttpMemoryService {
    async fn list_memories(&self) -> Result<Vec<MemoryRecord>> {
        let value = self.post(&self.control_endpoint, &["memories", ""], &json!({})).await?;
        let memories = value.get("memories").cloned().unwrap_or_else(|| json!([]));
        serde_json::from_value(memories)
            .map_err(|e| AgentError::Processing(format!("Unexpected memory listing: {}", e)))
    }

    async fn create_memory(
        &self,
        name: &str,
        description: &str,
        strategies: &[MemoryStrategy],
    ) -> Result<MemoryRecord> {
        let body = json!({
            "name": name,
            "description": description,
            "memoryStrategies": strategies,
            "eventExpiryDuration": 90,
        });
        let value = self.post(&self.control_endpoint, &["memories", "create"], &body).await?;
        parse_memory(&value)
    }

    async fn get_memory(&self, memory_id: &str) -> Result<MemoryRecord> {
        let url = endpoint_url(&self.control_endpoint, &["memories", memory_id, "details"])?;
        let response = authorize(self.client.get(url), self.bearer_token.as_deref())
            .send()
            .await?;
        let value = json_or_service_error(response).await?;
        parse_memory(&value)
    }

    #[instrument(skip(self, turns), fields(session = %session.session_id))]
    async fn append_turns(
        &self,
        session: &MemorySession,
        turns: &[ConversationTurn],
    ) -> Result<()> {
        if turns.is_empty() {
            return Ok(());
        }
        let payload: Vec<Value> = turns
            .iter()
            .map(|turn| {
                json!({
                    "conversational": {
                        "content": {"text": turn.text},
                        "role": turn.role.to_string().to_uppercase(),
                    }
                })
            })
            .collect();
        let body = json!({
            "actorId": session.actor_id,
            "sessionId": session.session_id,
            "eventTimestamp": Utc::now().timestamp(),
            "payload": payload,
        });
        self.post(&self.data_endpoint, &["memories", session.memory_id.as_str(), "events"], &body)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(session = %session.session_id))]
    async fn recent_turns(
        &self,
        session: &MemorySession,
        max_turns: usize,
    ) -> Result<Vec<ConversationTurn>> {
        let body = json!({"includePayloads": true, "maxResults": 100});
        let value = self
            .post(
                &self.data_endpoint,
                &[
                    "memories",
                    session.memory_id.as_str(),
                    "actor",
                    session.actor_id.as_str(),
                    "sessions",
                    session.session_id.as_str(),
                ],
                &body,
            )
            .await?;

        let events = value
            .get("events")
            .and_then(|e| e.as_array())
            .cloned()
            .unwrap_or_default();
        let turns = turns_from_events(events);
        let skip = turns.len().saturating_sub(max_turns);
        Ok(turns.into_iter().skip(skip).collect())
    }
}

fn parse_memory(value: &Value) -> Result<MemoryRecord> {
    let memory = value.get("memory").unwrap_or(value).clone();
    serde_json::from_value(memory)
        .map_err(|e| AgentError::Processing(format!("Unexpected memory payload: {}", e)))
}

/// Flatten events into turns, oldest event first
fn turns_from_events(mut events: Vec<Value>) -> Vec<ConversationTurn> {
    events.sort_by(|a, b| {
        let ts = |v: &Value| v.get("eventTimestamp").and_then(|t| t.as_f64()).unwrap_or(0.0);
        ts(a).total_cmp(&ts(b))
    });

    events
        .iter()
        .filter_map(|event| event.get("payload").and_then(|p| p.as_array()))
        .flatten()
        .filter_map(|item| {
            let conversational = item.get("conversational")?;
            let text = conversational.pointer("/content/text")?.as_str()?;
            let role = match conversational.get("role")?.as_str()? {
                "USER" | "user" => Role::User,
                "ASSISTANT" | "assistant" => Role::Assistant,
                _ => return None,
            };
            Some(ConversationTurn {
                role,
                text: text.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: &str, created: Option<i64>) -> MemoryRecord {
        let record = MemoryRecord::new(id);
        match created {
            Some(secs) => record.with_created_at(Utc.timestamp_opt(secs, 0).unwrap()),
            None => record,
        }
    }

    #[test]
    fn test_latest_budget_memory() {
        let memories = vec![
            record("OtherMemory-1", Some(900)),
            record("BudgetAgentMemory_a", Some(100)),
            record("BudgetAgentMemory_b", Some(300)),
            record("BudgetAgentMemory_c", None),
            record("BudgetAgentMemory_d", Some(300)),
        ];
        assert_eq!(
            latest_budget_memory(&memories).map(|m| m.id.as_str()),
            Some("BudgetAgentMemory_b")
        );
        assert!(latest_budget_memory(&memories[..1]).is_none());
    }

    #[test]
    fn test_session_naming() {
        let now = Utc.with_ymd_and_hms(2024, 4, 16, 9, 5, 7).unwrap();
        let session = MemorySession::starting_at("mem-1", &now);
        assert_eq!(session.actor_id, "user_090507");
        assert_eq!(session.session_id, "session_20240416_090507");
    }

    #[test]
    fn test_turns_from_events() {
        let events = vec![
            json!({"eventTimestamp": 20, "payload": [
                {"conversational": {"content": {"text": "Deficit is $40B"}, "role": "ASSISTANT"}}
            ]}),
            json!({"eventTimestamp": 10, "payload": [
                {"conversational": {"content": {"text": "What is the deficit?"}, "role": "USER"}},
                {"blob": "ignored"}
            ]}),
        ];

        let turns = turns_from_events(events);
        assert_eq!(
            turns,
            vec![
                ConversationTurn::user("What is the deficit?"),
                ConversationTurn::assistant("Deficit is $40B"),
            ]
        );
    }

    #[test]
    fn test_parse_created_memory_with_epoch_timestamp() {
        let value = json!({
            "memory": {
                "id": "BudgetAgentMemory_20240416_090507-Xy12",
                "name": "BudgetAgentMemory_20240416_090507",
                "status": "CREATING",
                "createdAt": 1713258307.0
            }
        });

        let record = parse_memory(&value).unwrap();
        assert_eq!(record.id, "BudgetAgentMemory_20240416_090507-Xy12");
        assert_eq!(record.status, MemoryStatus::Creating);
        assert_eq!(record.created_at.map(|ts| ts.timestamp()), Some(1713258307));
    }

    #[test]
    fn test_default_strategies() {
        let strategies = default_strategies();
        let names: Vec<&str> = strategies.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["SessionSummarizer", "PreferenceLearner", "FactExtractor"]);
    }
}
