//! Memory types - conversational state kept by the managed memory service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a memory resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemoryStatus {
    Creating,
    Active,
    Failed,
    #[serde(other)]
    Unknown,
}

impl Default for MemoryStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

/// A memory resource as listed by the service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub status: MemoryStatus,

    /// Epoch seconds on the wire; RFC 3339 strings are accepted too
    #[serde(default, with = "epoch_seconds")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Timestamps as the memory service sends them: integer or fractional epoch
/// seconds, or an RFC 3339 string
mod epoch_seconds {
    use chrono::{DateTime, Utc};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Seconds(f64),
        Text(String),
    }

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.map(|ts| ts.timestamp()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<RawTimestamp>::deserialize(deserializer)? {
            None => Ok(None),
            Some(RawTimestamp::Seconds(secs)) => {
                let whole = secs.floor();
                let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
                DateTime::from_timestamp(whole as i64, nanos)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {}", secs)))
            }
            Some(RawTimestamp::Text(text)) => DateTime::parse_from_rfc3339(&text)
                .map(|ts| Some(ts.with_timezone(&Utc)))
                .map_err(D::Error::custom),
        }
    }
}

impl MemoryRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            status: MemoryStatus::Unknown,
            created_at: None,
        }
    }

    /// Builder: set status
    pub fn with_status(mut self, status: MemoryStatus) -> Self {
        self.status = status;
        self
    }

    /// Builder: set creation time
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == MemoryStatus::Active
    }
}

/// Extraction strategies attached to a memory resource.
///
/// Serializes in the service's wire shape, e.g.
/// `{"summaryMemoryStrategy": {"name": "...", "namespaces": [...]}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MemoryStrategy {
    /// Rolling summary per session
    SummaryMemoryStrategy { name: String, namespaces: Vec<String> },
    /// Learned user preferences per actor
    UserPreferenceMemoryStrategy { name: String, namespaces: Vec<String> },
    /// Extracted facts per actor
    SemanticMemoryStrategy { name: String, namespaces: Vec<String> },
}

impl MemoryStrategy {
    pub fn name(&self) -> &str {
        match self {
            MemoryStrategy::SummaryMemoryStrategy { name, .. }
            | MemoryStrategy::UserPreferenceMemoryStrategy { name, .. }
            | MemoryStrategy::SemanticMemoryStrategy { name, .. } => name,
        }
    }
}

/// Who spoke a conversation turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One stored conversation turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strategy_wire_shape() {
        let strategy = MemoryStrategy::SummaryMemoryStrategy {
            name: "SessionSummarizer".into(),
            namespaces: vec!["/summaries/{actorId}/{sessionId}".into()],
        };
        let value = serde_json::to_value(&strategy).unwrap();
        assert_eq!(
            value,
            json!({
                "summaryMemoryStrategy": {
                    "name": "SessionSummarizer",
                    "namespaces": ["/summaries/{actorId}/{sessionId}"]
                }
            })
        );
        assert_eq!(strategy.name(), "SessionSummarizer");
    }

    #[test]
    fn test_memory_record_parsing() {
        let record: MemoryRecord = serde_json::from_value(json!({
            "id": "BudgetAgentMemory_20240101_120000-abc",
            "status": "ACTIVE",
            "createdAt": "2024-01-01T12:00:00Z"
        }))
        .unwrap();

        assert!(record.is_active());
        assert!(record.created_at.is_some());

        let record: MemoryRecord =
            serde_json::from_value(json!({"id": "m", "status": "SOMETHING_NEW"})).unwrap();
        assert_eq!(record.status, MemoryStatus::Unknown);
        assert!(record.created_at.is_none());
    }

    #[test]
    fn test_listing_with_epoch_timestamps() {
        let memories: Vec<MemoryRecord> = serde_json::from_value(json!([
            {
                "id": "BudgetAgentMemory_20240416_090507-Xy12",
                "arn": "arn:aws:bedrock-agentcore:ca-central-1:123:memory/BudgetAgentMemory_20240416_090507-Xy12",
                "status": "ACTIVE",
                "createdAt": 1713258307.25,
                "updatedAt": 1713258400.0
            },
            {
                "id": "BudgetAgentMemory_20240101_000000-Ab34",
                "status": "CREATING",
                "createdAt": 1704067200
            }
        ]))
        .unwrap();

        let first = memories[0].created_at.unwrap();
        assert_eq!(first.timestamp(), 1713258307);
        assert_eq!(first.timestamp_subsec_millis(), 250);
        assert_eq!(memories[1].created_at.unwrap().timestamp(), 1704067200);
        assert!(memories[0].created_at > memories[1].created_at);
    }

    #[test]
    fn test_created_at_serializes_as_epoch_seconds() {
        let record = MemoryRecord::new("m")
            .with_created_at(DateTime::from_timestamp(1704067200, 0).unwrap());
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["createdAt"], 1704067200);

        let back: MemoryRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back.created_at, record.created_at);
    }
}
