//! Common test utilities - in-memory stand-ins for the managed services

#![allow(dead_code)]

use async_trait::async_trait;
use budget_rag_agents::{
    AgentError, AnnotationRequest, Annotator, ContentBlock, ConverseRequest, ConverseResponse,
    KnowledgeBase, MemoryService, MemorySession, Message, ModelRuntime, Result, RetrieveRequest,
    SearchSettings, SearchTool, StopReason,
};
use budget_rag_core::{
    ConversationTurn, MemoryRecord, MemoryStatus, MemoryStrategy, RetrievalHit, Role,
};
use budget_rag_storage::MemoryObjectStore;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const BUCKET: &str = "budget-docs";
pub const KB_ID: &str = "KB12345";

/// Knowledge base returning a fixed hit list
#[derive(Default)]
pub struct ScriptedKnowledgeBase {
    hits: Vec<RetrievalHit>,
    requests: Mutex<Vec<RetrieveRequest>>,
}

impl ScriptedKnowledgeBase {
    pub fn new(hits: Vec<RetrievalHit>) -> Self {
        Self {
            hits,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<RetrieveRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl KnowledgeBase for ScriptedKnowledgeBase {
    async fn retrieve(
        &self,
        _knowledge_base_id: &str,
        request: &RetrieveRequest,
    ) -> Result<Vec<RetrievalHit>> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.hits.clone())
    }
}

/// Knowledge base that always fails with a service error
pub struct FailingKnowledgeBase {
    pub error_type: String,
    pub message: String,
}

impl FailingKnowledgeBase {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error_type: error_type.to_string(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl KnowledgeBase for FailingKnowledgeBase {
    async fn retrieve(
        &self,
        _knowledge_base_id: &str,
        _request: &RetrieveRequest,
    ) -> Result<Vec<RetrievalHit>> {
        Err(AgentError::Service {
            error_type: self.error_type.clone(),
            message: self.message.clone(),
        })
    }
}

/// Annotator recording its requests; fails every call when `failing`
#[derive(Default)]
pub struct RecordingAnnotator {
    failing: bool,
    requests: Mutex<Vec<AnnotationRequest>>,
}

impl RecordingAnnotator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<AnnotationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Annotator for RecordingAnnotator {
    async fn annotate(&self, request: &AnnotationRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        if self.failing {
            return Err(AgentError::Processing("annotation service unavailable".into()));
        }
        Ok(format!("https://images.example/{}.png", request.chunk_id))
    }
}

/// Chunk record JSON as the parser writes it
pub fn chunk_json(chunk_id: &str, page: i64, source_document: &str, text: &str) -> Vec<u8> {
    serde_json::json!({
        "chunk_id": chunk_id,
        "chunk_type": "text",
        "page": page,
        "bbox": [0.1, 0.2, 0.6, 0.4],
        "source_document": source_document,
        "text": text,
    })
    .to_string()
    .into_bytes()
}

/// Chunk record key for `chunk_id`
pub fn chunk_key(chunk_id: &str) -> String {
    format!("output/budget_chunks/{}.json", chunk_id)
}

/// A hit pointing at the chunk record for `chunk_id`
pub fn chunk_hit(chunk_id: &str, score: f64) -> RetrievalHit {
    RetrievalHit::new(
        format!("raw snippet for {}", chunk_id),
        score,
        format!("s3://{}/{}", BUCKET, chunk_key(chunk_id)),
    )
}

/// Store holding chunk records and, for `with_pdfs`, their source PDFs
pub fn seeded_store(chunks: &[(&str, i64, &str, &str)], with_pdfs: bool) -> MemoryObjectStore {
    let store = MemoryObjectStore::new();
    for (chunk_id, page, source_document, text) in chunks {
        store.insert(BUCKET, &chunk_key(chunk_id), chunk_json(chunk_id, *page, source_document, text));
        if with_pdfs {
            store.insert(
                BUCKET,
                &format!("input/gov_data/{}.pdf", source_document),
                b"%PDF-1.7".to_vec(),
            );
        }
    }
    store
}

pub fn settings() -> SearchSettings {
    SearchSettings::new(KB_ID, BUCKET)
}

pub fn search_tool(
    knowledge_base: Arc<dyn KnowledgeBase>,
    store: MemoryObjectStore,
    annotator: Option<Arc<dyn Annotator>>,
) -> SearchTool {
    let tool = SearchTool::new(knowledge_base, Arc::new(store), settings());
    match annotator {
        Some(annotator) => tool.with_annotator(annotator),
        None => tool,
    }
}

/// Model runtime replaying canned responses and recording requests
#[derive(Default)]
pub struct ScriptedRuntime {
    responses: Mutex<VecDeque<ConverseResponse>>,
    requests: Mutex<Vec<ConverseRequest>>,
}

impl ScriptedRuntime {
    pub fn new(responses: Vec<ConverseResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ConverseRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelRuntime for ScriptedRuntime {
    async fn converse(&self, request: &ConverseRequest) -> Result<ConverseResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AgentError::Processing("runtime script exhausted".into()))
    }
}

pub fn text_reply(text: &str) -> ConverseResponse {
    ConverseResponse {
        message: Message::assistant_text(text),
        stop_reason: StopReason::EndTurn,
    }
}

pub fn tool_reply(id: &str, name: &str, input: Value) -> ConverseResponse {
    ConverseResponse {
        message: Message {
            role: Role::Assistant,
            content: vec![ContentBlock::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                input,
            }],
        },
        stop_reason: StopReason::ToolUse,
    }
}

/// Memory service kept in process
#[derive(Default)]
pub struct InMemoryMemoryService {
    pub memories: Mutex<Vec<MemoryRecord>>,
    pub turns: Mutex<Vec<ConversationTurn>>,
    pub created: Mutex<Vec<(String, Vec<MemoryStrategy>)>>,
    /// `get_memory` calls that report CREATING before ACTIVE
    pub creating_polls: AtomicUsize,
    pub fail_create: bool,
    pub fail_append: bool,
}

impl InMemoryMemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memories(memories: Vec<MemoryRecord>) -> Self {
        Self {
            memories: Mutex::new(memories),
            ..Self::default()
        }
    }

    pub fn stored_turns(&self) -> Vec<ConversationTurn> {
        self.turns.lock().unwrap().clone()
    }
}

#[async_trait]
impl MemoryService for InMemoryMemoryService {
    async fn list_memories(&self) -> Result<Vec<MemoryRecord>> {
        Ok(self.memories.lock().unwrap().clone())
    }

    async fn create_memory(
        &self,
        name: &str,
        _description: &str,
        strategies: &[MemoryStrategy],
    ) -> Result<MemoryRecord> {
        if self.fail_create {
            return Err(AgentError::Service {
                error_type: "AccessDeniedException".into(),
                message: "not allowed".into(),
            });
        }
        self.created
            .lock()
            .unwrap()
            .push((name.to_string(), strategies.to_vec()));
        let record = MemoryRecord::new(format!("{}-abc123", name)).with_status(MemoryStatus::Creating);
        self.memories.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn get_memory(&self, memory_id: &str) -> Result<MemoryRecord> {
        let remaining = self.creating_polls.load(Ordering::SeqCst);
        let status = if remaining > 0 {
            self.creating_polls.store(remaining - 1, Ordering::SeqCst);
            MemoryStatus::Creating
        } else {
            MemoryStatus::Active
        };
        Ok(MemoryRecord::new(memory_id).with_status(status))
    }

    async fn append_turns(
        &self,
        _session: &MemorySession,
        turns: &[ConversationTurn],
    ) -> Result<()> {
        if self.fail_append {
            return Err(AgentError::Processing("event store offline".into()));
        }
        self.turns.lock().unwrap().extend_from_slice(turns);
        Ok(())
    }

    async fn recent_turns(
        &self,
        _session: &MemorySession,
        max_turns: usize,
    ) -> Result<Vec<ConversationTurn>> {
        let turns = self.turns.lock().unwrap();
        let skip = turns.len().saturating_sub(max_turns);
        Ok(turns[skip..].to_vec())
    }
}
