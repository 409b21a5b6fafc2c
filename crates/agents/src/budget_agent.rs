//! Budget Agent - answers questions about budget documents with the search tool

use crate::memory::{MemoryService, MemorySession, DEFAULT_HISTORY_TURNS};
use crate::runtime::{ContentBlock, ConverseRequest, Message, ModelRuntime, StopReason, ToolSpec};
use crate::search::{SearchTool, TOOL_DESCRIPTION, TOOL_NAME};
use crate::{AgentError, Result};
use budget_rag_core::{ConversationTurn, Role};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

pub const AGENT_NAME: &str = "Canada Annual Budget Document Analyzer";

/// Model calls allowed per question before giving up
pub const MAX_TOOL_ROUNDS: usize = 5;

pub const SYSTEM_PROMPT: &str = "\
You are a government budget document analysis assistant with memory capabilities and visual grounding support.
You remember our conversations, user preferences, and important facts.

Your capabilities:
- Search and analyze budget documents from the knowledge base
- Provide visual grounding information showing exact locations in documents
- Display page numbers and bounding box coordinates when available
- Reference cropped chunk images that show specific document regions
- Remember user preferences and conversation history

IMPORTANT: When search results include visual grounding information, you MUST include:
- Page numbers where information was found
- Location coordinates showing the exact position on the page
- Image URLs that show the referenced region

Preserve these markers in your response. Do not summarize away the visual grounding details:
- **Page:** [number]
- **Bbox:** [coordinates]
- **Cropped Chunk Image:** [URL]

Always provide evidence-based insights from the documents, with visual references when available.";

#[derive(Default)]
struct Conversation {
    messages: Vec<Message>,
    restored: bool,
}

/// The budget document analyzer
pub struct BudgetAgent {
    runtime: Arc<dyn ModelRuntime>,
    search: SearchTool,
    model_id: String,
    memory: Option<(Arc<dyn MemoryService>, MemorySession)>,
    conversation: Mutex<Conversation>,
}

impl BudgetAgent {
    pub fn new(runtime: Arc<dyn ModelRuntime>, search: SearchTool, model_id: impl Into<String>) -> Self {
        Self {
            runtime,
            search,
            model_id: model_id.into(),
            memory: None,
            conversation: Mutex::new(Conversation::default()),
        }
    }

    /// Builder: persist and restore turns through a memory session
    pub fn with_memory(mut self, service: Arc<dyn MemoryService>, session: MemorySession) -> Self {
        self.memory = Some((service, session));
        self
    }

    pub fn name(&self) -> &str {
        AGENT_NAME
    }

    pub fn session(&self) -> Option<&MemorySession> {
        self.memory.as_ref().map(|(_, session)| session)
    }

    fn tool_spec() -> ToolSpec {
        ToolSpec {
            name: TOOL_NAME.to_string(),
            description: TOOL_DESCRIPTION.to_string(),
            input_schema: SearchTool::input_schema(),
        }
    }

    /// Answer one question. The conversation carries over between calls.
    #[instrument(skip(self))]
    pub async fn ask(&self, question: &str) -> Result<String> {
        let mut conversation = self.conversation.lock().await;
        if !conversation.restored {
            conversation.messages = self.restore_history().await;
            conversation.restored = true;
        }

        let checkpoint = conversation.messages.len();
        conversation.messages.push(Message::user_text(question));

        let answer = match self.run_tool_loop(&mut conversation.messages).await {
            Ok(answer) => answer,
            Err(e) => {
                conversation.messages.truncate(checkpoint);
                return Err(e);
            }
        };
        drop(conversation);

        self.remember(question, &answer).await;
        Ok(answer)
    }

    async fn run_tool_loop(&self, messages: &mut Vec<Message>) -> Result<String> {
        for round in 1..=MAX_TOOL_ROUNDS {
            let request = ConverseRequest {
                model_id: self.model_id.clone(),
                system: SYSTEM_PROMPT.to_string(),
                messages: messages.clone(),
                tools: vec![Self::tool_spec()],
            };
            let response = self.runtime.converse(&request).await?;
            let stop_reason = response.stop_reason;

            let calls: Vec<(String, String, Value)> = response
                .message
                .tool_uses()
                .into_iter()
                .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
                .collect();
            messages.push(response.message);

            if calls.is_empty() {
                if stop_reason == StopReason::MaxTokens {
                    warn!("Model reply cut off at the token limit");
                    return Err(AgentError::Processing(
                        "Model reply was truncated at the token limit".into(),
                    ));
                }
                info!("Answered after {} model call(s)", round);
                return Ok(messages.last().map(Message::text).unwrap_or_default());
            }

            debug!("Round {}: {} tool call(s)", round, calls.len());
            let mut results = Vec::with_capacity(calls.len());
            for (id, name, input) in calls {
                let (text, is_error) = self.call_tool(&name, &input).await;
                results.push(ContentBlock::ToolResult { id, text, is_error });
            }
            messages.push(Message {
                role: Role::User,
                content: results,
            });
        }

        Err(AgentError::Processing(format!(
            "No answer after {} tool rounds",
            MAX_TOOL_ROUNDS
        )))
    }

    /// Returns the tool output and whether it is an error
    async fn call_tool(&self, name: &str, input: &Value) -> (String, bool) {
        if name != TOOL_NAME {
            warn!("Model requested unknown tool: {}", name);
            return (format!("Unknown tool: {}", name), true);
        }
        match input.get("query").and_then(Value::as_str) {
            Some(query) if !query.trim().is_empty() => {
                (self.search.search_knowledge_base(query).await, false)
            }
            _ => ("Missing 'query' input".to_string(), true),
        }
    }

    async fn restore_history(&self) -> Vec<Message> {
        let Some((service, session)) = &self.memory else {
            return Vec::new();
        };

        match service.recent_turns(session, DEFAULT_HISTORY_TURNS).await {
            Ok(turns) => {
                let messages = history_messages(turns);
                info!("Restored {} messages from memory", messages.len());
                messages
            }
            Err(e) => {
                debug!("Could not restore history: {}", e);
                Vec::new()
            }
        }
    }

    async fn remember(&self, question: &str, answer: &str) {
        let Some((service, session)) = &self.memory else {
            return;
        };

        let turns = [ConversationTurn::user(question), ConversationTurn::assistant(answer)];
        if let Err(e) = service.append_turns(session, &turns).await {
            warn!("Failed to store conversation turns: {}", e);
        }
    }
}

/// Stored turns as model messages. The model expects the first message from
/// the user, so leading assistant turns are dropped.
fn history_messages(turns: Vec<ConversationTurn>) -> Vec<Message> {
    turns
        .into_iter()
        .skip_while(|turn| turn.role == Role::Assistant)
        .map(|turn| match turn.role {
            Role::User => Message::user_text(turn.text),
            Role::Assistant => Message::assistant_text(turn.text),
        })
        .collect()
}
