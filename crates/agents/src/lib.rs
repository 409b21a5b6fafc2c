//! Agents and service clients for the budget RAG assistant
//!
//! This crate contains:
//! - Search: the knowledge-base search tool with visual grounding
//! - Budget Agent: the tool-using question answering loop
//! - Memory: conversational memory bootstrap and sessions
//! - Handler: the API entry point

pub mod annotation;
pub mod budget_agent;
pub mod config;
pub mod error;
pub mod handler;
mod http;
pub mod knowledge_base;
pub mod memory;
pub mod runtime;
pub mod search;

pub use annotation::{AnnotationRequest, Annotator, HttpAnnotator};
pub use budget_agent::BudgetAgent;
pub use config::{SearchSettings, ServiceSettings};
pub use error::{AgentError, Result};
pub use handler::{handle_event, ApiResponse, Responder};
pub use knowledge_base::{HttpKnowledgeBase, KnowledgeBase, RetrieveRequest, SearchType};
pub use memory::{setup_memory, HttpMemoryService, MemoryBootstrap, MemoryService, MemorySession};
pub use runtime::{
    ContentBlock, ConverseRequest, ConverseResponse, HttpModelRuntime, Message, ModelRuntime,
    StopReason, ToolSpec,
};
pub use search::{SearchFailure, SearchTool};
