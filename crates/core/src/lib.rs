//! Core domain types for the budget RAG assistant
//! 
//! This crate defines the data that flows through one knowledge-base search:
//! retrieval hits, the chunk records they resolve to, dedup keys, and the
//! memory records used to give the agent conversational state.

pub mod hit;
pub mod chunk;
pub mod markdown;
pub mod memory;
pub mod error;

pub use hit::{sort_by_score, DedupKey, ResolvedHit, RetrievalHit, FINGERPRINT_CHARS};
pub use chunk::{format_bbox, ChunkRecord, ChunkType};
pub use markdown::extract_chunk_id;
pub use memory::{ConversationTurn, MemoryRecord, MemoryStatus, MemoryStrategy, Role};
pub use error::{CoreError, Result};
