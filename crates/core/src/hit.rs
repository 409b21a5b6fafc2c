//! Retrieval hits and their resolved form

use crate::chunk::ChunkRecord;
use serde::{Deserialize, Serialize};

/// Number of leading characters hashed for the fallback dedup key
pub const FINGERPRINT_CHARS: usize = 200;

/// One candidate returned by the knowledge base
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalHit {
    /// Inline text snippet
    pub content: String,
    /// Relevance score, higher is better
    pub score: f64,
    /// Where the indexed document lives (e.g. `s3://bucket/key`)
    pub source_uri: String,
}

impl RetrievalHit {
    pub fn new(content: impl Into<String>, score: f64, source_uri: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            score,
            source_uri: source_uri.into(),
        }
    }

    /// Last path segment of the source URI, or `Unknown source`
    pub fn file_name(&self) -> &str {
        if self.source_uri.is_empty() {
            return "Unknown source";
        }
        self.source_uri.rsplit('/').next().unwrap_or_default()
    }

    /// Whether the URI points at a structured chunk record
    pub fn references_chunk_record(&self) -> bool {
        self.file_name().ends_with(".json") && self.source_uri.contains("chunks")
    }
}

/// Stable sort, highest score first. Ties keep the retriever's order.
pub fn sort_by_score(hits: &mut [RetrievalHit]) {
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Identity used to suppress duplicates within one search
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    ChunkId(String),
    Fingerprint(String),
}

impl DedupKey {
    /// Fingerprint of the first [`FINGERPRINT_CHARS`] characters of `content`
    pub fn fingerprint(content: &str) -> Self {
        let end = content
            .char_indices()
            .nth(FINGERPRINT_CHARS)
            .map(|(idx, _)| idx)
            .unwrap_or(content.len());
        Self::Fingerprint(blake3::hash(content[..end].as_bytes()).to_hex().to_string())
    }
}

/// A hit annotated with whatever chunk metadata could be determined
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedHit {
    pub hit: RetrievalHit,
    /// Record fetched from storage, when the URI pointed at one
    pub chunk: Option<ChunkRecord>,
    /// Chunk identity, from the record or from a markdown marker
    pub chunk_id: Option<String>,
    /// Cropped and highlighted page image
    pub image_url: Option<String>,
}

impl ResolvedHit {
    /// A hit with no chunk metadata
    pub fn unresolved(hit: RetrievalHit) -> Self {
        Self {
            hit,
            chunk: None,
            chunk_id: None,
            image_url: None,
        }
    }

    /// A hit backed by a structured chunk record
    pub fn from_record(hit: RetrievalHit, record: ChunkRecord) -> Self {
        let chunk_id = record.identity().map(str::to_string);
        Self {
            hit,
            chunk: Some(record),
            chunk_id,
            image_url: None,
        }
    }

    /// Builder: attach a chunk identity found in the hit text
    pub fn with_chunk_id(mut self, chunk_id: impl Into<String>) -> Self {
        self.chunk_id = Some(chunk_id.into()).filter(|id: &String| !id.is_empty());
        self
    }

    /// Builder: attach an annotation image
    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Text shown to the caller: the record's own text, else the raw snippet
    pub fn display_content(&self) -> &str {
        self.chunk
            .as_ref()
            .and_then(|c| c.text.as_deref())
            .unwrap_or(&self.hit.content)
    }

    pub fn page(&self) -> Option<i64> {
        self.chunk.as_ref().and_then(|c| c.page)
    }

    pub fn bbox(&self) -> Option<&[f64]> {
        self.chunk.as_ref().and_then(|c| c.bbox.as_deref())
    }

    pub fn source_document(&self) -> Option<&str> {
        self.chunk.as_ref().and_then(|c| c.source())
    }

    /// Source document name, falling back to the URI's file name
    pub fn source_label(&self) -> &str {
        self.source_document().unwrap_or_else(|| self.hit.file_name())
    }

    pub fn dedup_key(&self) -> DedupKey {
        match &self.chunk_id {
            Some(id) => DedupKey::ChunkId(id.clone()),
            None => DedupKey::fingerprint(self.display_content()),
        }
    }
}
