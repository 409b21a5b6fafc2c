//! Knowledge-base search tool with visual grounding
//!
//! One search retrieves candidates, resolves each back to its chunk record,
//! drops duplicates, attaches cropped page images to the survivors, and
//! renders everything into a single string for the agent. Every failure mode
//! ends up as text; the tool never returns an error to its caller.

pub mod dedup;
pub mod format;
pub mod resolver;

use crate::annotation::{AnnotationRequest, Annotator, DEFAULT_PADDING};
use crate::config::SearchSettings;
use crate::knowledge_base::{KnowledgeBase, RetrieveRequest};
use crate::Result;
use budget_rag_core::{sort_by_score, ResolvedHit};
use budget_rag_storage::ObjectStore;
use dedup::dedup_and_select;
use format::format_results;
use resolver::ChunkResolver;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Name the agent uses to call this tool
pub const TOOL_NAME: &str = "search_knowledge_base";

pub const TOOL_DESCRIPTION: &str =
    "Search the Bedrock knowledge base for relevant budget documents with visual grounding.";

pub const MISSING_KB_MESSAGE: &str =
    "Error: Knowledge base ID not configured. Please set BEDROCK_KB_ID environment variable.";

pub const MISSING_BUCKET_MESSAGE: &str =
    "Error: S3 bucket not configured. Please set S3_BUCKET environment variable.";

/// Coarse classification of a failed search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchFailure {
    KnowledgeBaseNotFound,
    Validation,
    Other,
}

impl SearchFailure {
    /// Classify by the upstream error text
    pub fn classify(detail: &str) -> Self {
        if detail.contains("ResourceNotFoundException") {
            SearchFailure::KnowledgeBaseNotFound
        } else if detail.contains("ValidationException") {
            SearchFailure::Validation
        } else {
            SearchFailure::Other
        }
    }

    /// User-facing message for this failure
    pub fn message(self, knowledge_base_id: &str, detail: &str) -> String {
        match self {
            SearchFailure::KnowledgeBaseNotFound => format!(
                "Error: Knowledge base {} not found. Please verify the BEDROCK_KB_ID is correct.",
                knowledge_base_id
            ),
            SearchFailure::Validation => {
                format!("Error: Invalid query or configuration. Details: {}", detail)
            }
            SearchFailure::Other => format!("Error searching knowledge base: {}", detail),
        }
    }
}

/// Message returned when nothing survives
pub fn no_documents_message(query: &str) -> String {
    format!(
        "No documents found for query: '{}'. The knowledge base may be empty or still processing.",
        query
    )
}

/// The search tool the budget agent calls
#[derive(Clone)]
pub struct SearchTool {
    knowledge_base: Arc<dyn KnowledgeBase>,
    store: Arc<dyn ObjectStore>,
    annotator: Option<Arc<dyn Annotator>>,
    settings: SearchSettings,
}

impl SearchTool {
    pub fn new(
        knowledge_base: Arc<dyn KnowledgeBase>,
        store: Arc<dyn ObjectStore>,
        settings: SearchSettings,
    ) -> Self {
        Self {
            knowledge_base,
            store,
            annotator: None,
            settings,
        }
    }

    /// Builder: enable cropped chunk images
    pub fn with_annotator(mut self, annotator: Arc<dyn Annotator>) -> Self {
        self.annotator = Some(annotator);
        self
    }

    /// JSON schema of the tool's input, as advertised to the model
    pub fn input_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to look for in the budget documents"
                }
            },
            "required": ["query"]
        })
    }

    /// Search and render results. Always returns text.
    #[instrument(skip(self))]
    pub async fn search_knowledge_base(&self, query: &str) -> String {
        let Some(knowledge_base_id) = self.settings.knowledge_base_id.as_deref() else {
            warn!("Search attempted without a knowledge base id");
            return MISSING_KB_MESSAGE.to_string();
        };
        let Some(bucket) = self.settings.bucket.as_deref() else {
            warn!("Search attempted without a bucket");
            return MISSING_BUCKET_MESSAGE.to_string();
        };

        match self.search(knowledge_base_id, bucket, query).await {
            Ok(Some(text)) => text,
            Ok(None) => no_documents_message(query),
            Err(e) => {
                let detail = e.to_string();
                warn!("Knowledge base search failed: {}", detail);
                SearchFailure::classify(&detail).message(knowledge_base_id, &detail)
            }
        }
    }

    /// Resolve, dedup and render. `None` when nothing survives.
    async fn search(
        &self,
        knowledge_base_id: &str,
        bucket: &str,
        query: &str,
    ) -> Result<Option<String>> {
        info!("Searching knowledge base for: {}", query);

        let request = RetrieveRequest::hybrid(query, self.settings.candidates);
        let mut hits = self.knowledge_base.retrieve(knowledge_base_id, &request).await?;
        sort_by_score(&mut hits);
        debug!("Retrieved {} candidates", hits.len());

        let resolver = ChunkResolver::new(self.store.as_ref(), bucket);
        let mut resolved = Vec::with_capacity(hits.len());
        for hit in hits {
            resolved.push(resolver.resolve(hit).await);
        }

        let selected = dedup_and_select(resolved, self.settings.max_results);
        if selected.is_empty() {
            info!("No results survived for: {}", query);
            return Ok(None);
        }

        let mut grounded = Vec::with_capacity(selected.len());
        for hit in selected {
            grounded.push(self.attach_image(bucket, hit).await);
        }

        info!("Returning {} results", grounded.len());
        Ok(Some(format_results(&grounded)))
    }

    /// Best effort: add a cropped page image when the source PDF is present
    async fn attach_image(&self, bucket: &str, hit: ResolvedHit) -> ResolvedHit {
        let Some(annotator) = &self.annotator else {
            return hit;
        };
        let (Some(chunk_id), Some(source_document)) =
            (hit.chunk_id.clone(), hit.source_document().map(str::to_string))
        else {
            return hit;
        };

        let source_pdf_key = self.settings.source_pdf_key(&source_document);
        match self.store.object_exists(bucket, &source_pdf_key).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("Source PDF {} not found, skipping image", source_pdf_key);
                return hit;
            }
            Err(e) => {
                debug!("Source PDF probe failed for {}: {}", source_pdf_key, e);
                return hit;
            }
        }

        let request = AnnotationRequest {
            bucket: bucket.to_string(),
            source_pdf_key,
            bbox: hit.bbox().map(<[f64]>::to_vec).unwrap_or_default(),
            page: hit.page().unwrap_or_default(),
            chunk_id,
            source_document,
            highlight: true,
            padding: DEFAULT_PADDING,
        };

        match annotator.annotate(&request).await {
            Ok(url) => hit.with_image(url),
            Err(e) => {
                debug!("Annotation unavailable for {}: {}", request.chunk_id, e);
                hit
            }
        }
    }
}
