//! Chunk records - structured output of the document parser

use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// The kind of region a parsed chunk covers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum ChunkType {
    /// Running text
    Text,
    /// A table region
    Table,
    /// A figure, chart or image
    Figure,
    /// Headers, footers and page furniture
    Marginalia,
    /// Anything the parser emits that we don't model explicitly
    Other(String),
}

impl Default for ChunkType {
    fn default() -> Self {
        Self::Text
    }
}

impl From<String> for ChunkType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "text" => Self::Text,
            "table" => Self::Table,
            "figure" => Self::Figure,
            "marginalia" => Self::Marginalia,
            _ => Self::Other(value),
        }
    }
}

impl From<ChunkType> for String {
    fn from(value: ChunkType) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkType::Text => write!(f, "text"),
            ChunkType::Table => write!(f, "table"),
            ChunkType::Figure => write!(f, "figure"),
            ChunkType::Marginalia => write!(f, "marginalia"),
            ChunkType::Other(kind) => write!(f, "{}", kind),
        }
    }
}

fn default_page() -> Option<i64> {
    Some(0)
}

fn default_bbox() -> Option<Vec<f64>> {
    Some(vec![0.0, 0.0, 1.0, 1.0])
}

/// A parsed chunk as stored next to its source document.
///
/// Missing fields take their documented defaults. An explicit `null` for
/// `page` or `bbox` is kept as `None` so the result drops to a lower
/// presentation tier instead of showing made-up coordinates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkRecord {
    #[serde(default)]
    pub chunk_id: String,

    #[serde(default)]
    pub chunk_type: Option<ChunkType>,

    /// Page number within the source document
    #[serde(default = "default_page")]
    pub page: Option<i64>,

    /// Normalized `[x0, y0, x1, y1]` rectangle on the page
    #[serde(default = "default_bbox")]
    pub bbox: Option<Vec<f64>>,

    /// Source document name, without the `.pdf` extension
    #[serde(default)]
    pub source_document: String,

    #[serde(default)]
    pub text: Option<String>,
}

impl ChunkRecord {
    /// Parse a chunk record from the raw bytes of a storage object
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        if !value.is_object() {
            return Err(CoreError::InvalidChunk(
                "chunk record must be a JSON object".into(),
            ));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// The chunk identity, if the record carries a non-empty one
    pub fn identity(&self) -> Option<&str> {
        Some(self.chunk_id.as_str()).filter(|id| !id.is_empty())
    }

    /// The source document name, if present
    pub fn source(&self) -> Option<&str> {
        Some(self.source_document.as_str()).filter(|doc| !doc.is_empty())
    }

    pub fn kind(&self) -> ChunkType {
        self.chunk_type.clone().unwrap_or_default()
    }
}

/// Render a bounding box the way it appears in tool output: `[0.1, 0.2, 0.5, 0.6]`.
/// Empty or missing boxes render as `Not available`.
pub fn format_bbox(bbox: Option<&[f64]>) -> String {
    match bbox {
        Some(coords) if !coords.is_empty() => {
            let parts: Vec<String> = coords.iter().map(|c| c.to_string()).collect();
            format!("[{}]", parts.join(", "))
        }
        _ => "Not available".to_string(),
    }
}
