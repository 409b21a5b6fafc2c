//! Environment-driven settings for the search tool and service clients

const DEFAULT_REGION: &str = "ca-central-1";
const DEFAULT_MODEL_ID: &str = "anthropic.claude-3-5-sonnet-20240620-v1:0";

/// Most results a search ever returns
pub const DEFAULT_MAX_RESULTS: usize = 2;
/// Candidates requested from the knowledge base per search
pub const DEFAULT_CANDIDATES: usize = 5;
/// Where source PDFs live in the bucket
pub const DEFAULT_SOURCE_PDF_PREFIX: &str = "input/gov_data/";

/// Read a variable, treating unset and blank the same
fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_or_default(key: &str, default: &str) -> String {
    env_non_empty(key).unwrap_or_else(|| default.to_string())
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

/// Settings consumed by [`crate::SearchTool`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSettings {
    /// Knowledge-base identifier (`BEDROCK_KB_ID`)
    pub knowledge_base_id: Option<String>,
    /// Bucket holding chunk records and source PDFs (`S3_BUCKET`)
    pub bucket: Option<String>,
    pub max_results: usize,
    pub candidates: usize,
    pub source_pdf_prefix: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            knowledge_base_id: None,
            bucket: None,
            max_results: DEFAULT_MAX_RESULTS,
            candidates: DEFAULT_CANDIDATES,
            source_pdf_prefix: DEFAULT_SOURCE_PDF_PREFIX.to_string(),
        }
    }
}

impl SearchSettings {
    pub fn new(knowledge_base_id: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            knowledge_base_id: Some(knowledge_base_id.into()),
            bucket: Some(bucket.into()),
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        Self {
            knowledge_base_id: env_non_empty("BEDROCK_KB_ID"),
            bucket: env_non_empty("S3_BUCKET"),
            max_results: env_usize("SEARCH_MAX_RESULTS", DEFAULT_MAX_RESULTS),
            candidates: env_usize("SEARCH_CANDIDATES", DEFAULT_CANDIDATES),
            source_pdf_prefix: env_or_default("SOURCE_PDF_PREFIX", DEFAULT_SOURCE_PDF_PREFIX),
        }
    }

    /// Builder: override the result cap
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Builder: override the candidate count
    pub fn with_candidates(mut self, candidates: usize) -> Self {
        self.candidates = candidates;
        self
    }

    /// Key of the PDF a chunk was parsed from
    pub fn source_pdf_key(&self, source_document: &str) -> String {
        format!("{}{}.pdf", self.source_pdf_prefix, source_document)
    }
}

/// Endpoints and credentials for the managed services
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub region: String,
    pub model_id: String,
    pub bearer_token: Option<String>,
    pub knowledge_base_endpoint: String,
    pub runtime_endpoint: String,
    pub memory_endpoint: String,
    pub memory_control_endpoint: String,
    pub storage_endpoint: String,
    /// Annotation service; visual grounding images are skipped when unset
    pub annotation_url: Option<String>,
}

impl ServiceSettings {
    pub fn from_env() -> Self {
        let region = env_or_default("AWS_REGION", DEFAULT_REGION);
        Self {
            model_id: env_or_default("BEDROCK_MODEL_ID", DEFAULT_MODEL_ID),
            bearer_token: env_non_empty("AWS_BEARER_TOKEN_BEDROCK"),
            knowledge_base_endpoint: env_or_default(
                "KB_ENDPOINT",
                &format!("https://bedrock-agent-runtime.{}.amazonaws.com", region),
            ),
            runtime_endpoint: env_or_default(
                "RUNTIME_ENDPOINT",
                &format!("https://bedrock-runtime.{}.amazonaws.com", region),
            ),
            memory_endpoint: env_or_default(
                "MEMORY_ENDPOINT",
                &format!("https://bedrock-agentcore.{}.amazonaws.com", region),
            ),
            memory_control_endpoint: env_or_default(
                "MEMORY_CONTROL_ENDPOINT",
                &format!("https://bedrock-agentcore-control.{}.amazonaws.com", region),
            ),
            storage_endpoint: env_or_default(
                "S3_ENDPOINT",
                &format!("https://s3.{}.amazonaws.com", region),
            ),
            annotation_url: env_non_empty("ANNOTATION_URL"),
            region,
        }
    }
}
