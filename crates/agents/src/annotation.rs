//! Visual annotation provider - crops and highlights a chunk on its page

use crate::http::{authorize, endpoint_url, json_or_service_error};
use crate::{AgentError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::instrument;

/// Margin around the highlighted region, in pixels
pub const DEFAULT_PADDING: u32 = 10;

/// What to crop and from where
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationRequest {
    pub bucket: String,
    pub source_pdf_key: String,
    pub bbox: Vec<f64>,
    pub page: i64,
    pub chunk_id: String,
    pub source_document: String,
    pub highlight: bool,
    pub padding: u32,
}

/// Produces a URL for a cropped, highlighted chunk image
#[async_trait]
pub trait Annotator: Send + Sync {
    async fn annotate(&self, request: &AnnotationRequest) -> Result<String>;
}

/// Annotation service reached over HTTP (`POST {base}/annotate`)
#[derive(Clone)]
pub struct HttpAnnotator {
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpAnnotator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            bearer_token: None,
        }
    }

    /// Builder: authenticate with a bearer token
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

#[async_trait]
impl Annotator for HttpAnnotator {
    #[instrument(skip(self, request), fields(chunk_id = %request.chunk_id))]
    async fn annotate(&self, request: &AnnotationRequest) -> Result<String> {
        let url = endpoint_url(&self.base_url, &["annotate"])?;
        let response = authorize(self.client.post(url), self.bearer_token.as_deref())
            .json(request)
            .send()
            .await?;
        let value = json_or_service_error(response).await?;

        value
            .get("image_url")
            .and_then(|v| v.as_str())
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AgentError::Processing("Annotation response missing image_url".into()))
    }
}
