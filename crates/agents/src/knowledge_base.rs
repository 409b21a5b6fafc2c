//! Client for the managed vector knowledge base

use crate::http::{authorize, endpoint_url, json_or_service_error};
use crate::{AgentError, Result};
use async_trait::async_trait;
use budget_rag_core::RetrievalHit;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// How the knowledge base combines vector and keyword matching. Searches
/// always run hybrid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchType {
    Hybrid,
}

/// One retrieval query
#[derive(Debug, Clone, PartialEq)]
pub struct RetrieveRequest {
    pub query: String,
    pub number_of_results: usize,
    pub search_type: SearchType,
}

impl RetrieveRequest {
    /// Hybrid-mode request for `number_of_results` candidates
    pub fn hybrid(query: impl Into<String>, number_of_results: usize) -> Self {
        Self {
            query: query.into(),
            number_of_results,
            search_type: SearchType::Hybrid,
        }
    }
}

/// Retrieval contract. Hits may come back in any order.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    async fn retrieve(
        &self,
        knowledge_base_id: &str,
        request: &RetrieveRequest,
    ) -> Result<Vec<RetrievalHit>>;
}

/// Knowledge base reached through the `Retrieve` REST operation
#[derive(Clone)]
pub struct HttpKnowledgeBase {
    client: Client,
    endpoint: String,
    bearer_token: Option<String>,
}

impl HttpKnowledgeBase {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
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
impl KnowledgeBase for HttpKnowledgeBase {
    #[instrument(skip(self, request), fields(query = %request.query))]
    async fn retrieve(
        &self,
        knowledge_base_id: &str,
        request: &RetrieveRequest,
    ) -> Result<Vec<RetrievalHit>> {
        let url = endpoint_url(
            &self.endpoint,
            &["knowledgebases", knowledge_base_id, "retrieve"],
        )?;
        let body = RetrieveBody {
            retrieval_query: RetrievalQuery {
                text: &request.query,
            },
            retrieval_configuration: RetrievalConfiguration {
                vector_search_configuration: VectorSearchConfiguration {
                    number_of_results: request.number_of_results,
                    override_search_type: request.search_type,
                },
            },
        };

        let response = authorize(self.client.post(url), self.bearer_token.as_deref())
            .json(&body)
            .send()
            .await?;
        let value = json_or_service_error(response).await?;
        let parsed: RetrieveResponse = serde_json::from_value(value).map_err(|e| {
            AgentError::Processing(format!("Unexpected retrieve response: {}", e))
        })?;

        let hits: Vec<RetrievalHit> = parsed
            .retrieval_results
            .into_iter()
            .map(RetrievalResult::into_hit)
            .collect();
        debug!("Knowledge base returned {} hits", hits.len());

        Ok(hits)
    }
}

// ==========================================
// REQUEST/RESPONSE TYPES
// ==========================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveBody<'a> {
    retrieval_query: RetrievalQuery<'a>,
    retrieval_configuration: RetrievalConfiguration,
}

#[derive(Serialize)]
struct RetrievalQuery<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrievalConfiguration {
    vector_search_configuration: VectorSearchConfiguration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VectorSearchConfiguration {
    number_of_results: usize,
    override_search_type: SearchType,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveResponse {
    #[serde(default)]
    retrieval_results: Vec<RetrievalResult>,
}

#[derive(Debug, Deserialize)]
struct RetrievalResult {
    #[serde(default)]
    content: Option<ResultContent>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    location: Option<ResultLocation>,
}

impl RetrievalResult {
    fn into_hit(self) -> RetrievalHit {
        let content = self.content.map(|c| c.text).unwrap_or_default();
        let uri = self
            .location
            .and_then(|l| l.s3_location)
            .map(|s3| s3.uri)
            .unwrap_or_default();
        RetrievalHit::new(content, self.score.unwrap_or(0.0), uri)
    }
}

#[derive(Debug, Deserialize)]
struct ResultContent {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultLocation {
    #[serde(default)]
    s3_location: Option<S3Location>,
}

#[derive(Debug, Deserialize)]
struct S3Location {
    #[serde(default)]
    uri: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_shape() {
        let body = RetrieveBody {
            retrieval_query: RetrievalQuery { text: "carbon tax" },
            retrieval_configuration: RetrievalConfiguration {
                vector_search_configuration: VectorSearchConfiguration {
                    number_of_results: 5,
                    override_search_type: SearchType::Hybrid,
                },
            },
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "retrievalQuery": {"text": "carbon tax"},
                "retrievalConfiguration": {
                    "vectorSearchConfiguration": {
                        "numberOfResults": 5,
                        "overrideSearchType": "HYBRID"
                    }
                }
            })
        );
    }

    #[test]
    fn test_response_parsing_tolerates_missing_fields() {
        let parsed: RetrieveResponse = serde_json::from_value(json!({
            "retrievalResults": [
                {
                    "content": {"text": "Deficit projected at $40B"},
                    "score": 0.82,
                    "location": {"s3Location": {"uri": "s3://b/output/chunks/c1.json"}}
                },
                {"content": {"text": "no score or location"}}
            ]
        }))
        .unwrap();

        let hits: Vec<RetrievalHit> = parsed
            .retrieval_results
            .into_iter()
            .map(RetrievalResult::into_hit)
            .collect();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].source_uri, "s3://b/output/chunks/c1.json");
        assert_eq!(hits[0].score, 0.82);
        assert_eq!(hits[1].score, 0.0);
        assert_eq!(hits[1].source_uri, "");
    }

    #[test]
    fn test_empty_response() {
        let parsed: RetrieveResponse = serde_json::from_value(json!({})).unwrap();
        assert!(parsed.retrieval_results.is_empty());
    }
}
