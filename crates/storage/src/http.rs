//! HTTP client for an S3-compatible object store (path-style addressing)

use crate::{ObjectStore, Result, StorageError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, instrument};

/// Object store reached over plain HTTP.
///
/// Requests go to `{endpoint}/{bucket}/{key}`. Request signing is left to
/// whatever sits at the endpoint (a signing proxy, a local S3-compatible
/// server, or a bearer-token gateway).
#[derive(Clone)]
pub struct HttpObjectStore {
    client: Client,
    endpoint: String,
    bearer_token: Option<String>,
}

impl HttpObjectStore {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            bearer_token: None,
        }
    }

    /// Builder: authenticate every request with a bearer token
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn object_url(&self, bucket: &str, key: &str) -> Result<Url> {
        let mut url = Url::parse(self.endpoint.trim_end_matches('/'))
            .map_err(|e| StorageError::InvalidEndpoint(format!("{}: {}", self.endpoint, e)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StorageError::InvalidEndpoint(self.endpoint.clone()))?;
            segments.pop_if_empty().push(bucket);
            segments.extend(key.split('/'));
        }
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    #[instrument(skip(self))]
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let url = self.object_url(bucket, key)?;
        let response = self.request(reqwest::Method::GET, url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(bucket.into(), key.into())),
            status if status.is_success() => {
                let bytes = response.bytes().await?;
                debug!("Fetched {} bytes", bytes.len());
                Ok(bytes.to_vec())
            }
            status => Err(StorageError::Status {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    #[instrument(skip(self))]
    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        let url = self.object_url(bucket, key)?;
        let response = self.request(reqwest::Method::HEAD, url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(StorageError::Status {
                status: status.as_u16(),
                message: format!("HEAD s3://{}/{}", bucket, key),
            }),
        }
    }

    #[instrument(skip(self, body))]
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let url = self.object_url(bucket, key)?;
        let response = self
            .request(reqwest::Method::PUT, url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Status {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url_is_path_style() {
        let store = HttpObjectStore::new("https://s3.ca-central-1.amazonaws.com/");
        let url = store
            .object_url("budget", "input/gov_data/Budget 2024.pdf")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://s3.ca-central-1.amazonaws.com/budget/input/gov_data/Budget%202024.pdf"
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        let store = HttpObjectStore::new("not a url");
        assert!(store.object_url("b", "k").is_err());
    }
}
