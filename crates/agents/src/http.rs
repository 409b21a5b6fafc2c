//! Shared plumbing for the managed-service HTTP clients

use crate::{AgentError, Result};
use reqwest::{RequestBuilder, Response, Url};
use serde_json::Value;

/// Join `segments` onto `base`, percent-encoding each one
pub(crate) fn endpoint_url(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base.trim_end_matches('/'))
        .map_err(|e| AgentError::Config(format!("Invalid endpoint {}: {}", base, e)))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| AgentError::Config(format!("Endpoint {} cannot carry a path", base)))?;
        path.pop_if_empty().extend(segments);
    }
    Ok(url)
}

pub(crate) fn authorize(builder: RequestBuilder, bearer_token: Option<&str>) -> RequestBuilder {
    match bearer_token {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    }
}

/// Return the body of a successful response, or the service error it carries
pub(crate) async fn json_or_service_error(response: Response) -> Result<Value> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<Value>().await?);
    }

    let header_type = response
        .headers()
        .get("x-amzn-errortype")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(':').next().unwrap_or(v).to_string());
    let body = response.text().await.unwrap_or_default();
    Err(service_error(status.as_u16(), header_type, &body))
}

/// Build an [`AgentError::Service`] from an error status, an optional
/// `x-amzn-ErrorType` header value, and the raw response body.
pub(crate) fn service_error(status: u16, header_type: Option<String>, body: &str) -> AgentError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    let error_type = header_type
        .filter(|t| !t.is_empty())
        .or_else(|| {
            parsed.as_ref().and_then(|v| {
                v.get("__type")
                    .or_else(|| v.get("code"))
                    .and_then(|t| t.as_str())
                    .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
            })
        })
        .unwrap_or_else(|| format!("HTTP {}", status));

    let message = parsed
        .as_ref()
        .and_then(|v| v.get("message").or_else(|| v.get("Message")))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string());

    AgentError::Service { error_type, message }
}
