//! offline_fetch tool implementation.
//!
//! Routes a request through the registration, so the active controller's
//! strategies decide whether it is served from a namespace or the network.

use super::json_result;
use crate::error::ToolError;
use depot_client::fetch::resolve;
use depot_client::{Destination, Registration, Request};
use depot_core::Error;
use reqwest::Method;
use reqwest::header::{ACCEPT, HeaderValue};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// Input parameters for offline_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OfflineFetchParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// HTTP method (default: GET). Anything but GET bypasses the caches.
    #[serde(default = "default_method")]
    pub method: String,

    /// Request destination: document, image, script, style, font, manifest.
    #[serde(default)]
    pub destination: Option<String>,

    /// Optional Accept header.
    #[serde(default)]
    pub accept: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for offline_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OfflineFetchOutput {
    pub url: String,
    pub status: u16,
    /// Which tier answered: network, shell, dynamic or fallback.
    pub source: String,
    pub content_type: Option<String>,
    /// Body as text, when it is valid UTF-8.
    pub body: Option<String>,
    pub body_bytes: usize,
}

/// Implementation of the offline_fetch tool.
pub async fn fetch_impl(
    registration: &Registration, origin: &Url, params: OfflineFetchParams,
) -> Result<CallToolResult, McpError> {
    let request = build_request(origin, &params)?;
    let url = request.url.to_string();

    let response = registration.fetch(request).await?;
    tracing::debug!(url = %url, status = response.status.as_u16(), source = response.source.as_str(), "offline_fetch");

    let output = OfflineFetchOutput {
        url,
        status: response.status.as_u16(),
        source: response.source.as_str().to_string(),
        content_type: response.content_type().map(str::to_string),
        body: std::str::from_utf8(&response.body).ok().map(str::to_string),
        body_bytes: response.body.len(),
    };
    json_result(&output)
}

fn build_request(origin: &Url, params: &OfflineFetchParams) -> Result<Request, McpError> {
    let url = resolve(origin, &params.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", params.url)))?;

    let method = Method::from_bytes(params.method.trim().to_uppercase().as_bytes())
        .map_err(|_| ToolError::InvalidInput(format!("invalid method: {}", params.method)))?;

    let mut request = Request::new(method, url);

    if let Some(destination) = &params.destination {
        let destination: Destination = serde_json::from_value(serde_json::Value::String(destination.to_lowercase()))
            .map_err(|_| ToolError::InvalidInput(format!("unknown destination: {destination}")))?;
        request = request.with_destination(destination);
    }

    if let Some(accept) = &params.accept {
        let value = HeaderValue::from_str(accept)
            .map_err(|_| ToolError::InvalidInput(format!("invalid Accept header: {accept}")))?;
        request = request.with_header(ACCEPT, value);
    }

    Ok(request)
}
