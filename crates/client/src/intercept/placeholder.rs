//! Synthesized image served when neither cache nor network can answer.

use crate::fetch::{Response, ResponseSource};
use reqwest::StatusCode;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, HeaderMap, HeaderValue};

pub const PLACEHOLDER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="200" viewBox="0 0 200 200"><rect width="200" height="200" fill="#e5e7eb"/><text x="100" y="105" text-anchor="middle" font-family="sans-serif" font-size="16" fill="#9ca3af">Offline</text></svg>"##;

/// The fixed placeholder response. Never stored in any namespace.
pub fn placeholder_image() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/svg+xml"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Response::new(StatusCode::OK, headers, PLACEHOLDER_SVG.as_bytes()).with_source(ResponseSource::Fallback)
}
