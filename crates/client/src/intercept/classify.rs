//! Request classification.
//!
//! A pure function of method, destination, `Accept` and URL, evaluated in
//! fixed precedence:
//! 1. non-GET passes through
//! 2. same-origin path matching the static manifest is a core asset
//! 3. image sniffing (destination, `Accept`, extension), any origin
//! 4. other cross-origin requests pass through
//! 5. document destination or `Accept: text/html` is a navigation
//! 6. everything else same-origin is "other"

use crate::fetch::{Destination, Request, same_origin};
use reqwest::Method;
use serde::Serialize;
use url::Url;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "avif", "svg", "ico", "bmp"];

/// Which strategy family a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestClass {
    CoreAsset,
    Image,
    Navigation,
    Other,
}

/// Routing decision for an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Hand to the network untouched.
    Passthrough,
    Intercept(RequestClass),
}

/// Classify a request for a controller scoped to `origin`.
pub fn classify(request: &Request, origin: &Url, manifest: &[String]) -> Route {
    if request.method != Method::GET {
        return Route::Passthrough;
    }

    let in_scope = same_origin(&request.url, origin);

    if in_scope && manifest_matches(manifest, request.url.path()) {
        return Route::Intercept(RequestClass::CoreAsset);
    }

    if looks_like_image(request) {
        return Route::Intercept(RequestClass::Image);
    }

    if !in_scope {
        return Route::Passthrough;
    }

    if request.is_navigation() {
        return Route::Intercept(RequestClass::Navigation);
    }

    Route::Intercept(RequestClass::Other)
}

/// Exact path match, or prefix match for directory entries like `/static/`.
/// The root entry `/` only ever matches itself.
fn manifest_matches(manifest: &[String], path: &str) -> bool {
    manifest.iter().any(|entry| {
        if entry == path {
            return true;
        }
        entry.len() > 1 && entry.ends_with('/') && path.starts_with(entry.as_str())
    })
}

fn looks_like_image(request: &Request) -> bool {
    if request.destination == Destination::Image {
        return true;
    }

    if let Some(accept) = request.accept()
        && accept.trim_start().starts_with("image/")
    {
        return true;
    }

    request
        .url
        .path()
        .rsplit_once('.')
        .is_some_and(|(_, ext)| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}
