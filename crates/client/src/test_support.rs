//! Scripted network and fixtures shared by the controller tests.

use crate::fetch::{Network, Request, Response};
use crate::intercept::ControllerConfig;
use async_trait::async_trait;
use depot_core::Error;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use url::Url;

pub(crate) const ORIGIN: &str = "https://app.example.com";

/// Network double answering from a routing table.
///
/// Unknown URLs answer 404. Failing URLs, or every URL while offline,
/// produce a transport error.
#[derive(Debug, Default)]
pub(crate) struct ScriptedNetwork {
    routes: Mutex<HashMap<String, (u16, String, Vec<u8>)>>,
    failing: Mutex<HashSet<String>>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl ScriptedNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Routes for every path in [`test_config`]'s manifest.
    pub(crate) fn with_shell() -> Self {
        let network = Self::new();
        network.route(&format!("{ORIGIN}/"), 200, "text/html", "<html>shell</html>");
        network.route(&format!("{ORIGIN}/index.html"), 200, "text/html", "<html>shell</html>");
        network.route(&format!("{ORIGIN}/manifest.json"), 200, "application/json", r#"{"name":"app"}"#);
        network.route(&format!("{ORIGIN}/static/js/main.js"), 200, "text/javascript", "console.log('app')");
        network.route(&format!("{ORIGIN}/static/css/main.css"), 200, "text/css", "body{}");
        network
    }

    pub(crate) fn route(&self, url: &str, status: u16, content_type: &str, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, content_type.to_string(), body.as_bytes().to_vec()));
    }

    pub(crate) fn fail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| u.as_str() == url).count()
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let url = request.url.as_str().to_string();
        self.calls.lock().unwrap().push(url.clone());

        if self.offline.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(&url) {
            return Err(Error::Network(format!("{url}: connection refused")));
        }

        let route = self.routes.lock().unwrap().get(&url).cloned();
        let (status, content_type, body) = route.unwrap_or((404, "text/plain".into(), b"not found".to_vec()));

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(&content_type).unwrap());
        Ok(Response::new(StatusCode::from_u16(status).unwrap(), headers, body))
    }
}

pub(crate) fn test_config(version: &str) -> ControllerConfig {
    ControllerConfig {
        version: version.to_string(),
        origin: Url::parse(ORIGIN).unwrap(),
        precache_manifest: ["/", "/index.html", "/manifest.json", "/static/js/main.js", "/static/css/main.css"]
            .into_iter()
            .map(String::from)
            .collect(),
        root_document: "/index.html".into(),
        max_dynamic_entries: 5,
        max_image_entries: 8,
    }
}
