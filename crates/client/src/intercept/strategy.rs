//! Per-request strategies.

use super::classify::{RequestClass, Route, classify};
use super::controller::{Controller, WriteKind};
use super::placeholder::placeholder_image;
use crate::fetch::{Request, Response, ResponseSource};
use depot_core::Error;
use std::sync::Arc;

impl Controller {
    /// Answer an intercepted request according to its class.
    pub async fn handle_fetch(self: &Arc<Self>, request: Request) -> Result<Response, Error> {
        let route = classify(&request, &self.config.origin, &self.config.precache_manifest);
        tracing::trace!(url = %request.url, ?route, "intercepted request");

        match route {
            Route::Passthrough => self.network.fetch(&request).await,
            Route::Intercept(RequestClass::CoreAsset) => self.cache_first(&request).await,
            Route::Intercept(RequestClass::Image) => self.cache_first_then_refresh(request).await,
            Route::Intercept(RequestClass::Navigation) => self.network_first(&request, true).await,
            Route::Intercept(RequestClass::Other) => self.network_first(&request, false).await,
        }
    }

    /// Shell hit, else network (copied into dynamic on success). When the
    /// network fails, that dynamic copy answers; a navigation with no copy
    /// falls back to the root document.
    async fn cache_first(&self, request: &Request) -> Result<Response, Error> {
        let key = request.request_key();
        if let Some(hit) = self.lookup(&self.config.shell_namespace(), &key, ResponseSource::Shell).await {
            return Ok(hit);
        }

        let err = match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.store_dynamic(request, &response, WriteKind::General).await;
                }
                return Ok(response);
            }
            Err(e) => e,
        };

        if let Some(copy) = self.lookup(&self.config.dynamic_namespace(), &key, ResponseSource::Dynamic).await {
            tracing::debug!(url = %request.url, error = %err, "core asset offline; serving dynamic copy");
            return Ok(copy);
        }
        if request.is_navigation() {
            tracing::debug!(url = %request.url, error = %err, "core asset offline; trying root document");
            return self.root_document().await.ok_or(err);
        }
        Err(err)
    }

    /// Dynamic hit is returned at once while a detached fetch refreshes it.
    /// On a miss the network answers, and the placeholder covers failure.
    async fn cache_first_then_refresh(self: &Arc<Self>, request: Request) -> Result<Response, Error> {
        let key = request.request_key();
        if let Some(hit) = self.lookup(&self.config.dynamic_namespace(), &key, ResponseSource::Dynamic).await {
            self.spawn_refresh(request);
            return Ok(hit);
        }

        match self.network.fetch(&request).await {
            Ok(response) => {
                if response.is_success() {
                    self.store_dynamic(&request, &response, WriteKind::Image).await;
                }
                Ok(response)
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "image unavailable; serving placeholder");
                Ok(placeholder_image())
            }
        }
    }

    /// Fire-and-forget refresh of a cached image. Never awaited; every
    /// outcome is absorbed here.
    fn spawn_refresh(self: &Arc<Self>, request: Request) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            match this.network.fetch(&request).await {
                Ok(response) if response.is_success() => {
                    this.store_dynamic(&request, &response, WriteKind::Image).await;
                }
                Ok(response) => {
                    tracing::debug!(url = %request.url, status = response.status.as_u16(), "refresh not stored");
                }
                Err(e) => {
                    tracing::debug!(url = %request.url, error = %e, "background refresh failed");
                }
            }
        });
    }

    /// Network, else dynamic, else (navigation only) the root document.
    async fn network_first(&self, request: &Request, root_fallback: bool) -> Result<Response, Error> {
        let err = match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.store_dynamic(request, &response, WriteKind::General).await;
                }
                return Ok(response);
            }
            Err(e) => e,
        };

        let key = request.request_key();
        if let Some(hit) = self.lookup(&self.config.dynamic_namespace(), &key, ResponseSource::Dynamic).await {
            tracing::debug!(url = %request.url, error = %err, "network failed; served from dynamic namespace");
            return Ok(hit);
        }

        if root_fallback && let Some(root) = self.root_document().await {
            tracing::debug!(url = %request.url, error = %err, "network failed; served root document");
            return Ok(root);
        }

        Err(err)
    }
}
