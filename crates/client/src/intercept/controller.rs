//! Controller instance: configuration, lifecycle and namespace plumbing.

use crate::fetch::{Network, Request, Response, ResponseSource, resolve};
use depot_core::cache::hash::compute_request_key;
use depot_core::{AppConfig, CacheDb, Error, StoreHandle};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use url::Url;

/// Settings for one controller version.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub version: String,
    pub origin: Url,
    pub precache_manifest: Vec<String>,
    pub root_document: String,
    pub max_dynamic_entries: usize,
    pub max_image_entries: usize,
}

impl ControllerConfig {
    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.origin)))?;
        Ok(Self {
            version: config.cache_version.clone(),
            origin,
            precache_manifest: config.precache_manifest.clone(),
            root_document: config.root_document.clone(),
            max_dynamic_entries: config.max_dynamic_entries,
            max_image_entries: config.max_image_entries,
        })
    }

    pub fn shell_namespace(&self) -> String {
        format!("depot-shell-{}", self.version)
    }

    pub fn dynamic_namespace(&self) -> String {
        format!("depot-dynamic-{}", self.version)
    }

    /// Where an install assembles the shell before swapping it in.
    pub fn staging_namespace(&self) -> String {
        format!("depot-staging-{}", self.version)
    }
}

/// Lifecycle state of a controller instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Installing,
    /// Installed and waiting to take over.
    Installed,
    Activating,
    Activated,
    /// Failed to install, or superseded by a newer instance.
    Redundant,
}

/// What a dynamic write stored; selects the eviction ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteKind {
    General,
    Image,
}

/// One version of the interception cache controller.
pub struct Controller {
    pub(crate) config: ControllerConfig,
    store: Arc<StoreHandle>,
    pub(crate) network: Arc<dyn Network>,
    state: RwLock<ControllerState>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller").field("version", &self.config.version).finish_non_exhaustive()
    }
}

impl Controller {
    pub fn new(config: ControllerConfig, db: CacheDb, network: Arc<dyn Network>) -> Self {
        Self::with_store(config, Arc::new(StoreHandle::from_db(db)), network)
    }

    /// Controller over a lazily opened store. If the store never opens,
    /// installs fail and lookups miss.
    pub fn with_store(config: ControllerConfig, store: Arc<StoreHandle>, network: Arc<dyn Network>) -> Self {
        Self { config, store, network, state: RwLock::new(ControllerState::Installing) }
    }

    /// Take over a complete shell left by an earlier run of the same
    /// version, without touching the network.
    ///
    /// Returns `None` unless every manifest path is present in the shell.
    pub async fn resume(
        config: ControllerConfig, store: Arc<StoreHandle>, network: Arc<dyn Network>,
    ) -> Result<Option<Self>, Error> {
        let controller = Self::with_store(config, store, network);
        if !controller.shell_complete().await? {
            return Ok(None);
        }

        *controller.state.write().await = ControllerState::Activated;
        tracing::info!(version = %controller.config.version, "controller resumed from persisted shell");
        Ok(Some(controller))
    }

    async fn shell_complete(&self) -> Result<bool, Error> {
        let db = self.db().await?;
        let shell = self.config.shell_namespace();
        for path in &self.config.precache_manifest {
            let key = compute_request_key("GET", self.resolve(path)?.as_str());
            if db.match_response(&shell, &key).await?.is_none() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub async fn state(&self) -> ControllerState {
        *self.state.read().await
    }

    pub(crate) async fn db(&self) -> Result<&CacheDb, Error> {
        self.store.db().await
    }

    /// Pre-cache every manifest path into the shell namespace.
    ///
    /// All paths are fetched first, then staged in a separate namespace and
    /// swapped into the shell in one transaction. A failure at any point
    /// leaves the existing shell untouched, so an instance already serving
    /// this version keeps working. On failure the instance becomes redundant.
    pub async fn install(&self) -> Result<(), Error> {
        {
            let state = self.state.read().await;
            if *state != ControllerState::Installing {
                return Err(Error::InvalidState(format!("cannot install from {:?}", *state)));
            }
        }

        let mut fetched = Vec::with_capacity(self.config.precache_manifest.len());
        for path in &self.config.precache_manifest {
            match self.precache_one(path).await {
                Ok(entry) => fetched.push(entry),
                Err(e) => return Err(self.abort_install(e).await),
            }
        }

        if let Err(e) = self.commit_shell(&fetched).await {
            return Err(self.abort_install(Error::InstallFailed(format!("storing shell: {e}"))).await);
        }

        *self.state.write().await = ControllerState::Installed;
        tracing::info!(version = %self.config.version, assets = fetched.len(), "controller installed");
        Ok(())
    }

    async fn precache_one(&self, path: &str) -> Result<(Request, Response), Error> {
        let url = self.resolve(path)?;
        let request = Request::get(url);
        let response = self
            .network
            .fetch(&request)
            .await
            .map_err(|e| Error::InstallFailed(format!("{path}: {e}")))?;

        if !response.is_success() {
            return Err(Error::InstallFailed(format!("{path}: status {}", response.status.as_u16())));
        }
        Ok((request, response))
    }

    async fn commit_shell(&self, fetched: &[(Request, Response)]) -> Result<(), Error> {
        let db = self.db().await?;
        let staging = self.config.staging_namespace();
        db.delete_namespace(&staging).await?;

        let mut keys = HashSet::new();
        for (request, response) in fetched {
            keys.insert(request.request_key());
            db.put_response(&staging, &response.to_cached(request)).await?;
        }

        if !db
            .replace_namespace(&staging, &self.config.shell_namespace(), keys.len() as u64)
            .await?
        {
            return Err(Error::InstallFailed("staged shell changed before it was committed".into()));
        }
        Ok(())
    }

    /// Only the staging namespace is discarded; the shell may belong to a
    /// live instance of the same version.
    async fn abort_install(&self, err: Error) -> Error {
        let staging = self.config.staging_namespace();
        let cleanup = match self.db().await {
            Ok(db) => db.delete_namespace(&staging).await.map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(cleanup) = cleanup {
            tracing::warn!(namespace = %staging, error = %cleanup, "failed to drop staged shell");
        }

        *self.state.write().await = ControllerState::Redundant;
        tracing::error!(version = %self.config.version, error = %err, "controller install aborted");
        err
    }

    /// Drop every namespace this version does not own, then mark active.
    ///
    /// Returns the number of namespaces removed.
    pub async fn activate(&self) -> Result<usize, Error> {
        {
            let mut state = self.state.write().await;
            if *state != ControllerState::Installed {
                return Err(Error::InvalidState(format!("cannot activate from {:?}", *state)));
            }
            *state = ControllerState::Activating;
        }

        match self.drop_foreign_namespaces().await {
            Ok(dropped) => {
                *self.state.write().await = ControllerState::Activated;
                tracing::info!(version = %self.config.version, dropped, "controller activated");
                Ok(dropped)
            }
            Err(e) => {
                *self.state.write().await = ControllerState::Installed;
                tracing::error!(version = %self.config.version, error = %e, "controller activation failed");
                Err(e)
            }
        }
    }

    async fn drop_foreign_namespaces(&self) -> Result<usize, Error> {
        let db = self.db().await?;
        let keep = [self.config.shell_namespace(), self.config.dynamic_namespace()];
        let mut dropped = 0;
        for namespace in db.list_namespaces().await? {
            if keep.contains(&namespace) {
                continue;
            }
            let entries = db.delete_namespace(&namespace).await?;
            tracing::debug!(namespace = %namespace, entries, "dropped stale namespace");
            dropped += 1;
        }
        Ok(dropped)
    }

    pub(crate) async fn mark_redundant(&self) {
        *self.state.write().await = ControllerState::Redundant;
        tracing::info!(version = %self.config.version, "controller superseded");
    }

    pub(crate) fn resolve(&self, path: &str) -> Result<Url, Error> {
        resolve(&self.config.origin, path).map_err(|e| Error::InvalidUrl(e.to_string()))
    }

    /// Namespace lookup where a storage failure counts as a miss.
    pub(crate) async fn lookup(&self, namespace: &str, request_key: &str, source: ResponseSource) -> Option<Response> {
        let found = match self.db().await {
            Ok(db) => db.match_response(namespace, request_key).await,
            Err(e) => Err(e),
        };
        let cached = match found {
            Ok(cached) => cached?,
            Err(e) => {
                tracing::warn!(namespace, error = %e, "namespace lookup failed; treating as miss");
                return None;
            }
        };

        match Response::from_cached(cached, source) {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!(namespace, error = %e, "unreadable cached response; treating as miss");
                None
            }
        }
    }

    /// Cached root document, shell first.
    pub(crate) async fn root_document(&self) -> Option<Response> {
        let url = match self.resolve(&self.config.root_document) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, "root document path does not resolve");
                return None;
            }
        };
        let key = compute_request_key("GET", url.as_str());

        if let Some(response) = self.lookup(&self.config.shell_namespace(), &key, ResponseSource::Shell).await {
            return Some(response);
        }
        self.lookup(&self.config.dynamic_namespace(), &key, ResponseSource::Dynamic).await
    }

    /// Store a copy in the dynamic namespace, then trim it to the ceiling
    /// for this kind of write. Failures are logged, never surfaced.
    pub(crate) async fn store_dynamic(&self, request: &Request, response: &Response, kind: WriteKind) {
        let db = match self.db().await {
            Ok(db) => db,
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "store unavailable; response not kept");
                return;
            }
        };

        let namespace = self.config.dynamic_namespace();
        if let Err(e) = db.put_response(&namespace, &response.to_cached(request)).await {
            tracing::warn!(url = %request.url, error = %e, "failed to store response");
            return;
        }

        let ceiling = match kind {
            WriteKind::General => self.config.max_dynamic_entries,
            WriteKind::Image => self.config.max_image_entries,
        };
        match db.trim_namespace(&namespace, ceiling).await {
            Ok(0) => {}
            Ok(evicted) => tracing::debug!(namespace = %namespace, evicted, ceiling, "trimmed dynamic namespace"),
            Err(e) => tracing::warn!(namespace = %namespace, error = %e, "failed to trim dynamic namespace"),
        }
    }
}
