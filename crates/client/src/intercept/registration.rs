//! Registration: which controller is active, which is waiting, and how many
//! clients are open.

use super::controller::{Controller, ControllerConfig, ControllerState};
use super::message::ControlMessage;
use crate::fetch::{Network, Request, Response};
use depot_core::{CacheDb, Error, StoreHandle};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct Slots {
    active: Option<Arc<Controller>>,
    waiting: Option<Arc<Controller>>,
    clients: usize,
}

/// Owns the controller instances sharing one database.
pub struct Registration {
    store: Arc<StoreHandle>,
    network: Arc<dyn Network>,
    slots: Mutex<Slots>,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration").finish_non_exhaustive()
    }
}

/// Snapshot of one controller instance.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerSummary {
    pub version: String,
    pub state: ControllerState,
    pub shell_entries: u64,
    pub dynamic_entries: u64,
}

/// Snapshot of the registration.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationStatus {
    pub active: Option<ControllerSummary>,
    pub waiting: Option<ControllerSummary>,
    pub clients: usize,
}

impl Registration {
    pub fn new(db: CacheDb, network: Arc<dyn Network>) -> Self {
        Self::with_store(Arc::new(StoreHandle::from_db(db)), network)
    }

    /// Registration over a lazily opened store. Requests still reach the
    /// network when the store cannot be opened.
    pub fn with_store(store: Arc<StoreHandle>, network: Arc<dyn Network>) -> Self {
        Self { store, network, slots: Mutex::new(Slots::default()) }
    }

    /// Activate a version from a shell already persisted by an earlier run.
    ///
    /// Does nothing when a controller is already active or the persisted
    /// shell is incomplete. Returns whether a controller was restored.
    pub async fn restore(&self, config: ControllerConfig) -> Result<bool, Error> {
        let mut slots = self.slots.lock().await;
        if slots.active.is_some() {
            return Ok(false);
        }

        let Some(controller) = Controller::resume(config, Arc::clone(&self.store), Arc::clone(&self.network)).await?
        else {
            return Ok(false);
        };
        slots.active = Some(Arc::new(controller));
        Ok(true)
    }

    /// Install a new controller version.
    ///
    /// On success the instance waits, replacing any older waiting instance,
    /// and activates at once when nothing is active or no clients are open.
    /// On failure the registration is left untouched.
    pub async fn register(&self, config: ControllerConfig) -> Result<Arc<Controller>, Error> {
        let controller = Arc::new(Controller::with_store(config, Arc::clone(&self.store), Arc::clone(&self.network)));
        controller.install().await?;

        let mut slots = self.slots.lock().await;
        if let Some(previous) = slots.waiting.replace(Arc::clone(&controller)) {
            previous.mark_redundant().await;
        }

        if slots.active.is_none() || slots.clients == 0 {
            promote(&mut slots).await?;
        } else {
            tracing::info!(version = controller.version(), clients = slots.clients, "controller waiting for clients to close");
        }
        Ok(controller)
    }

    /// Handle a control message. Returns whether a waiting instance was
    /// activated.
    pub async fn post_message(&self, message: ControlMessage) -> Result<bool, Error> {
        match message {
            ControlMessage::SkipWaiting => {
                let mut slots = self.slots.lock().await;
                if slots.waiting.is_none() {
                    tracing::debug!("SKIP_WAITING with no waiting controller");
                    return Ok(false);
                }
                promote(&mut slots).await?;
                Ok(true)
            }
        }
    }

    pub async fn client_opened(&self) -> usize {
        let mut slots = self.slots.lock().await;
        slots.clients += 1;
        slots.clients
    }

    /// Closing the last client activates a waiting instance.
    pub async fn client_closed(&self) -> Result<usize, Error> {
        let mut slots = self.slots.lock().await;
        slots.clients = slots.clients.saturating_sub(1);
        if slots.clients == 0 && slots.waiting.is_some() {
            promote(&mut slots).await?;
        }
        Ok(slots.clients)
    }

    pub async fn active(&self) -> Option<Arc<Controller>> {
        self.slots.lock().await.active.clone()
    }

    pub async fn waiting(&self) -> Option<Arc<Controller>> {
        self.slots.lock().await.waiting.clone()
    }

    /// Route a request through the active controller, or straight to the
    /// network when none is active.
    pub async fn fetch(&self, request: Request) -> Result<Response, Error> {
        match self.active().await {
            Some(controller) => controller.handle_fetch(request).await,
            None => self.network.fetch(&request).await,
        }
    }

    pub async fn status(&self) -> Result<RegistrationStatus, Error> {
        let (active, waiting, clients) = {
            let slots = self.slots.lock().await;
            (slots.active.clone(), slots.waiting.clone(), slots.clients)
        };

        Ok(RegistrationStatus {
            active: match active {
                Some(c) => Some(self.summarize(&c).await?),
                None => None,
            },
            waiting: match waiting {
                Some(c) => Some(self.summarize(&c).await?),
                None => None,
            },
            clients,
        })
    }

    async fn summarize(&self, controller: &Controller) -> Result<ControllerSummary, Error> {
        let config = controller.config();
        let db = self.store.db().await?;
        Ok(ControllerSummary {
            version: config.version.clone(),
            state: controller.state().await,
            shell_entries: db.count_responses(&config.shell_namespace()).await?,
            dynamic_entries: db.count_responses(&config.dynamic_namespace()).await?,
        })
    }
}

/// Activate the waiting instance; the previous active one becomes redundant.
async fn promote(slots: &mut Slots) -> Result<(), Error> {
    let Some(next) = slots.waiting.take() else {
        return Ok(());
    };

    if let Err(e) = next.activate().await {
        slots.waiting = Some(next);
        return Err(e);
    }

    if let Some(previous) = slots.active.replace(next) {
        previous.mark_redundant().await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::ResponseSource;
    use crate::test_support::{ORIGIN, ScriptedNetwork, test_config};
    use depot_core::store::StoreTarget;
    use url::Url;

    async fn registration(network: Arc<ScriptedNetwork>) -> (Registration, CacheDb) {
        let db = CacheDb::open_in_memory().await.unwrap();
        (Registration::new(db.clone(), network), db)
    }

    fn page(path: &str) -> Request {
        Request::navigate(Url::parse(&format!("{ORIGIN}{path}")).unwrap())
    }

    #[tokio::test]
    async fn test_first_register_activates() {
        let network = Arc::new(ScriptedNetwork::with_shell());
        let (registration, _db) = registration(network).await;

        let controller = registration.register(test_config("v1")).await.unwrap();
        assert_eq!(controller.state().await, ControllerState::Activated);
        assert!(registration.waiting().await.is_none());
        assert_eq!(registration.active().await.unwrap().version(), "v1");
    }

    #[tokio::test]
    async fn test_new_version_waits_while_clients_open() {
        let network = Arc::new(ScriptedNetwork::with_shell());
        let (registration, db) = registration(network).await;
        registration.register(test_config("v1")).await.unwrap();
        registration.client_opened().await;

        let v2 = registration.register(test_config("v2")).await.unwrap();
        assert_eq!(v2.state().await, ControllerState::Installed);
        assert_eq!(registration.active().await.unwrap().version(), "v1");
        assert!(db.list_namespaces().await.unwrap().contains(&"depot-shell-v1".to_string()));
    }

    #[tokio::test]
    async fn test_last_client_closing_activates_waiting() {
        let network = Arc::new(ScriptedNetwork::with_shell());
        let (registration, db) = registration(network).await;
        let v1 = registration.register(test_config("v1")).await.unwrap();
        registration.client_opened().await;
        registration.client_opened().await;
        registration.register(test_config("v2")).await.unwrap();

        assert_eq!(registration.client_closed().await.unwrap(), 1);
        assert_eq!(registration.active().await.unwrap().version(), "v1");

        assert_eq!(registration.client_closed().await.unwrap(), 0);
        assert_eq!(registration.active().await.unwrap().version(), "v2");
        assert_eq!(v1.state().await, ControllerState::Redundant);
        assert_eq!(db.list_namespaces().await.unwrap(), vec!["depot-shell-v2"]);
    }

    #[tokio::test]
    async fn test_skip_waiting_activates_immediately() {
        let network = Arc::new(ScriptedNetwork::with_shell());
        let (registration, _db) = registration(network).await;
        registration.register(test_config("v1")).await.unwrap();
        registration.client_opened().await;
        registration.register(test_config("v2")).await.unwrap();

        let activated = registration.post_message(ControlMessage::SkipWaiting).await.unwrap();
        assert!(activated);
        assert_eq!(registration.active().await.unwrap().version(), "v2");
        assert!(registration.waiting().await.is_none());
    }

    #[tokio::test]
    async fn test_skip_waiting_without_waiting_is_noop() {
        let network = Arc::new(ScriptedNetwork::with_shell());
        let (registration, _db) = registration(network).await;
        registration.register(test_config("v1")).await.unwrap();

        assert!(!registration.post_message(ControlMessage::SkipWaiting).await.unwrap());
        assert_eq!(registration.active().await.unwrap().version(), "v1");
    }

    #[tokio::test]
    async fn test_newer_waiting_supersedes_older_waiting() {
        let network = Arc::new(ScriptedNetwork::with_shell());
        let (registration, _db) = registration(network).await;
        registration.register(test_config("v1")).await.unwrap();
        registration.client_opened().await;
        let v2 = registration.register(test_config("v2")).await.unwrap();
        registration.register(test_config("v3")).await.unwrap();

        assert_eq!(v2.state().await, ControllerState::Redundant);
        assert_eq!(registration.waiting().await.unwrap().version(), "v3");
    }

    #[tokio::test]
    async fn test_failed_install_keeps_previous_active() {
        let network = Arc::new(ScriptedNetwork::with_shell());
        let (registration, db) = registration(network.clone()).await;
        registration.register(test_config("v1")).await.unwrap();
        network.fail("https://app.example.com/manifest.json");

        let result = registration.register(test_config("v2")).await;
        assert!(matches!(result, Err(Error::InstallFailed(_))));
        assert_eq!(registration.active().await.unwrap().version(), "v1");
        assert!(registration.waiting().await.is_none());
        assert!(!db.list_namespaces().await.unwrap().contains(&"depot-shell-v2".to_string()));
    }

    #[tokio::test]
    async fn test_fetch_without_controller_goes_to_network() {
        let network = Arc::new(ScriptedNetwork::with_shell());
        let (registration, db) = registration(network.clone()).await;

        let response = registration.fetch(page("/index.html")).await.unwrap();
        assert_eq!(response.source, ResponseSource::Network);
        assert_eq!(network.call_count(), 1);
        assert!(db.list_namespaces().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_routes_through_active_controller() {
        let network = Arc::new(ScriptedNetwork::with_shell());
        let (registration, _db) = registration(network.clone()).await;
        registration.register(test_config("v1")).await.unwrap();
        network.set_offline(true);

        let response = registration.fetch(page("/loads/42")).await.unwrap();
        assert_eq!(response.source, ResponseSource::Shell);
        assert_eq!(response.body.as_ref(), b"<html>shell</html>");
    }

    #[tokio::test]
    async fn test_status_reports_both_instances() {
        let network = Arc::new(ScriptedNetwork::with_shell());
        let (registration, _db) = registration(network).await;
        registration.register(test_config("v1")).await.unwrap();
        registration.client_opened().await;
        registration.register(test_config("v2")).await.unwrap();

        let status = registration.status().await.unwrap();
        let active = status.active.unwrap();
        let waiting = status.waiting.unwrap();
        assert_eq!(active.version, "v1");
        assert_eq!(active.state, ControllerState::Activated);
        assert_eq!(active.shell_entries, 5);
        assert_eq!(waiting.version, "v2");
        assert_eq!(waiting.state, ControllerState::Installed);
        assert_eq!(status.clients, 1);
    }

    #[tokio::test]
    async fn test_failed_reinstall_of_active_version_keeps_shell() {
        let network = Arc::new(ScriptedNetwork::with_shell());
        let (registration, db) = registration(network.clone()).await;
        registration.register(test_config("v1")).await.unwrap();
        assert_eq!(db.count_responses("depot-shell-v1").await.unwrap(), 5);

        network.fail("https://app.example.com/manifest.json");
        let result = registration.register(test_config("v1")).await;
        assert!(matches!(result, Err(Error::InstallFailed(_))));
        assert_eq!(db.count_responses("depot-shell-v1").await.unwrap(), 5);
        assert!(!db.list_namespaces().await.unwrap().contains(&"depot-staging-v1".to_string()));

        network.set_offline(true);
        let asset = Request::get(Url::parse(&format!("{ORIGIN}/static/js/main.js")).unwrap());
        let response = registration.fetch(asset).await.unwrap();
        assert_eq!(response.source, ResponseSource::Shell);
        assert_eq!(response.body.as_ref(), b"console.log('app')");
    }

    #[tokio::test]
    async fn test_restore_serves_persisted_shell_offline() {
        let network = Arc::new(ScriptedNetwork::with_shell());
        let (first, db) = registration(network.clone()).await;
        first.register(test_config("v1")).await.unwrap();

        network.set_offline(true);
        let restarted = Registration::new(db, network.clone());
        assert!(restarted.restore(test_config("v1")).await.unwrap());
        assert!(!restarted.restore(test_config("v1")).await.unwrap());

        let response = restarted.fetch(page("/loads/7")).await.unwrap();
        assert_eq!(response.source, ResponseSource::Shell);
        assert_eq!(restarted.active().await.unwrap().state().await, ControllerState::Activated);
    }

    #[tokio::test]
    async fn test_restore_skips_incomplete_shell() {
        let network = Arc::new(ScriptedNetwork::with_shell());
        let (registration, _db) = registration(network.clone()).await;

        assert!(!registration.restore(test_config("v1")).await.unwrap());
        assert!(registration.active().await.is_none());
        assert_eq!(network.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_store_still_reaches_network() {
        let network = Arc::new(ScriptedNetwork::with_shell());
        let store = Arc::new(StoreHandle::new(StoreTarget::File("/dev/null/depot.sqlite".into())));
        let registration = Registration::with_store(store, network.clone());

        assert!(registration.register(test_config("v1")).await.is_err());
        assert!(registration.restore(test_config("v1")).await.is_err());
        assert!(registration.active().await.is_none());

        let response = registration.fetch(page("/index.html")).await.unwrap();
        assert_eq!(response.source, ResponseSource::Network);
        assert_eq!(response.body.as_ref(), b"<html>shell</html>");

        let status = registration.status().await.unwrap();
        assert!(status.active.is_none());
        assert_eq!(status.clients, 0);
    }
}
