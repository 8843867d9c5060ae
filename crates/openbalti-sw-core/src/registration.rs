//! Page-side registration of the worker.
//!
//! A registration owns at most one active and one waiting worker, all
//! sharing one cache storage, network and client registry. Registering a new
//! version installs it; it takes over immediately when nothing is active or
//! it asked to skip waiting, and otherwise waits until `skip_waiting` is
//! called. A failed install leaves the current worker in charge.

use std::sync::Arc;

use tracing::info;

use crate::cache::CacheStorage;
use crate::clients::ClientRegistry;
use crate::config::WorkerConfig;
use crate::error::{NetworkError, WorkerError};
use crate::models::{ControlMessage, Message, Request, Response};
use crate::network::Network;
use crate::worker::{ActivationReport, FetchOutcome, MessageOutcome, ServiceWorker};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The new worker is active and controls every open client
    Activated(ActivationReport),
    /// Installed, waiting for `skip_waiting`
    Waiting,
    /// Same version already active; nothing installed
    Unchanged,
}

pub struct Registration {
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    clients: Arc<ClientRegistry>,
    active: Option<Arc<ServiceWorker>>,
    waiting: Option<Arc<ServiceWorker>>,
}

impl Registration {
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        clients: Arc<ClientRegistry>,
    ) -> Self {
        Self {
            storage,
            network,
            clients,
            active: None,
            waiting: None,
        }
    }

    /// Adopt a worker that is already activated (e.g. restored from disk).
    pub fn with_active(mut self, worker: ServiceWorker) -> Self {
        self.active = Some(Arc::new(worker));
        self
    }

    pub fn active(&self) -> Option<&Arc<ServiceWorker>> {
        self.active.as_ref()
    }

    pub fn waiting(&self) -> Option<&Arc<ServiceWorker>> {
        self.waiting.as_ref()
    }

    pub fn active_version(&self) -> Option<&str> {
        self.active.as_deref().map(ServiceWorker::version)
    }

    pub fn update_available(&self) -> bool {
        self.waiting.is_some()
    }

    pub fn clients(&self) -> &Arc<ClientRegistry> {
        &self.clients
    }

    /// Install a worker for `config` and promote it when allowed.
    pub async fn register(&mut self, config: WorkerConfig) -> Result<RegisterOutcome, WorkerError> {
        if self.active_version() == Some(config.version.as_str()) {
            return Ok(RegisterOutcome::Unchanged);
        }

        let worker = Arc::new(ServiceWorker::new(
            config,
            self.storage.clone(),
            self.network.clone(),
            self.clients.clone(),
        ));
        worker.install().await?;

        if self.active.is_none() || worker.skip_waiting_requested() {
            let report = self.promote(worker).await?;
            Ok(RegisterOutcome::Activated(report))
        } else {
            info!(version = %worker.version(), "New worker waiting");
            if let Some(previous) = self.waiting.replace(worker) {
                previous.mark_redundant();
            }
            Ok(RegisterOutcome::Waiting)
        }
    }

    /// Tell the waiting worker to skip waiting and activate it.
    pub async fn skip_waiting(&mut self) -> Result<Option<ActivationReport>, WorkerError> {
        let Some(worker) = self.waiting.take() else {
            return Ok(None);
        };
        worker
            .handle_message(Message::new(ControlMessage::SkipWaiting))
            .await?;
        self.promote(worker).await.map(Some)
    }

    async fn promote(
        &mut self,
        worker: Arc<ServiceWorker>,
    ) -> Result<ActivationReport, WorkerError> {
        let report = match worker.activate().await {
            Ok(report) => report,
            Err(e) => {
                self.waiting = Some(worker);
                return Err(e);
            }
        };
        if let Some(previous) = self.active.replace(worker) {
            previous.mark_redundant();
        }
        Ok(report)
    }

    /// Fetch through the active worker, or straight from the network when
    /// there is none or it does not intercept the request.
    pub async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        if let Some(worker) = &self.active {
            if let FetchOutcome::Respond(response) = worker.handle_fetch(request).await {
                return Ok(response);
            }
        }
        self.network.fetch(request).await
    }

    /// Post a message to the active worker. `None` when nothing is active.
    pub async fn post_message(
        &self,
        message: Message,
    ) -> Result<Option<MessageOutcome>, WorkerError> {
        match &self.active {
            Some(worker) => worker.handle_message(message).await.map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStorage;
    use crate::network::MockNetwork;
    use crate::worker::WorkerState;
    use url::Url;

    fn config(version: &str) -> WorkerConfig {
        WorkerConfig::new(Url::parse("https://openbalti.com").unwrap()).with_version(version)
    }

    fn registration() -> (Registration, Arc<MockNetwork>) {
        let network = Arc::new(MockNetwork::new());
        for path in &config("v4.0.0").essential_files {
            let url = config("v4.0.0").resolve(path).unwrap();
            network.respond_text(url.as_str(), 200, path);
        }
        let registration = Registration::new(
            Arc::new(MemoryCacheStorage::new()),
            network.clone(),
            Arc::new(ClientRegistry::new()),
        );
        (registration, network)
    }

    #[tokio::test]
    async fn test_first_register_activates() {
        let (mut registration, _) = registration();
        let outcome = registration.register(config("v4.0.0")).await.unwrap();
        assert!(matches!(outcome, RegisterOutcome::Activated(_)));
        assert_eq!(registration.active_version(), Some("v4.0.0"));
        assert!(!registration.update_available());

        let again = registration.register(config("v4.0.0")).await.unwrap();
        assert_eq!(again, RegisterOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_update_replaces_active_worker() {
        let (mut registration, _) = registration();
        registration.register(config("v4.0.0")).await.unwrap();
        let old = registration.active().unwrap().clone();

        let outcome = registration.register(config("v4.1.0")).await.unwrap();
        match outcome {
            RegisterOutcome::Activated(report) => {
                assert!(report.deleted.contains(&"openbalti-static-v4.0.0".to_string()));
            }
            other => panic!("expected activation, got {:?}", other),
        }
        assert_eq!(old.state(), WorkerState::Redundant);
        assert_eq!(registration.active_version(), Some("v4.1.0"));
    }

    #[tokio::test]
    async fn test_worker_waits_without_skip_waiting() {
        let (mut registration, _) = registration();
        registration.register(config("v4.0.0")).await.unwrap();

        let mut next = config("v4.1.0");
        next.skip_waiting_on_install = false;
        assert_eq!(registration.register(next).await.unwrap(), RegisterOutcome::Waiting);
        assert!(registration.update_available());
        assert_eq!(registration.active_version(), Some("v4.0.0"));

        let report = registration.skip_waiting().await.unwrap();
        assert!(report.is_some());
        assert_eq!(registration.active_version(), Some("v4.1.0"));
        assert!(!registration.update_available());
        assert!(registration.skip_waiting().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_install_keeps_current_worker() {
        let (mut registration, network) = registration();
        registration.register(config("v4.0.0")).await.unwrap();

        network.fail("https://openbalti.com/");
        assert!(registration.register(config("v4.1.0")).await.is_err());
        assert_eq!(registration.active_version(), Some("v4.0.0"));
    }

    #[tokio::test]
    async fn test_fetch_without_active_worker_uses_network() {
        let (registration, network) = registration();
        let request = Request::get(Url::parse("https://openbalti.com/logo.png").unwrap());

        let response = registration.fetch(&request).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(network.call_count("https://openbalti.com/logo.png"), 1);
        assert!(registration
            .post_message(Message::new(ControlMessage::GetVersion))
            .await
            .unwrap()
            .is_none());
    }
}
