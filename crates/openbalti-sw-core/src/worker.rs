//! The offline cache worker.
//!
//! A `ServiceWorker` is built for one cache version and goes through
//! `Parsed -> Installing -> Installed -> Activating -> Activated`, or ends up
//! `Redundant` when install fails or a newer worker replaces it.
//!
//! Events reach it through `dispatch`, which maps each `WorkerEvent` to its
//! handler. Handlers take `&self`, so one worker can serve concurrent fetches
//! from many tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::cache::CacheStorage;
use crate::clients::ClientRegistry;
use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::models::{ClientMessage, ControlMessage, Message, MessageReply, Request, Response};
use crate::network::Network;
use crate::router::should_intercept;
use crate::strategy::{self, FetchContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

/// Names of the events a worker handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Install,
    Activate,
    Fetch,
    Message,
}

impl EventKind {
    pub fn name(self) -> &'static str {
        match self {
            EventKind::Install => "install",
            EventKind::Activate => "activate",
            EventKind::Fetch => "fetch",
            EventKind::Message => "message",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "install" => Some(EventKind::Install),
            "activate" => Some(EventKind::Activate),
            "fetch" => Some(EventKind::Fetch),
            "message" => Some(EventKind::Message),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
    Message(Message),
}

impl WorkerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            WorkerEvent::Install => EventKind::Install,
            WorkerEvent::Activate => EventKind::Activate,
            WorkerEvent::Fetch(_) => EventKind::Fetch,
            WorkerEvent::Message(_) => EventKind::Message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Respond(Response),
    /// Not intercepted; the host fetches from the network itself
    Passthrough,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    /// Namespaces deleted because they belong to other versions
    pub deleted: Vec<String>,
    pub claimed: usize,
    pub notified: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    SkipWaiting,
    Version(String),
    ForceUpdated { deleted: usize, reloaded: usize },
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Installed,
    Activated(ActivationReport),
    Fetch(FetchOutcome),
    Message(MessageOutcome),
}

pub struct ServiceWorker {
    config: WorkerConfig,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    clients: Arc<ClientRegistry>,
    state: Mutex<WorkerState>,
    skip_waiting: AtomicBool,
}

impl ServiceWorker {
    pub fn new(
        config: WorkerConfig,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        clients: Arc<ClientRegistry>,
    ) -> Self {
        Self {
            config,
            storage,
            network,
            clients,
            state: Mutex::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
        }
    }

    /// A worker that was installed and activated by an earlier run over the
    /// same storage.
    pub fn resume_active(
        config: WorkerConfig,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        clients: Arc<ClientRegistry>,
    ) -> Self {
        let worker = Self::new(config, storage, network, clients);
        worker.set_state(WorkerState::Activated);
        worker
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn clients(&self) -> &Arc<ClientRegistry> {
        &self.clients
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: WorkerState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Move `from -> to` atomically, or fail without changing anything.
    fn transition(
        &self,
        event: EventKind,
        from: WorkerState,
        to: WorkerState,
    ) -> Result<(), WorkerError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state != from {
            return Err(WorkerError::InvalidTransition {
                event: event.name(),
                state: *state,
            });
        }
        *state = to;
        Ok(())
    }

    pub(crate) fn mark_redundant(&self) {
        self.set_state(WorkerState::Redundant);
    }

    /// Ask to be activated without waiting for open clients to go away.
    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    fn fetch_context(&self) -> FetchContext<'_> {
        FetchContext {
            config: &self.config,
            storage: &*self.storage,
            network: &*self.network,
        }
    }

    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome, WorkerError> {
        debug!(event = event.kind().name(), version = %self.config.version, "Dispatching event");
        match event {
            WorkerEvent::Install => self.install().await.map(|()| EventOutcome::Installed),
            WorkerEvent::Activate => self.activate().await.map(EventOutcome::Activated),
            WorkerEvent::Fetch(request) => {
                Ok(EventOutcome::Fetch(self.handle_fetch(&request).await))
            }
            WorkerEvent::Message(message) => {
                self.handle_message(message).await.map(EventOutcome::Message)
            }
        }
    }

    // ===== Install =====

    /// Create this version's three namespaces, then cache the essential file
    /// set into the static one, one file at a time. Only a failure on a
    /// mandatory file fails the install.
    pub async fn install(&self) -> Result<(), WorkerError> {
        self.transition(EventKind::Install, WorkerState::Parsed, WorkerState::Installing)?;
        info!(version = %self.config.version, "Installing");

        match self.precache().await {
            Ok(()) => {
                self.set_state(WorkerState::Installed);
                if self.config.skip_waiting_on_install {
                    self.skip_waiting();
                }
                info!(version = %self.config.version, "Installed");
                Ok(())
            }
            Err(e) => {
                self.set_state(WorkerState::Redundant);
                error!(version = %self.config.version, error = %e, "Install failed");
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<(), WorkerError> {
        for name in self.config.valid_caches() {
            self.storage.open(name).await?;
        }
        for path in &self.config.essential_files {
            match self.cache_essential(path).await {
                Ok(()) => debug!(path = %path, "Essential file cached"),
                Err(e) if self.config.is_mandatory(path) => return Err(e),
                Err(e) => warn!(path = %path, error = %e, "Skipping optional essential file"),
            }
        }
        Ok(())
    }

    async fn cache_essential(&self, path: &str) -> Result<(), WorkerError> {
        let failed = |reason: String| WorkerError::EssentialFile {
            url: path.to_string(),
            reason,
        };

        let url = self.config.resolve(path).map_err(|e| failed(e.to_string()))?;
        let request = Request::get(url).bypass_cache();
        let response = self
            .network
            .fetch(&request)
            .await
            .map_err(|e| failed(e.to_string()))?;
        if !response.is_ok() {
            return Err(WorkerError::from_status(
                path,
                response.status,
                &response.text_body(),
            ));
        }
        self.storage
            .put(&self.config.static_cache, &request.cache_key(), &response)
            .await
            .map_err(|e| failed(e.to_string()))
    }

    // ===== Activate =====

    /// Drop every namespace from other versions, claim open clients and tell
    /// them the worker is ready. On failure the worker goes back to
    /// `Installed` so activation can be retried.
    pub async fn activate(&self) -> Result<ActivationReport, WorkerError> {
        self.transition(EventKind::Activate, WorkerState::Installed, WorkerState::Activating)?;
        info!(version = %self.config.version, "Activating");

        let deleted = match self.delete_stale_caches().await {
            Ok(deleted) => deleted,
            Err(e) => {
                self.set_state(WorkerState::Installed);
                error!(version = %self.config.version, error = %e, "Activation failed");
                return Err(e);
            }
        };

        self.set_state(WorkerState::Activated);
        let claimed = self.clients.claim(&self.config.version).await;
        let notified = self
            .clients
            .broadcast(ClientMessage::SwReady {
                version: self.config.version.clone(),
                timestamp: Utc::now().timestamp_millis(),
            })
            .await;

        info!(
            version = %self.config.version,
            deleted = deleted.len(),
            claimed,
            notified,
            "Activated"
        );
        Ok(ActivationReport {
            deleted,
            claimed,
            notified,
        })
    }

    async fn delete_stale_caches(&self) -> Result<Vec<String>, WorkerError> {
        let valid = self.config.valid_caches();
        let stale: Vec<String> = self
            .storage
            .keys()
            .await?
            .into_iter()
            .filter(|name| !valid.contains(&name.as_str()))
            .collect();
        self.delete_caches(stale).await
    }

    /// Delete namespaces concurrently. Every deletion is attempted; the first
    /// error is returned afterwards.
    async fn delete_caches(&self, names: Vec<String>) -> Result<Vec<String>, WorkerError> {
        let results = join_all(names.iter().map(|name| self.storage.delete(name))).await;
        let mut deleted = Vec::with_capacity(names.len());
        let mut first_error = None;
        for (name, result) in names.into_iter().zip(results) {
            match result {
                Ok(_) => {
                    debug!(cache = %name, "Deleted cache");
                    deleted.push(name);
                }
                Err(e) => {
                    warn!(cache = %name, error = %e, "Failed to delete cache");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(deleted),
        }
    }

    // ===== Fetch =====

    /// Intercept a request. Only an activated worker intercepts, and only
    /// GET requests over http(s).
    pub async fn handle_fetch(&self, request: &Request) -> FetchOutcome {
        if self.state() != WorkerState::Activated || !should_intercept(request) {
            return FetchOutcome::Passthrough;
        }
        FetchOutcome::Respond(strategy::handle(self.fetch_context(), request).await)
    }

    // ===== Messages =====

    pub async fn handle_message(&self, message: Message) -> Result<MessageOutcome, WorkerError> {
        let Message { data, reply } = message;
        debug!(kind = data.type_name(), "Message received");
        match data {
            ControlMessage::SkipWaiting => {
                self.skip_waiting();
                Ok(MessageOutcome::SkipWaiting)
            }
            ControlMessage::GetVersion => {
                let version = self.config.version.clone();
                match reply {
                    Some(tx) => {
                        let answer = MessageReply::Version {
                            version: version.clone(),
                        };
                        if tx.send(answer).is_err() {
                            warn!("GET_VERSION reply dropped - receiver closed");
                        }
                    }
                    None => warn!("GET_VERSION without a reply channel"),
                }
                Ok(MessageOutcome::Version(version))
            }
            ControlMessage::ForceUpdate => {
                info!(version = %self.config.version, "Force update: clearing all caches");
                let names = self.storage.keys().await?;
                let deleted = self.delete_caches(names).await?.len();
                let reloaded = self.clients.navigate_all().await;
                Ok(MessageOutcome::ForceUpdated { deleted, reloaded })
            }
            ControlMessage::Unknown(kind) => {
                warn!(kind = %kind, "Ignoring unknown message");
                Ok(MessageOutcome::Ignored)
            }
        }
    }
}
