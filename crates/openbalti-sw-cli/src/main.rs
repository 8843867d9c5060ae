//! OpenBalti offline worker - command line driver.
//!
//! Runs the offline cache worker against a real origin with an on-disk
//! cache, so the essential file set, cache namespaces and offline fallbacks
//! can be inspected outside a browser.

mod record;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use openbalti_sw_core::{
    CacheReport, ClientRegistry, ControlMessage, Destination, DiskCacheStorage, HttpNetwork,
    Message, MessageOutcome, MessageReply, RegisterOutcome, Registration, Request, Response,
    ServiceWorker, Settings, WorkerConfig, WorkerState,
};
use reqwest::Method;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

use record::{RecordStore, WorkerRecord};

/// Subdirectory of the cache directory holding the cache namespaces
const CACHES_DIR: &str = "caches";

/// Log file name prefix when file logging is enabled
const LOG_FILE_PREFIX: &str = "openbalti-sw.log";

#[derive(Parser)]
#[command(name = "openbalti-sw", version, about = "OpenBalti offline cache worker")]
struct Cli {
    /// Origin to serve, e.g. https://openbalti.com
    #[arg(long, global = true)]
    origin: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Cache the essential files and activate the worker
    Install,
    /// Fetch a path through the worker
    Fetch {
        /// Path relative to the origin, e.g. /words/khar
        path: String,
        /// Treat the request as a full page load
        #[arg(long)]
        navigate: bool,
        /// Request destination (script, style, image, font, document, manifest)
        #[arg(long)]
        dest: Option<String>,
        #[arg(long, default_value = "GET")]
        method: String,
        /// Print headers only
        #[arg(long)]
        head: bool,
    },
    /// Show cache namespaces and the worker state
    Status,
    /// Ask the active worker for its cache version
    Version,
    /// Delete every cache and reload open clients
    ForceUpdate,
    /// Show or change persisted settings
    Config {
        #[arg(long)]
        set_origin: Option<String>,
        #[arg(long)]
        set_cache_version: Option<String>,
    },
}

/// Initialize the tracing subscriber for logging.
/// RUST_LOG controls the level; OPENBALTI_SW_LOG_DIR adds a daily log file.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var("OPENBALTI_SW_LOG_DIR") {
        Ok(dir) if !dir.is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

/// Everything a command needs, built once per run.
struct Host {
    config: WorkerConfig,
    storage: Arc<DiskCacheStorage>,
    network: Arc<HttpNetwork>,
    clients: Arc<ClientRegistry>,
    record: RecordStore,
}

impl Host {
    fn new(settings: &Settings) -> Result<Self> {
        let cache_dir = settings
            .cache_dir()
            .context("Failed to locate a cache directory for the worker")?;
        Self::at(settings, cache_dir)
    }

    fn at(settings: &Settings, cache_dir: PathBuf) -> Result<Self> {
        let config = settings.worker_config()?;
        let storage = DiskCacheStorage::new(cache_dir.join(CACHES_DIR))
            .with_context(|| format!("Failed to open cache directory {}", cache_dir.display()))?;
        let network = HttpNetwork::new().context("Failed to create HTTP client")?;

        let mut record = RecordStore::new(cache_dir);
        if let Err(e) = record.load() {
            warn!(error = %e, "Ignoring unreadable worker record");
        }

        Ok(Self {
            config,
            storage: Arc::new(storage),
            network: Arc::new(network),
            clients: Arc::new(ClientRegistry::new()),
            record,
        })
    }

    /// Registration with the previously activated worker restored, if the
    /// record matches the configured version and origin.
    fn registration(&self) -> Registration {
        let registration = Registration::new(
            self.storage.clone(),
            self.network.clone(),
            self.clients.clone(),
        );
        if self.record.is_active_for(&self.config) {
            registration.with_active(ServiceWorker::resume_active(
                self.config.clone(),
                self.storage.clone(),
                self.network.clone(),
                self.clients.clone(),
            ))
        } else {
            registration
        }
    }

    fn build_request(
        &self,
        path: &str,
        navigate: bool,
        dest: Option<&str>,
        method: &str,
    ) -> Result<Request> {
        let url: Url = self
            .config
            .resolve(path)
            .with_context(|| format!("Invalid path: {}", path))?;
        let mut request = if navigate {
            Request::navigate(url)
        } else {
            Request::get(url)
        };
        if let Some(dest) = dest {
            let destination = Destination::parse(dest)
                .ok_or_else(|| anyhow::anyhow!("Unknown destination: {}", dest))?;
            request = request.with_destination(destination);
        }
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .with_context(|| format!("Invalid method: {}", method))?;
        Ok(request.with_method(method))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    let _log_guard = init_tracing();

    let cli = Cli::parse();

    let mut settings = match Settings::load() {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "Failed to load settings, using defaults");
            Settings::default()
        }
    }
    .with_env_overrides();
    if let Some(origin) = cli.origin {
        settings.origin = Some(origin);
    }

    if let Command::Config {
        set_origin,
        set_cache_version,
    } = cli.command
    {
        return configure(settings, set_origin, set_cache_version);
    }

    let mut host = Host::new(&settings)?;
    match cli.command {
        Command::Install => install(&mut host).await,
        Command::Fetch {
            path,
            navigate,
            dest,
            method,
            head,
        } => fetch(&host, &path, navigate, dest.as_deref(), &method, head).await,
        Command::Status => status(&host).await,
        Command::Version => version(&host).await,
        Command::ForceUpdate => force_update(&host).await,
        Command::Config { .. } => Ok(()),
    }
}

fn configure(
    mut settings: Settings,
    origin: Option<String>,
    cache_version: Option<String>,
) -> Result<()> {
    let changed = origin.is_some() || cache_version.is_some();
    if let Some(origin) = origin {
        settings.origin = Some(origin);
    }
    if let Some(version) = cache_version {
        settings.cache_version = Some(version);
    }
    // Validates the origin before it is persisted
    let config = settings.worker_config()?;
    if changed {
        settings.save()?;
        info!("Settings saved");
    }
    println!("origin:        {}", config.origin);
    println!("cache version: {}", config.version);
    for name in config.valid_caches() {
        println!("  {}", name);
    }
    Ok(())
}

async fn install(host: &mut Host) -> Result<()> {
    let mut registration = host.registration();
    match registration.register(host.config.clone()).await {
        Ok(RegisterOutcome::Unchanged) => {
            println!("Worker {} is already active", host.config.version);
        }
        Ok(RegisterOutcome::Activated(report)) => {
            host.record
                .update(WorkerRecord::new(&host.config, WorkerState::Activated));
            host.record.save()?;
            println!("Worker {} activated", host.config.version);
            for name in &report.deleted {
                println!("  deleted stale cache {}", name);
            }
        }
        Ok(RegisterOutcome::Waiting) => {
            host.record
                .update(WorkerRecord::new(&host.config, WorkerState::Installed));
            host.record.save()?;
            println!("Worker {} installed and waiting", host.config.version);
        }
        Err(e) => {
            return Err(e).context("Install failed");
        }
    }
    Ok(())
}

async fn fetch(
    host: &Host,
    path: &str,
    navigate: bool,
    dest: Option<&str>,
    method: &str,
    head: bool,
) -> Result<()> {
    let registration = host.registration();
    if registration.active().is_none() {
        warn!("No active worker; fetching straight from the network");
    }
    let request = host.build_request(path, navigate, dest, method)?;
    let response = registration
        .fetch(&request)
        .await
        .with_context(|| format!("Failed to fetch {}", request.url))?;
    print_response(&response, head);
    Ok(())
}

fn print_response(response: &Response, head: bool) {
    println!("{} {}", response.status, response.status_text);
    for (name, value) in &response.headers {
        println!("{}: {}", name, value);
    }
    if !head {
        println!();
        println!("{}", response.text_body());
    }
}

async fn status(host: &Host) -> Result<()> {
    match &host.record.data {
        Some(record) => println!(
            "worker: {} ({:?}, {}) updated {}",
            record.version,
            record.state,
            record.origin,
            record.updated_at.format("%Y-%m-%d %H:%M UTC")
        ),
        None => println!("worker: not installed"),
    }
    println!("configured version: {}", host.config.version);

    let report = CacheReport::collect(&*host.storage, &host.config.valid_caches()).await?;
    if report.namespaces.is_empty() {
        println!("no caches");
        return Ok(());
    }
    for ns in &report.namespaces {
        println!(
            "{:<32} {:>5} entries {:>10} bytes  {}{}",
            ns.name,
            ns.entries,
            ns.bytes,
            ns.last_updated.as_deref().unwrap_or("never"),
            if ns.current { "" } else { "  (stale)" }
        );
    }
    println!("last updated: {}", report.last_updated());
    Ok(())
}

async fn version(host: &Host) -> Result<()> {
    let registration = host.registration();
    let (message, reply) = Message::with_reply(ControlMessage::GetVersion);
    match registration.post_message(message).await? {
        Some(_) => match reply.await {
            Ok(MessageReply::Version { version }) => println!("{}", version),
            Err(_) => anyhow::bail!("Worker did not reply"),
        },
        None => println!("no active worker (configured {})", host.config.version),
    }
    Ok(())
}

async fn force_update(host: &Host) -> Result<()> {
    let registration = host.registration();
    match registration
        .post_message(Message::new(ControlMessage::ForceUpdate))
        .await?
    {
        Some(MessageOutcome::ForceUpdated { deleted, reloaded }) => {
            println!("Deleted {} caches, reloaded {} clients", deleted, reloaded);
        }
        Some(other) => warn!(?other, "Unexpected reply to FORCE_UPDATE"),
        None => println!("no active worker"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_keeps_caches_under_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        let host = Host::at(&Settings::default(), dir.path().to_path_buf()).unwrap();
        assert_eq!(host.storage.root(), dir.path().join(CACHES_DIR));
        assert!(dir.path().join(CACHES_DIR).is_dir());
    }

    #[test]
    fn test_host_fails_on_unusable_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, "occupied").unwrap();

        let err = Host::at(&Settings::default(), file).err().unwrap();
        assert!(err.to_string().contains("Failed to open cache directory"));
    }
}
