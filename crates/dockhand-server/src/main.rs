//! dockhand-server: ingestion and processing server for PDF documents.

mod admin;
mod config;
mod sse;
mod upload;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post, put};
use axum::Router;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use dockhand_ai::AiService;
use dockhand_core::defaults::{QUEUE_AI, QUEUE_DEFAULT, SHUTDOWN_TIMEOUT_SECS};
use dockhand_core::{Result, StatusBroadcaster};
use dockhand_crypto::CredentialCrypto;
use dockhand_db::Database;
use dockhand_ingest::DocumentService;
use dockhand_jobs::{
    AiAnalyzeHandler, HandlerRegistry, ProcessHandler, Queue, QueueConfig, TextExtractor,
    ThumbnailGenerator,
};
use dockhand_sources::{InboxService, NetworkService, Poller};
use dockhand_storage::Storage;

use config::Config;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub documents: DocumentService,
    pub broadcaster: StatusBroadcaster,
    pub ai: Arc<AiService>,
    pub network: Arc<NetworkService>,
    pub inboxes: InboxService,
    pub cancel: CancellationToken,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = Config::from_env()?;

    let db = Database::connect(&config.database_url).await?;
    info!("database connected");

    let storage = Storage::new(&config.storage_root)?;
    storage.init().await?;
    info!(path = %config.storage_root.display(), "storage initialized");

    let broadcaster = StatusBroadcaster::new();
    let documents = DocumentService::new(db.clone(), storage.clone());
    let crypto = CredentialCrypto::new(&config.credential_key);

    // Everything long-running hangs off this token; shutdown cancels it once.
    let cancel = CancellationToken::new();
    let mut handles: Vec<JoinHandle<()>> = Vec::new();

    // Processing queue.
    let text = TextExtractor::new(&config.ocr_input_dir, &config.ocr_output_dir)
        .with_ocr_timeout(Duration::from_secs(config.ocr_timeout_secs));
    let thumbnails = ThumbnailGenerator::new(storage.clone(), &config.placeholder_path);

    let mut default_registry = HandlerRegistry::new();
    default_registry.register(ProcessHandler::new(
        db.clone(),
        documents.clone(),
        text,
        thumbnails,
        broadcaster.clone(),
    ));
    let default_queue = Arc::new(Queue::new(
        db.clone(),
        QueueConfig::default().with_worker_count(config.worker_count),
        default_registry,
    ));
    handles.extend(default_queue.start(QUEUE_DEFAULT, cancel.clone()));

    // AI queue, separate so provider latency does not starve ingestion.
    let ai = Arc::new(AiService::new(db.clone()));
    let mut ai_registry = HandlerRegistry::new();
    ai_registry.register(AiAnalyzeHandler::new(ai.clone(), broadcaster.clone()));
    let ai_queue = Arc::new(Queue::new(
        db.clone(),
        QueueConfig::default().with_worker_count(config.ai_worker_count),
        ai_registry,
    ));
    handles.extend(ai_queue.start(QUEUE_AI, cancel.clone()));

    // Inbox watcher.
    let inboxes = InboxService::new(
        db.clone(),
        documents.clone(),
        config.default_inbox_path.clone(),
    );
    handles.push(inboxes.start(cancel.clone()).await?);

    // Network source poller.
    let network = Arc::new(NetworkService::new(db.clone(), documents.clone(), crypto));
    handles.push(Poller::new(network.clone()).start(cancel.clone()));

    let state = AppState {
        db,
        documents,
        broadcaster,
        ai,
        network,
        inboxes,
        cancel: cancel.clone(),
    };

    let app = Router::new()
        .route("/healthz", get(admin::health))
        .route("/api/upload", post(upload::upload_single))
        .route("/api/upload/batch", post(upload::upload_batch))
        .route("/api/status/stream", get(sse::status_stream))
        .route("/api/jobs", get(admin::list_jobs))
        .route("/api/jobs/stats", get(admin::job_stats))
        .route("/api/jobs/retry-all", post(admin::retry_all_failed))
        .route("/api/jobs/:id/retry", post(admin::retry_job))
        .route("/api/jobs/:id/dismiss", post(admin::dismiss_job))
        .route("/api/documents/:id/retry", post(admin::retry_document))
        .route("/api/documents/:id/analyze", post(admin::reanalyze_document))
        .route("/api/sources/sync-all", post(admin::sync_all_sources))
        .route("/api/sources/:id/test", post(admin::test_source))
        .route("/api/sources/:id/sync", post(admin::sync_source))
        .route("/api/ai/settings", get(admin::get_ai_settings))
        .route("/api/ai/settings", put(admin::update_ai_settings))
        .route("/api/suggestions/:id/accept", post(admin::accept_suggestion))
        .route("/api/suggestions/:id/reject", post(admin::reject_suggestion))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(port = config.port, "starting server");

    let shutdown = cancel.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown.cancelled().await;
    });
    let mut server_task = tokio::spawn(async move {
        if let Err(e) = server.await {
            error!(error = %e, "server error");
        }
    });

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                cancel.cancel();
            }
        }
    });

    // Block until shutdown is requested (or the server dies on its own).
    // In-flight HTTP connections get a bounded grace period.
    tokio::select! {
        _ = cancel.cancelled() => {
            if tokio::time::timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), &mut server_task)
                .await
                .is_err()
            {
                warn!("server shutdown grace period elapsed, aborting");
                server_task.abort();
            }
        }
        result = &mut server_task => {
            cancel.cancel();
            if let Err(e) = result {
                warn!(error = %e, "server task ended unexpectedly");
            }
        }
    }

    // Workers finish their current job; watcher and poller stop at the token.
    info!("stopping background tasks");
    for handle in handles {
        if let Err(e) = handle.await {
            if !e.is_cancelled() {
                warn!(error = %e, "background task join failed");
            }
        }
    }

    info!("server stopped");
    Ok(())
}
