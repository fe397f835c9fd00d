#![forbid(unsafe_code)]

use datapress_publish::{
    BaselineValidator, LocalRegistrar, Publisher, PublisherDeps, SqliteRegistry,
};
use datapress_server::{build_router, init_tracing, AppState, ServerConfig};
use datapress_store::{HttpBlobStore, HttpBlobStoreConfig, LocalFsStore, ObjectStore};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("register SIGTERM");
        let mut sigint = signal(SignalKind::interrupt()).expect("register SIGINT");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn build_store(config: &ServerConfig) -> Result<Arc<dyn ObjectStore>, String> {
    match (&config.blob_draft_base_url, &config.blob_published_base_url) {
        (Some(draft), Some(published)) => {
            let store = HttpBlobStore::new(HttpBlobStoreConfig {
                draft_base_url: draft.clone(),
                published_base_url: published.clone(),
                bearer_token: config.blob_bearer_token.clone(),
                timeout: config.blob_timeout,
                allow_private_hosts: config.blob_allow_private_hosts,
            })
            .map_err(|e| format!("blob store init failed: {e}"))?;
            Ok(Arc::new(store))
        }
        _ => {
            let store = LocalFsStore::new(config.draft_root.clone(), config.published_root.clone())
                .map_err(|e| format!("local store init failed: {e}"))?;
            Ok(Arc::new(store))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    init_tracing()?;

    let config = ServerConfig::from_env();
    config.validate()?;

    let store = build_store(&config)?;
    let registry = Arc::new(
        SqliteRegistry::open(&config.db_path).map_err(|e| format!("registry open failed: {e}"))?,
    );
    if config.skip_metadata_validation {
        warn!("metadata validation disabled for every publish attempt");
    }
    let deps = PublisherDeps {
        store,
        drafts: registry.clone(),
        status: registry.clone(),
        published: registry,
        validator: Arc::new(BaselineValidator),
        registrar: Arc::new(LocalRegistrar::new(config.identifier_prefix.clone())),
    };
    let publisher = Arc::new(Publisher::new(deps, &config.publisher_config()));

    let state = AppState::new(publisher);
    let app = build_router(state.clone());

    let addr: std::net::SocketAddr = config
        .bind_addr
        .parse()
        .map_err(|e| format!("invalid bind addr {}: {e}", config.bind_addr))?;
    let socket = if addr.is_ipv4() {
        tokio::net::TcpSocket::new_v4().map_err(|e| format!("socket v4 failed: {e}"))?
    } else {
        tokio::net::TcpSocket::new_v6().map_err(|e| format!("socket v6 failed: {e}"))?
    };
    socket
        .set_reuseaddr(true)
        .map_err(|e| format!("set_reuseaddr failed: {e}"))?;
    socket
        .set_keepalive(true)
        .map_err(|e| format!("set_keepalive failed: {e}"))?;
    socket.bind(addr).map_err(|e| format!("bind failed: {e}"))?;
    let listener: TcpListener = socket
        .listen(1024)
        .map_err(|e| format!("listen failed: {e}"))?;
    info!("datapress-server listening on {}", config.bind_addr);
    let accepting = state.accepting_requests.clone();
    let drain = config.shutdown_drain;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_shutdown_signal().await;
            accepting.store(false, Ordering::Relaxed);
            tokio::time::sleep(drain).await;
        })
        .await
        .map_err(|e| format!("server failed: {e}"))
}
