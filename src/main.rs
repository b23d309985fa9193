//! Golf league scoring backend entrypoint wiring REST, SSE and the score store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, bail};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use golf_league_back::{
    config::AppConfig,
    dao::{
        score_store::{ScoreStore, memory::MemoryScoreStore},
        storage::StorageError,
    },
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};

const DEFAULT_BACKEND: &str = "memory";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let backend = env::var("STORE_BACKEND").unwrap_or_else(|_| DEFAULT_BACKEND.into());

    let app_state = AppState::new(config);
    spawn_store_supervisor(&app_state, &backend)?;
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, %backend, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Start the supervisor for the selected backend; the server stays in
/// degraded mode until it installs a store.
fn spawn_store_supervisor(state: &SharedState, backend: &str) -> anyhow::Result<()> {
    match backend {
        "memory" => {
            let store = match state.config().seed_path() {
                Some(path) => MemoryScoreStore::from_seed_file(path)
                    .with_context(|| format!("seeding memory store from {}", path.display()))?,
                None => MemoryScoreStore::new(),
            };
            let store: Arc<dyn ScoreStore> = Arc::new(store);
            tokio::spawn(storage_supervisor::run(state.clone(), move || {
                let store = store.clone();
                async move { Ok::<_, StorageError>(store) }
            }));
        }
        #[cfg(feature = "couch-store")]
        "couch" => {
            use golf_league_back::dao::score_store::couchdb::{CouchConfig, CouchScoreStore};

            let couch_config = CouchConfig::from_env().context("reading CouchDB settings")?;
            tokio::spawn(storage_supervisor::run(state.clone(), move || {
                let couch_config = couch_config.clone();
                async move {
                    let store = CouchScoreStore::connect(couch_config).await?;
                    Ok::<_, StorageError>(Arc::new(store) as Arc<dyn ScoreStore>)
                }
            }));
        }
        other => bail!("unknown STORE_BACKEND `{other}`"),
    }
    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "cannot install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
