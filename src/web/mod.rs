//! Browser UI: one form, one page per submission.

use std::num::NonZeroU16;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::architect::Architect;
use crate::config::{ServiceConfig, build_client};
use crate::constants::DEFAULT_TITLE;
use crate::error::MangaError;
use crate::progress::ProgressStore;
use crate::typesetter::Typesetter;

mod pages;
mod prelude;
mod views;

use pages::{page_download_handler, page_handler};
use views::{context_handler, generate_handler, home_handler, styles_handler};

#[derive(Clone, Debug)]
pub(crate) struct AppState {
    config: Arc<ServiceConfig>,
    client: reqwest::Client,
    store: ProgressStore,
    typesetter: Typesetter,
    generation: Arc<Mutex<()>>,
}

impl AppState {
    pub(crate) fn new(config: ServiceConfig) -> Result<Self, MangaError> {
        let client = build_client()?;
        Ok(Self {
            store: ProgressStore::new(config.context_file.clone()),
            typesetter: Typesetter::new(config.output_dir.clone()),
            config: Arc::new(config),
            client,
            generation: Arc::new(Mutex::new(())),
        })
    }

    fn architect(&self) -> Architect {
        Architect::new(self.client.clone(), self.config.chat.clone())
    }
}

fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(home_handler))
        .route("/generate", post(generate_handler))
        .route("/context", get(context_handler))
        .route("/pages/{page}", get(page_handler))
        .route("/pages/{page}/download", get(page_download_handler))
        .route("/static/styles.css", get(styles_handler))
}

/// Serves the browser UI until the listener fails.
pub async fn setup_server(
    listen_addr: &str,
    port: NonZeroU16,
    config: ServiceConfig,
) -> Result<(), anyhow::Error> {
    let state = AppState::new(config)?;
    state.store.initialize(DEFAULT_TITLE)?;
    let app = create_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", listen_addr, port);
    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    if let Err(err) = axum::serve(listener, app).await {
        error!("Server error: {}", err);
    }
    Ok(())
}
