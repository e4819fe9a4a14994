mod auth;
mod config;
mod conversations;
mod data;
mod db;
mod errors;
mod extractors;
mod llm_client;
mod mailer;
mod maturity;
mod messages;
mod models;
mod pagination;
mod projects;
mod routes;
mod state;
mod users;
mod vectordb;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::Request;
use tower::Layer;
use tower_http::{cors::CorsLayer, normalize_path::NormalizePathLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::tokens::TokenIssuer;
use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::mailer::Mailer;
use crate::routes::build_router;
use crate::state::AppState;
use crate::users::seed::ensure_default_admin;
use crate::vectordb::PgVectorStore;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Qwanza API v{}", env!("CARGO_PKG_VERSION"));

    let db = create_pool(&config.database_url).await?;
    ensure_default_admin(&db, &config).await?;

    let tokens = TokenIssuer::from_config(&config)?;
    let mailer = Mailer::from_config(&config)?;
    let llm = LlmClient::from_config(&config)?;
    let vectors = Arc::new(PgVectorStore::new(db.clone(), config.embedding_model_size));

    tokio::fs::create_dir_all(&config.files_dir).await?;
    info!("Storing uploaded files under {}", config.files_dir);

    let state = AppState {
        db,
        config: config.clone(),
        tokens,
        mailer,
        llm,
        vectors,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());
    // Trailing slashes must be trimmed before routing happens.
    let app = NormalizePathLayer::trim_trailing_slash().layer(app);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, axum::ServiceExt::<Request>::into_make_service(app)).await?;

    Ok(())
}
