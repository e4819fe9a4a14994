use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::tokens::TokenIssuer;
use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::mailer::Mailer;
use crate::vectordb::VectorStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub tokens: TokenIssuer,
    pub mailer: Mailer,
    /// `None` when no generation backend is configured.
    pub llm: Option<LlmClient>,
    /// Pluggable vector store. Default: `PgVectorStore`.
    pub vectors: Arc<dyn VectorStore>,
}

/// State for handler and router tests. The pool connects lazily, so paths that
/// never reach the database run without one.
#[cfg(test)]
pub fn test_state() -> AppState {
    use sqlx::postgres::PgPoolOptions;

    use crate::vectordb::PgVectorStore;

    let config = Config::for_tests();
    let db = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(std::time::Duration::from_millis(200))
        .connect_lazy(&config.database_url)
        .unwrap();
    AppState {
        tokens: TokenIssuer::from_config(&config).unwrap(),
        mailer: Mailer::from_config(&config).unwrap(),
        llm: None,
        vectors: Arc::new(PgVectorStore::new(db.clone(), config.embedding_model_size)),
        db,
        config,
    }
}
