use std::sync::Arc;

use tokio::sync::Semaphore;

use super::{
    config::Config,
    database::{PgStore, init_postgres},
    users::TokenIssuer,
};

pub struct AppState {
    pub config: Config,
    pub store: PgStore,
    pub tokens: TokenIssuer,
    /// Process-wide cap on in-flight verification count queries.
    pub count_limiter: Semaphore,
}

impl AppState {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        let pool = init_postgres(&config.database_url).await;
        let tokens = TokenIssuer::new(&config.jwt_key);
        let count_limiter = Semaphore::new(config.max_count_queries);

        Arc::new(Self {
            config,
            store: PgStore::new(pool),
            tokens,
            count_limiter,
        })
    }
}
