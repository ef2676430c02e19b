use std::sync::Arc;

use crate::{
    config::Config,
    database::{init_redis, RedisStore},
};

pub struct AppState {
    pub config: Config,
    pub store: RedisStore,
}

impl AppState {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();
        let connection = init_redis(&config.redis_url).await;

        Arc::new(Self {
            config,
            store: RedisStore::new(connection),
        })
    }
}
