use std::sync::Arc;

use crate::auth::TokenService;
use crate::config::AppConfig;
use crate::database::Store;

/// Shared handles every request handler sees
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub tokens: Arc<TokenService>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, tokens: TokenService, config: AppConfig) -> Self {
        Self {
            store,
            tokens: Arc::new(tokens),
            config: Arc::new(config),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.config.api.page_size
    }
}
