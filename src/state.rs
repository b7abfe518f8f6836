use crate::allocator::ClaimAllocator;
use crate::config::Config;
use crate::store::SharedStore;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub allocator: Arc<ClaimAllocator>,
    pub store: SharedStore,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: SharedStore, config: Config) -> Self {
        Self {
            allocator: Arc::new(ClaimAllocator::new(store.clone())),
            store,
            config: Arc::new(config),
        }
    }
}
