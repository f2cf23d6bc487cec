use std::sync::Arc;

use crate::{
    service::{Marketplace, MarketplaceSettings},
    store::MarketplaceStore,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub marketplace: Marketplace,
}

impl AppState {
    pub fn new(store: Arc<dyn MarketplaceStore>, settings: MarketplaceSettings) -> Self {
        Self {
            marketplace: Marketplace::new(store, settings),
        }
    }
}
