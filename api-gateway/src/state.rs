//! Shared application state.

use std::sync::Arc;

use market::{ChannelNodeRpc, DefaultMarketplace};

/// Shared state held by the API and background tasks.
///
/// This is wrapped in an [`Arc`] and passed to request handlers via Axum's
/// `State` extractor.
pub struct AppState {
    /// The assembled settlement core.
    pub market: Arc<DefaultMarketplace>,
    /// The block feed the monitor subscribes to. Kept here so the demo
    /// endpoints can inject synthetic blocks.
    pub rpc: Arc<ChannelNodeRpc>,
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;
