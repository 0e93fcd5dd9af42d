//! Shared handler state

use std::sync::Arc;

use crate::hub::BroadcastHub;
use crate::rooms::{RoomGateway, RoomStore};
use crate::stats::PipelineStats;

/// State shared by HTTP and socket handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub hub: Arc<BroadcastHub>,
    pub gateway: Arc<RoomGateway>,
    pub stats: Arc<PipelineStats>,
}

impl AppState {
    /// Wire a gateway over `store` onto `hub`
    pub fn new(hub: Arc<BroadcastHub>, store: Arc<dyn RoomStore>, stats: Arc<PipelineStats>) -> Self {
        let gateway = Arc::new(RoomGateway::new(store, Arc::clone(&hub)));
        Self {
            hub,
            gateway,
            stats,
        }
    }
}
