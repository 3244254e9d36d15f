use std::sync::Arc;

use crate::consensus::ConsensusEngine;
use crate::monitor::EventMonitor;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ConsensusEngine>,
    pub monitor: Arc<EventMonitor>,
}
