//! 应用状态定义

use std::sync::Arc;

use crate::repository::EventRepository;
use crate::service::StatsService;

#[derive(Clone)]
pub struct AppState {
    pub stats: Arc<StatsService>,
}

impl AppState {
    pub fn new(repo: Arc<dyn EventRepository>) -> Self {
        Self {
            stats: Arc::new(StatsService::new(repo)),
        }
    }
}
