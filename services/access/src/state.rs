//! Application state shared across handlers

use sqlx::PgPool;
use std::sync::Arc;

use crate::repositories::PgResourceFactory;
use crate::scheduler::ScanTrigger;
use crate::service::AccessService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub access_service: AccessService,
    pub scan_trigger: Arc<ScanTrigger<PgResourceFactory>>,
}
