use std::sync::Arc;

use crate::cache::TagCache;
use crate::db::{DbPool, OrmConn};
use crate::payments::PaymentGateway;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub cache: Arc<TagCache>,
    pub payments: Arc<dyn PaymentGateway>,
}
