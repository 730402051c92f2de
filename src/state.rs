use std::sync::Arc;

use crate::db::{DbPool, OrmConn};
use crate::notifier::Notifier;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub notifier: Arc<Notifier>,
}
