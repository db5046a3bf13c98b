mod tasks;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

pub fn build_routes() -> Router<Arc<AppState>> {
    Router::new().merge(tasks::routes())
}
