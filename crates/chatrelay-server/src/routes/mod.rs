pub mod providers;
pub mod relay;

use crate::state::AppState;
use axum::Router;

pub fn configure(state: AppState) -> Router {
    Router::new()
        .merge(relay::routes(state.clone()))
        .merge(providers::routes(state))
}
