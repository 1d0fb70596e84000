use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use chatrelay::providers::base::ProviderDescriptor;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ProvidersResponse {
    providers: Vec<ProviderDescriptor>,
}

// Providers and models the relay accepts, for the interface's model picker
async fn list_providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        providers: state.registry.descriptors().cloned().collect(),
    })
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/providers", get(list_providers))
        .with_state(state)
}
