mod configuration;
mod error;
mod routes;
mod state;

use chatrelay::registry::ProviderRegistry;
use configuration::Settings;
use state::AppState;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::new()?;
    let registry = ProviderRegistry::from_config(&settings.provider_configs())?;
    for descriptor in registry.descriptors() {
        info!(
            provider = %descriptor.id,
            models = descriptor.models.len(),
            "provider registered"
        );
    }

    let state = AppState::new(
        registry,
        settings.relay_policy(),
        settings.server.keep_alive(),
    );

    // Create router with CORS support
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::configure(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(settings.server.socket_addr()?).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
