use opensees_writer::{api, launcher, WriterConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opensees_writer=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting OpenSees TCL Writer");

    let config = WriterConfig::from_env();
    tracing::info!("Using OpenSees command: {}", config.opensees_path);

    match launcher::find_command(&config.opensees_path) {
        Some(path) => tracing::info!("OpenSees found at {:?}", path),
        None => {
            tracing::warn!("OpenSees not found: {}", config.opensees_path);
            tracing::warn!("Set OPENSEES_PATH environment variable to the correct path");
            tracing::warn!("Service will start but generated models cannot be run locally");
        }
    }

    let addr = config.bind_address();
    let app = api::create_router(config);

    tracing::info!("Listening on {}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  GET  /health");
    tracing::info!("  GET  /api/v1/version");
    tracing::info!("  POST /api/v1/validate");
    tracing::info!("  POST /api/v1/generate");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
