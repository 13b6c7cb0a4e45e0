use anyhow::Result;
use axum::{routing::get, Json, Router};
use relay_catalog::{RelayCatalog, RelayCatalogConfig};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod routes;

const DEFAULT_PORT: &str = "18610";

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<RelayCatalog>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", routes::api_router(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "beacon_gateway=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let catalog_config = RelayCatalogConfig::from_env();
    if catalog_config.offline {
        tracing::info!("   Relay catalog: built-in constellation (offline)");
    } else {
        tracing::info!(
            "   Relay catalog: {} (timeout {}s)",
            catalog_config.url,
            catalog_config.timeout_sec
        );
    }

    let state = AppState {
        catalog: Arc::new(RelayCatalog::new(catalog_config)?),
    };

    let port = std::env::var("BEACON_GATEWAY_PORT")
        .or_else(|_| std::env::var("PORT"))
        .unwrap_or_else(|_| DEFAULT_PORT.to_string());
    let addr = format!("0.0.0.0:{}", port);

    tracing::info!("🛰️  Beacon Gateway starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "beacon-gateway",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
