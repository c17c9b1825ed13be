use axum::extract::Extension;
use axum::{routing::get, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use bulk_data_api::handlers::{collection, record};
use bulk_data_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, SCHEMA_FILE, etc.
    let _ = dotenvy::dotenv();

    // Initialize configuration (this loads the config singleton)
    let config = bulk_data_api::config::config();

    tracing_subscriber::fmt::init();
    tracing::info!("Starting bulk-data-api in {:?} mode", config.environment);

    let state = AppState::from_config(config).await?;
    let app = app(state, &config.api);

    // Allow tests or deployments to override port via env
    let port = std::env::var("BULK_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    println!("🚀 bulk-data-api server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn app(state: AppState, api: &bulk_data_api::config::ApiConfig) -> Router {
    let mut app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(data_routes())
        .layer(Extension(state));

    if api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }
    if api.enable_cors {
        app = app.layer(CorsLayer::permissive());
    }

    app
}

fn data_routes() -> Router {
    Router::new()
        // Collection-level operations, including the bulk paths
        .route(
            "/api/data/:resource",
            get(collection::get)
                .post(collection::post)
                .put(collection::put)
                .patch(collection::patch)
                .delete(collection::delete),
        )
        // Record-level operations (individual)
        .route(
            "/api/data/:resource/:id",
            get(record::get).put(record::put).patch(record::patch).delete(record::delete),
        )
}

async fn root(Extension(state): Extension<AppState>) -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "bulk-data-api",
            "version": version,
            "description": "Schema-driven REST data API with bulk create/update/destroy",
            "resources": state.schemas.resource_names(),
            "endpoints": {
                "home": "/",
                "health": "/health",
                "data": "/api/data/:resource[/:record]",
            }
        }
    }))
}

async fn health(Extension(state): Extension<AppState>) -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match state.store.ping().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "store": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "success": false,
                "error": "store unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "store_error": e.to_string()
                }
            })),
        ),
    }
}
