use axum::{
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    middleware,
    response::Json,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::auth::jwt_middleware;
use crate::{invoicing, orders, payments, AppState};

/// Health check endpoint.
///
/// Returns a simple JSON response indicating the server is running.
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "storefront-core",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Store health check endpoint.
async fn db_health_check(State(state): State<AppState>) -> Result<Json<serde_json::Value>, StatusCode> {
    state.store.ping().await.map_err(|e| {
        error!("Database health check failed: {}", e);
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    Ok(Json(serde_json::json!({
        "status": "ok",
        "database": "connected"
    })))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
}

/// Creates the application router.
///
/// Everything under `/api` requires a bearer token except the VNPay IPN
/// callback, which is authenticated by its signature.
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/orders",
            post(orders::create_order_handler).get(orders::list_orders_handler),
        )
        .route("/orders/user/:user_id", get(orders::list_user_orders_handler))
        .route(
            "/orders/:id",
            get(orders::get_order_handler).delete(orders::undo_order_handler),
        )
        .route("/orders/:id/status", put(orders::update_order_status_handler))
        .route("/invoice-requests", get(invoicing::list_all_handler))
        .route("/invoice-requests/pending", get(invoicing::list_pending_handler))
        .route("/invoice-requests/:id/accept", post(invoicing::accept_handler))
        .route("/invoice-requests/:id/reject", post(invoicing::reject_handler))
        .route("/invoice-requests/:id/status", put(invoicing::update_status_handler))
        .route(
            "/invoice-requests/by-order/:order_id/status",
            put(invoicing::update_status_by_order_handler),
        )
        .route("/payments/vnpay", post(payments::create_payment_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_middleware));

    let public = Router::new().route("/payments/vnpay/ipn", get(payments::ipn_handler));

    Router::new()
        .route("/health", get(health_check))
        .route("/health/db", get(db_health_check))
        .nest("/api", protected.merge(public))
        .layer(cors_layer(&state.config.cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
