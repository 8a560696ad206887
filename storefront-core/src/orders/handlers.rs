use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::AppResult;
use crate::models::OrderResponse;
use crate::orders::workflow::{self, DateRange};
use crate::AppState;

/// Body of `POST /api/orders`.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    /// Product id to quantity
    pub items: BTreeMap<i64, i32>,

    /// Initial order status; defaults to pending
    #[serde(default, alias = "statusId")]
    pub status_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    #[serde(alias = "statusId")]
    pub status_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Create order endpoint handler. The authenticated user is the creator.
pub async fn create_order_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(body): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<OrderResponse>)> {
    info!("Create order request from user: {} with {} items", user_id, body.items.len());

    let order = workflow::create_order(state.store.as_ref(), user_id, &body.items, body.status_id).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_order_handler(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> AppResult<Json<OrderResponse>> {
    Ok(Json(workflow::get_order(state.store.as_ref(), order_id).await?))
}

/// Lists orders created between `start` and `end` (`YYYY-MM-DD`, optional).
pub async fn list_orders_handler(
    State(state): State<AppState>,
    Query(query): Query<DateRangeQuery>,
) -> AppResult<Json<Vec<OrderResponse>>> {
    let range = DateRange::parse(query.start.as_deref(), query.end.as_deref(), Utc::now())?;
    Ok(Json(workflow::list_between(state.store.as_ref(), range).await?))
}

pub async fn list_user_orders_handler(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<OrderResponse>>> {
    Ok(Json(workflow::list_by_user(state.store.as_ref(), user_id).await?))
}

pub async fn update_order_status_handler(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
    Json(body): Json<UpdateOrderStatusRequest>,
) -> AppResult<StatusCode> {
    workflow::update_order(state.store.as_ref(), order_id, body.status_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Undo endpoint handler. Restores stock and removes the order.
pub async fn undo_order_handler(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> AppResult<StatusCode> {
    workflow::undo_order_creation(state.store.as_ref(), order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
