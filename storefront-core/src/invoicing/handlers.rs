use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Deserialize;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::invoicing::service::{self, Acceptance};
use crate::models::{InvoiceRequestResponse, PendingInvoiceRequest};
use crate::AppState;

/// Body of the administrative status update endpoints.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(rename = "statusId", alias = "status_id")]
    pub status_id: Option<i32>,
}

impl UpdateStatusRequest {
    fn required(&self) -> AppResult<i32> {
        self.status_id
            .ok_or_else(|| AppError::BadRequest("statusId is required".to_string()))
    }
}

pub async fn list_all_handler(State(state): State<AppState>) -> AppResult<Json<Vec<InvoiceRequestResponse>>> {
    Ok(Json(service::list_all(state.store.as_ref()).await?))
}

pub async fn list_pending_handler(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<PendingInvoiceRequest>>> {
    Ok(Json(service::list_pending(state.store.as_ref()).await?))
}

pub async fn accept_handler(
    State(state): State<AppState>,
    Path(request_id): Path<i64>,
) -> AppResult<Json<Acceptance>> {
    info!("Accept request for invoice request: {}", request_id);
    Ok(Json(service::accept(state.store.as_ref(), request_id).await?))
}

pub async fn reject_handler(
    State(state): State<AppState>,
    Path(request_id): Path<i64>,
) -> AppResult<Json<InvoiceRequestResponse>> {
    info!("Reject request for invoice request: {}", request_id);
    Ok(Json(service::reject(state.store.as_ref(), request_id).await?))
}

pub async fn update_status_handler(
    State(state): State<AppState>,
    Path(request_id): Path<i64>,
    Json(body): Json<UpdateStatusRequest>,
) -> AppResult<Json<InvoiceRequestResponse>> {
    let status_id = body.required()?;
    Ok(Json(
        service::update_status(state.store.as_ref(), request_id, status_id).await?,
    ))
}

pub async fn update_status_by_order_handler(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
    Json(body): Json<UpdateStatusRequest>,
) -> AppResult<Json<InvoiceRequestResponse>> {
    let status_id = body.required()?;
    Ok(Json(
        service::update_status_by_order_id(state.store.as_ref(), order_id, status_id).await?,
    ))
}
