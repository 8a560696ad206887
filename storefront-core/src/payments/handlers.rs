use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppResult;
use crate::payments::reconcile;
use crate::payments::vnpay::IpnResponse;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    #[serde(alias = "orderId")]
    pub order_id: i64,

    #[serde(default, alias = "bankCode")]
    pub bank_code: Option<String>,
}

/// Response envelope the storefront client expects.
#[derive(Debug, Serialize)]
pub struct PaymentUrlResponse {
    pub code: &'static str,
    pub message: &'static str,
    pub data: String,
}

/// Client address for `vnp_IpAddr`: first `X-Forwarded-For` hop, or loopback.
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("127.0.0.1")
        .to_string()
}

/// Create payment URL endpoint handler.
pub async fn create_payment_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreatePaymentRequest>,
) -> AppResult<Json<PaymentUrlResponse>> {
    info!("Payment URL request for order: {}", body.order_id);

    let url = reconcile::create_payment_url(
        state.store.as_ref(),
        &state.config.vnpay,
        body.order_id,
        body.bank_code,
        client_ip(&headers),
        Utc::now(),
    )
    .await?;

    Ok(Json(PaymentUrlResponse {
        code: "00",
        message: "success",
        data: url,
    }))
}

/// VNPay IPN endpoint handler. Public; trust comes from the signature.
pub async fn ipn_handler(
    State(state): State<AppState>,
    Query(fields): Query<HashMap<String, String>>,
) -> Json<IpnResponse> {
    Json(reconcile::handle_ipn(state.store.as_ref(), &state.config.vnpay, &fields).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_from_forwarded_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), "127.0.0.1");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        assert_eq!(client_ip(&headers), "203.0.113.9");
    }
}
