use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::config::VnPayConfig;
use crate::error::{AppError, AppResult};
use crate::invoicing::service::{mark_paid, Settlement};
use crate::models::NewPayment;
use crate::payments::vnpay::{self, IpnCode, IpnResponse, PaymentUrlRequest, GATEWAY_SUCCESS};
use crate::store::Store;

/// Builds the gateway redirect URL for an order. The amount always comes
/// from the stored order total.
pub async fn create_payment_url(
    store: &dyn Store,
    config: &VnPayConfig,
    order_id: i64,
    bank_code: Option<String>,
    client_ip: String,
    now: DateTime<Utc>,
) -> AppResult<String> {
    let mut uow = store.begin().await?;
    let order = uow
        .find_order(order_id)
        .await?
        .ok_or_else(|| AppError::not_found("order", order_id))?;
    if !uow.payments_for_order(order.id).await?.is_empty() {
        return Err(AppError::InvalidTransition {
            entity: "order",
            id: order.id,
            action: "pay",
            current: "paid".to_string(),
        });
    }

    let url = vnpay::build_payment_url(
        config,
        &PaymentUrlRequest {
            order_id: order.id,
            amount: order.total,
            bank_code,
            client_ip,
        },
        now,
    )?;

    info!(order_id = order.id, total = %order.total, "Payment URL created");
    Ok(url)
}

/// Handles one VNPay IPN callback.
///
/// Never fails: every outcome, including internal errors, is turned into
/// an acknowledgement code. Internal errors roll the transaction back.
pub async fn handle_ipn(
    store: &dyn Store,
    config: &VnPayConfig,
    fields: &HashMap<String, String>,
) -> IpnResponse {
    let txn_ref = fields.get("vnp_TxnRef").map(String::as_str).unwrap_or_default();

    if !vnpay::verify_signature(&config.hash_secret, fields) {
        warn!(txn_ref, "IPN rejected: invalid signature");
        return IpnCode::InvalidSignature.into();
    }

    match reconcile(store, fields).await {
        Ok(code) => {
            info!(txn_ref, rsp_code = code.code(), "IPN handled");
            code.into()
        }
        Err(e) => {
            error!(txn_ref, error = %e, "IPN handling failed");
            IpnCode::UnknownError.into()
        }
    }
}

fn field<'a>(fields: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    fields
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn gateway_succeeded(fields: &HashMap<String, String>) -> bool {
    field(fields, "vnp_ResponseCode") == Some(GATEWAY_SUCCESS)
        && field(fields, "vnp_TransactionStatus").map_or(true, |s| s == GATEWAY_SUCCESS)
}

async fn reconcile(store: &dyn Store, fields: &HashMap<String, String>) -> AppResult<IpnCode> {
    let Some(txn_ref) = field(fields, "vnp_TxnRef") else {
        return Ok(IpnCode::OrderNotFound);
    };
    let Some(order_id) = vnpay::parse_order_reference(txn_ref) else {
        warn!(txn_ref, "IPN reference does not name an order");
        return Ok(IpnCode::OrderNotFound);
    };

    let mut uow = store.begin().await?;

    // Held until commit so duplicate callbacks for one order serialize.
    let Some(order) = uow.lock_order(order_id).await? else {
        warn!(order_id, "IPN for unknown order");
        return Ok(IpnCode::OrderNotFound);
    };

    let Some(amount) = field(fields, "vnp_Amount").and_then(vnpay::minor_to_amount) else {
        return Ok(IpnCode::InvalidAmount);
    };
    if amount != order.total {
        warn!(order_id, %amount, total = %order.total, "IPN amount does not match order total");
        return Ok(IpnCode::InvalidAmount);
    }

    let gateway_txn_ref = field(fields, "vnp_TransactionNo").unwrap_or(txn_ref).to_string();
    if uow.find_payment_by_txn_ref(&gateway_txn_ref).await?.is_some()
        || !uow.payments_for_order(order.id).await?.is_empty()
    {
        info!(order_id, %gateway_txn_ref, "Duplicate IPN ignored");
        return Ok(IpnCode::AlreadyConfirmed);
    }

    if !gateway_succeeded(fields) {
        info!(
            order_id,
            response_code = field(fields, "vnp_ResponseCode").unwrap_or_default(),
            "Gateway reported an unsuccessful payment"
        );
        return Ok(IpnCode::ConfirmSuccess);
    }

    let payment = NewPayment {
        order_id: order.id,
        paid_at: Utc::now(),
        amount,
        payment_method: field(fields, "vnp_BankCode").map(str::to_string),
        gateway_txn_ref,
    };
    let Some(payment) = uow.insert_payment(&payment).await? else {
        return Ok(IpnCode::AlreadyConfirmed);
    };

    let settlement = mark_paid(uow.as_mut(), order.id).await?;
    uow.commit().await?;

    info!(
        order_id = order.id,
        payment_id = payment.id,
        amount = %payment.amount,
        settled = settlement == Settlement::Settled,
        "Payment recorded"
    );
    Ok(IpnCode::ConfirmSuccess)
}
