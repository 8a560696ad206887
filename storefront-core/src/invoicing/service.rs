use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::invoicing::state_machine::{Effect, InvoiceRequestMachine, RequestAction, Transition};
use crate::invoicing::status::{self, StatusKind};
use crate::models::{Invoice, InvoiceRequest, InvoiceRequestResponse, PendingInvoiceRequest};
use crate::store::{Store, UnitOfWork};

/// Outcome of accepting a request: its new view and the issued invoice.
#[derive(Debug, Clone, Serialize)]
pub struct Acceptance {
    pub request: InvoiceRequestResponse,
    pub invoice: Invoice,
}

/// What a payment confirmation did to the order's invoice request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Request, order and invoice moved to paid
    Settled,

    /// Request was already paid
    AlreadyPaid,

    /// Request was rejected and stays rejected
    Ignored,
}

/// Orders are always locked before their invoice request.
async fn lock_order(uow: &mut dyn UnitOfWork, order_id: i64) -> AppResult<()> {
    uow.lock_order(order_id)
        .await?
        .ok_or_else(|| AppError::not_found("order", order_id))?;
    Ok(())
}

async fn lock_request(uow: &mut dyn UnitOfWork, request_id: i64) -> AppResult<InvoiceRequest> {
    uow.lock_invoice_request(request_id)
        .await?
        .ok_or_else(|| AppError::not_found("invoice request", request_id))
}

/// Refuses a decision on a request that already carries an invoice.
async fn ensure_not_invoiced(
    uow: &mut dyn UnitOfWork,
    request: &InvoiceRequest,
    action: &'static str,
) -> AppResult<()> {
    if uow.find_invoice_by_request(request.id).await?.is_some() {
        return Err(AppError::InvalidTransition {
            entity: "invoice request",
            id: request.id,
            action,
            current: "invoiced".to_string(),
        });
    }
    Ok(())
}

async fn view(uow: &mut dyn UnitOfWork, request_id: i64) -> AppResult<InvoiceRequestResponse> {
    uow.invoice_request_view(request_id)
        .await?
        .ok_or_else(|| AppError::not_found("invoice request", request_id))
}

/// Approves a pending request and issues its invoice, copying the order
/// total, in one transaction.
pub async fn accept(store: &dyn Store, request_id: i64) -> AppResult<Acceptance> {
    let mut uow = store.begin().await?;

    let request = lock_request(uow.as_mut(), request_id).await?;
    let approved = status::resolve_kind(uow.as_mut(), StatusKind::Approved).await?;
    InvoiceRequestMachine::transition(request.id, request.status_id, RequestAction::Accept)?;
    ensure_not_invoiced(uow.as_mut(), &request, "accept").await?;

    let order = uow
        .find_order(request.order_id)
        .await?
        .ok_or_else(|| AppError::not_found("order", request.order_id))?;

    uow.update_invoice_request_status(request.id, approved.id).await?;
    let invoice = uow
        .insert_invoice(request.id, approved.id, order.total, Utc::now())
        .await?;
    let view = view(uow.as_mut(), request.id).await?;
    uow.commit().await?;

    info!(
        request_id = request.id,
        order_id = order.id,
        invoice_id = invoice.id,
        total = %invoice.total,
        "Invoice request accepted"
    );

    Ok(Acceptance { request: view, invoice })
}

/// Refuses a pending request. No invoice is created.
pub async fn reject(store: &dyn Store, request_id: i64) -> AppResult<InvoiceRequestResponse> {
    let mut uow = store.begin().await?;

    let request = lock_request(uow.as_mut(), request_id).await?;
    let rejected = status::resolve_kind(uow.as_mut(), StatusKind::Rejected).await?;
    InvoiceRequestMachine::transition(request.id, request.status_id, RequestAction::Reject)?;
    ensure_not_invoiced(uow.as_mut(), &request, "reject").await?;

    uow.update_invoice_request_status(request.id, rejected.id).await?;
    let view = view(uow.as_mut(), request.id).await?;
    uow.commit().await?;

    info!(request_id = request.id, order_id = request.order_id, "Invoice request rejected");
    Ok(view)
}

/// Administrative status assignment on a request, mirrored onto its order.
pub async fn update_status(
    store: &dyn Store,
    request_id: i64,
    status_id: i32,
) -> AppResult<InvoiceRequestResponse> {
    status::ensure_admin_assignable(status_id)?;

    let mut uow = store.begin().await?;
    let order_id = uow
        .find_invoice_request(request_id)
        .await?
        .ok_or_else(|| AppError::not_found("invoice request", request_id))?
        .order_id;
    lock_order(uow.as_mut(), order_id).await?;
    let request = lock_request(uow.as_mut(), request_id).await?;
    assign(uow, request, status_id).await
}

/// Same as [`update_status`], locating the request through its order.
pub async fn update_status_by_order_id(
    store: &dyn Store,
    order_id: i64,
    status_id: i32,
) -> AppResult<InvoiceRequestResponse> {
    status::ensure_admin_assignable(status_id)?;

    let mut uow = store.begin().await?;
    lock_order(uow.as_mut(), order_id).await?;
    let request = uow
        .lock_invoice_request_by_order(order_id)
        .await?
        .ok_or_else(|| AppError::not_found("invoice request for order", order_id))?;
    assign(uow, request, status_id).await
}

async fn assign(
    mut uow: Box<dyn UnitOfWork>,
    request: InvoiceRequest,
    status_id: i32,
) -> AppResult<InvoiceRequestResponse> {
    let target = status::resolve(uow.as_mut(), status_id).await?;
    InvoiceRequestMachine::transition(request.id, request.status_id, RequestAction::Assign(target.id))?;

    uow.update_invoice_request_status(request.id, target.id).await?;
    uow.update_order_status(request.order_id, target.id).await?;
    let view = view(uow.as_mut(), request.id).await?;
    uow.commit().await?;

    info!(
        request_id = request.id,
        order_id = request.order_id,
        from = request.status_id,
        to = target.id,
        "Invoice request status updated"
    );
    Ok(view)
}

/// Moves the order's request (and with it the order and any invoice) to
/// paid. Runs inside the caller's transaction; does not commit.
pub async fn mark_paid(uow: &mut dyn UnitOfWork, order_id: i64) -> AppResult<Settlement> {
    let paid = status::resolve_kind(uow, StatusKind::Paid).await?;

    let Some(request) = uow.lock_invoice_request_by_order(order_id).await? else {
        warn!(order_id, "Paid order has no invoice request; settling the order only");
        uow.update_order_status(order_id, paid.id).await?;
        return Ok(Settlement::Settled);
    };

    let step = InvoiceRequestMachine::transition(request.id, request.status_id, RequestAction::MarkPaid)?;
    match step.effect {
        Effect::Settle => {
            uow.update_invoice_request_status(request.id, paid.id).await?;
            uow.update_order_status(order_id, paid.id).await?;
            if let Some(invoice) = uow.find_invoice_by_request(request.id).await? {
                uow.update_invoice_status(invoice.id, paid.id).await?;
            }
            info!(request_id = request.id, order_id, "Invoice request settled");
            Ok(Settlement::Settled)
        }
        _ if request.status_id == paid.id => Ok(Settlement::AlreadyPaid),
        _ => {
            warn!(
                request_id = request.id,
                order_id,
                status = %status::label(request.status_id),
                "Payment received for a request that cannot be settled"
            );
            Ok(Settlement::Ignored)
        }
    }
}

/// Review queue: requests still waiting for a decision, oldest first.
pub async fn list_pending(store: &dyn Store) -> AppResult<Vec<PendingInvoiceRequest>> {
    let mut uow = store.begin().await?;
    let pending = status::resolve_kind(uow.as_mut(), StatusKind::Pending).await?;
    let views = uow.invoice_request_views(Some(pending.id)).await?;
    Ok(views.into_iter().map(PendingInvoiceRequest::from).collect())
}

/// Every request with its status name resolved.
pub async fn list_all(store: &dyn Store) -> AppResult<Vec<InvoiceRequestResponse>> {
    let mut uow = store.begin().await?;
    uow.invoice_request_views(None).await
}
