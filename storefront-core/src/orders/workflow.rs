use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::invoicing::state_machine::{InvoiceRequestMachine, Transition};
use crate::invoicing::status::{self, StatusKind};
use crate::models::{order_total, NewOrder, NewOrderDetail, Order, OrderResponse};
use crate::orders::ledger;
use crate::store::{Store, UnitOfWork};

/// Creates an order for `creator` from a product-to-quantity map.
///
/// Stock is reserved line by line in ascending product id order. The order,
/// its lines, the stock changes and the companion pending invoice request
/// are committed together or not at all.
pub async fn create_order(
    store: &dyn Store,
    creator: Uuid,
    items: &BTreeMap<i64, i32>,
    status_id: Option<i32>,
) -> AppResult<OrderResponse> {
    if items.is_empty() {
        return Err(AppError::BadRequest("order must contain at least one item".to_string()));
    }
    if let Some((product_id, quantity)) = items.iter().find(|(_, qty)| **qty <= 0) {
        return Err(AppError::BadRequest(format!(
            "quantity for product {product_id} must be positive, got {quantity}"
        )));
    }

    let mut uow = store.begin().await?;

    let user = uow
        .find_user(creator)
        .await?
        .ok_or_else(|| AppError::not_found("user", creator))?;
    let order_status = match status_id {
        Some(id) => status::resolve(uow.as_mut(), id).await?,
        None => status::resolve_kind(uow.as_mut(), StatusKind::Pending).await?,
    };

    let mut lines = Vec::with_capacity(items.len());
    for (&product_id, &quantity) in items {
        let price = ledger::reserve(uow.as_mut(), product_id, quantity).await?;
        lines.push(NewOrderDetail::new(product_id, quantity, price));
    }

    let now = Utc::now();
    let order = uow
        .insert_order(&NewOrder {
            total: order_total(&lines),
            status_id: order_status.id,
            created_at: now,
            created_by: user.id,
        })
        .await?;

    let mut details = Vec::with_capacity(lines.len());
    for line in &lines {
        details.push(uow.insert_order_detail(order.id, line).await?);
    }

    let request_status = status::resolve_kind(uow.as_mut(), InvoiceRequestMachine::initial_state()).await?;
    let request = uow
        .insert_invoice_request(user.id, order.id, request_status.id, now)
        .await?;

    uow.commit().await?;

    info!(
        order_id = order.id,
        invoice_request_id = request.id,
        user_id = %user.id,
        lines = details.len(),
        total = %order.total,
        "Order created"
    );

    Ok(OrderResponse::new(order, order_status.status_name, details))
}

/// Reverses an order: puts every line's quantity back into stock and deletes
/// the order, its lines and its pending invoice request.
///
/// Refused once the order has moved past review: an invoice was issued, a
/// payment was recorded, or its request is no longer pending.
pub async fn undo_order_creation(store: &dyn Store, order_id: i64) -> AppResult<()> {
    let mut uow = store.begin().await?;

    let order = uow
        .lock_order(order_id)
        .await?
        .ok_or_else(|| AppError::not_found("order", order_id))?;

    let refuse = |current: String| AppError::InvalidTransition {
        entity: "order",
        id: order_id,
        action: "undo",
        current,
    };

    let request = uow.lock_invoice_request_by_order(order.id).await?;
    if let Some(request) = &request {
        if request.status_id != StatusKind::Pending.id() {
            return Err(refuse(status::label(request.status_id)));
        }
        if uow.find_invoice_by_request(request.id).await?.is_some() {
            return Err(refuse("invoiced".to_string()));
        }
    }
    if !uow.payments_for_order(order.id).await?.is_empty() {
        return Err(refuse("paid".to_string()));
    }

    let details = uow.order_details(order.id).await?;
    for detail in &details {
        ledger::release(uow.as_mut(), detail.product_id, detail.quantity).await?;
    }

    if let Some(request) = &request {
        uow.delete_invoice_request(request.id).await?;
    }
    uow.delete_order_details(order.id).await?;
    uow.delete_order(order.id).await?;
    uow.commit().await?;

    info!(order_id, lines = details.len(), "Order creation undone");
    Ok(())
}

/// Administrative status override on an order. Any existing status may be
/// assigned; the invoice request is left untouched.
pub async fn update_order(store: &dyn Store, order_id: i64, status_id: i32) -> AppResult<()> {
    let mut uow = store.begin().await?;

    let order = uow
        .lock_order(order_id)
        .await?
        .ok_or_else(|| AppError::not_found("order", order_id))?;
    let target = status::resolve(uow.as_mut(), status_id).await?;

    uow.update_order_status(order.id, target.id).await?;
    uow.commit().await?;

    info!(order_id, from = order.status_id, to = target.id, "Order status updated");
    Ok(())
}

pub async fn get_order(store: &dyn Store, order_id: i64) -> AppResult<OrderResponse> {
    let mut uow = store.begin().await?;
    let order = uow
        .find_order(order_id)
        .await?
        .ok_or_else(|| AppError::not_found("order", order_id))?;
    let mut names = HashMap::new();
    order_view(uow.as_mut(), &mut names, order).await
}

/// Orders created by `user_id`, oldest first.
pub async fn list_by_user(store: &dyn Store, user_id: Uuid) -> AppResult<Vec<OrderResponse>> {
    let mut uow = store.begin().await?;
    let orders = uow.orders_by_creator(user_id).await?;
    order_views(uow.as_mut(), orders).await
}

/// Orders created within `range`, oldest first.
pub async fn list_between(store: &dyn Store, range: DateRange) -> AppResult<Vec<OrderResponse>> {
    let mut uow = store.begin().await?;
    let orders = uow.orders_between(range.start, range.end).await?;
    order_views(uow.as_mut(), orders).await
}

async fn order_views(uow: &mut dyn UnitOfWork, orders: Vec<Order>) -> AppResult<Vec<OrderResponse>> {
    let mut names = HashMap::new();
    let mut views = Vec::with_capacity(orders.len());
    for order in orders {
        views.push(order_view(uow, &mut names, order).await?);
    }
    Ok(views)
}

async fn order_view(
    uow: &mut dyn UnitOfWork,
    names: &mut HashMap<i32, String>,
    order: Order,
) -> AppResult<OrderResponse> {
    let status_name = match names.get(&order.status_id) {
        Some(name) => name.clone(),
        None => {
            let name = match uow.find_status(order.status_id).await? {
                Some(status) => status.status_name,
                None => {
                    warn!(order_id = order.id, status_id = order.status_id, "Order references unknown status");
                    status::label(order.status_id)
                }
            };
            names.insert(order.status_id, name.clone());
            name
        }
    };
    let details = uow.order_details(order.id).await?;
    Ok(OrderResponse::new(order, status_name, details))
}

/// Inclusive creation-date window for order listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Builds a range from optional `YYYY-MM-DD` bounds.
    ///
    /// A missing start means the start of the day one year before `now`, a
    /// missing end means `now`. An explicit end covers that whole day.
    pub fn parse(start: Option<&str>, end: Option<&str>, now: DateTime<Utc>) -> AppResult<Self> {
        let start = match start.filter(|s| !s.trim().is_empty()) {
            Some(s) => start_of_day(parse_date("start", s)?),
            None => {
                let today = now.date_naive();
                start_of_day(today.checked_sub_months(Months::new(12)).unwrap_or(today))
            }
        };
        let end = match end.filter(|s| !s.trim().is_empty()) {
            Some(s) => end_of_day(parse_date("end", s)?),
            None => now,
        };

        if start > end {
            return Err(AppError::BadRequest(format!(
                "start date {} is after end date {}",
                start.date_naive(),
                end.date_naive()
            )));
        }
        Ok(DateRange { start, end })
    }
}

fn parse_date(field: &str, value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("{field} must be a YYYY-MM-DD date, got '{value}'")))
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    start_of_day(date) + Duration::days(1) - Duration::microseconds(1)
}
