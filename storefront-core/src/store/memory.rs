use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::invoicing::status::StatusKind;
use crate::models::{
    Invoice, InvoiceRequest, InvoiceRequestResponse, NewOrder, NewOrderDetail, NewPayment, Order,
    OrderDetail, Payment, Product, Status, User,
};
use crate::store::{Store, UnitOfWork};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: BTreeMap<Uuid, User>,
    statuses: BTreeMap<i32, Status>,
    products: BTreeMap<i64, Product>,
    orders: BTreeMap<i64, Order>,
    order_details: BTreeMap<i64, OrderDetail>,
    invoice_requests: BTreeMap<i64, InvoiceRequest>,
    invoices: BTreeMap<i64, Invoice>,
    payments: BTreeMap<i64, Payment>,
    last_id: i64,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn request_view(&self, request: &InvoiceRequest) -> InvoiceRequestResponse {
        let user_name = self
            .users
            .get(&request.user_id)
            .map(User::display_name)
            .unwrap_or_default();
        let status_name = self
            .statuses
            .get(&request.status_id)
            .map(|s| s.status_name.clone())
            .unwrap_or_default();
        InvoiceRequestResponse {
            id: request.id,
            order_id: request.order_id,
            user_name,
            status_id: request.status_id,
            status_name,
            created_at: request.created_at,
        }
    }
}

/// In-process store with the same constraints as the Postgres schema.
///
/// A unit of work holds the whole store lock and edits a private copy that
/// replaces the shared state on commit, so transactions are fully
/// serialized and an uncommitted one leaves no trace. Used by the test
/// suites and for local runs without `DATABASE_URL`.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store seeded with the status reference rows.
    pub fn new() -> Self {
        let mut state = MemoryState::default();
        for kind in StatusKind::ALL {
            state.statuses.insert(
                kind.id(),
                Status {
                    id: kind.id(),
                    status_name: kind.name().to_string(),
                },
            );
        }
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub async fn add_user(&self, email: &str, full_name: Option<&str>) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: full_name.map(str::to_string),
            created_at: now,
            updated_at: now,
            is_active: true,
        };
        self.state.lock().await.users.insert(user.id, user.clone());
        user
    }

    pub async fn add_product(&self, name: &str, price: Decimal, quantity: i32) -> Product {
        let mut state = self.state.lock().await;
        let product = Product {
            id: state.next_id(),
            name: name.to_string(),
            price,
            quantity,
            active: true,
            category_id: None,
        };
        state.products.insert(product.id, product.clone());
        product
    }

    /// Replaces a product row as-is (price changes, deactivation).
    pub async fn put_product(&self, product: Product) {
        self.state.lock().await.products.insert(product.id, product);
    }

    pub async fn product(&self, id: i64) -> Option<Product> {
        self.state.lock().await.products.get(&id).cloned()
    }

    pub async fn orders(&self) -> Vec<Order> {
        self.state.lock().await.orders.values().cloned().collect()
    }

    pub async fn order_details(&self) -> Vec<OrderDetail> {
        self.state.lock().await.order_details.values().cloned().collect()
    }

    pub async fn invoice_requests(&self) -> Vec<InvoiceRequest> {
        self.state.lock().await.invoice_requests.values().cloned().collect()
    }

    pub async fn invoices(&self) -> Vec<Invoice> {
        self.state.lock().await.invoices.values().cloned().collect()
    }

    pub async fn payments(&self) -> Vec<Payment> {
        self.state.lock().await.payments.values().cloned().collect()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(MemoryUnitOfWork { guard, working }))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

fn constraint(message: String) -> AppError {
    AppError::Internal(format!("constraint violation: {message}"))
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn find_user(&mut self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn find_status(&mut self, id: i32) -> AppResult<Option<Status>> {
        Ok(self.working.statuses.get(&id).cloned())
    }

    async fn find_status_by_name(&mut self, name: &str) -> AppResult<Option<Status>> {
        Ok(self
            .working
            .statuses
            .values()
            .find(|s| s.status_name == name)
            .cloned())
    }

    async fn lock_product(&mut self, id: i64) -> AppResult<Option<Product>> {
        Ok(self.working.products.get(&id).cloned())
    }

    async fn set_product_quantity(&mut self, id: i64, quantity: i32) -> AppResult<()> {
        if quantity < 0 {
            return Err(constraint(format!("products.quantity >= 0 (product {id}, got {quantity})")));
        }
        let product = self
            .working
            .products
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("product", id))?;
        product.quantity = quantity;
        Ok(())
    }

    async fn insert_order(&mut self, order: &NewOrder) -> AppResult<Order> {
        if !self.working.users.contains_key(&order.created_by) {
            return Err(constraint(format!("orders.created_by references missing user {}", order.created_by)));
        }
        let order = Order {
            id: self.working.next_id(),
            total: order.total,
            status_id: order.status_id,
            created_at: order.created_at,
            created_by: order.created_by,
        };
        self.working.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn insert_order_detail(&mut self, order_id: i64, line: &NewOrderDetail) -> AppResult<OrderDetail> {
        if !self.working.orders.contains_key(&order_id) {
            return Err(constraint(format!("order_details.order_id references missing order {order_id}")));
        }
        if line.quantity() <= 0 {
            return Err(constraint("order_details.quantity > 0".to_string()));
        }
        let detail = OrderDetail {
            id: self.working.next_id(),
            order_id,
            product_id: line.product_id(),
            quantity: line.quantity(),
            price: line.price(),
            subtotal: line.subtotal(),
        };
        self.working.order_details.insert(detail.id, detail.clone());
        Ok(detail)
    }

    async fn find_order(&mut self, id: i64) -> AppResult<Option<Order>> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn lock_order(&mut self, id: i64) -> AppResult<Option<Order>> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn order_details(&mut self, order_id: i64) -> AppResult<Vec<OrderDetail>> {
        Ok(self
            .working
            .order_details
            .values()
            .filter(|d| d.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn orders_by_creator(&mut self, user_id: Uuid) -> AppResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .working
            .orders
            .values()
            .filter(|o| o.created_by == user_id)
            .cloned()
            .collect();
        orders.sort_by_key(|o| (o.created_at, o.id));
        Ok(orders)
    }

    async fn orders_between(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .working
            .orders
            .values()
            .filter(|o| o.created_at >= start && o.created_at <= end)
            .cloned()
            .collect();
        orders.sort_by_key(|o| (o.created_at, o.id));
        Ok(orders)
    }

    async fn update_order_status(&mut self, id: i64, status_id: i32) -> AppResult<()> {
        let order = self
            .working
            .orders
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("order", id))?;
        order.status_id = status_id;
        Ok(())
    }

    async fn delete_order_details(&mut self, order_id: i64) -> AppResult<u64> {
        let before = self.working.order_details.len();
        self.working.order_details.retain(|_, d| d.order_id != order_id);
        Ok((before - self.working.order_details.len()) as u64)
    }

    async fn delete_order(&mut self, id: i64) -> AppResult<()> {
        let referenced = self.working.invoice_requests.values().any(|r| r.order_id == id)
            || self.working.payments.values().any(|p| p.order_id == id);
        if referenced {
            return Err(constraint(format!("order {id} is still referenced")));
        }
        self.working
            .orders
            .remove(&id)
            .ok_or_else(|| AppError::not_found("order", id))?;
        // ON DELETE CASCADE
        self.working.order_details.retain(|_, d| d.order_id != id);
        Ok(())
    }

    async fn insert_invoice_request(
        &mut self,
        user_id: Uuid,
        order_id: i64,
        status_id: i32,
        created_at: DateTime<Utc>,
    ) -> AppResult<InvoiceRequest> {
        if self.working.invoice_requests.values().any(|r| r.order_id == order_id) {
            return Err(constraint(format!("invoice_requests.order_id unique ({order_id})")));
        }
        let request = InvoiceRequest {
            id: self.working.next_id(),
            user_id,
            order_id,
            status_id,
            created_at,
        };
        self.working.invoice_requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn find_invoice_request(&mut self, id: i64) -> AppResult<Option<InvoiceRequest>> {
        Ok(self.working.invoice_requests.get(&id).cloned())
    }

    async fn lock_invoice_request(&mut self, id: i64) -> AppResult<Option<InvoiceRequest>> {
        Ok(self.working.invoice_requests.get(&id).cloned())
    }

    async fn lock_invoice_request_by_order(&mut self, order_id: i64) -> AppResult<Option<InvoiceRequest>> {
        Ok(self
            .working
            .invoice_requests
            .values()
            .find(|r| r.order_id == order_id)
            .cloned())
    }

    async fn update_invoice_request_status(&mut self, id: i64, status_id: i32) -> AppResult<()> {
        let request = self
            .working
            .invoice_requests
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("invoice request", id))?;
        request.status_id = status_id;
        Ok(())
    }

    async fn delete_invoice_request(&mut self, id: i64) -> AppResult<()> {
        if self.working.invoices.values().any(|i| i.invoice_request_id == id) {
            return Err(constraint(format!("invoice request {id} is still referenced")));
        }
        self.working
            .invoice_requests
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found("invoice request", id))
    }

    async fn invoice_request_view(&mut self, id: i64) -> AppResult<Option<InvoiceRequestResponse>> {
        Ok(self
            .working
            .invoice_requests
            .get(&id)
            .map(|r| self.working.request_view(r)))
    }

    async fn invoice_request_views(&mut self, status_id: Option<i32>) -> AppResult<Vec<InvoiceRequestResponse>> {
        let mut views: Vec<InvoiceRequestResponse> = self
            .working
            .invoice_requests
            .values()
            .filter(|r| status_id.map_or(true, |s| r.status_id == s))
            .map(|r| self.working.request_view(r))
            .collect();
        views.sort_by_key(|v| (v.created_at, v.id));
        Ok(views)
    }

    async fn insert_invoice(
        &mut self,
        invoice_request_id: i64,
        status_id: i32,
        total: Decimal,
        issued_at: DateTime<Utc>,
    ) -> AppResult<Invoice> {
        if self
            .working
            .invoices
            .values()
            .any(|i| i.invoice_request_id == invoice_request_id)
        {
            return Err(constraint(format!(
                "invoices.invoice_request_id unique ({invoice_request_id})"
            )));
        }
        let invoice = Invoice {
            id: self.working.next_id(),
            invoice_request_id,
            issued_at,
            status_id,
            total,
        };
        self.working.invoices.insert(invoice.id, invoice.clone());
        Ok(invoice)
    }

    async fn find_invoice_by_request(&mut self, invoice_request_id: i64) -> AppResult<Option<Invoice>> {
        Ok(self
            .working
            .invoices
            .values()
            .find(|i| i.invoice_request_id == invoice_request_id)
            .cloned())
    }

    async fn update_invoice_status(&mut self, id: i64, status_id: i32) -> AppResult<()> {
        let invoice = self
            .working
            .invoices
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("invoice", id))?;
        invoice.status_id = status_id;
        Ok(())
    }

    async fn find_payment_by_txn_ref(&mut self, gateway_txn_ref: &str) -> AppResult<Option<Payment>> {
        Ok(self
            .working
            .payments
            .values()
            .find(|p| p.gateway_txn_ref == gateway_txn_ref)
            .cloned())
    }

    async fn payments_for_order(&mut self, order_id: i64) -> AppResult<Vec<Payment>> {
        Ok(self
            .working
            .payments
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn insert_payment(&mut self, payment: &NewPayment) -> AppResult<Option<Payment>> {
        if self
            .working
            .payments
            .values()
            .any(|p| p.gateway_txn_ref == payment.gateway_txn_ref)
        {
            return Ok(None);
        }
        if !self.working.orders.contains_key(&payment.order_id) {
            return Err(constraint(format!(
                "payments.order_id references missing order {}",
                payment.order_id
            )));
        }
        let inserted = Payment {
            id: self.working.next_id(),
            order_id: payment.order_id,
            paid_at: payment.paid_at,
            amount: payment.amount,
            payment_method: payment.payment_method.clone(),
            gateway_txn_ref: payment.gateway_txn_ref.clone(),
        };
        self.working.payments.insert(inserted.id, inserted.clone());
        Ok(Some(inserted))
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_uncommitted_work_is_discarded() {
        let store = MemoryStore::new();
        let product = store
            .add_product("Green tea", Decimal::from_str("3.50").unwrap(), 10)
            .await;

        {
            let mut uow = store.begin().await.unwrap();
            uow.set_product_quantity(product.id, 4).await.unwrap();
        }
        assert_eq!(store.product(product.id).await.unwrap().quantity, 10);

        let mut uow = store.begin().await.unwrap();
        uow.set_product_quantity(product.id, 4).await.unwrap();
        uow.commit().await.unwrap();
        assert_eq!(store.product(product.id).await.unwrap().quantity, 4);
    }

    #[tokio::test]
    async fn test_negative_stock_rejected() {
        let store = MemoryStore::new();
        let product = store
            .add_product("Green tea", Decimal::from_str("3.50").unwrap(), 1)
            .await;

        let mut uow = store.begin().await.unwrap();
        assert!(uow.set_product_quantity(product.id, -1).await.is_err());
    }

    #[tokio::test]
    async fn test_seeded_statuses_resolve_by_name() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let paid = uow.find_status_by_name("paid").await.unwrap().unwrap();
        assert_eq!(paid.id, StatusKind::Paid.id());
    }
}
