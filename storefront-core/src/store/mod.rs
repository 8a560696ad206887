//! Transactional persistence for the order, invoicing and payment core.
//!
//! Every core operation opens one [`UnitOfWork`], does all of its reads and
//! writes through it, and commits once. Dropping a unit of work without
//! committing rolls everything back, so an early `?` return never leaves a
//! partial write behind.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    Invoice, InvoiceRequest, InvoiceRequestResponse, NewOrder, NewOrderDetail, NewPayment, Order,
    OrderDetail, Payment, Product, Status, User,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Entry point to persistent state.
#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a new transaction.
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;

    /// Cheap connectivity check for health endpoints.
    async fn ping(&self) -> AppResult<()>;
}

/// One transaction. Methods named `lock_*` take a row lock held until the
/// unit of work commits or is dropped.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn find_user(&mut self, id: Uuid) -> AppResult<Option<User>>;
    async fn find_status(&mut self, id: i32) -> AppResult<Option<Status>>;
    async fn find_status_by_name(&mut self, name: &str) -> AppResult<Option<Status>>;

    async fn lock_product(&mut self, id: i64) -> AppResult<Option<Product>>;
    async fn set_product_quantity(&mut self, id: i64, quantity: i32) -> AppResult<()>;

    async fn insert_order(&mut self, order: &NewOrder) -> AppResult<Order>;
    async fn insert_order_detail(&mut self, order_id: i64, line: &NewOrderDetail) -> AppResult<OrderDetail>;
    async fn find_order(&mut self, id: i64) -> AppResult<Option<Order>>;
    async fn lock_order(&mut self, id: i64) -> AppResult<Option<Order>>;
    async fn order_details(&mut self, order_id: i64) -> AppResult<Vec<OrderDetail>>;
    async fn orders_by_creator(&mut self, user_id: Uuid) -> AppResult<Vec<Order>>;
    async fn orders_between(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<Vec<Order>>;
    async fn update_order_status(&mut self, id: i64, status_id: i32) -> AppResult<()>;
    async fn delete_order_details(&mut self, order_id: i64) -> AppResult<u64>;
    async fn delete_order(&mut self, id: i64) -> AppResult<()>;

    async fn insert_invoice_request(
        &mut self,
        user_id: Uuid,
        order_id: i64,
        status_id: i32,
        created_at: DateTime<Utc>,
    ) -> AppResult<InvoiceRequest>;
    async fn find_invoice_request(&mut self, id: i64) -> AppResult<Option<InvoiceRequest>>;
    async fn lock_invoice_request(&mut self, id: i64) -> AppResult<Option<InvoiceRequest>>;
    async fn lock_invoice_request_by_order(&mut self, order_id: i64) -> AppResult<Option<InvoiceRequest>>;
    async fn update_invoice_request_status(&mut self, id: i64, status_id: i32) -> AppResult<()>;
    async fn delete_invoice_request(&mut self, id: i64) -> AppResult<()>;
    async fn invoice_request_view(&mut self, id: i64) -> AppResult<Option<InvoiceRequestResponse>>;

    /// All requests (optionally only those in `status_id`), oldest first.
    async fn invoice_request_views(&mut self, status_id: Option<i32>) -> AppResult<Vec<InvoiceRequestResponse>>;

    async fn insert_invoice(
        &mut self,
        invoice_request_id: i64,
        status_id: i32,
        total: Decimal,
        issued_at: DateTime<Utc>,
    ) -> AppResult<Invoice>;
    async fn find_invoice_by_request(&mut self, invoice_request_id: i64) -> AppResult<Option<Invoice>>;
    async fn update_invoice_status(&mut self, id: i64, status_id: i32) -> AppResult<()>;

    async fn find_payment_by_txn_ref(&mut self, gateway_txn_ref: &str) -> AppResult<Option<Payment>>;
    async fn payments_for_order(&mut self, order_id: i64) -> AppResult<Vec<Payment>>;

    /// Inserts a payment; `None` when the gateway reference is already recorded.
    async fn insert_payment(&mut self, payment: &NewPayment) -> AppResult<Option<Payment>>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}
