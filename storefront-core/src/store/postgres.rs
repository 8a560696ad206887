use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    Invoice, InvoiceRequest, InvoiceRequestResponse, NewOrder, NewOrderDetail, NewPayment, Order,
    OrderDetail, Payment, Product, Status, User,
};
use crate::store::{Store, UnitOfWork};

const ORDER_COLUMNS: &str = "id, total, status_id, created_at, created_by";
const DETAIL_COLUMNS: &str = "id, order_id, product_id, quantity, price, subtotal";
const REQUEST_COLUMNS: &str = "id, user_id, order_id, status_id, created_at";
const INVOICE_COLUMNS: &str = "id, invoice_request_id, issued_at, status_id, total";
const PAYMENT_COLUMNS: &str = "id, order_id, paid_at, amount, payment_method, gateway_txn_ref";

const REQUEST_VIEW_SELECT: &str = r#"
    SELECT
        r.id, r.order_id,
        COALESCE(NULLIF(TRIM(u.full_name), ''), u.email) AS user_name,
        r.status_id, s.status_name, r.created_at
    FROM invoice_requests r
    JOIN users u ON u.id = r.user_id
    JOIN statuses s ON s.id = r.status_id
"#;

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// A Postgres transaction. Rolled back by sqlx when dropped uncommitted.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

fn expect_one(rows: u64, entity: &'static str, id: impl ToString) -> AppResult<()> {
    if rows == 0 {
        Err(AppError::not_found(entity, id))
    } else {
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn find_user(&mut self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, full_name, created_at, updated_at, is_active FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(user)
    }

    async fn find_status(&mut self, id: i32) -> AppResult<Option<Status>> {
        let status = sqlx::query_as::<_, Status>("SELECT id, status_name FROM statuses WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(status)
    }

    async fn find_status_by_name(&mut self, name: &str) -> AppResult<Option<Status>> {
        let status =
            sqlx::query_as::<_, Status>("SELECT id, status_name FROM statuses WHERE status_name = $1")
                .bind(name)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(status)
    }

    async fn lock_product(&mut self, id: i64) -> AppResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT id, name, price, quantity, active, category_id FROM products WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(product)
    }

    async fn set_product_quantity(&mut self, id: i64, quantity: i32) -> AppResult<()> {
        let result = sqlx::query("UPDATE products SET quantity = $2 WHERE id = $1")
            .bind(id)
            .bind(quantity)
            .execute(&mut *self.tx)
            .await?;
        expect_one(result.rows_affected(), "product", id)
    }

    async fn insert_order(&mut self, order: &NewOrder) -> AppResult<Order> {
        let sql = format!(
            "INSERT INTO orders (total, status_id, created_at, created_by) VALUES ($1, $2, $3, $4) RETURNING {ORDER_COLUMNS}"
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(order.total)
            .bind(order.status_id)
            .bind(order.created_at)
            .bind(order.created_by)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(order)
    }

    async fn insert_order_detail(&mut self, order_id: i64, line: &NewOrderDetail) -> AppResult<OrderDetail> {
        let sql = format!(
            "INSERT INTO order_details (order_id, product_id, quantity, price, subtotal) VALUES ($1, $2, $3, $4, $5) RETURNING {DETAIL_COLUMNS}"
        );
        let detail = sqlx::query_as::<_, OrderDetail>(&sql)
            .bind(order_id)
            .bind(line.product_id())
            .bind(line.quantity())
            .bind(line.price())
            .bind(line.subtotal())
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(detail)
    }

    async fn find_order(&mut self, id: i64) -> AppResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(order)
    }

    async fn lock_order(&mut self, id: i64) -> AppResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(order)
    }

    async fn order_details(&mut self, order_id: i64) -> AppResult<Vec<OrderDetail>> {
        let sql = format!("SELECT {DETAIL_COLUMNS} FROM order_details WHERE order_id = $1 ORDER BY id");
        let details = sqlx::query_as::<_, OrderDetail>(&sql)
            .bind(order_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(details)
    }

    async fn orders_by_creator(&mut self, user_id: Uuid) -> AppResult<Vec<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE created_by = $1 ORDER BY created_at, id");
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(orders)
    }

    async fn orders_between(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE created_at BETWEEN $1 AND $2 ORDER BY created_at, id"
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(start)
            .bind(end)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(orders)
    }

    async fn update_order_status(&mut self, id: i64, status_id: i32) -> AppResult<()> {
        let result = sqlx::query("UPDATE orders SET status_id = $2 WHERE id = $1")
            .bind(id)
            .bind(status_id)
            .execute(&mut *self.tx)
            .await?;
        expect_one(result.rows_affected(), "order", id)
    }

    async fn delete_order_details(&mut self, order_id: i64) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM order_details WHERE order_id = $1")
            .bind(order_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_order(&mut self, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        expect_one(result.rows_affected(), "order", id)
    }

    async fn insert_invoice_request(
        &mut self,
        user_id: Uuid,
        order_id: i64,
        status_id: i32,
        created_at: DateTime<Utc>,
    ) -> AppResult<InvoiceRequest> {
        let sql = format!(
            "INSERT INTO invoice_requests (user_id, order_id, status_id, created_at) VALUES ($1, $2, $3, $4) RETURNING {REQUEST_COLUMNS}"
        );
        let request = sqlx::query_as::<_, InvoiceRequest>(&sql)
            .bind(user_id)
            .bind(order_id)
            .bind(status_id)
            .bind(created_at)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(request)
    }

    async fn find_invoice_request(&mut self, id: i64) -> AppResult<Option<InvoiceRequest>> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM invoice_requests WHERE id = $1");
        let request = sqlx::query_as::<_, InvoiceRequest>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(request)
    }

    async fn lock_invoice_request(&mut self, id: i64) -> AppResult<Option<InvoiceRequest>> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM invoice_requests WHERE id = $1 FOR UPDATE");
        let request = sqlx::query_as::<_, InvoiceRequest>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(request)
    }

    async fn lock_invoice_request_by_order(&mut self, order_id: i64) -> AppResult<Option<InvoiceRequest>> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM invoice_requests WHERE order_id = $1 FOR UPDATE");
        let request = sqlx::query_as::<_, InvoiceRequest>(&sql)
            .bind(order_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(request)
    }

    async fn update_invoice_request_status(&mut self, id: i64, status_id: i32) -> AppResult<()> {
        let result = sqlx::query("UPDATE invoice_requests SET status_id = $2 WHERE id = $1")
            .bind(id)
            .bind(status_id)
            .execute(&mut *self.tx)
            .await?;
        expect_one(result.rows_affected(), "invoice request", id)
    }

    async fn delete_invoice_request(&mut self, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM invoice_requests WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        expect_one(result.rows_affected(), "invoice request", id)
    }

    async fn invoice_request_view(&mut self, id: i64) -> AppResult<Option<InvoiceRequestResponse>> {
        let sql = format!("{REQUEST_VIEW_SELECT} WHERE r.id = $1");
        let view = sqlx::query_as::<_, InvoiceRequestResponse>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(view)
    }

    async fn invoice_request_views(&mut self, status_id: Option<i32>) -> AppResult<Vec<InvoiceRequestResponse>> {
        let sql = format!(
            "{REQUEST_VIEW_SELECT} WHERE ($1::INTEGER IS NULL OR r.status_id = $1) ORDER BY r.created_at, r.id"
        );
        let views = sqlx::query_as::<_, InvoiceRequestResponse>(&sql)
            .bind(status_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(views)
    }

    async fn insert_invoice(
        &mut self,
        invoice_request_id: i64,
        status_id: i32,
        total: Decimal,
        issued_at: DateTime<Utc>,
    ) -> AppResult<Invoice> {
        let sql = format!(
            "INSERT INTO invoices (invoice_request_id, issued_at, status_id, total) VALUES ($1, $2, $3, $4) RETURNING {INVOICE_COLUMNS}"
        );
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(invoice_request_id)
            .bind(issued_at)
            .bind(status_id)
            .bind(total)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(invoice)
    }

    async fn find_invoice_by_request(&mut self, invoice_request_id: i64) -> AppResult<Option<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE invoice_request_id = $1");
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(invoice_request_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(invoice)
    }

    async fn update_invoice_status(&mut self, id: i64, status_id: i32) -> AppResult<()> {
        let result = sqlx::query("UPDATE invoices SET status_id = $2 WHERE id = $1")
            .bind(id)
            .bind(status_id)
            .execute(&mut *self.tx)
            .await?;
        expect_one(result.rows_affected(), "invoice", id)
    }

    async fn find_payment_by_txn_ref(&mut self, gateway_txn_ref: &str) -> AppResult<Option<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE gateway_txn_ref = $1");
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(gateway_txn_ref)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(payment)
    }

    async fn payments_for_order(&mut self, order_id: i64) -> AppResult<Vec<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 ORDER BY paid_at, id");
        let payments = sqlx::query_as::<_, Payment>(&sql)
            .bind(order_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(payments)
    }

    async fn insert_payment(&mut self, payment: &NewPayment) -> AppResult<Option<Payment>> {
        // ON CONFLICT DO NOTHING RETURNING distinguishes insert from replay atomically.
        let sql = format!(
            "INSERT INTO payments (order_id, paid_at, amount, payment_method, gateway_txn_ref) VALUES ($1, $2, $3, $4, $5) ON CONFLICT (gateway_txn_ref) DO NOTHING RETURNING {PAYMENT_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, Payment>(&sql)
            .bind(payment.order_id)
            .bind(payment.paid_at)
            .bind(payment.amount)
            .bind(payment.payment_method.as_deref())
            .bind(&payment.gateway_txn_ref)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(inserted)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
