use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Order model representing a purchase.
///
/// The total is always derived from the order's detail lines at creation
/// time; it is never taken from the client.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    /// Unique identifier for the order
    pub id: i64,

    /// Sum of all line subtotals
    pub total: Decimal,

    /// Current status reference
    pub status_id: i32,

    /// Timestamp when the order was created
    pub created_at: DateTime<Utc>,

    /// ID of the user who created the order
    pub created_by: Uuid,
}

/// One line of an order: a product, a quantity and the unit price captured
/// when the order was placed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderDetail {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i32,

    /// Unit price snapshot, decoupled from the product's current price
    pub price: Decimal,

    /// `quantity * price`
    pub subtotal: Decimal,
}

/// Order header to be inserted.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub total: Decimal,
    pub status_id: i32,
    pub created_at: DateTime<Utc>,
    pub created_by: Uuid,
}

/// Detail line to be inserted. The subtotal is computed from the quantity
/// and price on construction and the fields are not writable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderDetail {
    product_id: i64,
    quantity: i32,
    price: Decimal,
    subtotal: Decimal,
}

impl NewOrderDetail {
    pub fn new(product_id: i64, quantity: i32, price: Decimal) -> Self {
        let mut line = Self {
            product_id,
            quantity,
            price,
            subtotal: Decimal::ZERO,
        };
        line.recompute();
        line
    }

    pub fn product_id(&self) -> i64 {
        self.product_id
    }

    pub fn quantity(&self) -> i32 {
        self.quantity
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn subtotal(&self) -> Decimal {
        self.subtotal
    }

    fn recompute(&mut self) {
        self.subtotal = self.price * Decimal::from(self.quantity);
    }
}

/// Sums line subtotals into an order total.
pub fn order_total<'a, I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = &'a NewOrderDetail>,
{
    lines.into_iter().map(NewOrderDetail::subtotal).sum()
}

/// Order response (public representation including its lines)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: i64,
    pub total: Decimal,
    pub status_id: i32,
    pub status_name: String,
    pub created_at: DateTime<Utc>,
    pub created_by: Uuid,
    pub order_details: Vec<OrderDetail>,
}

impl OrderResponse {
    pub fn new(order: Order, status_name: String, order_details: Vec<OrderDetail>) -> Self {
        OrderResponse {
            id: order.id,
            total: order.total,
            status_id: order.status_id,
            status_name,
            created_at: order.created_at,
            created_by: order.created_by,
            order_details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_subtotal_is_exact() {
        let line = NewOrderDetail::new(1, 3, dec("0.10"));
        assert_eq!(line.subtotal(), dec("0.30"));
    }

    #[test]
    fn test_order_total_sums_lines() {
        let lines = vec![
            NewOrderDetail::new(1, 3, dec("12.50")),
            NewOrderDetail::new(2, 1, dec("0.01")),
            NewOrderDetail::new(3, 7, dec("1.10")),
        ];
        assert_eq!(order_total(&lines), dec("45.21"));
    }

    #[test]
    fn test_order_total_of_nothing_is_zero() {
        assert_eq!(order_total(&Vec::<NewOrderDetail>::new()), Decimal::ZERO);
    }
}
