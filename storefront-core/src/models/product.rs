use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Product model representing a sellable item and its on-hand stock.
///
/// `quantity` is only ever changed by the inventory ledger while an order
/// transaction holds the row lock.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    /// Unique identifier for the product
    pub id: i64,

    /// Product name (used in stock error messages)
    pub name: String,

    /// Current unit price
    pub price: Decimal,

    /// On-hand quantity, never negative
    pub quantity: i32,

    /// Whether the product can be ordered
    pub active: bool,

    /// Optional category reference
    pub category_id: Option<i64>,
}
