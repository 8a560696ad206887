use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Payment model: settlement recorded from a gateway confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    /// Unique identifier for the payment
    pub id: i64,

    /// The settled order
    pub order_id: i64,

    /// Timestamp when the confirmation was applied
    pub paid_at: DateTime<Utc>,

    /// Amount in major units
    pub amount: Decimal,

    /// Bank or method code reported by the gateway
    pub payment_method: Option<String>,

    /// Gateway transaction reference (unique, the idempotency key)
    pub gateway_txn_ref: String,
}

/// Payment to be inserted.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: i64,
    pub paid_at: DateTime<Utc>,
    pub amount: Decimal,
    pub payment_method: Option<String>,
    pub gateway_txn_ref: String,
}
