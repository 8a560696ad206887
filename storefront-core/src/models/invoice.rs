use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Invoice model: the financial document issued when an invoice request is
/// approved. At most one invoice exists per request.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    /// Unique identifier for the invoice
    pub id: i64,

    /// The approved request (unique)
    pub invoice_request_id: i64,

    /// Timestamp when the invoice was issued
    pub issued_at: DateTime<Utc>,

    /// Current status reference
    pub status_id: i32,

    /// Copied from the order total at approval time
    pub total: Decimal,
}
