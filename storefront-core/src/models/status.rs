use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Status reference row, shared by orders, invoice requests and invoices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Status {
    /// Stable identifier (seeded, never generated)
    pub id: i32,

    /// Display name, e.g. "pending"
    pub status_name: String,
}
