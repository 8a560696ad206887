use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Invoice request model: the workflow object deciding whether an order
/// becomes a formal invoice. Exactly one exists per order.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceRequest {
    /// Unique identifier for the request
    pub id: i64,

    /// ID of the requesting user
    pub user_id: Uuid,

    /// ID of the order this request belongs to (unique)
    pub order_id: i64,

    /// Current status reference
    pub status_id: i32,

    /// Timestamp when the request was created
    pub created_at: DateTime<Utc>,
}

/// Summary shown in the pending review queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingInvoiceRequest {
    pub id: i64,
    pub user_name: String,
    pub order_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Invoice request response with its status name resolved.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceRequestResponse {
    pub id: i64,
    pub order_id: i64,
    pub user_name: String,
    pub status_id: i32,
    pub status_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<InvoiceRequestResponse> for PendingInvoiceRequest {
    fn from(view: InvoiceRequestResponse) -> Self {
        PendingInvoiceRequest {
            id: view.id,
            user_name: view.user_name,
            order_id: view.order_id,
            created_at: view.created_at,
        }
    }
}
