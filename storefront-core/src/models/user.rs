use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// User model representing an account that can place orders.
///
/// Users are managed by the identity side of the system; the order core only
/// resolves them by id and reads their display fields.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique identifier for the user (matches the JWT subject)
    pub id: Uuid,

    /// User's email address (unique)
    pub email: String,

    /// User's full name
    pub full_name: Option<String>,

    /// Timestamp when the user was created
    pub created_at: DateTime<Utc>,

    /// Timestamp when the user was last updated
    pub updated_at: DateTime<Utc>,

    /// Whether the user account is active
    pub is_active: bool,
}

impl User {
    /// Name shown in denormalized views: the full name, or the email when
    /// no name was recorded.
    pub fn display_name(&self) -> String {
        match &self.full_name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => self.email.clone(),
        }
    }
}
