use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

use crate::error::{AppError, AppResult};
use crate::models::Status;
use crate::store::UnitOfWork;

/// Well-known status reference rows.
///
/// The ids match the seed rows in `migrations/0001_init.sql` and never
/// change; the names are what the registry stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Pending,
    Rejected,
    /// Accepted by a reviewer, invoice issued, awaiting payment
    Approved,
    Paid,
    Processing,
}

/// Status ids an administrator may assign directly.
pub const ADMIN_ASSIGNABLE: RangeInclusive<i32> = 1..=3;

impl StatusKind {
    pub const ALL: [StatusKind; 5] = [
        StatusKind::Pending,
        StatusKind::Rejected,
        StatusKind::Approved,
        StatusKind::Paid,
        StatusKind::Processing,
    ];

    pub fn id(self) -> i32 {
        match self {
            StatusKind::Pending => 1,
            StatusKind::Rejected => 2,
            StatusKind::Approved => 3,
            StatusKind::Paid => 4,
            StatusKind::Processing => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StatusKind::Pending => "pending",
            StatusKind::Rejected => "rejected",
            StatusKind::Approved => "approved",
            StatusKind::Paid => "paid",
            StatusKind::Processing => "processing",
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolves a status row by id.
pub async fn resolve(uow: &mut dyn UnitOfWork, id: i32) -> AppResult<Status> {
    uow.find_status(id)
        .await?
        .ok_or_else(|| AppError::not_found("status", id))
}

/// Resolves a well-known status through the registry by name, so a missing
/// seed row surfaces as NotFound instead of a dangling foreign key.
pub async fn resolve_kind(uow: &mut dyn UnitOfWork, kind: StatusKind) -> AppResult<Status> {
    uow.find_status_by_name(kind.name())
        .await?
        .ok_or_else(|| AppError::not_found("status", kind.name()))
}

/// Human-readable label for a status id, falling back to the raw id for
/// rows outside the well-known set.
pub fn label(id: i32) -> String {
    StatusKind::from_id(id)
        .map(|kind| kind.name().to_string())
        .unwrap_or_else(|| format!("status {id}"))
}

/// Checks that `status_id` may be assigned administratively.
pub fn ensure_admin_assignable(status_id: i32) -> AppResult<()> {
    if ADMIN_ASSIGNABLE.contains(&status_id) {
        Ok(())
    } else {
        Err(AppError::StatusOutOfRange {
            status_id,
            min: *ADMIN_ASSIGNABLE.start(),
            max: *ADMIN_ASSIGNABLE.end(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Store};

    #[test]
    fn test_ids_round_trip() {
        for kind in StatusKind::ALL {
            assert_eq!(StatusKind::from_id(kind.id()), Some(kind));
        }
        assert_eq!(StatusKind::from_id(0), None);
        assert_eq!(StatusKind::from_id(6), None);
    }

    #[test]
    fn test_paid_is_outside_admin_range() {
        assert!(ensure_admin_assignable(StatusKind::Pending.id()).is_ok());
        assert!(ensure_admin_assignable(StatusKind::Approved.id()).is_ok());
        assert!(matches!(
            ensure_admin_assignable(StatusKind::Paid.id()),
            Err(AppError::StatusOutOfRange { status_id: 4, min: 1, max: 3 })
        ));
        assert!(ensure_admin_assignable(0).is_err());
    }

    #[test]
    fn test_label_for_unknown_id() {
        assert_eq!(label(2), "rejected");
        assert_eq!(label(42), "status 42");
    }

    #[tokio::test]
    async fn test_resolve_missing_status_is_not_found() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();

        let approved = resolve_kind(uow.as_mut(), StatusKind::Approved).await.unwrap();
        assert_eq!(approved.id, 3);

        let err = resolve(uow.as_mut(), 99).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { entity: "status", .. }));
    }
}
