use std::fmt;

use crate::error::{AppError, AppResult};
use crate::invoicing::status::{self, StatusKind};

/// Something that can happen to an invoice request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    /// Reviewer approves the request
    Accept,

    /// Reviewer refuses the request
    Reject,

    /// Administrator assigns a status id directly
    Assign(i32),

    /// Gateway confirmed payment for the request's order
    MarkPaid,
}

impl RequestAction {
    fn verb(self) -> &'static str {
        match self {
            RequestAction::Accept => "accept",
            RequestAction::Reject => "reject",
            RequestAction::Assign(_) => "update",
            RequestAction::MarkPaid => "mark paid",
        }
    }
}

impl fmt::Display for RequestAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestAction::Assign(id) => write!(f, "assign_{id}"),
            other => f.write_str(&other.verb().replace(' ', "_")),
        }
    }
}

/// Side effect the service must apply together with the status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Create the invoice, copying the order total
    IssueInvoice,

    /// Copy the new status onto the linked order
    SyncOrder,

    /// Move the linked order and any invoice to paid
    Settle,

    /// Leave everything as it is
    None,
}

/// Result of applying an action to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Status id the request ends up in
    pub next: i32,
    pub effect: Effect,
}

impl Step {
    fn stay(current: i32) -> Self {
        Step {
            next: current,
            effect: Effect::None,
        }
    }

    pub fn changes(&self, current: i32) -> bool {
        self.next != current
    }
}

/// Trait for the invoice request state machine.
///
/// Implementations decide, without touching storage, whether an action is
/// legal from the current status and what has to happen if it is.
pub trait Transition {
    /// Determines the step for `action` on request `request_id` currently in
    /// status `current`.
    fn transition(request_id: i64, current: i32, action: RequestAction) -> AppResult<Step>;

    /// Status of a freshly created request.
    fn initial_state() -> StatusKind {
        StatusKind::Pending
    }
}

/// Review workflow:
/// - Pending -> Approved (accept, issues the invoice)
/// - Pending -> Rejected (reject, terminal)
/// - Pending/Approved/Processing -> Paid (payment confirmed)
/// - any non-paid -> 1..=3 (administrative override, synced onto the order)
///
/// Paid is terminal for every action. A payment arriving for a rejected
/// request leaves the request alone.
pub struct InvoiceRequestMachine;

impl Transition for InvoiceRequestMachine {
    fn transition(request_id: i64, current: i32, action: RequestAction) -> AppResult<Step> {
        let refuse = || AppError::InvalidTransition {
            entity: "invoice request",
            id: request_id,
            action: action.verb(),
            current: status::label(current),
        };
        let kind = StatusKind::from_id(current);

        match action {
            RequestAction::Accept => match kind {
                Some(StatusKind::Pending) => Ok(Step {
                    next: StatusKind::Approved.id(),
                    effect: Effect::IssueInvoice,
                }),
                _ => Err(refuse()),
            },
            RequestAction::Reject => match kind {
                Some(StatusKind::Pending) => Ok(Step {
                    next: StatusKind::Rejected.id(),
                    effect: Effect::None,
                }),
                _ => Err(refuse()),
            },
            RequestAction::Assign(target) => {
                status::ensure_admin_assignable(target)?;
                if kind == Some(StatusKind::Paid) {
                    return Err(AppError::PaidRequestImmutable { request_id });
                }
                Ok(Step {
                    next: target,
                    effect: Effect::SyncOrder,
                })
            }
            RequestAction::MarkPaid => match kind {
                Some(StatusKind::Paid) | Some(StatusKind::Rejected) => Ok(Step::stay(current)),
                _ => Ok(Step {
                    next: StatusKind::Paid.id(),
                    effect: Effect::Settle,
                }),
            },
        }
    }
}
