pub mod handlers;
pub mod service;
pub mod state_machine;
pub mod status;


pub use handlers::{
    accept_handler, list_all_handler, list_pending_handler, reject_handler,
    update_status_by_order_handler, update_status_handler,
};
pub use service::{accept, list_all, list_pending, mark_paid, reject, update_status, update_status_by_order_id};
pub use status::StatusKind;
