pub mod handlers;
pub mod ledger;
pub mod workflow;

#[cfg(test)]
mod tests;

pub use handlers::{
    create_order_handler, get_order_handler, list_orders_handler, list_user_orders_handler,
    undo_order_handler, update_order_status_handler,
};
pub use workflow::{create_order, undo_order_creation, update_order, DateRange};
