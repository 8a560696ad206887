pub mod handlers;
pub mod reconcile;
pub mod vnpay;


pub use handlers::{create_payment_handler, ipn_handler};
pub use reconcile::{create_payment_url, handle_ipn};
pub use vnpay::{IpnCode, IpnResponse};
