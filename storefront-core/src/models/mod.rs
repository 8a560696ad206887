pub mod invoice;
pub mod invoice_request;
pub mod order;
pub mod payment;
pub mod product;
pub mod status;
pub mod user;

pub use invoice::Invoice;
pub use invoice_request::{InvoiceRequest, InvoiceRequestResponse, PendingInvoiceRequest};
pub use order::{order_total, NewOrder, NewOrderDetail, Order, OrderDetail, OrderResponse};
pub use payment::{NewPayment, Payment};
pub use product::Product;
pub use status::Status;
pub use user::User;
