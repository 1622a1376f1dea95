//! Business logic services for the grocery platform

pub mod auth;
pub mod file;
pub mod grn;
pub mod notification;
pub mod order;
pub mod product;
pub mod purchase_order;
pub mod return_order;
pub mod status_write;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::AuthService;
pub use file::FileService;
pub use grn::GrnService;
pub use notification::NotificationService;
pub use order::OrderService;
pub use product::ProductService;
pub use purchase_order::PurchaseOrderService;
pub use return_order::ReturnOrderService;
