//! Domain models for the grocery platform

mod account;
mod file;
mod grn;
mod notification;
mod order;
mod product;
mod purchase_order;
mod return_order;

pub use account::*;
pub use file::*;
pub use grn::*;
pub use notification::*;
pub use order::*;
pub use product::*;
pub use purchase_order::*;
pub use return_order::*;
