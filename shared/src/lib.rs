//! Shared types and models for the grocery platform
//!
//! This crate contains the domain models, status vocabularies and the status
//! transition policy shared between the backend and the browser (via WASM).

pub mod models;
pub mod status;
pub mod types;
pub mod validation;

pub use models::*;
pub use status::*;
pub use types::*;
pub use validation::*;
