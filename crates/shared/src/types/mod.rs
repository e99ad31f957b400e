//! Common types used across the application.

pub mod amount;
pub mod id;
pub mod pagination;

pub use amount::{BALANCE_TOLERANCE, is_negligible, within_tolerance};
pub use id::*;
pub use pagination::{PageMeta, PageRequest, PageResponse};
