//! HTTP route handlers.

pub mod accounts;
pub mod items;
pub mod ops;
pub mod purchases;
