//! Tower middleware applied to every HTTP route.

pub mod stack;

pub use stack::{REQUEST_ID_HEADER, apply_http_stack};
