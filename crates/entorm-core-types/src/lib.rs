//! Core types shared across entorm crates
//!
//! - **Values**: the closed scalar set every column maps onto
//! - **Schema constants**: canonical logging field keys and event names

pub mod schema;
pub mod value;

pub use value::{Value, ValueType};
