//! Structured logging facility for entorm
//!
//! - Single initialization point via `init(profile)`
//! - Structured logging macros (`log_op_start!`, `log_op_end!`, `log_op_error!`)
//! - Test capture mode for deterministic assertions
//!
//! Repositories own the start/end events of an operation. The executor and
//! the store plumbing below it only emit `debug!` events carrying SQL text,
//! so a single call never logs two starts.
//!
//! # Usage
//!
//! ```rust
//! use entorm_core::logging_facility::{init, LogProfile};
//!
//! init(LogProfile::Development);
//! ```

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, LogProfile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
