//! Structured logging for corkboard
//!
//! Binaries call [`init`] once with a [`Profile`]. Library code logs through
//! `tracing` directly, with the `log_op_*` macros marking facade operation
//! boundaries. Tests call [`init_test_capture`] instead of `init` and
//! assert on the captured events.
//!
//! ```rust
//! use corkboard_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
