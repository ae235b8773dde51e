//! Authentication helpers for Jotter.
//!
//! Token issuance lives outside this crate; the web layer only validates
//! bearer tokens. This module owns the private-space PIN.

pub mod pin;

pub use pin::{has_pin_set, remove_pin, require_pin, set_pin, PinError};
