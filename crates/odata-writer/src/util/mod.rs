//! Utility modules.

pub mod key;

pub use key::{format_key_segment, format_key_value};
