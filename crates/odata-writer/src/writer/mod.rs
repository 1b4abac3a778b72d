//! Payload writer.
//!
//! - [`PayloadWriter`]: synchronous state machine over a [`crate::TokenSink`]
//! - [`AsyncPayloadWriter`]: the same machine draining into an `AsyncWrite`
//!
//! Delta-specific calls (`write_delta_link`, deleted resources) live in
//! `delta`; the scope stack lives in `scope`.

pub mod async_writer;
mod delta;
pub mod machine;
pub mod scope;

#[cfg(test)]
mod tests;

pub use async_writer::AsyncPayloadWriter;
pub use machine::PayloadWriter;
pub use scope::ScopeState;
