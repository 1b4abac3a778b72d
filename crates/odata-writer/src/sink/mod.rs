//! Token sink abstraction.
//!
//! The payload writer never produces bytes itself; it drives a [`TokenSink`]
//! with structural JSON tokens. [`JsonTokenWriter`] is the conformant JSON
//! emitter used by default.

pub mod json;

use std::io;

use serde_json::Value;

pub use json::JsonTokenWriter;

/// A streaming JSON token emitter.
pub trait TokenSink {
    fn start_object(&mut self) -> io::Result<()>;

    fn end_object(&mut self) -> io::Result<()>;

    fn start_array(&mut self) -> io::Result<()>;

    fn end_array(&mut self) -> io::Result<()>;

    /// Writes an object member name; the next token is its value.
    fn write_property_name(&mut self, name: &str) -> io::Result<()>;

    /// Writes a scalar value (string, number or boolean).
    fn write_primitive(&mut self, value: &Value) -> io::Result<()>;

    fn write_null(&mut self) -> io::Result<()>;

    /// Writes pre-encoded JSON text as one value.
    fn write_raw(&mut self, raw: &str) -> io::Result<()>;

    /// Pushes buffered output to the underlying destination.
    fn flush(&mut self) -> io::Result<()>;
}

impl<T: TokenSink + ?Sized> TokenSink for &mut T {
    fn start_object(&mut self) -> io::Result<()> {
        (**self).start_object()
    }

    fn end_object(&mut self) -> io::Result<()> {
        (**self).end_object()
    }

    fn start_array(&mut self) -> io::Result<()> {
        (**self).start_array()
    }

    fn end_array(&mut self) -> io::Result<()> {
        (**self).end_array()
    }

    fn write_property_name(&mut self, name: &str) -> io::Result<()> {
        (**self).write_property_name(name)
    }

    fn write_primitive(&mut self, value: &Value) -> io::Result<()> {
        (**self).write_primitive(value)
    }

    fn write_null(&mut self) -> io::Result<()> {
        (**self).write_null()
    }

    fn write_raw(&mut self, raw: &str) -> io::Result<()> {
        (**self).write_raw(raw)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}
