//! Compact JSON token writer over any `io::Write`.

use std::io::{self, Write};

use serde_json::Value;

use crate::sink::TokenSink;

/// Writes compact JSON (no whitespace) to an `io::Write`.
///
/// Separators are inserted from a stack of open containers; string escaping
/// and number formatting are delegated to `serde_json`.
#[derive(Debug)]
pub struct JsonTokenWriter<W> {
    out: W,
    /// One entry per open container: true once it holds an item.
    open: Vec<bool>,
    /// A member name was written and awaits its value.
    after_name: bool,
}

impl<W: Write> JsonTokenWriter<W> {
    /// Creates a new token writer.
    pub fn new(out: W) -> Self {
        Self {
            out,
            open: Vec::new(),
            after_name: false,
        }
    }

    /// Returns a reference to the destination.
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Returns a mutable reference to the destination.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.out
    }

    /// Returns the destination.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Returns the number of open containers.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    #[inline]
    fn begin_value(&mut self) -> io::Result<()> {
        if self.after_name {
            self.after_name = false;
            return Ok(());
        }
        self.separate()
    }

    #[inline]
    fn separate(&mut self) -> io::Result<()> {
        if let Some(has_items) = self.open.last_mut() {
            if *has_items {
                self.out.write_all(b",")?;
            }
            *has_items = true;
        }
        Ok(())
    }
}

impl<W: Write> TokenSink for JsonTokenWriter<W> {
    fn start_object(&mut self) -> io::Result<()> {
        self.begin_value()?;
        self.out.write_all(b"{")?;
        self.open.push(false);
        Ok(())
    }

    fn end_object(&mut self) -> io::Result<()> {
        self.open.pop();
        self.out.write_all(b"}")
    }

    fn start_array(&mut self) -> io::Result<()> {
        self.begin_value()?;
        self.out.write_all(b"[")?;
        self.open.push(false);
        Ok(())
    }

    fn end_array(&mut self) -> io::Result<()> {
        self.open.pop();
        self.out.write_all(b"]")
    }

    fn write_property_name(&mut self, name: &str) -> io::Result<()> {
        self.separate()?;
        serde_json::to_writer(&mut self.out, name)?;
        self.out.write_all(b":")?;
        self.after_name = true;
        Ok(())
    }

    fn write_primitive(&mut self, value: &Value) -> io::Result<()> {
        self.begin_value()?;
        serde_json::to_writer(&mut self.out, value)?;
        Ok(())
    }

    fn write_null(&mut self) -> io::Result<()> {
        self.begin_value()?;
        self.out.write_all(b"null")
    }

    fn write_raw(&mut self, raw: &str) -> io::Result<()> {
        self.begin_value()?;
        self.out.write_all(raw.as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn render(f: impl FnOnce(&mut JsonTokenWriter<Vec<u8>>) -> io::Result<()>) -> String {
        let mut writer = JsonTokenWriter::new(Vec::new());
        f(&mut writer).unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn test_object_separators() {
        let out = render(|w| {
            w.start_object()?;
            w.write_property_name("a")?;
            w.write_primitive(&json!(1))?;
            w.write_property_name("b")?;
            w.start_array()?;
            w.write_primitive(&json!(true))?;
            w.write_null()?;
            w.start_object()?;
            w.end_object()?;
            w.end_array()?;
            w.end_object()
        });
        assert_eq!(out, r#"{"a":1,"b":[true,null,{}]}"#);
    }

    #[test]
    fn test_escaping_delegated() {
        let out = render(|w| {
            w.start_object()?;
            w.write_property_name("q\"uote")?;
            w.write_primitive(&json!("line\nbreak"))?;
            w.end_object()
        });
        assert_eq!(out, r#"{"q\"uote":"line\nbreak"}"#);
    }

    #[test]
    fn test_raw_value() {
        let out = render(|w| {
            w.start_array()?;
            w.write_raw("5")?;
            w.write_raw("6")?;
            w.end_array()
        });
        assert_eq!(out, "[5,6]");
    }

    #[test]
    fn test_depth_tracking() {
        let mut writer = JsonTokenWriter::new(Vec::new());
        writer.start_object().unwrap();
        writer.write_property_name("value").unwrap();
        writer.start_array().unwrap();
        assert_eq!(writer.depth(), 2);
        writer.end_array().unwrap();
        writer.end_object().unwrap();
        assert_eq!(writer.depth(), 0);
    }
}
