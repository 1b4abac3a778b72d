//! Limits applied while writing payloads.

/// Default maximum depth of the scope stack (Start scope excluded).
pub const MAX_NESTING_DEPTH: usize = 100;

/// Buffered bytes after which the async writer drains to its output.
pub const ASYNC_FLUSH_THRESHOLD: usize = 16 * 1024;
