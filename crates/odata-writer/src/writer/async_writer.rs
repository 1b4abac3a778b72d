//! Cooperative async surface.
//!
//! [`AsyncPayloadWriter`] runs the same state machine as [`PayloadWriter`]
//! over an in-memory buffer and suspends only to drain that buffer into an
//! [`AsyncWrite`]. Output is byte-identical to the synchronous writer.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use std::sync::Arc;

use crate::error::WriterError;
use crate::json::ResourceMetadataBuilder;
use crate::limits::ASYNC_FLUSH_THRESHOLD;
use crate::model::{DeltaLinkVariant, EntityReferenceLink, StartItem};
use crate::schema::SchemaProvider;
use crate::settings::WriterSettings;
use crate::sink::JsonTokenWriter;
use crate::writer::machine::PayloadWriter;
use crate::writer::scope::ScopeState;

/// Async payload writer over any `AsyncWrite`.
///
/// Cancellation is observed only while draining. A cancelled call, or a call
/// whose future was dropped before completing, abandons the writer; bytes
/// already handed to the output are not rolled back.
pub struct AsyncPayloadWriter<'m, W> {
    inner: PayloadWriter<'m, JsonTokenWriter<Vec<u8>>>,
    out: W,
    cancel: Option<CancellationToken>,
    flush_threshold: usize,
    /// Set while a call is running; still set on entry means the previous
    /// call's future was dropped mid-suspension.
    in_flight: bool,
}

impl<'m, W: AsyncWrite + Unpin> AsyncPayloadWriter<'m, W> {
    pub fn new(out: W, settings: WriterSettings) -> Self {
        Self {
            inner: PayloadWriter::new(JsonTokenWriter::new(Vec::new()), settings),
            out,
            cancel: None,
            flush_threshold: ASYNC_FLUSH_THRESHOLD,
            in_flight: false,
        }
    }

    pub fn with_schema(mut self, schema: &'m dyn SchemaProvider) -> Self {
        self.inner = self.inner.with_schema(schema);
        self
    }

    pub fn for_navigation_source(mut self, name: impl Into<String>) -> Self {
        self.inner = self.inner.for_navigation_source(name);
        self
    }

    pub fn with_expected_type(mut self, type_name: impl Into<String>) -> Self {
        self.inner = self.inner.with_expected_type(type_name);
        self
    }

    pub fn with_metadata_builder(mut self, builder: Arc<dyn ResourceMetadataBuilder>) -> Self {
        self.inner = self.inner.with_metadata_builder(builder);
        self
    }

    /// Observes `token` at every suspension point.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Buffered bytes after which a call drains to the output.
    pub fn with_flush_threshold(mut self, bytes: usize) -> Self {
        self.flush_threshold = bytes;
        self
    }

    pub fn state(&self) -> ScopeState {
        self.inner.state()
    }

    pub fn is_failed(&self) -> bool {
        self.inner.is_failed()
    }

    /// Bytes written by the state machine but not yet drained.
    pub fn buffered(&self) -> usize {
        self.inner.get_ref().get_ref().len()
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Returns the output. Undrained bytes are discarded; call `flush` first.
    pub fn into_inner(self) -> W {
        self.out
    }

    pub async fn write_start(&mut self, item: impl Into<StartItem>) -> Result<(), WriterError> {
        self.enter()?;
        let result = self.inner.write_start(item);
        self.complete(result, false).await
    }

    pub async fn write_end(&mut self) -> Result<(), WriterError> {
        self.enter()?;
        let result = self.inner.write_end();
        self.complete(result, false).await
    }

    pub async fn write_primitive(&mut self, value: impl Into<serde_json::Value>) -> Result<(), WriterError> {
        self.enter()?;
        let result = self.inner.write_primitive(value);
        self.complete(result, false).await
    }

    pub async fn write_delta_link(&mut self, link: impl Into<DeltaLinkVariant>) -> Result<(), WriterError> {
        self.enter()?;
        let result = self.inner.write_delta_link(link);
        self.complete(result, false).await
    }

    pub async fn write_entity_reference_link(&mut self, link: EntityReferenceLink) -> Result<(), WriterError> {
        self.enter()?;
        let result = self.inner.write_entity_reference_link(link);
        self.complete(result, false).await
    }

    pub fn set_next_link(&mut self, url: impl Into<String>) -> Result<(), WriterError> {
        self.enter()?;
        let result = self.inner.set_next_link(url);
        self.in_flight = false;
        result
    }

    pub fn set_delta_link(&mut self, url: impl Into<String>) -> Result<(), WriterError> {
        self.enter()?;
        let result = self.inner.set_delta_link(url);
        self.in_flight = false;
        result
    }

    /// Drains everything buffered and flushes the output.
    pub async fn flush(&mut self) -> Result<(), WriterError> {
        self.enter()?;
        self.complete(Ok(()), true).await
    }

    fn enter(&mut self) -> Result<(), WriterError> {
        if self.in_flight {
            self.inner.abandon();
        }
        self.inner.ensure_usable()?;
        self.in_flight = true;
        Ok(())
    }

    async fn complete(&mut self, result: Result<(), WriterError>, force: bool) -> Result<(), WriterError> {
        if let Err(err) = result {
            self.in_flight = false;
            return Err(err);
        }
        if force || self.buffered() >= self.flush_threshold {
            if let Err(err) = self.drain(force).await {
                self.inner.abandon();
                self.in_flight = false;
                return Err(err);
            }
        }
        self.in_flight = false;
        Ok(())
    }

    /// The only suspension point.
    async fn drain(&mut self, flush: bool) -> Result<(), WriterError> {
        let buffer = std::mem::take(self.inner.get_mut().get_mut());
        trace!(bytes = buffer.len(), flush, "draining buffer");
        let Self { out, cancel, .. } = self;
        let io = async {
            out.write_all(&buffer).await?;
            if flush {
                out.flush().await?;
            }
            Ok::<(), std::io::Error>(())
        };
        match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(WriterError::Cancelled),
                result = io => result.map_err(WriterError::from),
            },
            None => io.await.map_err(WriterError::from),
        }
    }
}
