//! Log sinks
//!
//! Buffered append-only output over a backend file, with I/O accounting.

use std::sync::Arc;

use bytes::BytesMut;

use crate::backend::WritableFile;
use crate::error::Result;
use crate::metrics::IoCounters;

/// Which I/O counters a sink charges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Data,
    Index,
}

/// Append-only log writer.
///
/// Bytes are staged in memory until `buffer_size` would be exceeded, then
/// handed to the backend in one physical append. Appends at least as large
/// as the buffer bypass it.
pub struct LogSink {
    file: Box<dyn WritableFile>,
    stream: Stream,
    buffer: BytesMut,
    buffer_size: usize,
    /// Logical bytes appended so far (buffered bytes included)
    offset: u64,
    counters: Arc<IoCounters>,
}

impl LogSink {
    pub fn new(
        file: Box<dyn WritableFile>,
        stream: Stream,
        buffer_size: usize,
        counters: Arc<IoCounters>,
    ) -> Self {
        Self {
            file,
            stream,
            buffer: BytesMut::with_capacity(buffer_size),
            buffer_size,
            offset: 0,
            counters,
        }
    }

    /// Offset the next appended byte will land at
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        if self.buffer.len() + data.len() > self.buffer_size {
            self.write_buffer()?;
        }
        if data.len() >= self.buffer_size {
            self.physical_append(data)?;
        } else {
            self.buffer.extend_from_slice(data);
        }
        self.offset += data.len() as u64;
        Ok(())
    }

    /// Hand every buffered byte to the backend
    pub fn flush(&mut self) -> Result<()> {
        self.write_buffer()?;
        self.file.flush()
    }

    /// Flush and make the log durable
    pub fn sync(&mut self) -> Result<()> {
        self.write_buffer()?;
        self.file.sync()
    }

    fn write_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let pending = self.buffer.split();
        self.physical_append(&pending)
    }

    fn physical_append(&mut self, data: &[u8]) -> Result<()> {
        self.file.append(data)?;
        match self.stream {
            Stream::Data => self.counters.record_data(data.len()),
            Stream::Index => self.counters.record_index(data.len()),
        }
        Ok(())
    }
}
