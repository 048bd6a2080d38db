// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fs::Metadata;
use std::io::SeekFrom;
#[cfg(unix)]
use std::os::unix::io::RawFd;
use std::path::Path;

use futures::Stream;

use super::Origin;
use crate::blocking::{BlockingHandle, Buffered, DecodeErrors, Newline, TextConfig, TextStream};
use crate::context::Facade;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::handle_cell::HandleCell;
use crate::mode::Mode;

/// An asynchronous text stream.
///
/// Every I/O method runs on a worker thread. Calls on one `AsyncTextFile`
/// execute one at a time, in the order they were made. Positions are byte
/// offsets.
#[derive(Debug)]
pub struct AsyncTextFile {
    cell: HandleCell<TextStream>,
    origin: Origin,
    config: TextConfig,
    readable: bool,
    writable: bool,
}

impl AsyncTextFile {
    pub(crate) fn new(stream: TextStream, origin: Origin, dispatcher: Dispatcher) -> Self {
        let config = *stream.config();
        let readable = stream.buffer().readable();
        let writable = stream.buffer().writable();
        Self {
            cell: HandleCell::new(stream, dispatcher, |stream| Ok(stream.close()?)),
            origin,
            config,
            readable,
            writable,
        }
    }

    /// Runs `f` against the binary stream below the decoder.
    pub(crate) async fn call_buffered<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Buffered) -> Result<T> + Send + 'static,
    {
        self.cell.call(operation, move |stream| f(stream.buffer_mut())).await
    }

    /// Reads up to `size` characters, or to the end of the stream when `None`.
    ///
    /// # Errors
    ///
    /// Returns the I/O or decoding failure of the underlying stream, or a
    /// state error if the file was closed or detached.
    pub async fn read(&self, size: Option<usize>) -> Result<String> {
        self.cell.call("read", move |stream| Ok(stream.read(size)?)).await
    }

    /// Reads one line, including its terminator. Returns an empty string at
    /// the end of the stream.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub async fn readline(&self) -> Result<String> {
        self.cell.call("readline", |stream| Ok(stream.readline()?)).await
    }

    /// Reads all remaining lines.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub async fn readlines(&self) -> Result<Vec<String>> {
        self.cell.call("readlines", |stream| Ok(stream.readlines()?)).await
    }

    /// Reads the next line, or `None` at the end of the stream.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub async fn next_line(&self) -> Result<Option<String>> {
        let line = self.readline().await?;
        Ok((!line.is_empty()).then_some(line))
    }

    /// Streams the remaining lines. Each line is one dispatched `readline`.
    pub fn lines(&self) -> impl Stream<Item = Result<String>> + Send + '_ {
        crate::lines::line_stream(move || self.next_line())
    }

    /// Writes `text` and returns the number of characters written.
    ///
    /// # Errors
    ///
    /// Returns the I/O failure of the underlying stream, or a state error if
    /// the file was closed or detached.
    pub async fn write(&self, text: &str) -> Result<usize> {
        let text = text.to_owned();
        self.cell.call("write", move |stream| Ok(stream.write(&text)?)).await
    }

    /// Writes each line in turn. No terminators are added.
    ///
    /// # Errors
    ///
    /// See [`write`](Self::write).
    pub async fn writelines<I>(&self, lines: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let lines: Vec<String> = lines.into_iter().map(|line| line.as_ref().to_owned()).collect();
        self.cell
            .call("writelines", move |stream| {
                for line in &lines {
                    let _ = stream.write(line)?;
                }
                Ok(())
            })
            .await
    }

    /// Moves to a byte offset and returns the new position.
    ///
    /// # Errors
    ///
    /// Returns the I/O failure of the underlying stream, or a state error.
    pub async fn seek(&self, pos: SeekFrom) -> Result<u64> {
        self.cell.call("seek", move |stream| Ok(stream.seek(pos)?)).await
    }

    /// Returns the current byte offset.
    ///
    /// # Errors
    ///
    /// Returns the I/O failure of the underlying stream, or a state error.
    pub async fn tell(&self) -> Result<u64> {
        self.cell.call("tell", |stream| Ok(stream.tell()?)).await
    }

    /// Resizes the file to `size` bytes, or to the current position when
    /// `None`. Returns the new size.
    ///
    /// # Errors
    ///
    /// Returns the I/O failure of the underlying stream, or a state error.
    pub async fn truncate(&self, size: Option<u64>) -> Result<u64> {
        self.cell.call("truncate", move |stream| Ok(stream.truncate(size)?)).await
    }

    /// Flushes buffered writes to the file.
    ///
    /// # Errors
    ///
    /// Returns the I/O failure of the underlying stream, or a state error.
    pub async fn flush(&self) -> Result<()> {
        self.cell.call("flush", |stream| Ok(stream.flush()?)).await
    }

    /// Reports whether the file refers to a terminal.
    ///
    /// # Errors
    ///
    /// Returns a state error if the file was closed or detached.
    pub async fn is_terminal(&self) -> Result<bool> {
        self.cell.call("is_terminal", |stream| Ok(stream.buffer().is_terminal())).await
    }

    /// Queries file metadata.
    ///
    /// # Errors
    ///
    /// Returns the I/O failure of the underlying stream, or a state error.
    pub async fn metadata(&self) -> Result<Metadata> {
        self.cell.call("metadata", |stream| Ok(stream.buffer().metadata()?)).await
    }

    /// Flushes and closes the file. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the failure of the final flush.
    pub async fn close(&self) -> Result<()> {
        self.cell.close().await
    }

    /// Flushes and hands back the binary stream underneath. The facade is
    /// unusable afterwards.
    ///
    /// # Errors
    ///
    /// Returns the failure of the flush, or a state error.
    pub async fn detach(&self) -> Result<BlockingHandle> {
        self.cell.detach("detach", |stream| Ok(stream.detach()?)).await
    }

    /// The canonical name of the text encoding.
    #[must_use]
    pub const fn encoding(&self) -> &'static str {
        self.config.encoding
    }

    /// The decode error policy.
    #[must_use]
    pub const fn errors(&self) -> DecodeErrors {
        self.config.errors
    }

    /// The newline handling.
    #[must_use]
    pub const fn newline(&self) -> Newline {
        self.config.newline
    }

    /// Whether writes containing a line break are flushed immediately.
    #[must_use]
    pub const fn line_buffering(&self) -> bool {
        self.config.line_buffering
    }

    /// Whether the stream was opened for reading.
    #[must_use]
    pub const fn readable(&self) -> bool {
        self.readable
    }

    /// Whether the stream was opened for writing.
    #[must_use]
    pub const fn writable(&self) -> bool {
        self.writable
    }

    /// Whether the stream supports random access.
    #[must_use]
    pub const fn seekable(&self) -> bool {
        true
    }

    /// Whether [`close`](Self::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cell.is_closed()
    }

    /// The path the file was opened from, if known.
    #[must_use]
    pub fn name(&self) -> Option<&Path> {
        self.origin.name()
    }

    /// The mode the file was opened with, if known.
    #[must_use]
    pub const fn mode(&self) -> Option<Mode> {
        self.origin.mode
    }

    /// The underlying file descriptor, if the stream is backed by a file.
    #[cfg(unix)]
    #[must_use]
    pub const fn raw_fd(&self) -> Option<RawFd> {
        self.origin.raw_fd
    }
}

impl Facade for AsyncTextFile {
    fn release(&self) -> impl Future<Output = Result<()>> + Send {
        self.close()
    }
}
