// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fs::{File, Metadata};
use std::io::{BufRead, Read, Seek, SeekFrom, Write};
#[cfg(unix)]
use std::os::unix::io::RawFd;
use std::path::Path;

use futures::Stream;

use super::{Origin, read_best_effort};
use crate::blocking::Buffered;
use crate::context::Facade;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::handle_cell::HandleCell;
use crate::mode::Mode;

/// State and operations shared by the buffered binary facades.
#[derive(Debug)]
pub(crate) struct BufferedCore {
    cell: HandleCell<Buffered>,
    origin: Origin,
    readable: bool,
    writable: bool,
}

impl BufferedCore {
    fn new(stream: Buffered, origin: Origin, dispatcher: Dispatcher) -> Self {
        let readable = stream.readable();
        let writable = stream.writable();
        Self {
            cell: HandleCell::new(stream, dispatcher, |stream| Ok(stream.close()?)),
            origin,
            readable,
            writable,
        }
    }

    pub(crate) async fn call<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Buffered) -> Result<T> + Send + 'static,
    {
        self.cell.call(operation, f).await
    }

    async fn read(&self, size: Option<usize>) -> Result<Vec<u8>> {
        self.cell
            .call("read", move |stream| {
                let mut data = Vec::new();
                let _ = match size {
                    Some(size) => Read::by_ref(stream).take(u64::try_from(size).unwrap_or(u64::MAX)).read_to_end(&mut data)?,
                    None => stream.read_to_end(&mut data)?,
                };
                Ok(data)
            })
            .await
    }

    async fn read1(&self, size: Option<usize>) -> Result<Vec<u8>> {
        self.cell.call("read1", move |stream| Ok(stream.read1(size)?)).await
    }

    async fn read_into(&self, buf: &mut [u8]) -> Result<usize> {
        let len = buf.len();
        let data = self
            .cell
            .call("read_into", move |stream| {
                let mut data = vec![0; len];
                let n = read_best_effort(stream, &mut data)?;
                data.truncate(n);
                Ok(data)
            })
            .await?;
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }

    async fn peek(&self) -> Result<Vec<u8>> {
        self.cell.call("peek", |stream| Ok(stream.peek()?)).await
    }

    async fn readline(&self) -> Result<Vec<u8>> {
        self.cell
            .call("readline", |stream| {
                let mut line = Vec::new();
                let _ = stream.read_until(b'\n', &mut line)?;
                Ok(line)
            })
            .await
    }

    async fn readlines(&self) -> Result<Vec<Vec<u8>>> {
        self.cell
            .call("readlines", |stream| {
                let mut lines = Vec::new();
                loop {
                    let mut line = Vec::new();
                    if stream.read_until(b'\n', &mut line)? == 0 {
                        return Ok(lines);
                    }
                    lines.push(line);
                }
            })
            .await
    }

    async fn next_line(&self) -> Result<Option<Vec<u8>>> {
        let line = self.readline().await?;
        Ok((!line.is_empty()).then_some(line))
    }

    async fn write(&self, data: &[u8]) -> Result<usize> {
        let data = data.to_vec();
        self.cell
            .call("write", move |stream| {
                stream.write_all(&data)?;
                Ok(data.len())
            })
            .await
    }

    async fn writelines<I>(&self, lines: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let lines: Vec<Vec<u8>> = lines.into_iter().map(|line| line.as_ref().to_vec()).collect();
        self.cell
            .call("writelines", move |stream| {
                for line in &lines {
                    stream.write_all(line)?;
                }
                Ok(())
            })
            .await
    }

    async fn seek(&self, pos: SeekFrom) -> Result<u64> {
        self.cell.call("seek", move |stream| Ok(stream.seek(pos)?)).await
    }

    async fn tell(&self) -> Result<u64> {
        self.cell.call("tell", |stream| Ok(stream.stream_position()?)).await
    }

    async fn truncate(&self, size: Option<u64>) -> Result<u64> {
        self.cell.call("truncate", move |stream| Ok(stream.truncate(size)?)).await
    }

    async fn flush(&self) -> Result<()> {
        self.cell.call("flush", |stream| Ok(stream.flush()?)).await
    }

    async fn is_terminal(&self) -> Result<bool> {
        self.cell.call("is_terminal", |stream| Ok(stream.is_terminal())).await
    }

    async fn metadata(&self) -> Result<Metadata> {
        self.cell.call("metadata", |stream| Ok(stream.metadata()?)).await
    }

    async fn close(&self) -> Result<()> {
        self.cell.close().await
    }

    async fn detach(&self) -> Result<File> {
        self.cell.detach("detach", |stream| Ok(stream.into_file()?)).await
    }

    fn is_closed(&self) -> bool {
        self.cell.is_closed()
    }
}

/// An asynchronous write-only buffered binary file.
///
/// Every I/O method runs on a worker thread. Calls on one facade execute one
/// at a time, in the order they were made.
#[derive(Debug)]
pub struct AsyncBufferedWriter {
    core: BufferedCore,
}

impl AsyncBufferedWriter {
    pub(crate) fn new(stream: Buffered, origin: Origin, dispatcher: Dispatcher) -> Self {
        Self {
            core: BufferedCore::new(stream, origin, dispatcher),
        }
    }

    /// Writes all of `data` and returns its length.
    ///
    /// # Errors
    ///
    /// Returns the I/O failure of the underlying file, or a state error if the
    /// facade was closed or detached.
    pub async fn write(&self, data: &[u8]) -> Result<usize> {
        self.core.write(data).await
    }

    /// Writes each line in turn. No terminators are added.
    ///
    /// # Errors
    ///
    /// See [`write`](Self::write).
    pub async fn writelines<I>(&self, lines: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        self.core.writelines(lines).await
    }

    /// Writes buffered data to the file.
    ///
    /// # Errors
    ///
    /// See [`write`](Self::write).
    pub async fn flush(&self) -> Result<()> {
        self.core.flush().await
    }

    /// Flushes, then moves to `pos`. Returns the new position.
    ///
    /// # Errors
    ///
    /// See [`write`](Self::write).
    pub async fn seek(&self, pos: SeekFrom) -> Result<u64> {
        self.core.seek(pos).await
    }

    /// Returns the logical position, including buffered data.
    ///
    /// # Errors
    ///
    /// See [`write`](Self::write).
    pub async fn tell(&self) -> Result<u64> {
        self.core.tell().await
    }

    /// Flushes, then resizes the file to `size`, or to the current position
    /// when `None`. Returns the new size.
    ///
    /// # Errors
    ///
    /// See [`write`](Self::write).
    pub async fn truncate(&self, size: Option<u64>) -> Result<u64> {
        self.core.truncate(size).await
    }

    /// Reports whether the file refers to a terminal.
    ///
    /// # Errors
    ///
    /// Returns a state error if the facade was closed or detached.
    pub async fn is_terminal(&self) -> Result<bool> {
        self.core.is_terminal().await
    }

    /// Queries file metadata.
    ///
    /// # Errors
    ///
    /// See [`write`](Self::write).
    pub async fn metadata(&self) -> Result<Metadata> {
        self.core.metadata().await
    }

    /// Flushes and closes the file. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the failure of the final flush.
    pub async fn close(&self) -> Result<()> {
        self.core.close().await
    }

    /// Flushes and hands back the file. The facade is unusable afterwards.
    ///
    /// # Errors
    ///
    /// Returns the failure of the flush, or a state error.
    pub async fn detach(&self) -> Result<File> {
        self.core.detach().await
    }

    /// Always `false`.
    #[must_use]
    pub const fn readable(&self) -> bool {
        self.core.readable
    }

    /// Always `true`.
    #[must_use]
    pub const fn writable(&self) -> bool {
        self.core.writable
    }

    /// Whether [`close`](Self::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    /// The path the file was opened from, if known.
    #[must_use]
    pub fn name(&self) -> Option<&Path> {
        self.core.origin.name()
    }

    /// The mode the file was opened with, if known.
    #[must_use]
    pub const fn mode(&self) -> Option<Mode> {
        self.core.origin.mode
    }

    /// The underlying file descriptor, if known.
    #[cfg(unix)]
    #[must_use]
    pub const fn raw_fd(&self) -> Option<RawFd> {
        self.core.origin.raw_fd
    }
}

impl Facade for AsyncBufferedWriter {
    fn release(&self) -> impl Future<Output = Result<()>> + Send {
        self.close()
    }
}

/// An asynchronous buffered binary stream that can be read.
///
/// Backs read-only files, files open for both reading and writing, archive
/// members, and spooled temporary files. Writing is only possible when
/// [`writable`](Self::writable) is `true`; otherwise write calls fail with
/// [`std::io::ErrorKind::Unsupported`].
#[derive(Debug)]
pub struct AsyncBufferedReader {
    core: BufferedCore,
}

impl AsyncBufferedReader {
    pub(crate) fn new(stream: Buffered, origin: Origin, dispatcher: Dispatcher) -> Self {
        Self {
            core: BufferedCore::new(stream, origin, dispatcher),
        }
    }

    pub(crate) const fn core(&self) -> &BufferedCore {
        &self.core
    }

    /// Reads up to `size` bytes, or to the end of the stream when `None`.
    /// Returns fewer bytes only at the end of the stream.
    ///
    /// # Errors
    ///
    /// Returns the I/O failure of the underlying stream, or a state error if
    /// the facade was closed or detached.
    pub async fn read(&self, size: Option<usize>) -> Result<Vec<u8>> {
        self.core.read(size).await
    }

    /// Reads up to `size` bytes with at most one read from the file.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub async fn read1(&self, size: Option<usize>) -> Result<Vec<u8>> {
        self.core.read1(size).await
    }

    /// Reads into `buf` until it is full or the stream ends. Returns the
    /// number of bytes read.
    ///
    /// The worker reads into a buffer of its own; `buf` is filled once the
    /// read completes, so dropping this future never touches `buf`.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub async fn read_into(&self, buf: &mut [u8]) -> Result<usize> {
        self.core.read_into(buf).await
    }

    /// Returns the buffered bytes without consuming them, refilling the
    /// buffer first if it is empty.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub async fn peek(&self) -> Result<Vec<u8>> {
        self.core.peek().await
    }

    /// Reads up to and including the next `\n`. Returns an empty vector at
    /// the end of the stream.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub async fn readline(&self) -> Result<Vec<u8>> {
        self.core.readline().await
    }

    /// Reads all remaining lines.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub async fn readlines(&self) -> Result<Vec<Vec<u8>>> {
        self.core.readlines().await
    }

    /// Reads the next line, or `None` at the end of the stream.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub async fn next_line(&self) -> Result<Option<Vec<u8>>> {
        self.core.next_line().await
    }

    /// Streams the remaining lines. Each line is one dispatched `readline`.
    pub fn lines(&self) -> impl Stream<Item = Result<Vec<u8>>> + Send + '_ {
        crate::lines::line_stream(move || self.core.next_line())
    }

    /// Writes all of `data` and returns its length.
    ///
    /// # Errors
    ///
    /// Fails with [`std::io::ErrorKind::Unsupported`] if the stream is not
    /// writable.
    pub async fn write(&self, data: &[u8]) -> Result<usize> {
        self.core.write(data).await
    }

    /// Writes each line in turn. No terminators are added.
    ///
    /// # Errors
    ///
    /// See [`write`](Self::write).
    pub async fn writelines<I>(&self, lines: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        self.core.writelines(lines).await
    }

    /// Moves to `pos` and returns the new position.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub async fn seek(&self, pos: SeekFrom) -> Result<u64> {
        self.core.seek(pos).await
    }

    /// Returns the logical position.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub async fn tell(&self) -> Result<u64> {
        self.core.tell().await
    }

    /// Resizes the stream to `size`, or to the current position when `None`.
    /// Returns the new size.
    ///
    /// # Errors
    ///
    /// Fails with [`std::io::ErrorKind::Unsupported`] on read-only streams.
    pub async fn truncate(&self, size: Option<u64>) -> Result<u64> {
        self.core.truncate(size).await
    }

    /// Writes buffered data to the file.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub async fn flush(&self) -> Result<()> {
        self.core.flush().await
    }

    /// Reports whether the stream refers to a terminal.
    ///
    /// # Errors
    ///
    /// Returns a state error if the facade was closed or detached.
    pub async fn is_terminal(&self) -> Result<bool> {
        self.core.is_terminal().await
    }

    /// Queries file metadata.
    ///
    /// # Errors
    ///
    /// Fails with [`std::io::ErrorKind::Unsupported`] when the stream is not
    /// backed by a file.
    pub async fn metadata(&self) -> Result<Metadata> {
        self.core.metadata().await
    }

    /// Closes the stream. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the failure of the final flush.
    pub async fn close(&self) -> Result<()> {
        self.core.close().await
    }

    /// Hands back the file, positioned at the logical offset. The facade is
    /// unusable afterwards.
    ///
    /// # Errors
    ///
    /// Fails with [`std::io::ErrorKind::Unsupported`] when the stream is not
    /// backed by a file.
    pub async fn detach(&self) -> Result<File> {
        self.core.detach().await
    }

    /// Always `true`.
    #[must_use]
    pub const fn readable(&self) -> bool {
        self.core.readable
    }

    /// Whether the stream accepts writes.
    #[must_use]
    pub const fn writable(&self) -> bool {
        self.core.writable
    }

    /// Whether the stream supports random access.
    #[must_use]
    pub const fn seekable(&self) -> bool {
        true
    }

    /// Whether [`close`](Self::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    /// The path or member name the stream was opened from, if known.
    #[must_use]
    pub fn name(&self) -> Option<&Path> {
        self.core.origin.name()
    }

    /// The mode the stream was opened with, if known.
    #[must_use]
    pub const fn mode(&self) -> Option<Mode> {
        self.core.origin.mode
    }

    /// The underlying file descriptor, if the stream is backed by a file.
    #[cfg(unix)]
    #[must_use]
    pub const fn raw_fd(&self) -> Option<RawFd> {
        self.core.origin.raw_fd
    }
}

impl Facade for AsyncBufferedReader {
    fn release(&self) -> impl Future<Output = Result<()>> + Send {
        self.close()
    }
}
