// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fs::{File, Metadata};
use std::io::{IsTerminal, Read, Seek, SeekFrom, Write};
#[cfg(unix)]
use std::os::unix::io::RawFd;
use std::path::Path;

use futures::Stream;

use super::Origin;
use crate::context::Facade;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::handle_cell::HandleCell;
use crate::mode::Mode;

/// An asynchronous unbuffered binary file.
///
/// Each read and write maps to a single system call, so they may transfer
/// fewer bytes than requested.
#[derive(Debug)]
pub struct AsyncRawFile {
    cell: HandleCell<File>,
    origin: Origin,
}

impl AsyncRawFile {
    pub(crate) fn new(file: File, origin: Origin, dispatcher: Dispatcher) -> Self {
        Self {
            cell: HandleCell::new(file, dispatcher, |file| {
                drop(file);
                Ok(())
            }),
            origin,
        }
    }

    /// Reads at most `size` bytes with a single read, or everything that is
    /// left when `None`. An empty result means end of file.
    ///
    /// # Errors
    ///
    /// Returns the I/O failure of the file, or a state error if the facade
    /// was closed.
    pub async fn read(&self, size: Option<usize>) -> Result<Vec<u8>> {
        let Some(size) = size else {
            return self.read_all().await;
        };
        self.cell
            .call("read", move |file| {
                let mut data = vec![0; size];
                let n = file.read(&mut data)?;
                data.truncate(n);
                Ok(data)
            })
            .await
    }

    /// Reads until end of file.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub async fn read_all(&self) -> Result<Vec<u8>> {
        self.cell
            .call("read_all", |file| {
                let mut data = Vec::new();
                let _ = file.read_to_end(&mut data)?;
                Ok(data)
            })
            .await
    }

    /// Reads into `buf` with a single read and returns the number of bytes
    /// read.
    ///
    /// The worker reads into a buffer of its own; `buf` is filled once the
    /// read completes, so dropping this future never touches `buf`.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub async fn read_into(&self, buf: &mut [u8]) -> Result<usize> {
        let len = buf.len();
        let data = self
            .cell
            .call("read_into", move |file| {
                let mut data = vec![0; len];
                let n = file.read(&mut data)?;
                data.truncate(n);
                Ok(data)
            })
            .await?;
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }

    /// Reads up to and including the next `\n`, one byte at a time.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub async fn readline(&self) -> Result<Vec<u8>> {
        self.cell.call("readline", |file| Ok(read_raw_line(file)?)).await
    }

    /// Reads all remaining lines.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub async fn readlines(&self) -> Result<Vec<Vec<u8>>> {
        self.cell
            .call("readlines", |file| {
                let mut lines = Vec::new();
                loop {
                    let line = read_raw_line(file)?;
                    if line.is_empty() {
                        return Ok(lines);
                    }
                    lines.push(line);
                }
            })
            .await
    }

    /// Reads the next line, or `None` at end of file.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub async fn next_line(&self) -> Result<Option<Vec<u8>>> {
        let line = self.readline().await?;
        Ok((!line.is_empty()).then_some(line))
    }

    /// Streams the remaining lines. Each line is one dispatched `readline`.
    pub fn lines(&self) -> impl Stream<Item = Result<Vec<u8>>> + Send + '_ {
        crate::lines::line_stream(move || self.next_line())
    }

    /// Writes `data` with a single write and returns the number of bytes
    /// written.
    ///
    /// # Errors
    ///
    /// Returns the I/O failure of the file, or a state error if the facade
    /// was closed.
    pub async fn write(&self, data: &[u8]) -> Result<usize> {
        let data = data.to_vec();
        self.cell.call("write", move |file| Ok(file.write(&data)?)).await
    }

    /// Writes every line completely. No terminators are added.
    ///
    /// # Errors
    ///
    /// See [`write`](Self::write).
    pub async fn writelines<I>(&self, lines: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let lines: Vec<Vec<u8>> = lines.into_iter().map(|line| line.as_ref().to_vec()).collect();
        self.cell
            .call("writelines", move |file| {
                for line in &lines {
                    file.write_all(line)?;
                }
                Ok(())
            })
            .await
    }

    /// Moves to `pos` and returns the new position.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub async fn seek(&self, pos: SeekFrom) -> Result<u64> {
        self.cell.call("seek", move |file| Ok(file.seek(pos)?)).await
    }

    /// Returns the current position.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub async fn tell(&self) -> Result<u64> {
        self.cell.call("tell", |file| Ok(file.stream_position()?)).await
    }

    /// Resizes the file to `size`, or to the current position when `None`.
    /// The position does not move. Returns the new size.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub async fn truncate(&self, size: Option<u64>) -> Result<u64> {
        self.cell
            .call("truncate", move |file| {
                let size = match size {
                    Some(size) => size,
                    None => file.stream_position()?,
                };
                file.set_len(size)?;
                Ok(size)
            })
            .await
    }

    /// Does nothing beyond checking the facade is open; raw files have no
    /// buffer.
    ///
    /// # Errors
    ///
    /// Returns a state error if the facade was closed.
    pub async fn flush(&self) -> Result<()> {
        self.cell.call("flush", |file| Ok(file.flush()?)).await
    }

    /// Reports whether the file refers to a terminal.
    ///
    /// # Errors
    ///
    /// Returns a state error if the facade was closed.
    pub async fn is_terminal(&self) -> Result<bool> {
        self.cell.call("is_terminal", |file| Ok(file.is_terminal())).await
    }

    /// Queries file metadata.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub async fn metadata(&self) -> Result<Metadata> {
        self.cell.call("metadata", |file| Ok(file.metadata()?)).await
    }

    /// Closes the file. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Fails only if the facade was detached.
    pub async fn close(&self) -> Result<()> {
        self.cell.close().await
    }

    /// Whether the file was opened for reading, if the mode is known.
    #[must_use]
    pub fn readable(&self) -> bool {
        self.origin.mode.is_none_or(Mode::readable)
    }

    /// Whether the file was opened for writing, if the mode is known.
    #[must_use]
    pub fn writable(&self) -> bool {
        self.origin.mode.is_none_or(Mode::writable)
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

    /// The underlying file descriptor.
    #[cfg(unix)]
    #[must_use]
    pub const fn raw_fd(&self) -> Option<RawFd> {
        self.origin.raw_fd
    }
}

fn read_raw_line(file: &mut File) -> std::io::Result<Vec<u8>> {
    let mut line = Vec::new();
    let mut byte = [0_u8; 1];
    while file.read(&mut byte)? == 1 {
        line.push(byte[0]);
        if byte[0] == b'\n' {
            break;
        }
    }
    Ok(line)
}

impl Facade for AsyncRawFile {
    fn release(&self) -> impl Future<Output = Result<()>> + Send {
        self.close()
    }
}
