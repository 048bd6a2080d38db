// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fs::Metadata;
use std::io::SeekFrom;
#[cfg(unix)]
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use tracing::{Level, event};

use crate::blocking::{BlockingHandle, Buffered, Category};
use crate::context::Facade;
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::facade::{AsyncBufferedReader, AsyncBufferedWriter, AsyncRawFile, AsyncTextFile, Origin};
use crate::mode::Mode;

/// A facade of any category.
///
/// This is what [`open`](crate::open) and the other file constructors
/// produce, since the category depends on the mode and buffering chosen at
/// run time. Use the `as_*` accessors to borrow the concrete facade, or the
/// `into_*` conversions to take it.
#[derive(Debug)]
pub enum AsyncFile {
    /// A text stream.
    Text(AsyncTextFile),
    /// A write-only buffered binary file.
    BufferedWriter(AsyncBufferedWriter),
    /// A readable buffered binary stream.
    BufferedReader(AsyncBufferedReader),
    /// An unbuffered binary file.
    Raw(AsyncRawFile),
}

macro_rules! each_variant {
    ($file:expr, $inner:ident => $body:expr) => {
        match $file {
            AsyncFile::Text($inner) => $body,
            AsyncFile::BufferedWriter($inner) => $body,
            AsyncFile::BufferedReader($inner) => $body,
            AsyncFile::Raw($inner) => $body,
        }
    };
}

impl AsyncFile {
    /// The category of the wrapped stream.
    #[must_use]
    pub const fn category(&self) -> Category {
        match self {
            Self::Text(_) => Category::Text,
            Self::BufferedWriter(_) => Category::BufferedWriter,
            Self::BufferedReader(_) => Category::BufferedReader,
            Self::Raw(_) => Category::Raw,
        }
    }

    fn mismatch(&self, expected: Category) -> Error {
        Error::CategoryMismatch {
            expected,
            actual: self.category(),
        }
    }

    /// Borrows the text facade.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CategoryMismatch`] for any other category.
    pub fn as_text(&self) -> Result<&AsyncTextFile> {
        match self {
            Self::Text(file) => Ok(file),
            _ => Err(self.mismatch(Category::Text)),
        }
    }

    /// Borrows the buffered writer facade.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CategoryMismatch`] for any other category.
    pub fn as_buffered_writer(&self) -> Result<&AsyncBufferedWriter> {
        match self {
            Self::BufferedWriter(file) => Ok(file),
            _ => Err(self.mismatch(Category::BufferedWriter)),
        }
    }

    /// Borrows the buffered reader facade.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CategoryMismatch`] for any other category.
    pub fn as_buffered_reader(&self) -> Result<&AsyncBufferedReader> {
        match self {
            Self::BufferedReader(file) => Ok(file),
            _ => Err(self.mismatch(Category::BufferedReader)),
        }
    }

    /// Borrows the raw facade.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CategoryMismatch`] for any other category.
    pub fn as_raw(&self) -> Result<&AsyncRawFile> {
        match self {
            Self::Raw(file) => Ok(file),
            _ => Err(self.mismatch(Category::Raw)),
        }
    }

    /// Takes the text facade.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CategoryMismatch`] for any other category; the file is
    /// then released in the background.
    pub fn into_text(self) -> Result<AsyncTextFile> {
        match self {
            Self::Text(file) => Ok(file),
            other => Err(other.mismatch(Category::Text)),
        }
    }

    /// Takes the buffered writer facade.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CategoryMismatch`] for any other category; the file is
    /// then released in the background.
    pub fn into_buffered_writer(self) -> Result<AsyncBufferedWriter> {
        match self {
            Self::BufferedWriter(file) => Ok(file),
            other => Err(other.mismatch(Category::BufferedWriter)),
        }
    }

    /// Takes the buffered reader facade.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CategoryMismatch`] for any other category; the file is
    /// then released in the background.
    pub fn into_buffered_reader(self) -> Result<AsyncBufferedReader> {
        match self {
            Self::BufferedReader(file) => Ok(file),
            other => Err(other.mismatch(Category::BufferedReader)),
        }
    }

    /// Takes the raw facade.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CategoryMismatch`] for any other category; the file is
    /// then released in the background.
    pub fn into_raw(self) -> Result<AsyncRawFile> {
        match self {
            Self::Raw(file) => Ok(file),
            other => Err(other.mismatch(Category::Raw)),
        }
    }

    /// Flushes pending writes.
    ///
    /// # Errors
    ///
    /// Returns the I/O failure of the stream, or a state error.
    pub async fn flush(&self) -> Result<()> {
        each_variant!(self, file => file.flush().await)
    }

    /// Moves to `pos` and returns the new position.
    ///
    /// # Errors
    ///
    /// Returns the I/O failure of the stream, or a state error.
    pub async fn seek(&self, pos: SeekFrom) -> Result<u64> {
        each_variant!(self, file => file.seek(pos).await)
    }

    /// Returns the current position.
    ///
    /// # Errors
    ///
    /// Returns the I/O failure of the stream, or a state error.
    pub async fn tell(&self) -> Result<u64> {
        each_variant!(self, file => file.tell().await)
    }

    /// Resizes the stream to `size`, or to the current position when `None`.
    ///
    /// # Errors
    ///
    /// Returns the I/O failure of the stream, or a state error.
    pub async fn truncate(&self, size: Option<u64>) -> Result<u64> {
        each_variant!(self, file => file.truncate(size).await)
    }

    /// Reports whether the stream refers to a terminal.
    ///
    /// # Errors
    ///
    /// Returns a state error if the facade was closed or detached.
    pub async fn is_terminal(&self) -> Result<bool> {
        each_variant!(self, file => file.is_terminal().await)
    }

    /// Queries file metadata.
    ///
    /// # Errors
    ///
    /// Returns the I/O failure of the stream, or a state error.
    pub async fn metadata(&self) -> Result<Metadata> {
        each_variant!(self, file => file.metadata().await)
    }

    /// Closes the stream. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the failure of the final flush.
    pub async fn close(&self) -> Result<()> {
        each_variant!(self, file => file.close().await)
    }

    /// Whether [`close`](Self::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        each_variant!(self, file => file.is_closed())
    }

    /// Whether the stream was opened for reading.
    #[must_use]
    pub fn readable(&self) -> bool {
        each_variant!(self, file => file.readable())
    }

    /// Whether the stream was opened for writing.
    #[must_use]
    pub fn writable(&self) -> bool {
        each_variant!(self, file => file.writable())
    }

    /// The path the stream was opened from, if known.
    #[must_use]
    pub fn name(&self) -> Option<&Path> {
        each_variant!(self, file => file.name())
    }

    /// The mode the stream was opened with, if known.
    #[must_use]
    pub fn mode(&self) -> Option<Mode> {
        each_variant!(self, file => file.mode())
    }

    /// The underlying file descriptor, if the stream is backed by a file.
    #[cfg(unix)]
    #[must_use]
    pub fn raw_fd(&self) -> Option<RawFd> {
        each_variant!(self, file => file.raw_fd())
    }
}

impl Facade for AsyncFile {
    fn release(&self) -> impl Future<Output = Result<()>> + Send {
        self.close()
    }
}

/// Wraps a blocking handle in the facade that matches its category.
///
/// The facade dispatches every later operation through `dispatcher`. This is
/// the single entry point for turning blocking handles into facades; every
/// constructor in this crate goes through it.
///
/// # Errors
///
/// Returns [`Error::UnsupportedCategory`] for a
/// [`BlockingHandle::Foreign`] handle.
pub fn classify_and_wrap(handle: BlockingHandle, dispatcher: &Dispatcher) -> Result<AsyncFile> {
    wrap(handle, Origin::default(), dispatcher)
}

pub(crate) fn wrap(handle: BlockingHandle, mut origin: Origin, dispatcher: &Dispatcher) -> Result<AsyncFile> {
    #[cfg(unix)]
    if origin.raw_fd.is_none() {
        origin.raw_fd = raw_fd_of(&handle);
    }

    let dispatcher = dispatcher.clone();
    let file = match handle {
        BlockingHandle::Text(stream) => AsyncFile::Text(AsyncTextFile::new(stream, origin, dispatcher)),
        BlockingHandle::BufferedWriter(writer) => {
            AsyncFile::BufferedWriter(AsyncBufferedWriter::new(Buffered::Writer(writer), origin, dispatcher))
        }
        BlockingHandle::BufferedReader(reader) => {
            AsyncFile::BufferedReader(AsyncBufferedReader::new(Buffered::Reader(reader), origin, dispatcher))
        }
        BlockingHandle::BufferedRandom(random) => {
            AsyncFile::BufferedReader(AsyncBufferedReader::new(Buffered::Random(random), origin, dispatcher))
        }
        BlockingHandle::Member(member) => {
            if origin.name.is_none() {
                origin.name = Some(PathBuf::from(member.name()));
            }
            AsyncFile::BufferedReader(AsyncBufferedReader::new(Buffered::Member(member), origin, dispatcher))
        }
        BlockingHandle::MemberWriter(member) => {
            if origin.name.is_none() {
                origin.name = Some(PathBuf::from(member.name()));
            }
            AsyncFile::BufferedWriter(AsyncBufferedWriter::new(Buffered::MemberWriter(member), origin, dispatcher))
        }
        BlockingHandle::Spooled(spooled) => {
            AsyncFile::BufferedReader(AsyncBufferedReader::new(Buffered::Spooled(spooled), origin, dispatcher))
        }
        BlockingHandle::Raw(file) => AsyncFile::Raw(AsyncRawFile::new(file, origin, dispatcher)),
        BlockingHandle::Foreign { type_name, .. } => {
            event!(Level::DEBUG, message = "rejected unsupported handle", type_name);
            return Err(Error::UnsupportedCategory { type_name });
        }
    };
    Ok(file)
}

#[cfg(unix)]
fn raw_fd_of(handle: &BlockingHandle) -> Option<RawFd> {
    match handle {
        BlockingHandle::Text(stream) => stream.buffer().raw_fd(),
        BlockingHandle::BufferedWriter(writer) => Some(writer.get_ref().as_raw_fd()),
        BlockingHandle::BufferedReader(reader) => Some(reader.get_ref().as_raw_fd()),
        BlockingHandle::BufferedRandom(random) => Some(random.get_ref().as_raw_fd()),
        BlockingHandle::Raw(file) => Some(file.as_raw_fd()),
        BlockingHandle::Spooled(spooled) => spooled.file().ok().map(AsRawFd::as_raw_fd),
        BlockingHandle::Member(_) | BlockingHandle::MemberWriter(_) | BlockingHandle::Foreign { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use std::io::BufReader;

    use futures::executor::block_on;

    use super::*;
    use crate::blocking::{MemberReader, SpooledBuffer};

    #[test]
    fn each_category_gets_its_facade() {
        let dispatcher = Dispatcher::global();
        let raw = classify_and_wrap(BlockingHandle::Raw(tempfile::tempfile().unwrap()), &dispatcher).unwrap();
        assert_eq!(raw.category(), Category::Raw);

        let reader = BufReader::new(tempfile::tempfile().unwrap());
        let reader = classify_and_wrap(BlockingHandle::BufferedReader(reader), &dispatcher).unwrap();
        assert_eq!(reader.category(), Category::BufferedReader);

        let member = classify_and_wrap(BlockingHandle::Member(MemberReader::new("inner.txt", vec![])), &dispatcher).unwrap();
        assert_eq!(member.name(), Some(Path::new("inner.txt")));

        block_on(async {
            raw.close().await.unwrap();
            reader.close().await.unwrap();
            member.close().await.unwrap();
        });
    }

    #[test]
    fn spooled_buffers_wrap_as_buffered_readers() {
        let spooled = BlockingHandle::Spooled(SpooledBuffer::new(4, None, 64));
        let file = classify_and_wrap(spooled, &Dispatcher::global()).unwrap();
        assert_eq!(file.category(), Category::BufferedReader);
        assert!(file.writable());

        block_on(async {
            let stream = file.as_buffered_reader().unwrap();
            assert_eq!(stream.write(b"spilled").await.unwrap(), 7);
            assert!(stream.metadata().await.is_ok());
            file.close().await.unwrap();
        });
    }

    #[test]
    fn foreign_handles_are_rejected() {
        let error = classify_and_wrap(BlockingHandle::foreign(String::from("not a stream")), &Dispatcher::global()).unwrap_err();
        match error {
            Error::UnsupportedCategory { type_name } => assert!(type_name.contains("String")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn accessors_report_mismatches() {
        let file = classify_and_wrap(BlockingHandle::Raw(tempfile::tempfile().unwrap()), &Dispatcher::global()).unwrap();
        let error = file.as_text().unwrap_err();
        assert!(matches!(
            error,
            Error::CategoryMismatch {
                expected: Category::Text,
                actual: Category::Raw
            }
        ));
        assert!(file.as_raw().is_ok());
        let _ = file.into_raw().unwrap();
    }
}
