// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::sync::atomic::{AtomicBool, Ordering};
use std::fs::File;
use std::io::{self, BufRead, Cursor, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{Level, event};

use super::{BufferedRandom, unsupported};

#[derive(Debug)]
enum Spool {
    InMemory(Cursor<Vec<u8>>),
    OnDisk(BufferedRandom),
}

/// A read-write byte buffer that lives in memory until it grows past a size
/// limit, then moves to an anonymous temporary file.
///
/// This is the blocking stream behind
/// [`spooled_temporary_file`](crate::temp::spooled_temporary_file). Wrapped
/// through [`BlockingHandle::Spooled`](crate::BlockingHandle::Spooled), it
/// gets the buffered reader facade.
#[derive(Debug)]
pub struct SpooledBuffer {
    spool: Spool,
    max_size: u64,
    dir: Option<PathBuf>,
    buffer_size: usize,
    rolled_over: Arc<AtomicBool>,
}

impl SpooledBuffer {
    /// Creates an empty buffer that rolls over once it holds more than
    /// `max_size` bytes. The backing file is created in `dir`, or in the
    /// system temporary directory, and buffered with `buffer_size` bytes.
    ///
    /// A `max_size` of zero never rolls over on its own.
    #[must_use]
    pub fn new(max_size: u64, dir: Option<PathBuf>, buffer_size: usize) -> Self {
        Self {
            spool: Spool::InMemory(Cursor::new(Vec::new())),
            max_size,
            dir,
            buffer_size,
            rolled_over: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A flag that turns `true` once the content has moved to disk.
    pub(crate) fn rolled_over_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.rolled_over)
    }

    /// Whether the content has moved to disk.
    #[must_use]
    pub fn is_rolled_over(&self) -> bool {
        matches!(self.spool, Spool::OnDisk(_))
    }

    /// Moves the content to a temporary file, keeping the position. Does
    /// nothing if that already happened.
    ///
    /// # Errors
    ///
    /// Returns the failure of creating or writing the backing file.
    pub fn rollover(&mut self) -> io::Result<()> {
        let Spool::InMemory(memory) = &self.spool else {
            return Ok(());
        };

        let mut file = match &self.dir {
            Some(dir) => tempfile::tempfile_in(dir)?,
            None => tempfile::tempfile()?,
        };
        file.write_all(memory.get_ref())?;
        let _ = file.seek(SeekFrom::Start(memory.position()))?;

        event!(Level::DEBUG, message = "spooled buffer rolled over", size = memory.get_ref().len());
        self.spool = Spool::OnDisk(BufferedRandom::with_capacity(self.buffer_size, file));
        self.rolled_over.store(true, Ordering::Release);
        Ok(())
    }

    pub(crate) fn file(&self) -> io::Result<&File> {
        match &self.spool {
            Spool::InMemory(_) => Err(unsupported("spooled buffer has not rolled over to a file")),
            Spool::OnDisk(random) => Ok(random.get_ref()),
        }
    }

    pub(crate) fn into_file(self) -> io::Result<File> {
        match self.spool {
            Spool::InMemory(_) => Err(unsupported("spooled buffer has not rolled over to a file")),
            Spool::OnDisk(random) => random.into_inner(),
        }
    }

    /// Resizes the content to `size`, or to the current position when
    /// `None`. Growing an in-memory buffer past the limit rolls it over.
    pub(crate) fn truncate(&mut self, size: Option<u64>) -> io::Result<u64> {
        let target = match size {
            Some(size) => size,
            None => self.stream_position()?,
        };
        if self.exceeds_limit(target) {
            self.rollover()?;
        }
        match &mut self.spool {
            Spool::InMemory(memory) => {
                let data = memory.get_mut();
                if let Ok(len) = usize::try_from(target)
                    && len < data.len()
                {
                    data.truncate(len);
                }
            }
            Spool::OnDisk(random) => random.set_len(target)?,
        }
        Ok(target)
    }

    const fn exceeds_limit(&self, size: u64) -> bool {
        self.max_size > 0 && size > self.max_size && matches!(self.spool, Spool::InMemory(_))
    }
}

impl Read for SpooledBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.spool {
            Spool::InMemory(memory) => memory.read(buf),
            Spool::OnDisk(random) => random.read(buf),
        }
    }
}

impl BufRead for SpooledBuffer {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match &mut self.spool {
            Spool::InMemory(memory) => memory.fill_buf(),
            Spool::OnDisk(random) => random.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match &mut self.spool {
            Spool::InMemory(memory) => memory.consume(amt),
            Spool::OnDisk(random) => random.consume(amt),
        }
    }
}

impl Write for SpooledBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = match &mut self.spool {
            Spool::InMemory(memory) => memory.write(buf)?,
            Spool::OnDisk(random) => return random.write(buf),
        };
        let position = self.stream_position()?;
        if self.exceeds_limit(position) {
            self.rollover()?;
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.spool {
            Spool::InMemory(_) => Ok(()),
            Spool::OnDisk(random) => random.flush(),
        }
    }
}

impl Seek for SpooledBuffer {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match &mut self.spool {
            Spool::InMemory(memory) => memory.seek(pos),
            Spool::OnDisk(random) => random.seek(pos),
        }
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        match &mut self.spool {
            Spool::InMemory(memory) => Ok(memory.position()),
            Spool::OnDisk(random) => random.stream_position(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_in_memory_up_to_the_limit() {
        let mut spool = SpooledBuffer::new(8, None, 64);
        spool.write_all(b"12345678").unwrap();
        assert!(!spool.rolled_over_flag().load(Ordering::Acquire));
        assert!(!spool.is_rolled_over());
        assert!(spool.file().is_err());
    }

    #[test]
    fn rolls_over_when_the_limit_is_exceeded() {
        let mut spool = SpooledBuffer::new(8, None, 64);
        let flag = spool.rolled_over_flag();
        spool.write_all(b"123456789").unwrap();
        assert!(flag.load(Ordering::Acquire));
        assert_eq!(spool.stream_position().unwrap(), 9);

        let _ = spool.seek(SeekFrom::Start(0)).unwrap();
        let mut content = String::new();
        let _ = spool.read_to_string(&mut content).unwrap();
        assert_eq!(content, "123456789");
    }

    #[test]
    fn zero_limit_never_rolls_over() {
        let mut spool = SpooledBuffer::new(0, None, 64);
        spool.write_all(&[7; 4096]).unwrap();
        assert!(!spool.rolled_over_flag().load(Ordering::Acquire));
    }

    #[test]
    fn explicit_rollover_keeps_position() {
        let mut spool = SpooledBuffer::new(0, None, 64);
        spool.write_all(b"abcdef").unwrap();
        let _ = spool.seek(SeekFrom::Start(2)).unwrap();
        spool.rollover().unwrap();
        let mut rest = String::new();
        let _ = spool.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "cdef");
        assert_eq!(spool.file().unwrap().metadata().unwrap().len(), 6);
    }

    #[test]
    fn truncate_past_the_limit_rolls_over() {
        let mut spool = SpooledBuffer::new(4, None, 64);
        spool.write_all(b"ab").unwrap();
        assert_eq!(spool.truncate(Some(10)).unwrap(), 10);
        assert!(spool.rolled_over_flag().load(Ordering::Acquire));
        assert_eq!(spool.file().unwrap().metadata().unwrap().len(), 10);
    }

    #[test]
    fn truncate_in_memory_shrinks() {
        let mut spool = SpooledBuffer::new(0, None, 64);
        spool.write_all(b"abcdef").unwrap();
        assert_eq!(spool.truncate(Some(3)).unwrap(), 3);
        let _ = spool.seek(SeekFrom::Start(0)).unwrap();
        let mut content = String::new();
        let _ = spool.read_to_string(&mut content).unwrap();
        assert_eq!(content, "abc");
    }
}
