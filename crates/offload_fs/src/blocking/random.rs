// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};

/// A buffered file open for both reading and writing.
///
/// Reads are served from a read-ahead buffer. Before every write the buffer is
/// discarded and the OS cursor is moved back to the logical position, so
/// reads and writes can be interleaved freely.
#[derive(Debug)]
pub struct BufferedRandom {
    inner: BufReader<File>,
}

impl BufferedRandom {
    /// Wraps `file` with a buffer of the given capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize, file: File) -> Self {
        Self {
            inner: BufReader::with_capacity(capacity, file),
        }
    }

    /// Returns a reference to the underlying file.
    #[must_use]
    pub fn get_ref(&self) -> &File {
        self.inner.get_ref()
    }

    /// Unwraps the file, with the OS cursor at the logical position.
    ///
    /// # Errors
    ///
    /// Fails if the cursor cannot be repositioned.
    pub fn into_inner(mut self) -> io::Result<File> {
        self.sync_position()?;
        Ok(self.inner.into_inner())
    }

    /// Sets the file length, leaving the cursor where it was.
    pub(crate) fn set_len(&mut self, size: u64) -> io::Result<()> {
        self.sync_position()?;
        self.inner.get_ref().set_len(size)
    }

    fn sync_position(&mut self) -> io::Result<()> {
        if !self.inner.buffer().is_empty() {
            let _ = self.inner.seek(SeekFrom::Current(0))?;
        }
        Ok(())
    }
}

impl Read for BufferedRandom {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl BufRead for BufferedRandom {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt);
    }
}

impl Write for BufferedRandom {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sync_position()?;
        self.inner.get_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.get_mut().flush()
    }
}

impl Seek for BufferedRandom {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        self.inner.stream_position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_after_read_lands_at_logical_position() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"0123456789").unwrap();
        let _ = file.seek(SeekFrom::Start(0)).unwrap();

        let mut random = BufferedRandom::with_capacity(64, file);
        let mut head = [0_u8; 3];
        random.read_exact(&mut head).unwrap();
        assert_eq!(&head, b"012");

        random.write_all(b"abc").unwrap();
        assert_eq!(random.stream_position().unwrap(), 6);

        let _ = random.seek(SeekFrom::Start(0)).unwrap();
        let mut all = String::new();
        let _ = random.read_to_string(&mut all).unwrap();
        assert_eq!(all, "012abc6789");
    }

    #[test]
    fn into_inner_keeps_the_cursor() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"hello world").unwrap();
        let _ = file.seek(SeekFrom::Start(0)).unwrap();

        let mut random = BufferedRandom::with_capacity(64, file);
        let mut word = [0_u8; 5];
        random.read_exact(&mut word).unwrap();
        let mut file = random.into_inner().unwrap();
        assert_eq!(file.stream_position().unwrap(), 5);
    }
}
