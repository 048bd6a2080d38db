// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fs::{File, Metadata};
use std::io::{self, BufRead, BufReader, BufWriter, IsTerminal, Read, Seek, SeekFrom, Write};

use super::{BlockingHandle, BufferedRandom, MemberReader, SpooledBuffer, unsupported};
use crate::archive::MemberWriter;

/// Any buffered binary stream a facade can hold.
#[derive(Debug)]
pub(crate) enum Buffered {
    Reader(BufReader<File>),
    Writer(BufWriter<File>),
    Random(BufferedRandom),
    Member(MemberReader),
    MemberWriter(MemberWriter),
    Spooled(SpooledBuffer),
}

impl Buffered {
    pub(crate) const fn readable(&self) -> bool {
        !matches!(self, Self::Writer(_) | Self::MemberWriter(_))
    }

    pub(crate) const fn writable(&self) -> bool {
        matches!(self, Self::Writer(_) | Self::Random(_) | Self::MemberWriter(_) | Self::Spooled(_))
    }

    fn file(&self) -> io::Result<&File> {
        match self {
            Self::Reader(reader) => Ok(reader.get_ref()),
            Self::Writer(writer) => Ok(writer.get_ref()),
            Self::Random(random) => Ok(random.get_ref()),
            Self::Member(_) | Self::MemberWriter(_) => Err(unsupported("archive members are not backed by a file")),
            Self::Spooled(spooled) => spooled.file(),
        }
    }

    #[cfg(unix)]
    pub(crate) fn raw_fd(&self) -> Option<std::os::unix::io::RawFd> {
        use std::os::unix::io::AsRawFd;
        self.file().ok().map(AsRawFd::as_raw_fd)
    }

    pub(crate) fn metadata(&self) -> io::Result<Metadata> {
        self.file()?.metadata()
    }

    pub(crate) fn is_terminal(&self) -> bool {
        self.file().is_ok_and(IsTerminal::is_terminal)
    }

    /// Reads at most `size` bytes with no more than one call to the file.
    pub(crate) fn read1(&mut self, size: Option<usize>) -> io::Result<Vec<u8>> {
        let available = self.fill_buf()?;
        let take = size.map_or(available.len(), |n| n.min(available.len()));
        let chunk = available[..take].to_vec();
        self.consume(take);
        Ok(chunk)
    }

    /// Returns buffered bytes without advancing; the buffer is refilled only
    /// when it is empty.
    pub(crate) fn peek(&mut self) -> io::Result<Vec<u8>> {
        Ok(self.fill_buf()?.to_vec())
    }

    /// Resizes the file to `size`, or to the current position when `None`.
    /// Returns the new size.
    pub(crate) fn truncate(&mut self, size: Option<u64>) -> io::Result<u64> {
        self.flush()?;
        let target = match size {
            Some(size) => size,
            None => self.stream_position()?,
        };
        match self {
            Self::Reader(_) => return Err(unsupported("truncate on a read-only stream")),
            Self::Writer(writer) => writer.get_ref().set_len(target)?,
            Self::Random(random) => random.set_len(target)?,
            Self::Member(_) | Self::MemberWriter(_) => return Err(unsupported("truncate on an archive member")),
            Self::Spooled(spooled) => return spooled.truncate(Some(target)),
        }
        Ok(target)
    }

    /// Flushes pending writes and drops the stream.
    pub(crate) fn close(self) -> io::Result<()> {
        match self {
            Self::Writer(writer) => writer.into_inner().map(drop).map_err(io::IntoInnerError::into_error),
            Self::Random(mut random) => random.flush(),
            Self::MemberWriter(member) => member.close(),
            Self::Reader(_) | Self::Member(_) | Self::Spooled(_) => Ok(()),
        }
    }

    /// Unwraps the file, flushing pending writes and leaving the OS cursor at
    /// the logical position.
    pub(crate) fn into_file(self) -> io::Result<File> {
        match self {
            Self::Writer(writer) => writer.into_inner().map_err(io::IntoInnerError::into_error),
            Self::Reader(mut reader) => {
                let _ = reader.seek(SeekFrom::Current(0))?;
                Ok(reader.into_inner())
            }
            Self::Random(random) => random.into_inner(),
            Self::Member(_) | Self::MemberWriter(_) => Err(unsupported("archive members are not backed by a file")),
            Self::Spooled(spooled) => spooled.into_file(),
        }
    }

    /// Hands the stream back as a recognized blocking handle.
    pub(crate) fn into_handle(self) -> BlockingHandle {
        match self {
            Self::Reader(reader) => BlockingHandle::BufferedReader(reader),
            Self::Writer(writer) => BlockingHandle::BufferedWriter(writer),
            Self::Random(random) => BlockingHandle::BufferedRandom(random),
            Self::Member(member) => BlockingHandle::Member(member),
            Self::MemberWriter(member) => BlockingHandle::MemberWriter(member),
            Self::Spooled(spooled) => BlockingHandle::Spooled(spooled),
        }
    }
}

impl Read for Buffered {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Reader(reader) => reader.read(buf),
            Self::Writer(_) | Self::MemberWriter(_) => Err(unsupported("not readable")),
            Self::Random(random) => random.read(buf),
            Self::Member(member) => member.read(buf),
            Self::Spooled(spooled) => spooled.read(buf),
        }
    }
}

impl BufRead for Buffered {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            Self::Reader(reader) => reader.fill_buf(),
            Self::Writer(_) | Self::MemberWriter(_) => Err(unsupported("not readable")),
            Self::Random(random) => random.fill_buf(),
            Self::Member(member) => member.fill_buf(),
            Self::Spooled(spooled) => spooled.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            Self::Reader(reader) => reader.consume(amt),
            Self::Writer(_) | Self::MemberWriter(_) => {}
            Self::Random(random) => random.consume(amt),
            Self::Member(member) => member.consume(amt),
            Self::Spooled(spooled) => spooled.consume(amt),
        }
    }
}

impl Write for Buffered {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Writer(writer) => writer.write(buf),
            Self::Random(random) => random.write(buf),
            Self::MemberWriter(member) => member.write(buf),
            Self::Spooled(spooled) => spooled.write(buf),
            Self::Reader(_) | Self::Member(_) => Err(unsupported("not writable")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Writer(writer) => writer.flush(),
            Self::Random(random) => random.flush(),
            Self::MemberWriter(member) => member.flush(),
            Self::Spooled(spooled) => spooled.flush(),
            Self::Reader(_) | Self::Member(_) => Ok(()),
        }
    }
}

impl Seek for Buffered {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Self::Reader(reader) => reader.seek(pos),
            Self::Writer(writer) => writer.seek(pos),
            Self::Random(random) => random.seek(pos),
            Self::Member(member) => member.seek(pos),
            Self::MemberWriter(member) => member.seek(pos),
            Self::Spooled(spooled) => spooled.seek(pos),
        }
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        match self {
            Self::Reader(reader) => reader.stream_position(),
            Self::Writer(writer) => writer.stream_position(),
            Self::Random(random) => random.stream_position(),
            Self::Member(member) => member.stream_position(),
            Self::MemberWriter(member) => member.stream_position(),
            Self::Spooled(spooled) => spooled.stream_position(),
        }
    }
}
