// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::fmt;
use std::fs::File;
use std::io::{self, BufRead, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{Level, event};
use zip::ZipArchive;

const CHUNK_SIZE: usize = 64 * 1024;
const CHUNKS_IN_FLIGHT: usize = 2;

type Chunks = flume::Receiver<io::Result<Vec<u8>>>;

/// Where a streamed member decompresses from.
#[derive(Debug)]
struct Source {
    archive: PathBuf,
    chunks: Option<Chunks>,
}

/// A read-only, seekable stream over the decompressed bytes of an archive
/// member.
///
/// Members opened from an archive are decompressed in chunks as they are
/// read, on a thread dedicated to the member, so only a couple of chunks are
/// held in memory at a time. Seeking backwards restarts the decompression.
pub struct MemberReader {
    name: String,
    len: u64,
    chunk: Cursor<Vec<u8>>,
    chunk_start: u64,
    source: Option<Source>,
}

impl MemberReader {
    /// Creates a reader over `data`, reporting `name` as its origin.
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            len: data.len() as u64,
            chunk: Cursor::new(data),
            chunk_start: 0,
            source: None,
        }
    }

    /// Streams member `name` of the zip archive at `archive`, whose
    /// decompressed size is `len`. Nothing is read until the first read.
    pub(crate) fn stream(archive: PathBuf, name: impl Into<String>, len: u64) -> Self {
        Self {
            name: name.into(),
            len,
            chunk: Cursor::default(),
            chunk_start: 0,
            source: Some(Source { archive, chunks: None }),
        }
    }

    /// The member name inside its archive.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The decompressed size of the member.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// Returns `true` if the member has no content.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn position(&self) -> u64 {
        self.chunk_start + self.chunk.position()
    }

    fn chunk_remaining(&self) -> usize {
        let consumed = usize::try_from(self.chunk.position()).unwrap_or(usize::MAX);
        self.chunk.get_ref().len().saturating_sub(consumed)
    }

    /// Replaces the exhausted chunk with the next one. Leaves it empty at the
    /// end of the member.
    fn next_chunk(&mut self) -> io::Result<()> {
        let Some(source) = &mut self.source else {
            return Ok(());
        };
        if source.chunks.is_none() {
            source.chunks = Some(spawn_producer(&source.archive, &self.name)?);
        }
        if let Some(chunks) = &source.chunks
            && let Ok(chunk) = chunks.recv()
        {
            let position = self.chunk_start + self.chunk.position();
            self.chunk = Cursor::new(chunk?);
            self.chunk_start = position;
        }
        Ok(())
    }

    fn restart(&mut self) {
        if let Some(source) = &mut self.source {
            source.chunks = None;
        }
        self.chunk = Cursor::default();
        self.chunk_start = 0;
    }

    fn skip(&mut self, mut remaining: u64) -> io::Result<()> {
        while remaining > 0 {
            let available = self.fill_buf()?.len();
            if available == 0 {
                // Past the end: remember the position, reads report end of file.
                self.chunk_start = self.position() + remaining;
                self.chunk = Cursor::default();
                return Ok(());
            }
            let step = usize::try_from(remaining).map_or(available, |remaining| remaining.min(available));
            self.consume(step);
            remaining -= step as u64;
        }
        Ok(())
    }
}

fn spawn_producer(archive: &Path, name: &str) -> io::Result<Chunks> {
    let (sender, receiver) = flume::bounded(CHUNKS_IN_FLIGHT);
    let archive = archive.to_path_buf();
    let name = name.to_owned();
    event!(Level::DEBUG, message = "streaming archive member", member = %name);
    let _ = std::thread::Builder::new()
        .name("offload-fs-member".to_owned())
        .spawn(move || {
            if let Err(error) = produce(&archive, &name, &sender) {
                let _ = sender.send(Err(error));
            }
        })?;
    Ok(receiver)
}

/// Decompresses the member into the channel until it ends or the reader goes
/// away.
fn produce(archive: &Path, name: &str, sender: &flume::Sender<io::Result<Vec<u8>>>) -> io::Result<()> {
    let mut archive = ZipArchive::new(File::open(archive)?)?;
    let mut member = archive.by_name(name)?;
    loop {
        let mut chunk = Vec::with_capacity(CHUNK_SIZE);
        let n = Read::by_ref(&mut member).take(CHUNK_SIZE as u64).read_to_end(&mut chunk)?;
        if n == 0 || sender.send(Ok(chunk)).is_err() {
            return Ok(());
        }
    }
}

impl fmt::Debug for MemberReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberReader")
            .field("name", &self.name)
            .field("len", &self.len)
            .field("position", &self.position())
            .field("streamed", &self.source.is_some())
            .finish()
    }
}

impl Read for MemberReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl BufRead for MemberReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.chunk_remaining() == 0 && self.position() < self.len {
            self.next_chunk()?;
        }
        self.chunk.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.chunk.consume(amt);
    }
}

impl Seek for MemberReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position().checked_add_signed(delta),
        }
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid seek to a negative or overflowing position"))?;

        let chunk_end = self.chunk_start + self.chunk.get_ref().len() as u64;
        if self.source.is_none() || (self.chunk_start..=chunk_end).contains(&target) {
            self.chunk.set_position(target - self.chunk_start);
            return Ok(target);
        }

        if target < self.chunk_start {
            self.restart();
        }
        let position = self.position();
        self.skip(target - position)?;
        Ok(target)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.position())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    use super::*;

    fn archive_with(name: &str, data: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let scratch = tempfile::tempdir().unwrap();
        let path = scratch.path().join("members.zip");
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        writer.start_file(name, SimpleFileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
        let _ = writer.finish().unwrap();
        (scratch, path)
    }

    #[test]
    fn in_memory_members_seek_like_cursors() {
        let mut member = MemberReader::new("m", b"abcdef".to_vec());
        assert_eq!(member.seek(SeekFrom::End(-2)).unwrap(), 4);
        let mut rest = String::new();
        let _ = member.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "ef");
        assert!(member.seek(SeekFrom::Current(-10)).is_err());
    }

    #[test]
    fn streamed_members_arrive_in_chunks() {
        let data: Vec<u8> = (0..3 * CHUNK_SIZE + 17).map(|i| u8::try_from(i % 251).unwrap()).collect();
        let (_scratch, path) = archive_with("big.bin", &data);

        let mut member = MemberReader::stream(path, "big.bin", data.len() as u64);
        let mut read = Vec::new();
        let _ = member.read_to_end(&mut read).unwrap();
        assert_eq!(read, data);
        assert_eq!(member.stream_position().unwrap(), data.len() as u64);
    }

    #[test]
    fn streamed_members_seek_both_ways() {
        let data: Vec<u8> = (0..2 * CHUNK_SIZE).map(|i| u8::try_from(i % 7).unwrap()).collect();
        let (_scratch, path) = archive_with("seek.bin", &data);
        let mut member = MemberReader::stream(path, "seek.bin", data.len() as u64);

        let far = (CHUNK_SIZE + 3) as u64;
        assert_eq!(member.seek(SeekFrom::Start(far)).unwrap(), far);
        let mut byte = [0; 1];
        member.read_exact(&mut byte).unwrap();
        assert_eq!(byte[0], data[CHUNK_SIZE + 3]);

        assert_eq!(member.seek(SeekFrom::Start(1)).unwrap(), 1);
        member.read_exact(&mut byte).unwrap();
        assert_eq!(byte[0], data[1]);

        assert_eq!(member.seek(SeekFrom::End(5)).unwrap(), data.len() as u64 + 5);
        assert_eq!(member.read(&mut byte).unwrap(), 0);
    }

    #[test]
    fn missing_streamed_members_fail_on_read() {
        let (_scratch, path) = archive_with("present", b"x");
        let mut member = MemberReader::stream(path, "absent", 1);
        assert!(member.read(&mut [0; 1]).is_err());
    }
}
