// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Zip archives.
//!
//! An archive is a facade over a zip container. Members can be read whole,
//! extracted to disk, or opened as their own scoped facade through
//! [`AsyncZipArchive::open_member`]. Members opened for reading are
//! decompressed as they are read; members opened for writing stream into the
//! archive and hold it until they are closed.

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{Level, event};
pub use zip::CompressionMethod;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::blocking::{BlockingHandle, MemberReader, unsupported};
use crate::context::{Facade, ScopedContext};
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::facade::Origin;
use crate::handle_cell::{HandleCell, Lease};
use crate::mode::Mode;
use crate::wrap::{AsyncFile, wrap};

/// How an archive is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArchiveMode {
    /// Read an existing archive.
    Read,
    /// Create a new archive, replacing any existing file.
    Write,
    /// Add members to an existing archive, or create it if missing.
    Append,
}

/// How [`AsyncZipArchive::open_member_with`] opens a member.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MemberMode {
    /// Read an existing member, decompressing it as it is read.
    #[default]
    Read,
    /// Add a new member to an archive opened for writing or appending.
    Write,
}

/// Describes one member of an archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberInfo {
    /// The member name as stored in the archive.
    pub name: String,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Compressed size in bytes.
    pub compressed_size: u64,
    /// How the member is compressed.
    pub compression: CompressionMethod,
    /// CRC-32 of the uncompressed content.
    pub crc32: u32,
    /// Whether the member is a directory entry.
    pub is_dir: bool,
}

enum Container {
    Reader(ZipArchive<File>),
    Writer {
        writer: ZipWriter<File>,
        names: Vec<String>,
        comment: String,
    },
}

impl Container {
    fn reader(&mut self) -> io::Result<&mut ZipArchive<File>> {
        match self {
            Self::Reader(archive) => Ok(archive),
            Self::Writer { .. } => Err(unsupported("archive is not open for reading")),
        }
    }

    fn writer(&mut self) -> io::Result<(&mut ZipWriter<File>, &mut Vec<String>)> {
        match self {
            Self::Writer { writer, names, .. } => Ok((writer, names)),
            Self::Reader(_) => Err(unsupported("archive is not open for writing")),
        }
    }

    fn finish(self) -> Result<()> {
        if let Self::Writer { writer, .. } = self {
            let _ = writer.finish()?;
        }
        Ok(())
    }
}

/// Opens the zip archive at `path`.
///
/// `compression` applies to members added through
/// [`write`](AsyncZipArchive::write) and [`writestr`](AsyncZipArchive::writestr);
/// it is ignored when reading.
///
/// # Examples
///
/// ```no_run
/// use offload_fs::archive::{ArchiveMode, CompressionMethod, open_archive};
///
/// # async fn example() -> offload_fs::Result<()> {
/// open_archive("bundle.zip", ArchiveMode::Write, CompressionMethod::Deflated)
///     .scope(async |archive| archive.writestr("hello.txt", "Hello World!").await)
///     .await?;
/// # Ok(())
/// # }
/// ```
pub fn open_archive(path: impl AsRef<Path>, mode: ArchiveMode, compression: CompressionMethod) -> ScopedContext<AsyncZipArchive> {
    open_archive_with(path, mode, compression, Dispatcher::global())
}

/// Like [`open_archive`], dispatching through `dispatcher`.
pub fn open_archive_with(
    path: impl AsRef<Path>,
    mode: ArchiveMode,
    compression: CompressionMethod,
    dispatcher: Dispatcher,
) -> ScopedContext<AsyncZipArchive> {
    let path = path.as_ref().to_path_buf();
    ScopedContext::new(async move {
        let target = path.clone();
        let container = dispatcher.dispatch(move || open_container(&target, mode)).await?;
        event!(Level::DEBUG, message = "archive opened", path = %path.display(), ?mode);
        Ok(AsyncZipArchive {
            cell: Arc::new(HandleCell::new(container, dispatcher, Container::finish)),
            writing: Arc::new(AtomicBool::new(false)),
            path,
            mode,
            compression,
        })
    })
}

fn open_container(path: &Path, mode: ArchiveMode) -> Result<Container> {
    Ok(match mode {
        ArchiveMode::Read => Container::Reader(ZipArchive::new(File::open(path)?)?),
        ArchiveMode::Write => Container::Writer {
            writer: ZipWriter::new(File::create(path)?),
            names: Vec::new(),
            comment: String::new(),
        },
        ArchiveMode::Append => {
            let mut file = File::options().read(true).write(true).create(true).truncate(false).open(path)?;
            if file.metadata()?.len() == 0 {
                Container::Writer {
                    writer: ZipWriter::new(file),
                    names: Vec::new(),
                    comment: String::new(),
                }
            } else {
                let existing = ZipArchive::new(&mut file)?;
                let names = existing.file_names().map(str::to_owned).collect();
                let comment = String::from_utf8_lossy(existing.comment()).into_owned();
                drop(existing);
                Container::Writer {
                    writer: ZipWriter::new_append(file)?,
                    names,
                    comment,
                }
            }
        }
    })
}

/// Reports whether `path` is a readable zip archive. Any failure, including
/// a missing file, reports `false`.
pub async fn is_zip_file(path: impl AsRef<Path>) -> bool {
    is_zip_file_with(path, &Dispatcher::global()).await
}

/// Like [`is_zip_file`], dispatching through `dispatcher`.
pub async fn is_zip_file_with(path: impl AsRef<Path>, dispatcher: &Dispatcher) -> bool {
    let path = path.as_ref().to_path_buf();
    dispatcher
        .dispatch(move || File::open(path).is_ok_and(|file| ZipArchive::new(file).is_ok()))
        .await
}

fn member_open_for_writing(operation: &'static str) -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("can't {operation} while an archive member is open for writing"),
    ))
}

fn ensure_idle(writing: &AtomicBool, operation: &'static str) -> Result<()> {
    if writing.load(Ordering::Acquire) {
        return Err(member_open_for_writing(operation));
    }
    Ok(())
}

/// Marks the archive busy while a member is open for writing.
struct WritingGuard(Arc<AtomicBool>);

impl WritingGuard {
    fn acquire(writing: &Arc<AtomicBool>) -> Option<Self> {
        writing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(writing)))
    }
}

impl Drop for WritingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// An open zip archive.
#[derive(Debug)]
pub struct AsyncZipArchive {
    cell: Arc<HandleCell<Container>>,
    writing: Arc<AtomicBool>,
    path: PathBuf,
    mode: ArchiveMode,
    compression: CompressionMethod,
}

impl AsyncZipArchive {
    async fn call<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Container) -> Result<T> + Send + 'static,
    {
        ensure_idle(&self.writing, operation)?;
        self.cell.call(operation, f).await
    }

    /// The names of all members, in archive order.
    ///
    /// # Errors
    ///
    /// Returns a state error if the archive was closed.
    pub async fn names(&self) -> Result<Vec<String>> {
        self.call("names", |container| {
            Ok(match container {
                Container::Reader(archive) => archive.file_names().map(str::to_owned).collect(),
                Container::Writer { names, .. } => names.clone(),
            })
        })
        .await
    }

    /// Describes every member, in archive order.
    ///
    /// # Errors
    ///
    /// Fails for an archive opened for writing, on a corrupt central
    /// directory, or with a state error.
    pub async fn infolist(&self) -> Result<Vec<MemberInfo>> {
        self.call("infolist", |container| {
            let archive = container.reader()?;
            let mut infos = Vec::with_capacity(archive.len());
            for index in 0..archive.len() {
                let member = archive.by_index_raw(index)?;
                infos.push(MemberInfo {
                    name: member.name().to_owned(),
                    size: member.size(),
                    compressed_size: member.compressed_size(),
                    compression: member.compression(),
                    crc32: member.crc32(),
                    is_dir: member.is_dir(),
                });
            }
            Ok(infos)
        })
        .await
    }

    /// Reads and decompresses one member.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Archive`](crate::Error::Archive) for a missing or
    /// corrupt member.
    pub async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let name = name.to_owned();
        self.call("read", move |container| read_member(container.reader()?, &name)).await
    }

    /// Reads every member and checks its checksum. Returns the name of the
    /// first damaged member, or `None` if all are intact.
    ///
    /// # Errors
    ///
    /// Fails for an archive opened for writing, or with a state error.
    pub async fn test(&self) -> Result<Option<String>> {
        self.call("test", |container| {
            let archive = container.reader()?;
            for index in 0..archive.len() {
                let mut member = archive.by_index(index)?;
                if io::copy(&mut member, &mut io::sink()).is_err() {
                    return Ok(Some(member.name().to_owned()));
                }
            }
            Ok(None)
        })
        .await
    }

    /// Extracts one member below `dir` and returns the path written.
    ///
    /// # Errors
    ///
    /// Fails for member names that would escape `dir`, on I/O failure, or
    /// with the errors of [`read`](Self::read).
    pub async fn extract(&self, name: &str, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let name = name.to_owned();
        let dir = dir.as_ref().to_path_buf();
        self.call("extract", move |container| {
            let mut member = container.reader()?.by_name(&name)?;
            let target = member
                .enclosed_name()
                .map(|relative| dir.join(relative))
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("unsafe member name '{name}'")))?;
            if member.is_dir() {
                std::fs::create_dir_all(&target)?;
            } else {
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let _ = io::copy(&mut member, &mut File::create(&target)?)?;
            }
            Ok(target)
        })
        .await
    }

    /// Extracts every member below `dir`.
    ///
    /// # Errors
    ///
    /// See [`extract`](Self::extract).
    pub async fn extract_all(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref().to_path_buf();
        self.call("extract_all", move |container| Ok(container.reader()?.extract(&dir)?)).await
    }

    /// Opens one member for reading as its own buffered facade.
    ///
    /// Shorthand for [`open_member_with`](Self::open_member_with) and
    /// [`MemberMode::Read`].
    pub fn open_member(&self, name: &str) -> ScopedContext<AsyncFile> {
        self.open_member_with(name, MemberMode::Read)
    }

    /// Opens one member as its own buffered facade.
    ///
    /// In [`MemberMode::Read`] the member is looked up when the returned
    /// context is first awaited or entered, and decompressed as it is read.
    /// The reader can outlive the archive.
    ///
    /// In [`MemberMode::Write`] the member is added to an archive opened for
    /// writing or appending, and the context yields a buffered writer. Until
    /// that writer is closed, every other operation on the archive, closing
    /// included, fails with [`io::ErrorKind::InvalidInput`].
    pub fn open_member_with(&self, name: &str, mode: MemberMode) -> ScopedContext<AsyncFile> {
        let name = name.to_owned();
        let cell = Arc::clone(&self.cell);
        let writing = Arc::clone(&self.writing);
        match mode {
            MemberMode::Read => {
                let archive = self.path.clone();
                ScopedContext::new(async move {
                    ensure_idle(&writing, "open_member")?;
                    let target = name.clone();
                    let len = cell
                        .call("open_member", move |container| Ok(container.reader()?.by_name(&target)?.size()))
                        .await?;
                    let origin = Origin {
                        mode: Some(Mode::parse("rb")?),
                        ..Origin::default()
                    };
                    wrap(BlockingHandle::Member(MemberReader::stream(archive, name, len)), origin, cell.dispatcher())
                })
            }
            MemberMode::Write => {
                let options = self.file_options();
                ScopedContext::new(async move {
                    let guard = WritingGuard::acquire(&writing).ok_or_else(|| member_open_for_writing("open a second member"))?;
                    let lease = cell.lease("open_member").await?;
                    let member = cell
                        .dispatcher()
                        .dispatch(move || MemberWriter::start(lease, name, options, guard))
                        .await?;
                    let origin = Origin {
                        name: Some(PathBuf::from(member.name())),
                        mode: Some(Mode::parse("wb")?),
                        ..Origin::default()
                    };
                    wrap(BlockingHandle::MemberWriter(member), origin, cell.dispatcher())
                })
            }
        }
    }

    /// Adds the file at `source` to the archive, named `arcname` or the file
    /// name of `source`.
    ///
    /// # Errors
    ///
    /// Fails for an archive opened for reading, on I/O failure, or with a
    /// state error.
    pub async fn write(&self, source: impl AsRef<Path>, arcname: Option<&str>) -> Result<()> {
        let source = source.as_ref().to_path_buf();
        let arcname = match arcname {
            Some(arcname) => arcname.to_owned(),
            None => source
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "source path has no file name"))?,
        };
        let options = self.file_options();
        self.call("write", move |container| {
            let mut input = File::open(&source)?;
            let (writer, names) = container.writer()?;
            writer.start_file(arcname.clone(), options)?;
            let _ = io::copy(&mut input, writer)?;
            names.push(arcname);
            Ok(())
        })
        .await
    }

    /// Adds a member named `name` holding `data`.
    ///
    /// # Errors
    ///
    /// Fails for an archive opened for reading, or with a state error.
    pub async fn writestr(&self, name: &str, data: impl Into<Vec<u8>>) -> Result<()> {
        let name = name.to_owned();
        let data = data.into();
        let options = self.file_options();
        self.call("writestr", move |container| {
            let (writer, names) = container.writer()?;
            writer.start_file(name.clone(), options)?;
            io::Write::write_all(writer, &data)?;
            names.push(name);
            Ok(())
        })
        .await
    }

    /// The archive comment.
    ///
    /// # Errors
    ///
    /// Returns a state error if the archive was closed.
    pub async fn comment(&self) -> Result<String> {
        self.call("comment", |container| {
            Ok(match container {
                Container::Reader(archive) => String::from_utf8_lossy(archive.comment()).into_owned(),
                Container::Writer { comment, .. } => comment.clone(),
            })
        })
        .await
    }

    /// Sets the archive comment, written when the archive is closed.
    ///
    /// # Errors
    ///
    /// Fails for an archive opened for reading, or with a state error.
    pub async fn set_comment(&self, comment: impl Into<String>) -> Result<()> {
        let comment = comment.into();
        self.call("set_comment", move |container| match container {
            Container::Writer { writer, comment: current, .. } => {
                writer.set_comment(comment.clone());
                *current = comment;
                Ok(())
            }
            Container::Reader(_) => Err(unsupported("archive is not open for writing").into()),
        })
        .await
    }

    /// Closes the archive, writing the central directory if it was opened
    /// for writing. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the failure of writing the central directory.
    pub async fn close(&self) -> Result<()> {
        ensure_idle(&self.writing, "close")?;
        self.cell.close().await
    }

    /// Whether [`close`](Self::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cell.is_closed()
    }

    /// The path of the archive.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The mode the archive was opened with.
    #[must_use]
    pub const fn mode(&self) -> ArchiveMode {
        self.mode
    }

    /// The compression applied to new members.
    #[must_use]
    pub const fn compression(&self) -> CompressionMethod {
        self.compression
    }

    fn file_options(&self) -> SimpleFileOptions {
        SimpleFileOptions::default().compression_method(self.compression)
    }
}

fn read_member(archive: &mut ZipArchive<File>, name: &str) -> Result<Vec<u8>> {
    let mut member = archive.by_name(name)?;
    let mut data = Vec::with_capacity(usize::try_from(member.size()).unwrap_or_default());
    let _ = member.read_to_end(&mut data)?;
    Ok(data)
}

/// A member being written into an archive.
///
/// Holds the archive for as long as it lives. The member is completed when
/// the archive writes its next member or is closed.
pub struct MemberWriter {
    name: String,
    lease: Lease<Container>,
    written: u64,
    _writing: WritingGuard,
}

impl MemberWriter {
    fn start(mut lease: Lease<Container>, name: String, options: SimpleFileOptions, writing: WritingGuard) -> Result<Self> {
        let (writer, names) = lease.get_mut()?.writer()?;
        writer.start_file(name.as_str(), options)?;
        names.push(name.clone());
        Ok(Self {
            name,
            lease,
            written: 0,
            _writing: writing,
        })
    }

    /// The member name inside its archive.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn zip(&mut self) -> io::Result<&mut ZipWriter<File>> {
        let (writer, _) = self.lease.get_mut()?.writer()?;
        Ok(writer)
    }

    pub(crate) fn close(mut self) -> io::Result<()> {
        self.zip()?.flush()
    }
}

impl Write for MemberWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.zip()?.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.zip()?.flush()
    }
}

impl Seek for MemberWriter {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match pos {
            SeekFrom::Current(0) => Ok(self.written),
            _ => Err(unsupported("seek on an archive member being written")),
        }
    }
}

impl fmt::Debug for MemberWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberWriter")
            .field("name", &self.name)
            .field("written", &self.written)
            .finish_non_exhaustive()
    }
}

impl Facade for AsyncZipArchive {
    fn release(&self) -> impl Future<Output = Result<()>> + Send {
        self.close()
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;
    use crate::blocking::Category;

    #[test]
    fn written_members_read_back() {
        let scratch = tempfile::tempdir().unwrap();
        let path = scratch.path().join("bundle.zip");

        block_on(async {
            let archive = open_archive(&path, ArchiveMode::Write, CompressionMethod::Deflated).await.unwrap();
            archive.writestr("a.txt", "alpha").await.unwrap();
            archive.writestr("b.txt", "beta").await.unwrap();
            archive.set_comment("two members").await.unwrap();
            assert_eq!(archive.names().await.unwrap(), ["a.txt", "b.txt"]);
            assert_eq!(archive.read("a.txt").await.unwrap_err().io_kind(), Some(io::ErrorKind::Unsupported));
            archive.close().await.unwrap();

            assert!(is_zip_file(&path).await);
            let archive = open_archive(&path, ArchiveMode::Read, CompressionMethod::Stored).await.unwrap();
            assert_eq!(archive.read("b.txt").await.unwrap(), b"beta");
            assert_eq!(archive.comment().await.unwrap(), "two members");
            assert_eq!(archive.test().await.unwrap(), None);

            let infos = archive.infolist().await.unwrap();
            assert_eq!(infos.len(), 2);
            assert_eq!(infos[0].size, 5);
            assert_eq!(infos[0].compression, CompressionMethod::Deflated);
            archive.close().await.unwrap();
        });
    }

    #[test]
    fn append_keeps_existing_members() {
        let scratch = tempfile::tempdir().unwrap();
        let path = scratch.path().join("grow.zip");

        block_on(async {
            for (name, data) in [("first", "1"), ("second", "2")] {
                let archive = open_archive(&path, ArchiveMode::Append, CompressionMethod::Stored).await.unwrap();
                archive.writestr(name, data).await.unwrap();
                archive.close().await.unwrap();
            }
            let archive = open_archive(&path, ArchiveMode::Read, CompressionMethod::Stored).await.unwrap();
            assert_eq!(archive.names().await.unwrap(), ["first", "second"]);
            archive.close().await.unwrap();
        });
    }

    #[test]
    fn members_open_for_writing_hold_the_archive() {
        let scratch = tempfile::tempdir().unwrap();
        let path = scratch.path().join("streamed.zip");

        block_on(async {
            let archive = open_archive(&path, ArchiveMode::Write, CompressionMethod::Bzip2).await.unwrap();
            let member = archive.open_member_with("log.txt", MemberMode::Write).await.unwrap();
            assert_eq!(member.category(), Category::BufferedWriter);
            assert_eq!(member.name(), Some(Path::new("log.txt")));
            let writer = member.as_buffered_writer().unwrap();
            assert_eq!(writer.write(b"first ").await.unwrap(), 6);
            assert_eq!(writer.write(b"second").await.unwrap(), 6);
            assert_eq!(writer.tell().await.unwrap(), 12);

            let busy = archive.writestr("other.txt", "x").await.unwrap_err();
            assert_eq!(busy.io_kind(), Some(io::ErrorKind::InvalidInput));
            let second = archive.open_member_with("again.txt", MemberMode::Write).await.unwrap_err();
            assert_eq!(second.io_kind(), Some(io::ErrorKind::InvalidInput));
            assert!(archive.close().await.is_err());
            assert!(!archive.is_closed());

            member.close().await.unwrap();
            archive.writestr("other.txt", "x").await.unwrap();
            archive.close().await.unwrap();

            let archive = open_archive(&path, ArchiveMode::Read, CompressionMethod::Stored).await.unwrap();
            assert_eq!(archive.names().await.unwrap(), ["log.txt", "other.txt"]);
            assert_eq!(archive.read("log.txt").await.unwrap(), b"first second");
            assert_eq!(archive.infolist().await.unwrap()[0].compression, CompressionMethod::Bzip2);
            archive.close().await.unwrap();
        });
    }

    #[test]
    fn members_open_for_reading_stream_after_the_archive_closes() {
        let scratch = tempfile::tempdir().unwrap();
        let path = scratch.path().join("large.zip");
        let data: Vec<u8> = (0..200_000_u32).flat_map(u32::to_le_bytes).collect();

        block_on(async {
            let archive = open_archive(&path, ArchiveMode::Write, CompressionMethod::Deflated).await.unwrap();
            archive.writestr("large.bin", data.clone()).await.unwrap();
            archive.close().await.unwrap();

            let archive = open_archive(&path, ArchiveMode::Read, CompressionMethod::Stored).await.unwrap();
            let member = archive.open_member("large.bin").await.unwrap();
            archive.close().await.unwrap();

            let reader = member.as_buffered_reader().unwrap();
            assert_eq!(reader.read(Some(8)).await.unwrap(), data[..8]);
            let tail = reader.seek(SeekFrom::End(-4)).await.unwrap();
            assert_eq!(reader.read(None).await.unwrap(), data[usize::try_from(tail).unwrap()..]);
            let _ = reader.seek(SeekFrom::Start(0)).await.unwrap();
            assert_eq!(reader.read(None).await.unwrap(), data);
            member.close().await.unwrap();
        });
    }

    #[test]
    fn writing_members_into_a_read_archive_fails() {
        let scratch = tempfile::tempdir().unwrap();
        let path = scratch.path().join("readonly.zip");

        block_on(async {
            open_archive(&path, ArchiveMode::Write, CompressionMethod::Stored).await.unwrap().close().await.unwrap();
            let archive = open_archive(&path, ArchiveMode::Read, CompressionMethod::Stored).await.unwrap();
            let error = archive.open_member_with("new.txt", MemberMode::Write).await.unwrap_err();
            assert_eq!(error.io_kind(), Some(io::ErrorKind::Unsupported));
            assert!(archive.names().await.unwrap().is_empty());
            archive.close().await.unwrap();
        });
    }

    #[test]
    fn plain_files_are_not_archives() {
        let scratch = tempfile::tempdir().unwrap();
        let path = scratch.path().join("plain.txt");
        std::fs::write(&path, "not a zip").unwrap();
        assert!(!block_on(is_zip_file(&path)));
        assert!(!block_on(is_zip_file(scratch.path().join("missing.zip"))));
    }
}
