// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Temporary files and directories.
//!
//! Every constructor creates the resource on a worker thread and returns a
//! [`ScopedContext`], so temporary resources compose with the same scoped
//! acquisition as [`open`](crate::open).

use core::ops::Deref;
use core::sync::atomic::{AtomicBool, Ordering};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::{Builder, NamedTempFile, TempDir, TempPath};

use crate::blocking::{BlockingHandle, Buffered, Category, DecodeErrors, Newline, SpooledBuffer, TextConfig, TextStream};
use crate::context::{Facade, ScopedContext};
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::facade::Origin;
use crate::handle_cell::HandleCell;
use crate::mode::Mode;
use crate::open_options::{Buffering, DEFAULT_BUFFER_SIZE, TextSettings, build_handle};
use crate::wrap::{AsyncFile, wrap};

/// Options shared by the temporary resource constructors.
///
/// Defaults to mode `"w+b"`, no prefix or suffix, the system temporary
/// directory, default buffering and the global dispatcher.
#[derive(Clone, Debug)]
pub struct TempOptions {
    mode: String,
    prefix: Option<String>,
    suffix: Option<String>,
    dir: Option<PathBuf>,
    buffering: Buffering,
    text: TextSettings,
    dispatcher: Option<Dispatcher>,
}

impl Default for TempOptions {
    fn default() -> Self {
        Self {
            mode: "w+b".to_owned(),
            prefix: None,
            suffix: None,
            dir: None,
            buffering: Buffering::Default,
            text: TextSettings::default(),
            dispatcher: None,
        }
    }
}

impl TempOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the mode string the file is opened with.
    pub fn mode(&mut self, mode: impl Into<String>) -> &mut Self {
        self.mode = mode.into();
        self
    }

    /// Sets the file or directory name prefix.
    pub fn prefix(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Sets the file or directory name suffix.
    pub fn suffix(&mut self, suffix: impl Into<String>) -> &mut Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Creates the resource in `dir` instead of the system temporary
    /// directory.
    pub fn dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.dir = Some(dir.into());
        self
    }

    /// Sets the buffering policy.
    pub const fn buffering(&mut self, buffering: Buffering) -> &mut Self {
        self.buffering = buffering;
        self
    }

    /// Sets the text encoding of a text mode file.
    pub fn encoding(&mut self, encoding: impl Into<String>) -> &mut Self {
        self.text.encoding = Some(encoding.into());
        self
    }

    /// Sets the decode error policy of a text mode file.
    pub const fn errors(&mut self, errors: DecodeErrors) -> &mut Self {
        self.text.errors = Some(errors);
        self
    }

    /// Sets the newline handling of a text mode file.
    pub const fn newline(&mut self, newline: Newline) -> &mut Self {
        self.text.newline = Some(newline);
        self
    }

    /// Selects the dispatcher used for creation and every later operation.
    pub fn dispatcher(&mut self, dispatcher: Dispatcher) -> &mut Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    fn resolved_dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone().unwrap_or_default()
    }

    fn builder(&self) -> Builder<'_, '_> {
        let mut builder = Builder::new();
        if let Some(prefix) = &self.prefix {
            let _ = builder.prefix(prefix);
        }
        if let Some(suffix) = &self.suffix {
            let _ = builder.suffix(suffix);
        }
        builder
    }

    fn named(&self) -> io::Result<NamedTempFile> {
        match &self.dir {
            Some(dir) => self.builder().tempfile_in(dir),
            None => self.builder().tempfile(),
        }
    }

    /// Parses the mode and text settings. Runs before anything is created,
    /// so a rejected mode leaves nothing behind.
    fn layout(&self) -> io::Result<(Mode, Option<TextConfig>)> {
        let mode = Mode::parse(&self.mode)?;
        let text = self.text.resolve(mode, self.buffering)?;
        Ok((mode, text))
    }
}

/// Creates an anonymous temporary file. It has no name and disappears when
/// closed.
///
/// # Examples
///
/// ```no_run
/// use offload_fs::temp::{TempOptions, temporary_file};
///
/// # async fn example() -> offload_fs::Result<()> {
/// let size = temporary_file(&TempOptions::new())
///     .scope(async |file| -> offload_fs::Result<u64> {
///         let scratch = file.as_buffered_reader()?;
///         let _ = scratch.write(b"scratch").await?;
///         scratch.tell().await
///     })
///     .await?;
/// assert_eq!(size, 7);
/// # Ok(())
/// # }
/// ```
pub fn temporary_file(options: &TempOptions) -> ScopedContext<AsyncFile> {
    let options = options.clone();
    ScopedContext::new(async move {
        let dispatcher = options.resolved_dispatcher();
        let (handle, mode) = dispatcher
            .dispatch(move || {
                let (mode, text) = options.layout()?;
                let file = match &options.dir {
                    Some(dir) => tempfile::tempfile_in(dir)?,
                    None => tempfile::tempfile()?,
                };
                Ok::<_, io::Error>((build_handle(file, mode, options.buffering, text)?, mode))
            })
            .await?;
        let origin = Origin {
            mode: Some(mode),
            ..Origin::default()
        };
        wrap(handle, origin, &dispatcher)
    })
}

/// Creates a temporary file with a visible name.
///
/// With `delete`, the file is removed once the facade is released. With
/// `delete_on_close` as well, an explicit [`close`](AsyncNamedTempFile::close)
/// removes it immediately; without it, the file outlives `close` and is only
/// removed when the scope ends.
pub fn named_temporary_file(options: &TempOptions, delete: bool, delete_on_close: bool) -> ScopedContext<AsyncNamedTempFile> {
    let options = options.clone();
    ScopedContext::new(async move {
        let dispatcher = options.resolved_dispatcher();
        let (handle, mode, path, temp_path) = dispatcher
            .dispatch(move || {
                let (mode, text) = options.layout()?;
                let (file, temp_path) = options.named()?.into_parts();
                let path = temp_path.to_path_buf();
                let temp_path = if delete {
                    Some(temp_path)
                } else {
                    let _ = temp_path.keep().map_err(|error| error.error)?;
                    None
                };
                let handle = build_handle(file, mode, options.buffering, text)?;
                Ok::<_, io::Error>((handle, mode, path, temp_path))
            })
            .await?;

        let origin = Origin {
            name: Some(path.clone()),
            mode: Some(mode),
            ..Origin::default()
        };
        let file = wrap(handle, origin, &dispatcher)?;
        Ok(AsyncNamedTempFile {
            file,
            path,
            delete_on_close,
            temp_path: temp_path.map(|temp_path| HandleCell::new(temp_path, dispatcher, |temp_path| Ok(temp_path.close()?))),
        })
    })
}

/// Creates a temporary file that stays in memory until it grows past
/// `max_size` bytes, then moves to an anonymous file on disk.
///
/// A `max_size` of zero never rolls over on its own. Binary modes wrap the
/// buffer as an [`AsyncBufferedReader`](crate::AsyncBufferedReader), text
/// modes as an [`AsyncTextFile`](crate::AsyncTextFile); either way it can be
/// read and written whatever the mode says.
///
/// # Errors
///
/// The context yields [`io::ErrorKind::InvalidInput`] for a malformed mode or
/// text settings that do not fit it.
pub fn spooled_temporary_file(options: &TempOptions, max_size: u64) -> ScopedContext<AsyncSpooledTempFile> {
    let options = options.clone();
    ScopedContext::new(async move {
        let dispatcher = options.resolved_dispatcher();
        let (handle, mode, rolled_over) = dispatcher
            .dispatch(move || {
                let (mode, text) = options.layout()?;
                let capacity = match options.buffering {
                    Buffering::Fixed(size) if size > 0 => size,
                    _ => DEFAULT_BUFFER_SIZE,
                };
                let buffer = SpooledBuffer::new(max_size, options.dir, capacity);
                let rolled_over = buffer.rolled_over_flag();
                let handle = match text {
                    Some(config) => BlockingHandle::Text(TextStream::new(Buffered::Spooled(buffer), config)),
                    None => BlockingHandle::Spooled(buffer),
                };
                Ok::<_, io::Error>((handle, mode, rolled_over))
            })
            .await?;

        let origin = Origin {
            mode: Some(mode),
            ..Origin::default()
        };
        Ok(AsyncSpooledTempFile {
            file: wrap(handle, origin, &dispatcher)?,
            rolled_over,
        })
    })
}

/// Creates a temporary directory that is removed, with its content, when
/// the facade is released.
pub fn temporary_directory(options: &TempOptions) -> ScopedContext<AsyncTempDir> {
    let options = options.clone();
    ScopedContext::new(async move {
        let dispatcher = options.resolved_dispatcher();
        let dir = dispatcher
            .dispatch(move || match &options.dir {
                Some(parent) => options.builder().tempdir_in(parent),
                None => options.builder().tempdir(),
            })
            .await?;
        let path = dir.path().to_path_buf();
        Ok(AsyncTempDir {
            cell: HandleCell::new(dir, dispatcher, |dir| Ok(dir.close()?)),
            path,
        })
    })
}

/// A named temporary file.
///
/// Dereferences to the [`AsyncFile`] for reading and writing.
#[derive(Debug)]
pub struct AsyncNamedTempFile {
    file: AsyncFile,
    path: PathBuf,
    delete_on_close: bool,
    temp_path: Option<HandleCell<TempPath>>,
}

impl AsyncNamedTempFile {
    /// The path of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file is removed when the facade is released.
    #[must_use]
    pub const fn delete(&self) -> bool {
        self.temp_path.is_some()
    }

    /// Whether [`close`](Self::close) removes the file.
    #[must_use]
    pub const fn delete_on_close(&self) -> bool {
        self.delete_on_close
    }

    /// The wrapped file.
    #[must_use]
    pub const fn file(&self) -> &AsyncFile {
        &self.file
    }

    /// Closes the file, and removes it if it was created with
    /// `delete_on_close`.
    ///
    /// # Errors
    ///
    /// Returns the failure of the final flush or of the removal.
    pub async fn close(&self) -> Result<()> {
        self.file.close().await?;
        if self.delete_on_close {
            self.remove().await?;
        }
        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        match &self.temp_path {
            Some(temp_path) => temp_path.close().await,
            None => Ok(()),
        }
    }
}

impl Deref for AsyncNamedTempFile {
    type Target = AsyncFile;

    fn deref(&self) -> &AsyncFile {
        &self.file
    }
}

impl Facade for AsyncNamedTempFile {
    async fn release(&self) -> Result<()> {
        let closed = self.file.close().await;
        let removed = self.remove().await;
        closed.and(removed)
    }
}

/// A spooled temporary file.
///
/// Dereferences to the [`AsyncFile`] for reading and writing; the facade
/// keeps forwarding to the right backing store after a rollover.
#[derive(Debug)]
pub struct AsyncSpooledTempFile {
    file: AsyncFile,
    rolled_over: Arc<AtomicBool>,
}

impl AsyncSpooledTempFile {
    /// Moves the content to disk now. Does nothing if that already happened.
    ///
    /// # Errors
    ///
    /// Returns the failure of creating or writing the backing file.
    pub async fn rollover(&self) -> Result<()> {
        match &self.file {
            AsyncFile::Text(text) => text.call_buffered("rollover", roll_over).await,
            AsyncFile::BufferedReader(reader) => reader.core().call("rollover", roll_over).await,
            other => Err(Error::CategoryMismatch {
                expected: Category::BufferedReader,
                actual: other.category(),
            }),
        }
    }

    /// Whether the content lives on disk. Reading this never dispatches.
    #[must_use]
    pub fn is_rolled_over(&self) -> bool {
        self.rolled_over.load(Ordering::Acquire)
    }

    /// The wrapped file.
    #[must_use]
    pub const fn file(&self) -> &AsyncFile {
        &self.file
    }
}

fn roll_over(buffer: &mut Buffered) -> Result<()> {
    match buffer {
        Buffered::Spooled(spooled) => Ok(spooled.rollover()?),
        _ => Err(Error::Io(io::Error::new(io::ErrorKind::Unsupported, "not a spooled buffer"))),
    }
}

impl Deref for AsyncSpooledTempFile {
    type Target = AsyncFile;

    fn deref(&self) -> &AsyncFile {
        &self.file
    }
}

impl Facade for AsyncSpooledTempFile {
    fn release(&self) -> impl Future<Output = Result<()>> + Send {
        self.file.close()
    }
}

/// A temporary directory.
#[derive(Debug)]
pub struct AsyncTempDir {
    cell: HandleCell<TempDir>,
    path: PathBuf,
}

impl AsyncTempDir {
    /// The path of the directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the directory and everything in it. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the failure of the removal.
    pub async fn close(&self) -> Result<()> {
        self.cell.close().await
    }

    /// Whether [`close`](Self::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cell.is_closed()
    }
}

impl Facade for AsyncTempDir {
    fn release(&self) -> impl Future<Output = Result<()>> + Send {
        self.close()
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;

    #[test]
    fn spooled_text_files_decode_and_roll_over() {
        let mut options = TempOptions::new();
        let _ = options.mode("w+").newline(Newline::Lf);

        block_on(async {
            let file = spooled_temporary_file(&options, 8).await.unwrap();
            assert_eq!(file.category(), Category::Text);
            let text = file.as_text().unwrap();
            let _ = text.write("héllo\n").await.unwrap();
            assert!(!file.is_rolled_over());
            file.rollover().await.unwrap();
            assert!(file.is_rolled_over());

            let _ = text.seek(io::SeekFrom::Start(0)).await.unwrap();
            assert_eq!(text.readline().await.unwrap(), "héllo\n");
            file.release().await.unwrap();
        });
    }

    #[test]
    fn spooled_rejects_malformed_modes() {
        let mut options = TempOptions::new();
        let _ = options.mode("rw+");
        let error = block_on(async { spooled_temporary_file(&options, 16).await }).unwrap_err();
        assert_eq!(error.io_kind(), Some(io::ErrorKind::InvalidInput));
    }

    #[test]
    fn malformed_modes_leave_no_kept_file_behind() {
        let scratch = tempfile::tempdir().unwrap();
        let mut options = TempOptions::new();
        let _ = options.mode("q").dir(scratch.path());

        let error = block_on(async { named_temporary_file(&options, false, false).await }).unwrap_err();
        assert_eq!(error.io_kind(), Some(io::ErrorKind::InvalidInput));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn prefix_and_suffix_shape_the_name() {
        let scratch = tempfile::tempdir().unwrap();
        let mut options = TempOptions::new();
        let _ = options.prefix("report-").suffix(".csv").dir(scratch.path());

        block_on(async {
            let file = named_temporary_file(&options, true, true).await.unwrap();
            let name = file.path().file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.starts_with("report-") && name.ends_with(".csv"), "{name}");
            assert_eq!(file.path().parent(), Some(scratch.path()));
            assert_eq!(file.name(), Some(file.path()));
            file.release().await.unwrap();
            assert!(!file.path().exists());
        });
    }

    #[test]
    fn kept_named_files_survive_release() {
        let scratch = tempfile::tempdir().unwrap();
        let mut options = TempOptions::new();
        let _ = options.dir(scratch.path());

        block_on(async {
            let file = named_temporary_file(&options, false, true).await.unwrap();
            assert!(!file.delete());
            file.release().await.unwrap();
            assert!(file.path().exists());
        });
    }
}
