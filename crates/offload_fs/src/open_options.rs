// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, IsTerminal, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::blocking::{BlockingHandle, Buffered, BufferedRandom, DecodeErrors, Newline, TextConfig, TextStream, normalize_encoding};
use crate::context::ScopedContext;
use crate::dispatcher::Dispatcher;
use crate::facade::Origin;
use crate::mode::{Access, Mode};
use crate::wrap::{AsyncFile, wrap};

/// The buffer size used when none is requested.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// A custom low-level opener; see [`OpenOptions::opener`].
pub type Opener = Arc<dyn Fn(&Path, &std::fs::OpenOptions) -> io::Result<File> + Send + Sync>;

/// Buffering policy for a newly opened file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Buffering {
    /// A buffer of [`DEFAULT_BUFFER_SIZE`] bytes. Text streams connected to a
    /// terminal are also line buffered.
    #[default]
    Default,
    /// No buffering. Only valid in binary mode; produces a raw facade.
    Unbuffered,
    /// Line buffering. Only meaningful in text mode; binary files get the
    /// default buffer.
    Line,
    /// A buffer of the given size in bytes. Zero means [`Buffering::Unbuffered`].
    Fixed(usize),
}

/// Text layer settings as given by the caller. `None` means "not given".
#[derive(Clone, Debug, Default)]
pub(crate) struct TextSettings {
    pub(crate) encoding: Option<String>,
    pub(crate) errors: Option<DecodeErrors>,
    pub(crate) newline: Option<Newline>,
}

impl TextSettings {
    /// Validates the settings against `mode` and builds the text
    /// configuration, or `None` in binary mode.
    pub(crate) fn resolve(&self, mode: Mode, buffering: Buffering) -> io::Result<Option<TextConfig>> {
        if mode.is_binary() {
            let given = [
                (self.encoding.is_some(), "encoding"),
                (self.errors.is_some(), "errors"),
                (self.newline.is_some(), "newline"),
            ];
            if let Some((_, name)) = given.iter().find(|(set, _)| *set) {
                return Err(invalid_input(format!("binary mode doesn't take a `{name}` argument")));
            }
            return Ok(None);
        }

        if matches!(buffering, Buffering::Unbuffered | Buffering::Fixed(0)) {
            return Err(invalid_input("can't have unbuffered text I/O".to_owned()));
        }
        Ok(Some(TextConfig {
            encoding: self.encoding.as_deref().map_or(Ok("utf-8"), normalize_encoding)?,
            errors: self.errors.unwrap_or_default(),
            newline: self.newline.unwrap_or_default(),
            line_buffering: buffering == Buffering::Line,
        }))
    }
}

fn invalid_input(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, message)
}

/// Layers buffering and, in text mode, decoding over an opened file.
///
/// This must run on a worker thread.
pub(crate) fn build_handle(file: File, mode: Mode, buffering: Buffering, text: Option<TextConfig>) -> io::Result<BlockingHandle> {
    let capacity = match buffering {
        Buffering::Unbuffered | Buffering::Fixed(0) => return Ok(BlockingHandle::Raw(file)),
        Buffering::Default | Buffering::Line => DEFAULT_BUFFER_SIZE,
        Buffering::Fixed(size) => size,
    };

    let is_terminal = file.is_terminal();
    let buffered = match (mode.readable(), mode.writable()) {
        (true, true) => Buffered::Random(BufferedRandom::with_capacity(capacity, file)),
        (true, false) => Buffered::Reader(BufReader::with_capacity(capacity, file)),
        _ => Buffered::Writer(BufWriter::with_capacity(capacity, file)),
    };

    Ok(match text {
        Some(mut config) => {
            config.line_buffering |= buffering == Buffering::Default && is_terminal;
            BlockingHandle::Text(TextStream::new(buffered, config))
        }
        None => buffered.into_handle(),
    })
}

/// Options and flags which can be used to configure how a file is opened.
///
/// The mode string itself (`"r"`, `"w+b"`, ...) is passed to
/// [`OpenOptions::open`]; this builder carries everything else. The free
/// function [`open`](crate::open) is an alias for `OpenOptions::new().open(..)`.
///
/// # Examples
///
/// ```no_run
/// use offload_fs::{Buffering, Newline, OpenOptions};
///
/// # async fn example() -> offload_fs::Result<()> {
/// let file = OpenOptions::new()
///     .newline(Newline::Lf)
///     .buffering(Buffering::Line)
///     .open("log.txt", "a")
///     .await?;
/// let _ = file.as_text()?.write("started\n").await?;
/// file.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct OpenOptions {
    buffering: Buffering,
    text: TextSettings,
    inheritable: bool,
    opener: Option<Opener>,
    dispatcher: Option<Dispatcher>,
}

impl OpenOptions {
    /// Creates a set of options with default values: default buffering,
    /// UTF-8 text with strict decoding and universal newlines, and a
    /// non-inheritable descriptor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the buffering policy.
    pub const fn buffering(&mut self, buffering: Buffering) -> &mut Self {
        self.buffering = buffering;
        self
    }

    /// Sets the text encoding. Only UTF-8 is supported; any other name makes
    /// the open fail with [`io::ErrorKind::InvalidInput`].
    pub fn encoding(&mut self, encoding: impl Into<String>) -> &mut Self {
        self.text.encoding = Some(encoding.into());
        self
    }

    /// Sets the decode error policy.
    pub const fn errors(&mut self, errors: DecodeErrors) -> &mut Self {
        self.text.errors = Some(errors);
        self
    }

    /// Sets the newline handling.
    pub const fn newline(&mut self, newline: Newline) -> &mut Self {
        self.text.newline = Some(newline);
        self
    }

    /// Sets whether child processes inherit the descriptor. Only supported
    /// on unix.
    pub const fn inheritable(&mut self, inheritable: bool) -> &mut Self {
        self.inheritable = inheritable;
        self
    }

    /// Replaces the low-level open call. The opener receives the path and the
    /// standard library options derived from the mode, and runs on a worker
    /// thread.
    pub fn opener<F>(&mut self, opener: F) -> &mut Self
    where
        F: Fn(&Path, &std::fs::OpenOptions) -> io::Result<File> + Send + Sync + 'static,
    {
        self.opener = Some(Arc::new(opener));
        self
    }

    /// Selects the dispatcher used for the open and for every operation on the
    /// resulting file. Defaults to [`Dispatcher::global`].
    pub fn dispatcher(&mut self, dispatcher: Dispatcher) -> &mut Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Opens `path` with the given mode string.
    ///
    /// Nothing happens until the returned context is awaited or entered. The
    /// mode is parsed on the worker thread, so a malformed mode surfaces as an
    /// error at that point.
    ///
    /// # Errors
    ///
    /// The context yields [`io::ErrorKind::InvalidInput`] for malformed modes
    /// or invalid option combinations, and the standard library's open error
    /// otherwise.
    pub fn open(&self, path: impl AsRef<Path>, mode: &str) -> ScopedContext<AsyncFile> {
        let path = path.as_ref().to_path_buf();
        let mode = mode.to_owned();
        let options = self.clone();
        ScopedContext::new(async move { options.open_now(path, mode).await })
    }

    async fn open_now(self, path: PathBuf, mode: String) -> crate::Result<AsyncFile> {
        let dispatcher = self.dispatcher.clone().unwrap_or_default();
        let name = path.clone();
        let (handle, mode) = dispatcher
            .dispatch(move || -> io::Result<(BlockingHandle, Mode)> {
                let mode = Mode::parse(&mode)?;
                let text = self.text.resolve(mode, self.buffering)?;
                let file = self.open_file(&path, mode)?;
                Ok((build_handle(file, mode, self.buffering, text)?, mode))
            })
            .await?;

        let origin = Origin {
            name: Some(name),
            mode: Some(mode),
            ..Origin::default()
        };
        wrap(handle, origin, &dispatcher)
    }

    fn open_file(&self, path: &Path, mode: Mode) -> io::Result<File> {
        let options = mode.std_options();
        let mut file = match &self.opener {
            Some(opener) => opener(path, &options)?,
            None => options.open(path)?,
        };
        if self.inheritable {
            set_inheritable(&file)?;
        }
        if mode.access() == Access::Append {
            let _ = file.seek(SeekFrom::End(0))?;
        }
        Ok(file)
    }
}

impl fmt::Debug for OpenOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenOptions")
            .field("buffering", &self.buffering)
            .field("encoding", &self.text.encoding)
            .field("errors", &self.text.errors)
            .field("newline", &self.text.newline)
            .field("inheritable", &self.inheritable)
            .field("opener", &self.opener.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(unix)]
fn set_inheritable(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    // SAFETY: `fd` is owned by `file`, which outlives this call.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: as above.
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_inheritable(_file: &File) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "inheritable descriptors are only supported on unix"))
}
