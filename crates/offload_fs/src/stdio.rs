// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The standard streams of the process.
//!
//! Each constructor duplicates the standard descriptor on a worker thread
//! and wraps the copy, so closing a facade never closes the process's own
//! stream. The text facades decode UTF-8 with universal newlines and are
//! line buffered on a terminal. The `_bytes` variants are buffered binary
//! facades.
//!
//! # Examples
//!
//! ```no_run
//! # async fn example() -> offload_fs::Result<()> {
//! offload_fs::stdio::stdout()
//!     .scope(async |out| -> offload_fs::Result<()> {
//!         let _ = out.write("hello\n").await?;
//!         out.flush().await
//!     })
//!     .await
//! # }
//! ```

use std::fs::File;
use std::io;
use std::path::PathBuf;

use tracing::{Level, event};

use crate::blocking::TextConfig;
use crate::context::ScopedContext;
use crate::dispatcher::Dispatcher;
use crate::facade::{AsyncBufferedReader, AsyncBufferedWriter, AsyncTextFile, Origin};
use crate::mode::Mode;
use crate::open_options::{Buffering, build_handle};
use crate::wrap::{AsyncFile, wrap};

#[derive(Clone, Copy, Debug)]
enum Stream {
    Input,
    Output,
    Error,
}

impl Stream {
    const fn name(self) -> &'static str {
        match self {
            Self::Input => "<stdin>",
            Self::Output => "<stdout>",
            Self::Error => "<stderr>",
        }
    }

    fn duplicate(self) -> io::Result<File> {
        #[cfg(unix)]
        let owned = {
            use std::os::fd::AsFd;

            match self {
                Self::Input => io::stdin().as_fd().try_clone_to_owned(),
                Self::Output => io::stdout().as_fd().try_clone_to_owned(),
                Self::Error => io::stderr().as_fd().try_clone_to_owned(),
            }?
        };
        #[cfg(windows)]
        let owned = {
            use std::os::windows::io::AsHandle;

            match self {
                Self::Input => io::stdin().as_handle().try_clone_to_owned(),
                Self::Output => io::stdout().as_handle().try_clone_to_owned(),
                Self::Error => io::stderr().as_handle().try_clone_to_owned(),
            }?
        };
        Ok(File::from(owned))
    }
}

fn standard(stream: Stream, mode: &'static str, dispatcher: &Dispatcher) -> ScopedContext<AsyncFile> {
    let dispatcher = dispatcher.clone();
    ScopedContext::new(async move {
        let (handle, mode) = dispatcher
            .dispatch(move || -> io::Result<_> {
                let mode = Mode::parse(mode)?;
                let text = (!mode.is_binary()).then(TextConfig::default);
                let handle = build_handle(stream.duplicate()?, mode, Buffering::Default, text)?;
                Ok((handle, mode))
            })
            .await?;
        event!(Level::DEBUG, message = "wrapped standard stream", stream = stream.name());

        let origin = Origin {
            name: Some(PathBuf::from(stream.name())),
            mode: Some(mode),
            ..Origin::default()
        };
        wrap(handle, origin, &dispatcher)
    })
}

/// Standard input as text.
pub fn stdin() -> ScopedContext<AsyncTextFile> {
    stdin_with(&Dispatcher::global())
}

/// Like [`stdin`], on `dispatcher`.
pub fn stdin_with(dispatcher: &Dispatcher) -> ScopedContext<AsyncTextFile> {
    let file = standard(Stream::Input, "r", dispatcher);
    ScopedContext::new(async move { file.await?.into_text() })
}

/// Standard output as text.
pub fn stdout() -> ScopedContext<AsyncTextFile> {
    stdout_with(&Dispatcher::global())
}

/// Like [`stdout`], on `dispatcher`.
pub fn stdout_with(dispatcher: &Dispatcher) -> ScopedContext<AsyncTextFile> {
    let file = standard(Stream::Output, "w", dispatcher);
    ScopedContext::new(async move { file.await?.into_text() })
}

/// Standard error as text.
pub fn stderr() -> ScopedContext<AsyncTextFile> {
    stderr_with(&Dispatcher::global())
}

/// Like [`stderr`], on `dispatcher`.
pub fn stderr_with(dispatcher: &Dispatcher) -> ScopedContext<AsyncTextFile> {
    let file = standard(Stream::Error, "w", dispatcher);
    ScopedContext::new(async move { file.await?.into_text() })
}

/// Standard input as bytes.
pub fn stdin_bytes() -> ScopedContext<AsyncBufferedReader> {
    stdin_bytes_with(&Dispatcher::global())
}

/// Like [`stdin_bytes`], on `dispatcher`.
pub fn stdin_bytes_with(dispatcher: &Dispatcher) -> ScopedContext<AsyncBufferedReader> {
    let file = standard(Stream::Input, "rb", dispatcher);
    ScopedContext::new(async move { file.await?.into_buffered_reader() })
}

/// Standard output as bytes.
pub fn stdout_bytes() -> ScopedContext<AsyncBufferedWriter> {
    stdout_bytes_with(&Dispatcher::global())
}

/// Like [`stdout_bytes`], on `dispatcher`.
pub fn stdout_bytes_with(dispatcher: &Dispatcher) -> ScopedContext<AsyncBufferedWriter> {
    let file = standard(Stream::Output, "wb", dispatcher);
    ScopedContext::new(async move { file.await?.into_buffered_writer() })
}

/// Standard error as bytes.
pub fn stderr_bytes() -> ScopedContext<AsyncBufferedWriter> {
    stderr_bytes_with(&Dispatcher::global())
}

/// Like [`stderr_bytes`], on `dispatcher`.
pub fn stderr_bytes_with(dispatcher: &Dispatcher) -> ScopedContext<AsyncBufferedWriter> {
    let file = standard(Stream::Error, "wb", dispatcher);
    ScopedContext::new(async move { file.await?.into_buffered_writer() })
}
