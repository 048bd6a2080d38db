// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Asynchronous file, directory and path operations on top of blocking I/O.
//!
//! Every blocking call (open, read, write, seek, close, stat, rename, ...) is
//! offloaded to a pool of worker threads, so async tasks never block on the
//! filesystem. The crate adds no I/O semantics of its own: results and errors
//! are exactly those of the blocking primitives, delivered at an `.await`.
//!
//! # Quick start
//!
//! ```no_run
//! # async fn example() -> offload_fs::Result<()> {
//! // Await the context to get the file; closing it is then up to you.
//! let file = offload_fs::open("notes.txt", "w").await?;
//! let _ = file.as_text()?.write("first line\n").await?;
//! file.close().await?;
//!
//! // Or use it as a scope, which closes the file exactly once, even when the
//! // body fails.
//! let lines = offload_fs::open("notes.txt", "r")
//!     .scope(async |file| -> offload_fs::Result<Vec<String>> { file.as_text()?.readlines().await })
//!     .await?;
//! assert_eq!(lines, ["first line\n"]);
//! # Ok(())
//! # }
//! ```
//!
//! # Facades
//!
//! A blocking stream is wrapped in one of four facades, chosen by what the
//! stream can do:
//!
//! | Facade | Wraps | Obtained for modes |
//! |--------|-------|--------------------|
//! | [`AsyncTextFile`]       | decoded text stream | any text mode (`"r"`, `"w+"`, ...) |
//! | [`AsyncBufferedWriter`] | buffered binary writer | `"wb"`, `"ab"`, `"xb"` |
//! | [`AsyncBufferedReader`] | buffered binary reader, read-write file, or archive member | `"rb"`, `"r+b"`, `"w+b"`, ... |
//! | [`AsyncRawFile`]        | unbuffered binary file | any binary mode with [`Buffering::Unbuffered`] |
//!
//! Constructors that pick the facade at run time return [`AsyncFile`], a union
//! of the four with `as_*` and `into_*` accessors. [`classify_and_wrap`] wraps
//! a [`BlockingHandle`] built elsewhere.
//!
//! Operations on one facade run one at a time, in the order they were
//! issued. Operations on different facades run concurrently, up to the size
//! of the worker pool.
//!
//! # Lifecycle
//!
//! Every constructor returns a [`ScopedContext`]. Nothing is submitted to the
//! worker pool until it is awaited or entered. Dropping it before then opens
//! nothing and closes nothing. Dropping an open facade releases the handle
//! in the background; [`drain`] waits for such work to finish.
//!
//! # Modules
//!
//! * [`os`]: rename, remove, mkdir, links, listing and other filesystem calls.
//! * [`path`]: existence checks, sizes, timestamps, identity and `abspath`.
//! * [`stdio`]: the standard streams as text or byte facades.
//! * [`temp`]: temporary files (anonymous, named, spooled) and directories.
//! * [`archive`]: zip archives, including scoped access to single members.
//! * [`read_dir`]: a directory cursor.
//!
//! # Worker pool
//!
//! All operations use [`Dispatcher::global`] unless told otherwise; the
//! `_with` variants of the free functions take a dispatcher explicitly. A
//! [`Dispatcher`] can wrap any [`WorkerPool`]; [`ThreadPool`] is the default
//! implementation, configured through [`ThreadPoolConfig`].

use std::path::Path;
use std::time::Duration;

pub use crate::blocking::{
    BlockingHandle, BufferedRandom, Category, DecodeErrors, MemberReader, Newline, SpooledBuffer, TextStream,
};
pub use crate::context::{Facade, Phase, ScopedContext};
pub use crate::dir_entry::DirEntry;
pub use crate::dispatcher::{DispatchFuture, Dispatcher};
pub use crate::error::{Error, Result};
pub use crate::facade::{AsyncBufferedReader, AsyncBufferedWriter, AsyncRawFile, AsyncTextFile};
pub use crate::mode::{Access, Mode};
pub use crate::open_options::{Buffering, DEFAULT_BUFFER_SIZE, OpenOptions, Opener};
pub use crate::pool::{Job, ThreadPool, ThreadPoolConfig, WorkerPool};
pub use crate::read_dir::ReadDir;
pub use crate::wrap::{AsyncFile, classify_and_wrap};

pub mod archive;
mod blocking;
mod context;
mod dir_entry;
mod dispatcher;
mod error;
mod facade;
mod handle_cell;
mod lines;
mod mode;
mod open_options;
pub mod os;
pub mod path;
mod pool;
pub mod read_dir;
pub mod stdio;
pub mod temp;
mod wrap;

/// Opens `path` with a mode string and default options.
///
/// Shorthand for `OpenOptions::new().open(path, mode)`; see
/// [`OpenOptions::open`].
pub fn open(path: impl AsRef<Path>, mode: &str) -> ScopedContext<AsyncFile> {
    OpenOptions::new().open(path, mode)
}

/// Waits until the global worker pool has no pending work, including
/// background releases of dropped facades.
///
/// This blocks the calling thread; call it from outside the async runtime,
/// for example before the process exits. Returns `false` if `timeout`
/// elapsed first.
#[must_use]
pub fn drain(timeout: Duration) -> bool {
    Dispatcher::global().drain(timeout)
}
