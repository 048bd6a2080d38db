// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::path::{Path, PathBuf};

use futures::Stream;

use crate::context::{Facade, ScopedContext};
use crate::dir_entry::DirEntry;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::handle_cell::HandleCell;

/// Opens a cursor over the entries of the directory at `path`.
///
/// # Examples
///
/// ```no_run
/// use futures::TryStreamExt;
///
/// # async fn example() -> offload_fs::Result<()> {
/// let names = offload_fs::read_dir::scandir(".")
///     .scope(async |dir| -> offload_fs::Result<Vec<_>> {
///         dir.entries().map_ok(|entry| entry.file_name().to_owned()).try_collect().await
///     })
///     .await?;
/// # let _ = names;
/// # Ok(())
/// # }
/// ```
pub fn scandir(path: impl AsRef<Path>) -> ScopedContext<ReadDir> {
    scandir_with(path, Dispatcher::global())
}

/// Like [`scandir`], dispatching through `dispatcher`.
pub fn scandir_with(path: impl AsRef<Path>, dispatcher: Dispatcher) -> ScopedContext<ReadDir> {
    let path = path.as_ref().to_path_buf();
    ScopedContext::new(async move {
        let target = path.clone();
        let read_dir = dispatcher.dispatch(move || std::fs::read_dir(target)).await?;
        Ok(ReadDir::new(read_dir, path, dispatcher))
    })
}

/// An asynchronous cursor over the entries in a directory.
///
/// The entries are fetched lazily from the underlying filesystem on each call to
/// [`next_entry`](ReadDir::next_entry), dispatching to a worker thread. The
/// special entries `.` and `..` are never yielded.
#[derive(Debug)]
pub struct ReadDir {
    cell: HandleCell<std::fs::ReadDir>,
    path: PathBuf,
}

impl ReadDir {
    pub(crate) fn new(read_dir: std::fs::ReadDir, path: PathBuf, dispatcher: Dispatcher) -> Self {
        Self {
            cell: HandleCell::new(read_dir, dispatcher, |read_dir| {
                drop(read_dir);
                Ok(())
            }),
            path,
        }
    }

    /// Returns the next entry in the directory stream.
    ///
    /// Returns `Ok(None)` when there are no more entries.
    ///
    /// # Errors
    ///
    /// May return an I/O error if there was a problem reading a particular
    /// entry, or a state error once the cursor is closed.
    pub async fn next_entry(&self) -> Result<Option<DirEntry>> {
        self.cell
            .call("next_entry", |read_dir| match read_dir.next() {
                Some(Ok(entry)) => Ok(Some(DirEntry::from_std(&entry))),
                Some(Err(e)) => Err(e.into()),
                None => Ok(None),
            })
            .await
    }

    /// Streams the remaining entries. Each entry is one dispatched
    /// [`next_entry`](Self::next_entry).
    pub fn entries(&self) -> impl Stream<Item = Result<DirEntry>> + Send + '_ {
        crate::lines::line_stream(move || self.next_entry())
    }

    /// Releases the cursor. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Never fails for a cursor that was not detached.
    pub async fn close(&self) -> Result<()> {
        self.cell.close().await
    }

    /// Whether [`close`](Self::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cell.is_closed()
    }

    /// The directory being scanned.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Facade for ReadDir {
    fn release(&self) -> impl Future<Output = Result<()>> + Send {
        self.close()
    }
}
