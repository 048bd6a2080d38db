// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Path queries.
//!
//! Predicates (`exists`, `is_file`, ...) report `false` on any failure.
//! Everything else returns the standard library's error unchanged. The
//! `_with` variants take the [`Dispatcher`] to run on.

#[cfg(unix)]
use std::fs::Metadata;
use std::io::Result;
#[cfg(unix)]
use std::os::unix::io::RawFd;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use crate::dispatcher::{DispatchFuture, Dispatcher};

fn query<T: Send + 'static>(path: &Path, dispatcher: &Dispatcher, f: fn(&Path) -> T) -> DispatchFuture<T> {
    let path = path.to_path_buf();
    dispatcher.dispatch(move || f(&path))
}

/// Whether `path` exists, following symlinks.
pub async fn exists(path: impl AsRef<Path>) -> bool {
    exists_with(path, &Dispatcher::global()).await
}

/// Like [`exists`], on `dispatcher`.
pub async fn exists_with(path: impl AsRef<Path>, dispatcher: &Dispatcher) -> bool {
    query(path.as_ref(), dispatcher, |path| path.try_exists().unwrap_or(false)).await
}

/// Whether `path` is a regular file, following symlinks.
pub async fn is_file(path: impl AsRef<Path>) -> bool {
    is_file_with(path, &Dispatcher::global()).await
}

/// Like [`is_file`], on `dispatcher`.
pub async fn is_file_with(path: impl AsRef<Path>, dispatcher: &Dispatcher) -> bool {
    query(path.as_ref(), dispatcher, Path::is_file).await
}

/// Whether `path` is a directory, following symlinks.
pub async fn is_dir(path: impl AsRef<Path>) -> bool {
    is_dir_with(path, &Dispatcher::global()).await
}

/// Like [`is_dir`], on `dispatcher`.
pub async fn is_dir_with(path: impl AsRef<Path>, dispatcher: &Dispatcher) -> bool {
    query(path.as_ref(), dispatcher, Path::is_dir).await
}

/// Whether `path` is a symbolic link.
pub async fn is_symlink(path: impl AsRef<Path>) -> bool {
    is_symlink_with(path, &Dispatcher::global()).await
}

/// Like [`is_symlink`], on `dispatcher`.
pub async fn is_symlink_with(path: impl AsRef<Path>, dispatcher: &Dispatcher) -> bool {
    query(path.as_ref(), dispatcher, Path::is_symlink).await
}

/// The size of the file at `path` in bytes.
///
/// # Errors
///
/// Returns the error of [`std::fs::metadata`].
pub async fn size(path: impl AsRef<Path>) -> Result<u64> {
    size_with(path, &Dispatcher::global()).await
}

/// Like [`size`], on `dispatcher`.
///
/// # Errors
///
/// Returns the error of [`std::fs::metadata`].
pub async fn size_with(path: impl AsRef<Path>, dispatcher: &Dispatcher) -> Result<u64> {
    query(path.as_ref(), dispatcher, |path| std::fs::metadata(path).map(|metadata| metadata.len())).await
}

/// The last access time of `path`.
///
/// # Errors
///
/// Returns the error of [`std::fs::metadata`], or
/// [`ErrorKind::Unsupported`](std::io::ErrorKind::Unsupported) where the
/// platform does not record it.
pub async fn accessed(path: impl AsRef<Path>) -> Result<SystemTime> {
    accessed_with(path, &Dispatcher::global()).await
}

/// Like [`accessed`], on `dispatcher`.
///
/// # Errors
///
/// See [`accessed`].
pub async fn accessed_with(path: impl AsRef<Path>, dispatcher: &Dispatcher) -> Result<SystemTime> {
    query(path.as_ref(), dispatcher, |path| std::fs::metadata(path)?.accessed()).await
}

/// The last modification time of `path`.
///
/// # Errors
///
/// See [`accessed`].
pub async fn modified(path: impl AsRef<Path>) -> Result<SystemTime> {
    modified_with(path, &Dispatcher::global()).await
}

/// Like [`modified`], on `dispatcher`.
///
/// # Errors
///
/// See [`accessed`].
pub async fn modified_with(path: impl AsRef<Path>, dispatcher: &Dispatcher) -> Result<SystemTime> {
    query(path.as_ref(), dispatcher, |path| std::fs::metadata(path)?.modified()).await
}

/// The creation time of `path`.
///
/// # Errors
///
/// See [`accessed`].
pub async fn created(path: impl AsRef<Path>) -> Result<SystemTime> {
    created_with(path, &Dispatcher::global()).await
}

/// Like [`created`], on `dispatcher`.
///
/// # Errors
///
/// See [`accessed`].
pub async fn created_with(path: impl AsRef<Path>, dispatcher: &Dispatcher) -> Result<SystemTime> {
    query(path.as_ref(), dispatcher, |path| std::fs::metadata(path)?.created()).await
}

/// Makes `path` absolute by joining it to the current working directory,
/// then removes `.` components and resolves `..` lexically. Symlinks are not
/// followed and the path need not exist.
///
/// # Errors
///
/// Returns the error of [`std::env::current_dir`] for a relative path.
pub async fn abspath(path: impl AsRef<Path>) -> Result<PathBuf> {
    abspath_with(path, &Dispatcher::global()).await
}

/// Like [`abspath`], on `dispatcher`.
///
/// # Errors
///
/// See [`abspath`].
pub async fn abspath_with(path: impl AsRef<Path>, dispatcher: &Dispatcher) -> Result<PathBuf> {
    let path = path.as_ref().to_path_buf();
    if path.is_absolute() {
        return Ok(normalize(&path));
    }
    let cwd = dispatcher.dispatch(std::env::current_dir).await?;
    Ok(normalize(&cwd.join(path)))
}

/// Collapses `.` and `..` without touching the filesystem. `..` never
/// climbs above the root.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => normalized.push(component),
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(normalized.components().next_back(), Some(Component::Normal(_))) {
                    let _ = normalized.pop();
                }
            }
        }
    }
    normalized
}

/// Whether two paths refer to the same file.
///
/// # Errors
///
/// Returns the error of querying either path.
pub async fn same_file(first: impl AsRef<Path>, second: impl AsRef<Path>) -> Result<bool> {
    same_file_with(first, second, &Dispatcher::global()).await
}

/// Like [`same_file`], on `dispatcher`.
///
/// # Errors
///
/// Returns the error of querying either path.
pub async fn same_file_with(first: impl AsRef<Path>, second: impl AsRef<Path>, dispatcher: &Dispatcher) -> Result<bool> {
    let first = first.as_ref().to_path_buf();
    let second = second.as_ref().to_path_buf();
    dispatcher
        .dispatch(move || -> Result<bool> {
            #[cfg(unix)]
            {
                Ok(same_identity(&std::fs::metadata(first)?, &std::fs::metadata(second)?))
            }
            #[cfg(not(unix))]
            {
                Ok(std::fs::canonicalize(first)? == std::fs::canonicalize(second)?)
            }
        })
        .await
}

#[cfg(unix)]
fn same_identity(first: &Metadata, second: &Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;

    first.dev() == second.dev() && first.ino() == second.ino()
}

/// Whether two open descriptors refer to the same file.
///
/// # Errors
///
/// Returns the error of `fstat` on either descriptor.
#[cfg(unix)]
pub async fn same_open_file(first: RawFd, second: RawFd) -> Result<bool> {
    same_open_file_with(first, second, &Dispatcher::global()).await
}

/// Like [`same_open_file`], on `dispatcher`.
///
/// # Errors
///
/// Returns the error of `fstat` on either descriptor.
#[cfg(unix)]
pub async fn same_open_file_with(first: RawFd, second: RawFd, dispatcher: &Dispatcher) -> Result<bool> {
    dispatcher
        .dispatch(move || -> Result<bool> {
            let first = fstat(first)?;
            let second = fstat(second)?;
            Ok(first.st_dev == second.st_dev && first.st_ino == second.st_ino)
        })
        .await
}

#[cfg(unix)]
fn fstat(fd: RawFd) -> Result<libc::stat> {
    let mut stat = core::mem::MaybeUninit::<libc::stat>::uninit();
    // SAFETY: `stat` is valid for writes of one `libc::stat`. An invalid
    // descriptor makes the call fail with EBADF.
    if unsafe { libc::fstat(fd, stat.as_mut_ptr()) } != 0 {
        return Err(std::io::Error::last_os_error());
    }
    // SAFETY: fstat succeeded and initialized `stat`.
    Ok(unsafe { stat.assume_init() })
}

/// Whether `path` is a mount point: a directory on a different device than
/// its parent, or the filesystem root. Symlinks are never mount points.
pub async fn is_mount(path: impl AsRef<Path>) -> bool {
    is_mount_with(path, &Dispatcher::global()).await
}

/// Like [`is_mount`], on `dispatcher`.
pub async fn is_mount_with(path: impl AsRef<Path>, dispatcher: &Dispatcher) -> bool {
    query(path.as_ref(), dispatcher, |path| check_mount(path).unwrap_or(false)).await
}

#[cfg(unix)]
fn check_mount(path: &Path) -> Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let metadata = std::fs::symlink_metadata(path)?;
    if metadata.file_type().is_symlink() {
        return Ok(false);
    }
    let parent = std::fs::symlink_metadata(path.join(".."))?;
    Ok(metadata.dev() != parent.dev() || metadata.ino() == parent.ino())
}

#[cfg(not(unix))]
fn check_mount(path: &Path) -> Result<bool> {
    let path = std::fs::canonicalize(path)?;
    Ok(path.parent().is_none())
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;

    use futures::executor::block_on;

    use super::*;

    #[test]
    fn predicates_report_false_on_missing_paths() {
        let scratch = tempfile::tempdir().unwrap();
        let missing = scratch.path().join("missing");
        block_on(async {
            assert!(!exists(&missing).await);
            assert!(!is_file(&missing).await);
            assert!(!is_dir(&missing).await);
            assert!(!is_symlink(&missing).await);
            assert!(!is_mount(&missing).await);
            assert_eq!(size(&missing).await.unwrap_err().kind(), ErrorKind::NotFound);
        });
    }

    #[test]
    fn file_facts() {
        let scratch = tempfile::tempdir().unwrap();
        let file = scratch.path().join("ten.bin");
        std::fs::write(&file, b"0123456789").unwrap();
        block_on(async {
            assert!(exists(&file).await);
            assert!(is_file(&file).await);
            assert!(is_dir(scratch.path()).await);
            assert_eq!(size(&file).await.unwrap(), 10);
            assert!(modified(&file).await.unwrap() <= SystemTime::now());
            assert!(same_file(&file, scratch.path().join(".").join("ten.bin")).await.unwrap());
            assert!(!same_file(&file, scratch.path()).await.unwrap());
        });
    }

    #[test]
    fn abspath_collapses_dots_lexically() {
        let cwd = std::env::current_dir().unwrap();
        block_on(async {
            assert_eq!(abspath("a/./b/../c").await.unwrap(), cwd.join("a/c"));
            assert_eq!(abspath(".").await.unwrap(), cwd);
        });
    }

    #[cfg(unix)]
    #[test]
    fn abspath_never_climbs_above_the_root() {
        block_on(async {
            assert_eq!(abspath("/../x/../../y/.").await.unwrap(), Path::new("/y"));
            assert_eq!(abspath("/a/missing/..").await.unwrap(), Path::new("/a"));
        });
    }

    #[cfg(unix)]
    #[test]
    fn root_is_a_mount_point() {
        assert!(block_on(is_mount("/")));
    }

    #[cfg(unix)]
    #[test]
    fn open_descriptors_compare_by_identity() {
        use std::os::unix::io::AsRawFd;

        let scratch = tempfile::tempdir().unwrap();
        let path = scratch.path().join("shared");
        std::fs::write(&path, "x").unwrap();
        let first = std::fs::File::open(&path).unwrap();
        let second = std::fs::File::open(&path).unwrap();
        let other = tempfile::tempfile().unwrap();

        block_on(async {
            assert!(same_open_file(first.as_raw_fd(), second.as_raw_fd()).await.unwrap());
            assert!(!same_open_file(first.as_raw_fd(), other.as_raw_fd()).await.unwrap());
        });
    }
}
