// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Filesystem operations.
//!
//! Each function performs exactly one blocking call on the global
//! dispatcher and returns the standard library's result unchanged, so error
//! kinds such as [`ErrorKind::NotFound`](std::io::ErrorKind::NotFound) surface
//! as they would from [`std::fs`]. The `_with` variants take the
//! [`Dispatcher`] to run on.

use core::ops::BitOr;
use std::ffi::OsString;
use std::fs::Metadata;
use std::io::Result;
#[cfg(any(target_os = "linux", target_os = "android"))]
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

use crate::dispatcher::Dispatcher;
pub use crate::read_dir::{scandir, scandir_with};

/// Queries metadata, following symlinks.
///
/// # Errors
///
/// Returns the error of [`std::fs::metadata`].
pub async fn stat(path: impl AsRef<Path>) -> Result<Metadata> {
    stat_with(path, &Dispatcher::global()).await
}

/// Like [`stat`], on `dispatcher`.
///
/// # Errors
///
/// Returns the error of [`std::fs::metadata`].
pub async fn stat_with(path: impl AsRef<Path>, dispatcher: &Dispatcher) -> Result<Metadata> {
    let path = path.as_ref().to_path_buf();
    dispatcher.dispatch(move || std::fs::metadata(path)).await
}

/// Queries metadata without following symlinks.
///
/// # Errors
///
/// Returns the error of [`std::fs::symlink_metadata`].
pub async fn lstat(path: impl AsRef<Path>) -> Result<Metadata> {
    lstat_with(path, &Dispatcher::global()).await
}

/// Like [`lstat`], on `dispatcher`.
///
/// # Errors
///
/// Returns the error of [`std::fs::symlink_metadata`].
pub async fn lstat_with(path: impl AsRef<Path>, dispatcher: &Dispatcher) -> Result<Metadata> {
    let path = path.as_ref().to_path_buf();
    dispatcher.dispatch(move || std::fs::symlink_metadata(path)).await
}

/// Renames `from` to `to`.
///
/// # Errors
///
/// Returns the error of [`std::fs::rename`].
pub async fn rename(from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
    rename_with(from, to, &Dispatcher::global()).await
}

/// Like [`rename`], on `dispatcher`.
///
/// # Errors
///
/// Returns the error of [`std::fs::rename`].
pub async fn rename_with(from: impl AsRef<Path>, to: impl AsRef<Path>, dispatcher: &Dispatcher) -> Result<()> {
    let from = from.as_ref().to_path_buf();
    let to = to.as_ref().to_path_buf();
    dispatcher.dispatch(move || std::fs::rename(from, to)).await
}

/// Renames `from` to `to`, replacing `to` if it exists.
///
/// # Errors
///
/// Returns the error of [`std::fs::rename`].
pub async fn replace(from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
    rename(from, to).await
}

/// Like [`replace`], on `dispatcher`.
///
/// # Errors
///
/// Returns the error of [`std::fs::rename`].
pub async fn replace_with(from: impl AsRef<Path>, to: impl AsRef<Path>, dispatcher: &Dispatcher) -> Result<()> {
    rename_with(from, to, dispatcher).await
}

/// Renames `from` to `to`, creating the missing parents of `to` first and
/// pruning the parents of `from` that the move leaves empty.
///
/// # Errors
///
/// Returns the error of creating the parents of `to` or of the rename.
/// Failing to prune a parent of `from` is not an error.
pub async fn renames(from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
    renames_with(from, to, &Dispatcher::global()).await
}

/// Like [`renames`], on `dispatcher`.
///
/// # Errors
///
/// See [`renames`].
pub async fn renames_with(from: impl AsRef<Path>, to: impl AsRef<Path>, dispatcher: &Dispatcher) -> Result<()> {
    let from = from.as_ref().to_path_buf();
    let to = to.as_ref().to_path_buf();
    dispatcher
        .dispatch(move || -> Result<()> {
            if let Some(parent) = non_empty_parent(&to)
                && !parent.exists()
            {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::rename(&from, &to)?;
            if from.file_name().is_some()
                && let Some(parent) = non_empty_parent(&from)
            {
                let _ = prune_empty(parent);
            }
            Ok(())
        })
        .await
}

fn non_empty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|parent| !parent.as_os_str().is_empty())
}

/// Removes `dir`, then each parent that becomes empty.
fn prune_empty(dir: &Path) -> Result<()> {
    std::fs::remove_dir(dir)?;
    let mut parent = non_empty_parent(dir);
    while let Some(dir) = parent {
        if std::fs::remove_dir(dir).is_err() {
            break;
        }
        parent = non_empty_parent(dir);
    }
    Ok(())
}

/// Removes a file.
///
/// # Errors
///
/// Returns the error of [`std::fs::remove_file`].
pub async fn remove(path: impl AsRef<Path>) -> Result<()> {
    remove_with(path, &Dispatcher::global()).await
}

/// Like [`remove`], on `dispatcher`.
///
/// # Errors
///
/// Returns the error of [`std::fs::remove_file`].
pub async fn remove_with(path: impl AsRef<Path>, dispatcher: &Dispatcher) -> Result<()> {
    let path = path.as_ref().to_path_buf();
    dispatcher.dispatch(move || std::fs::remove_file(path)).await
}

/// Removes a file. Same as [`remove`].
///
/// # Errors
///
/// Returns the error of [`std::fs::remove_file`].
pub async fn unlink(path: impl AsRef<Path>) -> Result<()> {
    remove(path).await
}

/// Like [`unlink`], on `dispatcher`.
///
/// # Errors
///
/// Returns the error of [`std::fs::remove_file`].
pub async fn unlink_with(path: impl AsRef<Path>, dispatcher: &Dispatcher) -> Result<()> {
    remove_with(path, dispatcher).await
}

/// Creates a directory. The parent must exist.
///
/// # Errors
///
/// Returns the error of [`std::fs::create_dir`].
pub async fn mkdir(path: impl AsRef<Path>) -> Result<()> {
    mkdir_with(path, &Dispatcher::global()).await
}

/// Like [`mkdir`], on `dispatcher`.
///
/// # Errors
///
/// Returns the error of [`std::fs::create_dir`].
pub async fn mkdir_with(path: impl AsRef<Path>, dispatcher: &Dispatcher) -> Result<()> {
    let path = path.as_ref().to_path_buf();
    dispatcher.dispatch(move || std::fs::create_dir(path)).await
}

/// Creates a directory and any missing parents.
///
/// Without `exist_ok`, fails with
/// [`ErrorKind::AlreadyExists`](std::io::ErrorKind::AlreadyExists) when the
/// leaf directory already exists.
///
/// # Errors
///
/// Returns the error of the failing directory creation.
pub async fn makedirs(path: impl AsRef<Path>, exist_ok: bool) -> Result<()> {
    makedirs_with(path, exist_ok, &Dispatcher::global()).await
}

/// Like [`makedirs`], on `dispatcher`.
///
/// # Errors
///
/// Returns the error of the failing directory creation.
pub async fn makedirs_with(path: impl AsRef<Path>, exist_ok: bool, dispatcher: &Dispatcher) -> Result<()> {
    let path = path.as_ref().to_path_buf();
    dispatcher
        .dispatch(move || -> Result<()> {
            if exist_ok {
                return std::fs::create_dir_all(path);
            }
            if let Some(parent) = non_empty_parent(&path) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::create_dir(path)
        })
        .await
}

/// Removes an empty directory.
///
/// # Errors
///
/// Returns the error of [`std::fs::remove_dir`].
pub async fn rmdir(path: impl AsRef<Path>) -> Result<()> {
    rmdir_with(path, &Dispatcher::global()).await
}

/// Like [`rmdir`], on `dispatcher`.
///
/// # Errors
///
/// Returns the error of [`std::fs::remove_dir`].
pub async fn rmdir_with(path: impl AsRef<Path>, dispatcher: &Dispatcher) -> Result<()> {
    let path = path.as_ref().to_path_buf();
    dispatcher.dispatch(move || std::fs::remove_dir(path)).await
}

/// Removes an empty directory, then each parent that becomes empty, stopping
/// silently at the first parent that cannot be removed.
///
/// # Errors
///
/// Returns the error of removing the leaf directory.
pub async fn removedirs(path: impl AsRef<Path>) -> Result<()> {
    removedirs_with(path, &Dispatcher::global()).await
}

/// Like [`removedirs`], on `dispatcher`.
///
/// # Errors
///
/// Returns the error of removing the leaf directory.
pub async fn removedirs_with(path: impl AsRef<Path>, dispatcher: &Dispatcher) -> Result<()> {
    let path = path.as_ref().to_path_buf();
    dispatcher.dispatch(move || prune_empty(&path)).await
}

/// Creates a hard link `link` pointing at `original`.
///
/// # Errors
///
/// Returns the error of [`std::fs::hard_link`].
pub async fn link(original: impl AsRef<Path>, link: impl AsRef<Path>) -> Result<()> {
    link_with(original, link, &Dispatcher::global()).await
}

/// Like [`link`], on `dispatcher`.
///
/// # Errors
///
/// Returns the error of [`std::fs::hard_link`].
pub async fn link_with(original: impl AsRef<Path>, link: impl AsRef<Path>, dispatcher: &Dispatcher) -> Result<()> {
    let original = original.as_ref().to_path_buf();
    let link = link.as_ref().to_path_buf();
    dispatcher.dispatch(move || std::fs::hard_link(original, link)).await
}

/// Creates a symbolic link `link` pointing at `original`.
///
/// # Errors
///
/// Returns the error of the platform's symlink call.
pub async fn symlink(original: impl AsRef<Path>, link: impl AsRef<Path>) -> Result<()> {
    symlink_with(original, link, &Dispatcher::global()).await
}

/// Like [`symlink`], on `dispatcher`.
///
/// # Errors
///
/// Returns the error of the platform's symlink call.
pub async fn symlink_with(original: impl AsRef<Path>, link: impl AsRef<Path>, dispatcher: &Dispatcher) -> Result<()> {
    let original = original.as_ref().to_path_buf();
    let link = link.as_ref().to_path_buf();
    dispatcher
        .dispatch(move || {
            #[cfg(unix)]
            {
                std::os::unix::fs::symlink(&original, &link)
            }
            #[cfg(windows)]
            {
                // Dangling targets get a file symlink.
                if std::fs::metadata(&original).is_ok_and(|m| m.is_dir()) {
                    std::os::windows::fs::symlink_dir(&original, &link)
                } else {
                    std::os::windows::fs::symlink_file(&original, &link)
                }
            }
        })
        .await
}

/// Returns the target of a symbolic link.
///
/// # Errors
///
/// Returns the error of [`std::fs::read_link`].
pub async fn readlink(path: impl AsRef<Path>) -> Result<PathBuf> {
    readlink_with(path, &Dispatcher::global()).await
}

/// Like [`readlink`], on `dispatcher`.
///
/// # Errors
///
/// Returns the error of [`std::fs::read_link`].
pub async fn readlink_with(path: impl AsRef<Path>, dispatcher: &Dispatcher) -> Result<PathBuf> {
    let path = path.as_ref().to_path_buf();
    dispatcher.dispatch(move || std::fs::read_link(path)).await
}

/// Lists the names of the entries in a directory, in no particular order.
///
/// # Errors
///
/// Returns the error of [`std::fs::read_dir`] or of reading an entry.
pub async fn listdir(path: impl AsRef<Path>) -> Result<Vec<OsString>> {
    listdir_with(path, &Dispatcher::global()).await
}

/// Like [`listdir`], on `dispatcher`.
///
/// # Errors
///
/// Returns the error of [`std::fs::read_dir`] or of reading an entry.
pub async fn listdir_with(path: impl AsRef<Path>, dispatcher: &Dispatcher) -> Result<Vec<OsString>> {
    let path = path.as_ref().to_path_buf();
    dispatcher
        .dispatch(move || -> Result<Vec<OsString>> {
            std::fs::read_dir(path)?
                .map(|entry| entry.map(|entry| entry.file_name()))
                .collect()
        })
        .await
}

/// The permissions checked by [`access`]. Combine with `|`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct AccessMode {
    read: bool,
    write: bool,
    execute: bool,
}

impl AccessMode {
    /// Only checks that the path exists.
    pub const EXISTS: Self = Self {
        read: false,
        write: false,
        execute: false,
    };
    /// Checks read permission.
    pub const READ: Self = Self {
        read: true,
        write: false,
        execute: false,
    };
    /// Checks write permission.
    pub const WRITE: Self = Self {
        read: false,
        write: true,
        execute: false,
    };
    /// Checks execute permission.
    pub const EXECUTE: Self = Self {
        read: false,
        write: false,
        execute: true,
    };
}

impl BitOr for AccessMode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            read: self.read || rhs.read,
            write: self.write || rhs.write,
            execute: self.execute || rhs.execute,
        }
    }
}

/// Checks whether the real user may access `path` with `mode`.
///
/// Any failure, including a missing path, reports `false`.
pub async fn access(path: impl AsRef<Path>, mode: AccessMode) -> bool {
    access_with(path, mode, &Dispatcher::global()).await
}

/// Like [`access`], on `dispatcher`.
pub async fn access_with(path: impl AsRef<Path>, mode: AccessMode, dispatcher: &Dispatcher) -> bool {
    let path = path.as_ref().to_path_buf();
    dispatcher.dispatch(move || check_access(&path, mode)).await
}

#[cfg(unix)]
fn check_access(path: &Path, mode: AccessMode) -> bool {
    let Ok(path) = c_path(path) else {
        return false;
    };
    let mut flags = libc::F_OK;
    if mode.read {
        flags |= libc::R_OK;
    }
    if mode.write {
        flags |= libc::W_OK;
    }
    if mode.execute {
        flags |= libc::X_OK;
    }
    // SAFETY: `path` is a valid NUL-terminated string that outlives the call.
    unsafe { libc::access(path.as_ptr(), flags) == 0 }
}

#[cfg(not(unix))]
fn check_access(path: &Path, mode: AccessMode) -> bool {
    std::fs::metadata(path).is_ok_and(|metadata| !mode.write || !metadata.permissions().readonly())
}

#[cfg(unix)]
fn c_path(path: &Path) -> Result<std::ffi::CString> {
    use std::os::unix::ffi::OsStrExt;

    std::ffi::CString::new(path.as_os_str().as_bytes())
        .map_err(|_nul| std::io::Error::new(std::io::ErrorKind::InvalidInput, "path contains an interior NUL byte"))
}

/// Returns the current working directory.
///
/// # Errors
///
/// Returns the error of [`std::env::current_dir`].
pub async fn getcwd() -> Result<PathBuf> {
    getcwd_with(&Dispatcher::global()).await
}

/// Like [`getcwd`], on `dispatcher`.
///
/// # Errors
///
/// Returns the error of [`std::env::current_dir`].
pub async fn getcwd_with(dispatcher: &Dispatcher) -> Result<PathBuf> {
    dispatcher.dispatch(std::env::current_dir).await
}

/// Statistics of a mounted filesystem, as reported by `statvfs`.
///
/// Block counts are in units of [`fragment_size`](Self::fragment_size).
#[cfg(unix)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub struct FsStats {
    /// The preferred I/O block size.
    pub block_size: u64,
    /// The fundamental block size.
    pub fragment_size: u64,
    /// The total number of blocks.
    pub blocks: u64,
    /// The number of free blocks.
    pub blocks_free: u64,
    /// The number of blocks free for unprivileged users.
    pub blocks_available: u64,
    /// The total number of file nodes.
    pub files: u64,
    /// The number of free file nodes.
    pub files_free: u64,
    /// The number of file nodes free for unprivileged users.
    pub files_available: u64,
    /// The mount flags (`ST_RDONLY`, `ST_NOSUID`, ...).
    pub flags: u64,
    /// The maximum length of a file name.
    pub max_name_len: u64,
}

#[cfg(unix)]
impl FsStats {
    #[allow(clippy::useless_conversion, reason = "Field widths differ between platforms")]
    fn from_raw(raw: &libc::statvfs) -> Self {
        Self {
            block_size: u64::from(raw.f_bsize),
            fragment_size: u64::from(raw.f_frsize),
            blocks: u64::from(raw.f_blocks),
            blocks_free: u64::from(raw.f_bfree),
            blocks_available: u64::from(raw.f_bavail),
            files: u64::from(raw.f_files),
            files_free: u64::from(raw.f_ffree),
            files_available: u64::from(raw.f_favail),
            flags: u64::from(raw.f_flag),
            max_name_len: u64::from(raw.f_namemax),
        }
    }
}

/// Queries statistics of the filesystem containing `path`.
///
/// # Errors
///
/// Returns the error of the `statvfs` system call, or
/// [`ErrorKind::InvalidInput`](std::io::ErrorKind::InvalidInput) for a path
/// with an interior NUL byte.
#[cfg(unix)]
pub async fn statvfs(path: impl AsRef<Path>) -> Result<FsStats> {
    statvfs_with(path, &Dispatcher::global()).await
}

/// Like [`statvfs`], on `dispatcher`.
///
/// # Errors
///
/// See [`statvfs`].
#[cfg(unix)]
pub async fn statvfs_with(path: impl AsRef<Path>, dispatcher: &Dispatcher) -> Result<FsStats> {
    let path = path.as_ref().to_path_buf();
    dispatcher
        .dispatch(move || -> Result<FsStats> {
            let path = c_path(&path)?;
            let mut raw = core::mem::MaybeUninit::<libc::statvfs>::uninit();
            // SAFETY: `path` is NUL-terminated and `raw` is valid for writes of
            // one `libc::statvfs`; both outlive the call.
            if unsafe { libc::statvfs(path.as_ptr(), raw.as_mut_ptr()) } != 0 {
                return Err(std::io::Error::last_os_error());
            }
            // SAFETY: statvfs succeeded and initialized `raw`.
            Ok(FsStats::from_raw(&unsafe { raw.assume_init() }))
        })
        .await
}

/// Copies up to `count` bytes from `in_fd` to `out_fd` inside the kernel and
/// returns the number of bytes copied.
///
/// With an `offset`, reading starts there and the position of `in_fd` is
/// left untouched; otherwise reading starts at, and advances, the current
/// position. Both descriptors must stay open until the returned future
/// completes.
///
/// # Errors
///
/// Returns the error of the `sendfile` system call.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub async fn sendfile(out_fd: RawFd, in_fd: RawFd, offset: Option<u64>, count: usize) -> Result<usize> {
    sendfile_with(out_fd, in_fd, offset, count, &Dispatcher::global()).await
}

/// Like [`sendfile`], on `dispatcher`.
///
/// # Errors
///
/// Returns the error of the `sendfile` system call.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub async fn sendfile_with(out_fd: RawFd, in_fd: RawFd, offset: Option<u64>, count: usize, dispatcher: &Dispatcher) -> Result<usize> {
    dispatcher
        .dispatch(move || -> Result<usize> {
            let mut start = match offset {
                Some(offset) => Some(libc::off_t::try_from(offset).map_err(std::io::Error::other)?),
                None => None,
            };
            let start_ptr = start.as_mut().map_or(core::ptr::null_mut(), core::ptr::from_mut);
            // SAFETY: `start_ptr` is null or points at `start`, which outlives the
            // call. Invalid descriptors make the call fail with EBADF.
            let sent = unsafe { libc::sendfile(out_fd, in_fd, start_ptr, count) };
            usize::try_from(sent).map_err(|_overflow| std::io::Error::last_os_error())
        })
        .await
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;

    use futures::executor::block_on;

    use super::*;

    #[test]
    fn makedirs_respects_exist_ok() {
        let scratch = tempfile::tempdir().unwrap();
        let nested = scratch.path().join("a/b/c");
        block_on(async {
            makedirs(&nested, false).await.unwrap();
            assert_eq!(makedirs(&nested, false).await.unwrap_err().kind(), ErrorKind::AlreadyExists);
            makedirs(&nested, true).await.unwrap();
        });
        assert!(nested.is_dir());
    }

    #[test]
    fn removedirs_prunes_empty_parents() {
        let scratch = tempfile::tempdir().unwrap();
        let nested = scratch.path().join("x/y/z");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(scratch.path().join("keep"), "").unwrap();

        block_on(removedirs(&nested)).unwrap();
        assert!(!scratch.path().join("x").exists());
        assert!(scratch.path().exists());
    }

    #[test]
    fn errors_keep_their_kind() {
        let scratch = tempfile::tempdir().unwrap();
        let missing = scratch.path().join("missing");
        block_on(async {
            assert_eq!(stat(&missing).await.unwrap_err().kind(), ErrorKind::NotFound);
            assert_eq!(remove(&missing).await.unwrap_err().kind(), ErrorKind::NotFound);
            assert_eq!(rmdir(&missing).await.unwrap_err().kind(), ErrorKind::NotFound);
        });
    }

    #[test]
    fn rename_and_list() {
        let scratch = tempfile::tempdir().unwrap();
        let from = scratch.path().join("from.txt");
        std::fs::write(&from, "data").unwrap();
        block_on(async {
            rename(&from, scratch.path().join("to.txt")).await.unwrap();
            assert_eq!(listdir(scratch.path()).await.unwrap(), [OsString::from("to.txt")]);
            assert!(access(scratch.path().join("to.txt"), AccessMode::READ | AccessMode::WRITE).await);
            assert!(!access(&from, AccessMode::EXISTS).await);
        });
    }

    #[test]
    fn renames_creates_and_prunes_parents() {
        let scratch = tempfile::tempdir().unwrap();
        let old_dir = scratch.path().join("old/inner");
        std::fs::create_dir_all(&old_dir).unwrap();
        std::fs::write(old_dir.join("f.txt"), "data").unwrap();
        let target = scratch.path().join("new/deep/f.txt");

        block_on(renames(old_dir.join("f.txt"), &target)).unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "data");
        assert!(!scratch.path().join("old").exists());
        assert!(scratch.path().exists());
    }

    #[test]
    fn renames_keeps_parents_that_are_not_empty() {
        let scratch = tempfile::tempdir().unwrap();
        let old_dir = scratch.path().join("old");
        std::fs::create_dir(&old_dir).unwrap();
        std::fs::write(old_dir.join("a"), "").unwrap();
        std::fs::write(old_dir.join("b"), "").unwrap();

        block_on(renames(old_dir.join("a"), scratch.path().join("a"))).unwrap();
        assert!(old_dir.join("b").exists());
        assert_eq!(
            block_on(renames(old_dir.join("missing"), scratch.path().join("c"))).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[cfg(unix)]
    #[test]
    fn statvfs_reports_the_containing_filesystem() {
        let scratch = tempfile::tempdir().unwrap();
        let stats = block_on(statvfs(scratch.path())).unwrap();
        assert!(stats.fragment_size > 0);
        assert!(stats.blocks_available <= stats.blocks_free);
        assert!(stats.max_name_len >= 14);
        assert_eq!(block_on(statvfs(scratch.path().join("missing"))).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(block_on(statvfs("nul\0inside")).unwrap_err().kind(), ErrorKind::InvalidInput);
    }

    #[cfg(unix)]
    #[test]
    fn links_resolve() {
        let scratch = tempfile::tempdir().unwrap();
        let target = scratch.path().join("target");
        std::fs::write(&target, "x").unwrap();
        let alias = scratch.path().join("alias");
        block_on(async {
            symlink(&target, &alias).await.unwrap();
            assert_eq!(readlink(&alias).await.unwrap(), target);
            assert!(lstat(&alias).await.unwrap().file_type().is_symlink());
            assert!(stat(&alias).await.unwrap().is_file());
        });
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn sendfile_copies_between_files() {
        use std::io::{Read, Seek, SeekFrom, Write};
        use std::os::unix::io::AsRawFd;

        let mut source = tempfile::tempfile().unwrap();
        source.write_all(b"0123456789").unwrap();
        let mut sink = tempfile::tempfile().unwrap();

        let sent = block_on(sendfile(sink.as_raw_fd(), source.as_raw_fd(), Some(2), 4)).unwrap();
        assert_eq!(sent, 4);

        let mut copied = String::new();
        let _ = sink.seek(SeekFrom::Start(0)).unwrap();
        let _ = sink.read_to_string(&mut copied).unwrap();
        assert_eq!(copied, "2345");
    }
}
