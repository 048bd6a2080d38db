// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ffi::{OsStr, OsString};
use std::fs::{FileType, Metadata};
use std::io::{Error, Result};
use std::path::{Path, PathBuf};

/// An entry within a directory.
///
/// This type is returned by [`ReadDir::next_entry`](crate::read_dir::ReadDir::next_entry).
/// Metadata and file type are fetched eagerly on the worker thread during
/// directory iteration, so inspecting an entry never dispatches.
#[derive(Debug)]
pub struct DirEntry {
    path: PathBuf,
    file_name: OsString,
    file_type: Result<FileType>,
    metadata: Result<Metadata>,
    #[cfg(unix)]
    inode: u64,
}

impl DirEntry {
    /// Creates a `DirEntry` by eagerly capturing all data from a `std::fs::DirEntry`.
    pub(crate) fn from_std(entry: &std::fs::DirEntry) -> Self {
        let metadata = entry.metadata();
        // Reuse the metadata's file type to skip a second stat where possible.
        let file_type = metadata.as_ref().map_or_else(|_| entry.file_type(), |m| Ok(m.file_type()));
        Self {
            path: entry.path(),
            file_name: entry.file_name(),
            file_type,
            metadata,
            #[cfg(unix)]
            inode: std::os::unix::fs::DirEntryExt::ino(entry),
        }
    }

    /// The full path of the entry: the scanned directory joined with
    /// [`file_name`](Self::file_name).
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the bare file name of this directory entry without any other
    /// leading path component.
    #[must_use]
    pub fn file_name(&self) -> &OsStr {
        &self.file_name
    }

    /// Returns the metadata for the file that this entry points at.
    ///
    /// Symlinks are not traversed.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata could not be read when the directory
    /// was iterated.
    pub const fn metadata(&self) -> core::result::Result<&Metadata, &Error> {
        self.metadata.as_ref()
    }

    /// Returns the file type for the file that this entry points at.
    ///
    /// Symlinks are not traversed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file type could not be read when the directory
    /// was iterated.
    pub const fn file_type(&self) -> core::result::Result<FileType, &Error> {
        match &self.file_type {
            Ok(ft) => Ok(*ft),
            Err(e) => Err(e),
        }
    }

    /// Whether the entry is a directory. Unknown types report `false`.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.file_type.as_ref().is_ok_and(FileType::is_dir)
    }

    /// Whether the entry is a regular file. Unknown types report `false`.
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.file_type.as_ref().is_ok_and(FileType::is_file)
    }

    /// Whether the entry is a symbolic link. Unknown types report `false`.
    #[must_use]
    pub fn is_symlink(&self) -> bool {
        self.file_type.as_ref().is_ok_and(FileType::is_symlink)
    }

    /// The inode number of the entry.
    #[cfg(unix)]
    #[must_use]
    pub const fn inode(&self) -> u64 {
        self.inode
    }
}
