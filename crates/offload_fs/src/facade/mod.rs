// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Asynchronous facades over blocking streams, one per [`Category`](crate::Category).

mod buffered;
mod raw;
mod text;

#[cfg(unix)]
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

pub use buffered::{AsyncBufferedReader, AsyncBufferedWriter};
pub use raw::AsyncRawFile;
pub use text::AsyncTextFile;

use crate::mode::Mode;

/// Facts about a facade's origin that never need a worker thread to read.
#[derive(Clone, Debug, Default)]
pub(crate) struct Origin {
    pub(crate) name: Option<PathBuf>,
    pub(crate) mode: Option<Mode>,
    #[cfg(unix)]
    pub(crate) raw_fd: Option<RawFd>,
}

impl Origin {
    pub(crate) fn name(&self) -> Option<&Path> {
        self.name.as_deref()
    }
}

/// Fills `buf` from `reader` until it is full or the reader is exhausted.
pub(crate) fn read_best_effort(reader: &mut impl std::io::Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        let n = reader.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}
