// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Blocking stream primitives.
//!
//! Everything in this module performs real I/O and must only run on a worker
//! thread. The asynchronous facades own these values through a
//! [`HandleCell`](crate::handle_cell::HandleCell) and never touch them on the
//! caller's thread.

mod buffered;
mod member;
mod random;
mod spooled;
mod text;

use core::any::{Any, type_name};
use core::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};

use crate::archive::MemberWriter;

pub(crate) use buffered::Buffered;
pub use member::MemberReader;
pub use random::BufferedRandom;
pub use spooled::SpooledBuffer;
pub use text::{DecodeErrors, Newline, TextStream};
pub(crate) use text::{TextConfig, normalize_encoding};

/// The capability category of a blocking handle.
///
/// Each category maps to exactly one asynchronous facade type; see
/// [`classify_and_wrap`](crate::classify_and_wrap).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Category {
    /// A decoded text stream.
    Text,
    /// A buffered binary stream that can only be written.
    BufferedWriter,
    /// A buffered binary stream that can be read, and possibly written.
    BufferedReader,
    /// An unbuffered binary stream.
    Raw,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::BufferedWriter => "buffered writer",
            Self::BufferedReader => "buffered reader",
            Self::Raw => "raw",
        })
    }
}

/// A blocking handle produced by a constructor running on a worker thread.
///
/// This is the input of the wrapping policy: each recognized variant is
/// wrapped in the facade of its [`Category`], and [`BlockingHandle::Foreign`]
/// is rejected.
#[non_exhaustive]
pub enum BlockingHandle {
    /// A decoded text stream over a buffered binary stream.
    Text(TextStream),
    /// A write-only buffered file.
    BufferedWriter(BufWriter<File>),
    /// A read-only buffered file.
    BufferedReader(BufReader<File>),
    /// A buffered file open for both reading and writing.
    BufferedRandom(BufferedRandom),
    /// A decompressed archive member.
    Member(MemberReader),
    /// An archive member open for writing.
    MemberWriter(MemberWriter),
    /// A spooled buffer that moves from memory to disk past a size limit.
    Spooled(SpooledBuffer),
    /// An unbuffered file.
    Raw(File),
    /// Any other value; the wrapping policy does not recognize it.
    Foreign {
        /// The Rust type name of the wrapped value.
        type_name: &'static str,
        /// The wrapped value.
        handle: Box<dyn Any + Send>,
    },
}

impl BlockingHandle {
    /// Wraps a value of a type the wrapping policy does not know about.
    pub fn foreign<T: Send + 'static>(handle: T) -> Self {
        Self::Foreign {
            type_name: type_name::<T>(),
            handle: Box::new(handle),
        }
    }

    /// Returns the capability category, or `None` for a foreign handle.
    #[must_use]
    pub const fn category(&self) -> Option<Category> {
        match self {
            Self::Text(_) => Some(Category::Text),
            Self::BufferedWriter(_) | Self::MemberWriter(_) => Some(Category::BufferedWriter),
            Self::BufferedReader(_) | Self::BufferedRandom(_) | Self::Member(_) | Self::Spooled(_) => {
                Some(Category::BufferedReader)
            }
            Self::Raw(_) => Some(Category::Raw),
            Self::Foreign { .. } => None,
        }
    }
}

impl fmt::Debug for BlockingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(stream) => f.debug_tuple("Text").field(stream).finish(),
            Self::BufferedWriter(writer) => f.debug_tuple("BufferedWriter").field(writer).finish(),
            Self::BufferedReader(reader) => f.debug_tuple("BufferedReader").field(reader).finish(),
            Self::BufferedRandom(random) => f.debug_tuple("BufferedRandom").field(random).finish(),
            Self::Member(member) => f.debug_tuple("Member").field(member).finish(),
            Self::MemberWriter(member) => f.debug_tuple("MemberWriter").field(member).finish(),
            Self::Spooled(spooled) => f.debug_tuple("Spooled").field(spooled).finish(),
            Self::Raw(file) => f.debug_tuple("Raw").field(file).finish(),
            Self::Foreign { type_name, .. } => f.debug_struct("Foreign").field("type_name", type_name).finish_non_exhaustive(),
        }
    }
}

/// The error a primitive reports for an operation its mode does not allow.
pub(crate) fn unsupported(what: &'static str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Unsupported, what)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_handles_have_no_category() {
        let handle = BlockingHandle::foreign(42_u32);
        assert_eq!(handle.category(), None);
        assert!(format!("{handle:?}").contains("u32"));
    }

    #[test]
    fn readers_share_a_category() {
        let member = BlockingHandle::Member(MemberReader::new("a.txt", b"abc".to_vec()));
        assert_eq!(member.category(), Some(Category::BufferedReader));
        assert_eq!(Category::BufferedWriter.to_string(), "buffered writer");
    }

    #[test]
    fn spooled_buffers_are_buffered_readers() {
        let spooled = BlockingHandle::Spooled(SpooledBuffer::new(16, None, 64));
        assert_eq!(spooled.category(), Some(Category::BufferedReader));
        assert!(format!("{spooled:?}").starts_with("Spooled"));
    }
}
