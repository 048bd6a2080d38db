// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::fmt;
use core::str::FromStr;
use std::io::{Error, ErrorKind, Result};

/// What opening a file does with the path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Access {
    /// `r`: open an existing file for reading.
    Read,
    /// `w`: create or truncate a file for writing.
    Write,
    /// `x`: create a new file for writing, failing if it exists.
    CreateNew,
    /// `a`: create or open a file for appending.
    Append,
}

/// A parsed file mode string such as `"r"`, `"w+b"` or `"ab"`.
///
/// A mode is one of `r`, `w`, `x` or `a`, optionally followed by `+` (open
/// for both reading and writing) and by `b` (binary) or `t` (text, the
/// default), in any order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Mode {
    access: Access,
    update: bool,
    binary: bool,
}

impl Mode {
    /// Parses a mode string.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::InvalidInput`] on unknown or repeated
    /// characters, on a missing or repeated access letter, and when both `b`
    /// and `t` are given.
    pub fn parse(mode: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::new(ErrorKind::InvalidInput, format!("invalid mode '{mode}': {reason}"));

        let mut access = None;
        let mut update = false;
        let mut binary = false;
        let mut text = false;
        for (i, c) in mode.char_indices() {
            if mode[..i].contains(c) {
                return Err(invalid("repeated character"));
            }
            let next = match c {
                'r' => Access::Read,
                'w' => Access::Write,
                'x' => Access::CreateNew,
                'a' => Access::Append,
                '+' => {
                    update = true;
                    continue;
                }
                'b' => {
                    binary = true;
                    continue;
                }
                't' => {
                    text = true;
                    continue;
                }
                _ => return Err(invalid("unknown character")),
            };
            if access.replace(next).is_some() {
                return Err(invalid("must have exactly one of create/read/write/append mode"));
            }
        }

        if binary && text {
            return Err(invalid("can't have text and binary mode at once"));
        }
        let access = access.ok_or_else(|| invalid("must have exactly one of create/read/write/append mode"))?;
        Ok(Self { access, update, binary })
    }

    /// The access letter of this mode.
    #[must_use]
    pub const fn access(self) -> Access {
        self.access
    }

    /// Whether `+` was given.
    #[must_use]
    pub const fn is_update(self) -> bool {
        self.update
    }

    /// Whether this is a binary mode.
    #[must_use]
    pub const fn is_binary(self) -> bool {
        self.binary
    }

    /// Whether the file can be read.
    #[must_use]
    pub const fn readable(self) -> bool {
        self.update || matches!(self.access, Access::Read)
    }

    /// Whether the file can be written.
    #[must_use]
    pub const fn writable(self) -> bool {
        self.update || !matches!(self.access, Access::Read)
    }

    /// Returns this mode as binary.
    #[must_use]
    pub const fn binary(mut self) -> Self {
        self.binary = true;
        self
    }

    /// The standard library options that open a file in this mode.
    pub(crate) fn std_options(self) -> std::fs::OpenOptions {
        let mut options = std::fs::OpenOptions::new();
        let _ = options.read(self.readable());
        let _ = match self.access {
            Access::Read => options.write(self.update),
            Access::Write => options.write(true).create(true).truncate(true),
            Access::CreateNew => options.write(true).create_new(true),
            Access::Append => options.append(true).create(true),
        };
        options
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self.access {
            Access::Read => "r",
            Access::Write => "w",
            Access::CreateNew => "x",
            Access::Append => "a",
        })?;
        if self.binary {
            f.write_str("b")?;
        }
        if self.update {
            f.write_str("+")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_modes() {
        let read = Mode::parse("r").unwrap();
        assert_eq!(read.access(), Access::Read);
        assert!(read.readable() && !read.writable() && !read.is_binary());

        let update = Mode::parse("w+b").unwrap();
        assert_eq!(update.access(), Access::Write);
        assert!(update.readable() && update.writable() && update.is_binary());

        let append: Mode = "ab".parse().unwrap();
        assert_eq!(append.access(), Access::Append);
        assert!(!append.readable());

        assert_eq!(Mode::parse("rt").unwrap(), Mode::parse("r").unwrap());
        assert_eq!(Mode::parse("b+x").unwrap().access(), Access::CreateNew);
    }

    #[test]
    fn rejects_malformed_modes() {
        for bad in ["", "rw", "rr", "q", "rbt", "++r", "b"] {
            let error = Mode::parse(bad).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::InvalidInput, "{bad}");
        }
    }

    #[test]
    fn displays_canonically() {
        assert_eq!(Mode::parse("+rb").unwrap().to_string(), "rb+");
        assert_eq!(Mode::parse("wt").unwrap().to_string(), "w");
        assert_eq!(Mode::parse("r").unwrap().binary().to_string(), "rb");
    }
}
