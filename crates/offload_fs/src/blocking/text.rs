// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::io::{self, BufRead, Read, Seek, SeekFrom, Write};

use super::{BlockingHandle, Buffered};

#[cfg(windows)]
const LINE_SEPARATOR: &str = "\r\n";
#[cfg(not(windows))]
const LINE_SEPARATOR: &str = "\n";

/// How invalid byte sequences are treated when decoding text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DecodeErrors {
    /// Fail the read with [`io::ErrorKind::InvalidData`].
    #[default]
    Strict,
    /// Substitute `U+FFFD REPLACEMENT CHARACTER`.
    Replace,
    /// Skip the invalid bytes.
    Ignore,
}

impl DecodeErrors {
    /// The conventional name of this policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Replace => "replace",
            Self::Ignore => "ignore",
        }
    }
}

/// Line ending handling of a text stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Newline {
    /// Lines end at `\n`, `\r` or `\r\n`, all read back as `\n`. Written
    /// `\n` becomes the platform line separator.
    #[default]
    Universal,
    /// Lines end at `\n`, `\r` or `\r\n`, returned untranslated. Nothing is
    /// translated on write.
    Untranslated,
    /// Lines end at `\n` only; nothing is translated.
    Lf,
    /// Lines end at `\r` only; written `\n` becomes `\r`.
    Cr,
    /// Lines end at `\r\n` only; written `\n` becomes `\r\n`.
    CrLf,
}

impl Newline {
    /// The terminator this setting names, or `None` for the universal modes.
    #[must_use]
    pub const fn terminator(self) -> Option<&'static str> {
        match self {
            Self::Universal | Self::Untranslated => None,
            Self::Lf => Some("\n"),
            Self::Cr => Some("\r"),
            Self::CrLf => Some("\r\n"),
        }
    }

    const fn write_separator(self) -> Option<&'static str> {
        match self {
            Self::Universal => Some(LINE_SEPARATOR),
            Self::Untranslated | Self::Lf => None,
            Self::Cr => Some("\r"),
            Self::CrLf => Some("\r\n"),
        }
    }
}

/// Resolves an encoding name to its canonical form.
///
/// Only UTF-8 is supported.
pub(crate) fn normalize_encoding(name: &str) -> io::Result<&'static str> {
    match name.to_ascii_lowercase().replace('_', "-").as_str() {
        "utf-8" | "utf8" | "u8" => Ok("utf-8"),
        _ => Err(io::Error::new(io::ErrorKind::InvalidInput, format!("unknown encoding: {name}"))),
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct TextConfig {
    pub(crate) encoding: &'static str,
    pub(crate) errors: DecodeErrors,
    pub(crate) newline: Newline,
    pub(crate) line_buffering: bool,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            encoding: "utf-8",
            errors: DecodeErrors::Strict,
            newline: Newline::Universal,
            line_buffering: false,
        }
    }
}

/// A UTF-8 text stream over a buffered binary stream.
///
/// Positions reported by [`tell`](Self::tell) and accepted by
/// [`seek`](Self::seek) are byte offsets into the underlying stream.
#[derive(Debug)]
pub struct TextStream {
    buffer: Buffered,
    config: TextConfig,
}

impl TextStream {
    pub(crate) const fn new(buffer: Buffered, config: TextConfig) -> Self {
        Self { buffer, config }
    }

    pub(crate) const fn config(&self) -> &TextConfig {
        &self.config
    }

    pub(crate) const fn buffer(&self) -> &Buffered {
        &self.buffer
    }

    pub(crate) const fn buffer_mut(&mut self) -> &mut Buffered {
        &mut self.buffer
    }

    /// Reads up to `size` characters, or everything that is left.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors, and on undecodable input under
    /// [`DecodeErrors::Strict`].
    pub fn read(&mut self, size: Option<usize>) -> io::Result<String> {
        let Some(size) = size else {
            let mut bytes = Vec::new();
            let _ = self.buffer.read_to_end(&mut bytes)?;
            let text = self.decode(&bytes)?;
            return Ok(if self.config.newline == Newline::Universal {
                text.replace("\r\n", "\n").replace('\r', "\n")
            } else {
                text
            });
        };

        let mut text = String::new();
        for _ in 0..size {
            match self.read_char()? {
                Some(c) => text.push(c),
                None => break,
            }
        }
        Ok(text)
    }

    /// Reads one line including its terminator. Returns an empty string at
    /// end of stream.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors, and on undecodable input under
    /// [`DecodeErrors::Strict`].
    pub fn readline(&mut self) -> io::Result<String> {
        let mut raw = Vec::new();
        match self.config.newline {
            Newline::Lf => {
                let _ = self.buffer.read_until(b'\n', &mut raw)?;
            }
            Newline::Cr => {
                let _ = self.buffer.read_until(b'\r', &mut raw)?;
            }
            Newline::CrLf => loop {
                if self.buffer.read_until(b'\n', &mut raw)? == 0 || raw.ends_with(b"\r\n") {
                    break;
                }
            },
            Newline::Universal | Newline::Untranslated => {
                self.read_universal_line(&mut raw)?;
                if self.config.newline == Newline::Universal {
                    if raw.ends_with(b"\r\n") {
                        raw.truncate(raw.len() - 2);
                        raw.push(b'\n');
                    } else if let Some(last) = raw.last_mut()
                        && *last == b'\r'
                    {
                        *last = b'\n';
                    }
                }
            }
        }
        self.decode(&raw)
    }

    /// Reads all remaining lines.
    ///
    /// # Errors
    ///
    /// Fails like [`readline`](Self::readline).
    pub fn readlines(&mut self) -> io::Result<Vec<String>> {
        let mut lines = Vec::new();
        loop {
            let line = self.readline()?;
            if line.is_empty() {
                return Ok(lines);
            }
            lines.push(line);
        }
    }

    /// Writes `text`, translating `\n` according to the newline setting.
    /// Returns the number of characters written.
    ///
    /// # Errors
    ///
    /// Fails if the underlying stream is not writable or the write fails.
    pub fn write(&mut self, text: &str) -> io::Result<usize> {
        match self.config.newline.write_separator() {
            Some(separator) if separator != "\n" => self.buffer.write_all(text.replace('\n', separator).as_bytes())?,
            _ => self.buffer.write_all(text.as_bytes())?,
        }
        if self.config.line_buffering && text.contains(['\n', '\r']) {
            self.buffer.flush()?;
        }
        Ok(text.chars().count())
    }

    /// Moves to a byte offset.
    ///
    /// # Errors
    ///
    /// Fails if the underlying stream fails to seek.
    pub fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.buffer.seek(pos)
    }

    /// Returns the current byte offset.
    ///
    /// # Errors
    ///
    /// Fails if the underlying stream cannot report its position.
    pub fn tell(&mut self) -> io::Result<u64> {
        self.buffer.stream_position()
    }

    /// Resizes the stream; see [`Buffered::truncate`].
    pub(crate) fn truncate(&mut self, size: Option<u64>) -> io::Result<u64> {
        self.buffer.truncate(size)
    }

    /// Flushes pending writes.
    ///
    /// # Errors
    ///
    /// Fails if the write-back fails.
    pub fn flush(&mut self) -> io::Result<()> {
        self.buffer.flush()
    }

    pub(crate) fn close(self) -> io::Result<()> {
        self.buffer.close()
    }

    /// Flushes and returns the binary stream underneath.
    pub(crate) fn detach(mut self) -> io::Result<BlockingHandle> {
        self.buffer.flush()?;
        Ok(self.buffer.into_handle())
    }

    fn read_universal_line(&mut self, raw: &mut Vec<u8>) -> io::Result<()> {
        loop {
            let (done, used) = {
                let available = self.buffer.fill_buf()?;
                if available.is_empty() {
                    return Ok(());
                }
                match available.iter().position(|&b| b == b'\n' || b == b'\r') {
                    Some(i) => {
                        raw.extend_from_slice(&available[..=i]);
                        (true, i + 1)
                    }
                    None => {
                        raw.extend_from_slice(available);
                        (false, available.len())
                    }
                }
            };
            self.buffer.consume(used);
            if done {
                if raw.last() == Some(&b'\r') && self.peek_byte()? == Some(b'\n') {
                    self.buffer.consume(1);
                    raw.push(b'\n');
                }
                return Ok(());
            }
        }
    }

    fn read_char(&mut self) -> io::Result<Option<char>> {
        loop {
            let Some(first) = self.peek_byte()? else {
                return Ok(None);
            };
            self.buffer.consume(1);

            let mut encoded = [first, 0, 0, 0];
            let mut len = 1;
            while len < utf8_width(first) {
                match self.peek_byte()? {
                    Some(b) if b & 0xC0 == 0x80 => {
                        self.buffer.consume(1);
                        encoded[len] = b;
                        len += 1;
                    }
                    _ => break,
                }
            }

            let Ok(decoded) = core::str::from_utf8(&encoded[..len]) else {
                match self.config.errors {
                    DecodeErrors::Strict => return Err(invalid_utf8()),
                    DecodeErrors::Replace => return Ok(Some(char::REPLACEMENT_CHARACTER)),
                    DecodeErrors::Ignore => continue,
                }
            };
            let c = decoded.chars().next();
            if c == Some('\r') && self.config.newline == Newline::Universal {
                if self.peek_byte()? == Some(b'\n') {
                    self.buffer.consume(1);
                }
                return Ok(Some('\n'));
            }
            return Ok(c);
        }
    }

    fn peek_byte(&mut self) -> io::Result<Option<u8>> {
        Ok(self.buffer.fill_buf()?.first().copied())
    }

    fn decode(&self, bytes: &[u8]) -> io::Result<String> {
        match self.config.errors {
            DecodeErrors::Strict => String::from_utf8(bytes.to_vec()).map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error)),
            DecodeErrors::Replace => Ok(String::from_utf8_lossy(bytes).into_owned()),
            DecodeErrors::Ignore => Ok(bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()),
        }
    }
}

fn invalid_utf8() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "stream did not contain valid UTF-8")
}

/// The encoded length announced by a leading byte; 1 for stray bytes.
const fn utf8_width(first: u8) -> usize {
    match first {
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 1,
    }
}
