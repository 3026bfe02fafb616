//! Sequential readers over text and binary sources.
//!
//! `LineCursor` feeds the text decoders one normalized line at a time;
//! `ByteCursor` feeds the binary decoder and supports absolute seeks because
//! lump data is located through a directory of offsets.

use std::collections::VecDeque;

use crate::error::{AssetError, AssetResult, Location};

/// One non-blank source line, split into whitespace-separated tokens.
#[derive(Clone, Debug, PartialEq)]
pub struct Line {
    /// 1-based line number in the source
    pub number: usize,

    /// Whitespace-separated tokens (tabs count as whitespace)
    pub tokens: Vec<String>,

    /// The trimmed line text, for fields that may contain spaces
    pub text: String,
}

impl Line {
    /// First token of the line. Never empty for a yielded line.
    pub fn keyword(&self) -> &str {
        self.tokens.first().map(String::as_str).unwrap_or("")
    }

    /// Token at `index`, if present.
    pub fn token(&self, index: usize) -> Option<&str> {
        self.tokens.get(index).map(String::as_str)
    }

    /// True when the line ends with an opening brace.
    pub fn opens_block(&self) -> bool {
        self.text.ends_with('{')
    }

    /// True when the line is a lone closing brace.
    pub fn closes_block(&self) -> bool {
        self.text == "}"
    }

    pub fn location(&self) -> Location {
        Location::Line(self.number)
    }
}

/// Line-oriented cursor with one line of lookahead.
pub struct LineCursor {
    lines: VecDeque<Line>,
    source_name: String,
    last_line: usize,
}

impl LineCursor {
    /// Split `content` into normalized lines. Blank lines are dropped here so
    /// decoders never see them.
    pub fn new(content: &str, source_name: impl Into<String>) -> Self {
        let lines: VecDeque<_> = content
            .lines()
            .enumerate()
            .filter_map(|(i, raw)| {
                let text = raw.trim();
                if text.is_empty() {
                    return None;
                }
                Some(Line {
                    number: i + 1,
                    tokens: text.split_whitespace().map(str::to_string).collect(),
                    text: text.to_string(),
                })
            })
            .collect();

        let last_line = lines.back().map(|l| l.number).unwrap_or(0);

        Self {
            lines,
            source_name: source_name.into(),
            last_line,
        }
    }

    /// Next line without consuming it, `None` at end of input.
    pub fn peek(&self) -> Option<&Line> {
        self.lines.front()
    }

    /// Consume and return the next line, `None` at end of input.
    pub fn advance(&mut self) -> Option<Line> {
        self.lines.pop_front()
    }

    /// Put a line back so the next `peek` sees it again.
    pub fn push_back(&mut self, line: Line) {
        self.lines.push_front(line);
    }

    pub fn is_at_end(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Number of the last non-blank line, used for end-of-input errors.
    pub fn last_line(&self) -> usize {
        self.last_line
    }

    /// Build a `MalformedRecord` error pointing at `line`.
    pub fn malformed(&self, line: &Line, message: impl Into<String>) -> AssetError {
        AssetError::malformed(&self.source_name, line.location(), message)
    }

    /// Parse token `index` of `line` as `T`, failing with `MalformedRecord`
    /// when the token is missing or not a number.
    pub fn parse_token<T: std::str::FromStr>(&self, line: &Line, index: usize) -> AssetResult<T> {
        let token = line.token(index).ok_or_else(|| {
            self.malformed(
                line,
                format!("'{}' needs at least {} fields", line.keyword(), index + 1),
            )
        })?;
        token.parse::<T>().map_err(|_| {
            self.malformed(
                line,
                format!("invalid number '{}' in '{}' record", token, line.keyword()),
            )
        })
    }

    /// Parse `N` consecutive numeric tokens starting at `start`.
    pub fn parse_tokens<T: std::str::FromStr + Copy + Default, const N: usize>(
        &self,
        line: &Line,
        start: usize,
    ) -> AssetResult<[T; N]> {
        let mut out = [T::default(); N];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.parse_token(line, start + i)?;
        }
        Ok(out)
    }
}

/// Little-endian byte reader with absolute seeking.
pub struct ByteCursor<'a> {
    bytes: &'a [u8],
    position: usize,
    source_name: String,
}

impl<'a> ByteCursor<'a> {
    pub fn new(bytes: &'a [u8], source_name: impl Into<String>) -> Self {
        Self {
            bytes,
            position: 0,
            source_name: source_name.into(),
        }
    }

    /// Next byte without consuming it, `None` at end of input.
    pub fn peek(&self) -> Option<u8> {
        self.bytes.get(self.position).copied()
    }

    /// Consume and return the next byte, `None` at end of input.
    pub fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.position += 1;
        Some(byte)
    }

    /// Move to an absolute byte offset. Seeking to exactly the end is allowed.
    pub fn seek_absolute(&mut self, offset: usize) -> AssetResult<()> {
        if offset > self.bytes.len() {
            return Err(self.overrun(offset, 0));
        }
        self.position = offset;
        Ok(())
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Consume exactly `count` bytes.
    pub fn take(&mut self, count: usize) -> AssetResult<&'a [u8]> {
        let end = self
            .position
            .checked_add(count)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| self.overrun(self.position, count))?;
        let bytes = self.bytes;
        let slice = &bytes[self.position..end];
        self.position = end;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> AssetResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> AssetResult<u8> {
        let offset = self.position;
        self.advance().ok_or_else(|| self.overrun(offset, 1))
    }

    pub fn read_i32(&mut self) -> AssetResult<i32> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> AssetResult<u32> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_f32(&mut self) -> AssetResult<f32> {
        Ok(f32::from_le_bytes(self.take_array()?))
    }

    pub fn read_vec3(&mut self) -> AssetResult<[f32; 3]> {
        Ok([self.read_f32()?, self.read_f32()?, self.read_f32()?])
    }

    /// Read a fixed-width, NUL-padded string field.
    pub fn read_fixed_str(&mut self, width: usize) -> AssetResult<String> {
        let raw = self.take(width)?;
        let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    /// Build a `MalformedRecord` error at the current offset.
    pub fn malformed(&self, message: impl Into<String>) -> AssetError {
        AssetError::malformed(&self.source_name, Location::Offset(self.position as u64), message)
    }

    fn overrun(&self, offset: usize, wanted: usize) -> AssetError {
        AssetError::malformed(
            &self.source_name,
            Location::Offset(offset as u64),
            format!(
                "unexpected end of data: wanted {} bytes, {} available",
                wanted,
                self.bytes.len().saturating_sub(offset)
            ),
        )
    }
}
