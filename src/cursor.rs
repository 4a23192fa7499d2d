//! Bounds-checked, forward-only reader over a DER buffer.

use crate::tlv::{self, Tag};
use crate::{Error, ErrorKind, Result};

/// A window `[start, end)` over an input buffer, read from `position` onwards.
///
/// All offsets reported by a cursor (and by everything decoded through it) are absolute offsets
/// into the original input, so a nested cursor over the value of a constructed TLV still reports
/// positions that can be used to slice the caller's buffer directly. Cursors are `Copy`: saving a
/// copy and restoring it is how lookahead is done.
#[derive(Clone, Copy, Debug)]
pub struct Cursor<'a> {
    input: &'a [u8],
    start: usize,
    position: usize,
    end: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            start: 0,
            position: 0,
            end: input.len(),
        }
    }

    /// Returns a cursor over `[start, end)`, which must lie inside this cursor's window.
    pub fn nested(&self, start: usize, end: usize) -> Result<Self> {
        if start < self.start || start > end || end > self.end {
            return Err(Error::new(
                ErrorKind::OutOfBounds {
                    length: end.saturating_sub(start),
                },
                start,
            ));
        }
        Ok(Self {
            input: self.input,
            start,
            position: start,
            end,
        })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn remaining(&self) -> usize {
        self.end - self.position
    }

    pub fn is_empty(&self) -> bool {
        self.position >= self.end
    }

    /// The full input buffer this cursor reads from.
    pub fn input(&self) -> &'a [u8] {
        self.input
    }

    /// The input truncated at the end of this window; offsets into it are absolute.
    pub(crate) fn window(&self) -> &'a [u8] {
        &self.input[..self.end]
    }

    /// Borrows `length` bytes starting at absolute `offset`; the range must lie inside the window.
    pub fn slice(&self, offset: usize, length: usize) -> Result<&'a [u8]> {
        match offset.checked_add(length) {
            Some(end) if offset >= self.start && end <= self.end => Ok(&self.input[offset..end]),
            _ => Err(Error::new(ErrorKind::OutOfBounds { length }, offset)),
        }
    }

    /// Moves the cursor forward to absolute `offset`.
    pub fn advance_to(&mut self, offset: usize) -> Result<()> {
        if offset < self.position || offset > self.end {
            return Err(Error::new(
                ErrorKind::OutOfBounds {
                    length: offset.saturating_sub(self.position),
                },
                self.position,
            ));
        }
        self.position = offset;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let byte = self.slice(self.position, 1).map_err(|_| {
            Error::new(
                ErrorKind::TruncatedInput {
                    needed: 1,
                    remaining: 0,
                },
                self.position,
            )
        })?[0];
        self.position += 1;
        Ok(byte)
    }

    /// Decodes the next identifier and length without moving.
    ///
    /// Returns the tag, the declared value length and the absolute offset of the first value byte.
    pub fn peek_tag_length(&self) -> Result<(Tag, usize, usize)> {
        let header = tlv::parse_header(self.window(), self.position)?;
        Ok((
            header.tag,
            header.length,
            self.position + header.header_len,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_is_bounded_by_window() {
        let data = [0x30, 0x03, 0x02, 0x01, 0x05, 0xff];
        let cursor = Cursor::new(&data);
        let inner = cursor.nested(2, 5).unwrap();
        assert_eq!(inner.slice(2, 3).unwrap(), &[0x02, 0x01, 0x05]);
        let err = inner.slice(4, 2).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::OutOfBounds { length: 2 });
        assert_eq!(err.offset(), 4);
    }

    #[test]
    fn slice_before_window_start_fails() {
        let data = [0x30, 0x03, 0x02, 0x01, 0x05];
        let inner = Cursor::new(&data).nested(2, 5).unwrap();
        assert_eq!(inner.start(), 2);
        let err = inner.slice(0, 2).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::OutOfBounds { length: 2 });
        assert_eq!(err.offset(), 0);
        // Straddling the start is rejected too.
        assert!(inner.slice(1, 2).is_err());
        assert!(inner.nested(1, 5).is_err());
        assert_eq!(inner.slice(2, 1).unwrap(), &[0x02]);
    }

    #[test]
    fn advance_and_restore() {
        let data = [0x05, 0x00, 0x05, 0x00];
        let mut cursor = Cursor::new(&data);
        let saved = cursor;
        cursor.advance_to(2).unwrap();
        assert_eq!(cursor.remaining(), 2);
        assert!(cursor.advance_to(1).is_err());
        cursor = saved;
        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.read_u8().unwrap(), 0x05);
    }

    #[test]
    fn peek_does_not_move() {
        let data = [0x02, 0x01, 0x07];
        let cursor = Cursor::new(&data);
        let (tag, length, value_offset) = cursor.peek_tag_length().unwrap();
        assert_eq!(tag, Tag::INTEGER);
        assert_eq!(length, 1);
        assert_eq!(value_offset, 2);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn nested_outside_window_fails() {
        let data = [0u8; 4];
        let cursor = Cursor::new(&data);
        assert!(cursor.nested(1, 5).is_err());
    }
}
