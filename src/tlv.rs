//! Tag-Length-Value scanning under the Distinguished Encoding Rules.
//!
//! [`parse_header`] decodes identifier and length octets only. [`read_tlv`] and [`peek_tlv`]
//! additionally make sure the declared value is present inside the cursor's window, and borrow
//! the whole unit from the input. None of these functions modify anything on failure.

use core::fmt;
use core::ops::Range;

use crate::cursor::Cursor;
use crate::{Error, ErrorKind, Result};

/// ASN.1 tag class, the top two bits of the identifier octet.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Class {
    Universal,
    Application,
    ContextSpecific,
    Private,
}

impl Class {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Class::Universal,
            1 => Class::Application,
            2 => Class::ContextSpecific,
            _ => Class::Private,
        }
    }

    fn bits(self) -> u8 {
        match self {
            Class::Universal => 0x00,
            Class::Application => 0x40,
            Class::ContextSpecific => 0x80,
            Class::Private => 0xc0,
        }
    }
}

/// What a TLV unit claims to be.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Tag {
    pub class: Class,
    pub constructed: bool,
    pub number: u32,
}

impl Tag {
    pub const BOOLEAN: Tag = Tag::universal(1, false);
    pub const INTEGER: Tag = Tag::universal(2, false);
    pub const BIT_STRING: Tag = Tag::universal(3, false);
    pub const OCTET_STRING: Tag = Tag::universal(4, false);
    pub const NULL: Tag = Tag::universal(5, false);
    pub const OBJECT_IDENTIFIER: Tag = Tag::universal(6, false);
    pub const UTF8_STRING: Tag = Tag::universal(12, false);
    pub const SEQUENCE: Tag = Tag::universal(16, true);
    pub const SET: Tag = Tag::universal(17, true);
    pub const PRINTABLE_STRING: Tag = Tag::universal(19, false);
    pub const TELETEX_STRING: Tag = Tag::universal(20, false);
    pub const IA5_STRING: Tag = Tag::universal(22, false);
    pub const UTC_TIME: Tag = Tag::universal(23, false);
    pub const GENERALIZED_TIME: Tag = Tag::universal(24, false);
    pub const VISIBLE_STRING: Tag = Tag::universal(26, false);
    pub const BMP_STRING: Tag = Tag::universal(30, false);

    pub const fn universal(number: u32, constructed: bool) -> Self {
        Self {
            class: Class::Universal,
            constructed,
            number,
        }
    }

    pub const fn context(number: u32, constructed: bool) -> Self {
        Self {
            class: Class::ContextSpecific,
            constructed,
            number,
        }
    }

    /// The tag an IMPLICIT `[number]` gives this type: the class and number change, the
    /// primitive/constructed form does not.
    pub const fn implicit(self, number: u32) -> Self {
        Tag::context(number, self.constructed)
    }

    /// The DER identifier octets for this tag.
    pub fn to_der_identifier(&self) -> Vec<u8> {
        let leading = self.class.bits() | if self.constructed { 0x20 } else { 0x00 };
        if self.number < 0x1f {
            return vec![leading | self.number as u8];
        }

        let mut groups = Vec::new();
        let mut number = self.number;
        while number > 0 {
            groups.push((number & 0x7f) as u8);
            number >>= 7;
        }
        let mut out = Vec::with_capacity(groups.len() + 1);
        out.push(leading | 0x1f);
        while let Some(group) = groups.pop() {
            out.push(if groups.is_empty() { group } else { group | 0x80 });
        }
        out
    }

    fn universal_name(number: u32) -> Option<&'static str> {
        Some(match number {
            1 => "BOOLEAN",
            2 => "INTEGER",
            3 => "BIT STRING",
            4 => "OCTET STRING",
            5 => "NULL",
            6 => "OBJECT IDENTIFIER",
            12 => "UTF8String",
            16 => "SEQUENCE",
            17 => "SET",
            19 => "PrintableString",
            20 => "TeletexString",
            22 => "IA5String",
            23 => "UTCTime",
            24 => "GeneralizedTime",
            26 => "VisibleString",
            30 => "BMPString",
            _ => return None,
        })
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.class {
            Class::Universal => match Tag::universal_name(self.number) {
                Some(name) => f.write_str(name),
                None => write!(f, "[UNIVERSAL {}]", self.number),
            },
            Class::Application => write!(f, "[APPLICATION {}]", self.number),
            Class::ContextSpecific => write!(f, "[{}]", self.number),
            Class::Private => write!(f, "[PRIVATE {}]", self.number),
        }?;
        if self.class != Class::Universal {
            f.write_str(if self.constructed {
                " constructed"
            } else {
                " primitive"
            })?;
        }
        Ok(())
    }
}

/// Identifier and length octets of one TLV unit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Header {
    pub tag: Tag,
    /// Number of identifier plus length octets.
    pub header_len: usize,
    /// Declared length of the value.
    pub length: usize,
}

/// One complete TLV unit, borrowed from the input.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TlvUnit<'a> {
    pub tag: Tag,
    /// Absolute offset of the first identifier octet.
    pub offset: usize,
    pub header_len: usize,
    /// Identifier, length and value octets exactly as they appear in the input.
    pub encoded: &'a [u8],
}

impl<'a> TlvUnit<'a> {
    pub fn value(&self) -> &'a [u8] {
        &self.encoded[self.header_len..]
    }

    pub fn value_offset(&self) -> usize {
        self.offset + self.header_len
    }

    pub fn end(&self) -> usize {
        self.offset + self.encoded.len()
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.end()
    }
}

fn byte_at(input: &[u8], offset: usize) -> Result<u8> {
    input.get(offset).copied().ok_or_else(|| {
        Error::new(
            ErrorKind::TruncatedInput {
                needed: 1,
                remaining: 0,
            },
            offset,
        )
    })
}

/// Decodes the identifier and length octets starting at absolute `offset` of `input`.
///
/// The value octets are not required to be present.
pub fn parse_header(input: &[u8], offset: usize) -> Result<Header> {
    let mut pos = offset;
    let first = byte_at(input, pos)?;
    pos += 1;

    let class = Class::from_bits(first >> 6);
    let constructed = first & 0x20 != 0;
    let mut number = u32::from(first & 0x1f);
    if number == 0x1f {
        number = 0;
        loop {
            let byte = byte_at(input, pos)?;
            if number == 0 && byte == 0x80 {
                return Err(Error::new(ErrorKind::InvalidEncoding("tag number"), pos));
            }
            if number > u32::MAX >> 7 {
                return Err(Error::new(ErrorKind::TagOverflow, offset));
            }
            number = (number << 7) | u32::from(byte & 0x7f);
            pos += 1;
            if byte & 0x80 == 0 {
                break;
            }
        }
        if number < 0x1f {
            return Err(Error::new(ErrorKind::InvalidEncoding("tag number"), offset));
        }
    }

    let length_offset = pos;
    let first = byte_at(input, pos)?;
    pos += 1;
    let length = match first {
        0x00..=0x7f => usize::from(first),
        // Indefinite length is BER only.
        0x80 => return Err(Error::new(ErrorKind::NonCanonicalLength, length_offset)),
        _ => {
            let count = usize::from(first & 0x7f);
            let octets = input.get(pos..pos + count).ok_or_else(|| {
                Error::new(
                    ErrorKind::TruncatedInput {
                        needed: count,
                        remaining: input.len().saturating_sub(pos),
                    },
                    pos,
                )
            })?;
            if octets[0] == 0 {
                return Err(Error::new(ErrorKind::NonCanonicalLength, length_offset));
            }
            if count > core::mem::size_of::<usize>() {
                return Err(Error::new(
                    ErrorKind::TruncatedInput {
                        needed: usize::MAX,
                        remaining: input.len() - (pos + count),
                    },
                    length_offset,
                ));
            }
            let value = octets
                .iter()
                .fold(0usize, |acc, byte| (acc << 8) | usize::from(*byte));
            if value < 0x80 {
                return Err(Error::new(ErrorKind::NonCanonicalLength, length_offset));
            }
            pos += count;
            value
        }
    };

    Ok(Header {
        tag: Tag {
            class,
            constructed,
            number,
        },
        header_len: pos - offset,
        length,
    })
}

/// Decodes only the tag of the next unit.
pub fn peek_tag(cursor: &Cursor<'_>) -> Result<Tag> {
    parse_header(cursor.window(), cursor.position()).map(|header| header.tag)
}

/// Reads the TLV unit at the cursor without moving it.
pub fn peek_tlv<'a>(cursor: &Cursor<'a>) -> Result<TlvUnit<'a>> {
    let offset = cursor.position();
    let header = parse_header(cursor.window(), offset)?;
    let value_offset = offset + header.header_len;
    let remaining = cursor.end() - value_offset;
    if header.length > remaining {
        return Err(Error::new(
            ErrorKind::TruncatedInput {
                needed: header.length,
                remaining,
            },
            offset,
        ));
    }
    let encoded = cursor.slice(offset, header.header_len + header.length)?;
    log::trace!("{} at {offset}, {} value bytes", header.tag, header.length);
    Ok(TlvUnit {
        tag: header.tag,
        offset,
        header_len: header.header_len,
        encoded,
    })
}

/// Reads the TLV unit at the cursor and moves the cursor just past it.
pub fn read_tlv<'a>(cursor: &mut Cursor<'a>) -> Result<TlvUnit<'a>> {
    let unit = peek_tlv(cursor)?;
    cursor.advance_to(unit.end())?;
    Ok(unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_form(tag: u8, length: usize, octets: usize) -> Vec<u8> {
        let mut out = vec![tag, 0x80 | octets as u8];
        out.extend_from_slice(&length.to_be_bytes()[core::mem::size_of::<usize>() - octets..]);
        out
    }

    #[test]
    fn short_form_lengths() {
        for length in 0..=127usize {
            let mut data = vec![0x04, length as u8];
            data.resize(2 + length, 0xaa);
            let mut cursor = Cursor::new(&data);
            let unit = read_tlv(&mut cursor).unwrap();
            assert_eq!(unit.tag, Tag::OCTET_STRING);
            assert_eq!(unit.value().len(), length);
            assert_eq!(unit.value_offset(), 2);
            assert!(cursor.is_empty());
        }
    }

    #[test]
    fn minimal_long_form_lengths() {
        for octets in 1..=4usize {
            let smallest = if octets == 1 { 0x80 } else { 1 << (8 * (octets - 1)) };
            for length in [smallest, (1usize << (8 * octets)) - 1] {
                let data = long_form(0x04, length, octets);
                let header = parse_header(&data, 0).unwrap();
                assert_eq!(header.length, length);
                assert_eq!(header.header_len, 2 + octets);
            }
        }
    }

    #[test]
    fn long_form_with_value_present() {
        let mut data = long_form(0x04, 300, 2);
        data.resize(data.len() + 300, 0x11);
        let mut cursor = Cursor::new(&data);
        let unit = read_tlv(&mut cursor).unwrap();
        assert_eq!(unit.value_offset(), 4);
        assert_eq!(unit.value().len(), 300);
    }

    #[test]
    fn padded_long_form_is_rejected() {
        for octets in 1..=4usize {
            let smallest = if octets == 1 { 0x80 } else { 1 << (8 * (octets - 1)) };
            let mut data = vec![0x04, 0x80 | (octets as u8 + 1), 0x00];
            data.extend_from_slice(&long_form(0x04, smallest, octets)[2..]);
            let err = parse_header(&data, 0).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::NonCanonicalLength);
            assert_eq!(err.offset(), 1);
        }
    }

    #[test]
    fn long_form_for_short_length_is_rejected() {
        let err = parse_header(&[0x04, 0x81, 0x7f], 0).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NonCanonicalLength);
    }

    #[test]
    fn indefinite_length_is_rejected() {
        for tag in [0x30u8, 0xa0, 0x24] {
            let err = parse_header(&[tag, 0x80, 0x00, 0x00], 0).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::NonCanonicalLength);
        }
    }

    #[test]
    fn truncated_value() {
        let data = [0x04, 0x05, 0x01, 0x02, 0x03];
        let mut cursor = Cursor::new(&data);
        let err = read_tlv(&mut cursor).unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::TruncatedInput {
                needed: 5,
                remaining: 3
            }
        );
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn truncated_length_octets() {
        let err = parse_header(&[0x30, 0x82, 0x01], 0).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::TruncatedInput { .. }));
    }

    #[test]
    fn high_tag_numbers() {
        let header = parse_header(&[0x9f, 0x81, 0x00, 0x00], 0).unwrap();
        assert_eq!(header.tag, Tag::context(128, false));
        assert_eq!(header.header_len, 4);

        let max = parse_header(&[0x1f, 0x8f, 0xff, 0xff, 0xff, 0x7f, 0x00], 0).unwrap();
        assert_eq!(max.tag.number, u32::MAX);

        let err = parse_header(&[0x1f, 0x8f, 0xff, 0xff, 0xff, 0xff, 0x7f, 0x00], 0).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TagOverflow);
    }

    #[test]
    fn high_tag_form_must_be_minimal() {
        let padded = parse_header(&[0x1f, 0x80, 0x20, 0x00], 0).unwrap_err();
        assert_eq!(padded.kind(), &ErrorKind::InvalidEncoding("tag number"));
        let small = parse_header(&[0x1f, 0x05, 0x00], 0).unwrap_err();
        assert_eq!(small.kind(), &ErrorKind::InvalidEncoding("tag number"));
    }

    #[test]
    fn identifier_round_trip() {
        for tag in [
            Tag::SEQUENCE,
            Tag::context(0, true),
            Tag::context(31, false),
            Tag::context(4000, true),
            Tag::universal(u32::MAX, false),
        ] {
            let mut data = tag.to_der_identifier();
            data.push(0x00);
            assert_eq!(parse_header(&data, 0).unwrap().tag, tag);
        }
        assert_eq!(Tag::SET.implicit(0).to_der_identifier(), vec![0xa0]);
    }

    #[test]
    fn display() {
        assert_eq!(Tag::SEQUENCE.to_string(), "SEQUENCE");
        assert_eq!(Tag::context(0, true).to_string(), "[0] constructed");
        assert_eq!(Tag::universal(29, false).to_string(), "[UNIVERSAL 29]");
    }
}
