//! The decoded value tree.
//!
//! Every [`DecodedNode`] borrows the input it was decoded from and remembers where its TLV unit
//! starts and how long it is, so any node (decoded or deferred) can be sliced back out of the
//! input byte for byte. Nothing is copied from the input except text that has to be transcoded
//! (TeletexString, BMPString).

use core::fmt;
use core::ops::Range;
use core::time::Duration;
use std::borrow::Cow;

use const_oid::ObjectIdentifier;
use der::DateTime;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::mapper::{self, DecodeConfig};
use crate::schema::{Primitive, TypeSpec};
use crate::tlv::{Tag, TlvUnit};
use crate::{Error, ErrorKind, Result};

/// One decoded value plus the exact bytes it was decoded from.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedNode<'a> {
    input: &'a [u8],
    tag: Tag,
    offset: usize,
    header_len: usize,
    len: usize,
    value: Value<'a>,
    wrapper: Option<RawNode<'a>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value<'a> {
    Boolean(bool),
    Integer(Integer<'a>),
    Null,
    ObjectIdentifier(ObjectIdentifier),
    BitString(BitString<'a>),
    OctetString(&'a [u8]),
    Text(Cow<'a, str>),
    Time(Time),
    /// Fields present on the wire (or substituted DEFAULTs), in schema order.
    Sequence(Vec<(&'static str, DecodedNode<'a>)>),
    SequenceOf(Vec<DecodedNode<'a>>),
    /// Members in wire order.
    SetOf(Vec<DecodedNode<'a>>),
    Choice(&'static str, Box<DecodedNode<'a>>),
    /// Captured without interpretation, see [`DecodedNode::as_raw`].
    Raw,
}

impl<'a> DecodedNode<'a> {
    pub(crate) fn new(input: &'a [u8], unit: &TlvUnit<'a>, value: Value<'a>) -> Self {
        Self {
            input,
            tag: unit.tag,
            offset: unit.offset,
            header_len: unit.header_len,
            len: unit.encoded.len(),
            value,
            wrapper: None,
        }
    }

    /// Records the EXPLICIT tag that enclosed this node.
    pub(crate) fn wrapped(mut self, wrapper: &TlvUnit<'a>) -> Self {
        self.wrapper = Some(RawNode {
            input: self.input,
            tag: wrapper.tag,
            offset: wrapper.offset,
            header_len: wrapper.header_len,
            len: wrapper.encoded.len(),
        });
        self
    }

    /// A DEFAULT value that was absent on the wire; it occupies no bytes at `offset`.
    pub(crate) fn substituted(input: &'a [u8], tag: Tag, offset: usize, value: Value<'a>) -> Self {
        Self {
            input,
            tag,
            offset,
            header_len: 0,
            len: 0,
            value,
            wrapper: None,
        }
    }

    /// The node for a CHOICE field: same bytes as the selected alternative.
    pub(crate) fn chosen(name: &'static str, alternative: DecodedNode<'a>) -> Self {
        Self {
            input: alternative.input,
            tag: alternative.tag,
            offset: alternative.offset,
            header_len: alternative.header_len,
            len: alternative.len,
            wrapper: alternative.wrapper,
            value: Value::Choice(name, Box::new(alternative)),
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn value(&self) -> &Value<'a> {
        &self.value
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }

    /// The identifier, length and value octets exactly as they appear in the input.
    pub fn encoded(&self) -> &'a [u8] {
        &self.input[self.range()]
    }

    pub fn content(&self) -> &'a [u8] {
        &self.input[self.offset + self.header_len..self.offset + self.len]
    }

    /// The `[n]` EXPLICIT tag around this node, when the field was declared with one.
    ///
    /// [`range`](Self::range) covers only the inner value; the wrapper covers the whole field.
    pub fn explicit_wrapper(&self) -> Option<RawNode<'a>> {
        self.wrapper
    }

    /// True for a DEFAULT value that was not present in the encoding.
    pub fn is_default(&self) -> bool {
        self.len == 0
    }

    pub fn as_raw(&self) -> RawNode<'a> {
        RawNode {
            input: self.input,
            tag: self.tag,
            offset: self.offset,
            header_len: self.header_len,
            len: self.len,
        }
    }

    /// Looks up a field of a decoded SEQUENCE; `None` when the field was optional and absent.
    pub fn get(&self, name: &str) -> Option<&DecodedNode<'a>> {
        match &self.value {
            Value::Sequence(fields) => fields
                .iter()
                .find(|(field, _)| *field == name)
                .map(|(_, node)| node),
            _ => None,
        }
    }

    /// Like [`get`](Self::get), for fields the schema guarantees.
    pub fn require(&self, name: &'static str) -> Result<&DecodedNode<'a>> {
        self.get(name)
            .ok_or_else(|| Error::new(ErrorKind::MissingField(name), self.offset))
    }

    fn mismatch(&self, expected: &'static str) -> Error {
        Error::new(ErrorKind::UnexpectedValue(expected), self.offset)
    }

    pub fn boolean(&self) -> Result<bool> {
        match self.value {
            Value::Boolean(value) => Ok(value),
            _ => Err(self.mismatch("a BOOLEAN")),
        }
    }

    pub fn integer(&self) -> Result<Integer<'a>> {
        match self.value {
            Value::Integer(value) => Ok(value),
            _ => Err(self.mismatch("an INTEGER")),
        }
    }

    pub fn oid(&self) -> Result<ObjectIdentifier> {
        match self.value {
            Value::ObjectIdentifier(oid) => Ok(oid),
            _ => Err(self.mismatch("an OBJECT IDENTIFIER")),
        }
    }

    pub fn octets(&self) -> Result<&'a [u8]> {
        match self.value {
            Value::OctetString(bytes) => Ok(bytes),
            _ => Err(self.mismatch("an OCTET STRING")),
        }
    }

    pub fn bit_string(&self) -> Result<BitString<'a>> {
        match self.value {
            Value::BitString(bits) => Ok(bits),
            _ => Err(self.mismatch("a BIT STRING")),
        }
    }

    pub fn text(&self) -> Result<&str> {
        match &self.value {
            Value::Text(text) => Ok(text),
            _ => Err(self.mismatch("a character string")),
        }
    }

    /// The text of a string node, or of the string selected by a CHOICE such as DirectoryString.
    pub fn to_text(&self) -> Result<Cow<'a, str>> {
        match &self.value {
            Value::Text(text) => Ok(text.clone()),
            Value::Choice(_, inner) => inner.to_text(),
            _ => Err(self.mismatch("a character string")),
        }
    }

    pub fn time(&self) -> Result<Time> {
        match &self.value {
            Value::Time(time) => Ok(*time),
            Value::Choice(_, inner) => inner.time(),
            _ => Err(self.mismatch("a UTCTime or GeneralizedTime")),
        }
    }

    /// Members of a SET OF or SEQUENCE OF.
    pub fn items(&self) -> Result<&[DecodedNode<'a>]> {
        match &self.value {
            Value::SetOf(items) | Value::SequenceOf(items) => Ok(items),
            _ => Err(self.mismatch("a SET OF or SEQUENCE OF")),
        }
    }

    /// The selected alternative of a CHOICE.
    pub fn choice(&self) -> Result<(&'static str, &DecodedNode<'a>)> {
        match &self.value {
            Value::Choice(name, inner) => Ok((name, inner)),
            _ => Err(self.mismatch("a CHOICE")),
        }
    }
}

/// A TLV unit kept as bytes, to be interpreted later by whoever needs it.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RawNode<'a> {
    input: &'a [u8],
    tag: Tag,
    offset: usize,
    header_len: usize,
    len: usize,
}

impl<'a> RawNode<'a> {
    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }

    pub fn encoded(&self) -> &'a [u8] {
        &self.input[self.range()]
    }

    pub fn content(&self) -> &'a [u8] {
        &self.input[self.content_range()]
    }

    pub fn content_range(&self) -> Range<usize> {
        self.offset + self.header_len..self.offset + self.len
    }

    /// The buffer this node was captured from.
    pub fn input(&self) -> &'a [u8] {
        self.input
    }

    /// Decodes this unit against `spec`, keeping offsets relative to the original input.
    pub fn reparse(&self, spec: &'static TypeSpec) -> Result<DecodedNode<'a>> {
        self.reparse_with_config(spec, &DecodeConfig::default())
    }

    pub fn reparse_with_config(
        &self,
        spec: &'static TypeSpec,
        config: &DecodeConfig,
    ) -> Result<DecodedNode<'a>> {
        mapper::decode_range(self.input, self.range(), spec, config)
    }

    /// Hands the bytes to a `der`-based decoder, e.g. `x509_cert::Certificate`.
    pub fn decode_as<T: der::Decode<'a>>(&self) -> der::Result<T> {
        T::from_der(self.encoded())
    }
}

impl fmt::Debug for RawNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawNode")
            .field("tag", &self.tag)
            .field("range", &self.range())
            .finish()
    }
}

/// An INTEGER of any size, kept as its minimal big-endian two's-complement content octets.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Integer<'a>(&'a [u8]);

impl<'a> Integer<'a> {
    fn from_content(content: &'a [u8], offset: usize) -> Result<Self> {
        match content {
            [] => Err(Error::new(ErrorKind::InvalidEncoding("INTEGER"), offset)),
            [0x00, next, ..] if next & 0x80 == 0 => {
                Err(Error::new(ErrorKind::InvalidEncoding("INTEGER"), offset))
            }
            [0xff, next, ..] if next & 0x80 != 0 => {
                Err(Error::new(ErrorKind::InvalidEncoding("INTEGER"), offset))
            }
            _ => Ok(Self(content)),
        }
    }

    pub(crate) const fn from_static(content: &'static [u8]) -> Integer<'static> {
        Integer(content)
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0[0] & 0x80 != 0
    }

    /// Unsigned big-endian magnitude of a non-negative value (the sign octet stripped).
    pub fn magnitude(&self) -> &'a [u8] {
        match self.0 {
            [0x00, rest @ ..] if !rest.is_empty() => rest,
            bytes => bytes,
        }
    }

    pub fn to_bigint(&self) -> BigInt {
        BigInt::from_signed_bytes_be(self.0)
    }

    pub fn to_i64(&self) -> Option<i64> {
        self.to_bigint().to_i64()
    }

    pub fn to_u64(&self) -> Option<u64> {
        self.to_bigint().to_u64()
    }
}

impl fmt::Display for Integer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_bigint())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BitString<'a> {
    unused_bits: u8,
    bytes: &'a [u8],
}

impl<'a> BitString<'a> {
    fn from_content(content: &'a [u8], offset: usize) -> Result<Self> {
        let invalid = || Error::new(ErrorKind::InvalidEncoding("BIT STRING"), offset);
        let (&unused_bits, bytes) = content.split_first().ok_or_else(invalid)?;
        if unused_bits > 7 || (bytes.is_empty() && unused_bits != 0) {
            return Err(invalid());
        }
        // DER: padding bits are zero.
        if let Some(last) = bytes.last() {
            if last & ((1u8 << unused_bits) - 1) != 0 {
                return Err(invalid());
            }
        }
        Ok(Self { unused_bits, bytes })
    }

    pub fn unused_bits(&self) -> u8 {
        self.unused_bits
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn bit_len(&self) -> usize {
        self.bytes.len() * 8 - usize::from(self.unused_bits)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TimeKind {
    Utc,
    Generalized,
}

/// A UTCTime or GeneralizedTime, always in UTC.
///
/// The instant is held as a [`DateTime`], which starts at 1970. UTCTime years 50 to 69 and any
/// earlier GeneralizedTime are rejected with [`ErrorKind::InvalidTime`] even though they are well
/// formed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Time {
    kind: TimeKind,
    date_time: DateTime,
    nanos: u32,
}

impl Time {
    pub fn kind(&self) -> TimeKind {
        self.kind
    }

    pub fn date_time(&self) -> DateTime {
        self.date_time
    }

    pub fn subsec_nanos(&self) -> u32 {
        self.nanos
    }

    pub fn unix_duration(&self) -> Duration {
        self.date_time.unix_duration() + Duration::from_nanos(u64::from(self.nanos))
    }

    fn parse_utc(content: &[u8], offset: usize) -> Result<Self> {
        let invalid = || Error::new(ErrorKind::InvalidTime, offset);
        // YYMMDDHHMMSSZ
        if content.len() != 13 || content[12] != b'Z' {
            return Err(invalid());
        }
        let yy = two_digits(&content[0..2]).ok_or_else(invalid)?;
        let year = if yy >= 50 { 1900 } else { 2000 } + u16::from(yy);
        let date_time = date_time(year, &content[2..12]).ok_or_else(invalid)?;
        Ok(Self {
            kind: TimeKind::Utc,
            date_time,
            nanos: 0,
        })
    }

    fn parse_generalized(content: &[u8], offset: usize) -> Result<Self> {
        let invalid = || Error::new(ErrorKind::InvalidTime, offset);
        // YYYYMMDDHHMMSS[.f*]Z
        let body = match content.split_last() {
            Some((b'Z', body)) if body.len() >= 14 => body,
            _ => return Err(invalid()),
        };
        let century = two_digits(&body[0..2]).ok_or_else(invalid)?;
        let yy = two_digits(&body[2..4]).ok_or_else(invalid)?;
        let year = u16::from(century) * 100 + u16::from(yy);
        let date_time = date_time(year, &body[4..14]).ok_or_else(invalid)?;

        let nanos = match &body[14..] {
            [] => 0,
            [b'.', fraction @ ..] => {
                if fraction.is_empty()
                    || fraction.last() == Some(&b'0')
                    || !fraction.iter().all(u8::is_ascii_digit)
                {
                    return Err(invalid());
                }
                let mut nanos = 0u32;
                for position in 0..9 {
                    let digit = fraction.get(position).map_or(0, |d| u32::from(d - b'0'));
                    nanos = nanos * 10 + digit;
                }
                nanos
            }
            _ => return Err(invalid()),
        };

        Ok(Self {
            kind: TimeKind::Generalized,
            date_time,
            nanos,
        })
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date_time)
    }
}

fn two_digits(pair: &[u8]) -> Option<u8> {
    match pair {
        [a, b] if a.is_ascii_digit() && b.is_ascii_digit() => Some((a - b'0') * 10 + (b - b'0')),
        _ => None,
    }
}

/// `MMDDHHMMSS` after the year.
fn date_time(year: u16, rest: &[u8]) -> Option<DateTime> {
    let mut fields = [0u8; 5];
    for (field, pair) in fields.iter_mut().zip(rest.chunks(2)) {
        *field = two_digits(pair)?;
    }
    let [month, day, hour, minutes, seconds] = fields;
    DateTime::new(year, month, day, hour, minutes, seconds).ok()
}

fn decode_text<'a>(primitive: Primitive, content: &'a [u8], offset: usize) -> Result<Cow<'a, str>> {
    let ascii = |allowed: fn(&u8) -> bool, name: &'static str| -> Result<Cow<'a, str>> {
        if content.iter().all(allowed) {
            // All bytes are ASCII here, so this cannot fail.
            core::str::from_utf8(content)
                .map(Cow::Borrowed)
                .map_err(|_| Error::new(ErrorKind::InvalidStringEncoding(name), offset))
        } else {
            Err(Error::new(ErrorKind::InvalidStringEncoding(name), offset))
        }
    };

    match primitive {
        Primitive::Utf8String => core::str::from_utf8(content)
            .map(Cow::Borrowed)
            .map_err(|_| Error::new(ErrorKind::InvalidUtf8, offset)),
        Primitive::PrintableString => ascii(is_printable, "PrintableString"),
        Primitive::Ia5String => ascii(u8::is_ascii, "IA5String"),
        Primitive::VisibleString => ascii(|b| (0x20..=0x7e).contains(b), "VisibleString"),
        // Treated as Latin-1, which covers what shows up in practice.
        Primitive::TeletexString => Ok(Cow::Owned(content.iter().map(|&b| char::from(b)).collect())),
        Primitive::BmpString => {
            if content.len() % 2 != 0 {
                return Err(Error::new(
                    ErrorKind::InvalidStringEncoding("BMPString"),
                    offset,
                ));
            }
            let units = content
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
            char::decode_utf16(units)
                .collect::<core::result::Result<String, _>>()
                .map(Cow::Owned)
                .map_err(|_| Error::new(ErrorKind::InvalidStringEncoding("BMPString"), offset))
        }
        _ => Err(Error::new(ErrorKind::UnexpectedValue("a string type"), offset)),
    }
}

fn is_printable(byte: &u8) -> bool {
    byte.is_ascii_alphanumeric() || b" '()+,-./:=?".contains(byte)
}

/// Interprets the content octets of a primitive unit.
pub(crate) fn decode_primitive<'a>(primitive: Primitive, unit: &TlvUnit<'a>) -> Result<Value<'a>> {
    let content = unit.value();
    let offset = unit.value_offset();
    Ok(match primitive {
        Primitive::Boolean => match content {
            [0x00] => Value::Boolean(false),
            [0xff] => Value::Boolean(true),
            _ => return Err(Error::new(ErrorKind::InvalidEncoding("BOOLEAN"), offset)),
        },
        Primitive::Integer => Value::Integer(Integer::from_content(content, offset)?),
        Primitive::Null => {
            if !content.is_empty() {
                return Err(Error::new(ErrorKind::InvalidEncoding("NULL"), offset));
            }
            Value::Null
        }
        Primitive::ObjectIdentifier => Value::ObjectIdentifier(
            ObjectIdentifier::from_bytes(content)
                .map_err(|_| Error::new(ErrorKind::InvalidEncoding("OBJECT IDENTIFIER"), offset))?,
        ),
        Primitive::BitString => Value::BitString(BitString::from_content(content, offset)?),
        Primitive::OctetString => Value::OctetString(content),
        Primitive::UtcTime => Value::Time(Time::parse_utc(content, offset)?),
        Primitive::GeneralizedTime => Value::Time(Time::parse_generalized(content, offset)?),
        Primitive::Utf8String
        | Primitive::PrintableString
        | Primitive::TeletexString
        | Primitive::Ia5String
        | Primitive::VisibleString
        | Primitive::BmpString => Value::Text(decode_text(primitive, content, offset)?),
    })
}
