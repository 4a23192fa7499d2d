//! Error types shared by every decoding stage.

use const_oid::ObjectIdentifier;
use thiserror::Error;

use crate::tlv::Tag;

pub type Result<T> = std::result::Result<T, Error>;

/// A decode failure, with the absolute byte offset at which it was detected and the innermost
/// schema field that was being decoded at the time.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("{kind} at offset {offset}{}", field_suffix(.field))]
pub struct Error {
    kind: ErrorKind,
    offset: usize,
    field: Option<&'static str>,
}

fn field_suffix(field: &Option<&'static str>) -> String {
    match field {
        Some(name) => format!(" (field `{name}`)"),
        None => String::new(),
    }
}

impl Error {
    pub fn new(kind: ErrorKind, offset: usize) -> Self {
        Self {
            kind,
            offset,
            field: None,
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Name of the innermost schema field being decoded when the error occurred.
    pub fn field(&self) -> Option<&'static str> {
        self.field
    }

    /// Attaches a field name unless a more specific (inner) one is already recorded.
    pub(crate) fn in_field(mut self, name: &'static str) -> Self {
        if self.field.is_none() {
            self.field = Some(name);
        }
        self
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    #[error("range of {length} bytes extends past the end of the input")]
    OutOfBounds { length: usize },
    #[error("declared length {needed} exceeds the {remaining} bytes remaining")]
    TruncatedInput { needed: usize, remaining: usize },
    #[error("tag number does not fit in 32 bits")]
    TagOverflow,
    #[error("length is not in minimal definite form")]
    NonCanonicalLength,
    #[error("expected {expected}, found {found}")]
    UnexpectedTag { expected: Tag, found: Tag },
    #[error("no CHOICE alternative matches {found}")]
    NoMatchingChoice { found: Tag },
    #[error("{remaining} unconsumed bytes after the last field")]
    TrailingData { remaining: usize },
    #[error("nesting exceeds {limit} levels")]
    NestingTooDeep { limit: usize },
    #[error("string is not valid UTF-8")]
    InvalidUtf8,
    #[error("{0} contains characters outside its character set")]
    InvalidStringEncoding(&'static str),
    #[error("required field `{0}` is missing")]
    MissingField(&'static str),
    #[error("invalid {0} encoding")]
    InvalidEncoding(&'static str),
    #[error("decoded value is not {0}")]
    UnexpectedValue(&'static str),
    #[error("invalid UTCTime or GeneralizedTime value")]
    InvalidTime,
    #[error("signer digest algorithm {0} is not listed in digestAlgorithms")]
    DigestAlgorithmMismatch(ObjectIdentifier),
    #[error("unsupported content type {0}")]
    UnsupportedContentType(ObjectIdentifier),
    #[error("malformed ContentInfo")]
    MalformedContentInfo(#[source] Box<Error>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_offset_and_field() {
        let err = Error::new(ErrorKind::MissingField("signature"), 42).in_field("signature");
        assert_eq!(
            err.to_string(),
            "required field `signature` is missing at offset 42 (field `signature`)"
        );
    }

    #[test]
    fn innermost_field_wins() {
        let err = Error::new(ErrorKind::InvalidTime, 7)
            .in_field("signingTime")
            .in_field("signedAttrs");
        assert_eq!(err.field(), Some("signingTime"));
    }
}
