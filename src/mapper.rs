//! Schema-driven structural decoding.
//!
//! The mapper walks a [`TypeSpec`] and the TLV stream side by side. For each SEQUENCE field it
//! peeks at the next tag to decide whether the field is present, substitutes DEFAULT values for
//! absent fields, unwraps EXPLICIT tags, treats IMPLICIT tags as the underlying type and selects
//! CHOICE alternatives by tag. Raw captures (`Any`, `Deferred`) are not looked into.
//!
//! Decoding fails on the first problem; a failed decode never yields a partial tree.

use core::ops::Range;

use log::{debug, trace};

use crate::cursor::Cursor;
use crate::node::{self, DecodedNode, Integer, Value};
use crate::schema::{DefaultValue, FieldSpec, Multiplicity, Optionality, Retag, TypeSpec};
use crate::tlv::{self, Tag, TlvUnit};
use crate::{Error, ErrorKind, Result};

pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Limits applied while decoding.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecodeConfig {
    /// Maximum number of nested constructed values.
    pub max_depth: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Decodes the whole of `input` as one value of type `spec`.
pub fn decode<'a>(input: &'a [u8], spec: &'static TypeSpec) -> Result<DecodedNode<'a>> {
    decode_with_config(input, spec, &DecodeConfig::default())
}

pub fn decode_with_config<'a>(
    input: &'a [u8],
    spec: &'static TypeSpec,
    config: &DecodeConfig,
) -> Result<DecodedNode<'a>> {
    decode_range(input, 0..input.len(), spec, config)
}

/// Decodes `input[range]` as exactly one value of type `spec`. Offsets in the result and in
/// errors are relative to the start of `input`.
pub fn decode_range<'a>(
    input: &'a [u8],
    range: Range<usize>,
    spec: &'static TypeSpec,
    config: &DecodeConfig,
) -> Result<DecodedNode<'a>> {
    let mut cursor = Cursor::new(input).nested(range.start, range.end)?;
    let mut mapper = Mapper {
        input,
        config,
        depth: 0,
    };
    let node = mapper.decode_field(&mut cursor, &FieldSpec::new("", spec))?;
    if !cursor.is_empty() {
        return Err(Error::new(
            ErrorKind::TrailingData {
                remaining: cursor.remaining(),
            },
            cursor.position(),
        ));
    }
    Ok(node)
}

struct Mapper<'a, 'c> {
    input: &'a [u8],
    config: &'c DecodeConfig,
    depth: usize,
}

impl<'a> Mapper<'a, '_> {
    /// Decodes the next value of `field`, which must be present.
    fn decode_field(&mut self, cursor: &mut Cursor<'a>, field: &FieldSpec) -> Result<DecodedNode<'a>> {
        if let (Retag::None, Multiplicity::One, TypeSpec::Choice(alternatives)) =
            (field.retag, field.multiplicity, field.ty)
        {
            return self.decode_choice(cursor, alternatives);
        }

        let unit = tlv::peek_tlv(cursor)?;
        if !field.matches(unit.tag) {
            return Err(mismatch(field, unit.tag, unit.offset));
        }
        cursor.advance_to(unit.end())?;

        match field.retag {
            Retag::Explicit(_) => self.descend(&unit, |mapper, inner| {
                if inner.is_empty() {
                    return Err(Error::new(
                        ErrorKind::MissingField(field.name),
                        inner.position(),
                    ));
                }
                let node = mapper.decode_field(inner, &field.untagged())?;
                if !inner.is_empty() {
                    return Err(Error::new(
                        ErrorKind::TrailingData {
                            remaining: inner.remaining(),
                        },
                        inner.position(),
                    ));
                }
                Ok(node.wrapped(&unit))
            }),
            Retag::Implicit(_) | Retag::None => {
                let value = match field.multiplicity {
                    Multiplicity::One => self.decode_content(&unit, field.ty)?,
                    Multiplicity::SequenceOf => {
                        Value::SequenceOf(self.decode_members(&unit, &field.member())?)
                    }
                    Multiplicity::SetOf => Value::SetOf(self.decode_members(&unit, &field.member())?),
                };
                Ok(DecodedNode::new(self.input, &unit, value))
            }
        }
    }

    /// Interprets the value octets of `unit` as `ty`; the tag has already been checked.
    fn decode_content(&mut self, unit: &TlvUnit<'a>, ty: &'static TypeSpec) -> Result<Value<'a>> {
        match ty {
            TypeSpec::Primitive(primitive) => node::decode_primitive(*primitive, unit),
            TypeSpec::Any | TypeSpec::Deferred(_) => {
                trace!("captured {} at {} raw", unit.tag, unit.offset);
                Ok(Value::Raw)
            }
            TypeSpec::Sequence(fields) => Ok(Value::Sequence(
                self.descend(unit, |mapper, inner| mapper.decode_sequence(inner, *fields))?,
            )),
            TypeSpec::SequenceOf(member) => Ok(Value::SequenceOf(self.decode_members(unit, member)?)),
            TypeSpec::SetOf(member) => Ok(Value::SetOf(self.decode_members(unit, member)?)),
            // Only reachable through an IMPLICIT tag on a CHOICE, which ASN.1 forbids.
            TypeSpec::Choice(_) => Err(Error::new(
                ErrorKind::UnexpectedValue("an untagged CHOICE"),
                unit.offset,
            )),
        }
    }

    fn decode_sequence(
        &mut self,
        inner: &mut Cursor<'a>,
        fields: &'static [FieldSpec],
    ) -> Result<Vec<(&'static str, DecodedNode<'a>)>> {
        let mut decoded = Vec::with_capacity(fields.len());
        for field in fields {
            let found = if inner.is_empty() {
                None
            } else {
                Some(tlv::peek_tag(inner).map_err(|e| e.in_field(field.name))?)
            };

            if let Some(tag) = found.filter(|tag| field.matches(*tag)) {
                let node = self
                    .decode_field(inner, field)
                    .map_err(|e| e.in_field(field.name))?;
                if let Optionality::Default(default) = field.optionality {
                    if holds_default(&node, default) {
                        debug!("field `{}` explicitly encodes its DEFAULT value", field.name);
                    }
                }
                trace!("field `{}` decoded as {tag} at {}", field.name, node.offset());
                decoded.push((field.name, node));
                continue;
            }

            match field.optionality {
                Optionality::Required => {
                    let err = match found {
                        Some(tag) => mismatch(field, tag, inner.position()),
                        None => Error::new(ErrorKind::MissingField(field.name), inner.position()),
                    };
                    return Err(err.in_field(field.name));
                }
                Optionality::Optional => {
                    trace!("optional field `{}` absent", field.name);
                }
                Optionality::Default(default) => {
                    debug!("field `{}` absent, using its DEFAULT value", field.name);
                    decoded.push((field.name, self.default_node(default, inner.position())));
                }
            }
        }

        if !inner.is_empty() {
            return Err(Error::new(
                ErrorKind::TrailingData {
                    remaining: inner.remaining(),
                },
                inner.position(),
            ));
        }
        Ok(decoded)
    }

    /// Members of a SET OF or SEQUENCE OF, in wire order. DER sorts SET OF members, but the
    /// order is not checked: real signers do not always get it right.
    fn decode_members(&mut self, unit: &TlvUnit<'a>, member: &FieldSpec) -> Result<Vec<DecodedNode<'a>>> {
        self.descend(unit, |mapper, inner| {
            let mut members = Vec::new();
            while !inner.is_empty() {
                let node = mapper
                    .decode_field(inner, member)
                    .map_err(|e| e.in_field(member.name))?;
                members.push(node);
            }
            Ok(members)
        })
    }

    fn decode_choice(
        &mut self,
        cursor: &mut Cursor<'a>,
        alternatives: &'static [FieldSpec],
    ) -> Result<DecodedNode<'a>> {
        let position = cursor.position();
        let tag = tlv::peek_tag(cursor)?;
        let alternative = alternatives
            .iter()
            .find(|alternative| alternative.matches(tag))
            .ok_or_else(|| Error::new(ErrorKind::NoMatchingChoice { found: tag }, position))?;
        debug!("CHOICE alternative `{}` selected by {tag}", alternative.name);
        let node = self
            .decode_field(cursor, alternative)
            .map_err(|e| e.in_field(alternative.name))?;
        Ok(DecodedNode::chosen(alternative.name, node))
    }

    /// Runs `f` over the value octets of the constructed `unit`, one level deeper.
    fn descend<T>(
        &mut self,
        unit: &TlvUnit<'a>,
        f: impl FnOnce(&mut Self, &mut Cursor<'a>) -> Result<T>,
    ) -> Result<T> {
        if self.depth >= self.config.max_depth {
            return Err(Error::new(
                ErrorKind::NestingTooDeep {
                    limit: self.config.max_depth,
                },
                unit.offset,
            ));
        }
        let mut inner = Cursor::new(self.input).nested(unit.value_offset(), unit.end())?;
        self.depth += 1;
        let result = f(self, &mut inner);
        self.depth -= 1;
        result
    }

    fn default_node(&self, default: DefaultValue, offset: usize) -> DecodedNode<'a> {
        let (tag, value) = match default {
            DefaultValue::Integer(bytes) => (Tag::INTEGER, Value::Integer(Integer::from_static(bytes))),
            DefaultValue::Boolean(flag) => (Tag::BOOLEAN, Value::Boolean(flag)),
        };
        DecodedNode::substituted(self.input, tag, offset, value)
    }
}

fn mismatch(field: &FieldSpec, found: Tag, offset: usize) -> Error {
    match field.expected_tag() {
        Some(expected) => Error::new(ErrorKind::UnexpectedTag { expected, found }, offset),
        None => Error::new(ErrorKind::NoMatchingChoice { found }, offset),
    }
}

fn holds_default(node: &DecodedNode<'_>, default: DefaultValue) -> bool {
    match (node.value(), default) {
        (Value::Integer(value), DefaultValue::Integer(bytes)) => value.as_bytes() == bytes,
        (Value::Boolean(value), DefaultValue::Boolean(flag)) => *value == flag,
        _ => false,
    }
}
