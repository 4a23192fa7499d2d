//! Declarative ASN.1 type descriptions consumed by the [mapper](crate::mapper).
//!
//! Schemas are plain `const` data. A SEQUENCE is an ordered slice of [`FieldSpec`]s; each field
//! names its type, whether it may be absent, how it is re-tagged and whether it holds one value
//! or a SET OF / SEQUENCE OF them.
//!
//! ```
//! use cms_der_decode::schema::{FieldSpec, Primitive, TypeSpec};
//!
//! const OID: TypeSpec = TypeSpec::Primitive(Primitive::ObjectIdentifier);
//! const ALGORITHM_FIELDS: &[FieldSpec] = &[
//!     FieldSpec::new("algorithm", &OID),
//!     FieldSpec::new("parameters", &TypeSpec::Any).optional(),
//! ];
//! const ALGORITHM_IDENTIFIER: TypeSpec = TypeSpec::Sequence(ALGORITHM_FIELDS);
//! ```

use crate::tlv::Tag;

/// Universal types whose content the mapper interprets itself.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Primitive {
    Boolean,
    Integer,
    Null,
    ObjectIdentifier,
    BitString,
    OctetString,
    Utf8String,
    PrintableString,
    TeletexString,
    Ia5String,
    VisibleString,
    BmpString,
    UtcTime,
    GeneralizedTime,
}

impl Primitive {
    pub const fn tag(self) -> Tag {
        match self {
            Primitive::Boolean => Tag::BOOLEAN,
            Primitive::Integer => Tag::INTEGER,
            Primitive::Null => Tag::NULL,
            Primitive::ObjectIdentifier => Tag::OBJECT_IDENTIFIER,
            Primitive::BitString => Tag::BIT_STRING,
            Primitive::OctetString => Tag::OCTET_STRING,
            Primitive::Utf8String => Tag::UTF8_STRING,
            Primitive::PrintableString => Tag::PRINTABLE_STRING,
            Primitive::TeletexString => Tag::TELETEX_STRING,
            Primitive::Ia5String => Tag::IA5_STRING,
            Primitive::VisibleString => Tag::VISIBLE_STRING,
            Primitive::BmpString => Tag::BMP_STRING,
            Primitive::UtcTime => Tag::UTC_TIME,
            Primitive::GeneralizedTime => Tag::GENERALIZED_TIME,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TypeSpec {
    Primitive(Primitive),
    /// Any single TLV, captured raw.
    Any,
    /// A TLV with the given tag, captured raw without looking inside.
    Deferred(Tag),
    Sequence(&'static [FieldSpec]),
    SequenceOf(&'static FieldSpec),
    /// Members may appear in any order.
    SetOf(&'static FieldSpec),
    /// Alternatives are tried in order against the next tag.
    Choice(&'static [FieldSpec]),
}

impl TypeSpec {
    /// The tag an untagged value of this type carries; `None` for `Any` and `Choice`, whose tag
    /// depends on the value.
    pub const fn universal_tag(&self) -> Option<Tag> {
        match self {
            TypeSpec::Primitive(primitive) => Some(primitive.tag()),
            TypeSpec::Deferred(tag) => Some(*tag),
            TypeSpec::Sequence(_) | TypeSpec::SequenceOf(_) => Some(Tag::SEQUENCE),
            TypeSpec::SetOf(_) => Some(Tag::SET),
            TypeSpec::Any | TypeSpec::Choice(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DefaultValue {
    /// Minimal two's-complement content octets.
    Integer(&'static [u8]),
    Boolean(bool),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Optionality {
    Required,
    Optional,
    Default(DefaultValue),
}

/// Context-specific re-tagging of a field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Retag {
    None,
    /// `[n] IMPLICIT`: the wire tag is replaced, the content is encoded as the underlying type.
    Implicit(u32),
    /// `[n] EXPLICIT`: the value is wrapped in one more constructed TLV.
    Explicit(u32),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Multiplicity {
    One,
    SequenceOf,
    SetOf,
}

#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: &'static TypeSpec,
    pub optionality: Optionality,
    pub retag: Retag,
    pub multiplicity: Multiplicity,
}

impl FieldSpec {
    pub const fn new(name: &'static str, ty: &'static TypeSpec) -> Self {
        Self {
            name,
            ty,
            optionality: Optionality::Required,
            retag: Retag::None,
            multiplicity: Multiplicity::One,
        }
    }

    pub const fn optional(mut self) -> Self {
        self.optionality = Optionality::Optional;
        self
    }

    pub const fn default_value(mut self, value: DefaultValue) -> Self {
        self.optionality = Optionality::Default(value);
        self
    }

    pub const fn implicit(mut self, number: u32) -> Self {
        self.retag = Retag::Implicit(number);
        self
    }

    pub const fn explicit(mut self, number: u32) -> Self {
        self.retag = Retag::Explicit(number);
        self
    }

    pub const fn set_of(mut self) -> Self {
        self.multiplicity = Multiplicity::SetOf;
        self
    }

    pub const fn sequence_of(mut self) -> Self {
        self.multiplicity = Multiplicity::SequenceOf;
        self
    }

    /// The same field with one value, no tagging and no optionality: how each member of a
    /// SET OF / SEQUENCE OF field is decoded.
    pub const fn member(&self) -> Self {
        FieldSpec::new(self.name, self.ty)
    }

    /// The field without its re-tagging, as found inside an EXPLICIT wrapper.
    pub const fn untagged(&self) -> Self {
        Self {
            retag: Retag::None,
            ..*self
        }
    }

    /// The tag this field carries on the wire before any re-tagging is applied.
    pub const fn underlying_tag(&self) -> Option<Tag> {
        match self.multiplicity {
            Multiplicity::One => self.ty.universal_tag(),
            Multiplicity::SequenceOf => Some(Tag::SEQUENCE),
            Multiplicity::SetOf => Some(Tag::SET),
        }
    }

    /// The tag this field carries on the wire, or `None` when it is decided by the value
    /// (untagged CHOICE and ANY).
    pub const fn expected_tag(&self) -> Option<Tag> {
        match self.retag {
            Retag::Explicit(number) => Some(Tag::context(number, true)),
            Retag::Implicit(number) => match self.underlying_tag() {
                Some(tag) => Some(tag.implicit(number)),
                None => None,
            },
            Retag::None => self.underlying_tag(),
        }
    }

    /// Whether a value with `tag` belongs to this field.
    pub fn matches(&self, tag: Tag) -> bool {
        match self.expected_tag() {
            Some(expected) => expected == tag,
            None => match (self.retag, self.ty) {
                (Retag::None, TypeSpec::Choice(alternatives)) => {
                    alternatives.iter().any(|alternative| alternative.matches(tag))
                }
                (Retag::None, TypeSpec::Any) => true,
                // IMPLICIT on ANY/CHOICE is not valid ASN.1; match on class and number.
                (Retag::Implicit(number), _) => {
                    tag.class == crate::tlv::Class::ContextSpecific && tag.number == number
                }
                _ => false,
            },
        }
    }

    pub const fn is_required(&self) -> bool {
        matches!(self.optionality, Optionality::Required)
    }
}
