//! The parts of an X.509 certificate needed to match it to a signer.
//!
//! This is not a certificate validator: names, validity and extensions are exposed as decoded,
//! without any path or policy checks. Use [`CertificateChoice::to_x509`] to get a full
//! `x509_cert::Certificate` instead.
//!
//! [`CertificateChoice::to_x509`]: crate::signed_data::CertificateChoice::to_x509

use std::borrow::Cow;

use const_oid::db::rfc4519::CN;
use const_oid::db::rfc5280::ID_CE_SUBJECT_KEY_IDENTIFIER;
use const_oid::ObjectIdentifier;

use crate::asn1::{CERTIFICATE, DIRECTORY_STRING, OCTET_STRING};
use crate::mapper;
use crate::node::{BitString, DecodedNode, Integer, RawNode, Time};
use crate::signed_data::AlgorithmIdentifier;
use crate::Result;

#[derive(Clone, Debug)]
pub struct Certificate<'a> {
    raw: RawNode<'a>,
    tbs_certificate: RawNode<'a>,
    version: Integer<'a>,
    serial_number: Integer<'a>,
    signature: AlgorithmIdentifier<'a>,
    issuer: Name<'a>,
    validity: Validity,
    subject: Name<'a>,
    public_key_algorithm: AlgorithmIdentifier<'a>,
    public_key: BitString<'a>,
    extensions: Vec<Extension<'a>>,
    signature_algorithm: AlgorithmIdentifier<'a>,
    signature_value: BitString<'a>,
}

impl<'a> Certificate<'a> {
    /// Decodes a DER certificate that makes up the whole of `input`.
    pub fn from_der(input: &'a [u8]) -> Result<Self> {
        Self::from_node(&mapper::decode(input, &CERTIFICATE)?)
    }

    pub(crate) fn from_raw(raw: RawNode<'a>) -> Result<Self> {
        Self::from_node(&raw.reparse(&CERTIFICATE)?)
    }

    fn from_node(node: &DecodedNode<'a>) -> Result<Self> {
        let tbs = node.require("tbsCertificate")?;
        let validity = tbs.require("validity")?;
        let spki = tbs.require("subjectPublicKeyInfo")?;
        let extensions = match tbs.get("extensions") {
            Some(extensions) => extensions
                .items()?
                .iter()
                .map(Extension::from_node)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            raw: node.as_raw(),
            tbs_certificate: tbs.as_raw(),
            version: tbs.require("version")?.integer()?,
            serial_number: tbs.require("serialNumber")?.integer()?,
            signature: AlgorithmIdentifier::from_node(tbs.require("signature")?)?,
            issuer: Name::from_node(tbs.require("issuer")?)?,
            validity: Validity {
                not_before: validity.require("notBefore")?.time()?,
                not_after: validity.require("notAfter")?.time()?,
            },
            subject: Name::from_node(tbs.require("subject")?)?,
            public_key_algorithm: AlgorithmIdentifier::from_node(spki.require("algorithm")?)?,
            public_key: spki.require("subjectPublicKey")?.bit_string()?,
            extensions,
            signature_algorithm: AlgorithmIdentifier::from_node(
                node.require("signatureAlgorithm")?,
            )?,
            signature_value: node.require("signatureValue")?.bit_string()?,
        })
    }

    pub fn raw(&self) -> RawNode<'a> {
        self.raw
    }

    /// The signed part of the certificate, as encoded.
    pub fn tbs_certificate(&self) -> RawNode<'a> {
        self.tbs_certificate
    }

    /// 0 for v1 (also when the field is absent), 2 for v3.
    pub fn version(&self) -> Integer<'a> {
        self.version
    }

    pub fn serial_number(&self) -> Integer<'a> {
        self.serial_number
    }

    /// The `signature` field inside TBSCertificate.
    pub fn signature(&self) -> &AlgorithmIdentifier<'a> {
        &self.signature
    }

    pub fn issuer(&self) -> &Name<'a> {
        &self.issuer
    }

    /// Validity dates before 1970 fail to decode, see [`Time`].
    pub fn validity(&self) -> &Validity {
        &self.validity
    }

    pub fn subject(&self) -> &Name<'a> {
        &self.subject
    }

    pub fn public_key_algorithm(&self) -> &AlgorithmIdentifier<'a> {
        &self.public_key_algorithm
    }

    pub fn public_key(&self) -> BitString<'a> {
        self.public_key
    }

    pub fn extensions(&self) -> &[Extension<'a>] {
        &self.extensions
    }

    pub fn extension(&self, oid: ObjectIdentifier) -> Option<&Extension<'a>> {
        self.extensions.iter().find(|extension| extension.oid == oid)
    }

    pub fn signature_algorithm(&self) -> &AlgorithmIdentifier<'a> {
        &self.signature_algorithm
    }

    pub fn signature_value(&self) -> BitString<'a> {
        self.signature_value
    }

    /// The key identifier from the subjectKeyIdentifier extension.
    pub fn subject_key_identifier(&self) -> Result<Option<&'a [u8]>> {
        match self.extension(ID_CE_SUBJECT_KEY_IDENTIFIER) {
            Some(extension) => {
                let value = extension.value;
                Ok(Some(mapper::decode(value, &OCTET_STRING)?.octets()?))
            }
            None => Ok(None),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Validity {
    pub not_before: Time,
    pub not_after: Time,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Extension<'a> {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// The extnValue octets, i.e. the DER encoding of the extension's own type.
    pub value: &'a [u8],
}

impl<'a> Extension<'a> {
    pub(crate) fn from_node(node: &DecodedNode<'a>) -> Result<Self> {
        Ok(Self {
            oid: node.require("extnID")?.oid()?,
            critical: node.require("critical")?.boolean()?,
            value: node.require("extnValue")?.octets()?,
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AttributeTypeAndValue<'a> {
    pub oid: ObjectIdentifier,
    pub value: RawNode<'a>,
}

impl<'a> AttributeTypeAndValue<'a> {
    /// The value read as a DirectoryString.
    pub fn text(&self) -> Result<Cow<'a, str>> {
        self.value.reparse(&DIRECTORY_STRING)?.to_text()
    }
}

/// A distinguished name: a sequence of relative distinguished names.
#[derive(Clone, Debug)]
pub struct Name<'a> {
    raw: RawNode<'a>,
    rdns: Vec<Vec<AttributeTypeAndValue<'a>>>,
}

impl<'a> Name<'a> {
    fn from_node(node: &DecodedNode<'a>) -> Result<Self> {
        let rdns = node
            .items()?
            .iter()
            .map(|rdn| {
                rdn.items()?
                    .iter()
                    .map(|atav| -> Result<AttributeTypeAndValue<'a>> {
                        Ok(AttributeTypeAndValue {
                            oid: atav.require("type")?.oid()?,
                            value: atav.require("value")?.as_raw(),
                        })
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            raw: node.as_raw(),
            rdns,
        })
    }

    /// The Name as encoded; this is what issuer comparisons use.
    pub fn raw(&self) -> RawNode<'a> {
        self.raw
    }

    pub fn rdns(&self) -> &[Vec<AttributeTypeAndValue<'a>>] {
        &self.rdns
    }

    pub fn attributes(&self) -> impl Iterator<Item = &AttributeTypeAndValue<'a>> {
        self.rdns.iter().flatten()
    }

    /// The first commonName attribute.
    pub fn common_name(&self) -> Result<Option<Cow<'a, str>>> {
        self.attributes()
            .find(|atav| atav.oid == CN)
            .map(AttributeTypeAndValue::text)
            .transpose()
    }
}
