//! SignerInfo, its attributes and what an external verifier needs to check a signature.

use core::ops::Range;

use const_oid::db::rfc5911::{ID_CONTENT_TYPE, ID_MESSAGE_DIGEST};
use const_oid::db::rfc5912::{
    ID_SHA_1, ID_SHA_224, ID_SHA_256, ID_SHA_384, ID_SHA_512, RSA_ENCRYPTION,
    SHA_1_WITH_RSA_ENCRYPTION, SHA_224_WITH_RSA_ENCRYPTION, SHA_256_WITH_RSA_ENCRYPTION,
    SHA_384_WITH_RSA_ENCRYPTION, SHA_512_WITH_RSA_ENCRYPTION,
};
use const_oid::ObjectIdentifier;
use log::debug;

use crate::asn1::{OBJECT_IDENTIFIER, OCTET_STRING};
use crate::cert::Certificate;
use crate::mapper::DecodeConfig;
use crate::node::{DecodedNode, Integer, RawNode};
use crate::signed_data::{AlgorithmIdentifier, EncapsulatedContentInfo, SignedData};
use crate::tlv::Tag;
use crate::{Error, ErrorKind, Result};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SignerIdentifier<'a> {
    IssuerAndSerialNumber {
        /// The issuer Name, encoded.
        issuer: RawNode<'a>,
        serial_number: Integer<'a>,
    },
    SubjectKeyIdentifier(&'a [u8]),
}

impl<'a> SignerIdentifier<'a> {
    fn from_node(node: &DecodedNode<'a>) -> Result<Self> {
        match node.choice()? {
            ("issuerAndSerialNumber", inner) => Ok(SignerIdentifier::IssuerAndSerialNumber {
                issuer: inner.require("issuer")?.as_raw(),
                serial_number: inner.require("serialNumber")?.integer()?,
            }),
            (_, inner) => Ok(SignerIdentifier::SubjectKeyIdentifier(inner.octets()?)),
        }
    }

    /// Whether `certificate` is the one this identifier names. Issuers are compared by their DER
    /// encoding.
    pub fn matches(&self, certificate: &Certificate<'_>) -> Result<bool> {
        match self {
            SignerIdentifier::IssuerAndSerialNumber {
                issuer,
                serial_number,
            } => Ok(certificate.serial_number().as_bytes() == serial_number.as_bytes()
                && certificate.issuer().raw().encoded() == issuer.encoded()),
            SignerIdentifier::SubjectKeyIdentifier(key_id) => {
                Ok(certificate.subject_key_identifier()? == Some(*key_id))
            }
        }
    }
}

/// One Attribute: a type and its values, each left encoded.
#[derive(Clone, Debug)]
pub struct Attribute<'a> {
    oid: ObjectIdentifier,
    values: Vec<RawNode<'a>>,
    raw: RawNode<'a>,
}

impl<'a> Attribute<'a> {
    fn from_node(node: &DecodedNode<'a>) -> Result<Self> {
        Ok(Self {
            oid: node.require("attrType")?.oid()?,
            values: node
                .require("attrValues")?
                .items()?
                .iter()
                .map(DecodedNode::as_raw)
                .collect(),
            raw: node.as_raw(),
        })
    }

    pub fn oid(&self) -> ObjectIdentifier {
        self.oid
    }

    pub fn values(&self) -> &[RawNode<'a>] {
        &self.values
    }

    pub fn raw(&self) -> RawNode<'a> {
        self.raw
    }

    /// The value of an attribute that must have exactly one.
    pub fn single_value(&self) -> Result<RawNode<'a>> {
        match self.values.as_slice() {
            [value] => Ok(*value),
            _ => Err(Error::new(
                ErrorKind::UnexpectedValue("a single-valued attribute"),
                self.raw.offset(),
            )),
        }
    }
}

/// A `[0]` or `[1]` IMPLICIT SET OF Attribute.
#[derive(Clone, Debug)]
pub struct Attributes<'a> {
    raw: RawNode<'a>,
    attributes: Vec<Attribute<'a>>,
}

impl<'a> Attributes<'a> {
    fn from_node(node: &DecodedNode<'a>) -> Result<Self> {
        Ok(Self {
            raw: node.as_raw(),
            attributes: node
                .items()?
                .iter()
                .map(Attribute::from_node)
                .collect::<Result<Vec<_>>>()?,
        })
    }

    /// The attribute set as it appears in the input, with its context tag.
    pub fn raw(&self) -> RawNode<'a> {
        self.raw
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute<'a>> {
        self.attributes.iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// The first attribute of type `oid`.
    pub fn get(&self, oid: ObjectIdentifier) -> Option<&Attribute<'a>> {
        self.attributes.iter().find(|attribute| attribute.oid == oid)
    }

    /// The same bytes re-tagged as a universal SET, which is what the signature covers
    /// (RFC 5652 section 5.4).
    pub fn to_signed_der(&self) -> Vec<u8> {
        let encoded = self.raw.encoded();
        let identifier_len = self.raw.tag().to_der_identifier().len();
        let mut der = Tag::SET.to_der_identifier();
        der.extend_from_slice(&encoded[identifier_len..]);
        der
    }
}

/// The bytes a signer's signature was computed over.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SignedBytes<'a> {
    /// Signed attributes are present. `der` is the `[0]` encoding found at `range` with its tag
    /// replaced by SET; the message digest attribute binds the content.
    Attributes { range: Range<usize>, der: Vec<u8> },
    /// No signed attributes: the eContent octets are signed directly.
    Content(&'a [u8]),
    /// No signed attributes and no eContent; the content has to come from elsewhere.
    Detached,
}

impl SignedBytes<'_> {
    /// The bytes to verify, when they are available from the input.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SignedBytes::Attributes { der, .. } => Some(der),
            SignedBytes::Content(content) => Some(content),
            SignedBytes::Detached => None,
        }
    }
}

/// Everything a signature verifier needs, taken from one SignerInfo.
#[derive(Clone, Debug)]
pub struct SignatureInput<'a> {
    pub signed: SignedBytes<'a>,
    pub signature: &'a [u8],
    pub digest_algorithm: AlgorithmIdentifier<'a>,
    pub signature_algorithm: AlgorithmIdentifier<'a>,
}

impl SignatureInput<'_> {
    /// The signature algorithm to verify with.
    ///
    /// Some signers put bare rsaEncryption in `signatureAlgorithm`; that is combined with the
    /// digest algorithm into the matching `shaNNNWithRSAEncryption`. Anything else is returned
    /// unchanged.
    pub fn effective_signature_algorithm(&self) -> ObjectIdentifier {
        let signature = self.signature_algorithm.oid();
        if signature != RSA_ENCRYPTION {
            return signature;
        }
        let digest = self.digest_algorithm.oid();
        let combined = [
            (ID_SHA_1, SHA_1_WITH_RSA_ENCRYPTION),
            (ID_SHA_224, SHA_224_WITH_RSA_ENCRYPTION),
            (ID_SHA_256, SHA_256_WITH_RSA_ENCRYPTION),
            (ID_SHA_384, SHA_384_WITH_RSA_ENCRYPTION),
            (ID_SHA_512, SHA_512_WITH_RSA_ENCRYPTION),
        ]
        .into_iter()
        .find(|(hash, _)| *hash == digest);
        match combined {
            Some((_, combined)) => {
                debug!("using {combined} for rsaEncryption with digest {digest}");
                combined
            }
            None => signature,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SignerInfo<'a> {
    raw: RawNode<'a>,
    version: Integer<'a>,
    sid: SignerIdentifier<'a>,
    digest_algorithm: AlgorithmIdentifier<'a>,
    signed_attrs: Option<Attributes<'a>>,
    signature_algorithm: AlgorithmIdentifier<'a>,
    signature: RawNode<'a>,
    unsigned_attrs: Option<Attributes<'a>>,
    pub(crate) config: DecodeConfig,
}

impl<'a> SignerInfo<'a> {
    pub(crate) fn from_node(node: &DecodedNode<'a>, config: &DecodeConfig) -> Result<Self> {
        let signature = node.require("signature")?;
        // Checks the content is an OCTET STRING.
        signature.octets()?;
        Ok(Self {
            raw: node.as_raw(),
            version: node.require("version")?.integer()?,
            sid: SignerIdentifier::from_node(node.require("sid")?)?,
            digest_algorithm: AlgorithmIdentifier::from_node(node.require("digestAlgorithm")?)?,
            signed_attrs: node.get("signedAttrs").map(Attributes::from_node).transpose()?,
            signature_algorithm: AlgorithmIdentifier::from_node(
                node.require("signatureAlgorithm")?,
            )?,
            signature: signature.as_raw(),
            unsigned_attrs: node.get("unsignedAttrs").map(Attributes::from_node).transpose()?,
            config: config.clone(),
        })
    }

    pub fn raw(&self) -> RawNode<'a> {
        self.raw
    }

    pub fn version(&self) -> Integer<'a> {
        self.version
    }

    pub fn sid(&self) -> &SignerIdentifier<'a> {
        &self.sid
    }

    pub fn digest_algorithm(&self) -> &AlgorithmIdentifier<'a> {
        &self.digest_algorithm
    }

    pub fn signed_attrs(&self) -> Option<&Attributes<'a>> {
        self.signed_attrs.as_ref()
    }

    pub fn signature_algorithm(&self) -> &AlgorithmIdentifier<'a> {
        &self.signature_algorithm
    }

    pub fn signature(&self) -> &'a [u8] {
        self.signature.content()
    }

    /// Where the signature octets sit in the input.
    pub fn signature_range(&self) -> Range<usize> {
        self.signature.content_range()
    }

    pub fn unsigned_attrs(&self) -> Option<&Attributes<'a>> {
        self.unsigned_attrs.as_ref()
    }

    /// Which bytes this signer signed.
    pub fn signed_bytes(&self, encap: &EncapsulatedContentInfo<'a>) -> SignedBytes<'a> {
        match (&self.signed_attrs, encap.content()) {
            (Some(attributes), _) => SignedBytes::Attributes {
                range: attributes.raw().range(),
                der: attributes.to_signed_der(),
            },
            (None, Some(content)) => SignedBytes::Content(content),
            (None, None) => SignedBytes::Detached,
        }
    }

    pub fn signature_input(&self, encap: &EncapsulatedContentInfo<'a>) -> SignatureInput<'a> {
        SignatureInput {
            signed: self.signed_bytes(encap),
            signature: self.signature(),
            digest_algorithm: self.digest_algorithm,
            signature_algorithm: self.signature_algorithm,
        }
    }

    fn signed_attribute(&self, oid: ObjectIdentifier) -> Option<&Attribute<'a>> {
        self.signed_attrs.as_ref()?.get(oid)
    }

    /// The content-type signed attribute.
    pub fn content_type(&self) -> Result<Option<ObjectIdentifier>> {
        match self.signed_attribute(ID_CONTENT_TYPE) {
            Some(attribute) => {
                let value = attribute.single_value()?;
                Ok(Some(value.reparse_with_config(&OBJECT_IDENTIFIER, &self.config)?.oid()?))
            }
            None => Ok(None),
        }
    }

    /// The message-digest signed attribute: the digest of the eContent octets.
    pub fn message_digest(&self) -> Result<Option<&'a [u8]>> {
        match self.signed_attribute(ID_MESSAGE_DIGEST) {
            Some(attribute) => {
                let value = attribute.single_value()?;
                Ok(Some(value.reparse_with_config(&OCTET_STRING, &self.config)?.octets()?))
            }
            None => Ok(None),
        }
    }

    /// The certificate among `signed_data.certificates` that issued this signature.
    pub fn signer_certificate(&self, signed_data: &SignedData<'a>) -> Result<Option<Certificate<'a>>> {
        signed_data.certificate_for(&self.sid)
    }
}
