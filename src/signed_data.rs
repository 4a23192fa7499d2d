//! The CMS facade: ContentInfo type checks and the typed SignedData model.

use core::ops::Range;

use const_oid::db::rfc5911;
use const_oid::ObjectIdentifier;
use log::{debug, error};

use crate::asn1::{CONTENT_INFO, SIGNED_DATA};
use crate::cert::Certificate;
use crate::mapper::{self, DecodeConfig};
use crate::node::{DecodedNode, Integer, RawNode};
use crate::signer::{SignerIdentifier, SignerInfo};
use crate::{Error, ErrorKind, Result};

pub const ID_DATA: ObjectIdentifier = rfc5911::ID_DATA;
pub const ID_SIGNED_DATA: ObjectIdentifier = rfc5911::ID_SIGNED_DATA;
/// id-ct-TSTInfo, the eContentType of an RFC 3161 timestamp token.
pub const ID_CT_TST_INFO: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.1.4");
/// id-aa-timeStampToken (RFC 3161 appendix A).
pub const ID_AA_TIME_STAMP_TOKEN: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.2.14");
/// Microsoft's RFC 3161 timestamp attribute, used by Authenticode signers.
pub const MS_TIME_STAMP_TOKEN: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.3.3.1");

const NULL_DER: &[u8] = &[0x05, 0x00];

/// Reads only `ContentInfo.contentType`; `content` is not looked into.
///
/// Any failure is reported as [`ErrorKind::MalformedContentInfo`] wrapping the underlying error.
pub fn parse_content_type(input: &[u8]) -> Result<ObjectIdentifier> {
    parse_content_type_with_config(input, &DecodeConfig::default())
}

pub fn parse_content_type_with_config(
    input: &[u8],
    config: &DecodeConfig,
) -> Result<ObjectIdentifier> {
    mapper::decode_with_config(input, &CONTENT_INFO, config)
        .and_then(|content_info| content_info.require("contentType")?.oid())
        .map_err(|err| {
            error!("Failed to read the ContentInfo content type: {err}");
            let offset = err.offset();
            Error::new(ErrorKind::MalformedContentInfo(Box::new(err)), offset)
        })
}

/// Decodes a ContentInfo that must carry id-signedData.
pub fn parse_signed_data(input: &[u8]) -> Result<SignedData<'_>> {
    parse_signed_data_with_config(input, &DecodeConfig::default())
}

pub fn parse_signed_data_with_config<'a>(
    input: &'a [u8],
    config: &DecodeConfig,
) -> Result<SignedData<'a>> {
    decode_signed_data(input, 0..input.len(), config).map_err(|err| {
        error!("Failed to decode SignedData: {err}");
        err
    })
}

/// Decodes the ContentInfo at `input[range]`, keeping offsets relative to `input`. Timestamp
/// tokens nested in unsigned attributes go through here too.
pub(crate) fn decode_signed_data<'a>(
    input: &'a [u8],
    range: Range<usize>,
    config: &DecodeConfig,
) -> Result<SignedData<'a>> {
    let content_info = mapper::decode_range(input, range, &CONTENT_INFO, config)?;
    let content_type = content_info.require("contentType")?;
    let oid = content_type.oid()?;
    if oid != ID_SIGNED_DATA {
        return Err(Error::new(
            ErrorKind::UnsupportedContentType(oid),
            content_type.offset(),
        ));
    }
    let content = content_info.require("content")?;
    let node = content
        .as_raw()
        .reparse_with_config(&SIGNED_DATA, config)
        .map_err(|err| err.in_field("content"))?;
    SignedData::from_node(&node, config)
}

/// An AlgorithmIdentifier with its parameters left encoded.
///
/// Two identifiers are equal when the OIDs match and the parameters have the same encoding;
/// absent parameters and an explicit NULL count as the same (RFC 5754 section 2).
#[derive(Clone, Copy, Debug)]
pub struct AlgorithmIdentifier<'a> {
    oid: ObjectIdentifier,
    parameters: Option<RawNode<'a>>,
    raw: RawNode<'a>,
}

impl<'a> AlgorithmIdentifier<'a> {
    pub(crate) fn from_node(node: &DecodedNode<'a>) -> Result<Self> {
        Ok(Self {
            oid: node.require("algorithm")?.oid()?,
            parameters: node.get("parameters").map(DecodedNode::as_raw),
            raw: node.as_raw(),
        })
    }

    pub fn oid(&self) -> ObjectIdentifier {
        self.oid
    }

    pub fn parameters(&self) -> Option<RawNode<'a>> {
        self.parameters
    }

    pub fn raw(&self) -> RawNode<'a> {
        self.raw
    }

    /// Parameter encoding with NULL folded into absent.
    fn significant_parameters(&self) -> Option<&'a [u8]> {
        self.parameters
            .map(|parameters| parameters.encoded())
            .filter(|der| *der != NULL_DER)
    }
}

impl PartialEq for AlgorithmIdentifier<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.oid == other.oid && self.significant_parameters() == other.significant_parameters()
    }
}

impl Eq for AlgorithmIdentifier<'_> {}

#[derive(Clone, Debug)]
pub struct EncapsulatedContentInfo<'a> {
    content_type: ObjectIdentifier,
    content: Option<RawNode<'a>>,
}

impl<'a> EncapsulatedContentInfo<'a> {
    pub(crate) fn from_node(node: &DecodedNode<'a>) -> Result<Self> {
        Ok(Self {
            content_type: node.require("eContentType")?.oid()?,
            content: node.get("eContent").map(DecodedNode::as_raw),
        })
    }

    pub fn content_type(&self) -> ObjectIdentifier {
        self.content_type
    }

    /// The eContent octets, or `None` for a detached signature.
    pub fn content(&self) -> Option<&'a [u8]> {
        self.content.map(|octets| octets.content())
    }

    /// The eContent OCTET STRING as it appears in the input.
    pub fn content_node(&self) -> Option<RawNode<'a>> {
        self.content
    }

    pub fn is_detached(&self) -> bool {
        self.content.is_none()
    }
}

/// One entry of `SignedData.certificates`, captured raw.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CertificateChoice<'a> {
    Certificate(RawNode<'a>),
    ExtendedCertificate(RawNode<'a>),
    V1AttributeCertificate(RawNode<'a>),
    V2AttributeCertificate(RawNode<'a>),
    Other(RawNode<'a>),
}

impl<'a> CertificateChoice<'a> {
    fn from_node(node: &DecodedNode<'a>) -> Result<Self> {
        let (alternative, inner) = node.choice()?;
        let raw = inner.as_raw();
        Ok(match alternative {
            "certificate" => CertificateChoice::Certificate(raw),
            "extendedCertificate" => CertificateChoice::ExtendedCertificate(raw),
            "v1AttrCert" => CertificateChoice::V1AttributeCertificate(raw),
            "v2AttrCert" => CertificateChoice::V2AttributeCertificate(raw),
            _ => CertificateChoice::Other(raw),
        })
    }

    pub fn raw(&self) -> RawNode<'a> {
        match self {
            CertificateChoice::Certificate(raw)
            | CertificateChoice::ExtendedCertificate(raw)
            | CertificateChoice::V1AttributeCertificate(raw)
            | CertificateChoice::V2AttributeCertificate(raw)
            | CertificateChoice::Other(raw) => *raw,
        }
    }

    /// Decodes an X.509 certificate; the other alternatives are reported as unexpected values.
    ///
    /// A certificate whose validity starts or ends before 1970 is rejected with
    /// [`ErrorKind::InvalidTime`].
    pub fn parse(&self) -> Result<Certificate<'a>> {
        match self {
            CertificateChoice::Certificate(raw) => Certificate::from_raw(*raw),
            other => Err(Error::new(
                ErrorKind::UnexpectedValue("an X.509 certificate"),
                other.raw().offset(),
            )),
        }
    }

    /// Hands the bytes to the `x509-cert` decoder.
    pub fn to_x509(&self) -> der::Result<x509_cert::Certificate> {
        self.raw().decode_as()
    }
}

/// One entry of `SignedData.crls`, captured raw.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RevocationInfo<'a> {
    Crl(RawNode<'a>),
    Other(RawNode<'a>),
}

impl<'a> RevocationInfo<'a> {
    fn from_node(node: &DecodedNode<'a>) -> Result<Self> {
        let (alternative, inner) = node.choice()?;
        Ok(match alternative {
            "crl" => RevocationInfo::Crl(inner.as_raw()),
            _ => RevocationInfo::Other(inner.as_raw()),
        })
    }

    pub fn raw(&self) -> RawNode<'a> {
        match self {
            RevocationInfo::Crl(raw) | RevocationInfo::Other(raw) => *raw,
        }
    }
}

/// A decoded and cross-checked SignedData.
#[derive(Clone, Debug)]
pub struct SignedData<'a> {
    raw: RawNode<'a>,
    version: Integer<'a>,
    digest_algorithms: Vec<AlgorithmIdentifier<'a>>,
    encap_content_info: EncapsulatedContentInfo<'a>,
    certificates: Vec<CertificateChoice<'a>>,
    crls: Vec<RevocationInfo<'a>>,
    signer_infos: Vec<SignerInfo<'a>>,
}

impl<'a> SignedData<'a> {
    fn from_node(node: &DecodedNode<'a>, config: &DecodeConfig) -> Result<Self> {
        let digest_algorithms = node
            .require("digestAlgorithms")?
            .items()?
            .iter()
            .map(AlgorithmIdentifier::from_node)
            .collect::<Result<Vec<_>>>()?;
        let certificates = match node.get("certificates") {
            Some(set) => set
                .items()?
                .iter()
                .map(CertificateChoice::from_node)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        let crls = match node.get("crls") {
            Some(set) => set
                .items()?
                .iter()
                .map(RevocationInfo::from_node)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        let signer_infos = node
            .require("signerInfos")?
            .items()?
            .iter()
            .map(|signer| SignerInfo::from_node(signer, config))
            .collect::<Result<Vec<_>>>()?;

        for signer in &signer_infos {
            let digest_algorithm = signer.digest_algorithm();
            if !digest_algorithms.contains(digest_algorithm) {
                return Err(Error::new(
                    ErrorKind::DigestAlgorithmMismatch(digest_algorithm.oid()),
                    digest_algorithm.raw().offset(),
                )
                .in_field("digestAlgorithm"));
            }
        }
        debug!(
            "SignedData with {} signer(s), {} certificate(s) and {} CRL(s)",
            signer_infos.len(),
            certificates.len(),
            crls.len()
        );

        Ok(Self {
            raw: node.as_raw(),
            version: node.require("version")?.integer()?,
            digest_algorithms,
            encap_content_info: EncapsulatedContentInfo::from_node(node.require("encapContentInfo")?)?,
            certificates,
            crls,
            signer_infos,
        })
    }

    /// The SignedData SEQUENCE (without the ContentInfo around it).
    pub fn raw(&self) -> RawNode<'a> {
        self.raw
    }

    pub fn version(&self) -> Integer<'a> {
        self.version
    }

    pub fn digest_algorithms(&self) -> &[AlgorithmIdentifier<'a>] {
        &self.digest_algorithms
    }

    pub fn encap_content_info(&self) -> &EncapsulatedContentInfo<'a> {
        &self.encap_content_info
    }

    pub fn certificates(&self) -> &[CertificateChoice<'a>] {
        &self.certificates
    }

    pub fn crls(&self) -> &[RevocationInfo<'a>] {
        &self.crls
    }

    pub fn signer_infos(&self) -> &[SignerInfo<'a>] {
        &self.signer_infos
    }

    pub fn is_detached(&self) -> bool {
        self.encap_content_info.is_detached()
    }

    /// Finds the certificate `sid` refers to among `certificates`.
    pub fn certificate_for(&self, sid: &SignerIdentifier<'_>) -> Result<Option<Certificate<'a>>> {
        for choice in &self.certificates {
            if !matches!(choice, CertificateChoice::Certificate(_)) {
                continue;
            }
            let certificate = choice.parse()?;
            if sid.matches(&certificate)? {
                return Ok(Some(certificate));
            }
        }
        debug!("no certificate matches signer {sid:?}");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    const ID_DATA_CONTENT_INFO: [u8; 13] = hex!("30 0b 06 09 2a 86 48 86 f7 0d 01 07 01");

    #[test]
    fn content_type_of_data() {
        assert_eq!(parse_content_type(&ID_DATA_CONTENT_INFO).unwrap(), ID_DATA);
    }

    #[test]
    fn content_type_errors_are_wrapped() {
        let err = parse_content_type(&ID_DATA_CONTENT_INFO[..12]).unwrap_err();
        let ErrorKind::MalformedContentInfo(inner) = err.kind() else {
            panic!("unexpected error {err}");
        };
        assert!(matches!(inner.kind(), ErrorKind::TruncatedInput { .. }));
        assert_eq!(err.offset(), inner.offset());
    }

    #[test]
    fn data_is_not_signed_data() {
        let err = parse_signed_data(&ID_DATA_CONTENT_INFO).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnsupportedContentType(ID_DATA));
        assert_eq!(err.offset(), 2);
    }

    #[test]
    fn signed_data_without_content_is_missing_a_field() {
        let data = hex!("30 0b 06 09 2a 86 48 86 f7 0d 01 07 02");
        let err = parse_signed_data(&data).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::MissingField("content"));
    }

    // SignedData without signers whose crls hold an empty CertificateList and an empty [1].
    const WITH_CRLS: [u8; 43] = hex!(
        "30 29 06 09 2a 86 48 86 f7 0d 01 07 02 a0 1c"
        "30 1a 02 01 01 31 00 30 0b 06 09 2a 86 48 86 f7 0d 01 07 01"
        "a1 04 30 00 a1 00"
        "31 00"
    );

    #[test]
    fn revocation_info_choices() {
        let signed_data = parse_signed_data(&WITH_CRLS).unwrap();
        let [crl, other] = signed_data.crls() else {
            panic!("expected two revocation entries");
        };
        assert!(matches!(crl, RevocationInfo::Crl(_)));
        assert_eq!(crl.raw().range(), 37..39);
        assert_eq!(crl.raw().encoded(), &hex!("30 00"));
        assert!(matches!(other, RevocationInfo::Other(_)));
        assert_eq!(other.raw().range(), 39..41);
        assert_eq!(other.raw().tag(), crate::tlv::Tag::context(1, true));
        assert!(signed_data.certificates().is_empty());
        assert!(signed_data.signer_infos().is_empty());
    }

    #[test]
    fn certificates_after_crls_are_rejected() {
        let data = hex!(
            "30 2b 06 09 2a 86 48 86 f7 0d 01 07 02 a0 1e"
            "30 1c 02 01 01 31 00 30 0b 06 09 2a 86 48 86 f7 0d 01 07 01"
            "a1 04 30 00 a1 00"
            "a0 00"
            "31 00"
        );
        let err = parse_signed_data(&data).unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::UnexpectedTag {
                expected: crate::tlv::Tag::SET,
                found: crate::tlv::Tag::context(0, true),
            }
        );
        assert_eq!(err.offset(), 41);
        assert_eq!(err.field(), Some("signerInfos"));
    }

    #[test]
    fn null_parameters_equal_absent_parameters() {
        let with_null = hex!("30 0d 06 09 60 86 48 01 65 03 04 02 01 05 00");
        let without = hex!("30 0b 06 09 60 86 48 01 65 03 04 02 01");
        let other = hex!("30 0d 06 09 60 86 48 01 65 03 04 02 01 04 00");
        fn algorithm(data: &[u8]) -> AlgorithmIdentifier<'_> {
            AlgorithmIdentifier::from_node(
                &mapper::decode(data, &crate::asn1::ALGORITHM_IDENTIFIER).unwrap(),
            )
            .unwrap()
        }
        assert_eq!(algorithm(&with_null), algorithm(&without));
        assert_ne!(algorithm(&with_null), algorithm(&other));
        assert_ne!(algorithm(&without), algorithm(&other));
    }
}
