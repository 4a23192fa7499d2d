//! Schema catalog for CMS SignedData (RFC 5652), the X.509 certificate subset needed to identify
//! signers (RFC 5280) and RFC 3161 TSTInfo.
//!
//! Everything here is `const` data interpreted by the [mapper](crate::mapper). Certificates and
//! CRLs inside SignedData, attribute values and algorithm parameters are captured raw so that the
//! SignedData schema does not have to know every type that may appear inside them; callers that
//! need them re-decode the raw node against one of the other entries here.

use crate::schema::{DefaultValue, FieldSpec, Primitive, TypeSpec};
use crate::tlv::Tag;

pub const BOOLEAN: TypeSpec = TypeSpec::Primitive(Primitive::Boolean);
pub const INTEGER: TypeSpec = TypeSpec::Primitive(Primitive::Integer);
pub const BIT_STRING: TypeSpec = TypeSpec::Primitive(Primitive::BitString);
pub const OCTET_STRING: TypeSpec = TypeSpec::Primitive(Primitive::OctetString);
pub const OBJECT_IDENTIFIER: TypeSpec = TypeSpec::Primitive(Primitive::ObjectIdentifier);
pub const UTC_TIME: TypeSpec = TypeSpec::Primitive(Primitive::UtcTime);
pub const GENERALIZED_TIME: TypeSpec = TypeSpec::Primitive(Primitive::GeneralizedTime);
pub const ANY: TypeSpec = TypeSpec::Any;
const TELETEX_STRING: TypeSpec = TypeSpec::Primitive(Primitive::TeletexString);
const PRINTABLE_STRING: TypeSpec = TypeSpec::Primitive(Primitive::PrintableString);
const UTF8_STRING: TypeSpec = TypeSpec::Primitive(Primitive::Utf8String);
const BMP_STRING: TypeSpec = TypeSpec::Primitive(Primitive::BmpString);
const IA5_STRING: TypeSpec = TypeSpec::Primitive(Primitive::Ia5String);

const RAW_SEQUENCE: TypeSpec = TypeSpec::Deferred(Tag::SEQUENCE);
const RAW_CONTEXT_0: TypeSpec = TypeSpec::Deferred(Tag::context(0, true));
const RAW_CONTEXT_1: TypeSpec = TypeSpec::Deferred(Tag::context(1, true));
const RAW_CONTEXT_2: TypeSpec = TypeSpec::Deferred(Tag::context(2, true));
const RAW_CONTEXT_3: TypeSpec = TypeSpec::Deferred(Tag::context(3, true));

const V1: DefaultValue = DefaultValue::Integer(&[0]);
const FALSE: DefaultValue = DefaultValue::Boolean(false);

/// ```text
/// Time ::= CHOICE { utcTime UTCTime, generalTime GeneralizedTime }
/// ```
pub const TIME: TypeSpec = TypeSpec::Choice(TIME_ALTERNATIVES);
const TIME_ALTERNATIVES: &[FieldSpec] = &[
    FieldSpec::new("utcTime", &UTC_TIME),
    FieldSpec::new("generalTime", &GENERALIZED_TIME),
];

/// ```text
/// AlgorithmIdentifier ::= SEQUENCE {
///     algorithm   OBJECT IDENTIFIER,
///     parameters  ANY DEFINED BY algorithm OPTIONAL }
/// ```
pub const ALGORITHM_IDENTIFIER: TypeSpec = TypeSpec::Sequence(ALGORITHM_IDENTIFIER_FIELDS);
const ALGORITHM_IDENTIFIER_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("algorithm", &OBJECT_IDENTIFIER),
    FieldSpec::new("parameters", &ANY).optional(),
];

/// ```text
/// Attribute ::= SEQUENCE {
///     attrType    OBJECT IDENTIFIER,
///     attrValues  SET OF AttributeValue }
/// ```
pub const ATTRIBUTE: TypeSpec = TypeSpec::Sequence(ATTRIBUTE_FIELDS);
const ATTRIBUTE_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("attrType", &OBJECT_IDENTIFIER),
    FieldSpec::new("attrValues", &ANY).set_of(),
];

/// ```text
/// ContentInfo ::= SEQUENCE {
///     contentType  ContentType,
///     content      [0] EXPLICIT ANY DEFINED BY contentType }
/// ```
///
/// `content` is optional here so that the content type alone can be read from degenerate
/// encodings; [`parse_signed_data`](crate::parse_signed_data) requires it.
pub const CONTENT_INFO: TypeSpec = TypeSpec::Sequence(CONTENT_INFO_FIELDS);
const CONTENT_INFO_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("contentType", &OBJECT_IDENTIFIER),
    FieldSpec::new("content", &ANY).explicit(0).optional(),
];

/// ```text
/// EncapsulatedContentInfo ::= SEQUENCE {
///     eContentType  ContentType,
///     eContent      [0] EXPLICIT OCTET STRING OPTIONAL }
/// ```
pub const ENCAPSULATED_CONTENT_INFO: TypeSpec = TypeSpec::Sequence(ENCAPSULATED_CONTENT_INFO_FIELDS);
const ENCAPSULATED_CONTENT_INFO_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("eContentType", &OBJECT_IDENTIFIER),
    FieldSpec::new("eContent", &OCTET_STRING).explicit(0).optional(),
];

/// ```text
/// IssuerAndSerialNumber ::= SEQUENCE {
///     issuer        Name,
///     serialNumber  CertificateSerialNumber }
/// ```
///
/// The issuer is kept raw: it is only ever compared byte-wise against certificate issuers.
pub const ISSUER_AND_SERIAL_NUMBER: TypeSpec = TypeSpec::Sequence(ISSUER_AND_SERIAL_NUMBER_FIELDS);
const ISSUER_AND_SERIAL_NUMBER_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("issuer", &RAW_SEQUENCE),
    FieldSpec::new("serialNumber", &INTEGER),
];

/// ```text
/// SignerIdentifier ::= CHOICE {
///     issuerAndSerialNumber  IssuerAndSerialNumber,
///     subjectKeyIdentifier   [0] SubjectKeyIdentifier }
/// ```
pub const SIGNER_IDENTIFIER: TypeSpec = TypeSpec::Choice(SIGNER_IDENTIFIER_ALTERNATIVES);
const SIGNER_IDENTIFIER_ALTERNATIVES: &[FieldSpec] = &[
    FieldSpec::new("issuerAndSerialNumber", &ISSUER_AND_SERIAL_NUMBER),
    FieldSpec::new("subjectKeyIdentifier", &OCTET_STRING).implicit(0),
];

/// ```text
/// SignerInfo ::= SEQUENCE {
///     version             CMSVersion,
///     sid                 SignerIdentifier,
///     digestAlgorithm     DigestAlgorithmIdentifier,
///     signedAttrs         [0] IMPLICIT SignedAttributes OPTIONAL,
///     signatureAlgorithm  SignatureAlgorithmIdentifier,
///     signature           SignatureValue,
///     unsignedAttrs       [1] IMPLICIT UnsignedAttributes OPTIONAL }
/// ```
pub const SIGNER_INFO: TypeSpec = TypeSpec::Sequence(SIGNER_INFO_FIELDS);
const SIGNER_INFO_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("version", &INTEGER),
    FieldSpec::new("sid", &SIGNER_IDENTIFIER),
    FieldSpec::new("digestAlgorithm", &ALGORITHM_IDENTIFIER),
    FieldSpec::new("signedAttrs", &ATTRIBUTE)
        .set_of()
        .implicit(0)
        .optional(),
    FieldSpec::new("signatureAlgorithm", &ALGORITHM_IDENTIFIER),
    FieldSpec::new("signature", &OCTET_STRING),
    FieldSpec::new("unsignedAttrs", &ATTRIBUTE)
        .set_of()
        .implicit(1)
        .optional(),
];

/// ```text
/// CertificateChoices ::= CHOICE {
///     certificate           Certificate,
///     extendedCertificate   [0] IMPLICIT ExtendedCertificate,  -- Obsolete
///     v1AttrCert            [1] IMPLICIT AttributeCertificateV1, -- Obsolete
///     v2AttrCert            [2] IMPLICIT AttributeCertificateV2,
///     other                 [3] IMPLICIT OtherCertificateFormat }
/// ```
///
/// Every alternative is captured raw, including the obsolete ones that some timestamp
/// authorities still emit.
pub const CERTIFICATE_CHOICES: TypeSpec = TypeSpec::Choice(CERTIFICATE_CHOICES_ALTERNATIVES);
const CERTIFICATE_CHOICES_ALTERNATIVES: &[FieldSpec] = &[
    FieldSpec::new("certificate", &RAW_SEQUENCE),
    FieldSpec::new("extendedCertificate", &RAW_CONTEXT_0),
    FieldSpec::new("v1AttrCert", &RAW_CONTEXT_1),
    FieldSpec::new("v2AttrCert", &RAW_CONTEXT_2),
    FieldSpec::new("other", &RAW_CONTEXT_3),
];

/// ```text
/// RevocationInfoChoice ::= CHOICE {
///     crl    CertificateList,
///     other  [1] IMPLICIT OtherRevocationInfoFormat }
/// ```
pub const REVOCATION_INFO_CHOICE: TypeSpec = TypeSpec::Choice(REVOCATION_INFO_CHOICE_ALTERNATIVES);
const REVOCATION_INFO_CHOICE_ALTERNATIVES: &[FieldSpec] = &[
    FieldSpec::new("crl", &RAW_SEQUENCE),
    FieldSpec::new("other", &RAW_CONTEXT_1),
];

/// ```text
/// SignedData ::= SEQUENCE {
///     version           CMSVersion,
///     digestAlgorithms  DigestAlgorithmIdentifiers,
///     encapContentInfo  EncapsulatedContentInfo,
///     certificates      [0] IMPLICIT CertificateSet OPTIONAL,
///     crls              [1] IMPLICIT RevocationInfoChoices OPTIONAL,
///     signerInfos       SignerInfos }
/// ```
pub const SIGNED_DATA: TypeSpec = TypeSpec::Sequence(SIGNED_DATA_FIELDS);
const SIGNED_DATA_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("version", &INTEGER),
    FieldSpec::new("digestAlgorithms", &ALGORITHM_IDENTIFIER).set_of(),
    FieldSpec::new("encapContentInfo", &ENCAPSULATED_CONTENT_INFO),
    FieldSpec::new("certificates", &CERTIFICATE_CHOICES)
        .set_of()
        .implicit(0)
        .optional(),
    FieldSpec::new("crls", &REVOCATION_INFO_CHOICE)
        .set_of()
        .implicit(1)
        .optional(),
    FieldSpec::new("signerInfos", &SIGNER_INFO).set_of(),
];

/// ```text
/// DirectoryString ::= CHOICE {
///     teletexString    TeletexString,
///     printableString  PrintableString,
///     utf8String       UTF8String,
///     bmpString        BMPString }
/// ```
///
/// IA5String is accepted as well since it is what emailAddress and domainComponent values use.
pub const DIRECTORY_STRING: TypeSpec = TypeSpec::Choice(DIRECTORY_STRING_ALTERNATIVES);
const DIRECTORY_STRING_ALTERNATIVES: &[FieldSpec] = &[
    FieldSpec::new("teletexString", &TELETEX_STRING),
    FieldSpec::new("printableString", &PRINTABLE_STRING),
    FieldSpec::new("utf8String", &UTF8_STRING),
    FieldSpec::new("bmpString", &BMP_STRING),
    FieldSpec::new("ia5String", &IA5_STRING),
];

/// ```text
/// AttributeTypeAndValue ::= SEQUENCE { type AttributeType, value AttributeValue }
/// RelativeDistinguishedName ::= SET SIZE (1..MAX) OF AttributeTypeAndValue
/// Name ::= SEQUENCE OF RelativeDistinguishedName
/// ```
pub const NAME: TypeSpec = TypeSpec::SequenceOf(&RDN_MEMBER);
pub const RELATIVE_DISTINGUISHED_NAME: TypeSpec = TypeSpec::SetOf(&ATTRIBUTE_TYPE_AND_VALUE_MEMBER);
pub const ATTRIBUTE_TYPE_AND_VALUE: TypeSpec = TypeSpec::Sequence(ATTRIBUTE_TYPE_AND_VALUE_FIELDS);
const RDN_MEMBER: FieldSpec = FieldSpec::new("rdn", &RELATIVE_DISTINGUISHED_NAME);
const ATTRIBUTE_TYPE_AND_VALUE_MEMBER: FieldSpec =
    FieldSpec::new("attributeTypeAndValue", &ATTRIBUTE_TYPE_AND_VALUE);
const ATTRIBUTE_TYPE_AND_VALUE_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("type", &OBJECT_IDENTIFIER),
    FieldSpec::new("value", &ANY),
];

/// ```text
/// Validity ::= SEQUENCE { notBefore Time, notAfter Time }
/// ```
pub const VALIDITY: TypeSpec = TypeSpec::Sequence(VALIDITY_FIELDS);
const VALIDITY_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("notBefore", &TIME),
    FieldSpec::new("notAfter", &TIME),
];

/// ```text
/// SubjectPublicKeyInfo ::= SEQUENCE {
///     algorithm         AlgorithmIdentifier,
///     subjectPublicKey  BIT STRING }
/// ```
pub const SUBJECT_PUBLIC_KEY_INFO: TypeSpec = TypeSpec::Sequence(SUBJECT_PUBLIC_KEY_INFO_FIELDS);
const SUBJECT_PUBLIC_KEY_INFO_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("algorithm", &ALGORITHM_IDENTIFIER),
    FieldSpec::new("subjectPublicKey", &BIT_STRING),
];

/// ```text
/// Extension ::= SEQUENCE {
///     extnID     OBJECT IDENTIFIER,
///     critical   BOOLEAN DEFAULT FALSE,
///     extnValue  OCTET STRING }
/// ```
pub const EXTENSION: TypeSpec = TypeSpec::Sequence(EXTENSION_FIELDS);
const EXTENSION_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("extnID", &OBJECT_IDENTIFIER),
    FieldSpec::new("critical", &BOOLEAN).default_value(FALSE),
    FieldSpec::new("extnValue", &OCTET_STRING),
];

/// ```text
/// TBSCertificate ::= SEQUENCE {
///     version          [0] EXPLICIT Version DEFAULT v1,
///     serialNumber         CertificateSerialNumber,
///     signature            AlgorithmIdentifier,
///     issuer               Name,
///     validity             Validity,
///     subject              Name,
///     subjectPublicKeyInfo SubjectPublicKeyInfo,
///     issuerUniqueID   [1] IMPLICIT UniqueIdentifier OPTIONAL,
///     subjectUniqueID  [2] IMPLICIT UniqueIdentifier OPTIONAL,
///     extensions       [3] EXPLICIT Extensions OPTIONAL }
/// ```
pub const TBS_CERTIFICATE: TypeSpec = TypeSpec::Sequence(TBS_CERTIFICATE_FIELDS);
const TBS_CERTIFICATE_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("version", &INTEGER).explicit(0).default_value(V1),
    FieldSpec::new("serialNumber", &INTEGER),
    FieldSpec::new("signature", &ALGORITHM_IDENTIFIER),
    FieldSpec::new("issuer", &NAME),
    FieldSpec::new("validity", &VALIDITY),
    FieldSpec::new("subject", &NAME),
    FieldSpec::new("subjectPublicKeyInfo", &SUBJECT_PUBLIC_KEY_INFO),
    FieldSpec::new("issuerUniqueID", &BIT_STRING).implicit(1).optional(),
    FieldSpec::new("subjectUniqueID", &BIT_STRING).implicit(2).optional(),
    FieldSpec::new("extensions", &EXTENSION)
        .sequence_of()
        .explicit(3)
        .optional(),
];

/// ```text
/// Certificate ::= SEQUENCE {
///     tbsCertificate      TBSCertificate,
///     signatureAlgorithm  AlgorithmIdentifier,
///     signatureValue      BIT STRING }
/// ```
pub const CERTIFICATE: TypeSpec = TypeSpec::Sequence(CERTIFICATE_FIELDS);
const CERTIFICATE_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("tbsCertificate", &TBS_CERTIFICATE),
    FieldSpec::new("signatureAlgorithm", &ALGORITHM_IDENTIFIER),
    FieldSpec::new("signatureValue", &BIT_STRING),
];

/// ```text
/// MessageImprint ::= SEQUENCE {
///     hashAlgorithm  AlgorithmIdentifier,
///     hashedMessage  OCTET STRING }
/// ```
pub const MESSAGE_IMPRINT: TypeSpec = TypeSpec::Sequence(MESSAGE_IMPRINT_FIELDS);
const MESSAGE_IMPRINT_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("hashAlgorithm", &ALGORITHM_IDENTIFIER),
    FieldSpec::new("hashedMessage", &OCTET_STRING),
];

/// ```text
/// Accuracy ::= SEQUENCE {
///     seconds  INTEGER OPTIONAL,
///     millis   [0] INTEGER (1..999) OPTIONAL,
///     micros   [1] INTEGER (1..999) OPTIONAL }
/// ```
pub const ACCURACY: TypeSpec = TypeSpec::Sequence(ACCURACY_FIELDS);
const ACCURACY_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("seconds", &INTEGER).optional(),
    FieldSpec::new("millis", &INTEGER).implicit(0).optional(),
    FieldSpec::new("micros", &INTEGER).implicit(1).optional(),
];

/// ```text
/// TSTInfo ::= SEQUENCE {
///     version         INTEGER { v1(1) },
///     policy          TSAPolicyId,
///     messageImprint  MessageImprint,
///     serialNumber    INTEGER,
///     genTime         GeneralizedTime,
///     accuracy        Accuracy OPTIONAL,
///     ordering        BOOLEAN DEFAULT FALSE,
///     nonce           INTEGER OPTIONAL,
///     tsa             [0] GeneralName OPTIONAL,
///     extensions      [1] IMPLICIT Extensions OPTIONAL }
/// ```
///
/// Some timestamp authorities mis-encode `genTime`, so it is captured raw and only parsed on
/// request. That keeps the message imprint usable either way.
pub const TST_INFO: TypeSpec = TypeSpec::Sequence(TST_INFO_FIELDS);
const TST_INFO_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("version", &INTEGER),
    FieldSpec::new("policy", &OBJECT_IDENTIFIER),
    FieldSpec::new("messageImprint", &MESSAGE_IMPRINT),
    FieldSpec::new("serialNumber", &INTEGER),
    FieldSpec::new("genTime", &ANY),
    FieldSpec::new("accuracy", &ACCURACY).optional(),
    FieldSpec::new("ordering", &BOOLEAN).default_value(FALSE),
    FieldSpec::new("nonce", &INTEGER).optional(),
    // GeneralName is a CHOICE, so the tag is explicit.
    FieldSpec::new("tsa", &ANY).explicit(0).optional(),
    FieldSpec::new("extensions", &EXTENSION)
        .sequence_of()
        .implicit(1)
        .optional(),
];

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;
    use crate::mapper::decode;
    use crate::ErrorKind;

    #[test]
    fn content_info_without_content() {
        let data = hex!("30 0b 06 09 2a 86 48 86 f7 0d 01 07 01");
        let node = decode(&data, &CONTENT_INFO).unwrap();
        assert_eq!(
            node.require("contentType").unwrap().oid().unwrap().to_string(),
            "1.2.840.113549.1.7.1"
        );
        assert!(node.get("content").is_none());
    }

    #[test]
    fn signer_identifier_alternatives() {
        let key_id = hex!("80 03 01 02 03");
        let node = decode(&key_id, &SIGNER_IDENTIFIER).unwrap();
        let (name, value) = node.choice().unwrap();
        assert_eq!(name, "subjectKeyIdentifier");
        assert_eq!(value.octets().unwrap(), &hex!("01 02 03"));

        let issuer_serial = hex!("30 07 30 02 31 00 02 01 05");
        let node = decode(&issuer_serial, &SIGNER_IDENTIFIER).unwrap();
        let (name, value) = node.choice().unwrap();
        assert_eq!(name, "issuerAndSerialNumber");
        assert_eq!(value.require("issuer").unwrap().encoded(), &hex!("30 02 31 00"));

        let err = decode(&hex!("81 01 00"), &SIGNER_IDENTIFIER).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::NoMatchingChoice { .. }));
    }

    #[test]
    fn extension_critical_defaults_to_false() {
        let data = hex!("30 09 06 03 55 1d 0e 04 02 04 00");
        let node = decode(&data, &EXTENSION).unwrap();
        let critical = node.require("critical").unwrap();
        assert!(critical.is_default());
        assert!(!critical.boolean().unwrap());
    }

    #[test]
    fn obsolete_certificate_alternatives_are_tolerated() {
        let data = hex!("a1 02 05 00");
        let node = decode(&data, &CERTIFICATE_CHOICES).unwrap();
        let (name, value) = node.choice().unwrap();
        assert_eq!(name, "v1AttrCert");
        assert_eq!(value.as_raw().encoded(), &data);
    }

    #[test]
    fn time_choice() {
        let node = decode(b"\x18\x0f20261018184347Z", &TIME).unwrap();
        assert_eq!(node.choice().unwrap().0, "generalTime");
        assert_eq!(node.time().unwrap().to_string(), "2026-10-18T18:43:47Z");
    }
}
