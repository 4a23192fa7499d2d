use cms_der_decode::signed_data::{ID_DATA, ID_SIGNED_DATA};
use cms_der_decode::tlv::Tag;
use cms_der_decode::{
    parse_content_type, parse_signed_data, parse_signed_data_with_config, CertificateChoice,
    DecodeConfig, ErrorKind, SignedBytes, SignerIdentifier,
};
use const_oid::db::rfc5911::ID_SIGNING_TIME;
use const_oid::db::rfc5912::{ECDSA_WITH_SHA_256, ID_SHA_256, ID_SHA_384};
use der::{Decode, Encode};
use sha2::{Digest, Sha256};

const SIGNED_ATTRS: &[u8] = include_bytes!("data/signed_attrs.der");
const NO_ATTRS: &[u8] = include_bytes!("data/no_attrs.der");
const DETACHED_KEYID: &[u8] = include_bytes!("data/detached_keyid.der");
const DATA: &[u8] = include_bytes!("data/data.der");
const CERT: &[u8] = include_bytes!("data/cert.der");

const CONTENT: &[u8] = b"hello, signed world\n";

#[test]
fn content_types() {
    assert_eq!(parse_content_type(SIGNED_ATTRS).unwrap(), ID_SIGNED_DATA);
    assert_eq!(parse_content_type(DATA).unwrap(), ID_DATA);
}

#[test]
fn id_data_is_not_signed_data() {
    let err = parse_signed_data(DATA).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::UnsupportedContentType(ID_DATA));
    assert_eq!(err.offset(), 2);
}

#[test]
fn signed_attributes() -> anyhow::Result<()> {
    let signed_data = parse_signed_data(SIGNED_ATTRS)?;
    assert_eq!(signed_data.version().to_u64(), Some(1));
    assert_eq!(signed_data.raw().offset(), 19);
    assert_eq!(signed_data.digest_algorithms().len(), 1);
    assert_eq!(signed_data.digest_algorithms()[0].oid(), ID_SHA_256);
    assert!(signed_data.digest_algorithms()[0].parameters().is_none());

    let encap = signed_data.encap_content_info();
    assert_eq!(encap.content_type(), ID_DATA);
    assert_eq!(encap.content(), Some(CONTENT));
    assert_eq!(encap.content_node().map(|node| node.range()), Some(56..78));
    assert!(!signed_data.is_detached());

    assert_eq!(signed_data.certificates().len(), 1);
    assert!(matches!(signed_data.certificates()[0], CertificateChoice::Certificate(_)));
    assert_eq!(signed_data.certificates()[0].raw().encoded(), CERT);
    assert!(signed_data.crls().is_empty());

    let [signer] = signed_data.signer_infos() else {
        panic!("expected one signer");
    };
    assert_eq!(signer.version().to_u64(), Some(1));
    assert_eq!(signer.raw().range(), 506..899);
    match signer.sid() {
        SignerIdentifier::IssuerAndSerialNumber {
            issuer,
            serial_number,
        } => {
            assert_eq!(issuer.range(), 515..561);
            assert_eq!(serial_number.as_bytes(), &[0x01, 0xa2, 0xb3, 0xc4, 0xd5, 0xe6, 0xf7]);
        }
        other => panic!("unexpected sid {other:?}"),
    }
    assert_eq!(signer.digest_algorithm().oid(), ID_SHA_256);
    assert_eq!(signer.signature_algorithm().oid(), ECDSA_WITH_SHA_256);
    assert_eq!(signer.signature_range(), 828..899);
    assert_eq!(signer.signature(), &SIGNED_ATTRS[828..899]);
    assert!(signer.unsigned_attrs().is_none());

    let attributes = signer.signed_attrs().unwrap();
    assert_eq!(attributes.len(), 4);
    assert_eq!(attributes.raw().range(), 583..814);
    let signing_time = attributes.get(ID_SIGNING_TIME).unwrap().single_value()?;
    assert_eq!(signing_time.range(), 627..642);
    assert_eq!(signing_time.encoded(), &SIGNED_ATTRS[627..642]);
    assert_eq!(signer.content_type()?, Some(ID_DATA));
    assert_eq!(
        signer.signing_time()?.map(|time| time.to_string()).as_deref(),
        Some("2026-10-18T18:40:08Z")
    );
    let digest = Sha256::digest(CONTENT);
    assert_eq!(signer.message_digest()?, Some(digest.as_slice()));
    Ok(())
}

#[test]
fn signed_bytes_are_the_attributes_as_a_set() {
    let signed_data = parse_signed_data(SIGNED_ATTRS).unwrap();
    let signer = &signed_data.signer_infos()[0];
    let mut expected = vec![0x31];
    expected.extend_from_slice(&SIGNED_ATTRS[584..814]);
    assert_eq!(
        signer.signed_bytes(signed_data.encap_content_info()),
        SignedBytes::Attributes {
            range: 583..814,
            der: expected.clone(),
        }
    );
    assert_eq!(expected.len(), 231);

    let input = signer.signature_input(signed_data.encap_content_info());
    assert_eq!(input.signed.as_bytes(), Some(expected.as_slice()));
    assert_eq!(input.signature, &SIGNED_ATTRS[828..899]);
    assert_eq!(input.effective_signature_algorithm(), ECDSA_WITH_SHA_256);
}

#[test]
fn without_attributes_the_content_is_signed() {
    let signed_data = parse_signed_data(NO_ATTRS).unwrap();
    let signer = &signed_data.signer_infos()[0];
    assert!(signer.signed_attrs().is_none());
    assert_eq!(signer.message_digest().unwrap(), None);
    assert_eq!(signer.signing_time().unwrap(), None);
    assert_eq!(
        signer.signed_bytes(signed_data.encap_content_info()),
        SignedBytes::Content(CONTENT)
    );
    assert_eq!(signer.signature_range(), 595..666);
}

#[test]
fn detached_with_key_identifier() {
    let signed_data = parse_signed_data(DETACHED_KEYID).unwrap();
    assert_eq!(signed_data.version().to_u64(), Some(3));
    assert!(signed_data.is_detached());
    assert!(signed_data.certificates().is_empty());

    let signer = &signed_data.signer_infos()[0];
    let key_id = [
        0x20, 0x17, 0x72, 0x08, 0xbe, 0x08, 0x49, 0x3e, 0x66, 0x3c, 0xa3, 0x4f, 0x55, 0x94, 0x99,
        0x98, 0x9d, 0x76, 0x67, 0x36,
    ];
    assert_eq!(signer.sid(), &SignerIdentifier::SubjectKeyIdentifier(&key_id));
    assert!(signer.signer_certificate(&signed_data).unwrap().is_none());

    // The digest still binds the detached content.
    let digest = Sha256::digest(CONTENT);
    assert_eq!(signer.message_digest().unwrap(), Some(digest.as_slice()));
    assert!(matches!(
        signer.signed_bytes(signed_data.encap_content_info()),
        SignedBytes::Attributes { .. }
    ));

    let certificate = cms_der_decode::cert::Certificate::from_der(CERT).unwrap();
    assert!(signer.sid().matches(&certificate).unwrap());
}

#[test]
fn signer_certificate_by_issuer_and_serial() {
    let signed_data = parse_signed_data(SIGNED_ATTRS).unwrap();
    let signer = &signed_data.signer_infos()[0];
    let certificate = signer.signer_certificate(&signed_data).unwrap().unwrap();
    assert_eq!(certificate.raw().range(), 82..502);
    assert_eq!(certificate.subject().common_name().unwrap().as_deref(), Some("Test Signer"));
    assert_eq!(certificate.issuer().raw().encoded(), certificate.subject().raw().encoded());
    assert_eq!(
        certificate.validity().not_before.to_string(),
        "2026-10-18T18:40:08Z"
    );
    assert_eq!(certificate.version().to_u64(), Some(2));
    assert_eq!(certificate.extensions().len(), 3);
}

#[test]
fn truncated_input() {
    let err = parse_signed_data(&SIGNED_ATTRS[..SIGNED_ATTRS.len() - 1]).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::TruncatedInput { .. }));
}

#[test]
fn trailing_bytes() {
    let mut data = SIGNED_ATTRS.to_vec();
    data.push(0);
    let err = parse_signed_data(&data).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::TrailingData { remaining: 1 });
    assert_eq!(err.offset(), SIGNED_ATTRS.len());
}

#[test]
fn signer_digest_must_be_listed() {
    let mut data = SIGNED_ATTRS.to_vec();
    // sha256 -> sha384 in the signer's digestAlgorithm
    assert_eq!(data[582], 0x01);
    data[582] = 0x02;
    let err = parse_signed_data(&data).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::DigestAlgorithmMismatch(ID_SHA_384));
    assert_eq!(err.offset(), 570);
    assert_eq!(err.field(), Some("digestAlgorithm"));
}

#[test]
fn unknown_signer_identifier() {
    let mut data = SIGNED_ATTRS.to_vec();
    assert_eq!(data[513], 0x30);
    data[513] = 0x31;
    let err = parse_signed_data(&data).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::NoMatchingChoice { found: Tag::SET });
    assert_eq!(err.offset(), 513);
    assert_eq!(err.field(), Some("sid"));
}

#[test]
fn no_signers() {
    let data = [
        0x30, 0x23, 0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x02, 0xa0, 0x16,
        0x30, 0x14, 0x02, 0x01, 0x01, 0x31, 0x00, 0x30, 0x0b, 0x06, 0x09, 0x2a, 0x86, 0x48, 0x86,
        0xf7, 0x0d, 0x01, 0x07, 0x01, 0x31, 0x00,
    ];
    let signed_data = parse_signed_data(&data).unwrap();
    assert!(signed_data.signer_infos().is_empty());
    assert!(signed_data.digest_algorithms().is_empty());
    assert!(signed_data.is_detached());
}

#[test]
fn nesting_limit() {
    let config = DecodeConfig { max_depth: 3 };
    let err = parse_signed_data_with_config(SIGNED_ATTRS, &config).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::NestingTooDeep { limit: 3 });
    assert!(parse_signed_data_with_config(SIGNED_ATTRS, &DecodeConfig::default()).is_ok());
}

#[test]
fn agrees_with_the_cms_crate() {
    let content_info = cms::content_info::ContentInfo::from_der(SIGNED_ATTRS).unwrap();
    let expected: cms::signed_data::SignedData = content_info.content.decode_as().unwrap();
    let signed_data = parse_signed_data(SIGNED_ATTRS).unwrap();

    let expected_signers = expected.signer_infos.0.as_slice();
    assert_eq!(expected_signers.len(), signed_data.signer_infos().len());
    for (expected, actual) in expected_signers.iter().zip(signed_data.signer_infos()) {
        assert_eq!(expected.signature.as_bytes(), actual.signature());
        let attributes = expected.signed_attrs.as_ref().unwrap().to_der().unwrap();
        assert_eq!(
            actual.signed_bytes(signed_data.encap_content_info()).as_bytes(),
            Some(attributes.as_slice())
        );
    }

    let x509 = signed_data.certificates()[0].to_x509().unwrap();
    assert_eq!(x509.to_der().unwrap(), CERT);
    let parsed = signed_data.certificates()[0].parse().unwrap();
    assert_eq!(
        x509.tbs_certificate.serial_number.as_bytes(),
        parsed.serial_number().as_bytes()
    );
}
