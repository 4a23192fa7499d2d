//! Signing time, RFC 3161 timestamp tokens and countersignatures found in signer attributes.
//!
//! A timestamp token is itself a ContentInfo carrying SignedData whose eContent is a TSTInfo. The
//! TSTInfo message imprint is the hash of the outer signer's signature octets, so checking a
//! token means hashing [`SignerInfo::signature`] and comparing it with
//! [`MessageImprint::hashed_message`].

use const_oid::db::rfc5911::{ID_COUNTERSIGNATURE, ID_SIGNING_TIME};
use const_oid::ObjectIdentifier;
use log::debug;

use crate::asn1::{GENERALIZED_TIME, SIGNER_INFO, TIME, TST_INFO};
use crate::cert::Extension;
use crate::mapper::{self, DecodeConfig};
use crate::node::{DecodedNode, Integer, RawNode, Time};
use crate::signed_data::{
    self, AlgorithmIdentifier, SignedData, ID_AA_TIME_STAMP_TOKEN, ID_CT_TST_INFO,
    MS_TIME_STAMP_TOKEN,
};
use crate::signer::SignerInfo;
use crate::{Error, ErrorKind, Result};

impl<'a> SignerInfo<'a> {
    /// The signing-time signed attribute.
    pub fn signing_time(&self) -> Result<Option<Time>> {
        let attribute = match self.signed_attrs().and_then(|attrs| attrs.get(ID_SIGNING_TIME)) {
            Some(attribute) => attribute,
            None => return Ok(None),
        };
        let value = attribute.single_value()?;
        Ok(Some(value.reparse_with_config(&TIME, &self.config)?.time()?))
    }

    /// Timestamp tokens among the unsigned attributes, under either id-aa-timeStampToken or
    /// Microsoft's legacy attribute type.
    pub fn timestamp_tokens(&self) -> Result<Vec<TimestampToken<'a>>> {
        let mut tokens = Vec::new();
        let attributes = match self.unsigned_attrs() {
            Some(attributes) => attributes,
            None => return Ok(tokens),
        };
        for attribute in attributes.iter() {
            let oid = attribute.oid();
            if oid != ID_AA_TIME_STAMP_TOKEN && oid != MS_TIME_STAMP_TOKEN {
                continue;
            }
            for value in attribute.values() {
                let signed_data =
                    signed_data::decode_signed_data(value.input(), value.range(), &self.config)
                        .map_err(|err| err.in_field("unsignedAttrs"))?;
                debug!("timestamp token at {} under {oid}", value.offset());
                tokens.push(TimestampToken {
                    attribute: oid,
                    raw: *value,
                    signed_data,
                    config: self.config.clone(),
                });
            }
        }
        Ok(tokens)
    }

    /// SignerInfos from id-countersignature unsigned attributes.
    pub fn counter_signatures(&self) -> Result<Vec<SignerInfo<'a>>> {
        let attribute = match self
            .unsigned_attrs()
            .and_then(|attrs| attrs.get(ID_COUNTERSIGNATURE))
        {
            Some(attribute) => attribute,
            None => return Ok(Vec::new()),
        };
        attribute
            .values()
            .iter()
            .map(|value| {
                let node = value.reparse_with_config(&SIGNER_INFO, &self.config)?;
                SignerInfo::from_node(&node, &self.config)
            })
            .collect()
    }
}

/// An RFC 3161 timestamp token taken from an unsigned attribute.
#[derive(Clone, Debug)]
pub struct TimestampToken<'a> {
    attribute: ObjectIdentifier,
    raw: RawNode<'a>,
    signed_data: SignedData<'a>,
    config: DecodeConfig,
}

impl<'a> TimestampToken<'a> {
    /// The attribute type the token was found under.
    pub fn attribute_type(&self) -> ObjectIdentifier {
        self.attribute
    }

    /// The token's ContentInfo as encoded.
    pub fn raw(&self) -> RawNode<'a> {
        self.raw
    }

    pub fn signed_data(&self) -> &SignedData<'a> {
        &self.signed_data
    }

    /// Decodes the TSTInfo carried as the token's eContent.
    pub fn tst_info(&self) -> Result<TstInfo<'a>> {
        let encap = self.signed_data.encap_content_info();
        let offset = self.signed_data.raw().offset();
        if encap.content_type() != ID_CT_TST_INFO {
            return Err(Error::new(
                ErrorKind::UnsupportedContentType(encap.content_type()),
                offset,
            ));
        }
        let content = encap
            .content_node()
            .ok_or_else(|| Error::new(ErrorKind::MissingField("eContent"), offset))?;
        let node =
            mapper::decode_range(content.input(), content.content_range(), &TST_INFO, &self.config)?;
        TstInfo::from_node(&node)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MessageImprint<'a> {
    pub hash_algorithm: AlgorithmIdentifier<'a>,
    pub hashed_message: &'a [u8],
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Accuracy<'a> {
    pub seconds: Option<Integer<'a>>,
    pub millis: Option<Integer<'a>>,
    pub micros: Option<Integer<'a>>,
}

#[derive(Clone, Debug)]
pub struct TstInfo<'a> {
    raw: RawNode<'a>,
    version: Integer<'a>,
    policy: ObjectIdentifier,
    message_imprint: MessageImprint<'a>,
    serial_number: Integer<'a>,
    gen_time: RawNode<'a>,
    accuracy: Option<Accuracy<'a>>,
    ordering: bool,
    nonce: Option<Integer<'a>>,
    tsa: Option<RawNode<'a>>,
    extensions: Vec<Extension<'a>>,
}

impl<'a> TstInfo<'a> {
    fn from_node(node: &DecodedNode<'a>) -> Result<Self> {
        let imprint = node.require("messageImprint")?;
        let optional_integer = |parent: &DecodedNode<'a>, name: &str| -> Result<Option<Integer<'a>>> {
            parent.get(name).map(DecodedNode::integer).transpose()
        };
        let accuracy = match node.get("accuracy") {
            Some(accuracy) => Some(Accuracy {
                seconds: optional_integer(accuracy, "seconds")?,
                millis: optional_integer(accuracy, "millis")?,
                micros: optional_integer(accuracy, "micros")?,
            }),
            None => None,
        };
        let extensions = match node.get("extensions") {
            Some(extensions) => extensions
                .items()?
                .iter()
                .map(Extension::from_node)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            raw: node.as_raw(),
            version: node.require("version")?.integer()?,
            policy: node.require("policy")?.oid()?,
            message_imprint: MessageImprint {
                hash_algorithm: AlgorithmIdentifier::from_node(imprint.require("hashAlgorithm")?)?,
                hashed_message: imprint.require("hashedMessage")?.octets()?,
            },
            serial_number: node.require("serialNumber")?.integer()?,
            gen_time: node.require("genTime")?.as_raw(),
            accuracy,
            ordering: node.require("ordering")?.boolean()?,
            nonce: optional_integer(node, "nonce")?,
            tsa: node.get("tsa").map(DecodedNode::as_raw),
            extensions,
        })
    }

    pub fn raw(&self) -> RawNode<'a> {
        self.raw
    }

    pub fn version(&self) -> Integer<'a> {
        self.version
    }

    pub fn policy(&self) -> ObjectIdentifier {
        self.policy
    }

    pub fn message_imprint(&self) -> &MessageImprint<'a> {
        &self.message_imprint
    }

    pub fn serial_number(&self) -> Integer<'a> {
        self.serial_number
    }

    /// Parses genTime, which is kept raw until asked for.
    pub fn gen_time(&self) -> Result<Time> {
        self.gen_time.reparse(&GENERALIZED_TIME)?.time()
    }

    pub fn raw_gen_time(&self) -> RawNode<'a> {
        self.gen_time
    }

    pub fn accuracy(&self) -> Option<&Accuracy<'a>> {
        self.accuracy.as_ref()
    }

    pub fn ordering(&self) -> bool {
        self.ordering
    }

    pub fn nonce(&self) -> Option<Integer<'a>> {
        self.nonce
    }

    /// The `[0]` GeneralName of the authority, left encoded.
    pub fn tsa(&self) -> Option<RawNode<'a>> {
        self.tsa
    }

    pub fn extensions(&self) -> &[Extension<'a>] {
        &self.extensions
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    const TST_INFO_DER: [u8; 66] = hex!(
        "30 40 02 01 01 06 04 2a 03 04 01"
        "30 15 30 0d 06 09 60 86 48 01 65 03 04 02 01 05 00 04 04 de ad be ef"
        "02 01 2b"
        "18 0f 32 30 32 36 31 30 31 38 31 38 34 33 34 37 5a"
        "30 03 02 01 01"
        "01 01 ff"
        "02 02 33 47"
    );

    // Same, with a trailing zero in the genTime fraction.
    const BAD_GEN_TIME: [u8; 70] = hex!(
        "30 44 02 01 01 06 04 2a 03 04 01"
        "30 15 30 0d 06 09 60 86 48 01 65 03 04 02 01 05 00 04 04 de ad be ef"
        "02 01 2b"
        "18 13 32 30 32 34 30 36 31 34 32 30 33 37 35 36 2e 38 34 30 5a"
        "30 03 02 01 01"
        "01 01 ff"
        "02 02 33 47"
    );

    // SignerInfo without signed attributes whose unsigned attributes hold a countersignature and a
    // timestamp token under Microsoft's attribute type. The token is SignedData with no signers
    // around TST_INFO_DER.
    const UNSIGNED: [u8; 248] = hex!(
        "30 81 f5"
        "02 01 03 80 02 ab cd"
        "30 0b 06 09 60 86 48 01 65 03 04 02 01"
        "30 0a 06 08 2a 86 48 ce 3d 04 03 02"
        "04 02 01 02"
        "a1 81 ce"
        "30 4f 06 09 2a 86 48 86 f7 0d 01 09 06 31 42"
        "30 40 02 01 03 80 02 ab cd"
        "30 0b 06 09 60 86 48 01 65 03 04 02 01"
        "a0 1a 30 18 06 09 2a 86 48 86 f7 0d 01 09 03 31 0b 06 09 2a 86 48 86 f7 0d 01 07 01"
        "30 0a 06 08 2a 86 48 ce 3d 04 03 02"
        "04 02 03 04"
        "30 7b 06 0a 2b 06 01 04 01 82 37 03 03 01 31 6d"
        "30 6b 06 09 2a 86 48 86 f7 0d 01 07 02 a0 5e"
        "30 5c 02 01 03 31 00"
        "30 53 06 0b 2a 86 48 86 f7 0d 01 09 10 01 04 a0 44 04 42"
        "30 40 02 01 01 06 04 2a 03 04 01"
        "30 15 30 0d 06 09 60 86 48 01 65 03 04 02 01 05 00 04 04 de ad be ef"
        "02 01 2b"
        "18 0f 32 30 32 36 31 30 31 38 31 38 34 33 34 37 5a"
        "30 03 02 01 01"
        "01 01 ff"
        "02 02 33 47"
        "31 00"
    );

    fn signer(data: &[u8]) -> SignerInfo<'_> {
        let node = mapper::decode(data, &SIGNER_INFO).unwrap();
        SignerInfo::from_node(&node, &DecodeConfig::default()).unwrap()
    }

    fn tst_info(data: &[u8]) -> TstInfo<'_> {
        TstInfo::from_node(&mapper::decode(data, &TST_INFO).unwrap()).unwrap()
    }

    #[test]
    fn fields() {
        let info = tst_info(&TST_INFO_DER);
        assert_eq!(info.version().to_i64(), Some(1));
        assert_eq!(info.policy().to_string(), "1.2.3.4.1");
        assert_eq!(info.message_imprint().hashed_message, &hex!("de ad be ef"));
        assert_eq!(info.serial_number().to_u64(), Some(0x2b));
        assert_eq!(info.gen_time().unwrap().to_string(), "2026-10-18T18:43:47Z");
        let accuracy = info.accuracy().unwrap();
        assert_eq!(accuracy.seconds.and_then(|s| s.to_u64()), Some(1));
        assert!(accuracy.millis.is_none());
        assert!(info.ordering());
        assert_eq!(info.nonce().and_then(|n| n.to_u64()), Some(0x3347));
        assert!(info.tsa().is_none());
        assert!(info.extensions().is_empty());
    }

    #[test]
    fn bad_gen_time_does_not_hide_the_imprint() {
        let info = tst_info(&BAD_GEN_TIME);
        assert_eq!(info.message_imprint().hashed_message, &hex!("de ad be ef"));
        let err = info.gen_time().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidTime);
        assert_eq!(info.raw_gen_time().range(), 37..58);
    }

    #[test]
    fn counter_signature() {
        let signer = signer(&UNSIGNED);
        assert!(signer.signed_attrs().is_none());
        assert_eq!(signer.signing_time().unwrap(), None);

        let counters = signer.counter_signatures().unwrap();
        let [counter] = counters.as_slice() else {
            panic!("expected one countersignature");
        };
        assert_eq!(counter.raw().range(), 57..123);
        assert_eq!(
            counter.sid(),
            &crate::signer::SignerIdentifier::SubjectKeyIdentifier(&hex!("ab cd"))
        );
        assert_eq!(counter.signature(), &hex!("03 04"));
        assert_eq!(counter.signature_range(), 121..123);
        assert_eq!(
            counter.content_type().unwrap(),
            Some(ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1"))
        );
        assert!(counter.counter_signatures().unwrap().is_empty());
    }

    #[test]
    fn microsoft_timestamp_token() {
        let signer = signer(&UNSIGNED);
        let tokens = signer.timestamp_tokens().unwrap();
        let [token] = tokens.as_slice() else {
            panic!("expected one token");
        };
        assert_eq!(token.attribute_type(), MS_TIME_STAMP_TOKEN);
        assert_eq!(token.raw().range(), 139..248);
        assert!(token.signed_data().signer_infos().is_empty());

        let info = token.tst_info().unwrap();
        assert_eq!(info.raw().range(), 180..246);
        assert_eq!(info.raw().encoded(), &TST_INFO_DER);
        assert_eq!(info.serial_number().to_u64(), Some(0x2b));
        assert_eq!(info.gen_time().unwrap().to_string(), "2026-10-18T18:43:47Z");
    }
}
