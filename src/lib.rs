//! Provides a strict DER decoder for CMS SignedData (RFC 5652) that keeps the exact bytes behind
//! every decoded value. This is not a signature verifier: it produces the structures and the
//! byte ranges (signed attributes re-tagged as a SET, signature octets, embedded certificates,
//! timestamp imprints) that a verifier needs, and leaves the cryptography to the caller.
//!
//! Decoding happens in layers. A [`Cursor`](cursor::Cursor) bounds every read, the
//! [TLV scanner](tlv) enforces DER identifier and length rules, and the [mapper] walks a
//! declarative [schema] from the [catalog](asn1) to build a [`DecodedNode`](node::DecodedNode)
//! tree. [`parse_signed_data`] turns that tree into the typed [`SignedData`] model.
//!
//! ```no_run
//! let der = std::fs::read("signature.p7s").unwrap();
//! let signed_data = cms_der_decode::parse_signed_data(&der).unwrap();
//! for signer in signed_data.signer_infos() {
//!     let signed = signer.signed_bytes(signed_data.encap_content_info());
//!     println!("{:?} signed {:?}", signer.sid(), signed.as_bytes().map(<[u8]>::len));
//! }
//! ```

pub mod asn1;
pub mod cert;
pub mod cursor;
mod error;
pub mod mapper;
pub mod node;
pub mod schema;
pub mod signed_data;
pub mod signer;
pub mod timestamp;
pub mod tlv;

pub use crate::error::{Error, ErrorKind, Result};
pub use crate::mapper::{decode, decode_with_config, DecodeConfig, DEFAULT_MAX_DEPTH};
pub use crate::signed_data::{
    parse_content_type, parse_content_type_with_config, parse_signed_data,
    parse_signed_data_with_config, AlgorithmIdentifier, CertificateChoice,
    EncapsulatedContentInfo, RevocationInfo, SignedData,
};
pub use crate::signer::{
    Attribute, Attributes, SignatureInput, SignedBytes, SignerIdentifier, SignerInfo,
};
pub use crate::timestamp::{TimestampToken, TstInfo};
