//! CMS SignedData envelope
//!
//! Produces an attached-content envelope signed with SHA-1 and RSA, carrying
//! the signer certificate and its chain.

use chrono::{DateTime, Utc};
use openssl::hash::{hash, MessageDigest};
use openssl::pkey::Id;
use openssl::sign::Signer;

use super::der;
use super::identity::LoadedIdentity;
use super::SigningError;

const OID_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 1];
const OID_SIGNED_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 2];
const OID_SHA1: &[u64] = &[1, 3, 14, 3, 2, 26];
const OID_RSA_ENCRYPTION: &[u64] = &[1, 2, 840, 113549, 1, 1, 1];
const OID_CONTENT_TYPE: &[u64] = &[1, 2, 840, 113549, 1, 9, 3];
const OID_MESSAGE_DIGEST: &[u64] = &[1, 2, 840, 113549, 1, 9, 4];
const OID_SIGNING_TIME: &[u64] = &[1, 2, 840, 113549, 1, 9, 5];

fn algorithm(oid: &[u64]) -> Vec<u8> {
    der::sequence(&[der::oid(oid), der::null()])
}

fn attribute(oid: &[u64], value: Vec<u8>) -> Vec<u8> {
    der::sequence(&[der::oid(oid), der::set_of(vec![value])])
}

/// Encode a DER `ContentInfo` wrapping `SignedData` over `content`
pub fn signed_data(
    content: &[u8],
    identity: &LoadedIdentity,
    signing_time: DateTime<Utc>,
) -> Result<Vec<u8>, SigningError> {
    if identity.private_key.id() != Id::RSA {
        return Err(SigningError::KeyMaterial(
            "signing key must be an RSA key".to_string(),
        ));
    }

    let content_digest = hash(MessageDigest::sha1(), content)?;
    let attributes = der::sorted_concat(vec![
        attribute(OID_CONTENT_TYPE, der::oid(OID_DATA)),
        attribute(OID_SIGNING_TIME, der::time(signing_time)),
        attribute(OID_MESSAGE_DIGEST, der::octet_string(&content_digest)),
    ]);

    // The signature covers the attributes encoded as a universal SET
    let mut signer = Signer::new(MessageDigest::sha1(), &identity.private_key)?;
    signer.update(&der::tlv(der::TAG_SET, &attributes))?;
    let signature = signer.sign_to_vec()?;

    let certificate = &identity.certificate;
    let serial = certificate.serial_number().to_bn()?.to_vec();
    let issuer_and_serial = der::sequence(&[
        certificate.issuer_name().to_der()?,
        der::unsigned_integer(&serial),
    ]);

    let signer_info = der::sequence(&[
        der::small_integer(1),
        issuer_and_serial,
        algorithm(OID_SHA1),
        der::tlv(der::context(0), &attributes),
        algorithm(OID_RSA_ENCRYPTION),
        der::octet_string(&signature),
    ]);

    let mut certificates = vec![certificate.to_der()?];
    for extra in &identity.chain {
        certificates.push(extra.to_der()?);
    }

    let encapsulated = der::sequence(&[
        der::oid(OID_DATA),
        der::explicit(0, &der::octet_string(content)),
    ]);

    let signed = der::sequence(&[
        der::small_integer(1),
        der::set_of(vec![algorithm(OID_SHA1)]),
        encapsulated,
        der::tlv(der::context(0), &der::sorted_concat(certificates)),
        der::set_of(vec![signer_info]),
    ]);

    Ok(der::sequence(&[
        der::oid(OID_SIGNED_DATA),
        der::explicit(0, &signed),
    ]))
}
