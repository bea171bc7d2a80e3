//! Derivation of the AS reply key from the DH shared secret.
//!
//! Two schemes: the original RFC 4556 iterated-SHA-1 construction
//! (`octet_string_to_key`) and the RFC 8636 agility KDF negotiated through
//! `supportedKDFs`.

use byteorder::{BigEndian, ByteOrder};
use oid::ObjectIdentifier;
use picky_asn1::restricted_string::IA5String;
use picky_asn1::wrapper::{
    Asn1SequenceOf, ExplicitContextTag0, ExplicitContextTag1, ExplicitContextTag2, IntegerAsn1,
    ObjectIdentifierAsn1, OctetStringAsn1,
};
use picky_krb::data_types::{KerberosStringAsn1, PrincipalName, Realm};
use sha1::{Digest, Sha1};
use sha2::{Sha256, Sha512};
use zeroize::Zeroizing;

use crate::error::{Error, ErrorKind, Result};
use crate::oids;
use crate::secret::Secret;
use crate::wire::{KdfAlgorithmId, Krb5PrincipalName, OtherInfo, PkinitSuppPubInfo};

const ANONYMOUS_REALM: &str = "WELLKNOWN:ANONYMOUS";
const ANONYMOUS_COMPONENTS: [&str; 2] = ["WELLKNOWN", "ANONYMOUS"];
// RFC 6111: KRB5_NT_WELLKNOWN.
const NT_WELLKNOWN: u8 = 11;

/// Kerberos AES encryption types this crate can derive keys for.
/// `random-to-key` is the identity function for all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enctype {
    Aes128CtsHmacSha196,
    Aes256CtsHmacSha196,
    Aes128CtsHmacSha256128,
    Aes256CtsHmacSha384192,
}

impl Enctype {
    pub fn number(self) -> u8 {
        match self {
            Enctype::Aes128CtsHmacSha196 => 17,
            Enctype::Aes256CtsHmacSha196 => 18,
            Enctype::Aes128CtsHmacSha256128 => 19,
            Enctype::Aes256CtsHmacSha384192 => 20,
        }
    }

    pub fn key_bytes(self) -> usize {
        match self {
            Enctype::Aes128CtsHmacSha196 | Enctype::Aes128CtsHmacSha256128 => 16,
            Enctype::Aes256CtsHmacSha196 | Enctype::Aes256CtsHmacSha384192 => 32,
        }
    }
}

impl TryFrom<u32> for Enctype {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            17 => Ok(Enctype::Aes128CtsHmacSha196),
            18 => Ok(Enctype::Aes256CtsHmacSha196),
            19 => Ok(Enctype::Aes128CtsHmacSha256128),
            20 => Ok(Enctype::Aes256CtsHmacSha384192),
            value => Err(Error::new(
                ErrorKind::UnsupportedAlgorithm,
                format!("unsupported encryption type: {}", value),
            )),
        }
    }
}

enum KdfHash {
    Sha1,
    Sha256,
    Sha512,
}

impl KdfHash {
    fn from_oid(kdf_id: &ObjectIdentifier) -> Result<Self> {
        if *kdf_id == oids::kdf_ah_sha1() {
            Ok(KdfHash::Sha1)
        } else if *kdf_id == oids::kdf_ah_sha256() {
            Ok(KdfHash::Sha256)
        } else if *kdf_id == oids::kdf_ah_sha512() {
            Ok(KdfHash::Sha512)
        } else {
            Err(Error::new(
                ErrorKind::UnsupportedAlgorithm,
                format!("unsupported KDF: {:?}", kdf_id),
            ))
        }
    }

    fn output_len(&self) -> usize {
        match self {
            KdfHash::Sha1 => 20,
            KdfHash::Sha256 => 32,
            KdfHash::Sha512 => 64,
        }
    }

    fn digest(&self, counter: &[u8], z: &[u8], other_info: &[u8]) -> Vec<u8> {
        match self {
            KdfHash::Sha1 => {
                let mut hasher = Sha1::new();
                hasher.update(counter);
                hasher.update(z);
                hasher.update(other_info);
                hasher.finalize().to_vec()
            }
            KdfHash::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(counter);
                hasher.update(z);
                hasher.update(other_info);
                hasher.finalize().to_vec()
            }
            KdfHash::Sha512 => {
                let mut hasher = Sha512::new();
                hasher.update(counter);
                hasher.update(z);
                hasher.update(other_info);
                hasher.finalize().to_vec()
            }
        }
    }
}

pub fn principal_name(realm: &str, name_type: u8, components: &[&str]) -> Result<Krb5PrincipalName> {
    let mut name_string = Vec::with_capacity(components.len());
    for component in components {
        name_string.push(KerberosStringAsn1::from(IA5String::from_string((*component).to_owned())?));
    }

    Ok(Krb5PrincipalName {
        realm: ExplicitContextTag0::from(Realm::from(IA5String::from_string(realm.to_owned())?)),
        principal_name: ExplicitContextTag1::from(PrincipalName {
            name_type: ExplicitContextTag0::from(IntegerAsn1::from(vec![name_type])),
            name_string: ExplicitContextTag1::from(Asn1SequenceOf::from(name_string)),
        }),
    })
}

/// The RFC 8062 anonymous principal in its canonical form.
pub fn anonymous_principal() -> Result<Krb5PrincipalName> {
    principal_name(ANONYMOUS_REALM, NT_WELLKNOWN, &ANONYMOUS_COMPONENTS)
}

fn is_anonymous(principal: &Krb5PrincipalName) -> bool {
    let components = &principal.principal_name.0.name_string.0 .0;

    components.len() == ANONYMOUS_COMPONENTS.len()
        && components
            .iter()
            .zip(ANONYMOUS_COMPONENTS.iter())
            .all(|(component, expected)| component.0.to_string() == *expected)
}

/// RFC 4556 key derivation: SHA-1 over a one-byte counter and the full
/// octet string, iterated until the buffer is as long as the input, then
/// truncated to the enctype's key size.
///
/// `dh_key` is the zero-padded shared secret with any client and server
/// nonces already appended.
pub fn octet_string_to_key(enctype: Enctype, dh_key: &[u8]) -> Result<Secret<Vec<u8>>> {
    let key_bytes = enctype.key_bytes();
    if dh_key.len() < key_bytes {
        return Err(Error::new(
            ErrorKind::AgreementFailed,
            "DH shared secret is shorter than the requested key",
        ));
    }

    let mut buf = Zeroizing::new(vec![0u8; dh_key.len()]);
    let mut filled = 0;
    let mut counter = 0u8;

    while filled < buf.len() {
        let mut hasher = Sha1::new();
        hasher.update([counter]);
        hasher.update(dh_key);
        let block = hasher.finalize();

        let take = block.len().min(buf.len() - filled);
        buf[filled..filled + take].copy_from_slice(&block[..take]);

        filled += take;
        counter = counter.wrapping_add(1);
    }

    Ok(Secret::new(buf[..key_bytes].to_vec()))
}

/// RFC 8636 agility KDF (SP 800-56A single-step, concatenation variant).
///
/// `client` and `server` bind the derived key to the principals of the
/// exchange; an anonymous client is replaced with the canonical anonymous
/// principal before encoding. `as_req` and `pk_as_rep` are the DER octets
/// of the corresponding messages.
pub fn agility_kdf(
    kdf_id: &ObjectIdentifier,
    shared_secret: &[u8],
    client: &Krb5PrincipalName,
    server: &Krb5PrincipalName,
    enctype: Enctype,
    as_req: &[u8],
    pk_as_rep: &[u8],
) -> Result<Secret<Vec<u8>>> {
    let hash = KdfHash::from_oid(kdf_id)?;

    let party_u_info = if is_anonymous(client) {
        picky_asn1_der::to_vec(&anonymous_principal()?)?
    } else {
        picky_asn1_der::to_vec(client)?
    };
    let party_v_info = picky_asn1_der::to_vec(server)?;

    let supp_pub_info = picky_asn1_der::to_vec(&PkinitSuppPubInfo {
        enctype: ExplicitContextTag0::from(IntegerAsn1::from(vec![enctype.number()])),
        as_req: ExplicitContextTag1::from(OctetStringAsn1::from(as_req.to_vec())),
        pk_as_rep: ExplicitContextTag2::from(OctetStringAsn1::from(pk_as_rep.to_vec())),
    })?;

    let other_info = picky_asn1_der::to_vec(&OtherInfo {
        algorithm_id: KdfAlgorithmId {
            algorithm: ObjectIdentifierAsn1::from(kdf_id.clone()),
        },
        party_u_info: ExplicitContextTag0::from(OctetStringAsn1::from(party_u_info)),
        party_v_info: ExplicitContextTag1::from(OctetStringAsn1::from(party_v_info)),
        supp_pub_info: ExplicitContextTag2::from(OctetStringAsn1::from(supp_pub_info)),
    })?;

    let key_bytes = enctype.key_bytes();
    let reps = (key_bytes + hash.output_len() - 1) / hash.output_len();

    // Zeroizing so partial blocks are wiped if derivation stops early.
    let mut derived = Zeroizing::new(Vec::with_capacity(reps * hash.output_len()));
    for counter in 1..=reps as u32 {
        let mut counter_be = [0u8; 4];
        BigEndian::write_u32(&mut counter_be, counter);

        derived.extend_from_slice(&hash.digest(&counter_be, shared_secret, &other_info));
    }

    Ok(Secret::new(derived[..key_bytes].to_vec()))
}
