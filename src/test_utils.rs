//! Certificate and CRL fixtures shared by the unit tests. Key generation
//! is expensive, so a fixed set of RSA keys is generated once and reused.

use lazy_static::lazy_static;
use oid::ObjectIdentifier;
use picky::key::PrivateKey;
use picky::x509::certificate::CertificateBuilder;
use picky::x509::date::UtcDate;
use picky::x509::name::DirectoryName;
use picky::x509::Cert;
use picky_asn1::bit_string::BitString;
use picky_asn1::date::GeneralizedTime;
use picky_asn1::restricted_string::{IA5String, Utf8String};
use picky_asn1::wrapper::{
    Asn1SequenceOf, BitStringAsn1, ExplicitContextTag0, GeneralizedTimeAsn1, IntegerAsn1, ObjectIdentifierAsn1,
    Optional, Utf8StringAsn1,
};
use picky_asn1_der::Asn1RawDer;
use picky_asn1_x509::name::{GeneralNames, OtherName};
use picky_asn1_x509::validity::Time;
use picky_asn1_x509::{AlgorithmIdentifier, Certificate, Extension, GeneralName, KeyUsage};
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha2::{Digest, Sha256};
use time::macros::datetime;
use time::OffsetDateTime;

use crate::identity::{Credential, FileKey};
use crate::kdf;
use crate::wire::{CertificateList, RevokedCertificate, TbsCertList};

lazy_static! {
    static ref AUTHORITY_KEY: PrivateKey = PrivateKey::generate_rsa(2048).unwrap();
    static ref OTHER_AUTHORITY_KEY: PrivateKey = PrivateKey::generate_rsa(2048).unwrap();
    static ref LEAF_KEY: PrivateKey = PrivateKey::generate_rsa(2048).unwrap();
    static ref PEER_KEY: PrivateKey = PrivateKey::generate_rsa(2048).unwrap();
    static ref AUTHORITY: TestAuthority = TestAuthority::new_root("Test Root CA", &AUTHORITY_KEY);
    static ref OTHER_AUTHORITY: TestAuthority = TestAuthority::new_root("Unrelated Root CA", &OTHER_AUTHORITY_KEY);
}

pub fn authority() -> &'static TestAuthority {
    &AUTHORITY
}

pub fn other_authority() -> &'static TestAuthority {
    &OTHER_AUTHORITY
}

pub fn leaf_key() -> &'static PrivateKey {
    &LEAF_KEY
}

pub fn peer_key() -> &'static PrivateKey {
    &PEER_KEY
}

/// A timestamp inside the validity window of every fixture certificate.
pub fn now() -> OffsetDateTime {
    datetime!(2030-06-01 0:00 UTC)
}

pub struct TestAuthority {
    pub certificate: Certificate,
    cert_der: Vec<u8>,
    key: &'static PrivateKey,
}

impl TestAuthority {
    fn new_root(name: &str, key: &'static PrivateKey) -> Self {
        let built = CertificateBuilder::new()
            .validity(UtcDate::ymd(2024, 1, 1).unwrap(), UtcDate::ymd(2044, 1, 1).unwrap())
            .self_signed(DirectoryName::new_common_name(name), key)
            .ca(true)
            .build()
            .unwrap();
        let cert_der = built.to_der().unwrap();

        Self {
            certificate: picky_asn1_der::from_bytes(&cert_der).unwrap(),
            cert_der,
            key,
        }
    }

    /// Issues an end-entity certificate, then appends `extensions` to the
    /// TBS and re-signs, since the builder does not know about the PKINIT
    /// extensions.
    pub fn issue(&self, common_name: &str, key: &PrivateKey, extensions: Vec<Extension>) -> Certificate {
        let issuer = Cert::from_der(&self.cert_der).unwrap();
        let built = CertificateBuilder::new()
            .validity(UtcDate::ymd(2024, 1, 1).unwrap(), UtcDate::ymd(2044, 1, 1).unwrap())
            .subject(DirectoryName::new_common_name(common_name), key.to_public_key().unwrap())
            .issuer_cert(&issuer, self.key)
            .build()
            .unwrap();

        let mut certificate: Certificate = picky_asn1_der::from_bytes(&built.to_der().unwrap()).unwrap();
        if !extensions.is_empty() {
            certificate.tbs_certificate.extensions.0 .0.extend(extensions);
            self.resign(&mut certificate);
        }

        certificate
    }

    /// Issues a subordinate CA usable as an intermediate.
    pub fn issue_authority(&self, name: &str, key: &'static PrivateKey) -> TestAuthority {
        let issuer = Cert::from_der(&self.cert_der).unwrap();
        let built = CertificateBuilder::new()
            .validity(UtcDate::ymd(2024, 1, 1).unwrap(), UtcDate::ymd(2044, 1, 1).unwrap())
            .subject(DirectoryName::new_common_name(name), key.to_public_key().unwrap())
            .issuer_cert(&issuer, self.key)
            .ca(true)
            .build()
            .unwrap();
        let cert_der = built.to_der().unwrap();

        TestAuthority {
            certificate: picky_asn1_der::from_bytes(&cert_der).unwrap(),
            cert_der,
            key,
        }
    }

    fn resign(&self, certificate: &mut Certificate) {
        let tbs = picky_asn1_der::to_vec(&certificate.tbs_certificate).unwrap();
        let signature = signing_key(self.key)
            .sign(Pkcs1v15Sign::new::<Sha256>(), &Sha256::digest(&tbs))
            .unwrap();
        certificate.signature_value = BitStringAsn1::from(BitString::with_bytes(signature));
    }

    /// A CRL signed by this authority listing `revoked_serials`.
    pub fn build_crl(&self, revoked_serials: &[IntegerAsn1], next_update: OffsetDateTime) -> CertificateList {
        let revoked: Vec<RevokedCertificate> = revoked_serials
            .iter()
            .map(|serial| RevokedCertificate {
                user_certificate: serial.clone(),
                revocation_date: asn1_time(datetime!(2029-01-01 0:00 UTC)),
                crl_entry_extensions: Optional::from(None),
            })
            .collect();

        let tbs_cert_list = TbsCertList {
            version: IntegerAsn1::from(vec![1]),
            signature: AlgorithmIdentifier::new_sha256_with_rsa_encryption(),
            issuer: self.certificate.tbs_certificate.subject.clone(),
            this_update: asn1_time(datetime!(2029-01-01 0:00 UTC)),
            next_update: asn1_time(next_update),
            revoked_certificates: Optional::from(if revoked.is_empty() {
                None
            } else {
                Some(Asn1SequenceOf::from(revoked))
            }),
            crl_extensions: Optional::from(None),
        };

        let encoded = picky_asn1_der::to_vec(&tbs_cert_list).unwrap();
        let signature = signing_key(self.key)
            .sign(Pkcs1v15Sign::new::<Sha256>(), &Sha256::digest(&encoded))
            .unwrap();

        CertificateList {
            tbs_cert_list,
            signature_algorithm: AlgorithmIdentifier::new_sha256_with_rsa_encryption(),
            signature_value: BitStringAsn1::from(BitString::with_bytes(signature)),
        }
    }
}

pub fn signing_key(key: &PrivateKey) -> RsaPrivateKey {
    RsaPrivateKey::try_from(key).unwrap()
}

fn asn1_time(datetime: OffsetDateTime) -> Time {
    Time::Generalized(GeneralizedTimeAsn1::from(GeneralizedTime::try_from(datetime).unwrap()))
}

pub fn key_usage_extension(first_byte: u8) -> Extension {
    let bits = BitStringAsn1::from(BitString::with_bytes(vec![first_byte]));
    let encoded = picky_asn1_der::to_vec(&bits).unwrap();
    let key_usage: KeyUsage = picky_asn1_der::from_bytes(&encoded).unwrap();

    Extension::new_key_usage(key_usage)
}

pub fn eku_extension(purposes: Vec<ObjectIdentifier>) -> Extension {
    Extension::new_extended_key_usage(purposes)
}

fn other_name(type_id: ObjectIdentifier, value_der: Vec<u8>) -> GeneralName {
    GeneralName::OtherName(OtherName {
        type_id: ObjectIdentifierAsn1::from(type_id),
        value: ExplicitContextTag0::from(Asn1RawDer(value_der)),
    })
}

pub fn pkinit_san_extension(realm: &str, components: &[&str]) -> Extension {
    let principal = kdf::principal_name(realm, 1, components).unwrap();
    let name = other_name(crate::oids::pkinit_san(), picky_asn1_der::to_vec(&principal).unwrap());

    Extension::new_subject_alt_name(GeneralNames::from(vec![name]))
}

pub fn upn_general_name(upn: &str) -> GeneralName {
    let value = picky_asn1_der::to_vec(&Utf8StringAsn1::from(Utf8String::from_string(upn.to_owned()).unwrap())).unwrap();

    other_name(picky_asn1_x509::oids::user_principal_name(), value)
}

pub fn dns_general_name(name: &str) -> GeneralName {
    GeneralName::DnsName(IA5String::from_string(name.to_owned()).unwrap().into())
}

pub fn san_extension(names: Vec<GeneralName>) -> Extension {
    Extension::new_subject_alt_name(GeneralNames::from(names))
}

pub fn upn_san_extension(upn: &str) -> Extension {
    san_extension(vec![upn_general_name(upn)])
}

pub fn dns_san_extension(name: &str) -> Extension {
    san_extension(vec![dns_general_name(name)])
}

/// digitalSignature plus keyEncipherment, the usual leaf profile.
pub const KU_DIGITAL_SIGNATURE: u8 = 0xa0;
/// keyEncipherment only.
pub const KU_NO_DIGITAL_SIGNATURE: u8 = 0x20;

pub fn client_extensions() -> Vec<Extension> {
    vec![
        key_usage_extension(KU_DIGITAL_SIGNATURE),
        eku_extension(vec![crate::oids::kp_pkinit_client_auth()]),
    ]
}

pub fn kdc_extensions() -> Vec<Extension> {
    vec![
        key_usage_extension(KU_DIGITAL_SIGNATURE),
        eku_extension(vec![crate::oids::kp_pkinit_kdc()]),
    ]
}

pub fn credential_for(certificate: Certificate, key: &PrivateKey) -> Credential {
    Credential::new(certificate, Box::new(FileKey::from_rsa_key(signing_key(key))))
}

/// A client credential chaining to the shared root authority.
pub fn client_credential() -> Credential {
    let certificate = AUTHORITY.issue("pkinit client", &LEAF_KEY, client_extensions());
    credential_for(certificate, &LEAF_KEY)
}

/// A KDC credential chaining to the shared root authority.
pub fn kdc_credential() -> Credential {
    let certificate = AUTHORITY.issue("pkinit kdc", &PEER_KEY, kdc_extensions());
    credential_for(certificate, &PEER_KEY)
}

/// A trust store holding the shared root as its only anchor.
pub fn store_with_root() -> crate::trust::TrustStore {
    let mut store = crate::trust::TrustStore::new();
    store.add_anchor(AUTHORITY.certificate.clone());
    store
}
