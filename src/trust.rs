//! Certificate chain evaluation, revocation checking, and PKINIT
//! certificate policy (key usages and subject alternative names).

use num_bigint_dig::BigUint;
use picky::hash::HashAlgorithm;
use picky::key::PublicKey as RsaPublicKey;
use picky::signature::SignatureAlgorithm;
use picky_asn1::wrapper::{
    BitStringAsn1, ImplicitContextTag0, ImplicitContextTag1, ImplicitContextTag2, IntegerAsn1, OctetStringAsn1,
    Optional, Utf8StringAsn1,
};
use picky_asn1_x509::signer_info::{CertificateSerialNumber, IssuerAndSerialNumber};
use picky_asn1_x509::validity::Time;
use picky_asn1_x509::{oids, AlgorithmIdentifier, Certificate, ExtensionView, GeneralName, Name, PublicKey};
use picky_krb::pkinit::ExternalPrincipalIdentifier;
use time::OffsetDateTime;

use crate::error::{Error, ErrorKind, Result};
use crate::wire::{CertificateList, Krb5PrincipalName};

const MAX_CHAIN_DEPTH: usize = 8;

bitflags::bitflags! {
    /// RFC 5280 keyUsage bits, most significant bit first.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct KeyUsageFlags: u8 {
        const DIGITAL_SIGNATURE = 0x80;
        const NON_REPUDIATION = 0x40;
        const KEY_ENCIPHERMENT = 0x20;
        const DATA_ENCIPHERMENT = 0x10;
        const KEY_AGREEMENT = 0x08;
        const KEY_CERT_SIGN = 0x04;
        const CRL_SIGN = 0x02;
        const ENCIPHER_ONLY = 0x01;
    }
}

/// A name taken from the subjectAltName extension. otherName entries with
/// an unrecognized type-id are skipped during extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum SubjectAltName {
    /// id-pkinit-san carrying a KRB5PrincipalName.
    PkinitPrincipal(Krb5PrincipalName),
    /// Microsoft UPN otherName.
    UserPrincipalName(String),
    DnsName(String),
}

/// Certificate attributes exposed for credential matching rules.
#[derive(Debug, Clone)]
pub struct CertMatchingData {
    pub subject: String,
    pub issuer: String,
    pub sans: Vec<SubjectAltName>,
    pub key_usage: Option<KeyUsageFlags>,
    pub eku_pkinit_client: bool,
    pub eku_smartcard_logon: bool,
}

/// Trust anchors, intermediates, and CRLs merged from every configured
/// source. Duplicates introduced by overlapping sources are dropped.
#[derive(Default)]
pub struct TrustStore {
    anchors: Vec<Certificate>,
    intermediates: Vec<Certificate>,
    crls: Vec<CertificateList>,
    /// When set, a certificate without usable revocation data fails the
    /// chain with `CertificateRevocationUnknown` instead of a warning.
    pub require_revocation_info: bool,
}

impl TrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_anchor(&mut self, certificate: Certificate) {
        if !self.anchors.contains(&certificate) {
            self.anchors.push(certificate);
        }
    }

    pub fn add_intermediate(&mut self, certificate: Certificate) {
        if !self.intermediates.contains(&certificate) {
            self.intermediates.push(certificate);
        }
    }

    pub fn add_crl(&mut self, crl: CertificateList) {
        if !self.crls.contains(&crl) {
            self.crls.push(crl);
        }
    }

    pub fn merge(&mut self, other: TrustStore) {
        for anchor in other.anchors {
            self.add_anchor(anchor);
        }
        for intermediate in other.intermediates {
            self.add_intermediate(intermediate);
        }
        for crl in other.crls {
            self.add_crl(crl);
        }
    }

    pub fn anchors(&self) -> &[Certificate] {
        &self.anchors
    }

    fn is_anchor(&self, certificate: &Certificate) -> bool {
        self.anchors.contains(certificate)
    }

    fn find_issuer(&self, issuer: &Name) -> Option<&Certificate> {
        self.anchors
            .iter()
            .chain(self.intermediates.iter())
            .find(|candidate| candidate.tbs_certificate.subject == *issuer)
    }

    pub fn find_by_issuer_serial(&self, issuer: &Name, serial_number: &IntegerAsn1) -> Option<&Certificate> {
        self.anchors
            .iter()
            .chain(self.intermediates.iter())
            .find(|candidate| {
                candidate.tbs_certificate.issuer == *issuer
                    && candidate.tbs_certificate.serial_number == *serial_number
            })
    }

    fn find_crl(&self, issuer: &Name) -> Option<&CertificateList> {
        self.crls.iter().find(|crl| crl.tbs_cert_list.issuer == *issuer)
    }

    /// Builds a verified chain from `leaf` to one of the anchors. The
    /// returned chain starts with the leaf and ends with the anchor. All
    /// failures are reported through the error kind: revoked, revocation
    /// status unknown, or unverifiable for everything else.
    pub fn build_chain(&self, leaf: &Certificate, now: OffsetDateTime) -> Result<Vec<Certificate>> {
        let mut chain = vec![leaf.clone()];

        loop {
            if chain.len() > MAX_CHAIN_DEPTH {
                return Err(Error::new(
                    ErrorKind::CertificateChainUnverifiable,
                    "certificate chain exceeds maximum depth",
                ));
            }

            let current = chain.last().cloned().unwrap_or_else(|| leaf.clone());
            check_validity_window(&current, now)?;

            let issuer_name = &current.tbs_certificate.issuer;
            let self_signed = current.tbs_certificate.subject == *issuer_name;

            if self_signed && self.is_anchor(&current) {
                verify_link(&current, &current)?;
                return Ok(chain);
            }

            let issuer = self.find_issuer(issuer_name).ok_or_else(|| {
                Error::new(
                    ErrorKind::CertificateChainUnverifiable,
                    format!("no trusted certificate found for issuer {}", name_to_string(issuer_name)),
                )
            })?;

            verify_link(&current, issuer)?;
            self.check_revocation(&current, issuer, now)?;

            chain.push(issuer.clone());

            if self.is_anchor(issuer) {
                check_validity_window(issuer, now)?;
                return Ok(chain);
            }
        }
    }

    fn check_revocation(&self, certificate: &Certificate, issuer: &Certificate, now: OffsetDateTime) -> Result<()> {
        let crl = match self.find_crl(&certificate.tbs_certificate.issuer) {
            Some(crl) => crl,
            None => return self.revocation_data_unavailable("no CRL available for issuer"),
        };

        let issuer_key = rsa_public_key(issuer)?;
        let algorithm = signature_algorithm(&crl.signature_algorithm)?;
        let tbs = picky_asn1_der::to_vec(&crl.tbs_cert_list)?;

        if algorithm
            .verify(&issuer_key, &tbs, crl.signature_value.0.payload_view())
            .is_err()
        {
            return self.revocation_data_unavailable("CRL signature does not verify");
        }

        if time_to_offset(&crl.tbs_cert_list.next_update)? < now {
            return self.revocation_data_unavailable("CRL is stale");
        }

        if let Some(revoked) = crl.tbs_cert_list.revoked_certificates.0.as_ref() {
            let serial = &certificate.tbs_certificate.serial_number;
            if revoked.0.iter().any(|entry| entry.user_certificate == *serial) {
                return Err(Error::new(
                    ErrorKind::CertificateRevoked,
                    format!(
                        "certificate {} is revoked",
                        name_to_string(&certificate.tbs_certificate.subject)
                    ),
                ));
            }
        }

        Ok(())
    }

    fn revocation_data_unavailable(&self, reason: &str) -> Result<()> {
        if self.require_revocation_info {
            Err(Error::new(ErrorKind::CertificateRevocationUnknown, reason))
        } else {
            warn!(reason, "continuing without revocation data");
            Ok(())
        }
    }

}

/// trustedCertifiers entries for the certificates of a verified chain:
/// subject DN, issuerAndSerialNumber, and the subjectKeyIdentifier when
/// the certificate carries that extension.
pub fn trusted_certifiers(chain: &[Certificate]) -> Result<Vec<ExternalPrincipalIdentifier>> {
    chain
        .iter()
        .map(|certificate| {
            let issuer_and_serial = picky_asn1_der::to_vec(&IssuerAndSerialNumber {
                issuer: certificate.tbs_certificate.issuer.clone(),
                serial_number: CertificateSerialNumber(certificate.tbs_certificate.serial_number.clone()),
            })?;

            Ok(ExternalPrincipalIdentifier {
                subject_name: Optional::from(Some(ImplicitContextTag0::from(OctetStringAsn1::from(
                    picky_asn1_der::to_vec(&certificate.tbs_certificate.subject)?,
                )))),
                issuer_and_serial_number: Optional::from(Some(ImplicitContextTag1::from(OctetStringAsn1::from(
                    issuer_and_serial,
                )))),
                subject_key_identifier: Optional::from(
                    subject_key_identifier(certificate)
                        .map(|skid| ImplicitContextTag2::from(OctetStringAsn1::from(skid))),
                ),
            })
        })
        .collect()
}

fn subject_key_identifier(certificate: &Certificate) -> Option<Vec<u8>> {
    certificate
        .tbs_certificate
        .extensions
        .0
         .0
        .iter()
        .find(|extension| extension.extn_id().0 == oids::subject_key_identifier())
        .and_then(|extension| match extension.extn_value() {
            ExtensionView::SubjectKeyIdentifier(skid) => Some(skid.0.clone()),
            _ => None,
        })
}

/// Public key of a certificate as a key picky can verify with. Only RSA
/// subject keys are supported.
pub(crate) fn rsa_public_key(certificate: &Certificate) -> Result<RsaPublicKey> {
    let public_key = match &certificate.tbs_certificate.subject_public_key_info.subject_public_key {
        PublicKey::Rsa(rsa) => &rsa.0,
        _ => {
            return Err(Error::new(
                ErrorKind::UnsupportedAlgorithm,
                "certificate public key is not RSA",
            ))
        }
    };

    Ok(RsaPublicKey::from_rsa_components(
        &BigUint::from_bytes_be(&public_key.modulus.0),
        &BigUint::from_bytes_be(&public_key.public_exponent.0),
    ))
}

fn signature_algorithm(algorithm: &AlgorithmIdentifier) -> Result<SignatureAlgorithm> {
    let oid = algorithm.oid();

    let hash = if *oid == oids::sha256_with_rsa_encryption() {
        HashAlgorithm::SHA2_256
    } else if *oid == oids::sha1_with_rsa_encryption() {
        HashAlgorithm::SHA1
    } else if *oid == oids::sha384_with_rsa_encryption() {
        HashAlgorithm::SHA2_384
    } else if *oid == oids::sha512_with_rsa_encryption() {
        HashAlgorithm::SHA2_512
    } else {
        return Err(Error::new(
            ErrorKind::UnsupportedAlgorithm,
            format!("unsupported certificate signature algorithm: {:?}", oid),
        ));
    };

    Ok(SignatureAlgorithm::RsaPkcs1v15(hash))
}

fn verify_link(certificate: &Certificate, issuer: &Certificate) -> Result<()> {
    let algorithm = signature_algorithm(&certificate.signature_algorithm)?;
    let issuer_key = rsa_public_key(issuer)?;
    let tbs = picky_asn1_der::to_vec(&certificate.tbs_certificate)?;

    algorithm
        .verify(&issuer_key, &tbs, certificate.signature_value.0.payload_view())
        .map_err(|_| {
            Error::new(
                ErrorKind::CertificateChainUnverifiable,
                format!(
                    "signature on {} does not verify against its issuer",
                    name_to_string(&certificate.tbs_certificate.subject)
                ),
            )
        })
}

fn check_validity_window(certificate: &Certificate, now: OffsetDateTime) -> Result<()> {
    let validity = &certificate.tbs_certificate.validity;

    if now < time_to_offset(&validity.not_before)? {
        return Err(Error::new(
            ErrorKind::CertificateChainUnverifiable,
            format!(
                "certificate {} is not yet valid",
                name_to_string(&certificate.tbs_certificate.subject)
            ),
        ));
    }

    if now > time_to_offset(&validity.not_after)? {
        return Err(Error::new(
            ErrorKind::CertificateChainUnverifiable,
            format!(
                "certificate {} is expired",
                name_to_string(&certificate.tbs_certificate.subject)
            ),
        ));
    }

    Ok(())
}

fn time_to_offset(time: &Time) -> Result<OffsetDateTime> {
    match time {
        Time::Utc(utc) => OffsetDateTime::try_from(utc.0.clone()),
        Time::Generalized(generalized) => OffsetDateTime::try_from(generalized.0.clone()),
    }
    .map_err(|_| Error::new(ErrorKind::ParseError, "certificate time out of range"))
}

pub(crate) fn name_to_string(name: &Name) -> String {
    if name.0 .0.iter().all(|rdn| rdn.0.is_empty()) {
        return "<unnamed>".to_owned();
    }

    // picky renders "CN=..,O=..,OU=.." in attribute order.
    name.to_string()
}

/// Names from the subjectAltName extension. An absent extension yields an
/// empty list. UPN and dNSName values containing an embedded NUL are
/// dropped from the result; the remaining entries are still returned.
pub fn extract_sans(certificate: &Certificate) -> Result<Vec<SubjectAltName>> {
    let extension = certificate
        .tbs_certificate
        .extensions
        .0
         .0
        .iter()
        .find(|extension| extension.extn_id().0 == oids::subject_alternative_name());

    let extension = match extension {
        Some(extension) => extension,
        None => return Ok(Vec::new()),
    };

    let ExtensionView::SubjectAltName(alternate_name) = extension.extn_value() else {
        return Err(Error::new(
            ErrorKind::ParseError,
            "malformed subject alternative name extension",
        ));
    };

    let mut sans = Vec::new();

    for name in alternate_name.0.iter() {
        match name {
            GeneralName::OtherName(other_name) => {
                if other_name.type_id.0 == crate::oids::pkinit_san() {
                    let principal: Krb5PrincipalName = picky_asn1_der::from_bytes(&other_name.value.0 .0)?;
                    sans.push(SubjectAltName::PkinitPrincipal(principal));
                } else if other_name.type_id.0 == oids::user_principal_name() {
                    let upn: Utf8StringAsn1 = picky_asn1_der::from_bytes(&other_name.value.0 .0)?;
                    let upn = upn.to_string();
                    if upn.contains('\0') {
                        warn!("skipping a UPN subject alternative name with an embedded NUL");
                        continue;
                    }
                    sans.push(SubjectAltName::UserPrincipalName(upn));
                } else {
                    trace!(type_id = ?other_name.type_id.0, "skipping unrecognized otherName");
                }
            }
            GeneralName::DnsName(dns_name) => {
                let dns_name = dns_name.to_string();
                if dns_name.contains('\0') {
                    warn!("skipping a dNSName subject alternative name with an embedded NUL");
                    continue;
                }
                sans.push(SubjectAltName::DnsName(dns_name));
            }
            _ => {}
        }
    }

    Ok(sans)
}

/// keyUsage bits, or `None` when the extension is absent. An absent
/// extension permits every usage.
pub fn key_usage(certificate: &Certificate) -> Result<Option<KeyUsageFlags>> {
    let extension = certificate
        .tbs_certificate
        .extensions
        .0
         .0
        .iter()
        .find(|extension| extension.extn_id().0 == oids::key_usage());

    let extension = match extension {
        Some(extension) => extension,
        None => return Ok(None),
    };

    let ExtensionView::KeyUsage(key_usage) = extension.extn_value() else {
        return Err(Error::new(ErrorKind::ParseError, "malformed key usage extension"));
    };

    let encoded = picky_asn1_der::to_vec(&key_usage)?;
    let bits: BitStringAsn1 = picky_asn1_der::from_bytes(&encoded)?;
    let first_byte = bits.0.payload_view().first().copied().unwrap_or(0);

    Ok(Some(KeyUsageFlags::from_bits_truncate(first_byte)))
}

fn extended_key_usage_contains(certificate: &Certificate, key_purpose: &oid::ObjectIdentifier) -> Result<bool> {
    let extension = certificate
        .tbs_certificate
        .extensions
        .0
         .0
        .iter()
        .find(|extension| extension.extn_id().0 == oids::extended_key_usage());

    let extension = match extension {
        Some(extension) => extension,
        None => return Ok(false),
    };

    let ExtensionView::ExtendedKeyUsage(ext_key_usage) = extension.extn_value() else {
        return Err(Error::new(
            ErrorKind::ParseError,
            "malformed extended key usage extension",
        ));
    };

    Ok(ext_key_usage.contains(key_purpose.clone()))
}

fn check_digital_signature(certificate: &Certificate) -> Result<()> {
    match key_usage(certificate)? {
        Some(usage) if !usage.contains(KeyUsageFlags::DIGITAL_SIGNATURE) => Err(Error::new(
            ErrorKind::CertificateChainUnverifiable,
            "certificate key usage does not allow digital signatures",
        )),
        _ => Ok(()),
    }
}

/// KDC certificate policy: digitalSignature plus the id-pkinit-KPKdc
/// key purpose. When `allow_secondary_usage` is set, serverAuth is
/// accepted in its place.
pub fn check_kdc_certificate(certificate: &Certificate, allow_secondary_usage: bool) -> Result<()> {
    check_digital_signature(certificate)?;

    if extended_key_usage_contains(certificate, &crate::oids::kp_pkinit_kdc())? {
        return Ok(());
    }

    if allow_secondary_usage && extended_key_usage_contains(certificate, &oids::kp_server_auth())? {
        return Ok(());
    }

    Err(Error::new(
        ErrorKind::CertificateChainUnverifiable,
        "KDC certificate lacks an acceptable key purpose",
    ))
}

/// Client certificate policy: digitalSignature plus either the
/// id-pkinit-KPClientAuth or the smartcard logon key purpose.
pub fn check_client_certificate(certificate: &Certificate) -> Result<()> {
    check_digital_signature(certificate)?;

    if extended_key_usage_contains(certificate, &crate::oids::kp_pkinit_client_auth())?
        || extended_key_usage_contains(certificate, &crate::oids::kp_smartcard_logon())?
    {
        return Ok(());
    }

    Err(Error::new(
        ErrorKind::CertificateChainUnverifiable,
        "client certificate lacks an acceptable key purpose",
    ))
}

/// Whether the certificate matches a kdcPkId hint (a DER-encoded
/// IssuerAndSerialNumber) sent by the client.
pub fn matches_kdc_pkid(certificate: &Certificate, pkid_der: &[u8]) -> Result<bool> {
    let pkid: IssuerAndSerialNumber = picky_asn1_der::from_bytes(pkid_der)?;

    Ok(certificate.tbs_certificate.issuer == pkid.issuer
        && certificate.tbs_certificate.serial_number == pkid.serial_number.0)
}

pub fn matching_data(certificate: &Certificate) -> Result<CertMatchingData> {
    Ok(CertMatchingData {
        subject: name_to_string(&certificate.tbs_certificate.subject),
        issuer: name_to_string(&certificate.tbs_certificate.issuer),
        sans: extract_sans(certificate)?,
        key_usage: key_usage(certificate)?,
        eku_pkinit_client: extended_key_usage_contains(certificate, &crate::oids::kp_pkinit_client_auth())?,
        eku_smartcard_logon: extended_key_usage_contains(certificate, &crate::oids::kp_smartcard_logon())?,
    })
}

#[cfg(test)]
mod tests {
    use picky::x509::name::DirectoryName;
    use picky_asn1_x509::NameAttr;
    use time::macros::datetime;

    use super::*;
    use crate::test_utils;

    #[test]
    fn chain_to_anchor_verifies() {
        let leaf = test_utils::authority().issue("leaf", test_utils::leaf_key(), test_utils::client_extensions());
        let store = test_utils::store_with_root();

        let chain = store.build_chain(&leaf, test_utils::now()).unwrap();

        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0], leaf);
        assert_eq!(chain[1], test_utils::authority().certificate);
    }

    #[test]
    fn chain_through_intermediate_verifies() {
        let intermediate = test_utils::authority().issue_authority("Intermediate CA", test_utils::peer_key());
        let leaf = intermediate.issue("leaf", test_utils::leaf_key(), test_utils::client_extensions());

        let mut store = test_utils::store_with_root();
        store.add_intermediate(intermediate.certificate.clone());

        let chain = store.build_chain(&leaf, test_utils::now()).unwrap();

        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn unknown_issuer_is_unverifiable() {
        let leaf =
            test_utils::other_authority().issue("stranger", test_utils::leaf_key(), test_utils::client_extensions());
        let store = test_utils::store_with_root();

        let err = store.build_chain(&leaf, test_utils::now()).unwrap_err();

        assert_eq!(err.error_type, ErrorKind::CertificateChainUnverifiable);
    }

    #[test]
    fn expired_certificate_is_unverifiable() {
        let leaf = test_utils::authority().issue("leaf", test_utils::leaf_key(), test_utils::client_extensions());
        let store = test_utils::store_with_root();

        let err = store.build_chain(&leaf, datetime!(2050-01-01 0:00 UTC)).unwrap_err();

        assert_eq!(err.error_type, ErrorKind::CertificateChainUnverifiable);
    }

    #[test]
    fn revoked_certificate_is_rejected() {
        let leaf = test_utils::authority().issue("leaf", test_utils::leaf_key(), test_utils::client_extensions());
        let crl = test_utils::authority().build_crl(
            std::slice::from_ref(&leaf.tbs_certificate.serial_number),
            datetime!(2035-01-01 0:00 UTC),
        );

        let mut store = test_utils::store_with_root();
        store.add_crl(crl);

        let err = store.build_chain(&leaf, test_utils::now()).unwrap_err();

        assert_eq!(err.error_type, ErrorKind::CertificateRevoked);
    }

    #[test]
    fn fresh_crl_without_the_serial_passes() {
        let leaf = test_utils::authority().issue("leaf", test_utils::leaf_key(), test_utils::client_extensions());
        let crl = test_utils::authority().build_crl(&[], datetime!(2035-01-01 0:00 UTC));

        let mut store = test_utils::store_with_root();
        store.require_revocation_info = true;
        store.add_crl(crl);

        store.build_chain(&leaf, test_utils::now()).unwrap();
    }

    #[test]
    fn stale_crl_downgrades_unless_revocation_is_required() {
        let leaf = test_utils::authority().issue("leaf", test_utils::leaf_key(), test_utils::client_extensions());
        let stale = test_utils::authority().build_crl(&[], datetime!(2025-01-01 0:00 UTC));

        let mut store = test_utils::store_with_root();
        store.add_crl(stale);
        store.build_chain(&leaf, test_utils::now()).unwrap();

        store.require_revocation_info = true;
        let err = store.build_chain(&leaf, test_utils::now()).unwrap_err();
        assert_eq!(err.error_type, ErrorKind::CertificateRevocationUnknown);
    }

    #[test]
    fn missing_crl_fails_when_revocation_is_required() {
        let leaf = test_utils::authority().issue("leaf", test_utils::leaf_key(), test_utils::client_extensions());

        let mut store = test_utils::store_with_root();
        store.require_revocation_info = true;

        let err = store.build_chain(&leaf, test_utils::now()).unwrap_err();

        assert_eq!(err.error_type, ErrorKind::CertificateRevocationUnknown);
    }

    #[test]
    fn pkinit_san_is_extracted() {
        let leaf = test_utils::authority().issue(
            "leaf",
            test_utils::leaf_key(),
            vec![test_utils::pkinit_san_extension("EXAMPLE.COM", &["alice"])],
        );

        let sans = extract_sans(&leaf).unwrap();

        assert_eq!(sans.len(), 1);
        let SubjectAltName::PkinitPrincipal(principal) = &sans[0] else {
            panic!("expected a PKINIT principal");
        };
        assert_eq!(principal.realm.0.to_string(), "EXAMPLE.COM");
    }

    #[test]
    fn upn_san_is_extracted() {
        let leaf = test_utils::authority().issue(
            "leaf",
            test_utils::leaf_key(),
            vec![test_utils::upn_san_extension("alice@example.com")],
        );

        let sans = extract_sans(&leaf).unwrap();

        assert_eq!(sans, vec![SubjectAltName::UserPrincipalName("alice@example.com".into())]);
    }

    #[test]
    fn upn_with_embedded_nul_is_excluded() {
        let leaf = test_utils::authority().issue(
            "leaf",
            test_utils::leaf_key(),
            vec![test_utils::san_extension(vec![
                test_utils::upn_general_name("alice@example.com\0.evil.test"),
                test_utils::dns_general_name("kdc.example.com"),
            ])],
        );

        let sans = extract_sans(&leaf).unwrap();

        assert_eq!(sans, vec![SubjectAltName::DnsName("kdc.example.com".to_owned())]);
    }

    #[test]
    fn dns_name_with_embedded_nul_is_excluded() {
        let leaf = test_utils::authority().issue(
            "leaf",
            test_utils::leaf_key(),
            vec![test_utils::san_extension(vec![
                test_utils::dns_general_name("kdc.example.com\0.evil.test"),
                test_utils::upn_general_name("alice@example.com"),
            ])],
        );

        let sans = extract_sans(&leaf).unwrap();

        assert_eq!(
            sans,
            vec![SubjectAltName::UserPrincipalName("alice@example.com".to_owned())]
        );
    }

    #[test]
    fn absent_san_extension_yields_no_names() {
        let leaf = test_utils::authority().issue("leaf", test_utils::leaf_key(), Vec::new());

        assert!(extract_sans(&leaf).unwrap().is_empty());
    }

    #[test]
    fn client_policy_accepts_pkinit_and_smartcard_purposes() {
        let authority = test_utils::authority();

        let pkinit = authority.issue("leaf", test_utils::leaf_key(), test_utils::client_extensions());
        check_client_certificate(&pkinit).unwrap();

        let smartcard = authority.issue(
            "leaf",
            test_utils::leaf_key(),
            vec![
                test_utils::key_usage_extension(test_utils::KU_DIGITAL_SIGNATURE),
                test_utils::eku_extension(vec![crate::oids::kp_smartcard_logon()]),
            ],
        );
        check_client_certificate(&smartcard).unwrap();

        let no_purpose = authority.issue(
            "leaf",
            test_utils::leaf_key(),
            vec![test_utils::key_usage_extension(test_utils::KU_DIGITAL_SIGNATURE)],
        );
        let err = check_client_certificate(&no_purpose).unwrap_err();
        assert_eq!(err.error_type, ErrorKind::CertificateChainUnverifiable);
    }

    #[test]
    fn absent_key_usage_extension_permits_signing() {
        let leaf = test_utils::authority().issue(
            "leaf",
            test_utils::leaf_key(),
            vec![test_utils::eku_extension(vec![crate::oids::kp_pkinit_client_auth()])],
        );

        assert_eq!(key_usage(&leaf).unwrap(), None);
        check_client_certificate(&leaf).unwrap();
    }

    #[test]
    fn key_usage_without_digital_signature_is_rejected() {
        let leaf = test_utils::authority().issue(
            "leaf",
            test_utils::leaf_key(),
            vec![
                test_utils::key_usage_extension(test_utils::KU_NO_DIGITAL_SIGNATURE),
                test_utils::eku_extension(vec![crate::oids::kp_pkinit_client_auth()]),
            ],
        );

        let err = check_client_certificate(&leaf).unwrap_err();

        assert_eq!(err.error_type, ErrorKind::CertificateChainUnverifiable);
    }

    #[test]
    fn kdc_policy_accepts_server_auth_only_as_secondary_usage() {
        let authority = test_utils::authority();

        let kdc = authority.issue("kdc", test_utils::peer_key(), test_utils::kdc_extensions());
        check_kdc_certificate(&kdc, false).unwrap();

        let server_auth = authority.issue(
            "kdc",
            test_utils::peer_key(),
            vec![
                test_utils::key_usage_extension(test_utils::KU_DIGITAL_SIGNATURE),
                test_utils::eku_extension(vec![oids::kp_server_auth()]),
            ],
        );
        check_kdc_certificate(&server_auth, true).unwrap();
        let err = check_kdc_certificate(&server_auth, false).unwrap_err();
        assert_eq!(err.error_type, ErrorKind::CertificateChainUnverifiable);
    }

    #[test]
    fn kdc_pkid_matches_issuer_and_serial() {
        let kdc = test_utils::authority().issue("kdc", test_utils::peer_key(), test_utils::kdc_extensions());
        let other = test_utils::other_authority().issue("kdc", test_utils::peer_key(), test_utils::kdc_extensions());

        let pkid = picky_asn1_der::to_vec(&IssuerAndSerialNumber {
            issuer: kdc.tbs_certificate.issuer.clone(),
            serial_number: picky_asn1_x509::signer_info::CertificateSerialNumber(
                kdc.tbs_certificate.serial_number.clone(),
            ),
        })
        .unwrap();

        assert!(matches_kdc_pkid(&kdc, &pkid).unwrap());
        assert!(!matches_kdc_pkid(&other, &pkid).unwrap());
    }

    #[test]
    fn trusted_certifiers_cover_the_verified_chain() {
        let leaf = test_utils::authority().issue("leaf", test_utils::leaf_key(), test_utils::client_extensions());
        let store = test_utils::store_with_root();
        let chain = store.build_chain(&leaf, test_utils::now()).unwrap();

        let certifiers = trusted_certifiers(&chain).unwrap();

        assert_eq!(certifiers.len(), chain.len());

        let subject = certifiers[1].subject_name.0.as_ref().unwrap();
        let name: Name = picky_asn1_der::from_bytes(&subject.0 .0).unwrap();
        assert_eq!(name_to_string(&name), "CN=Test Root CA");

        for (certifier, certificate) in certifiers.iter().zip(&chain) {
            let encoded = certifier.issuer_and_serial_number.0.as_ref().unwrap();
            let pkid: IssuerAndSerialNumber = picky_asn1_der::from_bytes(&encoded.0 .0).unwrap();
            assert_eq!(pkid.issuer, certificate.tbs_certificate.issuer);
            assert_eq!(pkid.serial_number.0, certificate.tbs_certificate.serial_number);
        }
    }

    #[test]
    fn subject_rendering_covers_more_than_the_common_name() {
        let mut subject = DirectoryName::new_common_name("User");
        subject.add_attr(NameAttr::OrganizationName, "Example Org");
        subject.add_attr(NameAttr::CountryName, "US");
        let name: Name = subject.into();

        let rendered = name_to_string(&name);

        assert!(rendered.contains("CN=User"));
        assert!(rendered.contains("O=Example Org"));
        assert!(rendered.contains("C=US"));
    }
}
