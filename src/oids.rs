//! Object identifiers specific to PKINIT that `picky_asn1_x509::oids` does
//! not provide. Standard CMS/X.509 identifiers are taken from picky directly.

use oid::ObjectIdentifier;

/// [PKINIT Algorithm Agility](https://www.rfc-editor.org/rfc/rfc8636.html#section-10)
/// id-pkinit-kdf-ah-sha1
pub fn kdf_ah_sha1() -> ObjectIdentifier {
    ObjectIdentifier::try_from("1.3.6.1.5.2.3.6.1").unwrap()
}

/// id-pkinit-kdf-ah-sha256
pub fn kdf_ah_sha256() -> ObjectIdentifier {
    ObjectIdentifier::try_from("1.3.6.1.5.2.3.6.2").unwrap()
}

/// id-pkinit-kdf-ah-sha512
pub fn kdf_ah_sha512() -> ObjectIdentifier {
    ObjectIdentifier::try_from("1.3.6.1.5.2.3.6.3").unwrap()
}

/// [PKINIT](https://www.rfc-editor.org/rfc/rfc4556.html#section-3.2.2)
/// id-pkinit-rkeyData. The KDC reply key pack content type used when the
/// public-key-encryption (non-DH) reply path is chosen.
pub fn pkinit_rkey_data() -> ObjectIdentifier {
    ObjectIdentifier::try_from("1.3.6.1.5.2.3.3").unwrap()
}

/// [PKINIT](https://www.rfc-editor.org/rfc/rfc4556.html#section-3.2.2)
/// id-pkinit-DHKeyData
pub fn pkinit_dh_key_data() -> ObjectIdentifier {
    ObjectIdentifier::try_from(picky_asn1_x509::oids::PKINIT_DH_KEY_DATA).unwrap()
}

/// id-pkinit-KPClientAuth. EKU carried by PKINIT client certificates.
pub fn kp_pkinit_client_auth() -> ObjectIdentifier {
    ObjectIdentifier::try_from("1.3.6.1.5.2.3.4").unwrap()
}

/// id-pkinit-KPKdc. EKU carried by PKINIT KDC certificates.
pub fn kp_pkinit_kdc() -> ObjectIdentifier {
    ObjectIdentifier::try_from("1.3.6.1.5.2.3.5").unwrap()
}

/// [PKINIT](https://www.rfc-editor.org/rfc/rfc4556.html#section-3.2.2)
/// id-pkinit-san. The otherName type-id carrying a KRB5PrincipalName.
pub fn pkinit_san() -> ObjectIdentifier {
    ObjectIdentifier::try_from("1.3.6.1.5.2.2").unwrap()
}

/// szOID_KP_SMARTCARD_LOGON. Microsoft EKU accepted as an alternative to
/// id-pkinit-KPClientAuth on client certificates.
pub fn kp_smartcard_logon() -> ObjectIdentifier {
    ObjectIdentifier::try_from("1.3.6.1.4.1.311.20.2.2").unwrap()
}

/// aes256-CBC, the EnvelopedData content cipher.
pub fn aes256_cbc() -> ObjectIdentifier {
    ObjectIdentifier::try_from("2.16.840.1.101.3.4.1.42").unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kdf_oids_are_distinct() {
        let oids = [kdf_ah_sha1(), kdf_ah_sha256(), kdf_ah_sha512()];
        for (i, a) in oids.iter().enumerate() {
            for b in &oids[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
