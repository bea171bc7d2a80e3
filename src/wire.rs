//! ASN.1 structures used on the PKINIT wire that the picky crates do not
//! model: RFC 3279 DH domain parameters, the RFC 8636 KDF binding
//! structures, key-transport EnvelopedData, and a minimal CRL.

use picky_asn1::wrapper::{
    Asn1SequenceOf, Asn1SetOf, BitStringAsn1, ExplicitContextTag0, ExplicitContextTag1, ExplicitContextTag2,
    IntegerAsn1, ObjectIdentifierAsn1, OctetStringAsn1, Optional,
};
use picky_asn1_der::Asn1RawDer;
use picky_asn1_x509::cmsversion::CmsVersion;
use picky_asn1_x509::enveloped_data::EncryptedContentInfo;
use picky_asn1_x509::signer_info::IssuerAndSerialNumber;
use picky_asn1_x509::validity::Time;
use picky_asn1_x509::{AlgorithmIdentifier, Name};
use picky_krb::data_types::{PrincipalName, Realm};
use serde::{Deserialize, Serialize};

/// [Diffie-Hellman Key Exchange Keys](https://www.rfc-editor.org/rfc/rfc3279#section-2.3.3)
/// ```not_rust
/// ValidationParms ::= SEQUENCE {
///       seed             BIT STRING,
///       pgenCounter      INTEGER }
/// ```
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct ValidationParams {
    pub seed: BitStringAsn1,
    pub pgen_counter: IntegerAsn1,
}

/// [Diffie-Hellman Key Exchange Keys](https://www.rfc-editor.org/rfc/rfc3279#section-2.3.3)
/// ```not_rust
/// DomainParameters ::= SEQUENCE {
///       p       INTEGER, -- odd prime, p = jq +1
///       g       INTEGER, -- generator, g
///       q       INTEGER OPTIONAL, -- factor of p - 1
///       j       INTEGER OPTIONAL, -- subgroup factor
///       validationParms  ValidationParms OPTIONAL }
/// ```
///
/// Peers are permitted to omit `q`; its absence is not a parse error.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct DomainParameters {
    pub p: IntegerAsn1,
    pub g: IntegerAsn1,
    #[serde(default)]
    pub q: Optional<Option<IntegerAsn1>>,
    #[serde(default)]
    pub j: Optional<Option<IntegerAsn1>>,
    #[serde(default)]
    pub validation_params: Optional<Option<ValidationParams>>,
}

/// [PKINIT](https://www.rfc-editor.org/rfc/rfc4556.html#section-3.2.2)
/// ```not_rust
/// KRB5PrincipalName ::= SEQUENCE {
///     realm                   [0] Realm,
///     principalName           [1] PrincipalName
/// }
/// ```
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Krb5PrincipalName {
    pub realm: ExplicitContextTag0<Realm>,
    pub principal_name: ExplicitContextTag1<PrincipalName>,
}

/// [PKINIT Algorithm Agility](https://www.rfc-editor.org/rfc/rfc8636.html#section-4)
/// ```not_rust
/// PkinitSuppPubInfo ::= SEQUENCE {
///     enctype                 [0] Int32,
///     as-REQ                  [1] OCTET STRING,
///     pk-as-REP               [2] OCTET STRING
/// }
/// ```
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct PkinitSuppPubInfo {
    pub enctype: ExplicitContextTag0<IntegerAsn1>,
    pub as_req: ExplicitContextTag1<OctetStringAsn1>,
    pub pk_as_rep: ExplicitContextTag2<OctetStringAsn1>,
}

/// The `algorithmID` carried in [`OtherInfo`]. RFC 8636 KDF identifiers have
/// absent parameters, which the generic picky `AlgorithmIdentifier` does not
/// encode for arbitrary identifiers.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct KdfAlgorithmId {
    pub algorithm: ObjectIdentifierAsn1,
}

/// [PKINIT Algorithm Agility](https://www.rfc-editor.org/rfc/rfc8636.html#section-4)
/// ```not_rust
/// OtherInfo ::= SEQUENCE {
///     algorithmID             AlgorithmIdentifier,
///     partyUInfo              [0] OCTET STRING,
///     partyVInfo              [1] OCTET STRING,
///     suppPubInfo             [2] OCTET STRING
/// }
/// ```
///
/// `partyUInfo`/`partyVInfo` carry DER-encoded [`Krb5PrincipalName`] values.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct OtherInfo {
    pub algorithm_id: KdfAlgorithmId,
    pub party_u_info: ExplicitContextTag0<OctetStringAsn1>,
    pub party_v_info: ExplicitContextTag1<OctetStringAsn1>,
    pub supp_pub_info: ExplicitContextTag2<OctetStringAsn1>,
}

/// [CMS](https://www.rfc-editor.org/rfc/rfc5652#section-6.2.1)
/// ```not_rust
/// KeyTransRecipientInfo ::= SEQUENCE {
///     version CMSVersion,  -- always set to 0 or 2
///     rid RecipientIdentifier,
///     keyEncryptionAlgorithm KeyEncryptionAlgorithmIdentifier,
///     encryptedKey EncryptedKey
/// }
/// ```
///
/// Only the issuer-and-serial-number form of `RecipientIdentifier` is
/// produced or accepted; picky's own EnvelopedData models the KEK recipient
/// variant only, which PKINIT never uses.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct KeyTransRecipientInfo {
    pub version: CmsVersion,
    pub rid: IssuerAndSerialNumber,
    pub key_encryption_algorithm: AlgorithmIdentifier,
    pub encrypted_key: OctetStringAsn1,
}

/// [CMS](https://www.rfc-editor.org/rfc/rfc5652#section-6.1)
/// ```not_rust
/// EnvelopedData ::= SEQUENCE {
///     version CMSVersion,
///     originatorInfo [0] IMPLICIT OriginatorInfo OPTIONAL,
///     recipientInfos RecipientInfos,
///     encryptedContentInfo EncryptedContentInfo,
///     unprotectedAttrs [1] IMPLICIT UnprotectedAttributes OPTIONAL
/// }
/// ```
///
/// `originatorInfo` and `unprotectedAttrs` are never produced by PKINIT
/// peers and are not modeled.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct KeyTransEnvelopedData {
    pub version: CmsVersion,
    pub recipient_infos: Asn1SetOf<KeyTransRecipientInfo>,
    pub encrypted_content_info: EncryptedContentInfo,
}

/// [PKCS #1](https://www.rfc-editor.org/rfc/rfc8017#section-9.2)
/// ```not_rust
/// DigestInfo ::= SEQUENCE {
///     digestAlgorithm AlgorithmIdentifier,
///     digest OCTET STRING
/// }
/// ```
///
/// Assembled manually for signing providers that only implement raw
/// RSA-PKCS#1 without a hashing stage.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct DigestInfo {
    pub digest_algorithm: AlgorithmIdentifier,
    pub digest: OctetStringAsn1,
}

/// [CRL profile](https://www.rfc-editor.org/rfc/rfc5280#section-5.1)
/// ```not_rust
/// TBSCertList ::= SEQUENCE {
///     version                 Version,
///     signature               AlgorithmIdentifier,
///     issuer                  Name,
///     thisUpdate              Time,
///     nextUpdate              Time,
///     revokedCertificates     SEQUENCE OF RevokedCertificate OPTIONAL,
///     crlExtensions           [0] EXPLICIT Extensions OPTIONAL
/// }
/// ```
///
/// Version-2 CRLs only: the version field and `nextUpdate` are required
/// here even though the profile marks them optional. Every CRL issued this
/// century carries both.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct TbsCertList {
    pub version: IntegerAsn1,
    pub signature: AlgorithmIdentifier,
    pub issuer: Name,
    pub this_update: Time,
    pub next_update: Time,
    #[serde(default)]
    pub revoked_certificates: Optional<Option<Asn1SequenceOf<RevokedCertificate>>>,
    #[serde(default)]
    pub crl_extensions: Optional<Option<ExplicitContextTag0<Asn1RawDer>>>,
}

/// ```not_rust
/// RevokedCertificate ::= SEQUENCE {
///     userCertificate         CertificateSerialNumber,
///     revocationDate          Time,
///     crlEntryExtensions      Extensions OPTIONAL
/// }
/// ```
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct RevokedCertificate {
    pub user_certificate: IntegerAsn1,
    pub revocation_date: Time,
    #[serde(default)]
    pub crl_entry_extensions: Optional<Option<Asn1RawDer>>,
}

/// ```not_rust
/// CertificateList ::= SEQUENCE {
///     tbsCertList             TBSCertList,
///     signatureAlgorithm      AlgorithmIdentifier,
///     signatureValue          BIT STRING
/// }
/// ```
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct CertificateList {
    pub tbs_cert_list: TbsCertList,
    pub signature_algorithm: AlgorithmIdentifier,
    pub signature_value: BitStringAsn1,
}
