//! CMS SignedData and EnvelopedData as PKINIT uses them: RSA signatures
//! over signed attributes, RSA key transport, AES-256-CBC content
//! encryption.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use oid::ObjectIdentifier;
use picky::hash::HashAlgorithm;
use picky::signature::SignatureAlgorithm;
use picky_asn1::wrapper::{
    Asn1SequenceOf, Asn1SetOf, ExplicitContextTag0, ImplicitContextTag0, ObjectIdentifierAsn1, OctetStringAsn1,
    Optional,
};
use picky_asn1_der::Asn1RawDer;
use picky_asn1_x509::attribute::{Attribute, AttributeValues};
use picky_asn1_x509::cmsversion::CmsVersion;
use picky_asn1_x509::content_info::{ContentValue, EncapsulatedContentInfo};
use picky_asn1_x509::enveloped_data::{ContentInfo, ContentType, EncryptedContent, EncryptedContentInfo};
use picky_asn1_x509::signed_data::{
    CertificateChoices, CertificateSet, DigestAlgorithmIdentifiers, SignedData, SignersInfos,
};
use picky_asn1_x509::signer_info::{
    Attributes, CertificateSerialNumber, DigestAlgorithmIdentifier, IssuerAndSerialNumber,
    SignatureAlgorithmIdentifier, SignatureValue, SignerIdentifier, SignerInfo, UnsignedAttributes,
};
use picky_asn1_x509::{
    oids, AesMode, AesParameters, AlgorithmIdentifier, AlgorithmIdentifierParameters, Certificate, PublicKey,
    ShaVariant,
};
use picky_krb::pkinit::ExternalPrincipalIdentifier;
use rand::rngs::OsRng;
use rand::RngCore;
use sha1::{Digest, Sha1};
use sha2::Sha256;
use time::OffsetDateTime;
use zeroize::Zeroizing;

use crate::error::{Error, ErrorKind, Result};
use crate::identity::{Credential, SignatureHash};
use crate::trust::{self, TrustStore};
use crate::wire::{KeyTransEnvelopedData, KeyTransRecipientInfo};

type Aes256CbcEncryptor = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDecryptor = cbc::Decryptor<aes::Aes256>;

const CEK_LEN: usize = 32;
const IV_LEN: usize = 16;

/// Policy applied to the signer certificate after chain validation.
#[derive(Debug, Clone, Copy)]
pub enum SignerRole {
    Client,
    Kdc { allow_secondary_usage: bool },
}

pub struct VerifyOptions<'a> {
    pub store: &'a TrustStore,
    pub expected_content_type: ObjectIdentifier,
    /// Accept id-data as eContentType, as old implementations emit.
    pub allow_legacy_content_type: bool,
    /// Accept an unsigned SignedData from an anonymous peer.
    pub accept_anonymous: bool,
    pub role: SignerRole,
}

/// Outcome of a successful verification. Constructed only after the
/// signature, digest, chain, and key purpose checks have all passed.
#[derive(Debug)]
pub struct VerifiedSignedData {
    pub content: Vec<u8>,
    /// `None` for an accepted anonymous message.
    pub signer_certificate: Option<Certificate>,
    pub chain: Vec<Certificate>,
    /// Identifiers for the verified chain to advertise back to a client,
    /// filled on client-role verification.
    pub trusted_certifiers: Vec<ExternalPrincipalIdentifier>,
}

fn digest_algorithm(hash: SignatureHash) -> AlgorithmIdentifier {
    match hash {
        SignatureHash::Sha1 => AlgorithmIdentifier::new_sha(ShaVariant::SHA1),
        SignatureHash::Sha256 => AlgorithmIdentifier::new_sha(ShaVariant::SHA2_256),
    }
}

fn compute_digest(hash: SignatureHash, data: &[u8]) -> Vec<u8> {
    match hash {
        SignatureHash::Sha1 => Sha1::digest(data).to_vec(),
        SignatureHash::Sha256 => Sha256::digest(data).to_vec(),
    }
}

fn generate_signer_info(
    credential: &Credential,
    content: &[u8],
    content_oid: ObjectIdentifier,
    hash: SignatureHash,
) -> Result<SignerInfo> {
    let digest = compute_digest(hash, content);

    let signed_attributes = Asn1SetOf::from(vec![
        Attribute {
            ty: ObjectIdentifierAsn1::from(oids::content_type()),
            value: AttributeValues::ContentType(Asn1SetOf::from(vec![ObjectIdentifierAsn1::from(content_oid)])),
        },
        Attribute {
            ty: ObjectIdentifierAsn1::from(oids::message_digest()),
            value: AttributeValues::MessageDigest(Asn1SetOf::from(vec![OctetStringAsn1::from(digest)])),
        },
    ]);

    let encoded_signed_attributes = picky_asn1_der::to_vec(&signed_attributes)?;
    let signature = credential.sign(hash, &encoded_signed_attributes)?;

    let certificate = credential.certificate();

    Ok(SignerInfo {
        version: CmsVersion::V1,
        sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
            issuer: certificate.tbs_certificate.issuer.clone(),
            serial_number: CertificateSerialNumber(certificate.tbs_certificate.serial_number.clone()),
        }),
        digest_algorithm: DigestAlgorithmIdentifier(digest_algorithm(hash)),
        signed_attrs: Optional::from(Attributes(Asn1SequenceOf::from(signed_attributes.0))),
        signature_algorithm: SignatureAlgorithmIdentifier(AlgorithmIdentifier::new_rsa_encryption()),
        signature: SignatureValue(OctetStringAsn1::from(signature)),
        unsigned_attrs: Optional::from(UnsignedAttributes(Vec::new())),
    })
}

/// Produces a DER ContentInfo wrapping a SignedData over `content` with
/// eContentType `content_oid`. With a credential, the signer certificate
/// plus `extra_certificates` are embedded and the signed attributes are
/// signed; without one, the degenerate unsigned form used by anonymous
/// PKINIT is produced.
pub fn create_signed_data(
    content: &[u8],
    content_oid: ObjectIdentifier,
    signer: Option<(&Credential, &[Certificate])>,
    hash: SignatureHash,
) -> Result<Vec<u8>> {
    let mut certificates = Vec::new();
    let mut digest_algorithms = Vec::new();
    let mut signer_infos = Vec::new();

    if let Some((credential, extra_certificates)) = signer {
        certificates.push(CertificateChoices::Certificate(Asn1RawDer(picky_asn1_der::to_vec(
            credential.certificate(),
        )?)));
        for certificate in extra_certificates {
            certificates.push(CertificateChoices::Certificate(Asn1RawDer(picky_asn1_der::to_vec(
                certificate,
            )?)));
        }

        digest_algorithms.push(digest_algorithm(hash));
        signer_infos.push(generate_signer_info(credential, content, content_oid.clone(), hash)?);
    }

    let signed_data = SignedData {
        version: CmsVersion::V3,
        digest_algorithms: DigestAlgorithmIdentifiers(Asn1SetOf::from(digest_algorithms)),
        content_info: EncapsulatedContentInfo::new(content_oid, Some(content.to_vec())),
        certificates: Optional::from(CertificateSet(certificates)),
        crls: None,
        signers_infos: SignersInfos(Asn1SetOf::from(signer_infos)),
    };

    Ok(picky_asn1_der::to_vec(&ContentInfo {
        content_type: ObjectIdentifierAsn1::from(oids::signed_data()),
        content: ExplicitContextTag0::from(Asn1RawDer(picky_asn1_der::to_vec(&signed_data)?)),
    })?)
}

enum ParsedSignedData {
    Signed(SignedData),
    /// Content wrapped directly in a ContentInfo typed with the purpose
    /// OID, with no SignedData at all. Only anonymous peers send this.
    UnsignedContent(Vec<u8>),
}

fn parse_signed_data(data: &[u8], expected_content_type: &ObjectIdentifier) -> Result<ParsedSignedData> {
    if let Ok(content_info) = picky_asn1_der::from_bytes::<ContentInfo>(data) {
        if content_info.content_type.0 == oids::signed_data() {
            return Ok(ParsedSignedData::Signed(picky_asn1_der::from_bytes(
                &content_info.content.0 .0,
            )?));
        }
        if content_info.content_type.0 == *expected_content_type {
            let content: OctetStringAsn1 = picky_asn1_der::from_bytes(&content_info.content.0 .0)?;
            return Ok(ParsedSignedData::UnsignedContent(content.0));
        }
    }

    // Old peers send the SignedData without the outer ContentInfo.
    Ok(ParsedSignedData::Signed(picky_asn1_der::from_bytes(data)?))
}

fn signer_hash(signer_info: &SignerInfo) -> Result<SignatureHash> {
    let oid = signer_info.digest_algorithm.0.oid();

    if *oid == oids::sha1() {
        Ok(SignatureHash::Sha1)
    } else if *oid == oids::sha256() {
        Ok(SignatureHash::Sha256)
    } else {
        Err(Error::new(
            ErrorKind::UnsupportedAlgorithm,
            format!("unsupported signer digest algorithm: {:?}", oid),
        ))
    }
}

fn message_digest_attribute(attributes: &[Attribute]) -> Result<Vec<u8>> {
    for attribute in attributes {
        if let AttributeValues::MessageDigest(values) = &attribute.value {
            if let Some(digest) = values.0.first() {
                return Ok(digest.0.clone());
            }
        }
    }

    Err(Error::new(
        ErrorKind::ParseError,
        "signed attributes lack a message-digest attribute",
    ))
}

fn find_signer_certificate(
    signed_data: &SignedData,
    signer_info: &SignerInfo,
    store: &TrustStore,
) -> Result<Certificate> {
    let SignerIdentifier::IssuerAndSerialNumber(sid) = &signer_info.sid else {
        return Err(Error::new(
            ErrorKind::ParseError,
            "subjectKeyIdentifier signer references are not supported",
        ));
    };

    for choice in &signed_data.certificates.0 .0 {
        let CertificateChoices::Certificate(raw) = choice else {
            continue;
        };
        let certificate: Certificate = picky_asn1_der::from_bytes(&raw.0)?;
        if certificate.tbs_certificate.issuer == sid.issuer
            && certificate.tbs_certificate.serial_number == sid.serial_number.0
        {
            return Ok(certificate);
        }
    }

    store
        .find_by_issuer_serial(&sid.issuer, &sid.serial_number.0)
        .cloned()
        .ok_or_else(|| {
            Error::new(
                ErrorKind::CertificateChainUnverifiable,
                "signer certificate is neither embedded nor known",
            )
        })
}

/// Verifies a SignedData and returns its content. The signature and
/// message digest are checked first, then the certificate chain, then the
/// key purpose for the given role. Chain, revocation, and purpose failures
/// keep their distinct error kinds so callers can map them to protocol
/// errors.
pub fn verify_signed_data(data: &[u8], now: OffsetDateTime, options: &VerifyOptions<'_>) -> Result<VerifiedSignedData> {
    let signed_data = match parse_signed_data(data, &options.expected_content_type)? {
        ParsedSignedData::Signed(signed_data) => signed_data,
        ParsedSignedData::UnsignedContent(content) => {
            if !options.accept_anonymous {
                return Err(Error::new(
                    ErrorKind::SignatureInvalid,
                    "unsigned data where a signature is required",
                ));
            }
            trace!("accepting bare unsigned content from an anonymous peer");
            return Ok(VerifiedSignedData {
                content,
                signer_certificate: None,
                chain: Vec::new(),
                trusted_certifiers: Vec::new(),
            });
        }
    };

    let content_type = &signed_data.content_info.content_type.0;
    if *content_type != options.expected_content_type {
        let legacy = options.allow_legacy_content_type && *content_type == oids::content_info_type_data();
        if !legacy {
            return Err(Error::new(
                ErrorKind::WrongContentType,
                format!(
                    "unexpected eContentType: {:?}, expected {:?}",
                    content_type, options.expected_content_type
                ),
            ));
        }
    }

    // picky yields `Data` for the id-data eContentType and `OctetString`
    // for everything else; both carry the same octets.
    let content = match signed_data.content_info.content.as_ref() {
        Some(content) => match &content.0 {
            ContentValue::OctetString(data) | ContentValue::Data(data) => data.0.clone(),
            _ => {
                return Err(Error::new(
                    ErrorKind::ParseError,
                    "signed data content has an unsupported encoding",
                ))
            }
        },
        None => Vec::new(),
    };

    let signer_infos = &signed_data.signers_infos.0 .0;
    let signer_info = match signer_infos.first() {
        Some(signer_info) => signer_info,
        None => {
            if options.accept_anonymous {
                trace!("accepting unsigned data from an anonymous peer");
                return Ok(VerifiedSignedData {
                    content,
                    signer_certificate: None,
                    chain: Vec::new(),
                    trusted_certifiers: Vec::new(),
                });
            }
            return Err(Error::new(
                ErrorKind::SignatureInvalid,
                "unsigned data where a signature is required",
            ));
        }
    };

    let hash = signer_hash(signer_info)?;
    let signer_certificate = find_signer_certificate(&signed_data, signer_info, options.store)?;

    // With signed attributes the signature covers the DER SET of
    // attributes and the content digest lives in one of them; without
    // them the signature covers the content directly.
    let signature_input = if signer_info.signed_attrs.0 .0 .0.is_empty() {
        content.clone()
    } else {
        let signed_attributes = Asn1SetOf::from(signer_info.signed_attrs.0 .0 .0.clone());

        let expected_digest = message_digest_attribute(&signed_attributes.0)?;
        if compute_digest(hash, &content) != expected_digest {
            return Err(Error::new(
                ErrorKind::DigestMismatch,
                "content digest does not match the message-digest attribute",
            ));
        }

        picky_asn1_der::to_vec(&signed_attributes)?
    };

    let picky_hash = match hash {
        SignatureHash::Sha1 => HashAlgorithm::SHA1,
        SignatureHash::Sha256 => HashAlgorithm::SHA2_256,
    };
    SignatureAlgorithm::RsaPkcs1v15(picky_hash)
        .verify(
            &trust::rsa_public_key(&signer_certificate)?,
            &signature_input,
            &signer_info.signature.0 .0,
        )
        .map_err(|_| Error::new(ErrorKind::SignatureInvalid, "signer signature is invalid"))?;

    let chain = options.store.build_chain(&signer_certificate, now)?;

    let trusted_certifiers = match options.role {
        SignerRole::Client => {
            trust::check_client_certificate(&signer_certificate)?;
            trust::trusted_certifiers(&chain)?
        }
        SignerRole::Kdc { allow_secondary_usage } => {
            trust::check_kdc_certificate(&signer_certificate, allow_secondary_usage)?;
            Vec::new()
        }
    };

    Ok(VerifiedSignedData {
        content,
        signer_certificate: Some(signer_certificate),
        chain,
        trusted_certifiers,
    })
}

fn recipient_rsa_key(certificate: &Certificate) -> Result<rsa::RsaPublicKey> {
    let public_key = match &certificate.tbs_certificate.subject_public_key_info.subject_public_key {
        PublicKey::Rsa(rsa) => &rsa.0,
        _ => {
            return Err(Error::new(
                ErrorKind::UnsupportedAlgorithm,
                "recipient public key is not RSA",
            ))
        }
    };

    rsa::RsaPublicKey::new(
        rsa::BigUint::from_bytes_be(&public_key.modulus.0),
        rsa::BigUint::from_bytes_be(&public_key.public_exponent.0),
    )
    .map_err(|err| Error::new(ErrorKind::ParseError, format!("invalid recipient RSA key: {:?}", err)))
}

/// Produces a DER ContentInfo wrapping an EnvelopedData for a single RSA
/// key-transport recipient, with the content under AES-256-CBC.
pub fn create_enveloped_data(content: &[u8], content_oid: ObjectIdentifier, recipient: &Certificate) -> Result<Vec<u8>> {
    let mut cek = Zeroizing::new([0u8; CEK_LEN]);
    OsRng.fill_bytes(cek.as_mut());
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEncryptor::new_from_slices(cek.as_ref(), &iv)
        .map_err(|_| Error::new(ErrorKind::AllocationFailure, "invalid content encryption key length"))?
        .encrypt_padded_vec_mut::<Pkcs7>(content);

    let encrypted_key = recipient_rsa_key(recipient)?
        .encrypt(&mut OsRng, rsa::Pkcs1v15Encrypt, cek.as_ref())
        .map_err(|err| Error::new(ErrorKind::AllocationFailure, format!("key transport failed: {:?}", err)))?;

    let enveloped_data = KeyTransEnvelopedData {
        version: CmsVersion::V0,
        recipient_infos: Asn1SetOf::from(vec![KeyTransRecipientInfo {
            version: CmsVersion::V0,
            rid: IssuerAndSerialNumber {
                issuer: recipient.tbs_certificate.issuer.clone(),
                serial_number: CertificateSerialNumber(recipient.tbs_certificate.serial_number.clone()),
            },
            key_encryption_algorithm: AlgorithmIdentifier::new_rsa_encryption(),
            encrypted_key: OctetStringAsn1::from(encrypted_key),
        }]),
        encrypted_content_info: EncryptedContentInfo {
            content_type: ContentType::from(content_oid),
            content_encryption_algorithm: AlgorithmIdentifier::new_aes256(
                AesMode::Cbc,
                AesParameters::InitializationVector(OctetStringAsn1::from(iv.to_vec())),
            ),
            encrypted_content: Optional::from(Some(ImplicitContextTag0::from(EncryptedContent::from(ciphertext)))),
        },
    };

    Ok(picky_asn1_der::to_vec(&ContentInfo {
        content_type: ObjectIdentifierAsn1::from(oids::enveloped_data()),
        content: ExplicitContextTag0::from(Asn1RawDer(picky_asn1_der::to_vec(&enveloped_data)?)),
    })?)
}

fn parse_enveloped_data(data: &[u8]) -> Result<KeyTransEnvelopedData> {
    if let Ok(content_info) = picky_asn1_der::from_bytes::<ContentInfo>(data) {
        if content_info.content_type.0 == oids::enveloped_data() {
            return Ok(picky_asn1_der::from_bytes(&content_info.content.0 .0)?);
        }
    }

    Ok(picky_asn1_der::from_bytes(data)?)
}

/// Decrypts an EnvelopedData addressed to `credential`. A failed RSA key
/// transport is replaced with a random content key rather than reported,
/// so a padding oracle cannot be distinguished from malformed content:
/// both surface as a parse failure of the decrypted bytes.
pub fn decrypt_enveloped_data(
    data: &[u8],
    expected_content_type: &ObjectIdentifier,
    credential: &Credential,
) -> Result<Vec<u8>> {
    let enveloped_data = parse_enveloped_data(data)?;

    let recipient_info = match enveloped_data.recipient_infos.0.as_slice() {
        [recipient_info] => recipient_info,
        infos => {
            return Err(Error::new(
                ErrorKind::ParseError,
                format!("expected exactly one recipient info, got {}", infos.len()),
            ))
        }
    };

    if *recipient_info.key_encryption_algorithm.oid() != oids::rsa_encryption() {
        return Err(Error::new(
            ErrorKind::UnsupportedAlgorithm,
            "unsupported key encryption algorithm",
        ));
    }

    let encrypted_content_info = &enveloped_data.encrypted_content_info;
    if encrypted_content_info.content_type.0 != *expected_content_type {
        return Err(Error::new(
            ErrorKind::WrongContentType,
            format!("unexpected encrypted content type: {:?}", encrypted_content_info.content_type.0),
        ));
    }

    let content_encryption_algorithm = &encrypted_content_info.content_encryption_algorithm;
    if *content_encryption_algorithm.oid() != crate::oids::aes256_cbc() {
        return Err(Error::new(
            ErrorKind::UnsupportedAlgorithm,
            "unsupported content encryption algorithm",
        ));
    }

    let iv = match content_encryption_algorithm.parameters() {
        AlgorithmIdentifierParameters::Aes(AesParameters::InitializationVector(iv)) => iv.0.as_slice(),
        _ => {
            return Err(Error::new(
                ErrorKind::ParseError,
                "content encryption algorithm lacks an initialization vector",
            ))
        }
    };

    let ciphertext = encrypted_content_info
        .encrypted_content
        .0
        .as_ref()
        .ok_or_else(|| Error::new(ErrorKind::ParseError, "enveloped data has no encrypted content"))?
        .0
         .0
        .clone();

    // Generated up front so a key transport failure below costs the same
    // code path as success.
    let mut fallback = Zeroizing::new(vec![0u8; CEK_LEN]);
    OsRng.fill_bytes(fallback.as_mut());

    let cek = match credential.decrypt(&recipient_info.encrypted_key.0) {
        Ok(key) if key.len() == CEK_LEN => Zeroizing::new(key),
        _ => fallback,
    };

    Aes256CbcDecryptor::new_from_slices(cek.as_ref(), iv)
        .map_err(|_| Error::new(ErrorKind::ParseError, "invalid initialization vector length"))?
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| Error::new(ErrorKind::ParseError, "malformed enveloped content"))
}

/// The KDC reply path: an EnvelopedData whose content is a SignedData.
/// Decrypts with the recipient credential, then verifies the inner
/// SignedData under `options`.
pub fn decrypt_and_verify(
    data: &[u8],
    credential: &Credential,
    now: OffsetDateTime,
    options: &VerifyOptions<'_>,
) -> Result<VerifiedSignedData> {
    let inner = decrypt_enveloped_data(data, &oids::signed_data(), credential)?;

    verify_signed_data(&inner, now, options)
}
