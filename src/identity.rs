//! Client identities: a certificate paired with a private-key provider,
//! and the store they are selected from.

use std::fmt;

use picky::key::PrivateKey;
use picky_asn1_x509::{AlgorithmIdentifier, Certificate, ShaVariant};
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey};
use sha1::{Digest, Sha1};
use sha2::Sha256;

use crate::error::{Error, ErrorKind, Result};
use crate::trust::{self, CertMatchingData};
use crate::wire::DigestInfo;

/// Upper bound on identities a store will hold.
pub const MAX_CREDENTIALS: usize = 20;

/// Hash negotiated for CMS signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureHash {
    Sha1,
    Sha256,
}

/// Interactive callback for identity selection and unlock prompts.
pub trait Prompter {
    fn prompt(&mut self, question: &str, hidden: bool) -> Result<String>;
}

/// Signing and key-transport operations a credential's private key must
/// provide, regardless of where the key lives.
pub trait PrivateKeyOperations {
    /// PKCS#1 v1.5 signature over `data`, digested with `hash`.
    fn sign(&self, hash: SignatureHash, data: &[u8]) -> Result<Vec<u8>>;

    /// PKCS#1 v1.5 decryption of an RSA-transported content key.
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// A private key loaded from a PEM file.
pub struct FileKey {
    key: RsaPrivateKey,
}

impl FileKey {
    pub fn from_pem_str(pem: &str) -> Result<Self> {
        let private_key = PrivateKey::from_pem_str(pem)
            .map_err(|err| Error::new(ErrorKind::ParseError, format!("invalid private key PEM: {:?}", err)))?;
        let key = RsaPrivateKey::try_from(&private_key)
            .map_err(|err| Error::new(ErrorKind::ParseError, format!("private key is not RSA: {:?}", err)))?;

        Ok(Self { key })
    }

    pub fn from_rsa_key(key: RsaPrivateKey) -> Self {
        Self { key }
    }
}

impl PrivateKeyOperations for FileKey {
    fn sign(&self, hash: SignatureHash, data: &[u8]) -> Result<Vec<u8>> {
        let signature = match hash {
            SignatureHash::Sha1 => self.key.sign(Pkcs1v15Sign::new::<Sha1>(), &Sha1::digest(data)),
            SignatureHash::Sha256 => self.key.sign(Pkcs1v15Sign::new::<Sha256>(), &Sha256::digest(data)),
        }
        .map_err(|err| Error::new(ErrorKind::TokenCommunicationError, format!("signing failed: {:?}", err)))?;

        Ok(signature)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.key
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|err| Error::new(ErrorKind::DecryptionFailed, format!("key transport failed: {:?}", err)))
    }
}

/// A provider that only implements the raw RSA primitive, as smart cards
/// without an on-card hash often do. The DigestInfo prefix is assembled
/// here and signed unprefixed.
pub struct RawRsaKey {
    key: RsaPrivateKey,
}

impl RawRsaKey {
    pub fn from_rsa_key(key: RsaPrivateKey) -> Self {
        Self { key }
    }
}

impl PrivateKeyOperations for RawRsaKey {
    fn sign(&self, hash: SignatureHash, data: &[u8]) -> Result<Vec<u8>> {
        let digest_info = match hash {
            SignatureHash::Sha1 => DigestInfo {
                digest_algorithm: AlgorithmIdentifier::new_sha(ShaVariant::SHA1),
                digest: Sha1::digest(data).to_vec().into(),
            },
            SignatureHash::Sha256 => DigestInfo {
                digest_algorithm: AlgorithmIdentifier::new_sha(ShaVariant::SHA2_256),
                digest: Sha256::digest(data).to_vec().into(),
            },
        };
        let encoded = picky_asn1_der::to_vec(&digest_info)?;

        self.key
            .sign(Pkcs1v15Sign::new_unprefixed(), &encoded)
            .map_err(|err| Error::new(ErrorKind::TokenCommunicationError, format!("signing failed: {:?}", err)))
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.key
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|err| Error::new(ErrorKind::DecryptionFailed, format!("key transport failed: {:?}", err)))
    }
}

/// One usable identity.
pub struct Credential {
    certificate: Certificate,
    key: Box<dyn PrivateKeyOperations + Send + Sync>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("certificate", &self.certificate)
            .finish_non_exhaustive()
    }
}

impl Credential {
    pub fn new(certificate: Certificate, key: Box<dyn PrivateKeyOperations + Send + Sync>) -> Self {
        Self { certificate, key }
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn matching_data(&self) -> Result<CertMatchingData> {
        trust::matching_data(&self.certificate)
    }

    pub fn sign(&self, hash: SignatureHash, data: &[u8]) -> Result<Vec<u8>> {
        self.key.sign(hash, data)
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.key.decrypt(ciphertext)
    }
}

/// Loaded identities awaiting selection. Selection moves the credential
/// out of the store; a slot can only be selected once.
#[derive(Default)]
pub struct CredentialStore {
    credentials: Vec<Option<Credential>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, credential: Credential) -> Result<()> {
        if self.credentials.len() >= MAX_CREDENTIALS {
            return Err(Error::new(
                ErrorKind::AllocationFailure,
                format!("credential store holds at most {} identities", MAX_CREDENTIALS),
            ));
        }

        self.credentials.push(Some(credential));

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.credentials.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Moves the credential at `index` out of the store.
    pub fn select(&mut self, index: usize) -> Result<Credential> {
        self.credentials
            .get_mut(index)
            .and_then(Option::take)
            .ok_or_else(|| Error::new(ErrorKind::NoCredentials, "no credential at the selected position"))
    }

    /// Moves out the first credential whose certificate satisfies
    /// `predicate`.
    pub fn select_matching<F>(&mut self, mut predicate: F) -> Result<Credential>
    where
        F: FnMut(&Certificate) -> bool,
    {
        let index = self
            .credentials
            .iter()
            .position(|slot| slot.as_ref().map(|credential| predicate(&credential.certificate)).unwrap_or(false))
            .ok_or_else(|| Error::new(ErrorKind::NoCredentials, "no credential matches"))?;

        self.select(index)
    }

    /// Asks the prompter to pick among the remaining identities. With a
    /// single remaining identity the prompter is not consulted.
    pub fn select_with_prompter(&mut self, prompter: &mut dyn Prompter) -> Result<Credential> {
        let available: Vec<usize> = self
            .credentials
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|_| index))
            .collect();

        match available.as_slice() {
            [] => Err(Error::new(ErrorKind::NoCredentials, "credential store is empty")),
            [only] => self.select(*only),
            available => {
                let mut question = String::from("Select an identity:\n");
                for (position, index) in available.iter().enumerate() {
                    let subject = self.credentials[*index]
                        .as_ref()
                        .map(|credential| trust::name_to_string(&credential.certificate.tbs_certificate.subject))
                        .unwrap_or_default();
                    question.push_str(&format!("{}: {}\n", position + 1, subject));
                }

                let answer = prompter.prompt(&question, false)?;
                let position: usize = answer
                    .trim()
                    .parse()
                    .map_err(|_| Error::new(ErrorKind::NoCredentials, "invalid identity selection"))?;

                let index = position
                    .checked_sub(1)
                    .and_then(|position| available.get(position).copied())
                    .ok_or_else(|| Error::new(ErrorKind::NoCredentials, "invalid identity selection"))?;

                self.select(index)
            }
        }
    }
}
