//! Cryptographic core for PKINIT (RFC 4556) pre-authentication: Diffie-Hellman
//! key agreement over the Oakley well-known groups, the legacy and agility
//! (RFC 8636) key derivation functions, the CMS SignedData/EnvelopedData
//! shapes PKINIT exchanges, and the certificate trust policy for client and
//! KDC certificates.
//!
//! The crate is transport-agnostic: it produces and consumes DER blobs and
//! leaves the surrounding KDC exchange to the caller.

#[macro_use]
extern crate tracing;

pub mod cms;
pub mod dh;
pub mod dhparams;
pub mod error;
pub mod identity;
pub mod kdf;
pub mod oids;
pub mod secret;
pub mod trust;
pub mod wire;

#[cfg(test)]
mod test_utils;

pub use cms::{SignerRole, VerifiedSignedData, VerifyOptions};
pub use dh::DhExchange;
pub use error::{Error, ErrorKind, Result};
pub use identity::{Credential, CredentialStore, Prompter, SignatureHash};
pub use kdf::Enctype;
pub use secret::Secret;
pub use trust::TrustStore;
