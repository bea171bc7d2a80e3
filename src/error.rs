use std::{error, fmt, io, result};

pub type Result<T> = result::Result<T, Error>;

/// Closed failure taxonomy for the PKINIT crypto core.
///
/// Low-level library errors are translated into one of these kinds at the
/// point of detection. The chain-validation kinds are deliberately distinct:
/// the KDC treats "definitely revoked" differently from "cannot check
/// revocation" or "cannot reach a trust anchor".
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed DER/ASN.1 input, or plaintext that fails to parse after
    /// decryption.
    ParseError,
    /// DH domain parameters are neither a well-known group nor pass the
    /// domain-parameter sanity check.
    ParameterRejected,
    /// Modular exponentiation or key generation failure. Fatal, never
    /// retried.
    AgreementFailed,
    SignatureInvalid,
    DigestMismatch,
    WrongContentType,
    CertificateRevoked,
    CertificateRevocationUnknown,
    CertificateChainUnverifiable,
    DecryptionFailed,
    /// A hardware token (or other external key provider) failed to answer.
    TokenCommunicationError,
    AllocationFailure,
    UnsupportedAlgorithm,
    /// State-machine misuse, e.g. computing a shared secret before a local
    /// keypair exists. A programming error, not a protocol condition.
    InvalidState,
    NoCredentials,
}

/// Holds the [`ErrorKind`] and the description of the error.
#[derive(Debug, Clone)]
pub struct Error {
    pub error_type: ErrorKind,
    pub description: String,
}

impl Error {
    /// Allows to fill a new error easily, supplying it with a coherent description.
    pub fn new(error_type: ErrorKind, description: impl Into<String>) -> Self {
        Self {
            error_type,
            description: description.into(),
        }
    }
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.error_type, self.description)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::new(ErrorKind::TokenCommunicationError, format!("IO error: {:?}", err))
    }
}

impl From<picky_asn1_der::Asn1DerError> for Error {
    fn from(err: picky_asn1_der::Asn1DerError) -> Self {
        Self::new(ErrorKind::ParseError, format!("ASN1 DER error: {:?}", err))
    }
}

impl From<picky_asn1::restricted_string::CharSetError> for Error {
    fn from(err: picky_asn1::restricted_string::CharSetError) -> Self {
        Self::new(ErrorKind::ParseError, format!("invalid character set: {:?}", err))
    }
}

impl From<rsa::errors::Error> for Error {
    fn from(err: rsa::errors::Error) -> Self {
        Self::new(ErrorKind::DecryptionFailed, format!("RSA error: {:?}", err))
    }
}

impl From<rand::Error> for Error {
    fn from(err: rand::Error) -> Self {
        Self::new(ErrorKind::AgreementFailed, format!("rand error: {:?}", err))
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        io::Error::new(
            io::ErrorKind::Other,
            format!("{:?}: {}", err.error_type, err.description),
        )
    }
}
