//! Well-known Oakley MODP groups and RFC 3279 `DomainParameters`
//! encoding, decoding, and validation.

use lazy_static::lazy_static;
use num_bigint_dig::prime::probably_prime;
use num_bigint_dig::BigUint;
use picky_asn1::wrapper::{IntegerAsn1, Optional};

use crate::error::{Error, ErrorKind, Result};
use crate::wire::DomainParameters;

// RFC 2412 Oakley group 2 and RFC 3526 groups 14 and 16. Generator is 2
// for all three; q = (p - 1) / 2 is a Sophie Germain prime by construction.
const MODP_1024_PRIME: [u8; 128] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xC9, 0x0F, 0xDA, 0xA2, 0x21, 0x68, 0xC2, 0x34,
    0xC4, 0xC6, 0x62, 0x8B, 0x80, 0xDC, 0x1C, 0xD1,
    0x29, 0x02, 0x4E, 0x08, 0x8A, 0x67, 0xCC, 0x74,
    0x02, 0x0B, 0xBE, 0xA6, 0x3B, 0x13, 0x9B, 0x22,
    0x51, 0x4A, 0x08, 0x79, 0x8E, 0x34, 0x04, 0xDD,
    0xEF, 0x95, 0x19, 0xB3, 0xCD, 0x3A, 0x43, 0x1B,
    0x30, 0x2B, 0x0A, 0x6D, 0xF2, 0x5F, 0x14, 0x37,
    0x4F, 0xE1, 0x35, 0x6D, 0x6D, 0x51, 0xC2, 0x45,
    0xE4, 0x85, 0xB5, 0x76, 0x62, 0x5E, 0x7E, 0xC6,
    0xF4, 0x4C, 0x42, 0xE9, 0xA6, 0x37, 0xED, 0x6B,
    0x0B, 0xFF, 0x5C, 0xB6, 0xF4, 0x06, 0xB7, 0xED,
    0xEE, 0x38, 0x6B, 0xFB, 0x5A, 0x89, 0x9F, 0xA5,
    0xAE, 0x9F, 0x24, 0x11, 0x7C, 0x4B, 0x1F, 0xE6,
    0x49, 0x28, 0x66, 0x51, 0xEC, 0xE6, 0x53, 0x81,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
];

const MODP_2048_PRIME: [u8; 256] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xC9, 0x0F, 0xDA, 0xA2, 0x21, 0x68, 0xC2, 0x34,
    0xC4, 0xC6, 0x62, 0x8B, 0x80, 0xDC, 0x1C, 0xD1,
    0x29, 0x02, 0x4E, 0x08, 0x8A, 0x67, 0xCC, 0x74,
    0x02, 0x0B, 0xBE, 0xA6, 0x3B, 0x13, 0x9B, 0x22,
    0x51, 0x4A, 0x08, 0x79, 0x8E, 0x34, 0x04, 0xDD,
    0xEF, 0x95, 0x19, 0xB3, 0xCD, 0x3A, 0x43, 0x1B,
    0x30, 0x2B, 0x0A, 0x6D, 0xF2, 0x5F, 0x14, 0x37,
    0x4F, 0xE1, 0x35, 0x6D, 0x6D, 0x51, 0xC2, 0x45,
    0xE4, 0x85, 0xB5, 0x76, 0x62, 0x5E, 0x7E, 0xC6,
    0xF4, 0x4C, 0x42, 0xE9, 0xA6, 0x37, 0xED, 0x6B,
    0x0B, 0xFF, 0x5C, 0xB6, 0xF4, 0x06, 0xB7, 0xED,
    0xEE, 0x38, 0x6B, 0xFB, 0x5A, 0x89, 0x9F, 0xA5,
    0xAE, 0x9F, 0x24, 0x11, 0x7C, 0x4B, 0x1F, 0xE6,
    0x49, 0x28, 0x66, 0x51, 0xEC, 0xE4, 0x5B, 0x3D,
    0xC2, 0x00, 0x7C, 0xB8, 0xA1, 0x63, 0xBF, 0x05,
    0x98, 0xDA, 0x48, 0x36, 0x1C, 0x55, 0xD3, 0x9A,
    0x69, 0x16, 0x3F, 0xA8, 0xFD, 0x24, 0xCF, 0x5F,
    0x83, 0x65, 0x5D, 0x23, 0xDC, 0xA3, 0xAD, 0x96,
    0x1C, 0x62, 0xF3, 0x56, 0x20, 0x85, 0x52, 0xBB,
    0x9E, 0xD5, 0x29, 0x07, 0x70, 0x96, 0x96, 0x6D,
    0x67, 0x0C, 0x35, 0x4E, 0x4A, 0xBC, 0x98, 0x04,
    0xF1, 0x74, 0x6C, 0x08, 0xCA, 0x18, 0x21, 0x7C,
    0x32, 0x90, 0x5E, 0x46, 0x2E, 0x36, 0xCE, 0x3B,
    0xE3, 0x9E, 0x77, 0x2C, 0x18, 0x0E, 0x86, 0x03,
    0x9B, 0x27, 0x83, 0xA2, 0xEC, 0x07, 0xA2, 0x8F,
    0xB5, 0xC5, 0x5D, 0xF0, 0x6F, 0x4C, 0x52, 0xC9,
    0xDE, 0x2B, 0xCB, 0xF6, 0x95, 0x58, 0x17, 0x18,
    0x39, 0x95, 0x49, 0x7C, 0xEA, 0x95, 0x6A, 0xE5,
    0x15, 0xD2, 0x26, 0x18, 0x98, 0xFA, 0x05, 0x10,
    0x15, 0x72, 0x8E, 0x5A, 0x8A, 0xAC, 0xAA, 0x68,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
];

const MODP_4096_PRIME: [u8; 512] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xC9, 0x0F, 0xDA, 0xA2, 0x21, 0x68, 0xC2, 0x34,
    0xC4, 0xC6, 0x62, 0x8B, 0x80, 0xDC, 0x1C, 0xD1,
    0x29, 0x02, 0x4E, 0x08, 0x8A, 0x67, 0xCC, 0x74,
    0x02, 0x0B, 0xBE, 0xA6, 0x3B, 0x13, 0x9B, 0x22,
    0x51, 0x4A, 0x08, 0x79, 0x8E, 0x34, 0x04, 0xDD,
    0xEF, 0x95, 0x19, 0xB3, 0xCD, 0x3A, 0x43, 0x1B,
    0x30, 0x2B, 0x0A, 0x6D, 0xF2, 0x5F, 0x14, 0x37,
    0x4F, 0xE1, 0x35, 0x6D, 0x6D, 0x51, 0xC2, 0x45,
    0xE4, 0x85, 0xB5, 0x76, 0x62, 0x5E, 0x7E, 0xC6,
    0xF4, 0x4C, 0x42, 0xE9, 0xA6, 0x37, 0xED, 0x6B,
    0x0B, 0xFF, 0x5C, 0xB6, 0xF4, 0x06, 0xB7, 0xED,
    0xEE, 0x38, 0x6B, 0xFB, 0x5A, 0x89, 0x9F, 0xA5,
    0xAE, 0x9F, 0x24, 0x11, 0x7C, 0x4B, 0x1F, 0xE6,
    0x49, 0x28, 0x66, 0x51, 0xEC, 0xE4, 0x5B, 0x3D,
    0xC2, 0x00, 0x7C, 0xB8, 0xA1, 0x63, 0xBF, 0x05,
    0x98, 0xDA, 0x48, 0x36, 0x1C, 0x55, 0xD3, 0x9A,
    0x69, 0x16, 0x3F, 0xA8, 0xFD, 0x24, 0xCF, 0x5F,
    0x83, 0x65, 0x5D, 0x23, 0xDC, 0xA3, 0xAD, 0x96,
    0x1C, 0x62, 0xF3, 0x56, 0x20, 0x85, 0x52, 0xBB,
    0x9E, 0xD5, 0x29, 0x07, 0x70, 0x96, 0x96, 0x6D,
    0x67, 0x0C, 0x35, 0x4E, 0x4A, 0xBC, 0x98, 0x04,
    0xF1, 0x74, 0x6C, 0x08, 0xCA, 0x18, 0x21, 0x7C,
    0x32, 0x90, 0x5E, 0x46, 0x2E, 0x36, 0xCE, 0x3B,
    0xE3, 0x9E, 0x77, 0x2C, 0x18, 0x0E, 0x86, 0x03,
    0x9B, 0x27, 0x83, 0xA2, 0xEC, 0x07, 0xA2, 0x8F,
    0xB5, 0xC5, 0x5D, 0xF0, 0x6F, 0x4C, 0x52, 0xC9,
    0xDE, 0x2B, 0xCB, 0xF6, 0x95, 0x58, 0x17, 0x18,
    0x39, 0x95, 0x49, 0x7C, 0xEA, 0x95, 0x6A, 0xE5,
    0x15, 0xD2, 0x26, 0x18, 0x98, 0xFA, 0x05, 0x10,
    0x15, 0x72, 0x8E, 0x5A, 0x8A, 0xAA, 0xC4, 0x2D,
    0xAD, 0x33, 0x17, 0x0D, 0x04, 0x50, 0x7A, 0x33,
    0xA8, 0x55, 0x21, 0xAB, 0xDF, 0x1C, 0xBA, 0x64,
    0xEC, 0xFB, 0x85, 0x04, 0x58, 0xDB, 0xEF, 0x0A,
    0x8A, 0xEA, 0x71, 0x57, 0x5D, 0x06, 0x0C, 0x7D,
    0xB3, 0x97, 0x0F, 0x85, 0xA6, 0xE1, 0xE4, 0xC7,
    0xAB, 0xF5, 0xAE, 0x8C, 0xDB, 0x09, 0x33, 0xD7,
    0x1E, 0x8C, 0x94, 0xE0, 0x4A, 0x25, 0x61, 0x9D,
    0xCE, 0xE3, 0xD2, 0x26, 0x1A, 0xD2, 0xEE, 0x6B,
    0xF1, 0x2F, 0xFA, 0x06, 0xD9, 0x8A, 0x08, 0x64,
    0xD8, 0x76, 0x02, 0x73, 0x3E, 0xC8, 0x6A, 0x64,
    0x52, 0x1F, 0x2B, 0x18, 0x17, 0x7B, 0x20, 0x0C,
    0xBB, 0xE1, 0x17, 0x57, 0x7A, 0x61, 0x5D, 0x6C,
    0x77, 0x09, 0x88, 0xC0, 0xBA, 0xD9, 0x46, 0xE2,
    0x08, 0xE2, 0x4F, 0xA0, 0x74, 0xE5, 0xAB, 0x31,
    0x43, 0xDB, 0x5B, 0xFC, 0xE0, 0xFD, 0x10, 0x8E,
    0x4B, 0x82, 0xD1, 0x20, 0xA9, 0x21, 0x08, 0x01,
    0x1A, 0x72, 0x3C, 0x12, 0xA7, 0x87, 0xE6, 0xD7,
    0x88, 0x71, 0x9A, 0x10, 0xBD, 0xBA, 0x5B, 0x26,
    0x99, 0xC3, 0x27, 0x18, 0x6A, 0xF4, 0xE2, 0x3C,
    0x1A, 0x94, 0x68, 0x34, 0xB6, 0x15, 0x0B, 0xDA,
    0x25, 0x83, 0xE9, 0xCA, 0x2A, 0xD4, 0x4C, 0xE8,
    0xDB, 0xBB, 0xC2, 0xDB, 0x04, 0xDE, 0x8E, 0xF9,
    0x2E, 0x8E, 0xFC, 0x14, 0x1F, 0xBE, 0xCA, 0xA6,
    0x28, 0x7C, 0x59, 0x47, 0x4E, 0x6B, 0xC0, 0x5D,
    0x99, 0xB2, 0x96, 0x4F, 0xA0, 0x90, 0xC3, 0xA2,
    0x23, 0x3B, 0xA1, 0x86, 0x51, 0x5B, 0xE7, 0xED,
    0x1F, 0x61, 0x29, 0x70, 0xCE, 0xE2, 0xD7, 0xAF,
    0xB8, 0x1B, 0xDD, 0x76, 0x21, 0x70, 0x48, 0x1C,
    0xD0, 0x06, 0x91, 0x27, 0xD5, 0xB0, 0x5A, 0xA9,
    0x93, 0xB4, 0xEA, 0x98, 0x8D, 0x8F, 0xDD, 0xC1,
    0x86, 0xFF, 0xB7, 0xDC, 0x90, 0xA6, 0xC0, 0x8F,
    0x4D, 0xF4, 0x35, 0xC9, 0x34, 0x06, 0x31, 0x99,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
];

/// Miller-Rabin rounds for peer-supplied parameter checks. Matches the
/// confidence level OpenSSL's `DH_check` uses for moduli of this size.
const PRIMALITY_ROUNDS: usize = 20;

/// One finite-field DH group: odd prime modulus, generator, and the prime
/// order of the subgroup generated by `g`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhGroup {
    pub p: BigUint,
    pub g: BigUint,
    pub q: BigUint,
}

impl DhGroup {
    fn from_oakley_prime(prime: &[u8]) -> Self {
        let p = BigUint::from_bytes_be(prime);
        let q = (&p - 1u32) >> 1;

        Self {
            p,
            g: BigUint::from(2u32),
            q,
        }
    }

    /// Bit length of the modulus.
    pub fn bits(&self) -> u64 {
        self.p.bits() as u64
    }

    /// Byte length of the modulus. Shared secrets are left-padded with
    /// zeroes to exactly this length.
    pub fn modulus_len(&self) -> usize {
        (self.p.bits() + 7) / 8
    }

    pub fn to_domain_parameters(&self) -> DomainParameters {
        DomainParameters {
            p: IntegerAsn1::from_bytes_be_unsigned(self.p.to_bytes_be()),
            g: IntegerAsn1::from_bytes_be_unsigned(self.g.to_bytes_be()),
            q: Optional::from(Some(IntegerAsn1::from_bytes_be_unsigned(self.q.to_bytes_be()))),
            j: Optional::from(None),
            validation_params: Optional::from(None),
        }
    }
}

lazy_static! {
    pub static ref MODP_1024: DhGroup = DhGroup::from_oakley_prime(&MODP_1024_PRIME);
    pub static ref MODP_2048: DhGroup = DhGroup::from_oakley_prime(&MODP_2048_PRIME);
    pub static ref MODP_4096: DhGroup = DhGroup::from_oakley_prime(&MODP_4096_PRIME);
}

/// All groups this implementation will offer, strongest last.
pub fn well_known_groups() -> [&'static DhGroup; 3] {
    [&MODP_1024, &MODP_2048, &MODP_4096]
}

/// Picks the weakest well-known group that still satisfies `min_bits`.
pub fn group_for_min_bits(min_bits: u64) -> Result<&'static DhGroup> {
    well_known_groups()
        .into_iter()
        .find(|group| group.bits() >= min_bits)
        .ok_or_else(|| {
            Error::new(
                ErrorKind::ParameterRejected,
                format!("no well-known DH group provides {} bits", min_bits),
            )
        })
}

/// DER-encodes the group as RFC 3279 `DomainParameters` (with `q` present).
pub fn encode_domain_parameters(group: &DhGroup) -> Result<Vec<u8>> {
    Ok(picky_asn1_der::to_vec(&group.to_domain_parameters())?)
}

/// Decodes DER `DomainParameters` into `(p, g, q)`. `q` may be absent.
pub fn decode_domain_parameters(data: &[u8]) -> Result<(BigUint, BigUint, Option<BigUint>)> {
    let params: DomainParameters = picky_asn1_der::from_bytes(data)?;

    let p = BigUint::from_bytes_be(params.p.as_unsigned_bytes_be());
    let g = BigUint::from_bytes_be(params.g.as_unsigned_bytes_be());
    let q = params
        .q
        .0
        .as_ref()
        .map(|q| BigUint::from_bytes_be(q.as_unsigned_bytes_be()));

    Ok((p, g, q))
}

/// Returns the canonical group matching the supplied parameters, if any.
/// A present `q` must also match; an absent one is accepted.
pub fn matches_well_known(p: &BigUint, g: &BigUint, q: Option<&BigUint>) -> Option<&'static DhGroup> {
    well_known_groups().into_iter().find(|group| {
        group.p == *p && group.g == *g && q.map(|q| group.q == *q).unwrap_or(true)
    })
}

/// Structural sanity check for parameters that did not match a well-known
/// group: `p` must be an odd probable prime, `g` must fall in `(1, p - 1)`,
/// and a supplied `q` must be a probable prime with `g^q = 1 (mod p)`.
pub fn check_parameters(p: &BigUint, g: &BigUint, q: Option<&BigUint>) -> Result<()> {
    let one = BigUint::from(1u32);

    if p.bits() < 2 || (p % 2u32) != one {
        return Err(Error::new(ErrorKind::ParameterRejected, "DH modulus is even"));
    }

    if *g <= one || *g >= p - &one {
        return Err(Error::new(
            ErrorKind::ParameterRejected,
            "DH generator out of range",
        ));
    }

    if !probably_prime(p, PRIMALITY_ROUNDS) {
        return Err(Error::new(
            ErrorKind::ParameterRejected,
            "DH modulus is not prime",
        ));
    }

    if let Some(q) = q {
        if !probably_prime(q, PRIMALITY_ROUNDS) {
            return Err(Error::new(
                ErrorKind::ParameterRejected,
                "DH subgroup order is not prime",
            ));
        }

        if g.modpow(q, p) != one {
            return Err(Error::new(
                ErrorKind::ParameterRejected,
                "DH generator does not generate the claimed subgroup",
            ));
        }
    }

    Ok(())
}
