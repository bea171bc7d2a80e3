//! Finite-field Diffie-Hellman key agreement.
//!
//! [`DhExchange`] is a linear state machine: parameters are fixed first,
//! then a key pair is generated, then the shared secret is computed from
//! the peer's public value. Regenerating the key pair is allowed and
//! discards the previous exponent; every other step is only reachable
//! from its predecessor. The private exponent is erased as soon as the
//! shared secret exists.

use num_bigint_dig::{BigUint, RandBigInt};
use picky_asn1::wrapper::IntegerAsn1;
use rand::rngs::OsRng;
use zeroize::Zeroize;

use crate::dhparams::{self, DhGroup};
use crate::error::{Error, ErrorKind, Result};
use crate::secret::Secret;

#[derive(Debug)]
enum DhState {
    Empty,
    ParamsChosen {
        p: BigUint,
        g: BigUint,
        q: Option<BigUint>,
    },
    KeyPairGenerated {
        p: BigUint,
        g: BigUint,
        q: Option<BigUint>,
        private: Secret<BigUint>,
        public: BigUint,
    },
    SharedSecretComputed {
        modulus_len: usize,
        public: BigUint,
        shared_secret: Secret<Vec<u8>>,
    },
}

impl DhState {
    fn name(&self) -> &'static str {
        match self {
            DhState::Empty => "Empty",
            DhState::ParamsChosen { .. } => "ParamsChosen",
            DhState::KeyPairGenerated { .. } => "KeyPairGenerated",
            DhState::SharedSecretComputed { .. } => "SharedSecretComputed",
        }
    }
}

#[derive(Debug)]
pub struct DhExchange {
    state: DhState,
}

impl DhExchange {
    pub fn new() -> Self {
        Self { state: DhState::Empty }
    }

    fn wrong_state(&self, operation: &str) -> Error {
        Error::new(
            ErrorKind::InvalidState,
            format!("{} is not valid in the {} state", operation, self.state.name()),
        )
    }

    /// Fixes the group to one of the canonical well-known groups.
    pub fn choose_group(&mut self, group: &DhGroup) -> Result<()> {
        if !matches!(self.state, DhState::Empty) {
            return Err(self.wrong_state("choose_group"));
        }

        self.state = DhState::ParamsChosen {
            p: group.p.clone(),
            g: group.g.clone(),
            q: Some(group.q.clone()),
        };

        Ok(())
    }

    /// Fixes the group to peer-supplied parameters. The caller is expected
    /// to have validated them first (see [`server_accept_parameters`]).
    pub fn accept_parameters(&mut self, p: BigUint, g: BigUint, q: Option<BigUint>) -> Result<()> {
        if !matches!(self.state, DhState::Empty) {
            return Err(self.wrong_state("accept_parameters"));
        }

        self.state = DhState::ParamsChosen { p, g, q };

        Ok(())
    }

    /// Generates an ephemeral key pair over the chosen group. The private
    /// exponent is drawn below the subgroup order when it is known, and
    /// below `p - 1` otherwise. Calling this again replaces the key pair;
    /// the old exponent is zeroized when its `Secret` drops.
    pub fn generate_key_pair(&mut self) -> Result<()> {
        let (p, g, q) = match &self.state {
            DhState::ParamsChosen { p, g, q } => (p, g, q),
            DhState::KeyPairGenerated { p, g, q, .. } => (p, g, q),
            _ => return Err(self.wrong_state("generate_key_pair")),
        };

        let one = BigUint::from(1u32);
        let exponent_bound = match q {
            Some(q) => q.clone(),
            None => p - &one,
        };

        let mut private = OsRng.gen_biguint_below(&exponent_bound);
        while private <= one {
            private = OsRng.gen_biguint_below(&exponent_bound);
        }

        let public = g.modpow(&private, p);

        self.state = DhState::KeyPairGenerated {
            p: p.clone(),
            g: g.clone(),
            q: q.clone(),
            private: Secret::new(private),
            public,
        };

        Ok(())
    }

    /// Computes the shared secret from the peer's public value and erases
    /// the private exponent. The result is left-padded with zeroes to the
    /// byte length of the modulus.
    pub fn compute_shared_secret(&mut self, peer_public: &BigUint) -> Result<()> {
        let DhState::KeyPairGenerated { p, private, public, .. } = &self.state else {
            return Err(self.wrong_state("compute_shared_secret"));
        };

        let one = BigUint::from(1u32);
        if *peer_public <= one || *peer_public >= p - &one {
            return Err(Error::new(
                ErrorKind::AgreementFailed,
                "peer DH public value out of range",
            ));
        }

        let modulus_len = (p.bits() + 7) / 8;
        let shared = peer_public.modpow(private.as_ref(), p);

        let mut raw = shared.to_bytes_be();
        let mut padded = vec![0u8; modulus_len - raw.len()];
        padded.extend_from_slice(&raw);
        raw.zeroize();

        self.state = DhState::SharedSecretComputed {
            modulus_len,
            public: public.clone(),
            shared_secret: Secret::new(padded),
        };

        Ok(())
    }

    /// Our public value as a DER-encoded INTEGER, the form PKINIT carries
    /// inside `subjectPublicKey`.
    pub fn public_value_der(&self) -> Result<Vec<u8>> {
        let public = match &self.state {
            DhState::KeyPairGenerated { public, .. } => public,
            DhState::SharedSecretComputed { public, .. } => public,
            _ => return Err(self.wrong_state("public_value_der")),
        };

        Ok(picky_asn1_der::to_vec(&IntegerAsn1::from_bytes_be_unsigned(
            public.to_bytes_be(),
        ))?)
    }

    pub fn shared_secret(&self) -> Result<&[u8]> {
        match &self.state {
            DhState::SharedSecretComputed { shared_secret, .. } => Ok(shared_secret.as_ref()),
            _ => Err(self.wrong_state("shared_secret")),
        }
    }

    pub fn modulus_len(&self) -> Result<usize> {
        match &self.state {
            DhState::Empty => Err(self.wrong_state("modulus_len")),
            DhState::ParamsChosen { p, .. } => Ok((p.bits() + 7) / 8),
            DhState::KeyPairGenerated { p, .. } => Ok((p.bits() + 7) / 8),
            DhState::SharedSecretComputed { modulus_len, .. } => Ok(*modulus_len),
        }
    }
}

impl Default for DhExchange {
    fn default() -> Self {
        Self::new()
    }
}

/// Client side: picks the weakest well-known group satisfying `min_bits`,
/// generates a key pair, and returns the exchange together with the DER
/// `DomainParameters` to send.
pub fn client_create_exchange(min_bits: u64) -> Result<(DhExchange, Vec<u8>)> {
    let group = dhparams::group_for_min_bits(min_bits)?;

    let mut exchange = DhExchange::new();
    exchange.choose_group(group)?;
    exchange.generate_key_pair()?;

    let encoded = dhparams::encode_domain_parameters(group)?;

    trace!(bits = group.bits(), "client DH exchange created");

    Ok((exchange, encoded))
}

/// Server side: decodes client-supplied `DomainParameters`, applies the
/// local strength policy, and accepts them only when they match a
/// well-known group or survive the structural checks.
pub fn server_accept_parameters(params_der: &[u8], min_bits: u64) -> Result<DhExchange> {
    let (p, g, q) = dhparams::decode_domain_parameters(params_der)?;

    if (p.bits() as u64) < min_bits {
        return Err(Error::new(
            ErrorKind::ParameterRejected,
            format!("client DH modulus is {} bits, policy requires {}", p.bits(), min_bits),
        ));
    }

    if dhparams::matches_well_known(&p, &g, q.as_ref()).is_none() {
        dhparams::check_parameters(&p, &g, q.as_ref())?;
        trace!(bits = p.bits(), "accepted non-canonical DH parameters");
    }

    let mut exchange = DhExchange::new();
    exchange.accept_parameters(p, g, q)?;

    Ok(exchange)
}

/// Decodes a peer public value carried as a DER INTEGER.
pub fn decode_public_value(der: &[u8]) -> Result<BigUint> {
    let value: IntegerAsn1 = picky_asn1_der::from_bytes(der)?;

    Ok(BigUint::from_bytes_be(value.as_unsigned_bytes_be()))
}
