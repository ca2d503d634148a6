//! Diffie-Hellman group used by the base OTs.
//!
//! This uses the Ristretto prime order elliptic curve group from the
//! `curve25519-dalek` library. The generator table is a constant of that
//! library, [`DhGroup`] is the immutable context every session holds on to.

use crate::error::{Error, Result};
use curve25519_dalek::{
    constants::RISTRETTO_BASEPOINT_TABLE,
    ristretto::{CompressedRistretto, RistrettoBasepointTable, RistrettoPoint},
    scalar::Scalar,
};
use rand::{CryptoRng, RngCore};
use std::fmt;

/// Size of a serialized group element.
pub const ELEMENT_BYTES: usize = 32;

#[derive(Clone, Copy)]
pub struct DhGroup {
    generator: &'static RistrettoBasepointTable,
}

impl Default for DhGroup {
    fn default() -> Self {
        DhGroup {
            generator: RISTRETTO_BASEPOINT_TABLE,
        }
    }
}

// the basepoint table has no Debug impl
impl fmt::Debug for DhGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DhGroup").finish_non_exhaustive()
    }
}

impl DhGroup {
    /// Sample a random non-zero exponent.
    pub fn random_exp<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Scalar {
        loop {
            let x = Scalar::random(&mut *rng);
            if x != Scalar::ZERO {
                return x;
            }
        }
    }

    /// `g^x` in multiplicative notation.
    pub fn exp(&self, x: &Scalar) -> RistrettoPoint {
        x * self.generator
    }
}

pub fn serialize(pt: &RistrettoPoint) -> [u8; ELEMENT_BYTES] {
    pt.compress().to_bytes()
}

pub fn deserialize(buf: &[u8]) -> Result<RistrettoPoint> {
    CompressedRistretto::from_slice(buf)
        .map_err(|_| Error::InvalidPoint)?
        .decompress()
        .ok_or(Error::InvalidPoint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize() {
        let group = DhGroup::default();
        let mut rng = rand::thread_rng();
        let x = group.random_exp(&mut rng);
        let pt = group.exp(&x);
        assert_eq!(deserialize(&serialize(&pt)).unwrap(), pt);
    }

    #[test]
    fn test_deserialize_invalid() {
        assert!(matches!(deserialize(&[0xff; 32]), Err(Error::InvalidPoint)));
        assert!(matches!(deserialize(&[0; 31]), Err(Error::InvalidPoint)));
    }

    #[test]
    fn test_dh_agreement() {
        let group = DhGroup::default();
        let mut rng = rand::thread_rng();
        let (a, b) = (group.random_exp(&mut rng), group.random_exp(&mut rng));
        assert_eq!(a * group.exp(&b), b * group.exp(&a));
    }

    #[test]
    fn test_debug() {
        assert_eq!(format!("{:?}", DhGroup::default()), "DhGroup { .. }");
    }
}
