//! Commit-reveal coin tossing.
//!
//! The committer binds itself to a random seed with a hash commitment, the
//! responder answers with its own seed in the clear, then the committer opens
//! the commitment. The joint seed is the XOR of both and is stretched with
//! [`AesRng`] to the requested length.

use super::utils::{
    aes_rng::{AesRng, SEED_BYTES},
    hash::{digest, HASH_BYTES},
    xor_inplace,
};
use crate::{
    channel::Channel,
    error::{Error, Result},
};
use rand::RngCore;
use rand_core::SeedableRng;
use serde::{Deserialize, Serialize};

const NONCE_BYTES: usize = 32;

/// Side of a coin toss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Committer,
    Responder,
}

/// Opening of a hash commitment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decommitment {
    nonce: [u8; NONCE_BYTES],
    data: Vec<u8>,
}

impl Decommitment {
    /// Create a new [`Decommitment`] of `data` with a fresh random nonce.
    pub fn new(data: Vec<u8>) -> Self {
        let mut nonce = [0u8; NONCE_BYTES];
        rand::thread_rng().fill_bytes(&mut nonce);
        Self { nonce, data }
    }

    pub fn commit(&self) -> [u8; HASH_BYTES] {
        let mut buf = Vec::with_capacity(NONCE_BYTES + self.data.len());
        buf.extend_from_slice(&self.nonce);
        buf.extend_from_slice(&self.data);
        digest(b"commitment", &buf)
    }

    pub fn verify(&self, commitment: &[u8]) -> Result<()> {
        if self.commit() != commitment {
            return Err(Error::InvalidDecommitment);
        }
        Ok(())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Agree on `len` random bytes with the peer, which must take the other [`Role`].
pub fn joint_random_bytes<C: Channel + ?Sized>(
    ch: &mut C,
    role: Role,
    len: usize,
) -> Result<Vec<u8>> {
    let mut seed = [0u8; SEED_BYTES];
    rand::thread_rng().fill_bytes(&mut seed);
    match role {
        Role::Committer => {
            let decommitment = Decommitment::new(seed.to_vec());
            ch.send_bytes(&decommitment.commit())?;
            let peer = ch.recv_exact(SEED_BYTES)?;
            ch.send(bincode::serialize(&decommitment)?.into())?;
            xor_inplace(&mut seed, &peer);
        }
        Role::Responder => {
            let commitment = ch.recv_exact(HASH_BYTES)?;
            ch.send_bytes(&seed)?;
            let decommitment: Decommitment = bincode::deserialize(&ch.recv()?)?;
            decommitment.verify(&commitment)?;
            if decommitment.data().len() != SEED_BYTES {
                return Err(Error::UnexpectedLength {
                    expected: SEED_BYTES,
                    actual: decommitment.data().len(),
                });
            }
            xor_inplace(&mut seed, decommitment.data());
        }
    }
    let mut out = vec![0u8; len];
    AesRng::from_seed(seed).fill_bytes(&mut out);
    Ok(out)
}
