//! AES-128 in counter mode as a seedable random generator.
//!
//! Stretches a 16-byte seed into an arbitrarily long pseudorandom stream.
//! Output is buffered per block, so consecutive calls of any length continue
//! the same stream.

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
use rand_core::{impls, CryptoRng, Error, RngCore, SeedableRng};

/// Seed size of [`AesRng`] in bytes.
pub const SEED_BYTES: usize = 16;

const BLOCK_BYTES: usize = 16;

#[derive(Debug, Clone)]
pub struct AesRng {
    aes: Aes128,
    counter: u128,
    buf: [u8; BLOCK_BYTES],
    pos: usize,
}

impl AesRng {
    fn refill(&mut self) {
        let mut block = self.counter.to_le_bytes().into();
        self.aes.encrypt_block(&mut block);
        self.buf = block.into();
        self.counter = self.counter.wrapping_add(1);
        self.pos = 0;
    }
}

impl SeedableRng for AesRng {
    type Seed = [u8; SEED_BYTES];

    fn from_seed(seed: Self::Seed) -> Self {
        AesRng {
            aes: Aes128::new(&seed.into()),
            counter: 0,
            buf: [0; BLOCK_BYTES],
            pos: BLOCK_BYTES,
        }
    }
}

impl RngCore for AesRng {
    fn next_u32(&mut self) -> u32 {
        impls::next_u32_via_fill(self)
    }

    fn next_u64(&mut self) -> u64 {
        impls::next_u64_via_fill(self)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let mut written = 0;
        while written < dest.len() {
            if self.pos == BLOCK_BYTES {
                self.refill();
            }
            let n = (BLOCK_BYTES - self.pos).min(dest.len() - written);
            dest[written..written + n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
            self.pos += n;
            written += n;
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl CryptoRng for AesRng {}
