//! Correlated bit matrices for IKNP-style oblivious transfer extension (cf. <https://www.iacr.org/archive/crypto2003/27290145/27290145.pdf>).
//!
//! `k = 8 * key_bytes` base OTs with reversed roles seed one PRG per row on
//! the sender side and two per row on the receiver side. Every [`xpose`]
//! then yields a `k x row_bytes` matrix on each side such that
//! `sender_row(i) XOR recver_row(i) == S[i] AND mask`, where `S` is the
//! sender's secret and `mask` the receiver's packed choice bits. Column `c`
//! of the sender's matrix keys both messages of transfer `c`.
//!
//! [`xpose`]: SenderExtensionBox::xpose

use super::{
    naor_pinkas::{NpotRecver, NpotSender, NPOT_BATCH_SIZE},
    utils::{
        aes_rng::{AesRng, SEED_BYTES},
        boolvec_to_u8vec, get_bit,
        hash::pad_keyed,
        xor_inplace, BitMatrix,
    },
};
use crate::{channel::Channel, error::Result};
use log::debug;
use rand::{Rng, RngCore};
use rand_core::SeedableRng;

/// Number of options per base OT used to seed an extension box.
const BASE_NMAX: usize = 1 << NPOT_BATCH_SIZE;

fn seeded_rngs(seeds: &[u8]) -> Vec<AesRng> {
    seeds
        .chunks_exact(SEED_BYTES)
        .map(|seed| {
            let mut s = [0u8; SEED_BYTES];
            s.copy_from_slice(seed);
            AesRng::from_seed(s)
        })
        .collect()
}

/// Sender half of an extension box.
#[derive(Debug)]
pub struct SenderExtensionBox {
    key_bytes: usize,
    s: Vec<bool>,
    spack: Vec<u8>,
    keyblock: Vec<AesRng>,
}

impl SenderExtensionBox {
    /// Run `8 * key_bytes` base OTs as the receiver, choosing with a fresh secret `S`.
    ///
    /// # Panics
    /// If `key_bytes` is zero.
    pub fn new<C: Channel + ?Sized>(ch: &mut C, key_bytes: usize) -> Result<Self> {
        assert!(key_bytes > 0);
        let k = 8 * key_bytes;
        let mut rng = rand::thread_rng();
        let s = (0..k).map(|_| rng.gen()).collect::<Vec<bool>>();
        let spack = boolvec_to_u8vec(&s);

        let mut base = NpotRecver::new(ch, BASE_NMAX)?;
        let seeds = base.recv_1of2(ch, &s, SEED_BYTES, NPOT_BATCH_SIZE)?;
        debug!("sender extension box ready, k = {k}");
        Ok(Self {
            key_bytes,
            s,
            spack,
            keyblock: seeded_rngs(&seeds),
        })
    }

    pub fn key_bytes(&self) -> usize {
        self.key_bytes
    }

    /// Number of rows of every matrix this box produces.
    pub fn k(&self) -> usize {
        8 * self.key_bytes
    }

    /// The secret choice bits, one per row.
    pub fn s(&self) -> &[bool] {
        &self.s
    }

    /// Receive one correction row per base OT and build the sender matrix.
    pub fn xpose<C: Channel + ?Sized>(&mut self, ch: &mut C, row_bytes: usize) -> Result<BitMatrix> {
        let mut matrix = BitMatrix::new(self.k(), row_bytes);
        for ((row, rng), b) in matrix
            .iter_rows_mut()
            .zip(self.keyblock.iter_mut())
            .zip(&self.s)
        {
            rng.fill_bytes(row);
            let u = ch.recv_exact(row_bytes)?;
            if *b {
                xor_inplace(row, &u);
            }
        }
        Ok(matrix)
    }

    /// Deliver `opt0.len() / len` pairs of messages keyed by the columns of `matrix`.
    /// Transfer `c` uses nonce `nonce0 + c`.
    ///
    /// # Panics
    /// If `matrix` has fewer columns than transfers or the options have different sizes.
    pub fn send_msgs<C: Channel + ?Sized>(
        &self,
        ch: &mut C,
        matrix: &BitMatrix,
        nonce0: u64,
        opt0: &[u8],
        opt1: &[u8],
        len: usize,
    ) -> Result<()> {
        deliver(ch, matrix, &self.spack, nonce0, opt0, opt1, len)
    }

    /// Same as [`SenderExtensionBox::send_msgs`], but only `rows` of `matrix` key the messages.
    #[allow(clippy::too_many_arguments)]
    pub fn send_msgs_filtered<C: Channel + ?Sized>(
        &self,
        ch: &mut C,
        matrix: &BitMatrix,
        rows: &[usize],
        nonce0: u64,
        opt0: &[u8],
        opt1: &[u8],
        len: usize,
    ) -> Result<()> {
        let spack = boolvec_to_u8vec(&rows.iter().map(|&i| self.s[i]).collect::<Vec<bool>>());
        deliver(ch, &matrix.select_rows(rows), &spack, nonce0, opt0, opt1, len)
    }
}

fn deliver<C: Channel + ?Sized>(
    ch: &mut C,
    matrix: &BitMatrix,
    spack: &[u8],
    nonce0: u64,
    opt0: &[u8],
    opt1: &[u8],
    len: usize,
) -> Result<()> {
    assert!(len > 0);
    assert_eq!(opt0.len(), opt1.len());
    assert_eq!(opt0.len() % len, 0);
    let n = opt0.len() / len;
    assert!(n <= 8 * matrix.row_bytes());

    let key_bytes = (matrix.rows() + 7) / 8;
    let columns = matrix.columns();
    let mut out = Vec::with_capacity(2 * n * len);
    let mut key1 = vec![0u8; key_bytes];
    for (c, key0) in columns.chunks_exact(key_bytes).take(n).enumerate() {
        let nonce = nonce0 + c as u64;
        key1.copy_from_slice(key0);
        xor_inplace(&mut key1, spack);

        let start = out.len();
        out.extend_from_slice(&opt0[c * len..(c + 1) * len]);
        pad_keyed(&mut out[start..], key0, nonce);
        let start = out.len();
        out.extend_from_slice(&opt1[c * len..(c + 1) * len]);
        pad_keyed(&mut out[start..], &key1, nonce);
    }
    ch.send(out.into())
}

/// Receiver half of an extension box.
#[derive(Debug)]
pub struct RecverExtensionBox {
    key_bytes: usize,
    keyblock0: Vec<AesRng>,
    keyblock1: Vec<AesRng>,
}

impl RecverExtensionBox {
    /// Run `8 * key_bytes` base OTs as the sender, offering two fresh seeds each.
    ///
    /// # Panics
    /// If `key_bytes` is zero.
    pub fn new<C: Channel + ?Sized>(ch: &mut C, key_bytes: usize) -> Result<Self> {
        assert!(key_bytes > 0);
        let k = 8 * key_bytes;
        let mut rng = rand::thread_rng();
        let mut seeds0 = vec![0u8; k * SEED_BYTES];
        let mut seeds1 = vec![0u8; k * SEED_BYTES];
        rng.fill_bytes(&mut seeds0);
        rng.fill_bytes(&mut seeds1);

        let mut base = NpotSender::new(ch, BASE_NMAX)?;
        base.send_1of2(ch, &seeds0, &seeds1, SEED_BYTES, NPOT_BATCH_SIZE)?;
        debug!("receiver extension box ready, k = {k}");
        Ok(Self {
            key_bytes,
            keyblock0: seeded_rngs(&seeds0),
            keyblock1: seeded_rngs(&seeds1),
        })
    }

    pub fn key_bytes(&self) -> usize {
        self.key_bytes
    }

    /// Number of rows of every matrix this box produces.
    pub fn k(&self) -> usize {
        8 * self.key_bytes
    }

    /// Send one correction row per base OT for the packed choice bits `mask`
    /// and build the receiver matrix.
    ///
    /// # Panics
    /// If `mask` is not `row_bytes` long.
    pub fn xpose<C: Channel + ?Sized>(
        &mut self,
        ch: &mut C,
        mask: &[u8],
        row_bytes: usize,
    ) -> Result<BitMatrix> {
        assert_eq!(mask.len(), row_bytes);
        self.xpose_with(ch, row_bytes, |_| mask)
    }

    /// Same as [`RecverExtensionBox::xpose`], with the mask for row `i` given by `mask_for_row(i)`.
    /// An honest receiver uses the same mask for every row.
    pub fn xpose_with<'m, C, F>(
        &mut self,
        ch: &mut C,
        row_bytes: usize,
        mut mask_for_row: F,
    ) -> Result<BitMatrix>
    where
        C: Channel + ?Sized,
        F: FnMut(usize) -> &'m [u8],
    {
        let mut matrix = BitMatrix::new(self.k(), row_bytes);
        let mut u = vec![0u8; row_bytes];
        for (i, (row, (g0, g1))) in matrix
            .iter_rows_mut()
            .zip(self.keyblock0.iter_mut().zip(self.keyblock1.iter_mut()))
            .enumerate()
        {
            let mask = mask_for_row(i);
            assert_eq!(mask.len(), row_bytes);
            g0.fill_bytes(row);
            g1.fill_bytes(&mut u);
            xor_inplace(&mut u, row);
            xor_inplace(&mut u, mask);
            ch.send_bytes(&u)?;
        }
        Ok(matrix)
    }

    /// Receive the messages selected by the first `n` bits of `mask`.
    pub fn recv_msgs<C: Channel + ?Sized>(
        &self,
        ch: &mut C,
        matrix: &BitMatrix,
        nonce0: u64,
        mask: &[u8],
        n: usize,
        len: usize,
    ) -> Result<Vec<u8>> {
        collect(ch, matrix, nonce0, mask, n, len)
    }

    /// Counterpart of [`SenderExtensionBox::send_msgs_filtered`].
    #[allow(clippy::too_many_arguments)]
    pub fn recv_msgs_filtered<C: Channel + ?Sized>(
        &self,
        ch: &mut C,
        matrix: &BitMatrix,
        rows: &[usize],
        nonce0: u64,
        mask: &[u8],
        n: usize,
        len: usize,
    ) -> Result<Vec<u8>> {
        collect(ch, &matrix.select_rows(rows), nonce0, mask, n, len)
    }
}

fn collect<C: Channel + ?Sized>(
    ch: &mut C,
    matrix: &BitMatrix,
    nonce0: u64,
    mask: &[u8],
    n: usize,
    len: usize,
) -> Result<Vec<u8>> {
    assert!(len > 0);
    assert!(n <= 8 * matrix.row_bytes());
    let key_bytes = (matrix.rows() + 7) / 8;
    let columns = matrix.columns();
    let cts = ch.recv_exact(2 * n * len)?;
    let mut out = Vec::with_capacity(n * len);
    for (c, (key, ct)) in columns
        .chunks_exact(key_bytes)
        .zip(cts.chunks_exact(2 * len))
        .enumerate()
    {
        let start = out.len();
        if get_bit(mask, c) {
            out.extend_from_slice(&ct[len..]);
        } else {
            out.extend_from_slice(&ct[..len]);
        }
        pad_keyed(&mut out[start..], key, nonce0 + c as u64);
    }
    Ok(out)
}
