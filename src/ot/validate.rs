//! Consistency checks on extension matrices against a receiver that uses
//! different choice masks for different rows.
//!
//! * `hhash` compares linear hashes of every row under a jointly sampled hash
//!   matrix: the row differences must be zero where `S[i] = 0` and identical
//!   where `S[i] = 1`. The receiver pads its mask with [`SECURITY_CONSTANT`]
//!   random bits so the revealed hash of the mask leaks nothing about its choices.
//! * `byPair` is cut-and-choose on random row pairs: the receiver reveals the
//!   XOR of both rows of every pair, and only the first row of each pair is
//!   kept for the transfer.

use super::{
    cointoss::{joint_random_bytes, Role},
    utils::{dot_product, set_bit, xor_inplace, BitMatrix},
};
use crate::{
    channel::Channel,
    error::{Error, Result},
};
use log::{debug, warn};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

pub const CHECK_HASH_BYTES: usize = 10;
pub const CHECK_HASH_BITS: usize = 8 * CHECK_HASH_BYTES;
/// Number of random mask bits appended by the receiver in `hhash` mode.
pub const SECURITY_CONSTANT: usize = 2 * CHECK_HASH_BITS + 7;

/// Multiply `rows` with the `CHECK_HASH_BITS x row_bytes` matrix `hash`,
/// yielding [`CHECK_HASH_BYTES`] per row.
fn bitmat_mul(hash: &BitMatrix, rows: &BitMatrix) -> Vec<u8> {
    let mut out = vec![0u8; rows.rows() * CHECK_HASH_BYTES];
    for (row, digest) in rows.iter_rows().zip(out.chunks_exact_mut(CHECK_HASH_BYTES)) {
        for (j, h) in hash.iter_rows().enumerate() {
            set_bit(digest, j, dot_product(h, row));
        }
    }
    out
}

fn hash_matrix<C: Channel + ?Sized>(ch: &mut C, role: Role, row_bytes: usize) -> Result<BitMatrix> {
    let bytes = joint_random_bytes(ch, role, CHECK_HASH_BITS * row_bytes)?;
    Ok(BitMatrix::from_bytes(bytes, row_bytes))
}

/// Sender side of `hhash`, `s` is the secret of the box that produced `q`.
pub fn hhash_check<C: Channel + ?Sized>(ch: &mut C, s: &[bool], q: &BitMatrix) -> Result<bool> {
    assert_eq!(s.len(), q.rows());
    let hash = hash_matrix(ch, Role::Committer, q.row_bytes())?;
    let theirs = ch.recv_exact(q.rows() * CHECK_HASH_BYTES)?;
    let ours = bitmat_mul(&hash, q);

    let mut mask_hash: Option<[u8; CHECK_HASH_BYTES]> = None;
    for (i, (a, b)) in ours
        .chunks_exact(CHECK_HASH_BYTES)
        .zip(theirs.chunks_exact(CHECK_HASH_BYTES))
        .enumerate()
    {
        let mut d = [0u8; CHECK_HASH_BYTES];
        d.copy_from_slice(a);
        xor_inplace(&mut d, b);
        let consistent = if s[i] {
            *mask_hash.get_or_insert(d) == d
        } else {
            d == [0u8; CHECK_HASH_BYTES]
        };
        if !consistent {
            warn!("hhash mismatch in row {i}");
            return Ok(false);
        }
    }
    debug!("hhash passed on {} rows", q.rows());
    Ok(true)
}

/// Receiver side of `hhash`.
pub fn hhash_prove<C: Channel + ?Sized>(ch: &mut C, t: &BitMatrix) -> Result<()> {
    let hash = hash_matrix(ch, Role::Responder, t.row_bytes())?;
    ch.send(bitmat_mul(&hash, t).into())
}

/// Random pairing of the rows, sent by the sender in `byPair` mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingChallenge {
    /// Rows `perm[2j]` and `perm[2j + 1]` form pair `j`.
    pub perm: Vec<u32>,
    /// Whether the secret bits of pair `j` differ.
    pub differs: Vec<bool>,
}

impl PairingChallenge {
    fn validate(&self, k: usize) -> Result<Vec<usize>> {
        if self.perm.len() != k || self.differs.len() != k / 2 {
            return Err(Error::InvalidPermutation);
        }
        let mut seen = vec![false; k];
        let mut perm = Vec::with_capacity(k);
        for &i in &self.perm {
            let i = i as usize;
            if i >= k || seen[i] {
                return Err(Error::InvalidPermutation);
            }
            seen[i] = true;
            perm.push(i);
        }
        Ok(perm)
    }
}

/// Sender side of `byPair`. Returns the rows to keep, or `None` if the receiver was caught.
///
/// # Panics
/// If `q` has an odd number of rows.
pub fn by_pair_check<C: Channel + ?Sized>(
    ch: &mut C,
    s: &[bool],
    q: &BitMatrix,
) -> Result<Option<Vec<usize>>> {
    let k = q.rows();
    assert_eq!(s.len(), k);
    assert_eq!(k % 2, 0);
    let mut perm = (0..k).collect::<Vec<usize>>();
    perm.shuffle(&mut rand::thread_rng());
    let challenge = PairingChallenge {
        perm: perm.iter().map(|&i| i as u32).collect(),
        differs: perm.chunks_exact(2).map(|p| s[p[0]] != s[p[1]]).collect(),
    };
    ch.send(bincode::serialize(&challenge)?.into())?;

    let reply = ch.recv_exact(k / 2 * q.row_bytes())?;
    let mut expected = vec![0u8; q.row_bytes()];
    for (j, (pair, got)) in perm
        .chunks_exact(2)
        .zip(reply.chunks_exact(q.row_bytes()))
        .enumerate()
    {
        expected.copy_from_slice(q.row(pair[0]));
        xor_inplace(&mut expected, q.row(pair[1]));
        if expected != got {
            warn!("byPair mismatch in pair {j}");
            return Ok(None);
        }
    }
    debug!("byPair passed on {} pairs", k / 2);
    Ok(Some(perm.into_iter().step_by(2).collect()))
}

/// Receiver side of `byPair`, `mask` is the one used to build `t`. Returns the rows to keep.
pub fn by_pair_prove<C: Channel + ?Sized>(
    ch: &mut C,
    t: &BitMatrix,
    mask: &[u8],
) -> Result<Vec<usize>> {
    let k = t.rows();
    let challenge: PairingChallenge = bincode::deserialize(&ch.recv()?)?;
    let perm = challenge.validate(k)?;

    let mut reply = Vec::with_capacity(k / 2 * t.row_bytes());
    for (pair, differs) in perm.chunks_exact(2).zip(&challenge.differs) {
        let start = reply.len();
        reply.extend_from_slice(t.row(pair[0]));
        xor_inplace(&mut reply[start..], t.row(pair[1]));
        if *differs {
            xor_inplace(&mut reply[start..], mask);
        }
    }
    ch.send(reply.into())?;
    Ok(perm.into_iter().step_by(2).collect())
}
