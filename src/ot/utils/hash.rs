use super::xor_inplace;
use crate::ot::group;
use curve25519_dalek::RistrettoPoint;
use tiny_keccak::{Hasher, IntoXof, KangarooTwelve, Xof};

/// Output size of [`pad_pt`], the largest message the base OT encrypts directly.
pub const HASH_BYTES: usize = 32;

/// Encrypt (or decrypt) `buf` in place with a pad derived from the group element `pt`.
///
/// The session counter and slot index are hashed in, so the same key never
/// pads two messages.
///
/// # Panics
/// If `buf` is longer than [`HASH_BYTES`].
#[inline]
pub fn pad_pt(buf: &mut [u8], pt: &RistrettoPoint, counter: u64, slot: usize) {
    assert!(buf.len() <= HASH_BYTES);
    let mut hasher = KangarooTwelve::new(b"npot");
    hasher.update(&counter.to_le_bytes());
    hasher.update(&(slot as u64).to_le_bytes());
    hasher.update(&group::serialize(pt));
    let mut digest = [0; HASH_BYTES];
    hasher.finalize(&mut digest);
    xor_inplace(buf, &digest);
}

/// Encrypt (or decrypt) `buf` in place with a pad of arbitrary length keyed by
/// `key` and `nonce`. A `(key, nonce)` pair must be used only once.
#[inline]
pub fn pad_keyed(buf: &mut [u8], key: &[u8], nonce: u64) {
    let mut hasher = KangarooTwelve::new(nonce.to_le_bytes());
    hasher.update(key);
    let mut xof = hasher.into_xof();
    let mut pad = vec![0; buf.len()];
    xof.squeeze(&mut pad);
    xor_inplace(buf, &pad);
}

/// Hash `data` into 32 bytes, used for commitments.
#[inline]
pub fn digest(domain: &[u8], data: &[u8]) -> [u8; HASH_BYTES] {
    let mut hasher = KangarooTwelve::new(domain);
    hasher.update(data);
    let mut digest = [0; HASH_BYTES];
    hasher.finalize(&mut digest);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_pt_separates_slots() {
        let pt = RistrettoPoint::random(&mut rand::thread_rng());
        let mut a = [0u8; HASH_BYTES];
        let mut b = [0u8; HASH_BYTES];
        let mut c = [0u8; HASH_BYTES];
        pad_pt(&mut a, &pt, 0, 0);
        pad_pt(&mut b, &pt, 0, 1);
        pad_pt(&mut c, &pt, 1, 0);
        assert_ne!(a, b);
        assert_ne!(a, c);
        pad_pt(&mut a, &pt, 0, 0);
        assert_eq!(a, [0u8; HASH_BYTES]);
    }

    #[test]
    fn test_pad_keyed_prefix() {
        let key = rand::random::<[u8; 10]>();
        let mut short = [0u8; 8];
        let mut long = [0u8; 100];
        pad_keyed(&mut short, &key, 7);
        pad_keyed(&mut long, &key, 7);
        assert_eq!(short, long[..8]);
        let mut other = [0u8; 8];
        pad_keyed(&mut other, &key, 8);
        assert_ne!(short, other);
    }
}
