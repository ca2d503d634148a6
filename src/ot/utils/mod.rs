//! Based on <https://github.com/GaloisInc/swanky/blob/dev/ocelot/src/utils.rs>.
//!
//! Bits are indexed least significant first: bit `i` of a buffer lives in
//! byte `i / 8` at position `i % 8`.

use bit::BitIndex;
use std::slice::{ChunksExact, ChunksExactMut};

pub mod aes_rng;
pub mod hash;

#[inline]
pub fn boolvec_to_u8vec(bv: &[bool]) -> Vec<u8> {
    let offset = if bv.len() % 8 == 0 { 0 } else { 1 };
    let mut v = vec![0u8; bv.len() / 8 + offset];
    for (i, b) in bv.iter().enumerate() {
        v[i / 8] |= (*b as u8) << (i % 8);
    }
    v
}

#[inline]
pub fn u8vec_to_boolvec(v: &[u8]) -> Vec<bool> {
    let mut bv = Vec::with_capacity(v.len() * 8);
    for byte in v {
        for i in 0..8 {
            bv.push((1 << i) & byte != 0);
        }
    }
    bv
}

#[inline]
pub fn xor_inplace(a: &mut [u8], b: &[u8]) {
    for (a, b) in a.iter_mut().zip(b.iter()) {
        *a ^= *b;
    }
}

#[inline]
pub fn get_bit(buf: &[u8], i: usize) -> bool {
    buf[i / 8].bit(i % 8)
}

#[inline]
pub fn set_bit(buf: &mut [u8], i: usize, value: bool) {
    buf[i / 8].set_bit(i % 8, value);
}

/// Parity of the bitwise AND of `a` and `b`.
#[inline]
pub fn dot_product(a: &[u8], b: &[u8]) -> bool {
    let ones: u32 = a.iter().zip(b).map(|(a, b)| (a & b).count_ones()).sum();
    ones % 2 == 1
}

/// Row-major bit matrix with `rows` rows of `row_bytes` bytes each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMatrix {
    bytes: Vec<u8>,
    rows: usize,
    row_bytes: usize,
}

impl BitMatrix {
    /// # Panics
    /// If `row_bytes` is zero.
    pub fn new(rows: usize, row_bytes: usize) -> Self {
        assert!(row_bytes > 0);
        BitMatrix {
            bytes: vec![0; rows * row_bytes],
            rows,
            row_bytes,
        }
    }

    /// # Panics
    /// If `row_bytes` is zero or does not divide `bytes.len()`.
    pub fn from_bytes(bytes: Vec<u8>, row_bytes: usize) -> Self {
        assert!(row_bytes > 0);
        assert_eq!(bytes.len() % row_bytes, 0);
        BitMatrix {
            rows: bytes.len() / row_bytes,
            bytes,
            row_bytes,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    pub fn row(&self, i: usize) -> &[u8] {
        &self.bytes[i * self.row_bytes..(i + 1) * self.row_bytes]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [u8] {
        &mut self.bytes[i * self.row_bytes..(i + 1) * self.row_bytes]
    }

    pub fn iter_rows(&self) -> ChunksExact<'_, u8> {
        self.bytes.chunks_exact(self.row_bytes)
    }

    pub fn iter_rows_mut(&mut self) -> ChunksExactMut<'_, u8> {
        self.bytes.chunks_exact_mut(self.row_bytes)
    }

    /// New matrix made of the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> BitMatrix {
        let mut out = BitMatrix::new(rows.len(), self.row_bytes);
        for (dst, &src) in out.iter_rows_mut().zip(rows) {
            dst.copy_from_slice(self.row(src));
        }
        out
    }

    /// The transposed matrix: `8 * row_bytes` rows of `ceil(rows / 8)` bytes.
    pub fn columns(&self) -> Vec<u8> {
        transpose(&self.bytes, self.rows, 8 * self.row_bytes)
    }
}

/// Transpose a `nrows x ncols` bit matrix into a `ncols x nrows` one.
/// Output rows are padded to whole bytes.
///
/// # Panics
/// If `ncols` is not a multiple of 8.
#[inline]
pub fn transpose(input: &[u8], nrows: usize, ncols: usize) -> Vec<u8> {
    assert_eq!(ncols % 8, 0);
    assert_eq!(input.len(), nrows * ncols / 8);
    if nrows == 0 || ncols == 0 {
        return Vec::new();
    }
    #[cfg(target_arch = "x86_64")]
    if nrows % 16 == 0 {
        return transpose_sse(input, nrows, ncols);
    }
    transpose_portable(input, nrows, ncols)
}

fn transpose_portable(input: &[u8], nrows: usize, ncols: usize) -> Vec<u8> {
    let out_bytes = (nrows + 7) / 8;
    let mut output = vec![0u8; ncols * out_bytes];
    for (r, row) in input.chunks_exact(ncols / 8).enumerate() {
        for c in 0..ncols {
            if get_bit(row, c) {
                set_bit(&mut output[c * out_bytes..(c + 1) * out_bytes], r, true);
            }
        }
    }
    output
}

#[cfg(target_arch = "x86_64")]
fn transpose_sse(input: &[u8], nrows: usize, ncols: usize) -> Vec<u8> {
    use std::arch::x86_64::{_mm_movemask_epi8, _mm_setr_epi8, _mm_slli_epi64};

    debug_assert_eq!(nrows % 16, 0);
    let mut output = vec![0u8; nrows * ncols / 8];

    let inp = |x: usize, y: usize| -> usize { x * ncols / 8 + y / 8 };
    let out = |x: usize, y: usize| -> usize { y * nrows / 8 + x / 8 };

    unsafe {
        let mut v;
        for rr in (0..=nrows - 16).step_by(16) {
            for cc in (0..ncols).step_by(8) {
                v = _mm_setr_epi8(
                    *input.get_unchecked(inp(rr, cc)) as i8,
                    *input.get_unchecked(inp(rr + 1, cc)) as i8,
                    *input.get_unchecked(inp(rr + 2, cc)) as i8,
                    *input.get_unchecked(inp(rr + 3, cc)) as i8,
                    *input.get_unchecked(inp(rr + 4, cc)) as i8,
                    *input.get_unchecked(inp(rr + 5, cc)) as i8,
                    *input.get_unchecked(inp(rr + 6, cc)) as i8,
                    *input.get_unchecked(inp(rr + 7, cc)) as i8,
                    *input.get_unchecked(inp(rr + 8, cc)) as i8,
                    *input.get_unchecked(inp(rr + 9, cc)) as i8,
                    *input.get_unchecked(inp(rr + 10, cc)) as i8,
                    *input.get_unchecked(inp(rr + 11, cc)) as i8,
                    *input.get_unchecked(inp(rr + 12, cc)) as i8,
                    *input.get_unchecked(inp(rr + 13, cc)) as i8,
                    *input.get_unchecked(inp(rr + 14, cc)) as i8,
                    *input.get_unchecked(inp(rr + 15, cc)) as i8,
                );

                for i in (0..8).rev() {
                    let j = out(rr, cc + i);
                    output
                        .get_unchecked_mut(j..=j + 1)
                        .copy_from_slice(&(_mm_movemask_epi8(v) as i16).to_le_bytes());
                    v = _mm_slli_epi64::<1>(v);
                }
            }
        }
    };
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test(nrows: usize, ncols: usize) {
        let m = (0..nrows * ncols / 8)
            .map(|_| rand::random::<u8>())
            .collect::<Vec<u8>>();
        let m_ = m.clone();
        let m = transpose(&m, nrows, ncols);
        let m = transpose(&m, ncols, nrows);
        assert_eq!(m, m_);
    }

    #[test]
    fn test_transpose() {
        test(16, 16);
        test(80, 16);
        test(128, 24);
        test(160, 128);
        test(128, 1 << 16);
        test(32, 32);
        test(64, 64);
        test(8, 40);
    }

    #[test]
    fn test_transpose_matches_portable() {
        for (nrows, ncols) in [(16, 8), (80, 96), (160, 1024), (320, 64)] {
            let m = (0..nrows * ncols / 8)
                .map(|_| rand::random::<u8>())
                .collect::<Vec<u8>>();
            assert_eq!(
                transpose(&m, nrows, ncols),
                transpose_portable(&m, nrows, ncols)
            );
        }
    }

    #[test]
    fn test_transpose_bits() {
        let (nrows, ncols) = (24, 16);
        let m = (0..nrows * ncols / 8)
            .map(|_| rand::random::<u8>())
            .collect::<Vec<u8>>();
        let t = transpose(&m, nrows, ncols);
        for r in 0..nrows {
            for c in 0..ncols {
                assert_eq!(
                    get_bit(&m[r * ncols / 8..], c),
                    get_bit(&t[c * nrows / 8..], r)
                );
            }
        }
    }

    #[test]
    fn test_boolvec_to_u8vec() {
        let v = (0..128)
            .map(|_| rand::random::<bool>())
            .collect::<Vec<bool>>();
        let v_ = boolvec_to_u8vec(&v);
        let v__ = u8vec_to_boolvec(&v_);
        assert_eq!(v, v__);
        for (i, b) in v.iter().enumerate() {
            assert_eq!(get_bit(&v_, i), *b);
        }
    }

    #[test]
    fn test_set_bit() {
        let mut buf = [0u8; 3];
        set_bit(&mut buf, 0, true);
        set_bit(&mut buf, 9, true);
        set_bit(&mut buf, 23, true);
        assert_eq!(buf, [0x01, 0x02, 0x80]);
        set_bit(&mut buf, 9, false);
        assert_eq!(buf, [0x01, 0x00, 0x80]);
    }

    #[test]
    fn test_dot_product() {
        assert!(!dot_product(&[0b1010], &[0b0101]));
        assert!(dot_product(&[0b1110], &[0b0100]));
        assert!(dot_product(&[0b1110, 0x80], &[0b0110, 0x80]));
        assert!(!dot_product(&[0xff, 0x01], &[0x03, 0x00]));
    }

    #[test]
    fn test_select_rows() {
        let mut m = BitMatrix::new(4, 2);
        for (i, row) in m.iter_rows_mut().enumerate() {
            row.copy_from_slice(&[i as u8, 0xff - i as u8]);
        }
        let s = m.select_rows(&[3, 1]);
        assert_eq!(s.rows(), 2);
        assert_eq!(s.row(0), m.row(3));
        assert_eq!(s.row(1), m.row(1));
    }
}
