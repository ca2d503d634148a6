//! Implementation of the Naor-Pinkas oblivious transfer protocol (cf. <https://dl.acm.org/citation.cfm?id=365502>).
//! Based on <https://github.com/GaloisInc/swanky/blob/master/ocelot/src/ot/naor_pinkas.rs>.
//!
//! This is the 1-out-of-n flavour: the sender publishes `nmax - 1` offset points
//! once, every later transfer costs the receiver one group element. On top of
//! it sit transfers with more than `nmax` options (digit decomposition),
//! options longer than [`HASH_BYTES`] (seed transfer, then stream encryption)
//! and batched 1-out-of-2 transfers.

use super::{
    group::DhGroup,
    utils::{
        aes_rng::{AesRng, SEED_BYTES},
        hash::{pad_pt, HASH_BYTES},
        xor_inplace,
    },
    OtRecver, OtSender,
};
use crate::{channel::Channel, error::Result};
use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar};
use itertools::izip;
use log::debug;
use rand::RngCore;
use rand_core::SeedableRng;

/// Number of 1-out-of-2 choices packed into one 1-out-of-`2^k` transfer.
pub const NPOT_BATCH_SIZE: usize = 5;

/// Upper bound on the number of digits in [`NpotSender::send_many`].
const LOGMAX: usize = 60;

/// Computes `ceil(log_b(x))`.
fn logceil(x: usize, b: usize) -> usize {
    let mut x = x - 1;
    let mut res = 0;
    while x > 0 {
        x /= b;
        res += 1;
    }
    res
}

/// Express `x` in base `b` with `digits` digits, least significant first.
fn in_base_n(mut x: usize, b: usize, digits: usize) -> Vec<usize> {
    let mut out = Vec::with_capacity(digits);
    for _ in 0..digits {
        out.push(x % b);
        x /= b;
    }
    assert_eq!(x, 0, "{digits} digits in base {b} are not enough");
    out
}

/// Naor-Pinkas oblivious transfer sender.
#[derive(Debug)]
pub struct NpotSender {
    r: Scalar,
    cr: Vec<RistrettoPoint>,
    nmax: usize,
    counter: u64,
}

/// Key received from the [`NpotRecver`], first half of one transfer.
#[derive(Debug)]
pub struct SenderRound {
    pk0: RistrettoPoint,
}

impl NpotSender {
    /// Create new [`NpotSender`] supporting up to `nmax` options per transfer.
    /// The peer must call [`NpotRecver::new`] with the same `nmax`.
    ///
    /// # Panics
    /// If `nmax < 2`.
    pub fn new<C: Channel + ?Sized>(ch: &mut C, nmax: usize) -> Result<Self> {
        assert!(nmax >= 2);
        let group = DhGroup::default();
        let mut rng = rand::thread_rng();
        let r = group.random_exp(&mut rng);
        ch.send_point(&group.exp(&r))?;
        let cr = (0..nmax - 1)
            .map(|_| -> Result<RistrettoPoint> {
                let c = group.exp(&group.random_exp(&mut rng));
                ch.send_point(&c)?;
                Ok(r * c)
            })
            .collect::<Result<Vec<RistrettoPoint>>>()?;
        debug!("npot sender ready, nmax = {nmax}");
        Ok(Self {
            r,
            cr,
            nmax,
            counter: 0,
        })
    }

    pub fn nmax(&self) -> usize {
        self.nmax
    }

    /// Number of 1-out-of-n rounds completed so far.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn recv_key<C: Channel + ?Sized>(&mut self, ch: &mut C) -> Result<SenderRound> {
        Ok(SenderRound {
            pk0: ch.recv_point()?,
        })
    }

    /// # Panics
    /// If there are no values or more than `nmax`, if `len > HASH_BYTES`
    /// or if a value is not `len` bytes long.
    pub fn send_data<C: Channel + ?Sized, V: AsRef<[u8]>>(
        &mut self,
        ch: &mut C,
        round: SenderRound,
        values: &[V],
        len: usize,
    ) -> Result<()> {
        let n = values.len();
        assert!(n >= 1 && n <= self.nmax);
        assert!(len <= HASH_BYTES);
        let pk0r = self.r * round.pk0;
        let mut out = Vec::with_capacity(n * len);
        for (i, value) in values.iter().enumerate() {
            let value = value.as_ref();
            assert_eq!(value.len(), len);
            let key = if i == 0 { pk0r } else { self.cr[i - 1] - pk0r };
            let start = out.len();
            out.extend_from_slice(value);
            pad_pt(&mut out[start..], &key, self.counter, i);
        }
        self.counter += 1;
        ch.send(out.into())
    }

    /// Send `values` to [`NpotRecver`] using 1-out-of-n oblivious transfer.
    pub fn send<C: Channel + ?Sized, V: AsRef<[u8]>>(
        &mut self,
        ch: &mut C,
        values: &[V],
        len: usize,
    ) -> Result<()> {
        let round = self.recv_key(ch)?;
        self.send_data(ch, round, values, len)
    }

    /// Same as [`NpotSender::send`], but `values.len()` may exceed `nmax`.
    pub fn send_many<C: Channel + ?Sized, V: AsRef<[u8]>>(
        &mut self,
        ch: &mut C,
        values: &[V],
        len: usize,
    ) -> Result<()> {
        let base = self.nmax;
        let n = values.len();
        if n <= base {
            return self.send(ch, values, len);
        }
        assert!(len <= HASH_BYTES);
        let lc = logceil(n, base);
        assert!(lc <= LOGMAX);

        let mut keys = vec![0u8; lc * base * len];
        rand::thread_rng().fill_bytes(&mut keys);
        let rounds = (0..lc)
            .map(|_| self.recv_key(ch))
            .collect::<Result<Vec<SenderRound>>>()?;
        for (digit_keys, round) in keys.chunks_exact(base * len).zip(rounds) {
            let digit_keys = digit_keys.chunks_exact(len).collect::<Vec<&[u8]>>();
            self.send_data(ch, round, &digit_keys, len)?;
        }

        let mut out = Vec::with_capacity(n * len);
        for (i, value) in values.iter().enumerate() {
            let value = value.as_ref();
            assert_eq!(value.len(), len);
            let start = out.len();
            out.extend_from_slice(value);
            for (j, d) in in_base_n(i, base, lc).into_iter().enumerate() {
                let key = &keys[(j * base + d) * len..(j * base + d + 1) * len];
                xor_inplace(&mut out[start..], key);
            }
        }
        ch.send(out.into())
    }

    /// Same as [`NpotSender::send_many`], but `len` may exceed [`HASH_BYTES`].
    pub fn send_long<C: Channel + ?Sized, V: AsRef<[u8]>>(
        &mut self,
        ch: &mut C,
        values: &[V],
        len: usize,
    ) -> Result<()> {
        if len <= HASH_BYTES {
            return self.send_many(ch, values, len);
        }
        let n = values.len();
        let mut rng = rand::thread_rng();
        let seeds = (0..n)
            .map(|_| {
                let mut seed = [0u8; SEED_BYTES];
                rng.fill_bytes(&mut seed);
                seed
            })
            .collect::<Vec<[u8; SEED_BYTES]>>();
        self.send_many(ch, &seeds, SEED_BYTES)?;

        let mut out = vec![0u8; n * len];
        for (buf, seed, value) in izip!(out.chunks_exact_mut(len), &seeds, values) {
            let value = value.as_ref();
            assert_eq!(value.len(), len);
            AesRng::from_seed(*seed).fill_bytes(buf);
            xor_inplace(buf, value);
        }
        ch.send(out.into())
    }

    /// Perform up to 31 1-out-of-2 transfers as a single 1-out-of-`2^n` transfer.
    /// `opt0` and `opt1` hold `n` options of `len` bytes each.
    ///
    /// # Panics
    /// If the options are empty, of different sizes, or hold 32 or more options.
    pub fn send_1of2_once<C: Channel + ?Sized>(
        &mut self,
        ch: &mut C,
        opt0: &[u8],
        opt1: &[u8],
        len: usize,
    ) -> Result<()> {
        assert!(len > 0);
        assert_eq!(opt0.len(), opt1.len());
        assert_eq!(opt0.len() % len, 0);
        let n = opt0.len() / len;
        assert!(n >= 1 && n < u32::BITS as usize);

        let mut table = vec![0u8; (1 << n) * n * len];
        for (i, entry) in table.chunks_exact_mut(n * len).enumerate() {
            for (j, slot) in entry.chunks_exact_mut(len).enumerate() {
                let src = if i & (1 << j) != 0 { opt1 } else { opt0 };
                slot.copy_from_slice(&src[j * len..(j + 1) * len]);
            }
        }
        let entries = table.chunks_exact(n * len).collect::<Vec<&[u8]>>();
        self.send_long(ch, &entries, n * len)
    }

    /// Perform `opt0.len() / len` 1-out-of-2 transfers in batches of `batch_size`.
    pub fn send_1of2<C: Channel + ?Sized>(
        &mut self,
        ch: &mut C,
        opt0: &[u8],
        opt1: &[u8],
        len: usize,
        batch_size: usize,
    ) -> Result<()> {
        assert!(len > 0 && batch_size > 0);
        assert_eq!(opt0.len(), opt1.len());
        let chunk = batch_size * len;
        for (o0, o1) in opt0.chunks(chunk).zip(opt1.chunks(chunk)) {
            self.send_1of2_once(ch, o0, o1, len)?;
        }
        Ok(())
    }
}

impl OtSender for NpotSender {
    fn send(&mut self, ch: &mut dyn Channel, opt0: &[u8], opt1: &[u8], len: usize) -> Result<()> {
        self.send_1of2(ch, opt0, opt1, len, NPOT_BATCH_SIZE)
    }
}

/// Naor-Pinkas oblivious transfer receiver.
#[derive(Debug)]
pub struct NpotRecver {
    group: DhGroup,
    gr: RistrettoPoint,
    c: Vec<RistrettoPoint>,
    nmax: usize,
    counter: u64,
}

/// Secret exponent and choice of one transfer in flight.
#[derive(Debug)]
pub struct RecverRound {
    k: Scalar,
    sel: usize,
    n: usize,
}

impl NpotRecver {
    /// Create new [`NpotRecver`], `nmax` must match the sender's.
    ///
    /// # Panics
    /// If `nmax < 2`.
    pub fn new<C: Channel + ?Sized>(ch: &mut C, nmax: usize) -> Result<Self> {
        assert!(nmax >= 2);
        let gr = ch.recv_point()?;
        let c = (0..nmax - 1)
            .map(|_| ch.recv_point())
            .collect::<Result<Vec<RistrettoPoint>>>()?;
        debug!("npot receiver ready, nmax = {nmax}");
        Ok(Self {
            group: DhGroup::default(),
            gr,
            c,
            nmax,
            counter: 0,
        })
    }

    pub fn nmax(&self) -> usize {
        self.nmax
    }

    /// Number of 1-out-of-n rounds completed so far.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// # Panics
    /// If `n` is zero or larger than `nmax`, or if `sel >= n`.
    pub fn send_key<C: Channel + ?Sized>(
        &mut self,
        ch: &mut C,
        sel: usize,
        n: usize,
    ) -> Result<RecverRound> {
        assert!(n >= 1 && n <= self.nmax);
        assert!(sel < n);
        let k = self.group.random_exp(&mut rand::thread_rng());
        let gk = self.group.exp(&k);
        let pk0 = if sel == 0 { gk } else { self.c[sel - 1] - gk };
        ch.send_point(&pk0)?;
        Ok(RecverRound { k, sel, n })
    }

    pub fn recv_data<C: Channel + ?Sized>(
        &mut self,
        ch: &mut C,
        round: RecverRound,
        len: usize,
    ) -> Result<Vec<u8>> {
        assert!(len <= HASH_BYTES);
        let key = round.k * self.gr;
        let cts = ch.recv_exact(round.n * len)?;
        let mut dest = cts[round.sel * len..(round.sel + 1) * len].to_vec();
        pad_pt(&mut dest, &key, self.counter, round.sel);
        self.counter += 1;
        Ok(dest)
    }

    /// Receive option `sel` out of `n` options of `len` bytes from [`NpotSender`].
    pub fn recv<C: Channel + ?Sized>(
        &mut self,
        ch: &mut C,
        sel: usize,
        n: usize,
        len: usize,
    ) -> Result<Vec<u8>> {
        let round = self.send_key(ch, sel, n)?;
        self.recv_data(ch, round, len)
    }

    /// Counterpart of [`NpotSender::send_many`].
    pub fn recv_many<C: Channel + ?Sized>(
        &mut self,
        ch: &mut C,
        sel: usize,
        n: usize,
        len: usize,
    ) -> Result<Vec<u8>> {
        let base = self.nmax;
        if n <= base {
            return self.recv(ch, sel, n, len);
        }
        assert!(sel < n);
        assert!(len <= HASH_BYTES);
        let lc = logceil(n, base);
        assert!(lc <= LOGMAX);

        let rounds = in_base_n(sel, base, lc)
            .into_iter()
            .map(|d| self.send_key(ch, d, base))
            .collect::<Result<Vec<RecverRound>>>()?;
        let mut key = vec![0u8; len];
        for round in rounds {
            xor_inplace(&mut key, &self.recv_data(ch, round, len)?);
        }
        let cts = ch.recv_exact(n * len)?;
        let mut dest = cts[sel * len..(sel + 1) * len].to_vec();
        xor_inplace(&mut dest, &key);
        Ok(dest)
    }

    /// Counterpart of [`NpotSender::send_long`].
    pub fn recv_long<C: Channel + ?Sized>(
        &mut self,
        ch: &mut C,
        sel: usize,
        n: usize,
        len: usize,
    ) -> Result<Vec<u8>> {
        if len <= HASH_BYTES {
            return self.recv_many(ch, sel, n, len);
        }
        let mut seed = [0u8; SEED_BYTES];
        seed.copy_from_slice(&self.recv_many(ch, sel, n, SEED_BYTES)?);
        let cts = ch.recv_exact(n * len)?;
        let mut dest = cts[sel * len..(sel + 1) * len].to_vec();
        let mut pad = vec![0u8; len];
        AesRng::from_seed(seed).fill_bytes(&mut pad);
        xor_inplace(&mut dest, &pad);
        Ok(dest)
    }

    /// Counterpart of [`NpotSender::send_1of2_once`], bit `j` of `mask` selects option `j`.
    pub fn recv_1of2_once<C: Channel + ?Sized>(
        &mut self,
        ch: &mut C,
        mask: u32,
        n: usize,
        len: usize,
    ) -> Result<Vec<u8>> {
        assert!(n >= 1 && n < u32::BITS as usize);
        self.recv_long(ch, mask as usize, 1 << n, n * len)
    }

    /// Counterpart of [`NpotSender::send_1of2`].
    pub fn recv_1of2<C: Channel + ?Sized>(
        &mut self,
        ch: &mut C,
        sel: &[bool],
        len: usize,
        batch_size: usize,
    ) -> Result<Vec<u8>> {
        assert!(len > 0 && batch_size > 0);
        let mut out = Vec::with_capacity(sel.len() * len);
        for batch in sel.chunks(batch_size) {
            let mask = batch
                .iter()
                .enumerate()
                .fold(0u32, |mask, (j, b)| mask | ((*b as u32) << j));
            out.extend(self.recv_1of2_once(ch, mask, batch.len(), len)?);
        }
        Ok(out)
    }
}

impl OtRecver for NpotRecver {
    fn recv(&mut self, ch: &mut dyn Channel, sel: &[bool], len: usize) -> Result<Vec<u8>> {
        self.recv_1of2(ch, sel, len, NPOT_BATCH_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ThreadChannel;
    use bytes::Bytes;
    use std::{
        sync::mpsc::{self, Receiver, Sender},
        thread,
    };

    fn create_channels() -> (ThreadChannel, ThreadChannel) {
        let (tx0, rx0): (Sender<Bytes>, Receiver<Bytes>) = mpsc::channel();
        let (tx1, rx1): (Sender<Bytes>, Receiver<Bytes>) = mpsc::channel();
        let ch0 = ThreadChannel::new(tx0, rx1);
        let ch1 = ThreadChannel::new(tx1, rx0);
        (ch0, ch1)
    }

    fn random_values(n: usize, len: usize) -> Vec<Vec<u8>> {
        (0..n)
            .map(|_| (0..len).map(|_| rand::random()).collect())
            .collect()
    }

    /// Every index of one option table, once with each transfer flavour.
    fn run(nmax: usize, n: usize, len: usize, choices: Vec<usize>, long: bool) {
        let (mut ch0, mut ch1) = create_channels();
        let values = random_values(n, len);
        let expected = choices
            .iter()
            .map(|&i| values[i].clone())
            .collect::<Vec<Vec<u8>>>();
        let rounds = choices.len();

        let sender = thread::spawn(move || {
            let mut sender = NpotSender::new(&mut ch0, nmax).unwrap();
            for _ in 0..rounds {
                if long {
                    sender.send_long(&mut ch0, &values, len).unwrap();
                } else {
                    sender.send_many(&mut ch0, &values, len).unwrap();
                }
            }
        });
        let receiver = thread::spawn(move || -> Vec<Vec<u8>> {
            let mut receiver = NpotRecver::new(&mut ch1, nmax).unwrap();
            choices
                .into_iter()
                .map(|sel| {
                    if long {
                        receiver.recv_long(&mut ch1, sel, n, len).unwrap()
                    } else {
                        receiver.recv_many(&mut ch1, sel, n, len).unwrap()
                    }
                })
                .collect()
        });

        sender.join().unwrap();
        let received = receiver.join().unwrap();
        assert_eq!(received, expected);
    }

    #[test]
    fn test_logceil() {
        assert_eq!(logceil(1, 32), 0);
        assert_eq!(logceil(32, 32), 1);
        assert_eq!(logceil(33, 32), 2);
        assert_eq!(logceil(1024, 32), 2);
        assert_eq!(logceil(1025, 32), 3);
        assert_eq!(logceil(10000, 32), 3);
    }

    #[test]
    fn test_in_base_n() {
        assert_eq!(in_base_n(0, 32, 2), vec![0, 0]);
        assert_eq!(in_base_n(33, 32, 2), vec![1, 1]);
        assert_eq!(in_base_n(1023, 32, 3), vec![31, 31, 0]);
    }

    #[test]
    fn test_npot_all_indices() {
        run(8, 8, 16, (0..8).collect(), false);
        run(8, 5, 32, (0..5).rev().collect(), false);
    }

    #[test]
    fn test_npot_single_option() {
        run(4, 1, 16, vec![0, 0], false);
    }

    #[test]
    fn test_npot_nmax_boundary() {
        let nmax = 32;
        run(nmax, nmax, 16, vec![0, nmax - 1], false);
        run(nmax, nmax + 1, 16, vec![0, nmax - 1, nmax], false);
    }

    #[test]
    fn test_npot_many() {
        run(4, 100, 20, vec![0, 3, 4, 63, 99], false);
        run(32, 1000, 8, vec![999, 512, 1], false);
    }

    #[test]
    fn test_npot_len_boundary() {
        run(8, 6, HASH_BYTES, vec![2, 5], true);
        run(8, 6, HASH_BYTES + 1, vec![2, 5], true);
        run(8, 40, HASH_BYTES + 1, vec![39, 0], true);
    }

    #[test]
    fn test_npot_long() {
        run(16, 3, 1000, vec![0, 1, 2], true);
    }

    #[test]
    fn test_npot_counter() {
        let (mut ch0, mut ch1) = create_channels();
        let values = random_values(100, 16);
        let sender = thread::spawn(move || -> u64 {
            let mut sender = NpotSender::new(&mut ch0, 10).unwrap();
            sender.send(&mut ch0, &values[..10], 16).unwrap();
            sender.send_many(&mut ch0, &values, 16).unwrap();
            sender.counter()
        });
        let mut receiver = NpotRecver::new(&mut ch1, 10).unwrap();
        receiver.recv(&mut ch1, 3, 10, 16).unwrap();
        receiver.recv_many(&mut ch1, 42, 100, 16).unwrap();
        // one round, then two digits
        assert_eq!(receiver.counter(), 3);
        assert_eq!(sender.join().unwrap(), 3);
    }

    #[test]
    fn test_npot_1of2() {
        let (mut ch0, mut ch1) = create_channels();
        let n = 23;
        let len = 16;
        let opt0 = (0..n * len).map(|_| rand::random()).collect::<Vec<u8>>();
        let opt1 = (0..n * len).map(|_| rand::random()).collect::<Vec<u8>>();
        let choices = (0..n).map(|_| rand::random()).collect::<Vec<bool>>();
        let chosen = choices
            .iter()
            .enumerate()
            .flat_map(|(i, c)| {
                let opt = if *c { &opt1 } else { &opt0 };
                opt[i * len..(i + 1) * len].to_vec()
            })
            .collect::<Vec<u8>>();

        let sender = thread::spawn(move || {
            let mut sender = NpotSender::new(&mut ch0, 1 << NPOT_BATCH_SIZE).unwrap();
            sender
                .send_1of2(&mut ch0, &opt0, &opt1, len, NPOT_BATCH_SIZE)
                .unwrap();
        });
        let receiver = thread::spawn(move || -> Vec<u8> {
            let mut receiver = NpotRecver::new(&mut ch1, 1 << NPOT_BATCH_SIZE).unwrap();
            receiver
                .recv_1of2(&mut ch1, &choices, len, NPOT_BATCH_SIZE)
                .unwrap()
        });

        sender.join().unwrap();
        let received = receiver.join().unwrap();
        assert_eq!(received, chosen);
    }

    #[test]
    #[should_panic]
    fn test_npot_too_many_options() {
        let (mut ch0, _ch1) = create_channels();
        let mut sender = NpotSender::new(&mut ch0, 4).unwrap();
        let values = random_values(5, 16);
        sender
            .send_data(
                &mut ch0,
                SenderRound {
                    pk0: RistrettoPoint::default(),
                },
                &values,
                16,
            )
            .unwrap();
    }
}
