//! 1-out-of-2 oblivious transfer sessions built on one extension box.
//!
//! The honest sessions trust the receiver to use the same choice mask on
//! every row. The active sessions run a consistency check on every batch and
//! only deliver messages after the sender has accepted it.

use super::{
    extension_box::{RecverExtensionBox, SenderExtensionBox},
    utils::{boolvec_to_u8vec, set_bit},
    validate::{self, SECURITY_CONSTANT},
    OtRecver, OtSender,
};
use crate::{
    channel::Channel,
    error::{Error, Result},
};
use log::{debug, info, warn};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Key bytes of an extension box without consistency checks, `8 *` this many base OTs.
pub const OT_KEY_BYTES_HONEST: usize = 10;

const VERDICT_OK: u8 = 1;
const VERDICT_ABORT: u8 = 0;

/// Consistency check run by the active sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Validation {
    #[default]
    HHash,
    ByPair,
}

impl Validation {
    /// Key bytes needed for the check to leave enough secure rows.
    pub fn key_bytes(self) -> usize {
        match self {
            Validation::HHash => 2 * OT_KEY_BYTES_HONEST,
            Validation::ByPair => 4 * OT_KEY_BYTES_HONEST,
        }
    }
}

/// Number of transfers in `opt0` and `opt1`.
fn num_transfers(opt0: &[u8], opt1: &[u8], len: usize) -> usize {
    assert!(len > 0);
    assert_eq!(opt0.len(), opt1.len());
    assert_eq!(opt0.len() % len, 0);
    opt0.len() / len
}

/// Oblivious transfer extension sender, secure against a semi-honest receiver.
#[derive(Debug)]
pub struct HonestOtExtSender {
    ext: SenderExtensionBox,
    nonce: u64,
}

impl HonestOtExtSender {
    pub fn new<C: Channel + ?Sized>(ch: &mut C, key_bytes: usize) -> Result<Self> {
        let now = Instant::now();
        let ext = SenderExtensionBox::new(ch, key_bytes)?;
        info!("extension sender setup took {} ms", now.elapsed().as_millis());
        Ok(Self { ext, nonce: 0 })
    }

    /// Nonce of the next transfer, grows by the number of transfers per batch.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Send one of `opt0[i]`, `opt1[i]` (options of `len` bytes) for every `i`.
    ///
    /// # Panics
    /// If `len` is zero or the options have different sizes.
    pub fn send<C: Channel + ?Sized>(
        &mut self,
        ch: &mut C,
        opt0: &[u8],
        opt1: &[u8],
        len: usize,
    ) -> Result<()> {
        let n = num_transfers(opt0, opt1, len);
        if n == 0 {
            return Ok(());
        }
        let q = self.ext.xpose(ch, (n + 7) / 8)?;
        self.ext.send_msgs(ch, &q, self.nonce, opt0, opt1, len)?;
        self.nonce += n as u64;
        debug!("sent {n} extended OTs");
        Ok(())
    }
}

impl OtSender for HonestOtExtSender {
    fn send(&mut self, ch: &mut dyn Channel, opt0: &[u8], opt1: &[u8], len: usize) -> Result<()> {
        HonestOtExtSender::send(self, ch, opt0, opt1, len)
    }
}

/// Oblivious transfer extension receiver for [`HonestOtExtSender`].
#[derive(Debug)]
pub struct HonestOtExtRecver {
    ext: RecverExtensionBox,
    nonce: u64,
}

impl HonestOtExtRecver {
    pub fn new<C: Channel + ?Sized>(ch: &mut C, key_bytes: usize) -> Result<Self> {
        let now = Instant::now();
        let ext = RecverExtensionBox::new(ch, key_bytes)?;
        info!("extension receiver setup took {} ms", now.elapsed().as_millis());
        Ok(Self { ext, nonce: 0 })
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Receive option `sel[i]` of transfer `i`, `len` bytes each.
    pub fn recv<C: Channel + ?Sized>(
        &mut self,
        ch: &mut C,
        sel: &[bool],
        len: usize,
    ) -> Result<Vec<u8>> {
        assert!(len > 0);
        let n = sel.len();
        if n == 0 {
            return Ok(Vec::new());
        }
        let mask = boolvec_to_u8vec(sel);
        let t = self.ext.xpose(ch, &mask, mask.len())?;
        let out = self.ext.recv_msgs(ch, &t, self.nonce, &mask, n, len)?;
        self.nonce += n as u64;
        debug!("received {n} extended OTs");
        Ok(out)
    }
}

impl OtRecver for HonestOtExtRecver {
    fn recv(&mut self, ch: &mut dyn Channel, sel: &[bool], len: usize) -> Result<Vec<u8>> {
        HonestOtExtRecver::recv(self, ch, sel, len)
    }
}

/// Oblivious transfer extension sender, secure against a malicious receiver.
///
/// Any error leaves the session failed: the batch is not delivered and every
/// later call returns [`Error::SessionAborted`].
#[derive(Debug)]
pub struct OtExtSender {
    validation: Validation,
    key_bytes: usize,
    ext: Option<SenderExtensionBox>,
    nonce: u64,
    failed: bool,
}

impl OtExtSender {
    pub fn new<C: Channel + ?Sized>(ch: &mut C, validation: Validation) -> Result<Self> {
        Self::with_key_bytes(ch, validation, validation.key_bytes())
    }

    pub fn with_key_bytes<C: Channel + ?Sized>(
        ch: &mut C,
        validation: Validation,
        key_bytes: usize,
    ) -> Result<Self> {
        let now = Instant::now();
        let ext = SenderExtensionBox::new(ch, key_bytes)?;
        info!(
            "{validation:?} extension sender setup took {} ms",
            now.elapsed().as_millis()
        );
        Ok(Self {
            validation,
            key_bytes,
            ext: Some(ext),
            nonce: 0,
            failed: false,
        })
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Same as [`HonestOtExtSender::send`], after checking the receiver's consistency.
    /// Returns [`Error::ConsistencyCheckFailed`] if the check fails.
    pub fn send<C: Channel + ?Sized>(
        &mut self,
        ch: &mut C,
        opt0: &[u8],
        opt1: &[u8],
        len: usize,
    ) -> Result<()> {
        if self.failed {
            return Err(Error::SessionAborted);
        }
        let n = num_transfers(opt0, opt1, len);
        if n == 0 {
            return Ok(());
        }
        let res = self.send_batch(ch, n, opt0, opt1, len);
        if res.is_err() {
            self.failed = true;
        }
        res
    }

    fn send_batch<C: Channel + ?Sized>(
        &mut self,
        ch: &mut C,
        n: usize,
        opt0: &[u8],
        opt1: &[u8],
        len: usize,
    ) -> Result<()> {
        let mut ext = match self.ext.take() {
            Some(ext) => ext,
            None => SenderExtensionBox::new(ch, self.key_bytes)?,
        };
        match self.validation {
            Validation::HHash => {
                let q = ext.xpose(ch, (n + SECURITY_CONSTANT + 7) / 8)?;
                let ok = validate::hhash_check(ch, ext.s(), &q)?;
                verdict(ch, ok)?;
                ext.send_msgs(ch, &q, self.nonce, opt0, opt1, len)?;
                self.ext = Some(ext);
            }
            Validation::ByPair => {
                let q = ext.xpose(ch, (n + 7) / 8)?;
                let rows = validate::by_pair_check(ch, ext.s(), &q)?;
                verdict(ch, rows.is_some())?;
                if let Some(rows) = rows {
                    ext.send_msgs_filtered(ch, &q, &rows, self.nonce, opt0, opt1, len)?;
                }
                // half the rows were revealed, the next batch needs a fresh box
            }
        }
        self.nonce += n as u64;
        debug!("sent {n} extended OTs");
        Ok(())
    }
}

/// Tell the receiver whether the check passed, error out if it did not.
fn verdict<C: Channel + ?Sized>(ch: &mut C, ok: bool) -> Result<()> {
    if ok {
        ch.send_bytes(&[VERDICT_OK])
    } else {
        warn!("consistency check failed, aborting");
        ch.send_bytes(&[VERDICT_ABORT])?;
        Err(Error::ConsistencyCheckFailed)
    }
}

fn recv_verdict<C: Channel + ?Sized>(ch: &mut C) -> Result<()> {
    if ch.recv_exact(1)?[0] != VERDICT_OK {
        warn!("peer aborted the transfer");
        return Err(Error::PeerAborted);
    }
    Ok(())
}

impl OtSender for OtExtSender {
    fn send(&mut self, ch: &mut dyn Channel, opt0: &[u8], opt1: &[u8], len: usize) -> Result<()> {
        OtExtSender::send(self, ch, opt0, opt1, len)
    }
}

/// Oblivious transfer extension receiver for [`OtExtSender`].
#[derive(Debug)]
pub struct OtExtRecver {
    validation: Validation,
    key_bytes: usize,
    ext: Option<RecverExtensionBox>,
    nonce: u64,
    failed: bool,
}

impl OtExtRecver {
    pub fn new<C: Channel + ?Sized>(ch: &mut C, validation: Validation) -> Result<Self> {
        Self::with_key_bytes(ch, validation, validation.key_bytes())
    }

    pub fn with_key_bytes<C: Channel + ?Sized>(
        ch: &mut C,
        validation: Validation,
        key_bytes: usize,
    ) -> Result<Self> {
        let now = Instant::now();
        let ext = RecverExtensionBox::new(ch, key_bytes)?;
        info!(
            "{validation:?} extension receiver setup took {} ms",
            now.elapsed().as_millis()
        );
        Ok(Self {
            validation,
            key_bytes,
            ext: Some(ext),
            nonce: 0,
            failed: false,
        })
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Same as [`HonestOtExtRecver::recv`], returns [`Error::PeerAborted`]
    /// if the sender rejected the batch.
    pub fn recv<C: Channel + ?Sized>(
        &mut self,
        ch: &mut C,
        sel: &[bool],
        len: usize,
    ) -> Result<Vec<u8>> {
        if self.failed {
            return Err(Error::SessionAborted);
        }
        assert!(len > 0);
        if sel.is_empty() {
            return Ok(Vec::new());
        }
        let res = self.recv_batch(ch, sel, len);
        if res.is_err() {
            self.failed = true;
        }
        res
    }

    fn recv_batch<C: Channel + ?Sized>(
        &mut self,
        ch: &mut C,
        sel: &[bool],
        len: usize,
    ) -> Result<Vec<u8>> {
        let n = sel.len();
        let mut ext = match self.ext.take() {
            Some(ext) => ext,
            None => RecverExtensionBox::new(ch, self.key_bytes)?,
        };
        let out = match self.validation {
            Validation::HHash => {
                let mask = padded_mask(sel, (n + SECURITY_CONSTANT + 7) / 8);
                let t = ext.xpose(ch, &mask, mask.len())?;
                validate::hhash_prove(ch, &t)?;
                recv_verdict(ch)?;
                let out = ext.recv_msgs(ch, &t, self.nonce, &mask, n, len)?;
                self.ext = Some(ext);
                out
            }
            Validation::ByPair => {
                let mask = boolvec_to_u8vec(sel);
                let t = ext.xpose(ch, &mask, mask.len())?;
                let rows = validate::by_pair_prove(ch, &t, &mask)?;
                recv_verdict(ch)?;
                ext.recv_msgs_filtered(ch, &t, &rows, self.nonce, &mask, n, len)?
            }
        };
        self.nonce += n as u64;
        debug!("received {n} extended OTs");
        Ok(out)
    }
}

/// Choice bits followed by random padding, `row_bytes` in total.
fn padded_mask(sel: &[bool], row_bytes: usize) -> Vec<u8> {
    let mut mask = vec![0u8; row_bytes];
    rand::thread_rng().fill_bytes(&mut mask);
    for (i, b) in sel.iter().enumerate() {
        set_bit(&mut mask, i, *b);
    }
    mask
}

impl OtRecver for OtExtRecver {
    fn recv(&mut self, ch: &mut dyn Channel, sel: &[bool], len: usize) -> Result<Vec<u8>> {
        OtExtRecver::recv(self, ch, sel, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ot::utils::get_bit, ThreadChannel};
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

    struct Batch {
        opt0: Vec<u8>,
        opt1: Vec<u8>,
        sel: Vec<bool>,
        len: usize,
    }

    impl Batch {
        fn random(n: usize, len: usize) -> Self {
            Batch {
                opt0: (0..n * len).map(|_| rand::random()).collect(),
                opt1: (0..n * len).map(|_| rand::random()).collect(),
                sel: (0..n).map(|_| rand::random()).collect(),
                len,
            }
        }

        fn expected(&self) -> Vec<u8> {
            let len = self.len;
            self.sel
                .iter()
                .enumerate()
                .flat_map(|(i, c)| {
                    let opt = if *c { &self.opt1 } else { &self.opt0 };
                    opt[i * len..(i + 1) * len].to_vec()
                })
                .collect()
        }
    }

    #[test]
    fn test_honest() {
        let (mut ch0, mut ch1) = create_channels();
        let batches = vec![Batch::random(1, 16), Batch::random(100, 8), Batch::random(0, 4)];
        let expected = batches.iter().map(Batch::expected).collect::<Vec<_>>();
        let sels = batches.iter().map(|b| (b.sel.clone(), b.len)).collect::<Vec<_>>();

        let sender = thread::spawn(move || -> Vec<u64> {
            let mut sender = HonestOtExtSender::new(&mut ch0, OT_KEY_BYTES_HONEST).unwrap();
            let mut nonces = vec![sender.nonce()];
            for b in &batches {
                sender.send(&mut ch0, &b.opt0, &b.opt1, b.len).unwrap();
                nonces.push(sender.nonce());
            }
            nonces
        });
        let receiver = thread::spawn(move || -> Vec<Vec<u8>> {
            let mut recver = HonestOtExtRecver::new(&mut ch1, OT_KEY_BYTES_HONEST).unwrap();
            sels.iter()
                .map(|(sel, len)| recver.recv(&mut ch1, sel, *len).unwrap())
                .collect()
        });

        let nonces = sender.join().unwrap();
        assert_eq!(receiver.join().unwrap(), expected);
        assert_eq!(nonces, vec![0, 1, 101, 101]);
    }

    fn run_active(validation: Validation, batches: Vec<Batch>) {
        let (mut ch0, mut ch1) = create_channels();
        let expected = batches.iter().map(Batch::expected).collect::<Vec<_>>();
        let sels = batches.iter().map(|b| (b.sel.clone(), b.len)).collect::<Vec<_>>();

        let sender = thread::spawn(move || -> Vec<u64> {
            let mut sender = OtExtSender::new(&mut ch0, validation).unwrap();
            let mut nonces = vec![sender.nonce()];
            for b in &batches {
                sender.send(&mut ch0, &b.opt0, &b.opt1, b.len).unwrap();
                nonces.push(sender.nonce());
            }
            assert!(!sender.is_failed());
            nonces
        });
        let receiver = thread::spawn(move || -> Vec<Vec<u8>> {
            let mut recver = OtExtRecver::new(&mut ch1, validation).unwrap();
            sels.iter()
                .map(|(sel, len)| recver.recv(&mut ch1, sel, *len).unwrap())
                .collect()
        });

        let nonces = sender.join().unwrap();
        assert_eq!(receiver.join().unwrap(), expected);
        // strictly increasing across batches
        assert!(nonces.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_active_hhash() {
        run_active(
            Validation::HHash,
            vec![Batch::random(1, 16), Batch::random(300, 20), Batch::random(9, 100)],
        );
    }

    #[test]
    fn test_active_by_pair() {
        run_active(
            Validation::ByPair,
            vec![Batch::random(1, 16), Batch::random(300, 20), Batch::random(9, 100)],
        );
    }

    #[test]
    fn test_padded_mask() {
        let sel = (0..21).map(|_| rand::random()).collect::<Vec<bool>>();
        let mask = padded_mask(&sel, 30);
        assert_eq!(mask.len(), 30);
        for (i, b) in sel.iter().enumerate() {
            assert_eq!(get_bit(&mask, i), *b);
        }
    }

    #[test]
    fn test_cheating_receiver_aborts_session() {
        let (mut ch0, mut ch1) = create_channels();
        let n = 64;
        let b = Batch::random(n, 16);

        let sender = thread::spawn(move || {
            let mut sender = OtExtSender::new(&mut ch0, Validation::ByPair).unwrap();
            let err = sender.send(&mut ch0, &b.opt0, &b.opt1, b.len).unwrap_err();
            assert!(matches!(err, Error::ConsistencyCheckFailed));
            assert!(sender.is_failed());
            let err = sender.send(&mut ch0, &b.opt0, &b.opt1, b.len).unwrap_err();
            assert!(matches!(err, Error::SessionAborted));
        });

        // a receiver that answers the check like an honest one but used
        // independent masks on odd rows
        let mut ext = RecverExtensionBox::new(&mut ch1, Validation::ByPair.key_bytes()).unwrap();
        let row_bytes = n / 8;
        let masks = (0..ext.k())
            .map(|_| (0..row_bytes).map(|_| rand::random()).collect())
            .collect::<Vec<Vec<u8>>>();
        let t = ext
            .xpose_with(&mut ch1, row_bytes, |i| {
                if i % 2 == 1 {
                    &masks[i][..]
                } else {
                    &masks[0][..]
                }
            })
            .unwrap();
        validate::by_pair_prove(&mut ch1, &t, &masks[0]).unwrap();
        assert!(matches!(recv_verdict(&mut ch1), Err(Error::PeerAborted)));
        sender.join().unwrap();
    }

    #[test]
    fn test_hhash_cheating_receiver_aborts_session() {
        let (mut ch0, mut ch1) = create_channels();
        let n = 64;
        let b = Batch::random(n, 16);

        let sender = thread::spawn(move || {
            let mut sender = OtExtSender::new(&mut ch0, Validation::HHash).unwrap();
            let err = sender.send(&mut ch0, &b.opt0, &b.opt1, b.len).unwrap_err();
            assert!(matches!(err, Error::ConsistencyCheckFailed));
            assert!(sender.is_failed());
            let err = sender.send(&mut ch0, &b.opt0, &b.opt1, b.len).unwrap_err();
            assert!(matches!(err, Error::SessionAborted));
        });

        let mut ext = RecverExtensionBox::new(&mut ch1, Validation::HHash.key_bytes()).unwrap();
        let row_bytes = (n + SECURITY_CONSTANT + 7) / 8;
        let masks = (0..ext.k())
            .map(|_| (0..row_bytes).map(|_| rand::random()).collect())
            .collect::<Vec<Vec<u8>>>();
        let t = ext
            .xpose_with(&mut ch1, row_bytes, |i| {
                if i % 2 == 1 {
                    &masks[i][..]
                } else {
                    &masks[0][..]
                }
            })
            .unwrap();
        validate::hhash_prove(&mut ch1, &t).unwrap();
        assert!(matches!(recv_verdict(&mut ch1), Err(Error::PeerAborted)));
        sender.join().unwrap();
    }
}
