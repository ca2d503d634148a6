//! Oblivious transfer behind a common sender/receiver interface.
//!
//! [`OtSender`] and [`OtRecver`] are implemented by the Naor-Pinkas base OT
//! and by both flavours of OT extension, so callers can pick a scheme at
//! runtime (see [`OtConfig`]) and hold on to a `Box<dyn OtSender>`.
//!
//! [`OtConfig`]: crate::OtConfig

use crate::{channel::Channel, error::Result};
use log::debug;

pub mod cointoss;
pub mod extension;
pub mod extension_box;
pub mod group;
pub mod naor_pinkas;
pub mod utils;
pub mod validate;

/// Sender of 1-out-of-2 oblivious transfers.
pub trait OtSender: Send {
    /// Run `opt0.len() / len` transfers, the `i`-th offering
    /// `opt0[i * len..(i + 1) * len]` and `opt1[i * len..(i + 1) * len]`.
    fn send(&mut self, ch: &mut dyn Channel, opt0: &[u8], opt1: &[u8], len: usize) -> Result<()>;

    /// Release the session. Dropping the box has the same effect.
    fn release(self: Box<Self>) {
        debug!("released OT sender");
    }
}

/// Receiver of 1-out-of-2 oblivious transfers.
pub trait OtRecver: Send {
    /// Receive `sel.len()` options of `len` bytes, option `sel[i]` of transfer `i`.
    fn recv(&mut self, ch: &mut dyn Channel, sel: &[bool], len: usize) -> Result<Vec<u8>>;

    /// Release the session. Dropping the box has the same effect.
    fn release(self: Box<Self>) {
        debug!("released OT receiver");
    }
}

/// The role one party plays in a two-party OT session.
pub enum OtEndpoint {
    Sender(Box<dyn OtSender>),
    Recver(Box<dyn OtRecver>),
}

impl OtEndpoint {
    pub fn into_sender(self) -> Option<Box<dyn OtSender>> {
        match self {
            OtEndpoint::Sender(sender) => Some(sender),
            OtEndpoint::Recver(_) => None,
        }
    }

    pub fn into_recver(self) -> Option<Box<dyn OtRecver>> {
        match self {
            OtEndpoint::Sender(_) => None,
            OtEndpoint::Recver(recver) => Some(recver),
        }
    }

    pub fn release(self) {
        match self {
            OtEndpoint::Sender(sender) => sender.release(),
            OtEndpoint::Recver(recver) => recver.release(),
        }
    }
}

impl std::fmt::Debug for OtEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OtEndpoint::Sender(_) => f.write_str("OtEndpoint::Sender"),
            OtEndpoint::Recver(_) => f.write_str("OtEndpoint::Recver"),
        }
    }
}
