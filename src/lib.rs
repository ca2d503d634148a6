//! ot-extension: Naor-Pinkas oblivious transfer and IKNP-style OT extension.
//!
//! A sender offers two messages per transfer, the receiver learns the one it
//! chooses and nothing about the other, the sender learns nothing about the
//! choice. A few hundred public-key base OTs set up an extension box which
//! then serves any number of further transfers with symmetric primitives only.
//!
//! # Example
//!
//! ```no_run
//! use ot_extension::{Id, OtConfig, Result, TcpChannel};
//!
//! fn main() -> Result<()> {
//!     let mut ch = TcpChannel::new(Id::Party1, "127.0.0.1:8000".parse().unwrap())?;
//!     let mut recver = OtConfig::new().recver(&mut ch)?;
//!     let msgs = recver.recv(&mut ch, &[true, false, true], 16)?;
//!     assert_eq!(msgs.len(), 3 * 16);
//!     recver.release();
//!     Ok(())
//! }
//! ```

mod channel;
mod config;
mod error;
pub mod ot;

pub use channel::{Channel, Id, TcpChannel, ThreadChannel};
pub use config::{OtConfig, OtScheme, DEFAULT_NMAX};
pub use error::{Error, Result};
pub use ot::{
    extension::{
        HonestOtExtRecver, HonestOtExtSender, OtExtRecver, OtExtSender, Validation,
        OT_KEY_BYTES_HONEST,
    },
    naor_pinkas::{NpotRecver, NpotSender, NPOT_BATCH_SIZE},
    OtEndpoint, OtRecver, OtSender,
};
