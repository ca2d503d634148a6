use crate::{
    channel::{Channel, Id},
    error::Result,
    ot::{
        extension::{
            HonestOtExtRecver, HonestOtExtSender, OtExtRecver, OtExtSender, Validation,
            OT_KEY_BYTES_HONEST,
        },
        naor_pinkas::{NpotRecver, NpotSender},
        OtEndpoint, OtRecver, OtSender,
    },
};
use serde::{Deserialize, Serialize};

/// Default number of options per Naor-Pinkas transfer.
pub const DEFAULT_NMAX: usize = 32;

/// Which construction backs an [`OtSender`] / [`OtRecver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OtScheme {
    /// Batched Naor-Pinkas base OT, public-key operations for every transfer.
    NaorPinkas,
    /// OT extension secure against a semi-honest receiver.
    HonestExtension,
    /// OT extension with a consistency check on every batch.
    #[default]
    ActiveExtension,
}

/// A [builder] used to configure and construct OT sessions.
/// Both parties must use equal configurations.
///
/// [builder]: https://rust-unofficial.github.io/patterns/patterns/creational/builder.html
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtConfig {
    scheme: OtScheme,
    nmax: usize,
    key_bytes: Option<usize>,
    validation: Validation,
}

impl Default for OtConfig {
    fn default() -> Self {
        OtConfig {
            scheme: OtScheme::default(),
            nmax: DEFAULT_NMAX,
            key_bytes: None,
            validation: Validation::default(),
        }
    }
}

impl OtConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheme(mut self, scheme: OtScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Set the number of options per Naor-Pinkas transfer, only used by [`OtScheme::NaorPinkas`].
    ///
    /// # Panics
    /// If `nmax < 2`.
    pub fn nmax(mut self, nmax: usize) -> Self {
        assert!(nmax >= 2);
        self.nmax = nmax;
        self
    }

    /// Override the extension key size, `8 * key_bytes` base OTs are run per box.
    ///
    /// # Panics
    /// If `key_bytes` is zero.
    pub fn key_bytes(mut self, key_bytes: usize) -> Self {
        assert!(key_bytes > 0);
        self.key_bytes = Some(key_bytes);
        self
    }

    /// Set the consistency check, only used by [`OtScheme::ActiveExtension`].
    pub fn validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    pub fn get_scheme(&self) -> OtScheme {
        self.scheme
    }

    /// Key bytes the extension sessions will use.
    pub fn get_key_bytes(&self) -> usize {
        self.key_bytes.unwrap_or(match self.scheme {
            OtScheme::NaorPinkas | OtScheme::HonestExtension => OT_KEY_BYTES_HONEST,
            OtScheme::ActiveExtension => self.validation.key_bytes(),
        })
    }

    /// Construct the sender side, runs the setup phase with the peer.
    pub fn sender(&self, ch: &mut dyn Channel) -> Result<Box<dyn OtSender>> {
        let sender: Box<dyn OtSender> = match self.scheme {
            OtScheme::NaorPinkas => Box::new(NpotSender::new(ch, self.nmax)?),
            OtScheme::HonestExtension => {
                Box::new(HonestOtExtSender::new(ch, self.get_key_bytes())?)
            }
            OtScheme::ActiveExtension => Box::new(OtExtSender::with_key_bytes(
                ch,
                self.validation,
                self.get_key_bytes(),
            )?),
        };
        Ok(sender)
    }

    /// Construct the receiver side, runs the setup phase with the peer.
    pub fn recver(&self, ch: &mut dyn Channel) -> Result<Box<dyn OtRecver>> {
        let recver: Box<dyn OtRecver> = match self.scheme {
            OtScheme::NaorPinkas => Box::new(NpotRecver::new(ch, self.nmax)?),
            OtScheme::HonestExtension => {
                Box::new(HonestOtExtRecver::new(ch, self.get_key_bytes())?)
            }
            OtScheme::ActiveExtension => Box::new(OtExtRecver::with_key_bytes(
                ch,
                self.validation,
                self.get_key_bytes(),
            )?),
        };
        Ok(recver)
    }

    /// [`Id::Party0`] becomes the sender, [`Id::Party1`] the receiver.
    pub fn endpoint(&self, ch: &mut dyn Channel, id: Id) -> Result<OtEndpoint> {
        Ok(match id {
            Id::Party0 => OtEndpoint::Sender(self.sender(ch)?),
            Id::Party1 => OtEndpoint::Recver(self.recver(ch)?),
        })
    }
}
