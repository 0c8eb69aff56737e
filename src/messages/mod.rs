//! Typed messages carried in the frame payloads.
//!
//! Every message implements [WireMessage]: a compile-time id plus
//! encode/decode against the field encoding in [wire](crate::wire).
//! Host-initiated messages live in `control`, the typed-data signing
//! messages in `eip712`, and the debug-link messages (behind the
//! `debug-link` feature) in `debug`.

use crate::std;
use std::fmt;

use crate::wire::Encoder;
use crate::Result;

/// Control and device-management messages
pub mod control;
/// Typed-data (EIP-712) signing messages
pub mod eip712;

#[cfg(feature = "debug-link")]
/// Debug-link messages
pub mod debug;

pub use control::*;
#[cfg(feature = "debug-link")]
pub use debug::*;
pub use eip712::*;

/// Message identifiers carried in the frame header.
///
/// The values are part of the wire protocol. The typed-data block lives
/// in a vendor range (464..=471); everything else matches the public
/// protocol ids.
#[repr(u16)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum MsgId {
    Initialize = 0,
    Ping = 1,
    Success = 2,
    Failure = 3,
    Features = 17,
    PinMatrixRequest = 18,
    PinMatrixAck = 19,
    Cancel = 20,
    ButtonRequest = 26,
    ButtonAck = 27,
    PassphraseRequest = 41,
    PassphraseAck = 42,
    GetFeatures = 55,
    MessageSignature = 66,
    #[cfg(feature = "debug-link")]
    DebugLinkDecision = 100,
    #[cfg(feature = "debug-link")]
    DebugLinkGetState = 101,
    #[cfg(feature = "debug-link")]
    DebugLinkState = 102,
    #[cfg(feature = "debug-link")]
    DebugLinkStop = 103,
    SoftReset = 113,
    Eip712Init = 464,
    Eip712ContextInfo = 465,
    Eip712PushFrame = 466,
    Eip712PopFrame = 467,
    Eip712AppendAtomicField = 468,
    Eip712AppendDynamicData = 469,
    Eip712Sign = 470,
    Eip712Verify = 471,
}

impl MsgId {
    /// Resolves a wire id to a known message id.
    pub fn from_wire(id: u16) -> Option<Self> {
        match id {
            0 => Some(Self::Initialize),
            1 => Some(Self::Ping),
            2 => Some(Self::Success),
            3 => Some(Self::Failure),
            17 => Some(Self::Features),
            18 => Some(Self::PinMatrixRequest),
            19 => Some(Self::PinMatrixAck),
            20 => Some(Self::Cancel),
            26 => Some(Self::ButtonRequest),
            27 => Some(Self::ButtonAck),
            41 => Some(Self::PassphraseRequest),
            42 => Some(Self::PassphraseAck),
            55 => Some(Self::GetFeatures),
            66 => Some(Self::MessageSignature),
            #[cfg(feature = "debug-link")]
            100 => Some(Self::DebugLinkDecision),
            #[cfg(feature = "debug-link")]
            101 => Some(Self::DebugLinkGetState),
            #[cfg(feature = "debug-link")]
            102 => Some(Self::DebugLinkState),
            #[cfg(feature = "debug-link")]
            103 => Some(Self::DebugLinkStop),
            113 => Some(Self::SoftReset),
            464 => Some(Self::Eip712Init),
            465 => Some(Self::Eip712ContextInfo),
            466 => Some(Self::Eip712PushFrame),
            467 => Some(Self::Eip712PopFrame),
            468 => Some(Self::Eip712AppendAtomicField),
            469 => Some(Self::Eip712AppendDynamicData),
            470 => Some(Self::Eip712Sign),
            471 => Some(Self::Eip712Verify),
            _ => None,
        }
    }
}

impl From<MsgId> for u16 {
    fn from(id: MsgId) -> Self {
        id as u16
    }
}

impl fmt::Display for MsgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Generic functions for all message types.
pub trait WireMessage: Sized {
    /// Id carried in the frame header for this message.
    const ID: MsgId;

    /// Encodes the message body.
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()>;

    /// Decodes a message body.
    ///
    /// Unknown fields are skipped; truncated or malformed fields are
    /// errors.
    fn decode(body: &[u8]) -> Result<Self>;
}
