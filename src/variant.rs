//! Request variant for dispatching decoded inbound messages.
//!
//! Wraps every host-initiated message in a single type so the dispatcher
//! can hand one value to the device after schema decode.

use crate::std;
use std::fmt;

use crate::{inner_enum, Error, MsgId, Result};

use crate::messages::{
    ButtonAck, Cancel, Eip712AppendAtomicField, Eip712AppendDynamicData, Eip712Init,
    Eip712PopFrame, Eip712PushFrame, Eip712Sign, Eip712Verify, GetFeatures, Initialize,
    PassphraseAck, PinMatrixAck, Ping, SoftReset, WireMessage,
};

#[cfg(feature = "debug-link")]
use crate::messages::{DebugLinkDecision, DebugLinkGetState, DebugLinkStop};

/// Decoded host-initiated message variants.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestVariant {
    Initialize(Initialize),
    GetFeatures(GetFeatures),
    Ping(Ping),
    Cancel(Cancel),
    ButtonAck(ButtonAck),
    PinMatrixAck(PinMatrixAck),
    PassphraseAck(PassphraseAck),
    SoftReset(SoftReset),
    Eip712Init(Eip712Init),
    Eip712PushFrame(Eip712PushFrame),
    Eip712PopFrame(Eip712PopFrame),
    Eip712AppendAtomicField(Eip712AppendAtomicField),
    Eip712AppendDynamicData(Eip712AppendDynamicData),
    Eip712Sign(Eip712Sign),
    Eip712Verify(Eip712Verify),
    #[cfg(feature = "debug-link")]
    DebugLinkDecision(DebugLinkDecision),
    #[cfg(feature = "debug-link")]
    DebugLinkGetState(DebugLinkGetState),
    #[cfg(feature = "debug-link")]
    DebugLinkStop(DebugLinkStop),
}

inner_enum!(RequestVariant, Ping);
inner_enum!(RequestVariant, Initialize);
inner_enum!(RequestVariant, GetFeatures);
inner_enum!(RequestVariant, Cancel);
inner_enum!(RequestVariant, ButtonAck);
inner_enum!(RequestVariant, PinMatrixAck);
inner_enum!(RequestVariant, PassphraseAck);
inner_enum!(RequestVariant, SoftReset);
inner_enum!(RequestVariant, Eip712Init);
inner_enum!(RequestVariant, Eip712PushFrame);
inner_enum!(RequestVariant, Eip712PopFrame);
inner_enum!(RequestVariant, Eip712AppendAtomicField);
inner_enum!(RequestVariant, Eip712AppendDynamicData);
inner_enum!(RequestVariant, Eip712Sign);
inner_enum!(RequestVariant, Eip712Verify);

impl RequestVariant {
    /// Decodes a reassembled body into its typed request.
    ///
    /// Fails for ids that are not host-initiated and for malformed
    /// bodies.
    pub fn decode(id: MsgId, body: &[u8]) -> Result<Self> {
        match id {
            MsgId::Initialize => Ok(Self::Initialize(Initialize::decode(body)?)),
            MsgId::GetFeatures => Ok(Self::GetFeatures(GetFeatures::decode(body)?)),
            MsgId::Ping => Ok(Self::Ping(Ping::decode(body)?)),
            MsgId::Cancel => Ok(Self::Cancel(Cancel::decode(body)?)),
            MsgId::ButtonAck => Ok(Self::ButtonAck(ButtonAck::decode(body)?)),
            MsgId::PinMatrixAck => Ok(Self::PinMatrixAck(PinMatrixAck::decode(body)?)),
            MsgId::PassphraseAck => Ok(Self::PassphraseAck(PassphraseAck::decode(body)?)),
            MsgId::SoftReset => Ok(Self::SoftReset(SoftReset::decode(body)?)),
            MsgId::Eip712Init => Ok(Self::Eip712Init(Eip712Init::decode(body)?)),
            MsgId::Eip712PushFrame => Ok(Self::Eip712PushFrame(Eip712PushFrame::decode(body)?)),
            MsgId::Eip712PopFrame => Ok(Self::Eip712PopFrame(Eip712PopFrame::decode(body)?)),
            MsgId::Eip712AppendAtomicField => Ok(Self::Eip712AppendAtomicField(
                Eip712AppendAtomicField::decode(body)?,
            )),
            MsgId::Eip712AppendDynamicData => Ok(Self::Eip712AppendDynamicData(
                Eip712AppendDynamicData::decode(body)?,
            )),
            MsgId::Eip712Sign => Ok(Self::Eip712Sign(Eip712Sign::decode(body)?)),
            MsgId::Eip712Verify => Ok(Self::Eip712Verify(Eip712Verify::decode(body)?)),
            #[cfg(feature = "debug-link")]
            MsgId::DebugLinkDecision => {
                Ok(Self::DebugLinkDecision(DebugLinkDecision::decode(body)?))
            }
            #[cfg(feature = "debug-link")]
            MsgId::DebugLinkGetState => {
                Ok(Self::DebugLinkGetState(DebugLinkGetState::decode(body)?))
            }
            #[cfg(feature = "debug-link")]
            MsgId::DebugLinkStop => Ok(Self::DebugLinkStop(DebugLinkStop::decode(body)?)),
            _ => Err(Error::unexpected(format!("{id} is not a host message"))),
        }
    }

    /// Gets the message id of the wrapped request.
    pub fn msg_id(&self) -> MsgId {
        match self {
            Self::Initialize(_) => MsgId::Initialize,
            Self::GetFeatures(_) => MsgId::GetFeatures,
            Self::Ping(_) => MsgId::Ping,
            Self::Cancel(_) => MsgId::Cancel,
            Self::ButtonAck(_) => MsgId::ButtonAck,
            Self::PinMatrixAck(_) => MsgId::PinMatrixAck,
            Self::PassphraseAck(_) => MsgId::PassphraseAck,
            Self::SoftReset(_) => MsgId::SoftReset,
            Self::Eip712Init(_) => MsgId::Eip712Init,
            Self::Eip712PushFrame(_) => MsgId::Eip712PushFrame,
            Self::Eip712PopFrame(_) => MsgId::Eip712PopFrame,
            Self::Eip712AppendAtomicField(_) => MsgId::Eip712AppendAtomicField,
            Self::Eip712AppendDynamicData(_) => MsgId::Eip712AppendDynamicData,
            Self::Eip712Sign(_) => MsgId::Eip712Sign,
            Self::Eip712Verify(_) => MsgId::Eip712Verify,
            #[cfg(feature = "debug-link")]
            Self::DebugLinkDecision(_) => MsgId::DebugLinkDecision,
            #[cfg(feature = "debug-link")]
            Self::DebugLinkGetState(_) => MsgId::DebugLinkGetState,
            #[cfg(feature = "debug-link")]
            Self::DebugLinkStop(_) => MsgId::DebugLinkStop,
        }
    }
}

impl fmt::Display for RequestVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg_id())
    }
}
