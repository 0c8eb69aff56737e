//! Tiny-message decoding.
//!
//! While a dialog is active the device does not reassemble full frames;
//! it interprets single 64-byte reports as stand-alone control messages
//! from a small whitelist. Everything else is rejected.

use crate::std;
use std::fmt;

use crate::messages::{ButtonAck, Cancel, Initialize, MsgId, PassphraseAck, PinMatrixAck, WireMessage};
use crate::registry::Channel;
use crate::{Error, Result, FRAME_HEADER_LEN, FRAME_MAGIC, REPORT_LEN, REPORT_TAG, TINY_BODY_MAX};

#[cfg(feature = "debug-link")]
use crate::messages::{DebugLinkDecision, DebugLinkGetState};

/// Control messages permitted mid-dialog.
#[derive(Clone, Debug, PartialEq)]
pub enum TinyMessage {
    Cancel(Cancel),
    Initialize(Initialize),
    ButtonAck(ButtonAck),
    PinMatrixAck(PinMatrixAck),
    PassphraseAck(PassphraseAck),
    #[cfg(feature = "debug-link")]
    DebugLinkDecision(DebugLinkDecision),
    #[cfg(feature = "debug-link")]
    DebugLinkGetState(DebugLinkGetState),
}

impl fmt::Display for TinyMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cancel(_) => "Cancel",
            Self::Initialize(_) => "Initialize",
            Self::ButtonAck(_) => "ButtonAck",
            Self::PinMatrixAck(_) => "PinMatrixAck",
            Self::PassphraseAck(_) => "PassphraseAck",
            #[cfg(feature = "debug-link")]
            Self::DebugLinkDecision(_) => "DebugLinkDecision",
            #[cfg(feature = "debug-link")]
            Self::DebugLinkGetState(_) => "DebugLinkGetState",
        };

        write!(f, "{name}")
    }
}

/// Decodes one report as a tiny message.
///
/// The body must fit in the report (≤ 55 bytes declared). Ids outside
/// the whitelist and malformed bodies are errors; the caller reports
/// them to the host and keeps polling.
pub fn decode_tiny(channel: Channel, report: &[u8; REPORT_LEN]) -> Result<TinyMessage> {
    if report[0] != REPORT_TAG || report[1] != FRAME_MAGIC || report[2] != FRAME_MAGIC {
        return Err(Error::unexpected("Malformed tiny packet"));
    }

    let msg_id = u16::from_be_bytes([report[3], report[4]]);
    let msg_size = u32::from_be_bytes([report[5], report[6], report[7], report[8]]);

    if msg_size as usize > TINY_BODY_MAX {
        return Err(Error::unexpected("Malformed tiny packet"));
    }

    let body = &report[FRAME_HEADER_LEN..FRAME_HEADER_LEN + msg_size as usize];

    match MsgId::from_wire(msg_id) {
        Some(MsgId::Cancel) => Ok(TinyMessage::Cancel(Cancel::decode(body)?)),
        Some(MsgId::Initialize) => Ok(TinyMessage::Initialize(Initialize::decode(body)?)),
        Some(MsgId::ButtonAck) => Ok(TinyMessage::ButtonAck(ButtonAck::decode(body)?)),
        Some(MsgId::PinMatrixAck) => Ok(TinyMessage::PinMatrixAck(PinMatrixAck::decode(body)?)),
        Some(MsgId::PassphraseAck) => {
            Ok(TinyMessage::PassphraseAck(PassphraseAck::decode(body)?))
        }
        #[cfg(feature = "debug-link")]
        Some(MsgId::DebugLinkDecision) if channel == Channel::Debug => Ok(
            TinyMessage::DebugLinkDecision(DebugLinkDecision::decode(body)?),
        ),
        #[cfg(feature = "debug-link")]
        Some(MsgId::DebugLinkGetState) if channel == Channel::Debug => Ok(
            TinyMessage::DebugLinkGetState(DebugLinkGetState::decode(body)?),
        ),
        _ => {
            let _ = channel;
            Err(Error::unexpected("Unknown message"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::host_frames;

    fn tiny_report(id: u16, body: &[u8]) -> [u8; REPORT_LEN] {
        let frames = host_frames(id, body);
        assert_eq!(frames.len(), 1, "tiny fixtures must be single-report");
        frames[0]
    }

    #[test]
    fn test_button_ack() -> Result<()> {
        let report = tiny_report(MsgId::ButtonAck.into(), &[]);
        let msg = decode_tiny(Channel::Normal, &report)?;
        assert_eq!(msg, TinyMessage::ButtonAck(ButtonAck));

        Ok(())
    }

    #[test]
    fn test_cancel_and_initialize() -> Result<()> {
        let report = tiny_report(MsgId::Cancel.into(), &[]);
        assert_eq!(
            decode_tiny(Channel::Normal, &report)?,
            TinyMessage::Cancel(Cancel)
        );

        let report = tiny_report(MsgId::Initialize.into(), &[]);
        assert_eq!(
            decode_tiny(Channel::Normal, &report)?,
            TinyMessage::Initialize(Initialize)
        );

        Ok(())
    }

    #[test]
    fn test_non_whitelisted_id_rejected() {
        let report = tiny_report(MsgId::Ping.into(), &[]);
        let err = decode_tiny(Channel::Normal, &report).unwrap_err();
        assert_eq!(err.message(), "Unknown message");
    }

    #[test]
    fn test_oversized_body_rejected() {
        let mut report = tiny_report(MsgId::ButtonAck.into(), &[]);
        report[5..9].copy_from_slice(&56u32.to_be_bytes());

        let err = decode_tiny(Channel::Normal, &report).unwrap_err();
        assert_eq!(err.message(), "Malformed tiny packet");
    }

    #[test]
    fn test_missing_magic_rejected() {
        let mut report = tiny_report(MsgId::ButtonAck.into(), &[]);
        report[1] = 0;

        let err = decode_tiny(Channel::Normal, &report).unwrap_err();
        assert_eq!(err.message(), "Malformed tiny packet");
    }

    #[cfg(feature = "debug-link")]
    #[test]
    fn test_debug_decision_requires_debug_channel() -> Result<()> {
        use crate::wire::Encoder;

        let msg = DebugLinkDecision { yes_no: true };
        let mut buf = [0u8; 16];
        let len = {
            let mut enc = Encoder::new(&mut buf);
            msg.encode(&mut enc)?;
            enc.len()
        };

        let report = tiny_report(MsgId::DebugLinkDecision.into(), &buf[..len]);

        assert!(decode_tiny(Channel::Normal, &report).is_err());
        assert_eq!(
            decode_tiny(Channel::Debug, &report)?,
            TinyMessage::DebugLinkDecision(msg)
        );

        Ok(())
    }
}
