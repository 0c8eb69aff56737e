//! Debug-link messages, available on emulator and test builds only.

#[cfg(not(feature = "std"))]
use alloc::string::String;

use crate::messages::control::empty_message;
use crate::wire::{Decoder, Encoder};
use crate::{MsgId, Result, WireMessage};

empty_message!(
    DebugLinkGetState,
    MsgId::DebugLinkGetState,
    "Requests a device-state dump over the debug channel."
);
empty_message!(
    DebugLinkStop,
    MsgId::DebugLinkStop,
    "Detaches the debug link; no reply is sent."
);

/// DebugLinkDecision - scripted stand-in for the physical gesture (id 100)
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct DebugLinkDecision {
    pub yes_no: bool,
}

impl WireMessage for DebugLinkDecision {
    const ID: MsgId = MsgId::DebugLinkDecision;

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.bool_field(1, self.yes_no)
    }

    fn decode(body: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(body);
        let mut yes_no = None;

        while !dec.is_empty() {
            let (tag, wt) = dec.key()?;
            match tag {
                1 => yes_no = Some(dec.boolean(wt)?),
                _ => dec.skip(wt)?,
            }
        }

        Ok(Self {
            yes_no: yes_no.ok_or_else(|| crate::Error::syntax("missing decision"))?,
        })
    }
}

/// DebugLinkState - device-state dump (id 102)
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct DebugLinkState {
    pub initialized: Option<bool>,
    pub pin_cached: Option<bool>,
    pub typed_data_failure: Option<String>,
}

impl WireMessage for DebugLinkState {
    const ID: MsgId = MsgId::DebugLinkState;

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        if let Some(initialized) = self.initialized {
            enc.bool_field(1, initialized)?;
        }
        if let Some(pin_cached) = self.pin_cached {
            enc.bool_field(2, pin_cached)?;
        }
        if let Some(failure) = &self.typed_data_failure {
            enc.string_field(3, failure)?;
        }
        Ok(())
    }

    fn decode(body: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(body);
        let mut msg = Self::default();

        while !dec.is_empty() {
            let (tag, wt) = dec.key()?;
            match tag {
                1 => msg.initialized = Some(dec.boolean(wt)?),
                2 => msg.pin_cached = Some(dec.boolean(wt)?),
                3 => msg.typed_data_failure = Some(dec.string(wt)?),
                _ => dec.skip(wt)?,
            }
        }

        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_round_trip() -> Result<()> {
        let msg = DebugLinkDecision { yes_no: true };

        let mut buf = [0u8; 16];
        let len = {
            let mut enc = Encoder::new(&mut buf);
            msg.encode(&mut enc)?;
            enc.len()
        };

        assert_eq!(DebugLinkDecision::decode(&buf[..len])?, msg);

        Ok(())
    }
}
