//! Control and device-management messages.

#[cfg(not(feature = "std"))]
use alloc::string::String;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::std;
use std::fmt;

use crate::wire::{Decoder, Encoder};
use crate::{FailureCode, MsgId, Result, WireMessage};

/// Declares an empty (field-less) message type.
macro_rules! empty_message {
    ($name:ident, $id:expr, $doc:tt) => {
        #[doc = $doc]
        #[derive(Clone, Copy, Debug, Default, PartialEq)]
        #[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
        pub struct $name;

        impl WireMessage for $name {
            const ID: MsgId = $id;

            fn encode(&self, _enc: &mut Encoder<'_>) -> Result<()> {
                Ok(())
            }

            fn decode(body: &[u8]) -> Result<Self> {
                let mut dec = Decoder::new(body);
                while !dec.is_empty() {
                    let (_, wt) = dec.key()?;
                    dec.skip(wt)?;
                }
                Ok(Self)
            }
        }
    };
}

pub(crate) use empty_message;

empty_message!(
    Initialize,
    MsgId::Initialize,
    "Resets multi-message state and requests the device's feature report."
);
empty_message!(
    GetFeatures,
    MsgId::GetFeatures,
    "Requests the device's feature report without resetting anything."
);
empty_message!(Cancel, MsgId::Cancel, "Aborts the pending action.");
empty_message!(
    ButtonAck,
    MsgId::ButtonAck,
    "Unmutes the physical button for the pending confirmation."
);
empty_message!(
    PassphraseRequest,
    MsgId::PassphraseRequest,
    "Asks the host for the session passphrase."
);
empty_message!(
    SoftReset,
    MsgId::SoftReset,
    "Factory-only board reset."
);

/// Ping - host connectivity check (id 1)
///
/// The device echoes `message` back in a [Success] reply, optionally
/// after a confirmation dialog and/or a PIN check.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Ping {
    pub message: Option<String>,
    pub button_protection: Option<bool>,
    pub pin_protection: Option<bool>,
}

impl WireMessage for Ping {
    const ID: MsgId = MsgId::Ping;

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        if let Some(message) = &self.message {
            enc.string_field(1, message)?;
        }
        if let Some(button_protection) = self.button_protection {
            enc.bool_field(2, button_protection)?;
        }
        if let Some(pin_protection) = self.pin_protection {
            enc.bool_field(3, pin_protection)?;
        }
        Ok(())
    }

    fn decode(body: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(body);
        let mut msg = Self::default();

        while !dec.is_empty() {
            let (tag, wt) = dec.key()?;
            match tag {
                1 => msg.message = Some(dec.string(wt)?),
                2 => msg.button_protection = Some(dec.boolean(wt)?),
                3 => msg.pin_protection = Some(dec.boolean(wt)?),
                _ => dec.skip(wt)?,
            }
        }

        Ok(msg)
    }
}

/// Success - positive turn outcome (id 2)
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Success {
    pub message: Option<String>,
}

impl WireMessage for Success {
    const ID: MsgId = MsgId::Success;

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        if let Some(message) = &self.message {
            enc.string_field(1, message)?;
        }
        Ok(())
    }

    fn decode(body: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(body);
        let mut msg = Self::default();

        while !dec.is_empty() {
            let (tag, wt) = dec.key()?;
            match tag {
                1 => msg.message = Some(dec.string(wt)?),
                _ => dec.skip(wt)?,
            }
        }

        Ok(msg)
    }
}

/// Failure - negative turn outcome (id 3)
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Failure {
    pub code: Option<FailureCode>,
    pub message: Option<String>,
}

impl WireMessage for Failure {
    const ID: MsgId = MsgId::Failure;

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        if let Some(code) = self.code {
            enc.uint_field(1, u32::from(code) as u64)?;
        }
        if let Some(message) = &self.message {
            enc.string_field(2, message)?;
        }
        Ok(())
    }

    fn decode(body: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(body);
        let mut msg = Self::default();

        while !dec.is_empty() {
            let (tag, wt) = dec.key()?;
            match tag {
                1 => msg.code = Some(dec.uint32(wt)?.into()),
                2 => msg.message = Some(dec.string(wt)?),
                _ => dec.skip(wt)?,
            }
        }

        Ok(msg)
    }
}

/// Features - device description (id 17)
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Features {
    pub vendor: Option<String>,
    pub major_version: Option<u32>,
    pub minor_version: Option<u32>,
    pub patch_version: Option<u32>,
    pub device_id: Option<String>,
    pub label: Option<String>,
    pub initialized: Option<bool>,
    pub model: Option<String>,
    pub firmware_variant: Option<String>,
}

impl WireMessage for Features {
    const ID: MsgId = MsgId::Features;

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        if let Some(vendor) = &self.vendor {
            enc.string_field(1, vendor)?;
        }
        if let Some(major) = self.major_version {
            enc.uint_field(2, major as u64)?;
        }
        if let Some(minor) = self.minor_version {
            enc.uint_field(3, minor as u64)?;
        }
        if let Some(patch) = self.patch_version {
            enc.uint_field(4, patch as u64)?;
        }
        if let Some(device_id) = &self.device_id {
            enc.string_field(5, device_id)?;
        }
        if let Some(label) = &self.label {
            enc.string_field(6, label)?;
        }
        if let Some(initialized) = self.initialized {
            enc.bool_field(7, initialized)?;
        }
        if let Some(model) = &self.model {
            enc.string_field(8, model)?;
        }
        if let Some(firmware_variant) = &self.firmware_variant {
            enc.string_field(9, firmware_variant)?;
        }
        Ok(())
    }

    fn decode(body: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(body);
        let mut msg = Self::default();

        while !dec.is_empty() {
            let (tag, wt) = dec.key()?;
            match tag {
                1 => msg.vendor = Some(dec.string(wt)?),
                2 => msg.major_version = Some(dec.uint32(wt)?),
                3 => msg.minor_version = Some(dec.uint32(wt)?),
                4 => msg.patch_version = Some(dec.uint32(wt)?),
                5 => msg.device_id = Some(dec.string(wt)?),
                6 => msg.label = Some(dec.string(wt)?),
                7 => msg.initialized = Some(dec.boolean(wt)?),
                8 => msg.model = Some(dec.string(wt)?),
                9 => msg.firmware_variant = Some(dec.string(wt)?),
                _ => dec.skip(wt)?,
            }
        }

        Ok(msg)
    }
}

/// Reasons the device raises a confirmation dialog.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum ButtonRequestCode {
    Other = 1,
    Ping = 2,
    ConfirmOutput = 3,
    ProtectCall = 7,
    SignTx = 8,
    Address = 10,
}

impl From<u32> for ButtonRequestCode {
    fn from(code: u32) -> Self {
        match code {
            2 => Self::Ping,
            3 => Self::ConfirmOutput,
            7 => Self::ProtectCall,
            8 => Self::SignTx,
            10 => Self::Address,
            _ => Self::Other,
        }
    }
}

impl From<ButtonRequestCode> for u32 {
    fn from(code: ButtonRequestCode) -> Self {
        code as u32
    }
}

impl fmt::Display for ButtonRequestCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// ButtonRequest - dialog announcement (id 26)
///
/// Gesture input stays muted until the host answers with [ButtonAck].
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct ButtonRequest {
    pub code: Option<ButtonRequestCode>,
}

impl WireMessage for ButtonRequest {
    const ID: MsgId = MsgId::ButtonRequest;

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        if let Some(code) = self.code {
            enc.uint_field(1, u32::from(code) as u64)?;
        }
        Ok(())
    }

    fn decode(body: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(body);
        let mut msg = Self::default();

        while !dec.is_empty() {
            let (tag, wt) = dec.key()?;
            match tag {
                1 => msg.code = Some(dec.uint32(wt)?.into()),
                _ => dec.skip(wt)?,
            }
        }

        Ok(msg)
    }
}

/// Kinds of PIN entry a [PinMatrixRequest] can ask for.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum PinMatrixKind {
    Current = 1,
    NewFirst = 2,
    NewSecond = 3,
}

impl From<u32> for PinMatrixKind {
    fn from(kind: u32) -> Self {
        match kind {
            2 => Self::NewFirst,
            3 => Self::NewSecond,
            _ => Self::Current,
        }
    }
}

impl From<PinMatrixKind> for u32 {
    fn from(kind: PinMatrixKind) -> Self {
        kind as u32
    }
}

/// PinMatrixRequest - PIN entry announcement (id 18)
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct PinMatrixRequest {
    pub kind: Option<PinMatrixKind>,
}

impl WireMessage for PinMatrixRequest {
    const ID: MsgId = MsgId::PinMatrixRequest;

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        if let Some(kind) = self.kind {
            enc.uint_field(1, u32::from(kind) as u64)?;
        }
        Ok(())
    }

    fn decode(body: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(body);
        let mut msg = Self::default();

        while !dec.is_empty() {
            let (tag, wt) = dec.key()?;
            match tag {
                1 => msg.kind = Some(dec.uint32(wt)?.into()),
                _ => dec.skip(wt)?,
            }
        }

        Ok(msg)
    }
}

/// PinMatrixAck - scrambled PIN digits (id 19)
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct PinMatrixAck {
    pub pin: String,
}

impl WireMessage for PinMatrixAck {
    const ID: MsgId = MsgId::PinMatrixAck;

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.string_field(1, &self.pin)
    }

    fn decode(body: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(body);
        let mut pin = None;

        while !dec.is_empty() {
            let (tag, wt) = dec.key()?;
            match tag {
                1 => pin = Some(dec.string(wt)?),
                _ => dec.skip(wt)?,
            }
        }

        Ok(Self {
            pin: pin.ok_or_else(|| crate::Error::syntax("missing pin field"))?,
        })
    }
}

/// PassphraseAck - session passphrase (id 42)
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct PassphraseAck {
    pub passphrase: String,
}

impl WireMessage for PassphraseAck {
    const ID: MsgId = MsgId::PassphraseAck;

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.string_field(1, &self.passphrase)
    }

    fn decode(body: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(body);
        let mut passphrase = None;

        while !dec.is_empty() {
            let (tag, wt) = dec.key()?;
            match tag {
                1 => passphrase = Some(dec.string(wt)?),
                _ => dec.skip(wt)?,
            }
        }

        Ok(Self {
            passphrase: passphrase.ok_or_else(|| crate::Error::syntax("missing passphrase field"))?,
        })
    }
}

/// MessageSignature - recoverable signature over a digest (id 66)
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct MessageSignature {
    pub address: Option<Vec<u8>>,
    pub signature: Option<Vec<u8>>,
}

impl WireMessage for MessageSignature {
    const ID: MsgId = MsgId::MessageSignature;

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        if let Some(address) = &self.address {
            enc.bytes_field(1, address)?;
        }
        if let Some(signature) = &self.signature {
            enc.bytes_field(2, signature)?;
        }
        Ok(())
    }

    fn decode(body: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(body);
        let mut msg = Self::default();

        while !dec.is_empty() {
            let (tag, wt) = dec.key()?;
            match tag {
                1 => msg.address = Some(dec.bytes(wt)?.into()),
                2 => msg.signature = Some(dec.bytes(wt)?.into()),
                _ => dec.skip(wt)?,
            }
        }

        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<M: WireMessage + PartialEq + core::fmt::Debug>(msg: &M) -> Result<M> {
        let mut buf = [0u8; 256];
        let len = {
            let mut enc = Encoder::new(&mut buf);
            msg.encode(&mut enc)?;
            enc.len()
        };

        M::decode(&buf[..len])
    }

    #[test]
    fn test_ping_round_trip() -> Result<()> {
        let msg = Ping {
            message: Some("hello device".into()),
            button_protection: Some(true),
            pin_protection: None,
        };

        assert_eq!(round_trip(&msg)?, msg);

        Ok(())
    }

    #[test]
    fn test_empty_success_encodes_to_nothing() -> Result<()> {
        let msg = Success { message: None };
        let mut buf = [0u8; 16];
        let mut enc = Encoder::new(&mut buf);
        msg.encode(&mut enc)?;

        assert_eq!(enc.len(), 0);

        Ok(())
    }

    #[test]
    fn test_failure_fixture() -> Result<()> {
        let msg = Failure {
            code: Some(FailureCode::ActionCancelled),
            message: Some("Action cancelled by user".into()),
        };

        let mut buf = [0u8; 64];
        let len = {
            let mut enc = Encoder::new(&mut buf);
            msg.encode(&mut enc)?;
            enc.len()
        };

        // field 1 varint 4, field 2 length-delimited text
        assert_eq!(buf[0], 0x08);
        assert_eq!(buf[1], 0x04);
        assert_eq!(buf[2], 0x12);
        assert_eq!(buf[3], 24);

        assert_eq!(Failure::decode(&buf[..len])?, msg);

        Ok(())
    }

    #[test]
    fn test_features_round_trip() -> Result<()> {
        let msg = Features {
            vendor: Some("hidsign".into()),
            major_version: Some(0),
            minor_version: Some(3),
            patch_version: Some(1),
            device_id: Some("E2B9D3A1".into()),
            label: Some("kitchen wallet".into()),
            initialized: Some(true),
            model: Some("K1".into()),
            firmware_variant: Some("user".into()),
        };

        assert_eq!(round_trip(&msg)?, msg);

        Ok(())
    }

    #[test]
    fn test_pin_matrix_ack_requires_pin() {
        assert!(PinMatrixAck::decode(&[]).is_err());
    }

    #[test]
    fn test_unknown_fields_are_skipped() -> Result<()> {
        let mut buf = [0u8; 64];
        let len = {
            let mut enc = Encoder::new(&mut buf);
            enc.string_field(9, "future")?;
            enc.string_field(1, "pong")?;
            enc.len()
        };

        let msg = Success::decode(&buf[..len])?;
        assert_eq!(msg.message.as_deref(), Some("pong"));

        Ok(())
    }
}
