//! Typed-data (EIP-712) signing messages.
//!
//! The host streams a typed-data document piecewise: `Eip712Init`, then
//! any number of push/pop/append operations, then `Eip712Sign` or
//! `Eip712Verify`. The device never sees the assembled document.

#[cfg(not(feature = "std"))]
use alloc::string::String;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::std;
use std::fmt;

use crate::messages::control::empty_message;
use crate::wire::{Decoder, Encoder};
use crate::{Error, MsgId, Result, WireMessage};

/// Kinds of frame the host may push onto the encoding stack.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum FrameKind {
    Struct = 1,
    Array = 2,
    DynamicData = 3,
}

impl FrameKind {
    pub fn from_wire(kind: u32) -> Option<Self> {
        match kind {
            1 => Some(Self::Struct),
            2 => Some(Self::Array),
            3 => Some(Self::DynamicData),
            _ => None,
        }
    }
}

impl From<FrameKind> for u32 {
    fn from(kind: FrameKind) -> Self {
        kind as u32
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

empty_message!(
    Eip712Init,
    MsgId::Eip712Init,
    "Starts (or restarts) a typed-data encoding session."
);
empty_message!(
    Eip712PopFrame,
    MsgId::Eip712PopFrame,
    "Finalizes the top frame and mixes its hash into its parent."
);

/// Eip712ContextInfo - session limits (id 465)
///
/// Returned from [Eip712Init] so the host can chunk safely.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Eip712ContextInfo {
    pub stack_depth_limit: Option<u32>,
    pub type_length_limit: Option<u32>,
    pub name_length_limit: Option<u32>,
    pub dynamic_data_limit: Option<u32>,
    pub field_limit: Option<u32>,
}

impl WireMessage for Eip712ContextInfo {
    const ID: MsgId = MsgId::Eip712ContextInfo;

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        if let Some(limit) = self.stack_depth_limit {
            enc.uint_field(1, limit as u64)?;
        }
        if let Some(limit) = self.type_length_limit {
            enc.uint_field(2, limit as u64)?;
        }
        if let Some(limit) = self.name_length_limit {
            enc.uint_field(3, limit as u64)?;
        }
        if let Some(limit) = self.dynamic_data_limit {
            enc.uint_field(4, limit as u64)?;
        }
        if let Some(limit) = self.field_limit {
            enc.uint_field(5, limit as u64)?;
        }
        Ok(())
    }

    fn decode(body: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(body);
        let mut msg = Self::default();

        while !dec.is_empty() {
            let (tag, wt) = dec.key()?;
            match tag {
                1 => msg.stack_depth_limit = Some(dec.uint32(wt)?),
                2 => msg.type_length_limit = Some(dec.uint32(wt)?),
                3 => msg.name_length_limit = Some(dec.uint32(wt)?),
                4 => msg.dynamic_data_limit = Some(dec.uint32(wt)?),
                5 => msg.field_limit = Some(dec.uint32(wt)?),
                _ => dec.skip(wt)?,
            }
        }

        Ok(msg)
    }
}

/// Eip712PushFrame - opens a Struct/Array/DynamicData frame (id 466)
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Eip712PushFrame {
    pub frame_type: FrameKind,
    pub encoded_type: String,
    pub field_name: Option<String>,
}

impl Default for Eip712PushFrame {
    fn default() -> Self {
        Self {
            frame_type: FrameKind::Struct,
            encoded_type: String::new(),
            field_name: None,
        }
    }
}

impl WireMessage for Eip712PushFrame {
    const ID: MsgId = MsgId::Eip712PushFrame;

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.uint_field(1, u32::from(self.frame_type) as u64)?;
        enc.string_field(2, &self.encoded_type)?;
        if let Some(field_name) = &self.field_name {
            enc.string_field(3, field_name)?;
        }
        Ok(())
    }

    fn decode(body: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(body);
        let mut frame_type = None;
        let mut encoded_type = None;
        let mut field_name = None;

        while !dec.is_empty() {
            let (tag, wt) = dec.key()?;
            match tag {
                1 => {
                    frame_type = Some(
                        FrameKind::from_wire(dec.uint32(wt)?)
                            .ok_or_else(|| Error::syntax("unknown frame type"))?,
                    )
                }
                2 => encoded_type = Some(dec.string(wt)?),
                3 => field_name = Some(dec.string(wt)?),
                _ => dec.skip(wt)?,
            }
        }

        Ok(Self {
            frame_type: frame_type.ok_or_else(|| Error::syntax("missing frame type"))?,
            encoded_type: encoded_type.ok_or_else(|| Error::syntax("missing encoded type"))?,
            field_name,
        })
    }
}

/// Eip712AppendAtomicField - one fixed-width field of the current frame (id 468)
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Eip712AppendAtomicField {
    pub encoded_type: String,
    pub field_name: String,
    pub data: Vec<u8>,
}

impl WireMessage for Eip712AppendAtomicField {
    const ID: MsgId = MsgId::Eip712AppendAtomicField;

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.string_field(1, &self.encoded_type)?;
        enc.string_field(2, &self.field_name)?;
        enc.bytes_field(3, &self.data)
    }

    fn decode(body: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(body);
        let mut encoded_type = None;
        let mut field_name = None;
        let mut data = None;

        while !dec.is_empty() {
            let (tag, wt) = dec.key()?;
            match tag {
                1 => encoded_type = Some(dec.string(wt)?),
                2 => field_name = Some(dec.string(wt)?),
                3 => data = Some(dec.bytes(wt)?.into()),
                _ => dec.skip(wt)?,
            }
        }

        Ok(Self {
            encoded_type: encoded_type.ok_or_else(|| Error::syntax("missing encoded type"))?,
            field_name: field_name.ok_or_else(|| Error::syntax("missing field name"))?,
            data: data.ok_or_else(|| Error::syntax("missing data"))?,
        })
    }
}

/// Eip712AppendDynamicData - a slice of a `bytes`/`string` value (id 469)
///
/// This message is raw-dispatched: the payload streams straight into the
/// current DynamicData frame's hash without message-level buffering. The
/// parsed form exists for the emitting side and for tests.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Eip712AppendDynamicData {
    pub data: Vec<u8>,
}

impl WireMessage for Eip712AppendDynamicData {
    const ID: MsgId = MsgId::Eip712AppendDynamicData;

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.bytes_field(1, &self.data)
    }

    fn decode(body: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(body);
        let mut data = None;

        while !dec.is_empty() {
            let (tag, wt) = dec.key()?;
            match tag {
                1 => data = Some(dec.bytes(wt)?.into()),
                _ => dec.skip(wt)?,
            }
        }

        Ok(Self {
            data: data.ok_or_else(|| Error::syntax("missing data"))?,
        })
    }
}

/// Eip712Sign - finalize the session and sign the digest (id 470)
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Eip712Sign {
    pub address_n: Vec<u32>,
}

impl WireMessage for Eip712Sign {
    const ID: MsgId = MsgId::Eip712Sign;

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        for &index in &self.address_n {
            enc.uint_field(1, index as u64)?;
        }
        Ok(())
    }

    fn decode(body: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(body);
        let mut msg = Self::default();

        while !dec.is_empty() {
            let (tag, wt) = dec.key()?;
            match tag {
                1 => dec.uint32_list(wt, &mut msg.address_n)?,
                _ => dec.skip(wt)?,
            }
        }

        Ok(msg)
    }
}

/// Eip712Verify - finalize the session and verify a signature (id 471)
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Eip712Verify {
    pub address: Vec<u8>,
    pub signature: Vec<u8>,
}

impl WireMessage for Eip712Verify {
    const ID: MsgId = MsgId::Eip712Verify;

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.bytes_field(1, &self.address)?;
        enc.bytes_field(2, &self.signature)
    }

    fn decode(body: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(body);
        let mut address = None;
        let mut signature = None;

        while !dec.is_empty() {
            let (tag, wt) = dec.key()?;
            match tag {
                1 => address = Some(dec.bytes(wt)?.into()),
                2 => signature = Some(dec.bytes(wt)?.into()),
                _ => dec.skip(wt)?,
            }
        }

        Ok(Self {
            address: address.ok_or_else(|| Error::syntax("missing address"))?,
            signature: signature.ok_or_else(|| Error::syntax("missing signature"))?,
        })
    }
}
