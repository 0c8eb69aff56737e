//! Encoding-stack frames.

#[cfg(not(feature = "std"))]
use alloc::string::String;

use crate::eip712::hash::HashSlot;
use crate::eip712::DYNAMIC_DATA_LIMIT;
use crate::messages::FrameKind;

/// Per-kind bookkeeping of a frame.
pub(crate) enum FrameInfo {
    Struct {
        /// Fields appended so far
        field_count: u32,
        /// Extended signature derived from the pushed encoded type
        expected_extended: [u8; 32],
        /// Extended signature accumulated from the actual appends
        extended: [u8; 32],
    },
    Array {
        /// Elements appended so far
        element_count: u32,
        /// Declared element count, `u32::MAX` for dynamic arrays
        expected_elements: u32,
        /// Extended signature every element must reproduce
        expected_element_extended: [u8; 32],
        /// Current element's accumulated extended signature
        element_extended: [u8; 32],
    },
    Dynamic {
        /// Total bytes appended, may exceed the captured prefix
        total_len: usize,
        /// Valid bytes in `first`
        first_len: usize,
        /// Captured prefix for the review prompt
        first: [u8; DYNAMIC_DATA_LIMIT],
    },
}

/// One frame of the encoding stack.
pub(crate) struct Frame {
    /// `"Mail"`, `"Person[2]"`, `"string"`, ...
    pub type_name: String,
    /// Name of the field this frame encodes; empty at the root and for
    /// array elements
    pub field_name: String,
    /// Running `encodeData` hash of the frame
    pub hash: HashSlot,
    pub info: FrameInfo,
}

impl Frame {
    pub fn new_struct(type_name: &str, field_name: &str) -> Self {
        Self {
            type_name: type_name.into(),
            field_name: field_name.into(),
            hash: HashSlot::new(),
            info: FrameInfo::Struct {
                field_count: 0,
                expected_extended: [0u8; 32],
                extended: [0u8; 32],
            },
        }
    }

    pub fn new_array(type_name: &str, field_name: &str, expected_elements: u32) -> Self {
        Self {
            type_name: type_name.into(),
            field_name: field_name.into(),
            hash: HashSlot::new(),
            info: FrameInfo::Array {
                element_count: 0,
                expected_elements,
                expected_element_extended: [0u8; 32],
                element_extended: [0u8; 32],
            },
        }
    }

    pub fn new_dynamic(type_name: &str, field_name: &str) -> Self {
        Self {
            type_name: type_name.into(),
            field_name: field_name.into(),
            hash: HashSlot::new(),
            info: FrameInfo::Dynamic {
                total_len: 0,
                first_len: 0,
                first: [0u8; DYNAMIC_DATA_LIMIT],
            },
        }
    }

    pub fn kind(&self) -> FrameKind {
        match self.info {
            FrameInfo::Struct { .. } => FrameKind::Struct,
            FrameInfo::Array { .. } => FrameKind::Array,
            FrameInfo::Dynamic { .. } => FrameKind::DynamicData,
        }
    }
}
