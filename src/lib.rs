#![cfg_attr(not(feature = "std"), no_std)]

//! # HID Signing-Device Host Protocol
//!
//! This crate implements the host-facing protocol core of a USB-HID
//! hardware signing device: the report framer and reassembler, the
//! message registry and dispatcher, the tiny-message poller used inside
//! dialogs, the press-and-hold confirmation state machine, the streaming
//! EIP-712 typed-data hasher, and the handlers gluing them together.
//!
//! Messages travel as 64-byte HID reports. Every report starts with the
//! `?` tag; the first report of a message adds the `##` magic, a 16-bit
//! big-endian message id, and a 32-bit big-endian payload length, with
//! the payload following from byte 9 (byte 1 on continuations) and the
//! final report zero-padded:
//!
//! | Byte  | 0    | 1    | 2    | 3..=4 | 5..=8 | 9..=63  |
//! |:------|:----:|:----:|:----:|:-----:|:-----:|:-------:|
//! | Value | 0x3f | 0x23 | 0x23 | id BE | len BE | payload |
//!
//! Payloads are schema-defined records in a varint-keyed field encoding
//! (see [wire]). The transport endpoints, display, button, timers, and
//! cryptographic primitives are collaborators behind the
//! [Board](crate::device::Board) and [Signer](crate::device::Signer)
//! traits; the [Device](crate::device::Device) value owns every piece of
//! protocol state and is driven one report (or one turn) at a time.
//!
//! ## Build variants
//!
//! The `device` feature (default) sizes the frame buffers for the
//! 12 KiB firmware limit; `emulator` raises them to 64 KiB. The
//! `debug-link` feature compiles the debug channel: scripted decisions,
//! state dumps, and file:line reporting for typed-data failures.
//!
//! ## Using with `std`
//!
//! This library is `no-std` compatible by default. To use `std`-only
//! features, add the `std` feature to the dependency:
//!
//! ```toml
//! hidsign = { version = "0.3", features = ["std"] }
//! ```

#[cfg(not(feature = "std"))]
#[macro_use(format, vec)]
extern crate alloc;

#[cfg(not(feature = "std"))]
pub(crate) use core as std;
#[cfg(feature = "std")]
pub(crate) use std;

/// Report reassembly into whole messages
pub mod assembler;
/// User-confirmation state machine and dialog variants
pub mod confirm;
/// The device value and its collaborator traits
pub mod device;
/// Streaming EIP-712 typed-data hasher
pub mod eip712;
/// Library error types
pub mod error;
/// Message handlers and the response orchestration
mod handlers;
/// Logging convenience helpers
pub mod logging;
mod macros;
/// Typed messages and their wire codecs
pub mod messages;
/// Static message registry
pub mod registry;
/// Lock-free SPSC event ring for gesture and timer input
pub mod ring;
/// Tiny-message decoding for the in-dialog control path
pub mod tiny;
/// Request variant for dispatch
pub mod variant;
/// Field-level wire encoding
pub mod wire;
/// Outbound message emission
pub mod writer;

#[cfg(test)]
pub(crate) mod mock;

pub use assembler::*;
pub use confirm::*;
pub use device::*;
pub use error::*;
pub use logging::*;
pub use messages::*;
pub use registry::*;
pub use ring::*;
pub use tiny::*;
pub use variant::*;

pub use crate::error::{Error, FailureCode, Result};

/// Every HID report is exactly this many bytes; short final chunks are
/// zero-padded.
pub const REPORT_LEN: usize = 64;
/// Leading tag byte of every report.
pub const REPORT_TAG: u8 = b'?';
/// Magic byte, twice, marking the first report of a message.
pub const FRAME_MAGIC: u8 = b'#';
/// Bytes of header in a first report (tag, magic, id, length).
pub const FRAME_HEADER_LEN: usize = 1 + 2 + 2 + 4;

/// Maximum in-flight message body size.
#[cfg(feature = "emulator")]
pub const MAX_FRAME_SIZE: usize = 64 * 1024;
/// Maximum in-flight message body size.
#[cfg(not(feature = "emulator"))]
pub const MAX_FRAME_SIZE: usize = 12 * 1024;

/// Largest body a tiny message may declare: one report minus the header.
pub const TINY_BODY_MAX: usize = REPORT_LEN - FRAME_HEADER_LEN;

/// USB endpoint addresses of the transport collaborator.
pub mod endpoint {
    /// Main interface, device to host
    pub const MAIN_IN: u8 = 0x81;
    /// Debug interface, device to host
    pub const DEBUG_IN: u8 = 0x82;
    /// U2F interface, device to host
    pub const U2F_IN: u8 = 0x83;
    /// Main interface, host to device
    pub const MAIN_OUT: u8 = 0x01;
    /// Debug interface, host to device
    pub const DEBUG_OUT: u8 = 0x02;
    /// U2F interface, host to device
    pub const U2F_OUT: u8 = 0x03;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout_constants() {
        assert_eq!(REPORT_TAG, 0x3f);
        assert_eq!(FRAME_MAGIC, 0x23);
        assert_eq!(FRAME_HEADER_LEN, 9);
        assert_eq!(TINY_BODY_MAX, 55);
    }

    #[test]
    fn test_frame_size_limit() {
        #[cfg(feature = "emulator")]
        assert_eq!(MAX_FRAME_SIZE, 64 * 1024);
        #[cfg(not(feature = "emulator"))]
        assert_eq!(MAX_FRAME_SIZE, 12 * 1024);
    }
}
