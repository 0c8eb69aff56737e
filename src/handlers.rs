//! Message handlers: the glue between dispatch, dialogs, the typed-data
//! session, and the writer.
//!
//! Handlers own all I/O for their turn: they raise dialogs, run the PIN
//! check, call the signing collaborator, and always leave the host with
//! exactly one `Success`/`Failure`/response message (except the raw
//! feeder, which answers once per message, not per chunk).

#[cfg(not(feature = "std"))]
use alloc::string::String;

use log::warn;

use crate::device::{
    Board, Device, DeviceState, FirmwareVariant, PollMode, Signer, DEVICE_MODEL, DEVICE_VENDOR,
    VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH,
};
use crate::eip712::session::SessionResult;
use crate::eip712::{
    checksum_address, hex_string, Prompt, Session, SessionError, DYNAMIC_DATA_LIMIT, FIELD_LIMIT,
    NAME_LENGTH_LIMIT, STACK_DEPTH_LIMIT, TYPE_LENGTH_LIMIT,
};
use crate::messages::{
    ButtonRequestCode, Eip712AppendAtomicField, Eip712ContextInfo, Eip712Init, Eip712PopFrame,
    Eip712PushFrame, Eip712Sign, Eip712Verify, Features, GetFeatures, Initialize,
    MessageSignature, PinMatrixKind, PinMatrixRequest, Ping, SoftReset,
};
use crate::tiny::TinyMessage;
use crate::variant::RequestVariant;
use crate::wire::{Decoder, WireType};
use crate::{FailureCode, Result};

#[cfg(feature = "debug-link")]
use crate::messages::{DebugLinkGetState, DebugLinkState};

impl<B: Board, S: Signer> Device<B, S> {
    /// Routes one decoded request to its handler.
    pub(crate) fn handle_request(&mut self, request: RequestVariant) -> Result<()> {
        match request {
            RequestVariant::Initialize(msg) => self.msg_initialize(msg),
            RequestVariant::GetFeatures(msg) => self.msg_get_features(msg),
            RequestVariant::Ping(msg) => self.msg_ping(msg),
            RequestVariant::Cancel(_) => {
                self.send_failure(FailureCode::ActionCancelled, "Action cancelled by user");
                Ok(())
            }
            RequestVariant::SoftReset(msg) => self.msg_soft_reset(msg),
            RequestVariant::Eip712Init(msg) => self.msg_eip712_init(msg),
            RequestVariant::Eip712PushFrame(msg) => self.msg_eip712_push_frame(msg),
            RequestVariant::Eip712PopFrame(msg) => self.msg_eip712_pop_frame(msg),
            RequestVariant::Eip712AppendAtomicField(msg) => self.msg_eip712_append_atomic(msg),
            RequestVariant::Eip712Sign(msg) => self.msg_eip712_sign(msg),
            RequestVariant::Eip712Verify(msg) => self.msg_eip712_verify(msg),
            // acks are only meaningful as tiny messages inside a dialog,
            // and dynamic data only arrives through the raw feeder
            RequestVariant::ButtonAck(_)
            | RequestVariant::PinMatrixAck(_)
            | RequestVariant::PassphraseAck(_)
            | RequestVariant::Eip712AppendDynamicData(_) => {
                self.send_failure(FailureCode::UnexpectedMessage, "Unexpected message");
                Ok(())
            }
            #[cfg(feature = "debug-link")]
            RequestVariant::DebugLinkDecision(_) => {
                self.send_failure(FailureCode::UnexpectedMessage, "Unexpected message");
                Ok(())
            }
            #[cfg(feature = "debug-link")]
            RequestVariant::DebugLinkGetState(msg) => self.msg_debug_link_get_state(msg),
            #[cfg(feature = "debug-link")]
            RequestVariant::DebugLinkStop(_) => Ok(()),
        }
    }

    fn msg_initialize(&mut self, _msg: Initialize) -> Result<()> {
        // a fresh turn: clear every multi-message state machine
        self.session = Session::default();
        self.raw = None;
        self.reset_msg_stack = false;

        self.send_features()
    }

    fn msg_get_features(&mut self, _msg: GetFeatures) -> Result<()> {
        self.send_features()
    }

    fn send_features(&mut self) -> Result<()> {
        let state = &self.state;
        let features = Features {
            vendor: Some(DEVICE_VENDOR.into()),
            major_version: Some(VERSION_MAJOR),
            minor_version: Some(VERSION_MINOR),
            patch_version: Some(VERSION_PATCH),
            device_id: Some(state.device_id.clone()),
            label: Some(state.label.clone()),
            initialized: Some(state.initialized),
            model: Some(DEVICE_MODEL.into()),
            firmware_variant: Some(<&'static str>::from(state.variant).into()),
        };

        self.write(&features)
    }

    fn msg_ping(&mut self, msg: Ping) -> Result<()> {
        if msg.button_protection.unwrap_or(false) {
            let body = msg.message.clone().unwrap_or_default();
            if !self.confirm(ButtonRequestCode::Ping, "Ping", &body)? {
                self.cancel_turn();
                return Ok(());
            }
        }

        if msg.pin_protection.unwrap_or(false) && !self.check_pin()? {
            return Ok(());
        }

        self.send_success(msg.message.as_deref());
        self.board.home();

        Ok(())
    }

    fn msg_soft_reset(&mut self, _msg: SoftReset) -> Result<()> {
        self.send_success(Some("Device reset"));
        self.board.reset();

        Ok(())
    }

    /// Ends a turn after a declined dialog, honoring a mid-dialog
    /// `Initialize`.
    fn cancel_turn(&mut self) {
        if self.reset_msg_stack {
            self.session = Session::default();
            self.raw = None;
        }

        self.send_failure(FailureCode::ActionCancelled, "Action cancelled by user");
        self.board.home();
    }

    /// Fails the turn unless the device holds a seed.
    pub(crate) fn ensure_initialized(&mut self) -> Result<bool> {
        if self.state.initialized {
            return Ok(true);
        }

        self.send_failure(FailureCode::NotInitialized, "Device not initialized");
        self.board.home();

        Ok(false)
    }

    /// Runs the PIN check when one is set and not cached.
    ///
    /// `Ok(false)` means the check failed and the failure response has
    /// already been written.
    pub(crate) fn check_pin(&mut self) -> Result<bool> {
        let Some(expected) = self.state.pin.clone() else {
            return Ok(true);
        };
        if self.state.pin_cached {
            return Ok(true);
        }

        self.write(&PinMatrixRequest {
            kind: Some(PinMatrixKind::Current),
        })?;

        loop {
            let Some(tiny) = self.poll_tiny(PollMode::Blocking) else {
                continue;
            };

            return Ok(match tiny {
                TinyMessage::PinMatrixAck(ack) => {
                    if constant_time_eq(ack.pin.as_bytes(), expected.as_bytes()) {
                        self.state.pin_cached = true;
                        true
                    } else {
                        self.send_failure(FailureCode::PinInvalid, "PIN invalid");
                        self.board.home();
                        false
                    }
                }
                TinyMessage::Cancel(_) => {
                    self.send_failure(FailureCode::PinCancelled, "PIN entry cancelled");
                    self.board.home();
                    false
                }
                TinyMessage::Initialize(_) => {
                    self.reset_msg_stack = true;
                    self.send_failure(FailureCode::PinCancelled, "PIN entry cancelled");
                    self.board.home();
                    false
                }
                _ => {
                    self.send_failure(FailureCode::PinExpected, "PIN expected");
                    self.board.home();
                    false
                }
            });
        }
    }

    fn msg_eip712_init(&mut self, _msg: Eip712Init) -> Result<()> {
        self.session.init();
        self.raw = None;

        self.write(&Eip712ContextInfo {
            stack_depth_limit: Some(STACK_DEPTH_LIMIT as u32),
            type_length_limit: Some(TYPE_LENGTH_LIMIT as u32),
            name_length_limit: Some(NAME_LENGTH_LIMIT as u32),
            dynamic_data_limit: Some(DYNAMIC_DATA_LIMIT as u32),
            field_limit: Some(FIELD_LIMIT as u32),
        })
    }

    fn msg_eip712_push_frame(&mut self, msg: Eip712PushFrame) -> Result<()> {
        let field_name = msg.field_name.as_deref().unwrap_or("");

        match self
            .session
            .push(msg.frame_type, &msg.encoded_type, field_name)
        {
            Ok(()) => {
                self.send_success(None);
                Ok(())
            }
            Err(_) => {
                self.send_typed_data_failure();
                Ok(())
            }
        }
    }

    fn msg_eip712_pop_frame(&mut self, _msg: Eip712PopFrame) -> Result<()> {
        match self.session.pop() {
            Ok(Some(prompt)) => self.review_typed_data_prompt(prompt),
            Ok(None) => {
                self.send_success(None);
                Ok(())
            }
            Err(_) => {
                self.send_typed_data_failure();
                Ok(())
            }
        }
    }

    fn msg_eip712_append_atomic(&mut self, msg: Eip712AppendAtomicField) -> Result<()> {
        match self
            .session
            .append_atomic(&msg.encoded_type, &msg.field_name, &msg.data)
        {
            Ok(prompt) => self.review_typed_data_prompt(prompt),
            Err(_) => {
                self.send_typed_data_failure();
                Ok(())
            }
        }
    }

    fn msg_eip712_sign(&mut self, msg: Eip712Sign) -> Result<()> {
        let digest = match self.session.finalize() {
            Ok(digest) => digest,
            Err(_) => {
                self.send_typed_data_failure();
                return Ok(());
            }
        };

        if !self.ensure_initialized()? {
            return Ok(());
        }

        if !self
            .confirm(
                ButtonRequestCode::ProtectCall,
                "Sign Typed Data",
                &grouped_digest(&digest),
            )?
        {
            self.cancel_turn();
            return Ok(());
        }

        if !self.check_pin()? {
            return Ok(());
        }

        let signed = self
            .signer
            .address(&msg.address_n)
            .and_then(|address| {
                self.signer
                    .sign_digest(&msg.address_n, &digest)
                    .map(|signature| (address, signature))
            });

        match signed {
            Ok((address, signature)) => {
                self.write(&MessageSignature {
                    address: Some(address.to_vec()),
                    signature: Some(signature.to_vec()),
                })?;
                self.session = Session::default();
            }
            Err(err) => {
                warn!("signing collaborator failed: {err}");
                self.send_failure(FailureCode::Other, "Signing failed");
            }
        }

        self.board.home();

        Ok(())
    }

    fn msg_eip712_verify(&mut self, msg: Eip712Verify) -> Result<()> {
        if msg.signature.len() != 65 || msg.address.len() != 20 {
            self.send_failure(FailureCode::SyntaxError, "Malformed data");
            return Ok(());
        }

        let digest = match self.session.finalize() {
            Ok(digest) => digest,
            Err(_) => {
                self.send_typed_data_failure();
                return Ok(());
            }
        };

        let mut signature = [0u8; 65];
        signature.copy_from_slice(&msg.signature);

        // accept both the 27/28 and the 0/1 recovery-id conventions
        if signature[64] >= 27 {
            signature[64] -= 27;
        }

        let recovered = if signature[64] < 2 {
            self.signer.recover_address(&digest, &signature)
        } else {
            None
        };

        if recovered.map_or(true, |address| address.as_slice() != msg.address.as_slice()) {
            self.send_failure(FailureCode::InvalidSignature, "Invalid signature");
            self.board.home();
            return Ok(());
        }

        let address = checksum_address(&msg.address);
        if !self.confirm(ButtonRequestCode::Address, "Confirm Signer", &address)? {
            self.cancel_turn();
            return Ok(());
        }

        if !self.confirm(
            ButtonRequestCode::Other,
            "Message Verified",
            "(EIP-712, shown already)",
        )? {
            self.cancel_turn();
            return Ok(());
        }

        self.send_success(Some("Message verified"));
        self.session = Session::default();
        self.board.home();

        Ok(())
    }

    /// Shows one typed-data prompt and answers the pending message.
    fn review_typed_data_prompt(&mut self, prompt: Prompt) -> Result<()> {
        if self.confirm(ButtonRequestCode::ProtectCall, &prompt.title, &prompt.body)? {
            self.send_success(None);
        } else {
            self.session.abort();
            self.cancel_turn();
        }

        Ok(())
    }

    /// Reports a poisoned typed-data session.
    pub(crate) fn send_typed_data_failure(&mut self) {
        #[cfg(feature = "debug-link")]
        let text = self
            .session
            .failure_location()
            .map(|(file, line)| format!("{file}:{line}"))
            .unwrap_or_default();
        #[cfg(not(feature = "debug-link"))]
        let text = String::new();

        self.send_failure(FailureCode::Other, &text);
        self.board.home();
    }

    #[cfg(feature = "debug-link")]
    pub(crate) fn send_debug_state(&mut self) {
        let msg = DebugLinkState {
            initialized: Some(self.state.initialized),
            pin_cached: Some(self.state.pin_cached),
            typed_data_failure: self
                .session
                .failure_location()
                .map(|(file, line)| format!("{file}:{line}")),
        };

        if let Err(err) = self.write_debug(&msg) {
            warn!("failed to write DebugLinkState: {err}");
        }
    }

    #[cfg(feature = "debug-link")]
    fn msg_debug_link_get_state(&mut self, _msg: DebugLinkGetState) -> Result<()> {
        self.send_debug_state();
        Ok(())
    }
}

/// Streaming feeder for raw-dispatched `Eip712AppendDynamicData`.
///
/// The first chunk's field header is parsed and skipped; everything
/// after it flows straight into the session's DynamicData frame. The
/// single `Success` for the message is owed once the declared frame
/// length has been consumed.
pub(crate) struct DynamicDataStream {
    total: usize,
    consumed: usize,
    data_remaining: usize,
    started: bool,
    failed: bool,
    reported: bool,
}

impl DynamicDataStream {
    pub fn new(total: u32) -> Self {
        Self {
            total: total as usize,
            consumed: 0,
            data_remaining: 0,
            started: false,
            failed: false,
            reported: false,
        }
    }

    /// A stream that swallows its message without touching the session;
    /// the failure response has already been written.
    pub fn poisoned(total: u32) -> Self {
        Self {
            total: total as usize,
            consumed: 0,
            data_remaining: 0,
            started: true,
            failed: true,
            reported: true,
        }
    }

    pub fn reported(&self) -> bool {
        self.reported
    }

    pub fn mark_reported(&mut self) {
        self.reported = true;
    }

    /// Feeds one chunk; `Ok(true)` once the whole message body has been
    /// consumed and the response is due.
    pub fn feed(&mut self, session: &mut Session, chunk: &[u8]) -> SessionResult<bool> {
        self.consumed += chunk.len();
        let complete = self.consumed >= self.total;

        if self.failed {
            return Err(SessionError);
        }

        let data = if !self.started {
            self.started = true;

            let mut dec = Decoder::new(chunk);
            let header = dec
                .key()
                .ok()
                .filter(|&(tag, wt)| tag == 1 && wt == WireType::LengthDelimited)
                .and_then(|_| dec.varint().ok());

            let Some(data_len) = header else {
                self.failed = true;
                session.abort();
                return Err(SessionError);
            };

            // exactly one bytes field, spanning the rest of the message
            if dec.position() as u64 + data_len != self.total as u64 {
                self.failed = true;
                session.abort();
                return Err(SessionError);
            }

            self.data_remaining = data_len as usize;
            &chunk[dec.position()..]
        } else {
            chunk
        };

        let take = data.len().min(self.data_remaining);
        if take > 0 {
            if let Err(err) = session.append_dynamic(&data[..take]) {
                self.failed = true;
                return Err(err);
            }
            self.data_remaining -= take;
        }

        Ok(complete && self.data_remaining == 0)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b) {
        acc |= x ^ y;
    }

    acc == 0
}

/// Digest hex in 8-character groups, four per line.
fn grouped_digest(digest: &[u8; 32]) -> String {
    let hex = hex_string(digest);
    let mut out = String::with_capacity(hex.len() + 8);

    for (i, c) in hex.chars().enumerate() {
        if i > 0 && i % 32 == 0 {
            out.push('\n');
        } else if i > 0 && i % 8 == 0 {
            out.push(' ');
        }
        out.push(c);
    }

    out
}
