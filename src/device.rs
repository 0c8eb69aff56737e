//! The device: owner of all protocol state, glue between transport,
//! dialogs, and handlers.
//!
//! Everything that was a process singleton in older firmwares (the
//! reassembly buffers, the tiny-message path, the typed-data session,
//! the response scratch) lives as a field here and is reached only
//! through an exclusive reference, which keeps the single-in-flight-turn
//! rule structural.

#[cfg(not(feature = "std"))]
use alloc::string::String;

use log::{debug, warn};

use crate::assembler::{Assembler, Reassembly};
use crate::confirm::Notification;
use crate::eip712::Session;
use crate::handlers::DynamicDataStream;
use crate::messages::{Failure, Success, WireMessage};
use crate::registry::{Channel, Handler, MessageEntry};
use crate::ring::EventConsumer;
use crate::tiny::{decode_tiny, TinyMessage};
use crate::variant::RequestVariant;
use crate::writer::write_message;
use crate::{Error, FailureCode, Result, REPORT_LEN};

/// Firmware vendor string reported in `Features`.
pub const DEVICE_VENDOR: &str = "hidsign";
/// Model string reported in `Features`.
pub const DEVICE_MODEL: &str = "K1";

pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 3;
pub const VERSION_PATCH: u32 = 1;

/// Board collaborator: transport endpoints, display, button timer.
///
/// The electrical and USB layers live behind this trait; the core only
/// ever sees whole 64-byte reports and layout callbacks.
pub trait Board {
    /// Pushes one report to the host. May spin while the endpoint is
    /// busy; an error is fatal for the current turn.
    fn write_report(&mut self, channel: Channel, report: &[u8; REPORT_LEN]) -> Result<()>;

    /// Non-blocking poll for one inbound report.
    fn poll_report(&mut self, channel: Channel) -> Option<[u8; REPORT_LEN]>;

    /// Presents a dialog layout.
    fn notify(&mut self, kind: Notification, title: &str, body: &str);

    /// Redraws the display.
    fn refresh(&mut self);

    /// Steps the running animation.
    fn animate(&mut self);

    /// Gets whether an animation is still running.
    fn is_animating(&self) -> bool;

    /// Locks or releases the display brightness.
    fn set_constant_power(&mut self, locked: bool);

    /// Arms the press-and-hold timer; the board pushes
    /// [Event::HoldExpired](crate::ring::Event::HoldExpired) into the
    /// event ring when it fires.
    fn arm_hold_timer(&mut self, ms: u32);

    /// Cancels a pending hold timer.
    fn cancel_hold_timer(&mut self);

    /// Returns the display to the home screen.
    fn home(&mut self);

    /// Factory reset hook.
    fn reset(&mut self);
}

/// Signing collaborator; the cryptographic primitives are not part of
/// the protocol core.
pub trait Signer {
    /// 20-byte account address for a derivation path.
    fn address(&mut self, path: &[u32]) -> Result<[u8; 20]>;

    /// Signs a 32-byte digest; returns the 65-byte recoverable
    /// signature `r ‖ s ‖ v`.
    fn sign_digest(&mut self, path: &[u32], digest: &[u8; 32]) -> Result<[u8; 65]>;

    /// Recovers the signing address from a digest and signature.
    fn recover_address(&mut self, digest: &[u8; 32], signature: &[u8; 65]) -> Option<[u8; 20]>;
}

/// Firmware variant the device runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FirmwareVariant {
    User,
    Factory,
}

impl FirmwareVariant {
    pub fn is_factory(&self) -> bool {
        *self == Self::Factory
    }
}

impl From<FirmwareVariant> for &'static str {
    fn from(variant: FirmwareVariant) -> Self {
        match variant {
            FirmwareVariant::User => "user",
            FirmwareVariant::Factory => "factory",
        }
    }
}

/// Mutable device identity and security state.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceState {
    pub device_id: String,
    pub label: String,
    pub initialized: bool,
    pub variant: FirmwareVariant,
    pub pin: Option<String>,
    pub pin_cached: bool,
}

impl DeviceState {
    pub fn new(device_id: &str, label: &str) -> Self {
        Self {
            device_id: device_id.into(),
            label: label.into(),
            initialized: false,
            variant: FirmwareVariant::User,
            pin: None,
            pin_cached: false,
        }
    }
}

/// Polling flavor for the tiny-message path; an explicit parameter, not
/// a hidden mode flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollMode {
    NonBlocking,
    Blocking,
}

/// The signing device's protocol core.
pub struct Device<B: Board, S: Signer> {
    pub(crate) board: B,
    pub(crate) signer: S,
    pub(crate) events: EventConsumer,
    pub(crate) rx: Assembler,
    #[cfg(feature = "debug-link")]
    pub(crate) rx_debug: Assembler,
    pub(crate) raw: Option<DynamicDataStream>,
    pub(crate) session: Session,
    pub(crate) state: DeviceState,
    /// Set when a mid-dialog `Initialize` asks multi-message state
    /// machines to start over.
    pub(crate) reset_msg_stack: bool,
}

impl<B: Board, S: Signer> Device<B, S> {
    pub fn new(board: B, signer: S, events: EventConsumer, state: DeviceState) -> Self {
        Self {
            board,
            signer,
            events,
            rx: Assembler::new(Channel::Normal),
            #[cfg(feature = "debug-link")]
            rx_debug: Assembler::new(Channel::Debug),
            raw: None,
            session: Session::default(),
            state,
            reset_msg_stack: false,
        }
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut DeviceState {
        &mut self.state
    }

    /// Gets whether the last dialog was ended by a host `Initialize`.
    pub fn reset_msg_stack(&self) -> bool {
        self.reset_msg_stack
    }

    /// Pumps each channel once, between turns.
    pub fn poll(&mut self) {
        if let Some(report) = self.board.poll_report(Channel::Normal) {
            self.handle_report(Channel::Normal, &report);
        }

        #[cfg(feature = "debug-link")]
        if let Some(report) = self.board.poll_report(Channel::Debug) {
            self.handle_report(Channel::Debug, &report);
        }
    }

    /// Feeds one inbound report through reassembly and dispatch.
    pub fn handle_report(&mut self, channel: Channel, report: &[u8]) {
        let fed = match channel {
            Channel::Normal => self.rx.feed(report),
            #[cfg(feature = "debug-link")]
            Channel::Debug => self.rx_debug.feed(report),
            #[cfg(not(feature = "debug-link"))]
            Channel::Debug => return,
        };

        match fed {
            Ok(Reassembly::Pending) => {}
            Ok(Reassembly::Message { entry, len }) => self.dispatch(channel, entry, len),
            Ok(Reassembly::RawChunk {
                entry,
                chunk,
                total,
                last,
            }) => self.dispatch_raw(entry, chunk, total, last),
            Err(err) => self.report_failure(err),
        }
    }

    /// Decodes a reassembled message and routes it to its handler.
    fn dispatch(&mut self, channel: Channel, entry: &'static MessageEntry, len: usize) {
        debug!("dispatching {} ({} bytes)", entry.id, len);

        if !entry.permission.allows(self.state.variant.is_factory()) {
            warn!("{} rejected by permission gate", entry.id);
            self.assembler_reset(channel);
            self.send_failure(FailureCode::UnexpectedMessage, "Unexpected message");
            return;
        }

        let decoded = {
            let body = match channel {
                Channel::Normal => &self.rx.body()[..len],
                #[cfg(feature = "debug-link")]
                Channel::Debug => &self.rx_debug.body()[..len],
                #[cfg(not(feature = "debug-link"))]
                Channel::Debug => return,
            };
            RequestVariant::decode(entry.id, body)
        };
        self.assembler_reset(channel);

        let request = match decoded {
            Ok(request) => request,
            Err(_) => {
                self.send_failure(
                    FailureCode::UnexpectedMessage,
                    "Could not parse protocol buffer message",
                );
                return;
            }
        };

        match entry.handler {
            Some(Handler::Request) => {
                if let Err(err) = self.handle_request(request) {
                    warn!("handler for {} failed: {err}", entry.id);
                }
            }
            // raw entries never surface as whole messages
            Some(Handler::RawDynamicData) | None => {
                self.send_failure(FailureCode::UnexpectedMessage, "Unexpected message");
            }
        }
    }

    /// Feeds one raw chunk into the streaming handler.
    fn dispatch_raw(&mut self, entry: &'static MessageEntry, chunk: &[u8], total: u32, last: bool) {
        if self.raw.is_none() {
            if !entry.permission.allows(self.state.variant.is_factory()) {
                warn!("{} rejected by permission gate", entry.id);
                self.raw = Some(DynamicDataStream::poisoned(total));
                self.send_failure(FailureCode::UnexpectedMessage, "Unexpected message");
            } else {
                self.raw = Some(DynamicDataStream::new(total));
            }
        }

        let Some(mut stream) = self.raw.take() else {
            return;
        };
        let outcome = stream.feed(&mut self.session, chunk);

        match outcome {
            Ok(true) => self.send_success(None),
            Ok(false) => {}
            Err(_) => {
                if !stream.reported() {
                    stream.mark_reported();
                    self.send_typed_data_failure();
                }
            }
        }

        if last {
            self.raw = None;
        } else {
            self.raw = Some(stream);
        }
    }

    fn assembler_reset(&mut self, channel: Channel) {
        match channel {
            Channel::Normal => self.rx.reset(),
            #[cfg(feature = "debug-link")]
            Channel::Debug => self.rx_debug.reset(),
            #[cfg(not(feature = "debug-link"))]
            Channel::Debug => {}
        }
    }

    /// One poll of the tiny-message path across both channels.
    ///
    /// Decode failures are reported to the host and swallowed; the
    /// caller keeps polling.
    fn poll_tiny_once(&mut self) -> Option<Result<TinyMessage>> {
        let channels = [
            Channel::Normal,
            #[cfg(feature = "debug-link")]
            Channel::Debug,
        ];

        for channel in channels {
            if let Some(report) = self.board.poll_report(channel) {
                match decode_tiny(channel, &report) {
                    Ok(msg) => return Some(Ok(msg)),
                    Err(err) => {
                        self.report_failure(err.clone());
                        return Some(Err(err));
                    }
                }
            }
        }

        None
    }

    /// Polls for a tiny message.
    ///
    /// With [PollMode::Blocking] this spins until a valid tiny message
    /// arrives, reporting (and skipping) invalid ones, exactly like the
    /// dialog wait loop.
    pub fn poll_tiny(&mut self, mode: PollMode) -> Option<TinyMessage> {
        loop {
            match self.poll_tiny_once() {
                Some(Ok(msg)) => return Some(msg),
                Some(Err(_)) | None if mode == PollMode::Blocking => continue,
                _ => return None,
            }
        }
    }

    /// Writes a message on the normal channel.
    pub(crate) fn write<M: WireMessage>(&mut self, msg: &M) -> Result<()> {
        write_message(&mut self.board, Channel::Normal, msg)
    }

    #[cfg(feature = "debug-link")]
    /// Writes a message on the debug channel.
    pub(crate) fn write_debug<M: WireMessage>(&mut self, msg: &M) -> Result<()> {
        write_message(&mut self.board, Channel::Debug, msg)
    }

    /// Emits a `Success` response.
    pub(crate) fn send_success(&mut self, text: Option<&str>) {
        let msg = Success {
            message: text.map(Into::into),
        };
        if let Err(err) = self.write(&msg) {
            warn!("failed to write Success: {err}");
        }
    }

    /// Emits a `Failure` response.
    pub(crate) fn send_failure(&mut self, code: FailureCode, text: &str) {
        let msg = Failure {
            code: Some(code),
            message: (!text.is_empty()).then(|| text.into()),
        };
        if let Err(err) = self.write(&msg) {
            warn!("failed to write Failure: {err}");
        }
    }

    /// Emits a `Failure` carrying an [Error]'s code and text.
    pub(crate) fn report_failure(&mut self, err: Error) {
        self.send_failure(err.code(), err.message());
    }
}
