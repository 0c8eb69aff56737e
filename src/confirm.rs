//! User-confirmation state machine.
//!
//! A dialog announces itself to the host with a `ButtonRequest`, then
//! runs a cooperative loop that drains gesture/timer events from the
//! SPSC ring, polls for tiny control messages, and mirrors its state to
//! the layout collaborator. Gesture input stays muted until the host
//! acks; a successful confirmation is press, hold past the timeout,
//! release.

use log::warn;

use crate::device::{Board, Device, PollMode, Signer};
use crate::messages::{ButtonRequest, ButtonRequestCode};
use crate::ring::Event;
use crate::tiny::TinyMessage;
use crate::Result;

/// Press-and-hold duration that commits a confirmation.
pub const CONFIRM_TIMEOUT_MS: u32 = 1200;

/// Dialog progress, driven by gesture and timer events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayState {
    Home,
    ConfirmWait,
    Confirmed,
    Finished,
}

/// Layout currently owed to the display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActiveLayout {
    Request,
    RequestNoAnimation,
    ConfirmAnimation,
    Confirmed,
    Finished,
}

/// Notification kinds handed to the layout collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Notification {
    Request,
    RequestNoAnimation,
    ConfirmAnimation,
    Confirmed,
}

/// Layout callback used by the custom-layout confirm variant.
pub type LayoutFn<'a, B> = dyn FnMut(&mut B, Notification, &str, &str) + 'a;

/// The dialog state machine proper.
///
/// Events arrive in order through the ring, so each transition runs in
/// user context; no interrupt masking is needed around the state pair.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ConfirmSm {
    pub display_state: DisplayState,
    pub active_layout: ActiveLayout,
    pub button_acked: bool,
}

impl ConfirmSm {
    pub fn new(pre_acked: bool) -> Self {
        Self {
            display_state: DisplayState::Home,
            active_layout: ActiveLayout::Request,
            button_acked: pre_acked,
        }
    }

    pub fn apply(&mut self, event: Event) {
        match event {
            Event::Press => {
                // presses are invisible until the host acks the request
                if self.button_acked && self.display_state == DisplayState::Home {
                    self.active_layout = ActiveLayout::ConfirmAnimation;
                    self.display_state = DisplayState::ConfirmWait;
                }
            }
            Event::Release => match self.display_state {
                DisplayState::ConfirmWait => {
                    self.active_layout = ActiveLayout::RequestNoAnimation;
                    self.display_state = DisplayState::Home;
                }
                DisplayState::Confirmed => {
                    self.active_layout = ActiveLayout::Finished;
                    self.display_state = DisplayState::Finished;
                }
                _ => {}
            },
            Event::HoldExpired => {
                // a stale expiry can sit in the queue behind a release;
                // only a held button confirms
                if self.display_state == DisplayState::ConfirmWait {
                    self.display_state = DisplayState::Confirmed;
                    self.active_layout = ActiveLayout::Confirmed;
                }
            }
        }
    }
}

struct ConfirmOptions {
    pre_acked: bool,
    constant_power: bool,
}

impl<B: Board, S: Signer> Device<B, S> {
    /// Runs a standard confirmation dialog.
    ///
    /// Sends the `ButtonRequest`, then returns `Ok(true)` iff the user
    /// pressed, held past [CONFIRM_TIMEOUT_MS], and released. A host
    /// `Cancel`/`Initialize` ends the dialog with `Ok(false)`. A failed
    /// `ButtonRequest` write is an error.
    pub fn confirm(&mut self, code: ButtonRequestCode, title: &str, body: &str) -> Result<bool> {
        self.write(&ButtonRequest { code: Some(code) })?;

        Ok(self.confirm_helper(
            title,
            body,
            ConfirmOptions {
                pre_acked: false,
                constant_power: false,
            },
            None,
        ))
    }

    /// Like [confirm](Self::confirm), but locks the display brightness
    /// for the duration of the dialog.
    pub fn confirm_constant_power(
        &mut self,
        code: ButtonRequestCode,
        title: &str,
        body: &str,
    ) -> Result<bool> {
        self.write(&ButtonRequest { code: Some(code) })?;

        Ok(self.confirm_helper(
            title,
            body,
            ConfirmOptions {
                pre_acked: false,
                constant_power: true,
            },
            None,
        ))
    }

    /// Like [confirm](Self::confirm), with a caller-supplied layout
    /// callback instead of the standard notification.
    pub fn confirm_with_layout(
        &mut self,
        layout: &mut LayoutFn<'_, B>,
        code: ButtonRequestCode,
        title: &str,
        body: &str,
    ) -> Result<bool> {
        self.write(&ButtonRequest { code: Some(code) })?;

        Ok(self.confirm_helper(
            title,
            body,
            ConfirmOptions {
                pre_acked: false,
                constant_power: false,
            },
            Some(layout),
        ))
    }

    /// Runs the dialog without announcing it; the button is live
    /// immediately. For flows where the host already acked.
    pub fn confirm_without_button_request(&mut self, title: &str, body: &str) -> Result<bool> {
        Ok(self.confirm_helper(
            title,
            body,
            ConfirmOptions {
                pre_acked: true,
                constant_power: false,
            },
            None,
        ))
    }

    /// Shows a value for review. The gesture is still required, but the
    /// outcome is always affirmative.
    pub fn review(&mut self, code: ButtonRequestCode, title: &str, body: &str) -> Result<bool> {
        self.write(&ButtonRequest { code: Some(code) })?;

        let _ = self.confirm_helper(
            title,
            body,
            ConfirmOptions {
                pre_acked: false,
                constant_power: false,
            },
            None,
        );

        Ok(true)
    }

    fn confirm_helper(
        &mut self,
        title: &str,
        body: &str,
        options: ConfirmOptions,
        mut custom_layout: Option<&mut LayoutFn<'_, B>>,
    ) -> bool {
        self.reset_msg_stack = false;

        let mut sm = ConfirmSm::new(options.pre_acked);
        let mut shown: Option<ActiveLayout> = None;

        #[cfg(feature = "debug-link")]
        let mut debug_decision: Option<bool> = None;

        let outcome = loop {
            while let Some(event) = self.events.pop() {
                sm.apply(event);
            }

            if let Some(tiny) = self.poll_tiny(PollMode::NonBlocking) {
                match tiny {
                    TinyMessage::ButtonAck(_) => sm.button_acked = true,
                    TinyMessage::Cancel(_) => break false,
                    TinyMessage::Initialize(_) => {
                        self.reset_msg_stack = true;
                        break false;
                    }
                    #[cfg(feature = "debug-link")]
                    TinyMessage::DebugLinkDecision(decision) => {
                        debug_decision = Some(decision.yes_no);
                    }
                    #[cfg(feature = "debug-link")]
                    TinyMessage::DebugLinkGetState(_) => self.send_debug_state(),
                    _ => {}
                }
            }

            if sm.display_state == DisplayState::Finished {
                break true;
            }

            if shown != Some(sm.active_layout) {
                self.swap_layout(sm.active_layout, title, body, custom_layout.as_deref_mut());
                shown = Some(sm.active_layout);
            }

            #[cfg(feature = "debug-link")]
            if let Some(decision) = debug_decision {
                if sm.button_acked {
                    break decision;
                }
            }

            self.board.set_constant_power(options.constant_power);
            self.board.refresh();
            self.board.animate();
        };

        self.board.set_constant_power(false);

        outcome
    }

    fn swap_layout(
        &mut self,
        layout: ActiveLayout,
        title: &str,
        body: &str,
        custom_layout: Option<&mut LayoutFn<'_, B>>,
    ) {
        let kind = match layout {
            ActiveLayout::Request => Notification::Request,
            ActiveLayout::RequestNoAnimation => Notification::RequestNoAnimation,
            ActiveLayout::ConfirmAnimation => Notification::ConfirmAnimation,
            ActiveLayout::Confirmed => Notification::Confirmed,
            ActiveLayout::Finished => {
                // the loop exits on Finished before a swap can happen
                warn!("layout swap to Finished ignored");
                return;
            }
        };

        if kind == Notification::Confirmed {
            // let the hold animation complete before committing
            while self.board.is_animating() {
                self.board.animate();
                self.board.refresh();
            }
        }

        match custom_layout {
            Some(layout_fn) => layout_fn(&mut self.board, kind, title, body),
            None => self.board.notify(kind, title, body),
        }

        if kind == Notification::ConfirmAnimation {
            self.board.arm_hold_timer(CONFIRM_TIMEOUT_MS);
        } else {
            self.board.cancel_hold_timer();
        }
    }
}

#[cfg(test)]
mod tests {
    #[cfg(not(feature = "std"))]
    use alloc::string::String;
    #[cfg(not(feature = "std"))]
    use alloc::vec::Vec;

    use super::*;
    use crate::device::{Device, DeviceState};
    use crate::messages::{Cancel, MsgId};
    use crate::mock::{host_message, Action, MockBoard, MockSigner};
    use crate::registry::Channel;

    fn make_device() -> Device<MockBoard, MockSigner> {
        let mut board = MockBoard::new();
        let events = board.take_consumer();

        Device::new(
            board,
            MockSigner::new(),
            events,
            DeviceState::new("E2B9D3A1", "test wallet"),
        )
    }

    fn approve() -> Vec<Action> {
        vec![
            Action::Report(Channel::Normal, host_message(&crate::messages::ButtonAck)[0]),
            Action::Event(Event::Press),
            Action::FireHoldTimer,
            Action::Event(Event::Release),
        ]
    }

    #[test]
    fn test_review_is_always_affirmative() {
        let mut device = make_device();

        // the host declines, but a review has no negative outcome
        device.board_mut().script(vec![Action::Report(
            Channel::Normal,
            host_message(&Cancel)[0],
        )]);

        let outcome = device
            .review(ButtonRequestCode::Other, "Address", "0x00")
            .expect("review runs");
        assert!(outcome);

        // the button request still went out
        let sent = device.board().sent_messages();
        assert_eq!(sent[0].0, u16::from(MsgId::ButtonRequest));
    }

    #[test]
    fn test_custom_layout_callback_is_used() {
        let mut device = make_device();

        device.board_mut().script(vec![Action::Report(
            Channel::Normal,
            host_message(&Cancel)[0],
        )]);

        let mut seen: Vec<(Notification, String)> = Vec::new();
        let mut layout = |_board: &mut MockBoard, kind: Notification, title: &str, _body: &str| {
            seen.push((kind, title.into()));
        };

        let outcome = device
            .confirm_with_layout(&mut layout, ButtonRequestCode::Other, "Custom", "body")
            .expect("dialog runs");

        assert!(!outcome);
        assert_eq!(seen.first(), Some(&(Notification::Request, "Custom".into())));
        // the standard notification path stayed silent
        assert!(device.board().notifications.is_empty());
    }

    #[test]
    fn test_constant_power_variant_locks_display() {
        let mut device = make_device();

        device.board_mut().script(approve());

        let outcome = device
            .confirm_constant_power(ButtonRequestCode::SignTx, "Sign", "tx")
            .expect("dialog runs");

        assert!(outcome);
        assert!(device.board().power_locks() > 0);
        // released on exit
        assert!(!device.board().constant_power);
    }

    #[test]
    fn test_pre_acked_variant_skips_button_request() {
        let mut device = make_device();

        device.board_mut().script(vec![
            Action::Event(Event::Press),
            Action::FireHoldTimer,
            Action::Event(Event::Release),
        ]);

        let outcome = device
            .confirm_without_button_request("Ready", "no ack needed")
            .expect("dialog runs");

        assert!(outcome);
        assert!(device.board().sent_messages().is_empty());
    }

    #[test]
    fn test_failed_button_request_write_is_fatal() {
        let mut device = make_device();
        device.board_mut().fail_writes = true;

        assert!(device
            .confirm(ButtonRequestCode::Other, "title", "body")
            .is_err());
    }

    #[test]
    fn test_sm_requires_ack_before_press() {
        let mut sm = ConfirmSm::new(false);

        sm.apply(Event::Press);
        assert_eq!(sm.display_state, DisplayState::Home);

        sm.button_acked = true;
        sm.apply(Event::Press);
        assert_eq!(sm.display_state, DisplayState::ConfirmWait);
        assert_eq!(sm.active_layout, ActiveLayout::ConfirmAnimation);
    }

    #[test]
    fn test_sm_early_release_returns_home() {
        let mut sm = ConfirmSm::new(true);

        sm.apply(Event::Press);
        sm.apply(Event::Release);

        assert_eq!(sm.display_state, DisplayState::Home);
        assert_eq!(sm.active_layout, ActiveLayout::RequestNoAnimation);
    }

    #[test]
    fn test_sm_full_confirmation_sequence() {
        let mut sm = ConfirmSm::new(true);

        sm.apply(Event::Press);
        sm.apply(Event::HoldExpired);
        assert_eq!(sm.display_state, DisplayState::Confirmed);

        sm.apply(Event::Release);
        assert_eq!(sm.display_state, DisplayState::Finished);
        assert_eq!(sm.active_layout, ActiveLayout::Finished);
    }

    #[test]
    fn test_sm_ignores_stale_hold_expiry() {
        let mut sm = ConfirmSm::new(true);

        sm.apply(Event::Press);
        sm.apply(Event::Release);
        // the timer fired after the release was queued
        sm.apply(Event::HoldExpired);

        assert_eq!(sm.display_state, DisplayState::Home);
    }
}
