//! Test doubles: a scripted board, a deterministic signer, and report
//! fixture builders.

#[cfg(not(feature = "std"))]
use alloc::collections::VecDeque;
#[cfg(not(feature = "std"))]
use alloc::string::String;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::collections::VecDeque;

use crate::confirm::Notification;
use crate::device::{Board, Signer};
use crate::messages::WireMessage;
use crate::registry::Channel;
use crate::ring::{event_ring, Event, EventConsumer, EventProducer};
use crate::wire::Encoder;
use crate::{Error, Result, FRAME_HEADER_LEN, FRAME_MAGIC, MAX_FRAME_SIZE, REPORT_LEN, REPORT_TAG};

/// One scripted step, executed per animation tick while a dialog runs.
#[derive(Clone, Debug)]
pub enum Action {
    /// Push a gesture/timer event into the ring
    Event(Event),
    /// Queue an inbound report
    Report(Channel, [u8; REPORT_LEN]),
    /// Fire the hold timer, if armed
    FireHoldTimer,
    /// Do nothing this tick
    Idle,
}

/// Scripted board double.
///
/// Inbound reports are queued with [MockBoard::queue_report] or via
/// [Action::Report]; outbound reports are recorded. The dialog script
/// advances by one action per [Board::animate] call and panics when a
/// dialog outlives its script.
pub struct MockBoard {
    pub producer: EventProducer,
    consumer: Option<EventConsumer>,
    script: VecDeque<Action>,
    inbox: VecDeque<(Channel, [u8; REPORT_LEN])>,
    written: Vec<(Channel, [u8; REPORT_LEN])>,
    pub notifications: Vec<(Notification, String, String)>,
    pub hold_armed: bool,
    pub arm_count: u32,
    pub cancel_count: u32,
    pub home_count: u32,
    pub reset_count: u32,
    pub constant_power: bool,
    pub fail_writes: bool,
    animating: u32,
    power_locks: u32,
    ticks: u32,
}

impl MockBoard {
    pub fn new() -> Self {
        let (producer, consumer) = event_ring();

        Self {
            producer,
            consumer: Some(consumer),
            script: VecDeque::new(),
            inbox: VecDeque::new(),
            written: Vec::new(),
            notifications: Vec::new(),
            hold_armed: false,
            arm_count: 0,
            cancel_count: 0,
            home_count: 0,
            reset_count: 0,
            constant_power: false,
            fail_writes: false,
            animating: 0,
            power_locks: 0,
            ticks: 0,
        }
    }

    /// Takes the consumer half of the event ring for the device.
    pub fn take_consumer(&mut self) -> EventConsumer {
        self.consumer.take().expect("consumer already taken")
    }

    /// Appends dialog-script actions.
    pub fn script(&mut self, actions: impl IntoIterator<Item = Action>) {
        self.script.extend(actions);
    }

    /// Queues an inbound report outside the dialog script.
    pub fn queue_report(&mut self, channel: Channel, report: [u8; REPORT_LEN]) {
        self.inbox.push_back((channel, report));
    }

    /// Queues every report of a host message.
    pub fn queue_message<M: WireMessage>(&mut self, channel: Channel, msg: &M) {
        for report in host_message(msg) {
            self.queue_report(channel, report);
        }
    }

    pub fn written(&self) -> &[(Channel, [u8; REPORT_LEN])] {
        &self.written
    }

    /// Inbound reports not yet polled by the device.
    pub fn pending_reports(&self) -> usize {
        self.inbox.len()
    }

    pub fn clear_written(&mut self) {
        self.written.clear();
    }

    /// Reassembles the recorded outbound reports into `(id, body)`
    /// messages.
    pub fn sent_messages(&self) -> Vec<(u16, Vec<u8>)> {
        let mut out = Vec::new();
        let mut pending: Option<(u16, usize, Vec<u8>)> = None;

        for (_, report) in &self.written {
            match pending.take() {
                None => {
                    assert_eq!(report[0], REPORT_TAG, "outbound report without tag");
                    assert_eq!(report[1], FRAME_MAGIC);
                    assert_eq!(report[2], FRAME_MAGIC);

                    let id = u16::from_be_bytes([report[3], report[4]]);
                    let len =
                        u32::from_be_bytes([report[5], report[6], report[7], report[8]]) as usize;
                    let mut body = Vec::new();
                    body.extend_from_slice(&report[FRAME_HEADER_LEN..]);

                    if body.len() >= len {
                        body.truncate(len);
                        out.push((id, body));
                    } else {
                        pending = Some((id, len, body));
                    }
                }
                Some((id, len, mut body)) => {
                    assert_eq!(report[0], REPORT_TAG);
                    body.extend_from_slice(&report[1..]);

                    if body.len() >= len {
                        body.truncate(len);
                        out.push((id, body));
                    } else {
                        pending = Some((id, len, body));
                    }
                }
            }
        }

        assert!(pending.is_none(), "truncated outbound message");

        out
    }

    pub fn set_animating(&mut self, frames: u32) {
        self.animating = frames;
    }

    /// Times the display brightness was locked.
    pub fn power_locks(&self) -> u32 {
        self.power_locks
    }

    fn step_script(&mut self) {
        self.ticks += 1;
        assert!(self.ticks < 10_000, "dialog outlived its script");

        match self.script.pop_front() {
            Some(Action::Event(event)) => {
                assert!(self.producer.push(event), "event ring full");
            }
            Some(Action::Report(channel, report)) => {
                self.inbox.push_back((channel, report));
            }
            Some(Action::FireHoldTimer) => {
                if self.hold_armed {
                    assert!(self.producer.push(Event::HoldExpired), "event ring full");
                    self.hold_armed = false;
                }
            }
            Some(Action::Idle) | None => {}
        }
    }
}

crate::impl_default!(MockBoard);

impl Board for MockBoard {
    fn write_report(&mut self, channel: Channel, report: &[u8; REPORT_LEN]) -> Result<()> {
        if self.fail_writes {
            return Err(Error::failure("endpoint stalled"));
        }

        self.written.push((channel, *report));

        Ok(())
    }

    fn poll_report(&mut self, channel: Channel) -> Option<[u8; REPORT_LEN]> {
        let index = self
            .inbox
            .iter()
            .position(|(ch, _)| *ch == channel)?;

        self.inbox.remove(index).map(|(_, report)| report)
    }

    fn notify(&mut self, kind: Notification, title: &str, body: &str) {
        self.notifications.push((kind, title.into(), body.into()));
    }

    fn refresh(&mut self) {}

    fn animate(&mut self) {
        self.animating = self.animating.saturating_sub(1);
        self.step_script();
    }

    fn is_animating(&self) -> bool {
        self.animating > 0
    }

    fn set_constant_power(&mut self, locked: bool) {
        if locked {
            self.power_locks += 1;
        }
        self.constant_power = locked;
    }

    fn arm_hold_timer(&mut self, _ms: u32) {
        self.hold_armed = true;
        self.arm_count += 1;
    }

    fn cancel_hold_timer(&mut self) {
        self.hold_armed = false;
        self.cancel_count += 1;
    }

    fn home(&mut self) {
        self.home_count += 1;
    }

    fn reset(&mut self) {
        self.reset_count += 1;
    }
}

/// Deterministic signer double.
pub struct MockSigner {
    pub fail_signing: bool,
}

impl MockSigner {
    pub const ADDRESS: [u8; 20] = [0xaa; 20];
    pub const SIGNATURE: [u8; 65] = [0x55; 65];

    pub fn new() -> Self {
        Self {
            fail_signing: false,
        }
    }
}

crate::impl_default!(MockSigner);

impl Signer for MockSigner {
    fn address(&mut self, _path: &[u32]) -> Result<[u8; 20]> {
        Ok(Self::ADDRESS)
    }

    fn sign_digest(&mut self, _path: &[u32], _digest: &[u8; 32]) -> Result<[u8; 65]> {
        if self.fail_signing {
            return Err(Error::failure("key unavailable"));
        }

        let mut signature = Self::SIGNATURE;
        signature[64] = 0;

        Ok(signature)
    }

    fn recover_address(&mut self, _digest: &[u8; 32], signature: &[u8; 65]) -> Option<[u8; 20]> {
        (signature[..64] == Self::SIGNATURE[..64] && signature[64] < 2).then_some(Self::ADDRESS)
    }
}

/// Splits a host message body into wire reports.
pub fn host_frames(id: u16, body: &[u8]) -> Vec<[u8; REPORT_LEN]> {
    let mut reports = Vec::new();

    let mut report = [0u8; REPORT_LEN];
    report[0] = REPORT_TAG;
    report[1] = FRAME_MAGIC;
    report[2] = FRAME_MAGIC;
    report[3..5].copy_from_slice(&id.to_be_bytes());
    report[5..9].copy_from_slice(&(body.len() as u32).to_be_bytes());

    let first_take = body.len().min(REPORT_LEN - FRAME_HEADER_LEN);
    report[FRAME_HEADER_LEN..FRAME_HEADER_LEN + first_take].copy_from_slice(&body[..first_take]);
    reports.push(report);

    let mut pos = first_take;
    while pos < body.len() {
        let mut report = [0u8; REPORT_LEN];
        report[0] = REPORT_TAG;

        let take = (body.len() - pos).min(REPORT_LEN - 1);
        report[1..1 + take].copy_from_slice(&body[pos..pos + take]);
        reports.push(report);

        pos += take;
    }

    reports
}

/// Encodes a message body.
pub fn encode_body<M: WireMessage>(msg: &M) -> Vec<u8> {
    let mut scratch = [0u8; MAX_FRAME_SIZE];
    let len = {
        let mut enc = Encoder::new(&mut scratch);
        msg.encode(&mut enc).expect("fixture encodes");
        enc.len()
    };

    scratch[..len].to_vec()
}

/// Builds the wire reports of a typed host message.
pub fn host_message<M: WireMessage>(msg: &M) -> Vec<[u8; REPORT_LEN]> {
    host_frames(M::ID.into(), &encode_body(msg))
}
