//! Reassembly of 64-byte HID reports into whole message bodies.
//!
//! One [Assembler] exists per channel. Reports stream in; the assembler
//! either buffers body fragments until the declared length is reached
//! (`Parsed` entries), hands each fragment straight to the caller (`Raw`
//! entries), or fails once, resets atomically, and discards everything
//! up to the next first-report magic.

use log::warn;

use crate::registry::{Channel, Direction, Dispatch, MessageEntry};
use crate::{Error, Result, FRAME_HEADER_LEN, FRAME_MAGIC, MAX_FRAME_SIZE, REPORT_TAG};

/// Outcome of feeding one report to the assembler.
#[derive(Debug, PartialEq)]
pub enum Reassembly<'a> {
    /// More reports are needed (or the report was discarded while
    /// resynchronizing).
    Pending,
    /// A whole body is buffered; read it with [Assembler::body] and then
    /// call [Assembler::reset].
    Message {
        entry: &'static MessageEntry,
        len: usize,
    },
    /// One fragment of a raw-dispatched message.
    RawChunk {
        entry: &'static MessageEntry,
        chunk: &'a [u8],
        total: u32,
        last: bool,
    },
}

/// Per-channel reassembly state.
pub struct Assembler {
    channel: Channel,
    first: bool,
    skipping: bool,
    msg_size: u32,
    cursor: usize,
    entry: Option<&'static MessageEntry>,
    buf: [u8; MAX_FRAME_SIZE],
}

impl Assembler {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            first: true,
            skipping: false,
            msg_size: 0,
            cursor: 0,
            entry: None,
            buf: [0u8; MAX_FRAME_SIZE],
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// The reassembled body bytes, valid after [Reassembly::Message].
    pub fn body(&self) -> &[u8] {
        self.buf.as_ref()
    }

    /// Clears all reassembly state and zeroes the buffer.
    pub fn reset(&mut self) {
        self.first = true;
        self.msg_size = 0;
        self.cursor = 0;
        self.entry = None;
        self.buf.fill(0);
    }

    fn fail(&mut self, text: &str) -> Error {
        warn!("{} channel framing failure: {text}", self.channel);
        self.reset();
        self.skipping = true;
        Error::unexpected(text)
    }

    /// Processes one inbound report.
    pub fn feed<'a>(&mut self, report: &'a [u8]) -> Result<Reassembly<'a>> {
        if self.skipping {
            // after a failure, everything up to the next first-report
            // magic is discarded
            let resync = report.len() >= 3
                && report[0] == REPORT_TAG
                && report[1] == FRAME_MAGIC
                && report[2] == FRAME_MAGIC;
            if !resync {
                return Ok(Reassembly::Pending);
            }
            self.skipping = false;
        }

        if report.len() < FRAME_HEADER_LEN {
            return Err(self.fail("Buffer too small"));
        }

        if report[0] != REPORT_TAG {
            return Err(self.fail("Malformed packet"));
        }

        if self.first && (report[1] != FRAME_MAGIC || report[2] != FRAME_MAGIC) {
            return Err(self.fail("Malformed packet"));
        }

        let chunk: &'a [u8];
        if self.first {
            self.buf.fill(0);

            let msg_id = u16::from_be_bytes([report[3], report[4]]);
            self.msg_size = u32::from_be_bytes([report[5], report[6], report[7], report[8]]);
            self.entry = MessageEntry::lookup(self.channel, msg_id, Direction::InFromHost);
            self.cursor = 0;

            let body = &report[FRAME_HEADER_LEN..];
            chunk = &body[..body.len().min(self.msg_size as usize)];
        } else {
            let body = &report[1..];
            let left = (self.msg_size as usize).saturating_sub(self.cursor);
            chunk = &body[..body.len().min(left)];
        }

        let Some(entry) = self.entry else {
            return Err(self.fail("Unknown message"));
        };

        if self.msg_size as usize > MAX_FRAME_SIZE {
            return Err(self.fail("Malformed message"));
        }

        if entry.dispatch == Dispatch::Raw {
            // no buffering; the raw handler owns its own state, the
            // assembler only tracks when the message ends
            self.cursor += chunk.len();
            let last = self.cursor >= self.msg_size as usize;
            let total = self.msg_size;

            if last {
                self.reset();
            } else {
                self.first = false;
            }

            return Ok(Reassembly::RawChunk {
                entry,
                chunk,
                total,
                last,
            });
        }

        let Some(end) = self.cursor.checked_add(chunk.len()).filter(|&end| end <= self.buf.len())
        else {
            return Err(self.fail("Malformed message"));
        };

        self.buf[self.cursor..end].copy_from_slice(chunk);
        self.cursor = end;

        if self.cursor < self.msg_size as usize {
            self.first = false;
            return Ok(Reassembly::Pending);
        }

        Ok(Reassembly::Message {
            entry,
            len: self.msg_size as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    #[cfg(not(feature = "std"))]
    use alloc::vec::Vec;

    use super::*;
    use crate::messages::MsgId;
    use crate::mock::host_frames;
    use crate::REPORT_LEN;

    #[test]
    fn test_single_report_message() -> Result<()> {
        let mut asm = Assembler::new(Channel::Normal);
        let frames = host_frames(MsgId::Ping.into(), &[]);
        assert_eq!(frames.len(), 1);

        match asm.feed(&frames[0])? {
            Reassembly::Message { entry, len } => {
                assert_eq!(entry.id, MsgId::Ping);
                assert_eq!(len, 0);
            }
            other => panic!("expected a whole message, got {other:?}"),
        }

        Ok(())
    }

    #[test]
    fn test_multi_report_reassembly() -> Result<()> {
        let mut asm = Assembler::new(Channel::Normal);

        // a 200-byte body spans one first report (55) and three
        // continuations (63 + 63 + 19)
        let body: Vec<u8> = (0..200u16).map(|b| b as u8).collect();
        let frames = host_frames(MsgId::Eip712PushFrame.into(), &body);
        assert_eq!(frames.len(), 4);

        for frame in &frames[..3] {
            assert_eq!(asm.feed(frame)?, Reassembly::Pending);
        }

        match asm.feed(&frames[3])? {
            Reassembly::Message { entry, len } => {
                assert_eq!(entry.id, MsgId::Eip712PushFrame);
                assert_eq!(len, body.len());
                assert_eq!(&asm.body()[..len], body.as_slice());
            }
            other => panic!("expected a whole message, got {other:?}"),
        }

        asm.reset();
        assert!(asm.body().iter().all(|&b| b == 0));

        Ok(())
    }

    #[test]
    fn test_bad_tag_fails() {
        let mut asm = Assembler::new(Channel::Normal);
        let mut frame = host_frames(MsgId::Ping.into(), &[])[0];
        frame[0] = b'!';

        let err = asm.feed(&frame).unwrap_err();
        assert_eq!(err.message(), "Malformed packet");
    }

    #[test]
    fn test_bad_magic_fails() {
        let mut asm = Assembler::new(Channel::Normal);
        let mut frame = host_frames(MsgId::Ping.into(), &[])[0];
        frame[2] = 0x00;

        let err = asm.feed(&frame).unwrap_err();
        assert_eq!(err.message(), "Malformed packet");
    }

    #[test]
    fn test_short_report_fails() {
        let mut asm = Assembler::new(Channel::Normal);
        let err = asm.feed(&[b'?', b'#', b'#']).unwrap_err();
        assert_eq!(err.message(), "Buffer too small");
    }

    #[test]
    fn test_unknown_id_fails() {
        let mut asm = Assembler::new(Channel::Normal);
        let frames = host_frames(0x4242, &[]);

        let err = asm.feed(&frames[0]).unwrap_err();
        assert_eq!(err.message(), "Unknown message");
    }

    #[test]
    fn test_out_direction_id_is_unknown() {
        // Success is registered, but it is not a host message
        let mut asm = Assembler::new(Channel::Normal);
        let frames = host_frames(MsgId::Success.into(), &[]);

        let err = asm.feed(&frames[0]).unwrap_err();
        assert_eq!(err.message(), "Unknown message");
    }

    #[test]
    fn test_oversized_length_fails_once_then_resyncs() -> Result<()> {
        let mut asm = Assembler::new(Channel::Normal);

        let mut frame = host_frames(MsgId::Ping.into(), &[])[0];
        frame[5..9].copy_from_slice(&u32::MAX.to_be_bytes());

        let err = asm.feed(&frame).unwrap_err();
        assert_eq!(err.message(), "Malformed message");

        // continuation garbage is discarded without further failures
        let mut continuation = [0u8; REPORT_LEN];
        continuation[0] = b'?';
        assert_eq!(asm.feed(&continuation)?, Reassembly::Pending);
        assert_eq!(asm.feed(&continuation)?, Reassembly::Pending);

        // a fresh first report resynchronizes
        let frames = host_frames(MsgId::Ping.into(), &[]);
        assert!(matches!(
            asm.feed(&frames[0])?,
            Reassembly::Message { len: 0, .. }
        ));

        Ok(())
    }

    #[test]
    fn test_raw_chunks_stream_without_buffering() -> Result<()> {
        let mut asm = Assembler::new(Channel::Normal);

        let body: Vec<u8> = (0..150u16).map(|b| b as u8).collect();
        let frames = host_frames(MsgId::Eip712AppendDynamicData.into(), &body);
        assert_eq!(frames.len(), 3);

        let mut collected = Vec::new();
        for (i, frame) in frames.iter().enumerate() {
            match asm.feed(frame)? {
                Reassembly::RawChunk {
                    entry,
                    chunk,
                    total,
                    last,
                } => {
                    assert_eq!(entry.id, MsgId::Eip712AppendDynamicData);
                    assert_eq!(total as usize, body.len());
                    assert_eq!(last, i == frames.len() - 1);
                    collected.extend_from_slice(chunk);
                }
                other => panic!("expected a raw chunk, got {other:?}"),
            }
        }

        assert_eq!(collected, body);

        // assembler released its state after the last chunk
        let frames = host_frames(MsgId::Ping.into(), &[]);
        assert!(matches!(
            asm.feed(&frames[0])?,
            Reassembly::Message { len: 0, .. }
        ));

        Ok(())
    }
}
