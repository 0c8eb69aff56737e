//! Outbound message emission: encode, frame, chunk into reports.

use crate::device::Board;
use crate::messages::WireMessage;
use crate::registry::{Channel, Direction, MessageEntry};
use crate::wire::Encoder;
use crate::{Error, Result, FRAME_HEADER_LEN, FRAME_MAGIC, MAX_FRAME_SIZE, REPORT_LEN, REPORT_TAG};

/// Encodes `msg` and writes it to the host as zero-padded 64-byte
/// reports.
///
/// The first report carries the frame header and up to 55 body bytes;
/// continuations carry the report tag and up to 63. The board sink may
/// spin while the endpoint is busy.
pub fn write_message<B, M>(board: &mut B, channel: Channel, msg: &M) -> Result<()>
where
    B: Board + ?Sized,
    M: WireMessage,
{
    let id = u16::from(M::ID);
    if MessageEntry::lookup(channel, id, Direction::OutToHost).is_none() {
        return Err(Error::unexpected(format!(
            "{} is not an outbound message on the {channel} channel",
            M::ID
        )));
    }

    let mut scratch = [0u8; MAX_FRAME_SIZE + 4];
    let body_len = {
        let mut enc = Encoder::new(&mut scratch);
        msg.encode(&mut enc)?;
        enc.len()
    };

    let mut report = [0u8; REPORT_LEN];
    report[0] = REPORT_TAG;
    report[1] = FRAME_MAGIC;
    report[2] = FRAME_MAGIC;
    report[3..5].copy_from_slice(&id.to_be_bytes());
    report[5..9].copy_from_slice(&(body_len as u32).to_be_bytes());

    let first_take = body_len.min(REPORT_LEN - FRAME_HEADER_LEN);
    report[FRAME_HEADER_LEN..FRAME_HEADER_LEN + first_take]
        .copy_from_slice(&scratch[..first_take]);
    board.write_report(channel, &report)?;

    let mut pos = first_take;
    while pos < body_len {
        let mut report = [0u8; REPORT_LEN];
        report[0] = REPORT_TAG;

        let take = (body_len - pos).min(REPORT_LEN - 1);
        report[1..1 + take].copy_from_slice(&scratch[pos..pos + take]);
        board.write_report(channel, &report)?;

        pos += take;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    #[cfg(not(feature = "std"))]
    use alloc::vec::Vec;

    use super::*;
    use crate::messages::{Ping, Success};
    use crate::mock::MockBoard;

    #[test]
    fn test_empty_success_report_bytes() -> Result<()> {
        let mut board = MockBoard::new();
        write_message(&mut board, Channel::Normal, &Success { message: None })?;

        let written = board.written();
        assert_eq!(written.len(), 1);

        let (channel, report) = &written[0];
        assert_eq!(*channel, Channel::Normal);
        assert_eq!(&report[..9], &[0x3f, 0x23, 0x23, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00]);
        assert!(report[9..].iter().all(|&b| b == 0));

        Ok(())
    }

    #[test]
    fn test_long_body_chunks_into_reports() -> Result<()> {
        let mut board = MockBoard::new();
        let msg = Success {
            message: Some("x".repeat(100)),
        };
        write_message(&mut board, Channel::Normal, &msg)?;

        // 102-byte body: 55 in the first report, 47 in one continuation
        let written = board.written();
        assert_eq!(written.len(), 2);
        assert_eq!(written[1].1[0], b'?');
        assert_ne!(written[1].1[1], b'#');

        // reassemble and compare
        let header = &written[0].1;
        let declared = u32::from_be_bytes([header[5], header[6], header[7], header[8]]) as usize;
        let mut body = Vec::new();
        body.extend_from_slice(&written[0].1[9..]);
        body.extend_from_slice(&written[1].1[1..]);
        body.truncate(declared);

        assert_eq!(Success::decode(&body)?, msg);

        Ok(())
    }

    #[test]
    fn test_inbound_message_is_rejected() {
        let mut board = MockBoard::new();
        let err = write_message(&mut board, Channel::Normal, &Ping::default()).unwrap_err();
        assert!(err.message().contains("not an outbound message"));
        assert!(board.written().is_empty());
    }
}
