//! Stop-and-wait image transmitter
//!
//! Each frame is written whole, then the transmitter waits for the single
//! reply byte. A NAK, a silent line, or any byte that is not a valid reply
//! each use up one attempt from the same budget; the frame is resent until
//! it is acknowledged or the budget runs out. Only one frame is ever in
//! flight.

use std::fmt;
use std::time::Duration;

use pixlink_protocol::{Command, Frame, FrameError, Geometry, Reply, CMD_REFRESH};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result, Stage};
use crate::image::{RgbImage, BYTES_PER_PIXEL};
use crate::link::Link;

/// How one frame's exchange ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The device acknowledged the frame
    Acked,
    /// The last attempt was answered with a NAK (or garbage)
    NakRetriesExhausted,
    /// The last attempt got no reply at all
    TimedOut,
}

impl fmt::Display for SendOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendOutcome::Acked => f.write_str("acknowledged"),
            SendOutcome::NakRetriesExhausted => f.write_str("retries exhausted on NAK"),
            SendOutcome::TimedOut => f.write_str("timed out waiting for reply"),
        }
    }
}

/// Retry budget and timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total transmissions allowed per frame
    pub attempts: u8,
    /// Wait for the reply byte
    pub reply_timeout: Duration,
    /// Quiet period that ends a drain
    pub drain_window: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            reply_timeout: Duration::from_millis(10_150),
            drain_window: Duration::from_millis(1),
        }
    }
}

/// Counters for one transmitter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Rows acknowledged
    pub rows: u32,
    /// Frames written, resends included
    pub frames_sent: u32,
    /// NAK replies
    pub naks: u32,
    /// Replies that were neither ACK nor NAK
    pub unexpected: u32,
    /// Attempts that got no reply
    pub timeouts: u32,
    /// Stale inbound bytes thrown away
    pub drained: u32,
}

/// Build the row frame for one line of RGB pixels
///
/// A pixel is lit when its `channel` byte is non-zero.
pub fn craft_row_frame(
    pixels: &[u8],
    index: u8,
    geometry: &Geometry,
    channel: usize,
) -> Result<Frame> {
    if channel >= BYTES_PER_PIXEL {
        return Err(Error::InvalidChannel(channel));
    }
    if pixels.len() != geometry.width() as usize * BYTES_PER_PIXEL {
        return Err(FrameError::InvalidPayload.into());
    }
    let levels = pixels
        .chunks_exact(BYTES_PER_PIXEL)
        .map(|pixel| pixel[channel] != 0);
    Ok(Command::row(index, levels, geometry)?.to_frame()?)
}

/// Build the refresh frame
pub fn craft_refresh_frame() -> Frame {
    Frame::empty(CMD_REFRESH)
}

/// Host side of the link
pub struct Transmitter<L> {
    link: L,
    policy: RetryPolicy,
    channel: usize,
    stats: TransferStats,
}

impl<L: Link> Transmitter<L> {
    pub fn new(link: L, policy: RetryPolicy) -> Result<Self> {
        if policy.attempts == 0 {
            return Err(Error::ZeroAttempts);
        }
        Ok(Self {
            link,
            policy,
            channel: 0,
            stats: TransferStats::default(),
        })
    }

    /// Select the colour channel used for the on/off test
    pub fn with_channel(mut self, channel: usize) -> Result<Self> {
        if channel >= BYTES_PER_PIXEL {
            return Err(Error::InvalidChannel(channel));
        }
        self.channel = channel;
        Ok(self)
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }

    /// Send `frame` until it is acknowledged or the budget is spent
    ///
    /// Link failures are errors; a frame the device never accepts is an
    /// outcome, so the caller decides how fatal that is.
    pub fn send_and_await_ack(&mut self, frame: &Frame) -> Result<SendOutcome> {
        let bytes = frame.encode_to_vec()?;
        let attempts = self.policy.attempts;
        let mut outcome = SendOutcome::NakRetriesExhausted;

        for attempt in 1..=attempts {
            if attempt > 1 {
                self.drain()?;
            }
            self.link.send(&bytes)?;
            self.stats.frames_sent += 1;

            match self.link.recv_byte(self.policy.reply_timeout)? {
                Some(byte) => match Reply::from_byte(byte) {
                    Some(Reply::Ack) => {
                        debug!(attempt, "ACK");
                        return Ok(SendOutcome::Acked);
                    }
                    Some(Reply::Nak) => {
                        self.stats.naks += 1;
                        warn!(attempt, attempts, "NAK");
                        outcome = SendOutcome::NakRetriesExhausted;
                    }
                    None => {
                        self.stats.unexpected += 1;
                        warn!(attempt, attempts, byte, "unexpected reply byte, treating as NAK");
                        outcome = SendOutcome::NakRetriesExhausted;
                    }
                },
                None => {
                    self.stats.timeouts += 1;
                    warn!(
                        attempt,
                        attempts,
                        timeout_ms = self.policy.reply_timeout.as_millis() as u64,
                        "no reply"
                    );
                    outcome = SendOutcome::TimedOut;
                }
            }
        }
        Ok(outcome)
    }

    /// Send every row of `image`, then a refresh
    ///
    /// Stops at the first frame that is not acknowledged.
    pub fn send_image(&mut self, image: &RgbImage) -> Result<TransferStats> {
        let geometry = image.geometry();
        let height = geometry.height();
        self.stats = TransferStats::default();
        self.drain()?;

        for (index, pixels) in image.rows().enumerate() {
            // Geometry caps the height at 256 rows
            let index = index as u8;
            info!("row {} of {}", index as u16 + 1, height);
            let frame = craft_row_frame(pixels, index, &geometry, self.channel)?;
            self.send_stage(&frame, Stage::Row(index))?;
            self.stats.rows += 1;
        }

        info!("refresh");
        self.send_stage(&craft_refresh_frame(), Stage::Refresh)?;
        info!(
            rows = self.stats.rows,
            frames = self.stats.frames_sent,
            "image transferred"
        );
        Ok(self.stats)
    }

    pub fn link(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }

    fn send_stage(&mut self, frame: &Frame, stage: Stage) -> Result<()> {
        match self.send_and_await_ack(frame)? {
            SendOutcome::Acked => Ok(()),
            outcome => {
                error!(%stage, %outcome, "transfer aborted");
                Err(Error::Transfer { stage, outcome })
            }
        }
    }

    fn drain(&mut self) -> Result<()> {
        let dropped = self.link.drain(self.policy.drain_window)?;
        if dropped > 0 {
            debug!(dropped, "discarded stale inbound bytes");
            self.stats.drained += dropped as u32;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixlink_protocol::{ACK, NAK};
    use std::collections::VecDeque;
    use std::io;

    /// Link that answers each send from a script
    #[derive(Default)]
    struct Scripted {
        replies: VecDeque<Option<u8>>,
        sent: Vec<Vec<u8>>,
        stale: usize,
    }

    impl Scripted {
        fn new(replies: &[Option<u8>]) -> Self {
            Self {
                replies: replies.iter().copied().collect(),
                ..Self::default()
            }
        }
    }

    impl Link for Scripted {
        fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.sent.push(bytes.to_vec());
            Ok(())
        }

        fn recv_byte(&mut self, _timeout: Duration) -> io::Result<Option<u8>> {
            Ok(self.replies.pop_front().flatten())
        }

        fn drain(&mut self, _window: Duration) -> io::Result<usize> {
            Ok(std::mem::take(&mut self.stale))
        }
    }

    fn policy(attempts: u8) -> RetryPolicy {
        RetryPolicy {
            attempts,
            reply_timeout: Duration::from_millis(1),
            drain_window: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_craft_all_zero_row() {
        let geometry = Geometry::new(8, 1).unwrap();
        let frame = craft_row_frame(&[0; 24], 0, &geometry, 0).unwrap();
        assert_eq!(
            frame.encode_to_vec().unwrap().as_slice(),
            &[0x02, 0x03, 0x00, 0x00, 0x00, 0x01, 0x03]
        );
    }

    #[test]
    fn test_craft_row_uses_channel() {
        let geometry = Geometry::new(8, 1).unwrap();
        let mut pixels = [0u8; 24];
        // Pixel 0 red, pixel 7 green
        pixels[0] = 0xFF;
        pixels[7 * 3 + 1] = 0x10;

        let red = craft_row_frame(&pixels, 0, &geometry, 0).unwrap();
        assert_eq!(red.data.as_slice(), &[0x00, 0b1000_0000]);
        let green = craft_row_frame(&pixels, 0, &geometry, 1).unwrap();
        assert_eq!(green.data.as_slice(), &[0x00, 0b0000_0001]);
    }

    #[test]
    fn test_craft_row_full_width() {
        let frame = craft_row_frame(&[0xFF; 384], 5, &Geometry::DEFAULT, 0).unwrap();
        assert_eq!(frame.len_field(), 18);
        assert_eq!(frame.data[0], 5);
        assert!(frame.data[1..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_craft_row_rejects_bad_input() {
        let geometry = Geometry::new(8, 1).unwrap();
        assert!(matches!(
            craft_row_frame(&[0; 21], 0, &geometry, 0),
            Err(Error::Frame(FrameError::InvalidPayload))
        ));
        assert!(matches!(
            craft_row_frame(&[0; 24], 1, &geometry, 0),
            Err(Error::Frame(FrameError::InvalidPayload))
        ));
        assert!(matches!(
            craft_row_frame(&[0; 24], 0, &geometry, 3),
            Err(Error::InvalidChannel(3))
        ));
    }

    #[test]
    fn test_refresh_frame_bytes() {
        let frame = craft_refresh_frame();
        assert_eq!(
            frame.encode_to_vec().unwrap().as_slice(),
            &[0x02, 0x01, 0x01, 0x02, 0x03]
        );
    }

    #[test]
    fn test_zero_attempts_rejected() {
        assert!(matches!(
            Transmitter::new(Scripted::default(), policy(0)),
            Err(Error::ZeroAttempts)
        ));
    }

    #[test]
    fn test_ack_first_try() {
        let mut tx = Transmitter::new(Scripted::new(&[Some(ACK)]), policy(3)).unwrap();
        let outcome = tx.send_and_await_ack(&craft_refresh_frame()).unwrap();
        assert_eq!(outcome, SendOutcome::Acked);
        assert_eq!(tx.link().sent.len(), 1);
    }

    #[test]
    fn test_nak_then_ack_resends_same_frame() {
        let link = Scripted::new(&[Some(NAK), Some(ACK)]);
        let mut tx = Transmitter::new(link, policy(3)).unwrap();
        let outcome = tx.send_and_await_ack(&craft_refresh_frame()).unwrap();
        assert_eq!(outcome, SendOutcome::Acked);

        let link = tx.into_link();
        assert_eq!(link.sent.len(), 2);
        assert_eq!(link.sent[0], link.sent[1]);
    }

    #[test]
    fn test_always_nak_exhausts_budget() {
        let link = Scripted::new(&[Some(NAK); 10]);
        let mut tx = Transmitter::new(link, policy(3)).unwrap();
        let outcome = tx.send_and_await_ack(&craft_refresh_frame()).unwrap();
        assert_eq!(outcome, SendOutcome::NakRetriesExhausted);
        assert_eq!(tx.link().sent.len(), 3);
        assert_eq!(tx.stats().naks, 3);
    }

    #[test]
    fn test_silence_times_out() {
        let mut tx = Transmitter::new(Scripted::default(), policy(2)).unwrap();
        let outcome = tx.send_and_await_ack(&craft_refresh_frame()).unwrap();
        assert_eq!(outcome, SendOutcome::TimedOut);
        assert_eq!(tx.stats().timeouts, 2);
        assert_eq!(tx.link().sent.len(), 2);
    }

    #[test]
    fn test_timeout_then_ack_shares_budget() {
        let link = Scripted::new(&[None, Some(NAK), Some(ACK)]);
        let mut tx = Transmitter::new(link, policy(3)).unwrap();
        assert_eq!(
            tx.send_and_await_ack(&craft_refresh_frame()).unwrap(),
            SendOutcome::Acked
        );
        assert_eq!(tx.link().sent.len(), 3);
    }

    #[test]
    fn test_last_attempt_decides_outcome() {
        let link = Scripted::new(&[None, Some(NAK)]);
        let mut tx = Transmitter::new(link, policy(2)).unwrap();
        assert_eq!(
            tx.send_and_await_ack(&craft_refresh_frame()).unwrap(),
            SendOutcome::NakRetriesExhausted
        );
    }

    #[test]
    fn test_unexpected_byte_counts_as_nak() {
        let link = Scripted::new(&[Some(0x41), Some(ACK)]);
        let mut tx = Transmitter::new(link, policy(2)).unwrap();
        assert_eq!(
            tx.send_and_await_ack(&craft_refresh_frame()).unwrap(),
            SendOutcome::Acked
        );
        assert_eq!(tx.stats().unexpected, 1);
    }

    #[test]
    fn test_send_image_stops_at_failed_row() {
        let geometry = Geometry::new(8, 4).unwrap();
        let image = RgbImage::from_bytes(geometry, vec![0; 96]).unwrap();
        // Row 0 acked, row 1 never
        let link = Scripted::new(&[Some(ACK), Some(NAK), Some(NAK)]);
        let mut tx = Transmitter::new(link, policy(2)).unwrap();

        let err = tx.send_image(&image).unwrap_err();
        assert!(matches!(
            err,
            Error::Transfer {
                stage: Stage::Row(1),
                outcome: SendOutcome::NakRetriesExhausted
            }
        ));
        assert_eq!(tx.link().sent.len(), 3);
    }

    #[test]
    fn test_send_image_ends_with_refresh() {
        let geometry = Geometry::new(8, 2).unwrap();
        let image = RgbImage::from_bytes(geometry, vec![0; 48]).unwrap();
        let mut link = Scripted::new(&[Some(ACK); 3]);
        link.stale = 2;
        let mut tx = Transmitter::new(link, policy(1)).unwrap();

        let stats = tx.send_image(&image).unwrap();
        assert_eq!(stats.rows, 2);
        assert_eq!(stats.frames_sent, 3);
        assert_eq!(stats.drained, 2);
        let sent = &tx.link().sent;
        assert_eq!(sent[2], vec![0x02, 0x01, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_refresh_failure_names_refresh() {
        let geometry = Geometry::new(8, 1).unwrap();
        let image = RgbImage::from_bytes(geometry, vec![0; 24]).unwrap();
        let link = Scripted::new(&[Some(ACK), None]);
        let mut tx = Transmitter::new(link, policy(1)).unwrap();
        assert!(matches!(
            tx.send_image(&image),
            Err(Error::Transfer {
                stage: Stage::Refresh,
                outcome: SendOutcome::TimedOut
            })
        ));
    }
}
