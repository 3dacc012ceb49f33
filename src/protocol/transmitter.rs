//! Chunked transmission of outbound messages.
//!
//! Writes never exceed the link's maximum payload size. Audio payloads are
//! announced with a preamble on the command characteristic so the peripheral
//! can size its receive buffer before the chunks arrive.

use crate::link::Link;
use crate::protocol::message::{Message, TAG_AUDIO_PREAMBLE};
use byteorder::{ByteOrder, LittleEndian};
use std::time::Duration;
use tracing::{debug, trace};

/// Which characteristic a chunk is written to.
#[derive(Clone, Copy)]
enum Channel {
    Audio,
    Command,
}

pub struct Transmitter {
    inter_chunk_delay: Duration,
}

impl Transmitter {
    pub fn new(inter_chunk_delay: Duration) -> Self {
        Self { inter_chunk_delay }
    }

    /// Send one message over the link, chunked to its write size.
    ///
    /// Aborts on the first failed write; the caller decides whether that
    /// escalates to a reconnect.
    pub fn transmit(&self, link: &mut dyn Link, message: &Message) -> crate::error::Result<()> {
        let chunk_size = link.max_write_size().max(1);
        match message {
            Message::Audio { .. } => {
                let payload = message.serialize();
                let mut preamble = [0u8; 5];
                preamble[0] = TAG_AUDIO_PREAMBLE;
                LittleEndian::write_u32(&mut preamble[1..5], payload.len() as u32);
                link.write_command(&preamble)?;
                debug!(bytes = payload.len(), "sending audio payload");
                self.write_chunked(link, &payload, chunk_size, Channel::Audio)
            }
            Message::Display { .. } | Message::Command(_) => {
                let payload = message.serialize();
                self.write_chunked(link, &payload, chunk_size, Channel::Command)
            }
        }
    }

    fn write_chunked(
        &self,
        link: &mut dyn Link,
        payload: &[u8],
        chunk_size: usize,
        channel: Channel,
    ) -> crate::error::Result<()> {
        let mut chunks = payload.chunks(chunk_size).peekable();
        while let Some(chunk) = chunks.next() {
            match channel {
                Channel::Audio => link.write_audio(chunk)?,
                Channel::Command => link.write_command(chunk)?,
            }
            trace!(len = chunk.len(), "chunk written");
            if chunks.peek().is_some() && !self.inter_chunk_delay.is_zero() {
                std::thread::sleep(self.inter_chunk_delay);
            }
        }
        Ok(())
    }
}

/// Truncate text to fit a u16 length field without splitting a UTF-8
/// character.
pub fn truncate_display_text(text: &str) -> &str {
    const MAX: usize = u16::MAX as usize;
    if text.len() <= MAX {
        return text;
    }
    let mut end = MAX;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
