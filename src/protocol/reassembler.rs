//! Incremental reassembly of protocol messages from a chunked byte stream.
//!
//! The link delivers arbitrary-sized notification chunks with no alignment to
//! message boundaries. The reassembler buffers bytes until complete messages
//! can be cut, and recovers from corruption by scanning forward to the next
//! plausible tag byte.

use crate::defaults::{INBOUND_BUFFER_CAP, MAX_SAMPLE_COUNT, MAX_SAMPLE_RATE_HZ};
use crate::protocol::message::{CommandCode, Message, TAG_AUDIO, TAG_DISPLAY};
use byteorder::{ByteOrder, LittleEndian};
use tracing::warn;

/// Result of attempting to parse one message from the front of the buffer.
enum Parse {
    /// Not enough bytes yet; wait for more input.
    Incomplete,
    /// A message was cut; consume this many bytes.
    Complete(Option<Message>, usize),
    /// The front of the buffer is not a valid message.
    Corrupt,
}

pub struct Reassembler {
    buf: Vec<u8>,
    cap: usize,
    resyncs: u64,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(INBOUND_BUFFER_CAP)
    }
}

impl Reassembler {
    pub fn new(cap: usize) -> Self {
        Self {
            buf: Vec::new(),
            cap,
            resyncs: 0,
        }
    }

    /// Number of times corrupt input forced the parser to discard bytes.
    pub fn resync_count(&self) -> u64 {
        self.resyncs
    }

    /// Bytes currently buffered awaiting completion.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Feed one chunk of link bytes and return every message completed by it.
    ///
    /// The same byte stream yields the same messages regardless of how it is
    /// split into chunks.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Message> {
        self.buf.extend_from_slice(chunk);

        if self.buf.len() > self.cap {
            warn!(
                buffered = self.buf.len(),
                cap = self.cap,
                "inbound buffer overflow, discarding"
            );
            self.buf.clear();
            self.resyncs += 1;
            return Vec::new();
        }

        let mut messages = Vec::new();
        loop {
            match self.parse_front() {
                Parse::Incomplete => break,
                Parse::Complete(msg, consumed) => {
                    self.buf.drain(..consumed);
                    match msg {
                        Some(msg) => messages.push(msg),
                        // A structurally valid message with bad content
                        // counts as corruption even though no scan is needed.
                        None => self.resyncs += 1,
                    }
                }
                Parse::Corrupt => self.resync(),
            }
            if self.buf.is_empty() {
                break;
            }
        }
        messages
    }

    fn parse_front(&self) -> Parse {
        let buf = &self.buf;
        let Some(&tag) = buf.first() else {
            return Parse::Incomplete;
        };
        match tag {
            TAG_AUDIO => {
                if buf.len() < 9 {
                    return Parse::Incomplete;
                }
                let sample_count = LittleEndian::read_u32(&buf[1..5]);
                let sample_rate = LittleEndian::read_u32(&buf[5..9]);
                if sample_count > MAX_SAMPLE_COUNT
                    || sample_rate == 0
                    || sample_rate > MAX_SAMPLE_RATE_HZ
                {
                    warn!(sample_count, sample_rate, "implausible audio header");
                    return Parse::Corrupt;
                }
                let total = 9 + sample_count as usize * 2;
                if buf.len() < total {
                    return Parse::Incomplete;
                }
                let mut samples = vec![0i16; sample_count as usize];
                LittleEndian::read_i16_into(&buf[9..total], &mut samples);
                Parse::Complete(
                    Some(Message::Audio {
                        sample_rate,
                        samples,
                    }),
                    total,
                )
            }
            TAG_DISPLAY => {
                if buf.len() < 5 {
                    return Parse::Incomplete;
                }
                let orig_len = LittleEndian::read_u16(&buf[1..3]) as usize;
                let trans_len = LittleEndian::read_u16(&buf[3..5]) as usize;
                let total = 5 + orig_len + trans_len;
                if buf.len() < total {
                    return Parse::Incomplete;
                }
                let original = std::str::from_utf8(&buf[5..5 + orig_len]);
                let translated = std::str::from_utf8(&buf[5 + orig_len..total]);
                match (original, translated) {
                    (Ok(original), Ok(translated)) => Parse::Complete(
                        Some(Message::Display {
                            original: original.to_string(),
                            translated: translated.to_string(),
                        }),
                        total,
                    ),
                    _ => {
                        // Span boundaries are intact, so consume the whole
                        // message rather than rescanning byte by byte.
                        warn!("display message with invalid UTF-8, dropping");
                        Parse::Complete(None, total)
                    }
                }
            }
            tag => match CommandCode::from_tag(tag) {
                Some(code) => Parse::Complete(Some(Message::Command(code)), 1),
                None => Parse::Corrupt,
            },
        }
    }

    /// Discard the corrupt front byte and scan forward to the next byte that
    /// could start a message. Clears the buffer if none exists.
    fn resync(&mut self) {
        self.resyncs += 1;
        let next = self.buf[1..]
            .iter()
            .position(|&b| b == TAG_AUDIO || b == TAG_DISPLAY || CommandCode::from_tag(b).is_some());
        match next {
            Some(offset) => {
                self.buf.drain(..offset + 1);
            }
            None => self.buf.clear(),
        }
    }
}
