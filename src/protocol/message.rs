//! Message types exchanged with the peripheral.

use byteorder::{ByteOrder, LittleEndian};

/// Tag byte for an audio frame: header plus 16-bit PCM samples.
pub const TAG_AUDIO: u8 = b'A';

/// Tag byte for a display update: two UTF-8 text spans.
pub const TAG_DISPLAY: u8 = b'L';

/// Tag byte for the audio preamble announcing an outbound payload length.
pub const TAG_AUDIO_PREAMBLE: u8 = b'P';

/// Single-byte commands understood by both ends of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCode {
    /// Liveness probe; the peripheral treats it as a no-op.
    Status,
    /// Host finished processing the previous utterance.
    Ready,
    /// Host failed to process the previous utterance.
    Error,
}

impl CommandCode {
    pub fn tag(self) -> u8 {
        match self {
            CommandCode::Status => b'S',
            CommandCode::Ready => b'R',
            CommandCode::Error => b'E',
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'S' => Some(CommandCode::Status),
            b'R' => Some(CommandCode::Ready),
            b'E' => Some(CommandCode::Error),
            _ => None,
        }
    }
}

/// A complete, validated protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// PCM audio frame.
    Audio { sample_rate: u32, samples: Vec<i16> },
    /// Text pair for the peripheral's display.
    Display { original: String, translated: String },
    /// Single-byte command.
    Command(CommandCode),
}

impl Message {
    /// Serialize into the wire layout.
    ///
    /// The audio preamble is not part of a message; the transmitter emits it
    /// separately before a chunked audio payload.
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Message::Audio {
                sample_rate,
                samples,
            } => {
                let mut buf = Vec::with_capacity(9 + samples.len() * 2);
                buf.push(TAG_AUDIO);
                let mut header = [0u8; 8];
                LittleEndian::write_u32(&mut header[0..4], samples.len() as u32);
                LittleEndian::write_u32(&mut header[4..8], *sample_rate);
                buf.extend_from_slice(&header);
                let mut pcm = vec![0u8; samples.len() * 2];
                LittleEndian::write_i16_into(samples, &mut pcm);
                buf.extend_from_slice(&pcm);
                buf
            }
            Message::Display {
                original,
                translated,
            } => {
                let orig = original.as_bytes();
                let trans = translated.as_bytes();
                let mut buf = Vec::with_capacity(5 + orig.len() + trans.len());
                buf.push(TAG_DISPLAY);
                let mut lens = [0u8; 4];
                LittleEndian::write_u16(&mut lens[0..2], orig.len() as u16);
                LittleEndian::write_u16(&mut lens[2..4], trans.len() as u16);
                buf.extend_from_slice(&lens);
                buf.extend_from_slice(orig);
                buf.extend_from_slice(trans);
                buf
            }
            Message::Command(code) => vec![code.tag()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_tags_roundtrip() {
        for code in [CommandCode::Status, CommandCode::Ready, CommandCode::Error] {
            assert_eq!(CommandCode::from_tag(code.tag()), Some(code));
        }
        assert_eq!(CommandCode::from_tag(b'X'), None);
    }

    #[test]
    fn test_audio_serialization_layout() {
        let msg = Message::Audio {
            sample_rate: 16000,
            samples: vec![1, -1],
        };
        let bytes = msg.serialize();
        assert_eq!(bytes[0], b'A');
        assert_eq!(LittleEndian::read_u32(&bytes[1..5]), 2);
        assert_eq!(LittleEndian::read_u32(&bytes[5..9]), 16000);
        assert_eq!(&bytes[9..], &[0x01, 0x00, 0xff, 0xff]);
    }

    #[test]
    fn test_display_serialization_layout() {
        let msg = Message::Display {
            original: "你好".to_string(),
            translated: "hi".to_string(),
        };
        let bytes = msg.serialize();
        assert_eq!(bytes[0], b'L');
        assert_eq!(LittleEndian::read_u16(&bytes[1..3]), 6);
        assert_eq!(LittleEndian::read_u16(&bytes[3..5]), 2);
        assert_eq!(&bytes[5..11], "你好".as_bytes());
        assert_eq!(&bytes[11..13], b"hi");
    }

    #[test]
    fn test_command_serialization() {
        assert_eq!(Message::Command(CommandCode::Ready).serialize(), vec![b'R']);
    }
}
