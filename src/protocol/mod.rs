//! Wire protocol shared with the voice peripheral.
//!
//! All multi-byte integers are little-endian. Three message families exist:
//! tagged audio frames, display text updates, and single-byte commands.

pub mod message;
pub mod reassembler;
pub mod transmitter;

pub use message::{CommandCode, Message, TAG_AUDIO, TAG_AUDIO_PREAMBLE, TAG_DISPLAY};
pub use reassembler::Reassembler;
pub use transmitter::Transmitter;
