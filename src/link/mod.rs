//! Wireless link layer: the transport seam, the owning writer thread, and the
//! connection lifecycle manager.

pub mod loopback;
pub mod manager;
pub mod transport;
pub mod writer;

pub use loopback::{LoopbackHandle, LoopbackLink};
pub use manager::{ConnectionHandle, ConnectionManager, LinkState};
pub use transport::{Link, MockLink, MockLinkHandle, NotificationCallback, PeerInfo};
pub use writer::{writer_channel, LinkRequest, LinkWriterHandle};
