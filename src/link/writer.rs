//! Cross-thread access to the link.
//!
//! Exactly one worker thread owns the [`Link`](crate::link::Link); everything
//! else submits [`LinkRequest`]s through a bounded channel and waits on a
//! per-request reply channel. Timeouts on either side surface as
//! [`BridgeError::LinkTimeout`] instead of blocking a pipeline stage forever.

use crate::error::{BridgeError, Result};
use crate::protocol::Message;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::time::Duration;

/// A request served by the link worker thread.
pub enum LinkRequest {
    /// Transmit a message to the peripheral.
    Send {
        message: Message,
        reply: Sender<Result<()>>,
    },
    /// Liveness probe: write a status command and report the outcome.
    Probe { reply: Sender<Result<()>> },
    /// Tear down and re-establish the connection.
    Reconnect { reply: Sender<Result<()>> },
    /// Stop serving requests and drop the link.
    Shutdown,
}

/// Cloneable sender side of the link request channel.
#[derive(Clone)]
pub struct LinkWriterHandle {
    tx: Sender<LinkRequest>,
    timeout: Duration,
}

/// Create the request channel shared by the writer handle and the worker.
pub fn writer_channel(capacity: usize, timeout: Duration) -> (LinkWriterHandle, Receiver<LinkRequest>) {
    let (tx, rx) = bounded(capacity);
    (LinkWriterHandle { tx, timeout }, rx)
}

impl LinkWriterHandle {
    /// Send a message and wait for the write to complete.
    pub fn send_message(&self, message: Message) -> Result<()> {
        let (reply_tx, reply_rx) = bounded(1);
        self.tx
            .send_timeout(
                LinkRequest::Send {
                    message,
                    reply: reply_tx,
                },
                self.timeout,
            )
            .map_err(|_| BridgeError::LinkTimeout {
                operation: "write".to_string(),
            })?;
        self.await_reply(&reply_rx, "write")
    }

    /// Probe the link and wait for the result.
    pub fn probe(&self) -> Result<()> {
        let (reply_tx, reply_rx) = bounded(1);
        self.tx
            .send_timeout(LinkRequest::Probe { reply: reply_tx }, self.timeout)
            .map_err(|_| BridgeError::LinkTimeout {
                operation: "probe".to_string(),
            })?;
        self.await_reply(&reply_rx, "probe")
    }

    /// Ask the worker to reconnect and wait for the result.
    pub(crate) fn reconnect(&self) -> Result<()> {
        let (reply_tx, reply_rx) = bounded(1);
        self.tx
            .send_timeout(LinkRequest::Reconnect { reply: reply_tx }, self.timeout)
            .map_err(|_| BridgeError::LinkTimeout {
                operation: "reconnect".to_string(),
            })?;
        self.await_reply(&reply_rx, "reconnect")
    }

    /// Tell the worker to shut down. Does not wait.
    pub(crate) fn shutdown(&self) {
        let _: std::result::Result<_, _> = self.tx.try_send(LinkRequest::Shutdown);
    }

    fn await_reply(&self, reply_rx: &Receiver<Result<()>>, operation: &str) -> Result<()> {
        reply_rx
            .recv_timeout(self.timeout)
            .map_err(|_| BridgeError::LinkTimeout {
                operation: operation.to_string(),
            })?
    }
}
