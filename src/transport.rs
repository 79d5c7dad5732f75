//! Transport seams between the gateway core and the MIDI ports
//!
//! The core only needs two capabilities: a sink that accepts outbound
//! messages from many concurrent tasks, and a source whose pending inbound
//! messages can be drained without blocking.

use async_trait::async_trait;
use std::time::Instant;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::midi::MidiMessage;

/// Inbound message from the keyboard
#[derive(Debug, Clone)]
pub struct KeyboardEvent {
    pub timestamp: Instant,
    pub message: MidiMessage,
}

impl KeyboardEvent {
    pub fn new(message: MidiMessage) -> Self {
        Self { timestamp: Instant::now(), message }
    }
}

/// Outbound message sink
///
/// Implementations must serialize concurrent writers internally.
#[async_trait]
pub trait MidiSink: Send + Sync {
    async fn send(&self, message: &MidiMessage) -> Result<()>;
}

/// Non-blocking inbound message source
pub trait MidiSource: Send {
    /// Take every message received since the last call
    fn drain_pending(&mut self) -> Vec<KeyboardEvent>;
}

impl MidiSource for mpsc::Receiver<KeyboardEvent> {
    fn drain_pending(&mut self) -> Vec<KeyboardEvent> {
        let mut pending = Vec::new();
        while let Ok(event) = self.try_recv() {
            pending.push(event);
        }
        pending
    }
}
