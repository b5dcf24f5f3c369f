//! Transport seam used during reconstruction.
//!
//! The engine never owns sockets. The surrounding stack registers one
//! [`MessageProcessor`] per listening point; when an entity is rebuilt
//! from the cache, the engine asks the matching processor to open a
//! channel toward the recorded peer so the recovered entity can send
//! again.

use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;

/// Opaque handle to an entry in the arena's channel table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(pub(crate) u64);

/// A channel opened toward a peer, as described by its processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelHandle {
    /// Transport name (udp, tcp, tls, ...).
    pub transport: String,
    /// Peer IP address text.
    pub peer_address: String,
    /// Peer port.
    pub peer_port: u16,
    /// Local port the channel is bound to.
    pub local_port: u16,
}

/// Failure to open a channel toward a peer.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ChannelOpenError {
    /// Transport-supplied description of the failure.
    pub message: String,
}

impl ChannelOpenError {
    /// Creates an error with the given description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A listening point capable of opening channels toward peers.
///
/// Implemented by the surrounding stack, one per transport/port pair.
pub trait MessageProcessor: Send + Sync {
    /// Transport name this processor serves.
    fn transport(&self) -> &str;

    /// Local port this processor is bound to.
    fn local_port(&self) -> u16;

    /// Whether the transport is secure.
    fn is_secure(&self) -> bool;

    /// Opens a channel toward the given peer.
    fn open_channel(
        &self,
        peer_address: &str,
        peer_port: u16,
    ) -> Result<ChannelHandle, ChannelOpenError>;
}

/// Registry of the node's listening points.
///
/// Lookup is by transport name and local port; the first registered
/// match wins.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: Arc<RwLock<Vec<Arc<dyn MessageProcessor>>>>,
}

impl ProcessorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listening point.
    pub fn register(&self, processor: Arc<dyn MessageProcessor>) {
        self.processors.write().push(processor);
    }

    /// Finds the processor serving `transport` on `local_port`.
    pub fn find(&self, transport: &str, local_port: u16) -> Option<Arc<dyn MessageProcessor>> {
        self.processors
            .read()
            .iter()
            .find(|p| p.transport().eq_ignore_ascii_case(transport) && p.local_port() == local_port)
            .cloned()
    }

    /// Finds a processor listening on `local_port` with the given
    /// security, regardless of transport name.
    ///
    /// Dialog snapshots record only the port and security of the
    /// listening point that created them.
    pub fn find_listening(&self, local_port: u16, secure: bool) -> Option<Arc<dyn MessageProcessor>> {
        self.processors
            .read()
            .iter()
            .find(|p| p.local_port() == local_port && p.is_secure() == secure)
            .cloned()
    }

    /// Number of registered processors.
    pub fn len(&self) -> usize {
        self.processors.read().len()
    }

    /// Returns true if no processor is registered.
    pub fn is_empty(&self) -> bool {
        self.processors.read().is_empty()
    }
}

/// Fixed-configuration processor for tests and simple deployments.
pub struct StaticProcessor {
    transport: String,
    local_port: u16,
    secure: bool,
    /// When set, every `open_channel` call fails with this message.
    fail_with: Option<String>,
}

impl StaticProcessor {
    /// Creates a processor for the given transport and port.
    pub fn new(transport: impl Into<String>, local_port: u16, secure: bool) -> Self {
        Self {
            transport: transport.into(),
            local_port,
            secure,
            fail_with: None,
        }
    }

    /// Makes every channel-open attempt fail.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.fail_with = Some(message.into());
        self
    }
}

impl MessageProcessor for StaticProcessor {
    fn transport(&self) -> &str {
        &self.transport
    }

    fn local_port(&self) -> u16 {
        self.local_port
    }

    fn is_secure(&self) -> bool {
        self.secure
    }

    fn open_channel(
        &self,
        peer_address: &str,
        peer_port: u16,
    ) -> Result<ChannelHandle, ChannelOpenError> {
        if let Some(message) = &self.fail_with {
            return Err(ChannelOpenError::new(message.clone()));
        }
        Ok(ChannelHandle {
            transport: self.transport.clone(),
            peer_address: peer_address.to_string(),
            peer_port,
            local_port: self.local_port,
        })
    }
}
