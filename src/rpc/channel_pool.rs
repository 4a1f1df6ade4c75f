//! In-process peer pool over per-agent channels.
//!
//! Each agent registers once and services its receiver; the pool routes by
//! host identifier and enforces the request timeout. The routing table is
//! shared read-only across concurrent dispatches.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::{Message, PeerPool, PoolError, WireResponse};

/// One in-flight request handed to a peer.
pub struct PeerRequest {
    pub message: Message,
    pub reply: oneshot::Sender<WireResponse>,
}

/// Addressable channel pool keyed by agent host.
pub struct ChannelPool {
    peers: RwLock<HashMap<String, mpsc::UnboundedSender<PeerRequest>>>,
}

impl ChannelPool {
    pub fn new() -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a peer; the caller services the returned receiver.
    /// Re-registering a host replaces its channel.
    pub fn register(&self, host: &str) -> mpsc::UnboundedReceiver<PeerRequest> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(host.to_string(), tx);
        rx
    }

    pub fn unregister(&self, host: &str) {
        self.peers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(host);
    }
}

impl Default for ChannelPool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PeerPool for ChannelPool {
    async fn request(
        &self,
        host: &str,
        message: Message,
        timeout: Duration,
    ) -> Result<WireResponse, PoolError> {
        let sender = {
            let peers = self.peers.read().unwrap_or_else(|e| e.into_inner());
            peers
                .get(host)
                .cloned()
                .ok_or_else(|| PoolError::UnknownPeer(host.to_string()))?
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        sender
            .send(PeerRequest {
                message,
                reply: reply_tx,
            })
            .map_err(|_| PoolError::UnknownPeer(host.to_string()))?;

        match tokio::time::timeout(timeout, reply_rx).await {
            Err(_) => Err(PoolError::Timeout),
            Ok(Err(_)) => Err(PoolError::Channel("peer dropped the reply".to_string())),
            Ok(Ok(response)) => Ok(response),
        }
    }
}
