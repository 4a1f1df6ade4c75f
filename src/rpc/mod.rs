//! Request/reply exchange with the agents.
//!
//! The gateway routes a message to the agent owning the source node over a
//! persistent addressable channel and maps the three failure surfaces
//! uniformly: unreachable peer or timeout, agent-reported error, and
//! undecodable reply. It never retries; retry policy belongs to the caller.

mod channel_pool;

pub use channel_pool::{ChannelPool, PeerRequest};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ResolvedParams;
use crate::error::InjectionError;

/// Namespace tag carried by every controller message.
pub const NAMESPACE: &str = "PacketInjection";

/// HTTP-style success status.
pub const STATUS_OK: u16 = 200;

/// Verbs understood by the agent side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verb {
    #[serde(rename = "PIRequest")]
    StartRequest,
    #[serde(rename = "PIStopRequest")]
    StopRequest,
}

/// A controller-to-agent message: namespace + verb + serialized payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub namespace: String,
    pub verb: Verb,
    pub payload: serde_json::Value,
}

impl Message {
    pub fn new<T: Serialize>(verb: Verb, payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            namespace: NAMESPACE.to_string(),
            verb,
            payload: serde_json::to_value(payload)?,
        })
    }
}

/// Raw reply from a peer: HTTP-style status plus a serialized body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

/// Decoded reply body for both verbs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reply {
    #[serde(default)]
    pub tracking_id: String,
    #[serde(default)]
    pub error: String,
}

/// Transport-level failure from the peer pool.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("no channel to host {0}")]
    UnknownPeer(String),
    #[error("request timed out")]
    Timeout,
    #[error("{0}")]
    Channel(String),
}

/// Routing to established peer channels. One persistent channel per agent
/// host; the pool applies the request timeout.
#[async_trait]
pub trait PeerPool: Send + Sync {
    async fn request(
        &self,
        host: &str,
        message: Message,
        timeout: Duration,
    ) -> Result<WireResponse, PoolError>;
}

/// Sends injection requests to agents and decodes their replies.
pub struct Gateway {
    pool: Arc<dyn PeerPool>,
    timeout: Duration,
}

impl Gateway {
    pub fn new(pool: Arc<dyn PeerPool>, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Issue a start request; a success reply carries the tracking token.
    pub async fn inject(
        &self,
        host: &str,
        params: &ResolvedParams,
    ) -> Result<String, InjectionError> {
        let reply = self.exchange(host, Verb::StartRequest, params).await?;
        Ok(reply.tracking_id)
    }

    /// Issue a stop request for a tracking token; the success reply is empty.
    pub async fn stop(&self, host: &str, tracking_id: &str) -> Result<(), InjectionError> {
        self.exchange(host, Verb::StopRequest, &tracking_id).await?;
        Ok(())
    }

    async fn exchange<T: Serialize>(
        &self,
        host: &str,
        verb: Verb,
        payload: &T,
    ) -> Result<Reply, InjectionError> {
        let message = Message::new(verb, payload).map_err(|e| InjectionError::Protocol {
            host: host.to_string(),
            reason: e.to_string(),
        })?;

        let response = self
            .pool
            .request(host, message, self.timeout)
            .await
            .map_err(|e| InjectionError::Transport {
                host: host.to_string(),
                reason: e.to_string(),
            })?;

        let reply: Reply =
            serde_json::from_value(response.body).map_err(|e| InjectionError::Protocol {
                host: host.to_string(),
                reason: e.to_string(),
            })?;

        if response.status != STATUS_OK {
            return Err(InjectionError::Remote(reply.error));
        }

        Ok(reply)
    }
}
