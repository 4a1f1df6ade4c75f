//! The injection resource as submitted by callers and persisted in the store.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default TTL applied to crafted packets when the caller gives none.
pub const DEFAULT_TTL: u8 = 64;

/// The closed set of packet kinds an agent can craft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketType {
    Icmp4,
    Icmp6,
    Tcp4,
    Tcp6,
    Udp4,
    Udp6,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown packet type: {0}")]
pub struct UnknownPacketType(pub String);

impl PacketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PacketType::Icmp4 => "icmp4",
            PacketType::Icmp6 => "icmp6",
            PacketType::Tcp4 => "tcp4",
            PacketType::Tcp6 => "tcp6",
            PacketType::Udp4 => "udp4",
            PacketType::Udp6 => "udp6",
        }
    }

    /// Whether addresses for this type come from the IPv6 attribute family.
    pub fn is_v6(&self) -> bool {
        matches!(
            self,
            PacketType::Icmp6 | PacketType::Tcp6 | PacketType::Udp6
        )
    }

    /// TCP variants need ports; zero ports get an ephemeral assignment.
    pub fn is_tcp(&self) -> bool {
        matches!(self, PacketType::Tcp4 | PacketType::Tcp6)
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PacketType {
    type Err = UnknownPacketType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "icmp4" => Ok(PacketType::Icmp4),
            "icmp6" => Ok(PacketType::Icmp6),
            "tcp4" => Ok(PacketType::Tcp4),
            "tcp6" => Ok(PacketType::Tcp6),
            "udp4" => Ok(PacketType::Udp4),
            "udp6" => Ok(PacketType::Udp6),
            other => Err(UnknownPacketType(other.to_string())),
        }
    }
}

/// Lifecycle position of a stored injection, derived from its tracking fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionState {
    /// Accepted into the store, not yet dispatched to an agent.
    Pending,
    /// Dispatched; the agent is still sending.
    Running,
    /// The computed send window has elapsed.
    Expired,
}

/// A packet-injection job.
///
/// Source and destination are each given either as a topology selector or as
/// explicit address fields. Either `pcap` is set (replay a captured stream,
/// address fields unused) or `packet_type`/`payload` drive crafted packets —
/// never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Injection {
    pub uuid: String,

    /// Topology selector for the source endpoint.
    pub src: Option<String>,
    /// Topology selector for the destination endpoint.
    pub dst: Option<String>,

    pub src_ip: Option<String>,
    pub dst_ip: Option<String>,
    pub src_mac: Option<String>,
    pub dst_mac: Option<String>,
    pub src_port: u16,
    pub dst_port: u16,

    pub packet_type: PacketType,
    pub payload: String,
    /// Reference to a captured packet stream to replay.
    pub pcap: Option<String>,

    pub icmp_id: u64,
    pub count: u64,
    /// Inter-send interval in milliseconds.
    pub interval: u64,
    pub increment: bool,
    pub increment_payload: i64,
    pub ttl: u8,

    /// Token returned by the executing agent once dispatched.
    pub tracking_id: Option<String>,
    /// Dispatch time; set when the agent accepts the request.
    pub start_time: Option<DateTime<Utc>>,
}

impl Injection {
    pub fn new(uuid: impl Into<String>, packet_type: PacketType) -> Self {
        Self {
            uuid: uuid.into(),
            src: None,
            dst: None,
            src_ip: None,
            dst_ip: None,
            src_mac: None,
            dst_mac: None,
            src_port: 0,
            dst_port: 0,
            packet_type,
            payload: String::new(),
            pcap: None,
            icmp_id: 0,
            count: 1,
            interval: 0,
            increment: false,
            increment_payload: 0,
            ttl: DEFAULT_TTL,
            tracking_id: None,
            start_time: None,
        }
    }

    pub fn is_replay(&self) -> bool {
        self.pcap.is_some()
    }

    /// Total send window: count × interval.
    pub fn total_duration(&self) -> Duration {
        Duration::from_millis(self.count.saturating_mul(self.interval))
    }

    /// Whether the agent is still sending at `now`.
    ///
    /// Replay injections have no count/interval semantics: they run from
    /// dispatch until explicitly stopped.
    pub fn is_running(&self, now: DateTime<Utc>) -> bool {
        let Some(start) = self.start_time else {
            return false;
        };
        if self.is_replay() {
            return true;
        }
        let total = chrono::Duration::milliseconds(
            self.count.saturating_mul(self.interval).min(i64::MAX as u64) as i64,
        );
        start + total > now
    }

    pub fn state(&self, now: DateTime<Utc>) -> InjectionState {
        if self.start_time.is_none() {
            InjectionState::Pending
        } else if self.is_running(now) {
            InjectionState::Running
        } else {
            InjectionState::Expired
        }
    }
}
