//! The fully-resolved parameter set shipped to an agent.

use std::net::IpAddr;

use macaddr::MacAddr6;
use serde::{Deserialize, Serialize};

use super::PacketType;

/// Concrete injection parameters, built exactly once per accepted request
/// and never mutated afterwards.
///
/// For replay injections only the uuid, timing and stream fields are
/// populated; the address fields stay `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedParams {
    pub uuid: String,
    /// Graph id of the source node; the owning host is resolved separately.
    pub src_node_id: String,

    pub src_ip: Option<IpAddr>,
    #[serde(with = "mac_opt")]
    pub src_mac: Option<MacAddr6>,
    pub src_port: u16,
    pub dst_ip: Option<IpAddr>,
    #[serde(with = "mac_opt")]
    pub dst_mac: Option<MacAddr6>,
    pub dst_port: u16,

    pub packet_type: PacketType,
    pub payload: String,
    pub pcap: Option<String>,

    pub icmp_id: u64,
    pub count: u64,
    pub interval: u64,
    pub increment: bool,
    pub increment_payload: i64,
    pub ttl: u8,
}

/// Serialize optional MACs as their canonical string form.
mod mac_opt {
    use macaddr::MacAddr6;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        mac: &Option<MacAddr6>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match mac {
            Some(mac) => serializer.serialize_some(&mac.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<MacAddr6>, D::Error> {
        let value = Option::<String>::deserialize(deserializer)?;
        value
            .map(|s| s.parse::<MacAddr6>().map_err(serde::de::Error::custom))
            .transpose()
    }
}
