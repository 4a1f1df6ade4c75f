//! Structural validation of resolved injection parameters.
//!
//! Runs after resolution and address parsing; checks required-ness and
//! numeric ranges. All violations are collected, not just the first.

use crate::domain::ResolvedParams;
use crate::error::FieldError;

/// Maximum value an ICMP identifier can carry on the wire.
const MAX_ICMP_ID: u64 = u16::MAX as u64;

/// Validate an assembled parameter set. Returns every violation found;
/// an empty vector means the set is acceptable.
#[must_use = "validation result must be checked"]
pub fn validate(params: &ResolvedParams) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if params.pcap.is_some() && !params.payload.is_empty() {
        errors.push(FieldError {
            field: "payload",
            message: "payload and pcap are mutually exclusive".to_string(),
        });
    }

    if params.pcap.is_some() {
        // Replay carries no crafted-packet fields; nothing else to check.
        return errors;
    }

    if params.count < 1 {
        errors.push(FieldError {
            field: "count",
            message: "must be at least 1".to_string(),
        });
    }

    if params.ttl < 1 {
        errors.push(FieldError {
            field: "ttl",
            message: "must be at least 1".to_string(),
        });
    }

    if params.icmp_id > MAX_ICMP_ID {
        errors.push(FieldError {
            field: "icmp_id",
            message: format!("must be at most {}", MAX_ICMP_ID),
        });
    }

    if params.src_ip.is_none() {
        errors.push(FieldError {
            field: "src_ip",
            message: "required".to_string(),
        });
    }
    if params.dst_ip.is_none() {
        errors.push(FieldError {
            field: "dst_ip",
            message: "required".to_string(),
        });
    }
    if params.src_mac.is_none() {
        errors.push(FieldError {
            field: "src_mac",
            message: "required".to_string(),
        });
    }
    if params.dst_mac.is_none() {
        errors.push(FieldError {
            field: "dst_mac",
            message: "required".to_string(),
        });
    }

    if params.packet_type.is_tcp() {
        if params.src_port == 0 {
            errors.push(FieldError {
                field: "src_port",
                message: "required for tcp".to_string(),
            });
        }
        if params.dst_port == 0 {
            errors.push(FieldError {
                field: "dst_port",
                message: "required for tcp".to_string(),
            });
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PacketType;
    use macaddr::MacAddr6;
    use std::net::{IpAddr, Ipv4Addr};

    fn valid_params() -> ResolvedParams {
        ResolvedParams {
            uuid: "u-1".to_string(),
            src_node_id: "n-1".to_string(),
            src_ip: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))),
            src_mac: Some(MacAddr6::new(0xaa, 0xbb, 0xcc, 0, 0, 1)),
            src_port: 4242,
            dst_ip: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))),
            dst_mac: Some(MacAddr6::new(0xaa, 0xbb, 0xcc, 0, 0, 2)),
            dst_port: 80,
            packet_type: PacketType::Tcp4,
            payload: String::new(),
            pcap: None,
            icmp_id: 0,
            count: 1,
            interval: 100,
            increment: false,
            increment_payload: 0,
            ttl: 64,
        }
    }

    #[test]
    fn valid_set_passes() {
        assert!(validate(&valid_params()).is_empty());
    }

    #[test]
    fn violations_are_aggregated() {
        let mut params = valid_params();
        params.count = 0;
        params.ttl = 0;
        let errors = validate(&params);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.field == "count"));
        assert!(errors.iter().any(|e| e.field == "ttl"));
    }

    #[test]
    fn missing_addresses_are_reported() {
        let mut params = valid_params();
        params.src_ip = None;
        params.dst_mac = None;
        let errors = validate(&params);
        assert!(errors.iter().any(|e| e.field == "src_ip"));
        assert!(errors.iter().any(|e| e.field == "dst_mac"));
    }

    #[test]
    fn tcp_requires_nonzero_ports() {
        let mut params = valid_params();
        params.src_port = 0;
        let errors = validate(&params);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "src_port");
    }

    #[test]
    fn udp_tolerates_zero_ports() {
        let mut params = valid_params();
        params.packet_type = PacketType::Udp4;
        params.src_port = 0;
        params.dst_port = 0;
        assert!(validate(&params).is_empty());
    }

    #[test]
    fn icmp_id_range_is_checked() {
        let mut params = valid_params();
        params.packet_type = PacketType::Icmp4;
        params.icmp_id = 70_000;
        let errors = validate(&params);
        assert!(errors.iter().any(|e| e.field == "icmp_id"));
    }

    #[test]
    fn payload_and_pcap_are_exclusive() {
        let mut params = valid_params();
        params.payload = "abc".to_string();
        params.pcap = Some("capture-1".to_string());
        let errors = validate(&params);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "payload");
    }

    #[test]
    fn replay_skips_crafted_packet_rules() {
        let mut params = valid_params();
        params.pcap = Some("capture-1".to_string());
        params.payload = String::new();
        params.src_ip = None;
        params.dst_ip = None;
        params.src_mac = None;
        params.dst_mac = None;
        params.src_port = 0;
        params.dst_port = 0;
        params.count = 0;
        assert!(validate(&params).is_empty());
    }
}
