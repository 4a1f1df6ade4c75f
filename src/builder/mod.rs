//! Request resolution and assembly.
//!
//! Turns a raw injection request plus topology lookups into the concrete
//! parameter set shipped to an agent. Each step short-circuits on its first
//! failure except structural validation, which aggregates.

use std::net::IpAddr;
use std::sync::Arc;

use macaddr::MacAddr6;
use rand::Rng;

use crate::domain::{Injection, ResolvedParams};
use crate::error::InjectionError;
use crate::graph::TopologyGraph;
use crate::resolver::{IpFamily, NodeResolver};
use crate::validate;

/// Ephemeral port range for auto-assigned TCP ports: [1024, 65535).
const EPHEMERAL_MIN: u16 = 1024;
const EPHEMERAL_MAX: u16 = 65535;

/// Builds a fully-resolved parameter set from a raw request.
pub struct RequestBuilder {
    graph: Arc<dyn TopologyGraph>,
}

impl RequestBuilder {
    pub fn new(graph: Arc<dyn TopologyGraph>) -> Self {
        Self { graph }
    }

    /// Resolve and validate a request. Returns the identifier of the host
    /// owning the source node together with the immutable parameter set.
    pub fn resolve(&self, pi: &Injection) -> Result<(String, ResolvedParams), InjectionError> {
        let resolver = NodeResolver::new(&*self.graph);

        let src_node = resolver
            .resolve_node(pi.src.as_deref())
            .ok_or_else(|| InjectionError::Resolution("Not able to find a source node".into()))?;
        let dst_node = resolver.resolve_node(pi.dst.as_deref());

        if pi.is_replay() {
            // Replay: only uuid, timing and stream fields are carried.
            let params = ResolvedParams {
                uuid: pi.uuid.clone(),
                src_node_id: src_node.id.clone(),
                src_ip: None,
                src_mac: None,
                src_port: 0,
                dst_ip: None,
                dst_mac: None,
                dst_port: 0,
                packet_type: pi.packet_type,
                payload: String::new(),
                pcap: pi.pcap.clone(),
                icmp_id: pi.icmp_id,
                count: pi.count,
                interval: pi.interval,
                increment: pi.increment,
                increment_payload: pi.increment_payload,
                ttl: pi.ttl,
            };
            return Self::validated(src_node.host.clone(), params);
        }

        let family = IpFamily::of(pi.packet_type);

        let src_ip_raw = match &pi.src_ip {
            Some(ip) if !ip.is_empty() => ip.clone(),
            _ => resolver.node_ip(&src_node, family).ok_or_else(|| {
                InjectionError::Resolution("No source IP in node and user input".into())
            })?,
        };

        let dst_ip_raw = match &pi.dst_ip {
            Some(ip) if !ip.is_empty() => ip.clone(),
            _ => match &dst_node {
                Some(node) => resolver.node_ip(node, family).ok_or_else(|| {
                    InjectionError::Resolution("No dest IP in node and user input".into())
                })?,
                None => {
                    return Err(InjectionError::Resolution(
                        "Not able to find a dest node and dest IP also empty".into(),
                    ))
                }
            },
        };

        let src_mac_raw = match &pi.src_mac {
            Some(mac) if !mac.is_empty() => mac.clone(),
            _ => resolver.node_mac(&src_node).ok_or_else(|| {
                InjectionError::Resolution("No source MAC in node and user input".into())
            })?,
        };

        let dst_mac_raw = match &pi.dst_mac {
            Some(mac) if !mac.is_empty() => mac.clone(),
            _ => match &dst_node {
                Some(node) => resolver.node_mac(node).ok_or_else(|| {
                    InjectionError::Resolution("No dest MAC in node and user input".into())
                })?,
                None => {
                    return Err(InjectionError::Resolution(
                        "Not able to find a dest node and dest MAC also empty".into(),
                    ))
                }
            },
        };

        let mut src_port = pi.src_port;
        let mut dst_port = pi.dst_port;
        if pi.packet_type.is_tcp() {
            if src_port == 0 {
                src_port = ephemeral_port();
            }
            if dst_port == 0 {
                dst_port = ephemeral_port();
            }
        }

        let src_ip = parse_ip(&src_ip_raw)
            .ok_or_else(|| InjectionError::MalformedAddress("Source node doesn't have a proper IP".into()))?;
        let dst_ip = parse_ip(&dst_ip_raw).ok_or_else(|| {
            InjectionError::MalformedAddress("Destination node doesn't have a proper IP".into())
        })?;
        let src_mac = parse_mac(&src_mac_raw).ok_or_else(|| {
            InjectionError::MalformedAddress("Source node doesn't have a proper MAC".into())
        })?;
        let dst_mac = parse_mac(&dst_mac_raw).ok_or_else(|| {
            InjectionError::MalformedAddress("Destination node doesn't have a proper MAC".into())
        })?;

        let params = ResolvedParams {
            uuid: pi.uuid.clone(),
            src_node_id: src_node.id.clone(),
            src_ip: Some(src_ip),
            src_mac: Some(src_mac),
            src_port,
            dst_ip: Some(dst_ip),
            dst_mac: Some(dst_mac),
            dst_port,
            packet_type: pi.packet_type,
            payload: pi.payload.clone(),
            pcap: None,
            icmp_id: pi.icmp_id,
            count: pi.count,
            interval: pi.interval,
            increment: pi.increment,
            increment_payload: pi.increment_payload,
            ttl: pi.ttl,
        };

        Self::validated(src_node.host, params)
    }

    fn validated(
        host: String,
        params: ResolvedParams,
    ) -> Result<(String, ResolvedParams), InjectionError> {
        let errors = validate::validate(&params);
        if !errors.is_empty() {
            return Err(InjectionError::ValidationFailed(errors));
        }
        Ok((host, params))
    }
}

/// Draw a port uniformly from the ephemeral range.
fn ephemeral_port() -> u16 {
    rand::thread_rng().gen_range(EPHEMERAL_MIN..EPHEMERAL_MAX)
}

/// Parse an IP, tolerating a CIDR suffix as found in topology attributes.
fn parse_ip(raw: &str) -> Option<IpAddr> {
    let bare = raw.split('/').next().unwrap_or(raw);
    bare.parse().ok()
}

fn parse_mac(raw: &str) -> Option<MacAddr6> {
    raw.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PacketType;
    use crate::graph::{MemoryGraph, Node};

    fn graph() -> Arc<MemoryGraph> {
        let graph = MemoryGraph::new();
        graph.add_node(
            Node::new("n-src", "agent-1")
                .with_matcher("src-vm")
                .with_string_list("IPV4", vec!["10.0.0.1/24".to_string()])
                .with_string_list("IPV6", vec!["fd00::1/64".to_string()])
                .with_string("MAC", "aa:bb:cc:00:00:01"),
        );
        graph.add_node(
            Node::new("n-dst", "agent-2")
                .with_matcher("dst-vm")
                .with_string_list("IPV4", vec!["10.0.0.2/24".to_string()])
                .with_string("MAC", "aa:bb:cc:00:00:02"),
        );
        Arc::new(graph)
    }

    fn request() -> Injection {
        let mut pi = Injection::new("u-1", PacketType::Icmp4);
        pi.src = Some("src-vm".to_string());
        pi.dst = Some("dst-vm".to_string());
        pi.count = 5;
        pi.interval = 100;
        pi
    }

    #[test]
    fn resolves_everything_from_the_graph() {
        let builder = RequestBuilder::new(graph());
        let (host, params) = builder.resolve(&request()).unwrap();

        assert_eq!(host, "agent-1");
        assert_eq!(params.src_node_id, "n-src");
        assert_eq!(params.src_ip.unwrap().to_string(), "10.0.0.1");
        assert_eq!(params.dst_ip.unwrap().to_string(), "10.0.0.2");
        assert_eq!(params.src_mac, "aa:bb:cc:00:00:01".parse().ok());
        assert_eq!(params.dst_mac, "aa:bb:cc:00:00:02".parse().ok());
    }

    #[test]
    fn explicit_values_win_over_graph_attributes() {
        let builder = RequestBuilder::new(graph());
        let mut pi = request();
        pi.src_ip = Some("192.168.7.7".to_string());
        pi.src_mac = Some("de:ad:be:ef:00:01".to_string());

        let (_, params) = builder.resolve(&pi).unwrap();
        assert_eq!(params.src_ip.unwrap().to_string(), "192.168.7.7");
        assert_eq!(params.src_mac, "de:ad:be:ef:00:01".parse().ok());
    }

    #[test]
    fn v6_type_uses_the_v6_attribute_family() {
        let builder = RequestBuilder::new(graph());
        let mut pi = request();
        pi.packet_type = PacketType::Icmp6;
        pi.dst = None;
        pi.dst_ip = Some("fd00::2".to_string());
        pi.dst_mac = Some("aa:bb:cc:00:00:02".to_string());

        let (_, params) = builder.resolve(&pi).unwrap();
        assert_eq!(params.src_ip.unwrap().to_string(), "fd00::1");
    }

    #[test]
    fn missing_source_node_is_fatal() {
        let builder = RequestBuilder::new(graph());
        let mut pi = request();
        pi.src = Some("no-such-vm".to_string());

        let err = builder.resolve(&pi).unwrap_err();
        assert_eq!(err.to_string(), "Not able to find a source node");
    }

    #[test]
    fn missing_source_ip_everywhere_is_fatal() {
        let graph = MemoryGraph::new();
        graph.add_node(
            Node::new("n-src", "agent-1")
                .with_matcher("src-vm")
                .with_string("MAC", "aa:bb:cc:00:00:01"),
        );
        let builder = RequestBuilder::new(Arc::new(graph));
        let mut pi = request();
        pi.dst = None;
        pi.dst_ip = Some("10.0.0.2".to_string());
        pi.dst_mac = Some("aa:bb:cc:00:00:02".to_string());

        let err = builder.resolve(&pi).unwrap_err();
        assert_eq!(err.to_string(), "No source IP in node and user input");
    }

    #[test]
    fn missing_dest_node_and_dest_ip_is_fatal() {
        let builder = RequestBuilder::new(graph());
        let mut pi = request();
        pi.dst = None;

        let err = builder.resolve(&pi).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Not able to find a dest node and dest IP also empty"
        );
    }

    #[test]
    fn malformed_explicit_ip_is_rejected() {
        let builder = RequestBuilder::new(graph());
        let mut pi = request();
        pi.src_ip = Some("not-an-ip".to_string());

        let err = builder.resolve(&pi).unwrap_err();
        assert!(matches!(err, InjectionError::MalformedAddress(_)));
    }

    #[test]
    fn malformed_explicit_mac_is_rejected() {
        let builder = RequestBuilder::new(graph());
        let mut pi = request();
        pi.dst_mac = Some("zz:zz".to_string());

        let err = builder.resolve(&pi).unwrap_err();
        assert!(matches!(err, InjectionError::MalformedAddress(_)));
    }

    #[test]
    fn tcp_zero_ports_get_ephemeral_assignment() {
        let builder = RequestBuilder::new(graph());
        for _ in 0..50 {
            let mut pi = request();
            pi.packet_type = PacketType::Tcp4;
            let (_, params) = builder.resolve(&pi).unwrap();
            assert!((EPHEMERAL_MIN..EPHEMERAL_MAX).contains(&params.src_port));
            assert!((EPHEMERAL_MIN..EPHEMERAL_MAX).contains(&params.dst_port));
        }
    }

    #[test]
    fn tcp_explicit_ports_are_kept() {
        let builder = RequestBuilder::new(graph());
        let mut pi = request();
        pi.packet_type = PacketType::Tcp4;
        pi.src_port = 2000;
        pi.dst_port = 443;

        let (_, params) = builder.resolve(&pi).unwrap();
        assert_eq!(params.src_port, 2000);
        assert_eq!(params.dst_port, 443);
    }

    #[test]
    fn replay_skips_address_resolution() {
        // The graph knows nothing but the source node; replay needs no
        // addresses at all.
        let graph = MemoryGraph::new();
        graph.add_node(Node::new("n-src", "agent-1").with_matcher("src-vm"));
        let builder = RequestBuilder::new(Arc::new(graph));

        let mut pi = Injection::new("u-1", PacketType::Tcp4);
        pi.src = Some("src-vm".to_string());
        pi.pcap = Some("capture-1".to_string());
        pi.count = 0;

        let (host, params) = builder.resolve(&pi).unwrap();
        assert_eq!(host, "agent-1");
        assert!(params.src_ip.is_none());
        assert!(params.dst_mac.is_none());
        assert_eq!(params.pcap.as_deref(), Some("capture-1"));
    }

    #[test]
    fn validation_violations_are_aggregated() {
        let builder = RequestBuilder::new(graph());
        let mut pi = request();
        pi.count = 0;
        pi.ttl = 0;

        let err = builder.resolve(&pi).unwrap_err();
        match err {
            InjectionError::ValidationFailed(errors) => {
                assert_eq!(errors.len(), 2);
            }
            other => panic!("expected ValidationFailed, got {other}"),
        }
    }
}
