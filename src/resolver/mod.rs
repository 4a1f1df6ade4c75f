//! Node resolution against the topology graph.
//!
//! Endpoint descriptors are either explicit address fields or a selector
//! resolved here. Attribute lookups prefer the cloud-specific namespaced
//! attribute and fall back to the bare one.

use crate::domain::PacketType;
use crate::graph::{Node, TopologyGraph};

/// Address family used to pick IP attributes off a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    pub fn of(packet_type: PacketType) -> Self {
        if packet_type.is_v6() {
            IpFamily::V6
        } else {
            IpFamily::V4
        }
    }

    /// Bare attribute name for this family.
    pub fn attribute(&self) -> &'static str {
        match self {
            IpFamily::V4 => "IPV4",
            IpFamily::V6 => "IPV6",
        }
    }
}

/// Resolves selectors and node attributes.
pub struct NodeResolver<'a> {
    graph: &'a dyn TopologyGraph,
}

impl<'a> NodeResolver<'a> {
    pub fn new(graph: &'a dyn TopologyGraph) -> Self {
        Self { graph }
    }

    /// Resolve a selector to a node; `None` selector means "explicit fields
    /// only" and yields no node.
    pub fn resolve_node(&self, selector: Option<&str>) -> Option<Node> {
        self.graph.lookup(selector?)
    }

    /// First IP of the node for the given family: `Neutron.IPV4`/`Neutron.IPV6`
    /// first, bare `IPV4`/`IPV6` second.
    pub fn node_ip(&self, node: &Node, family: IpFamily) -> Option<String> {
        let namespaced = format!("Neutron.{}", family.attribute());
        let ips = node
            .field_string_list(&namespaced)
            .filter(|ips| !ips.is_empty())
            .or_else(|| {
                node.field_string_list(family.attribute())
                    .filter(|ips| !ips.is_empty())
            })?;
        ips.into_iter().next()
    }

    /// MAC of the node: vendor attribute `ExtID.attached-mac` first, bare
    /// `MAC` second.
    pub fn node_mac(&self, node: &Node) -> Option<String> {
        node.field_string("ExtID.attached-mac")
            .filter(|mac| !mac.is_empty())
            .or_else(|| node.field_string("MAC").filter(|mac| !mac.is_empty()))
    }
}
