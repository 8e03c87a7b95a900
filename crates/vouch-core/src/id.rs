//! Identity types for the Vouch protocol
//!
//! Node identifiers are 16-bit, matching the address space of the
//! low-power meshes the protocol was designed for.

use std::fmt;
use std::net::{Ipv6Addr, SocketAddr};

/// Node identity. `NodeId::ZERO` is reserved: on the wire an attestor of
/// zero marks an origin message.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodeId(pub u16);

impl NodeId {
    pub const ZERO: NodeId = NodeId(0);

    #[inline]
    pub fn new(id: u16) -> Self {
        NodeId(id)
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Derive a node id from a link-local address.
    /// The id is the last 16-bit segment (fe80::212:7401:1:101 -> 0x0101).
    #[inline]
    pub fn from_ipv6(addr: &Ipv6Addr) -> Self {
        NodeId(addr.segments()[7])
    }
}

impl From<u16> for NodeId {
    fn from(id: u16) -> Self {
        NodeId(id)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the neighbor a datagram arrived from.
/// Only used for diagnostics; the protocol never trusts it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Peer {
    /// A simulated or otherwise addressed-by-id neighbor
    Node(NodeId),
    /// A socket address
    Addr(SocketAddr),
    /// Unknown sender
    Unknown,
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Peer::Node(id) => write!(f, "node {}", id),
            Peer::Addr(addr) => write!(f, "{}", addr),
            Peer::Unknown => write!(f, "unknown"),
        }
    }
}

impl From<SocketAddr> for Peer {
    fn from(addr: SocketAddr) -> Self {
        Peer::Addr(addr)
    }
}

impl From<NodeId> for Peer {
    fn from(id: NodeId) -> Self {
        Peer::Node(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_from_link_local() {
        let addr: Ipv6Addr = "fe80::212:7403:3:303".parse().unwrap();
        assert_eq!(NodeId::from_ipv6(&addr), NodeId::new(0x0303));
    }

    #[test]
    fn test_zero_is_reserved() {
        assert!(NodeId::ZERO.is_zero());
        assert!(!NodeId::new(7).is_zero());
    }

    #[test]
    fn test_peer_display() {
        assert_eq!(Peer::Node(NodeId::new(4)).to_string(), "node 4");
        let addr: SocketAddr = "127.0.0.1:8765".parse().unwrap();
        assert_eq!(Peer::from(addr).to_string(), "127.0.0.1:8765");
    }
}
