//! Multiaddress helpers

use libp2p::multiaddr::Protocol;
use libp2p::{Multiaddr, PeerId};

/// Extract the peer id embedded in an address
///
/// Returns the identity of the last `/p2p/<id>` component, so that relayed
/// addresses (`.../p2p/<relay>/p2p-circuit/p2p/<target>`) resolve to the
/// target rather than the relay.
pub fn peer_id_in(address: &Multiaddr) -> Option<PeerId> {
    address
        .iter()
        .filter_map(|component| match component {
            Protocol::P2p(peer_id) => Some(peer_id),
            _ => None,
        })
        .last()
}

/// Parse a stored address string, yielding `None` if it is malformed
pub fn parse_address(s: &str) -> Option<Multiaddr> {
    s.parse().ok()
}
