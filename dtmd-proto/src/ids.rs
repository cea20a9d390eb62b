/// Opaque small integer naming one of the participant database nodes. The
/// daemon never interprets this beyond using it as a map key and a
/// duplicate-detector for votes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeId(pub u32);

/// A node's own transaction identifier. Opaque to the daemon; supplied by
/// clients, never minted here.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct LocalXid(pub u64);

/// Daemon-assigned monotonic identifier for a global transaction.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Gxid(pub u64);

impl Gxid {
    pub fn next(self) -> Gxid {
        Gxid(self.0 + 1)
    }
}
