//! Wires a decoded wire `Command` to the `Coordinator` and turns the
//! result back into a `Reply`. This is where `dtmd-proto`, `dtmd-txn`,
//! and `dtmd-net`'s `ConnId` meet; none of the three crates know about
//! each other.

use dtmd_net::ConnId;
use dtmd_proto::{Command, Reply};
use dtmd_txn::{Coordinator, SetStatusOutcome, WaiterId};

/// What the event loop should do after a frame was dispatched.
pub enum DispatchOutcome {
    /// Send `reply` back on the same channel the request came in on.
    Reply(Reply),
    /// The request (a vote) was recorded but the transaction isn't
    /// decided yet; nothing is sent back and the channel stays
    /// occupied until a later `Released`.
    Parked,
    /// The vote just recorded decided the transaction. `reply` goes to
    /// every one of `waiters`, on whichever channel each was parked on.
    Released { reply: Reply, waiters: Vec<(ConnId, u32)> },
    /// The client asked to release the channel it sent this on; the
    /// event loop should free that one channel, not the whole
    /// connection, and send nothing back.
    Disconnect,
}

pub struct Dispatcher {
    coordinator: Coordinator,
}

impl Dispatcher {
    pub fn new(capacity: usize, retention_window: usize) -> Self {
        Dispatcher { coordinator: Coordinator::new(capacity, retention_window) }
    }

    /// Decodes and dispatches one frame's payload. `conn`/`channel`
    /// identify where a parked vote should be woken later.
    pub fn handle_frame(&mut self, conn: ConnId, channel: u32, code: u8, payload: &[u8]) -> DispatchOutcome {
        let command = match Command::decode(code, payload) {
            Ok(command) => command,
            Err(kind) => return DispatchOutcome::Reply(Reply::Error { kind }),
        };
        match command {
            Command::Start { participants } => match self.coordinator.start_transaction(&participants) {
                Ok(gxid) => DispatchOutcome::Reply(Reply::Start { gxid }),
                Err(kind) => DispatchOutcome::Reply(Reply::Error { kind }),
            },
            Command::Snapshot { gxid } => match self.coordinator.get_snapshot(gxid) {
                Ok(snap) => DispatchOutcome::Reply(Reply::Snapshot { xmin: snap.xmin, xmax: snap.xmax, xip: snap.xip }),
                Err(kind) => DispatchOutcome::Reply(Reply::Error { kind }),
            },
            Command::GetStatus { gxid } => match self.coordinator.get_status(gxid) {
                Ok(status) => DispatchOutcome::Reply(Reply::GetStatus { status }),
                Err(kind) => DispatchOutcome::Reply(Reply::Error { kind }),
            },
            Command::SetStatus { gxid, node, vote } => {
                let waiter = encode_waiter(conn, channel);
                match self.coordinator.set_status(gxid, waiter, node, vote) {
                    Ok(SetStatusOutcome::Parked) => DispatchOutcome::Parked,
                    Ok(SetStatusOutcome::Released { status, waiters }) => DispatchOutcome::Released {
                        reply: Reply::SetStatusTerminal { status },
                        waiters: waiters.into_iter().map(decode_waiter).collect(),
                    },
                    Err(kind) => DispatchOutcome::Reply(Reply::Error { kind }),
                }
            }
            Command::Disconnect => DispatchOutcome::Disconnect,
        }
    }
}

/// Packs a connection handle and channel id into the opaque `WaiterId`
/// the coordinator stores. `channel` is constrained to `0..256` by the
/// transport, so the low byte is enough; the rest of the value is the
/// connection's slab index, which is never expected to reach 2^56
/// simultaneously open connections.
fn encode_waiter(conn: ConnId, channel: u32) -> WaiterId {
    WaiterId(((conn.index() as u64) << 8) | u64::from(channel & 0xff))
}

fn decode_waiter(waiter: WaiterId) -> (ConnId, u32) {
    let channel = (waiter.0 & 0xff) as u32;
    let conn = ConnId::from_index((waiter.0 >> 8) as usize);
    (conn, channel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtmd_proto::{codes, Vote};

    fn start_payload(nodes: &[u32]) -> Vec<u8> {
        let mut buf = (nodes.len() as u32).to_le_bytes().to_vec();
        for &n in nodes {
            buf.extend_from_slice(&n.to_le_bytes());
            buf.extend_from_slice(&(n as u64).to_le_bytes());
        }
        buf
    }

    fn setstatus_payload(gxid: u64, node: u32, vote: Vote) -> Vec<u8> {
        let mut buf = gxid.to_le_bytes().to_vec();
        buf.extend_from_slice(&node.to_le_bytes());
        buf.push(vote.to_u8());
        buf
    }

    #[test]
    fn start_then_snapshot_then_vote_to_commit() {
        let mut d = Dispatcher::new(10, 10);
        let conn = ConnId::from_index(3);

        let outcome = d.handle_frame(conn, 0, codes::REQ_START, &start_payload(&[0, 1]));
        let gxid = match outcome {
            DispatchOutcome::Reply(Reply::Start { gxid }) => gxid,
            _ => panic!("expected a Start reply"),
        };

        let snap_payload = gxid.0.to_le_bytes();
        match d.handle_frame(conn, 1, codes::REQ_SNAPSHOT, &snap_payload) {
            DispatchOutcome::Reply(Reply::Snapshot { xip, .. }) => assert!(xip.is_empty()),
            _ => panic!("expected a Snapshot reply"),
        }

        match d.handle_frame(conn, 2, codes::REQ_SETSTATUS, &setstatus_payload(gxid.0, 0, Vote::Commit)) {
            DispatchOutcome::Parked => {}
            _ => panic!("expected the first vote to park"),
        }

        match d.handle_frame(conn, 3, codes::REQ_SETSTATUS, &setstatus_payload(gxid.0, 1, Vote::Commit)) {
            DispatchOutcome::Released { reply: Reply::SetStatusTerminal { status }, waiters } => {
                assert_eq!(status, dtmd_proto::XidStatus::Committed);
                assert_eq!(waiters.len(), 2);
                assert!(waiters.contains(&(conn, 2)));
                assert!(waiters.contains(&(conn, 3)));
            }
            _ => panic!("expected the deciding vote to release both waiters"),
        }
    }

    #[test]
    fn malformed_payload_becomes_an_error_reply() {
        let mut d = Dispatcher::new(10, 10);
        let conn = ConnId::from_index(0);
        match d.handle_frame(conn, 0, codes::REQ_START, &[]) {
            DispatchOutcome::Reply(Reply::Error { kind }) => assert_eq!(kind, dtmd_proto::ErrorKind::MalformedRequest),
            _ => panic!("expected an error reply"),
        }
    }

    #[test]
    fn disconnect_command_is_recognized() {
        let mut d = Dispatcher::new(10, 10);
        let conn = ConnId::from_index(0);
        assert!(matches!(d.handle_frame(conn, 0, codes::MSG_DISCONNECT, &[]), DispatchOutcome::Disconnect));
    }
}
