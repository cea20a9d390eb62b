use crate::codes;
use crate::error_kind::ErrorKind;
use crate::ids::{Gxid, LocalXid, NodeId};
use crate::status::Vote;

/// A decoded, typed request. Carries everything the coordinator needs;
/// the dispatcher never re-reads the raw payload after this point.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    Start { participants: Vec<(NodeId, LocalXid)> },
    Snapshot { gxid: Gxid },
    SetStatus { gxid: Gxid, node: NodeId, vote: Vote },
    GetStatus { gxid: Gxid },
    Disconnect,
}

fn read_u32(buf: &[u8], at: usize) -> Option<u32> {
    buf.get(at..at + 4).map(|s| u32::from_le_bytes(s.try_into().unwrap()))
}

fn read_u64(buf: &[u8], at: usize) -> Option<u64> {
    buf.get(at..at + 8).map(|s| u64::from_le_bytes(s.try_into().unwrap()))
}

impl Command {
    /// Parses a command out of a frame's `(code, payload)`. The payload is
    /// assumed to already have passed the transport's buffer-capacity
    /// check; this only validates the command's own shape.
    pub fn decode(code: u8, payload: &[u8]) -> Result<Command, ErrorKind> {
        match code {
            codes::REQ_START => decode_start(payload),
            codes::REQ_SNAPSHOT => decode_gxid_only(payload).map(|gxid| Command::Snapshot { gxid }),
            codes::REQ_SETSTATUS => decode_setstatus(payload),
            codes::REQ_GETSTATUS => decode_gxid_only(payload).map(|gxid| Command::GetStatus { gxid }),
            codes::MSG_DISCONNECT => {
                if payload.is_empty() {
                    Ok(Command::Disconnect)
                } else {
                    Err(ErrorKind::MalformedRequest)
                }
            }
            _ => Err(ErrorKind::MalformedRequest),
        }
    }
}

fn decode_gxid_only(payload: &[u8]) -> Result<Gxid, ErrorKind> {
    if payload.len() != 8 {
        return Err(ErrorKind::MalformedRequest);
    }
    Ok(Gxid(read_u64(payload, 0).ok_or(ErrorKind::MalformedRequest)?))
}

/// Payload: `u64 gxid, u32 NodeId, u8 vote`. The NodeId field is an
/// addition over the literal byte layout in the wire-contract section: the
/// duplicate-vote and vote-integrity rules require knowing which
/// participant cast a given vote, and a gxid+vote pair alone can't carry
/// that. See DESIGN.md for the resolution.
fn decode_setstatus(payload: &[u8]) -> Result<Command, ErrorKind> {
    if payload.len() != 13 {
        return Err(ErrorKind::MalformedRequest);
    }
    let gxid = Gxid(read_u64(payload, 0).ok_or(ErrorKind::MalformedRequest)?);
    let node = NodeId(read_u32(payload, 8).ok_or(ErrorKind::MalformedRequest)?);
    let vote = Vote::from_u8(payload[12]).ok_or(ErrorKind::MalformedRequest)?;
    Ok(Command::SetStatus { gxid, node, vote })
}

fn decode_start(payload: &[u8]) -> Result<Command, ErrorKind> {
    let n = read_u32(payload, 0).ok_or(ErrorKind::MalformedRequest)? as usize;
    let expected_len = 4 + n * 12;
    if payload.len() != expected_len {
        return Err(ErrorKind::MalformedRequest);
    }
    if n == 0 {
        return Err(ErrorKind::MalformedRequest);
    }
    let mut participants = Vec::with_capacity(n);
    let mut seen = std::collections::HashSet::with_capacity(n);
    for i in 0..n {
        let base = 4 + i * 12;
        let node = NodeId(read_u32(payload, base).ok_or(ErrorKind::MalformedRequest)?);
        let local = LocalXid(read_u64(payload, base + 4).ok_or(ErrorKind::MalformedRequest)?);
        if !seen.insert(node) {
            return Err(ErrorKind::MalformedRequest);
        }
        participants.push((node, local));
    }
    Ok(Command::Start { participants })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start_payload(pairs: &[(u32, u64)]) -> Vec<u8> {
        let mut buf = (pairs.len() as u32).to_le_bytes().to_vec();
        for (node, local) in pairs {
            buf.extend_from_slice(&node.to_le_bytes());
            buf.extend_from_slice(&local.to_le_bytes());
        }
        buf
    }

    #[test]
    fn decodes_start_with_participants() {
        let payload = start_payload(&[(0, 100), (1, 200)]);
        let cmd = Command::decode(codes::REQ_START, &payload).unwrap();
        assert_eq!(
            cmd,
            Command::Start {
                participants: vec![(NodeId(0), LocalXid(100)), (NodeId(1), LocalXid(200))]
            }
        );
    }

    #[test]
    fn rejects_empty_participant_list() {
        let payload = start_payload(&[]);
        assert_eq!(Command::decode(codes::REQ_START, &payload), Err(ErrorKind::MalformedRequest));
    }

    #[test]
    fn rejects_duplicate_node_id() {
        let payload = start_payload(&[(0, 100), (0, 200)]);
        assert_eq!(Command::decode(codes::REQ_START, &payload), Err(ErrorKind::MalformedRequest));
    }

    #[test]
    fn rejects_truncated_start_payload() {
        let mut payload = start_payload(&[(0, 100)]);
        payload.pop();
        assert_eq!(Command::decode(codes::REQ_START, &payload), Err(ErrorKind::MalformedRequest));
    }

    #[test]
    fn decodes_snapshot_and_getstatus() {
        let payload = 42u64.to_le_bytes();
        assert_eq!(Command::decode(codes::REQ_SNAPSHOT, &payload).unwrap(), Command::Snapshot { gxid: Gxid(42) });
        assert_eq!(Command::decode(codes::REQ_GETSTATUS, &payload).unwrap(), Command::GetStatus { gxid: Gxid(42) });
    }

    fn setstatus_payload(gxid: u64, node: u32, vote: u8) -> Vec<u8> {
        let mut buf = gxid.to_le_bytes().to_vec();
        buf.extend_from_slice(&node.to_le_bytes());
        buf.push(vote);
        buf
    }

    #[test]
    fn decodes_setstatus() {
        let payload = setstatus_payload(7, 0, 1);
        assert_eq!(
            Command::decode(codes::REQ_SETSTATUS, &payload).unwrap(),
            Command::SetStatus { gxid: Gxid(7), node: NodeId(0), vote: Vote::Commit }
        );
    }

    #[test]
    fn rejects_bad_vote_byte() {
        let payload = setstatus_payload(7, 0, 9);
        assert_eq!(Command::decode(codes::REQ_SETSTATUS, &payload), Err(ErrorKind::MalformedRequest));
    }

    #[test]
    fn rejects_unknown_code() {
        assert_eq!(Command::decode(0x77, &[]), Err(ErrorKind::MalformedRequest));
    }

    #[test]
    fn disconnect_has_no_payload() {
        assert_eq!(Command::decode(codes::MSG_DISCONNECT, &[]), Ok(Command::Disconnect));
        assert_eq!(Command::decode(codes::MSG_DISCONNECT, &[0]), Err(ErrorKind::MalformedRequest));
    }
}
