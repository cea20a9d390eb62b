use crate::codes;
use crate::error_kind::ErrorKind;
use crate::ids::Gxid;
use crate::status::XidStatus;

/// A reply ready to be framed and written to a channel. `code()`/`payload()`
/// are what the dispatcher hands to the transport's `start/append/finish`
/// producer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Reply {
    Start { gxid: Gxid },
    Snapshot { xmin: u64, xmax: u64, xip: Vec<u64> },
    SetStatusTerminal { status: XidStatus },
    GetStatus { status: XidStatus },
    Error { kind: ErrorKind },
}

impl Reply {
    pub fn code(&self) -> u8 {
        match self {
            Reply::Start { .. } => codes::REQ_START,
            Reply::Snapshot { .. } => codes::REQ_SNAPSHOT,
            Reply::SetStatusTerminal { .. } => codes::REQ_SETSTATUS,
            Reply::GetStatus { .. } => codes::REQ_GETSTATUS,
            Reply::Error { .. } => codes::ERROR_REPLY,
        }
    }

    pub fn payload(&self) -> Vec<u8> {
        match self {
            Reply::Start { gxid } => gxid.0.to_le_bytes().to_vec(),
            Reply::Snapshot { xmin, xmax, xip } => {
                let mut buf = Vec::with_capacity(8 + 8 + 4 + xip.len() * 8);
                buf.extend_from_slice(&xmin.to_le_bytes());
                buf.extend_from_slice(&xmax.to_le_bytes());
                buf.extend_from_slice(&(xip.len() as u32).to_le_bytes());
                for g in xip {
                    buf.extend_from_slice(&g.to_le_bytes());
                }
                buf
            }
            Reply::SetStatusTerminal { status } => {
                vec![status.to_terminal_u8().expect("SetStatusTerminal reply built from a non-terminal status")]
            }
            Reply::GetStatus { status } => vec![status.to_getstatus_u8()],
            Reply::Error { kind } => vec![kind.to_u8()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_payload_layout() {
        let r = Reply::Snapshot { xmin: 1, xmax: 3, xip: vec![1, 2] };
        let payload = r.payload();
        assert_eq!(&payload[0..8], &1u64.to_le_bytes());
        assert_eq!(&payload[8..16], &3u64.to_le_bytes());
        assert_eq!(&payload[16..20], &2u32.to_le_bytes());
        assert_eq!(&payload[20..28], &1u64.to_le_bytes());
        assert_eq!(&payload[28..36], &2u64.to_le_bytes());
    }

    #[test]
    fn error_payload_is_one_byte() {
        let r = Reply::Error { kind: ErrorKind::UnknownXid };
        assert_eq!(r.payload(), vec![ErrorKind::UnknownXid.to_u8()]);
        assert_eq!(r.code(), codes::ERROR_REPLY);
    }

    #[test]
    #[should_panic]
    fn terminal_reply_rejects_inprogress() {
        let r = Reply::SetStatusTerminal { status: XidStatus::InProgress };
        let _ = r.payload();
    }
}
