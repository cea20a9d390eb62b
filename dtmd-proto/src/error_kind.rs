/// Per-request failures. These are ordinary values carried back to the
/// wire in the `0xFF` error envelope — never `dtmd_base::Error` — because
/// the requesting channel's connection stays open and the client is
/// expected to act on them (retry, fix its request, back off).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    MalformedRequest,
    UnknownXid,
    DuplicateVote,
    CapacityExhausted,
    InternalError,
}

impl ErrorKind {
    pub fn to_u8(self) -> u8 {
        match self {
            ErrorKind::MalformedRequest => 1,
            ErrorKind::UnknownXid => 2,
            ErrorKind::DuplicateVote => 3,
            ErrorKind::CapacityExhausted => 4,
            ErrorKind::InternalError => 5,
        }
    }

    pub fn from_u8(b: u8) -> Option<ErrorKind> {
        match b {
            1 => Some(ErrorKind::MalformedRequest),
            2 => Some(ErrorKind::UnknownXid),
            3 => Some(ErrorKind::DuplicateVote),
            4 => Some(ErrorKind::CapacityExhausted),
            5 => Some(ErrorKind::InternalError),
            _ => None,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::MalformedRequest => "malformed request",
            ErrorKind::UnknownXid => "unknown gxid",
            ErrorKind::DuplicateVote => "duplicate vote",
            ErrorKind::CapacityExhausted => "capacity exhausted",
            ErrorKind::InternalError => "internal error",
        };
        f.write_str(s)
    }
}
