/// A participant's vote on `REQ_SETSTATUS`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Vote {
    Commit,
    Abort,
}

impl Vote {
    pub fn from_u8(b: u8) -> Option<Vote> {
        match b {
            1 => Some(Vote::Commit),
            2 => Some(Vote::Abort),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Vote::Commit => 1,
            Vote::Abort => 2,
        }
    }
}

/// A `GlobalXid`'s state. Only `Committed` and `Aborted` are terminal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum XidStatus {
    InProgress,
    Committed,
    Aborted,
}

impl XidStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, XidStatus::InProgress)
    }

    /// Encoding used by `REQ_GETSTATUS` replies: `0=InProgress, 1=Committed, 2=Aborted`.
    pub fn to_getstatus_u8(self) -> u8 {
        match self {
            XidStatus::InProgress => 0,
            XidStatus::Committed => 1,
            XidStatus::Aborted => 2,
        }
    }

    /// Encoding used by terminal `REQ_SETSTATUS` replies, which are only ever
    /// sent once the status is terminal: `1=Committed, 2=Aborted`.
    pub fn to_terminal_u8(self) -> Option<u8> {
        match self {
            XidStatus::Committed => Some(1),
            XidStatus::Aborted => Some(2),
            XidStatus::InProgress => None,
        }
    }
}
