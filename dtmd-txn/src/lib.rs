//! The coordinator: the single piece of mutable state in the daemon.
//!
//! There is exactly one `Coordinator` per running daemon, driven entirely
//! from the event loop thread, so nothing here takes a lock. Every
//! `GlobalXid` a client starts lives in `table` until it reaches a
//! terminal status (`Committed`/`Aborted`) and every parked waiter on it
//! has been released, at which point it becomes eligible for pruning.
//!
//! Waiters are tracked opaquely: a `WaiterId` means nothing to this crate
//! beyond being a value to hand back in `SetStatusOutcome::Released`. The
//! dispatcher decides what a `WaiterId` actually is (typically a
//! connection/channel pair) and is responsible for remembering which
//! `GlobalXid` each of its parked connections is waiting on.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use dtmd_proto::{ErrorKind, Gxid, LocalXid, NodeId, Vote, XidStatus};
use tracing::trace;

/// Opaque identifier for a parked `REQ_SETSTATUS` caller. The coordinator
/// never interprets this; it only stores it and hands it back.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct WaiterId(pub u64);

/// A snapshot handed back from `REQ_SNAPSHOT`, per the concurrency-
/// control invariants: `xmin` is the oldest `GlobalXid` that might still
/// be in progress, `xmax` is the value to assign the next transaction,
/// and `xip` lists the gxids that are currently in progress and therefore
/// invisible to a snapshot taken at this instant.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Snapshot {
    pub xmin: u64,
    pub xmax: u64,
    pub xip: Vec<u64>,
}

/// Result of tallying one vote.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SetStatusOutcome {
    /// The vote was recorded but the `GlobalXid` is still waiting on
    /// other participants. Nothing is owed to any caller yet.
    Parked,
    /// This vote was the one that settled the outcome (either it was an
    /// abort, or it was the last commit vote needed). `waiters` is every
    /// `WaiterId` parked on this gxid, including the one that just voted;
    /// all of them should be woken with `status`.
    Released { status: XidStatus, waiters: Vec<WaiterId> },
}

#[derive(Clone, Debug)]
struct GlobalXidEntry {
    participants: BTreeSet<NodeId>,
    voted: BTreeSet<NodeId>,
    any_abort: bool,
    status: XidStatus,
    waiters: Vec<WaiterId>,
}

impl GlobalXidEntry {
    fn new(participants: BTreeSet<NodeId>) -> Self {
        GlobalXidEntry { participants, voted: BTreeSet::new(), any_abort: false, status: XidStatus::InProgress, waiters: Vec::new() }
    }
}

/// The coordinator's full state: the `GlobalXid` table, the monotonic
/// counter that hands out new ones, and a bounded queue of drained
/// terminal entries used to cap the table's size.
pub struct Coordinator {
    capacity: usize,
    next_gxid: u64,
    table: BTreeMap<u64, GlobalXidEntry>,
    in_progress: BTreeSet<u64>,
    retention_window: usize,
    drained_terminal: VecDeque<u64>,
}

impl Coordinator {
    /// `capacity` bounds the number of `GlobalXid`s live in `table` at
    /// once (in-progress plus not-yet-pruned terminal entries).
    /// `retention_window` bounds how many drained terminal entries are
    /// kept around before the oldest is pruned, so a slow client that
    /// asks `REQ_GETSTATUS` for a gxid long after it settled gets
    /// `UnknownXid` rather than unbounded memory growth.
    pub fn new(capacity: usize, retention_window: usize) -> Self {
        Coordinator {
            capacity,
            next_gxid: 1,
            table: BTreeMap::new(),
            in_progress: BTreeSet::new(),
            retention_window,
            drained_terminal: VecDeque::new(),
        }
    }

    /// Starts a new global transaction. `participants` must be non-empty
    /// and contain no duplicate `NodeId`; the wire decoder already
    /// enforces this, but callers that build `Command`s directly (tests,
    /// the model checker) get the same check here.
    pub fn start_transaction(&mut self, participants: &[(NodeId, LocalXid)]) -> Result<Gxid, ErrorKind> {
        if participants.is_empty() {
            return Err(ErrorKind::MalformedRequest);
        }
        let mut nodes = BTreeSet::new();
        for (node, _) in participants {
            if !nodes.insert(*node) {
                return Err(ErrorKind::MalformedRequest);
            }
        }
        if self.table.len() >= self.capacity {
            return Err(ErrorKind::CapacityExhausted);
        }
        let gxid = self.next_gxid;
        self.next_gxid += 1;
        self.table.insert(gxid, GlobalXidEntry::new(nodes));
        self.in_progress.insert(gxid);
        trace!(gxid, participants = participants.len(), "started global transaction");
        Ok(Gxid(gxid))
    }

    /// Builds a snapshot as of right now. `xip` excludes the requesting
    /// gxid itself, per the snapshot-isolation rule that a transaction
    /// always sees its own writes.
    pub fn get_snapshot(&self, gxid: Gxid) -> Result<Snapshot, ErrorKind> {
        if !self.table.contains_key(&gxid.0) {
            return Err(ErrorKind::UnknownXid);
        }
        let xmax = self.next_gxid;
        let xip: Vec<u64> = self.in_progress.iter().copied().filter(|&g| g != gxid.0).collect();
        let xmin = xip.iter().copied().min().unwrap_or(xmax);
        Ok(Snapshot { xmin, xmax, xip })
    }

    pub fn get_status(&self, gxid: Gxid) -> Result<XidStatus, ErrorKind> {
        self.table.get(&gxid.0).map(|e| e.status).ok_or(ErrorKind::UnknownXid)
    }

    /// Records one participant's vote. A second vote from a `NodeId` that
    /// already voted on this gxid is rejected as `DuplicateVote` without
    /// disturbing the tally or parking another waiter for it.
    pub fn set_status(&mut self, gxid: Gxid, waiter: WaiterId, node: NodeId, vote: Vote) -> Result<SetStatusOutcome, ErrorKind> {
        let entry = self.table.get_mut(&gxid.0).ok_or(ErrorKind::UnknownXid)?;
        if entry.status.is_terminal() {
            return Err(ErrorKind::UnknownXid);
        }
        if !entry.voted.insert(node) {
            return Err(ErrorKind::DuplicateVote);
        }
        entry.waiters.push(waiter);
        if vote == Vote::Abort {
            entry.any_abort = true;
        }
        let all_voted = entry.voted.len() == entry.participants.len();
        let decided = entry.any_abort || all_voted;
        if !decided {
            return Ok(SetStatusOutcome::Parked);
        }
        let status = if entry.any_abort { XidStatus::Aborted } else { XidStatus::Committed };
        entry.status = status;
        let waiters = std::mem::take(&mut entry.waiters);
        self.in_progress.remove(&gxid.0);
        self.drain_terminal(gxid.0);
        trace!(gxid = gxid.0, ?status, woken = waiters.len(), "global transaction settled");
        Ok(SetStatusOutcome::Released { status, waiters })
    }

    fn drain_terminal(&mut self, gxid: u64) {
        self.drained_terminal.push_back(gxid);
        while self.drained_terminal.len() > self.retention_window {
            if let Some(old) = self.drained_terminal.pop_front() {
                self.table.remove(&old);
            }
        }
    }
}
