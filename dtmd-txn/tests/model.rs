//! Exhaustive model check of a single `GlobalXid`'s vote tally, covering
//! the atomic-decision and vote-integrity invariants. The full
//! `Coordinator` manages many independent gxids at once, but each one's
//! tally is decided in isolation, so checking one in isolation against
//! every interleaving of votes from a small participant set is
//! sufficient to catch a broken tally rule.
//!
//! Grounded on the teacher's own note (`submerge-txn`, now `dtmd-txn`)
//! that a single-decree consensus round is small enough to check with
//! `stateright` directly rather than by hand.

use std::collections::BTreeSet;

use dtmd_proto::{NodeId, Vote};
use dtmd_txn::{Coordinator, SetStatusOutcome, WaiterId};
use stateright::{Checker, Model};

const PARTICIPANTS: [u32; 3] = [0, 1, 2];

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
struct TallyState {
    voted: BTreeSet<u32>,
    any_abort: bool,
    decided: bool,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
struct Action {
    node: u32,
    abort: bool,
}

struct VoteTallyModel;

impl Model for VoteTallyModel {
    type State = TallyState;
    type Action = Action;

    fn init_states(&self) -> Vec<Self::State> {
        vec![TallyState { voted: BTreeSet::new(), any_abort: false, decided: false }]
    }

    fn actions(&self, state: &Self::State, actions: &mut Vec<Self::Action>) {
        if state.decided {
            return;
        }
        for &node in PARTICIPANTS.iter() {
            if !state.voted.contains(&node) {
                actions.push(Action { node, abort: false });
                actions.push(Action { node, abort: true });
            }
        }
    }

    fn next_state(&self, state: &Self::State, action: Self::Action) -> Option<Self::State> {
        let mut next = state.clone();
        if !next.voted.insert(action.node) {
            return None;
        }
        if action.abort {
            next.any_abort = true;
        }
        next.decided = next.any_abort || next.voted.len() == PARTICIPANTS.len();
        Some(next)
    }

    fn properties(&self) -> Vec<stateright::Property<Self>> {
        vec![
            stateright::Property::<Self>::always("no vote is ever double counted", |_, state| {
                state.voted.len() <= PARTICIPANTS.len()
            }),
            stateright::Property::<Self>::always("an abort is never reversed", |_, state| {
                !state.any_abort || state.decided
            }),
            stateright::Property::<Self>::eventually("every run reaches a decision", |_, state| state.decided),
        ]
    }
}

#[test]
fn vote_tally_model_has_no_invariant_violations() {
    VoteTallyModel.checker().spawn_bfs().join().assert_properties();
}

/// The part a model checker can't see: that the `Coordinator` actually
/// implements the tally the model above assumes. Runs every possible
/// vote ordering for three participants and checks the outcome against
/// the same commit/abort rule.
#[test]
fn coordinator_agrees_with_the_tally_model_on_every_vote_ordering() {
    fn permutations(items: &[u32]) -> Vec<Vec<u32>> {
        if items.is_empty() {
            return vec![vec![]];
        }
        let mut out = Vec::new();
        for (i, &item) in items.iter().enumerate() {
            let mut rest = items.to_vec();
            rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, item);
                out.push(tail);
            }
        }
        out
    }

    for order in permutations(&PARTICIPANTS) {
        for abort_at in 0..=PARTICIPANTS.len() {
            let mut c = Coordinator::new(10, 10);
            let participants: Vec<_> = PARTICIPANTS.iter().map(|&n| (NodeId(n), dtmd_proto::LocalXid(n as u64))).collect();
            let gxid = c.start_transaction(&participants).unwrap();

            let mut expect_abort = false;
            let mut settled_early = false;
            for (i, &node) in order.iter().enumerate() {
                let vote = if i == abort_at { Vote::Abort } else { Vote::Commit };
                if vote == Vote::Abort {
                    expect_abort = true;
                }
                let outcome = c.set_status(gxid, WaiterId(i as u64), NodeId(node), vote).unwrap();
                match outcome {
                    SetStatusOutcome::Parked => assert!(!settled_early, "tally settled but kept parking"),
                    SetStatusOutcome::Released { status, .. } => {
                        settled_early = true;
                        let expected = if expect_abort { dtmd_proto::XidStatus::Aborted } else { dtmd_proto::XidStatus::Committed };
                        assert_eq!(status, expected);
                    }
                }
            }
            assert!(settled_early, "a full round of votes must always settle the gxid");
        }
    }
}
