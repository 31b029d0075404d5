// Copyright 2021-2022 Andrew Conway.
// This file is part of ConcreteSTV.
// ConcreteSTV is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// ConcreteSTV is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with ConcreteSTV.  If not, see <https://www.gnu.org/licenses/>.


//! Per-round candidate-state snapshots and the append-only round history (§3, §4.C).
//! Rounds are value-typed and immutable once a later round exists; the only legal
//! status transitions are `elect`, `defeat`, `pend` and `unpend`, each of which
//! writes a log entry.

use serde::{Serialize, Deserialize};
use crate::arithmetic::Arithmetic;
use crate::profile::{CandidateIndex, Profile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateStatus {
    Withdrawn,
    Hopeful,
    Pending,
    Elected,
    Defeated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateState<V> {
    pub index: CandidateIndex,
    pub status: CandidateStatus,
    pub vote: V,
    /// Meek only; `V0` for withdrawn/defeated, `V1` for a fresh hopeful.
    pub kf: V,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Elect,
    Defeat,
    Pend,
    Unpend,
    Transfer,
    Tie,
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub kind: ActionKind,
    pub candidate: Option<CandidateIndex>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round<V> {
    pub n: usize,
    pub quota: V,
    pub votes: V,
    pub surplus: V,
    pub residual: V,
    pub candidates: Vec<CandidateState<V>>,
    pub log: Vec<LogEntry>,
}

impl<V: Clone> Round<V> {
    pub fn candidate(&self, c: CandidateIndex) -> &CandidateState<V> { &self.candidates[c.0] }
    pub fn candidate_mut(&mut self, c: CandidateIndex) -> &mut CandidateState<V> { &mut self.candidates[c.0] }
    pub fn status(&self, c: CandidateIndex) -> CandidateStatus { self.candidates[c.0].status }

    fn filter_status(&self, status: CandidateStatus) -> Vec<CandidateIndex> {
        self.candidates.iter().filter(|cs| cs.status == status).map(|cs| cs.index).collect()
    }

    pub fn hopeful(&self) -> Vec<CandidateIndex> { self.filter_status(CandidateStatus::Hopeful) }
    pub fn elected(&self) -> Vec<CandidateIndex> { self.filter_status(CandidateStatus::Elected) }
    pub fn pending(&self) -> Vec<CandidateIndex> { self.filter_status(CandidateStatus::Pending) }
    pub fn defeated(&self) -> Vec<CandidateIndex> { self.filter_status(CandidateStatus::Defeated) }
    pub fn withdrawn(&self) -> Vec<CandidateIndex> { self.filter_status(CandidateStatus::Withdrawn) }

    pub fn hopeful_or_elected(&self) -> Vec<CandidateIndex> {
        self.candidates.iter().filter(|cs| matches!(cs.status, CandidateStatus::Hopeful | CandidateStatus::Elected)).map(|cs| cs.index).collect()
    }
    pub fn hopeful_or_pending(&self) -> Vec<CandidateIndex> {
        self.candidates.iter().filter(|cs| matches!(cs.status, CandidateStatus::Hopeful | CandidateStatus::Pending)).map(|cs| cs.index).collect()
    }

    /// `S − |elected| − |pending|`.
    pub fn seats_left_to_fill(&self, seats: usize) -> i64 {
        seats as i64 - self.elected().len() as i64 - self.pending().len() as i64
    }

    /// `|hopeful| ≤ seatsLeftToFill()` or `seatsLeftToFill() ≤ 0`.
    pub fn terminated(&self, seats: usize) -> bool {
        let left = self.seats_left_to_fill(seats);
        self.hopeful().len() as i64 <= left || left <= 0
    }

    fn log_entry(&mut self, kind: ActionKind, candidate: Option<CandidateIndex>, message: impl Into<String>) {
        self.log.push(LogEntry { kind, candidate, message: message.into() });
    }

    pub fn elect(&mut self, c: CandidateIndex, msg: impl Into<String>) {
        let msg = msg.into();
        self.candidate_mut(c).status = CandidateStatus::Elected;
        self.log_entry(ActionKind::Elect, Some(c), msg);
    }
    pub fn defeat(&mut self, c: CandidateIndex, msg: impl Into<String>) {
        let msg = msg.into();
        self.candidate_mut(c).status = CandidateStatus::Defeated;
        self.log_entry(ActionKind::Defeat, Some(c), msg);
    }
    pub fn pend(&mut self, c: CandidateIndex, msg: impl Into<String>) {
        let msg = msg.into();
        self.candidate_mut(c).status = CandidateStatus::Pending;
        self.log_entry(ActionKind::Pend, Some(c), msg);
    }
    pub fn unpend(&mut self, c: CandidateIndex, msg: impl Into<String>) {
        let msg = msg.into();
        self.candidate_mut(c).status = CandidateStatus::Hopeful;
        self.log_entry(ActionKind::Unpend, Some(c), msg);
    }
    pub fn transfer(&mut self, c: Option<CandidateIndex>, msg: impl Into<String>) {
        let msg = msg.into();
        self.log_entry(ActionKind::Transfer, c, msg);
    }
    pub fn tie(&mut self, c: Option<CandidateIndex>, msg: impl Into<String>) {
        let msg = msg.into();
        self.log_entry(ActionKind::Tie, c, msg);
    }
    pub fn note(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        self.log_entry(ActionKind::Log, None, msg);
    }

    /// Clone candidate statuses/votes into a fresh round, ready for the counter to mutate.
    pub fn new_round(&self, zero: V) -> Round<V> {
        Round {
            n: self.n + 1,
            quota: zero.clone(),
            votes: zero.clone(),
            surplus: zero.clone(),
            residual: zero,
            candidates: self.candidates.clone(),
            log: Vec::new(),
        }
    }
}

/// Ballot-file order is a total order by construction: sort by index.
pub fn sort_by_order(cs: &mut [CandidateIndex]) { cs.sort(); }

/// Identical to [`sort_by_order`] (§4.C: "`byTieOrder` identical to `sortByOrder`").
pub fn by_tie_order(cs: &mut [CandidateIndex]) { sort_by_order(cs); }

/// Ascending by vote, ties broken by ballot-file order.
pub fn sort_by_vote<A: Arithmetic>(arith: &A, round: &Round<A::V>, cs: &mut [CandidateIndex]) {
    cs.sort_by(|&a, &b| arith.cmp(&round.candidate(a).vote, &round.candidate(b).vote).then(a.cmp(&b)));
}

/// The outcome of one count: owns the profile and the append-only round history.
#[derive(Debug, Clone)]
pub struct Election<A: Arithmetic> {
    pub profile: Profile,
    pub arith: A,
    pub rounds: Vec<Round<A::V>>,
}

impl<A: Arithmetic> Election<A> {
    pub fn current(&self) -> &Round<A::V> { self.rounds.last().expect("election always has round 0") }
    pub fn current_mut(&mut self) -> &mut Round<A::V> { self.rounds.last_mut().expect("election always has round 0") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arithmetic::FixedArithmetic;

    fn round_with(statuses: &[(CandidateStatus, i128)]) -> Round<i128> {
        Round {
            n: 0,
            quota: 0,
            votes: 0,
            surplus: 0,
            residual: 0,
            candidates: statuses.iter().enumerate().map(|(i, &(status, vote))| CandidateState { index: CandidateIndex(i), status, vote, kf: 0 }).collect(),
            log: Vec::new(),
        }
    }

    #[test]
    fn seats_left_to_fill_counts_elected_and_pending() {
        let r = round_with(&[(CandidateStatus::Elected, 10), (CandidateStatus::Pending, 5), (CandidateStatus::Hopeful, 1)]);
        assert_eq!(r.seats_left_to_fill(3), 1);
        assert_eq!(r.seats_left_to_fill(2), 0);
    }

    #[test]
    fn terminated_when_hopefuls_fit_remaining_seats() {
        let r = round_with(&[(CandidateStatus::Elected, 10), (CandidateStatus::Hopeful, 1), (CandidateStatus::Hopeful, 1)]);
        assert!(r.terminated(3));
        let r2 = round_with(&[(CandidateStatus::Hopeful, 1), (CandidateStatus::Hopeful, 1), (CandidateStatus::Hopeful, 1)]);
        assert!(!r2.terminated(2));
    }

    #[test]
    fn elect_and_defeat_write_log_entries() {
        let mut r = round_with(&[(CandidateStatus::Hopeful, 10)]);
        r.elect(CandidateIndex(0), "Elected: quota reached");
        assert_eq!(r.status(CandidateIndex(0)), CandidateStatus::Elected);
        assert_eq!(r.log.len(), 1);
        assert_eq!(r.log[0].kind, ActionKind::Elect);
    }

    #[test]
    fn sort_by_vote_breaks_ties_by_ballot_order() {
        let arith = FixedArithmetic::new(0).unwrap();
        let r = round_with(&[(CandidateStatus::Hopeful, 5), (CandidateStatus::Hopeful, 5), (CandidateStatus::Hopeful, 3)]);
        let mut cs = vec![CandidateIndex(0), CandidateIndex(1), CandidateIndex(2)];
        sort_by_vote(&arith, &r, &mut cs);
        assert_eq!(cs, vec![CandidateIndex(2), CandidateIndex(0), CandidateIndex(1)]);
    }

    #[test]
    fn new_round_clones_state_and_resets_log() {
        let mut r = round_with(&[(CandidateStatus::Hopeful, 7)]);
        r.elect(CandidateIndex(0), "x");
        let next = r.new_round(0);
        assert_eq!(next.n, 1);
        assert!(next.log.is_empty());
        assert_eq!(next.candidate(CandidateIndex(0)).status, CandidateStatus::Elected);
        assert_eq!(next.candidate(CandidateIndex(0)).vote, 7);
    }
}
