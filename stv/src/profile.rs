// Copyright 2021-2022 Andrew Conway.
// This file is part of ConcreteSTV.
// ConcreteSTV is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// ConcreteSTV is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with ConcreteSTV.  If not, see <https://www.gnu.org/licenses/>.


//! The immutable ballot profile a count runs against: candidates, withdrawals and
//! ranked ballots with multiplicity. Shared read-only by the `Election` for the
//! lifetime of a count.

use std::collections::HashSet;
use std::fmt;
use serde::{Serialize, Deserialize};
use crate::error::{StvError, StvResult};

/// A candidate, referred to by position in the candidate list, 0 being first.
/// Also doubles as ballot-file order for tie-breaking (§9: "encode ballot-file
/// order as an integer on the candidate").
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidateIndex(pub usize);

impl fmt::Display for CandidateIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.0) }
}
impl fmt::Debug for CandidateIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "#{}", self.0) }
}

/// Static information about one candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
}

/// An immutable ranked ballot with multiplicity. No duplicate candidate ids within
/// a ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ballot {
    pub multiplicity: u64,
    pub ranking: Vec<CandidateIndex>,
}

/// `(S, candidates[], withdrawn⊆candidates, ballots[])`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub seats: usize,
    pub candidates: Vec<Candidate>,
    pub withdrawn: HashSet<CandidateIndex>,
    pub ballots: Vec<Ballot>,
}

impl Profile {
    pub fn num_candidates(&self) -> usize { self.candidates.len() }

    pub fn candidate_indices(&self) -> impl Iterator<Item = CandidateIndex> {
        (0..self.candidates.len()).map(CandidateIndex)
    }

    pub fn candidate(&self, c: CandidateIndex) -> &Candidate { &self.candidates[c.0] }

    pub fn is_withdrawn(&self, c: CandidateIndex) -> bool { self.withdrawn.contains(&c) }

    /// `N = Σ m_b`, the total ballot count.
    pub fn total_ballots(&self) -> u64 { self.ballots.iter().map(|b| b.multiplicity).sum() }

    /// The first candidate in the ballot's ranking that is not withdrawn, used for
    /// round-0 assignment (Meek reporting, WIGM initial top-rank). `None` if every
    /// ranked candidate is withdrawn (the ballot is exhausted from the outset).
    pub fn top_cand(&self, ballot: &Ballot) -> Option<CandidateIndex> {
        ballot.ranking.iter().copied().find(|&c| !self.is_withdrawn(c))
    }

    /// Validate the invariants §4.B and §3 require before a count may begin.
    pub fn validate(&self) -> StvResult<()> {
        if self.seats < 1 {
            return Err(StvError::ElectionError("seats (S) must be at least 1".to_string()));
        }
        if self.total_ballots() < 1 {
            return Err(StvError::ProfileError("profile has no ballots (N must be at least 1)".to_string()));
        }
        let n = self.candidates.len();
        for b in &self.ballots {
            if b.multiplicity < 1 {
                return Err(StvError::ProfileError("ballot multiplicity must be at least 1".to_string()));
            }
            let mut seen = HashSet::with_capacity(b.ranking.len());
            for &c in &b.ranking {
                if c.0 >= n {
                    return Err(StvError::ProfileError(format!("ballot references unknown candidate {c}")));
                }
                if !seen.insert(c) {
                    return Err(StvError::ProfileError(format!("ballot lists candidate {c} more than once")));
                }
            }
        }
        for &c in &self.withdrawn {
            if c.0 >= n {
                return Err(StvError::ProfileError(format!("withdrawn set references unknown candidate {c}")));
            }
        }
        if self.withdrawn.len() == n {
            return Err(StvError::ElectionError("all candidates are withdrawn".to_string()));
        }
        Ok(())
    }
}
