// Copyright 2021-2022 Andrew Conway.
// This file is part of ConcreteSTV.
// ConcreteSTV is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// ConcreteSTV is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with ConcreteSTV.  If not, see <https://www.gnu.org/licenses/>.


//! The `batchDefeat(surplus)` grouping argument shared by Meek (§4.D) and WIGM (§4.E):
//! identifies "sure losers" — hopefuls that even all undistributed surplus cannot lift
//! past the next vote-tied group.

use crate::arithmetic::Arithmetic;
use crate::profile::CandidateIndex;
use crate::round::{sort_by_vote, Round};

/// `hopeful` need not be pre-sorted. Returns the empty vector when no safe batch exists.
pub fn batch_defeat<A: Arithmetic>(
    arith: &A,
    round: &Round<A::V>,
    mut hopeful: Vec<CandidateIndex>,
    surplus: &A::V,
    max_defeat: usize,
) -> Vec<CandidateIndex> {
    if hopeful.is_empty() || max_defeat == 0 {
        return Vec::new();
    }
    sort_by_vote(arith, round, &mut hopeful);

    // Group candidates whose vote is within `surplus` of the group's base (first) vote.
    let mut groups: Vec<Vec<CandidateIndex>> = Vec::new();
    for c in hopeful {
        let v = round.candidate(c).vote.clone();
        let joins_current = match groups.last() {
            Some(group) => {
                let base = round.candidate(group[0]).vote.clone();
                arith.ge(&arith.add(&base, surplus), &v)
            }
            None => false,
        };
        if joins_current {
            groups.last_mut().unwrap().push(c);
        } else {
            groups.push(vec![c]);
        }
    }

    if groups.len() < 2 {
        return Vec::new();
    }

    let mut ncand = 0usize;
    let mut cumulative_vote = arith.zero();
    let mut maxg: Option<usize> = None;
    for g in 0..groups.len() - 1 {
        ncand += groups[g].len();
        for &c in &groups[g] {
            cumulative_vote = arith.add(&cumulative_vote, &round.candidate(c).vote);
        }
        if ncand > max_defeat {
            break;
        }
        let next_base = round.candidate(groups[g + 1][0]).vote.clone();
        if arith.lt(&arith.add(&cumulative_vote, surplus), &next_base) {
            maxg = Some(g);
        }
    }

    match maxg {
        Some(g) => groups[0..=g].iter().flatten().copied().collect(),
        None => Vec::new(),
    }
}
