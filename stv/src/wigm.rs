// Copyright 2021-2022 Andrew Conway.
// This file is part of ConcreteSTV.
// ConcreteSTV is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// ConcreteSTV is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with ConcreteSTV.  If not, see <https://www.gnu.org/licenses/>.


//! The WIGM (Weighted Inclusive Gregory Method) counter (§4.E): surplus transfer by
//! ballot reweighting, with an optional batch defeat of sure losers shared with Meek
//! (§4.D's `batchDefeat`).

use crate::arithmetic::{Arithmetic, Rounding};
use crate::batchdefeat::batch_defeat;
use crate::error::StvResult;
use crate::profile::{Ballot, CandidateIndex, Profile};
use crate::round::{sort_by_order, sort_by_vote, CandidateState, CandidateStatus, Election, Round};

#[derive(Debug, Clone)]
pub struct WigmOptions {
    /// `rule=wigm-prf-batch` enables batch defeat of sure losers; `wigm-prf` does not.
    pub defeat_batch: bool,
}

/// A ballot's mutable per-count state: remaining weight and an advancing cursor into
/// its ranking. Persists across rounds (unlike Meek's weight, which resets every
/// iteration), so it lives outside the round snapshot (§9: "prefer a per-ballot
/// integer cursor over list mutation").
struct BallotState<V> {
    weight: V,
    cursor: usize,
}

pub fn count<A: Arithmetic>(arith: &A, profile: &Profile, opts: &WigmOptions) -> StvResult<Election<A>> {
    let mut ballots: Vec<BallotState<A::V>> = profile.ballots.iter().map(|_| BallotState { weight: arith.one(), cursor: 0 }).collect();
    let mut rounds = vec![initial_round(arith, profile, &mut ballots)];
    loop {
        let last = rounds.last().unwrap();
        let seats_left = last.seats_left_to_fill(profile.seats);
        let hopeful_count = last.hopeful().len() as i64;
        if !(hopeful_count > seats_left && seats_left > 0) { break; }
        run_round(arith, profile, &mut ballots, &mut rounds, opts);
    }
    finalize(arith, profile, &mut rounds);
    Ok(Election { profile: profile.clone(), arith: arith.clone(), rounds })
}

fn exhausted<A: Arithmetic>(arith: &A, ballot: &Ballot, state: &BallotState<A::V>) -> bool {
    state.cursor >= ballot.ranking.len() || arith.le(&state.weight, &arith.zero())
}

/// While the ballot is not exhausted and its current top is not hopeful, move the
/// cursor forward.
fn advance<A: Arithmetic>(arith: &A, round: &Round<A::V>, ballot: &Ballot, state: &mut BallotState<A::V>) {
    while !exhausted(arith, ballot, state) {
        let c = ballot.ranking[state.cursor];
        if round.status(c) == CandidateStatus::Hopeful { break; }
        state.cursor += 1;
    }
}

fn compute_quota<A: Arithmetic>(arith: &A, n: u64, seats: usize) -> A::V {
    let q = arith.div(&arith.from_count(n), &arith.from_count((seats + 1) as u64), Rounding::Down);
    if arith.exact() { q } else { arith.add(&q, &arith.epsilon()) }
}

fn has_quota<A: Arithmetic>(arith: &A, vote: &A::V, quota: &A::V) -> bool { arith.ge(vote, quota) }

fn initial_round<A: Arithmetic>(arith: &A, profile: &Profile, ballots: &mut [BallotState<A::V>]) -> Round<A::V> {
    let candidates: Vec<CandidateState<A::V>> = profile
        .candidate_indices()
        .map(|c| {
            let withdrawn = profile.is_withdrawn(c);
            CandidateState { index: c, status: if withdrawn { CandidateStatus::Withdrawn } else { CandidateStatus::Hopeful }, vote: arith.zero(), kf: arith.zero() }
        })
        .collect();
    let mut round = Round { n: 0, quota: arith.zero(), votes: arith.zero(), surplus: arith.zero(), residual: arith.zero(), candidates, log: Vec::new() };
    for (i, ballot) in profile.ballots.iter().enumerate() {
        let state = &mut ballots[i];
        advance(arith, &round, ballot, state);
        if !exhausted(arith, ballot, state) {
            let c = ballot.ranking[state.cursor];
            let contribution = arith.mul(&state.weight, &arith.from_count(ballot.multiplicity), Rounding::Down);
            let old = round.candidate(c).vote.clone();
            round.candidate_mut(c).vote = arith.add(&old, &contribution);
        }
    }
    let live: Vec<A::V> = round.candidates.iter().filter(|cs| cs.status != CandidateStatus::Withdrawn).map(|cs| cs.vote.clone()).collect();
    round.votes = arith.sum(&live);
    round.quota = compute_quota(arith, profile.total_ballots(), profile.seats);
    round
}

/// Transfer every ballot currently topped at `from`, advancing it to its next hopeful
/// and adding its (possibly reweighted) weight to that candidate's vote. `reweight`
/// carries `(original_vote, surplus)` for a surplus transfer; `None` for a plain
/// (unscaled) transfer following a defeat.
fn transfer_ballots_from<A: Arithmetic>(
    arith: &A,
    profile: &Profile,
    round: &mut Round<A::V>,
    ballots: &mut [BallotState<A::V>],
    from: CandidateIndex,
    reweight: Option<(A::V, A::V)>,
) {
    for (i, ballot) in profile.ballots.iter().enumerate() {
        let state = &mut ballots[i];
        if exhausted(arith, ballot, state) || ballot.ranking[state.cursor] != from { continue; }
        if let Some((ref orig_vote, ref surplus)) = reweight {
            let numer = arith.mul(&state.weight, surplus, Rounding::Down);
            state.weight = arith.div(&numer, orig_vote, Rounding::Down);
        }
        state.cursor += 1;
        advance(arith, round, ballot, state);
        if !exhausted(arith, ballot, state) {
            let dest = ballot.ranking[state.cursor];
            let contribution = arith.mul(&state.weight, &arith.from_count(ballot.multiplicity), Rounding::Down);
            let old = round.candidate(dest).vote.clone();
            round.candidate_mut(dest).vote = arith.add(&old, &contribution);
        }
    }
}

/// Among `cs`, the candidate with the maximum vote; ties broken toward the smaller
/// ballot-file order.
fn pick_highest<A: Arithmetic>(arith: &A, round: &Round<A::V>, cs: Vec<CandidateIndex>) -> CandidateIndex {
    let mut sorted = cs;
    sort_by_vote(arith, round, &mut sorted);
    let max_vote = round.candidate(*sorted.last().unwrap()).vote.clone();
    sorted.into_iter().filter(|&c| arith.eq(&round.candidate(c).vote, &max_vote)).min().unwrap()
}

fn run_round<A: Arithmetic>(arith: &A, profile: &Profile, ballots: &mut [BallotState<A::V>], rounds: &mut Vec<Round<A::V>>, opts: &WigmOptions) {
    let seats = profile.seats;
    let prev = rounds.last().unwrap();
    let mut round = prev.new_round(arith.zero());
    round.quota = prev.quota.clone();
    round.votes = prev.votes.clone();

    // Step 1/2: elect winners into pending.
    let mut winners: Vec<CandidateIndex> = round.hopeful().into_iter().filter(|&c| has_quota(arith, &round.candidate(c).vote, &round.quota)).collect();
    sort_by_order(&mut winners);
    for c in winners {
        let vote_s = arith.format(&round.candidate(c).vote);
        round.pend(c, format!("Pend: {} reaches quota ({})", profile.candidate(c).name, vote_s));
    }

    // Step 3: optional batch defeat of sure losers. Surplus is the sum over pending
    // (zero, and the step still attempted, when nobody has reached quota yet).
    if opts.defeat_batch {
        let pending = round.pending();
        let surpluses: Vec<A::V> = pending.iter().map(|&c| arith.sub(&round.candidate(c).vote, &round.quota)).collect();
        let surplus = arith.sum(&surpluses);
        let hopeful = round.hopeful();
        let seats_left = round.seats_left_to_fill(seats).max(0) as usize;
        let max_defeat = hopeful.len().saturating_sub(seats_left);
        let mut batch = batch_defeat(arith, &round, hopeful, &surplus, max_defeat);
        if !batch.is_empty() {
            sort_by_order(&mut batch);
            for &c in &batch {
                round.defeat(c, "Defeat certain loser");
            }
            if !round.terminated(seats) {
                for &c in &batch {
                    transfer_ballots_from(arith, profile, &mut round, ballots, c, None);
                }
            }
            for &c in &batch {
                round.candidate_mut(c).vote = arith.zero();
            }
            rounds.push(round);
            return;
        }
    }

    // Step 4: transfer highest surplus, else step 5: defeat low.
    let pending = round.pending();
    if !pending.is_empty() {
        let high = pick_highest(arith, &round, pending);
        let high_vote = round.candidate(high).vote.clone();
        let surplus = arith.sub(&high_vote, &round.quota);
        round.elect(high, format!("Transfer high surplus: {} (surplus {})", profile.candidate(high).name, arith.format(&surplus)));
        transfer_ballots_from(arith, profile, &mut round, ballots, high, Some((high_vote, surplus)));
        round.candidate_mut(high).vote = round.quota.clone();
    } else {
        let mut hopeful = round.hopeful();
        sort_by_vote(arith, &round, &mut hopeful);
        if let Some(&low) = hopeful.first() {
            round.defeat(low, format!("Defeat: {} has fewest votes", profile.candidate(low).name));
            transfer_ballots_from(arith, profile, &mut round, ballots, low, None);
            round.candidate_mut(low).vote = arith.zero();
        }
    }
    rounds.push(round);
}

fn finalize<A: Arithmetic>(arith: &A, profile: &Profile, rounds: &mut Vec<Round<A::V>>) {
    let prev = rounds.last().unwrap();
    let pending = prev.pending();
    let hopeful = prev.hopeful();
    if pending.is_empty() && hopeful.is_empty() { return; }

    let mut round = prev.new_round(arith.zero());
    round.quota = prev.quota.clone();
    round.votes = prev.votes.clone();

    let mut pending_sorted = pending;
    sort_by_order(&mut pending_sorted);
    for c in pending_sorted {
        round.elect(c, "Elect pending: surplus already transferred");
    }

    let seats = profile.seats;
    let elected_count = round.elected().len();
    let mut hopeful_sorted = round.hopeful();
    sort_by_order(&mut hopeful_sorted);
    if elected_count < seats {
        for c in hopeful_sorted {
            round.elect(c, "Elect remaining: insufficient hopefuls to require further rounds");
        }
    } else {
        for c in hopeful_sorted {
            round.candidate_mut(c).vote = arith.zero();
            round.defeat(c, "Defeat: all seats already filled");
        }
    }
    rounds.push(round);
}
