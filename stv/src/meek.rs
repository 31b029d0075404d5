// Copyright 2021-2022 Andrew Conway.
// This file is part of ConcreteSTV.
// ConcreteSTV is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// ConcreteSTV is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with ConcreteSTV.  If not, see <https://www.gnu.org/licenses/>.


//! The iterative Meek/Warren counter (§4.D): keep-factor convergence, election,
//! single defeat on omega/stable convergence, and batch defeat of sure losers.
//!
//! Only the OpenSTV-style keep-value update is implemented (keep-vote rounded down,
//! new weight rounded down, keep-factor update `up/up`) per §9's open question: other
//! historical variants (Hill/NZ, NZ Schedule 1A) are not offered.

use crate::arithmetic::{Arithmetic, Rounding};
use crate::batchdefeat::batch_defeat;
use crate::error::StvResult;
use crate::profile::{CandidateIndex, Profile};
use crate::round::{sort_by_order, sort_by_vote, CandidateState, CandidateStatus, Election, Round};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeekVariant {
    Meek,
    Warren,
}

#[derive(Debug, Clone)]
pub struct MeekOptions {
    pub variant: MeekVariant,
    /// Enables `batchDefeat` of sure losers (`defeat_batch=safe`).
    pub defeat_batch: bool,
    /// `_omega = V1 / V(10^omega_exponent)`.
    pub omega_exponent: u32,
}

pub fn count<A: Arithmetic>(arith: &A, profile: &Profile, opts: &MeekOptions) -> StvResult<Election<A>> {
    let mut election = Election { profile: profile.clone(), arith: arith.clone(), rounds: vec![initial_round(arith, profile)] };
    while !election.current().terminated(profile.seats) {
        run_round(&mut election, opts);
    }
    finalize(&mut election);
    Ok(election)
}

fn initial_round<A: Arithmetic>(arith: &A, profile: &Profile) -> Round<A::V> {
    let candidates: Vec<CandidateState<A::V>> = profile
        .candidate_indices()
        .map(|c| {
            let withdrawn = profile.is_withdrawn(c);
            CandidateState {
                index: c,
                status: if withdrawn { CandidateStatus::Withdrawn } else { CandidateStatus::Hopeful },
                vote: arith.zero(),
                kf: if withdrawn { arith.zero() } else { arith.one() },
            }
        })
        .collect();
    let mut round = Round { n: 0, quota: arith.zero(), votes: arith.zero(), surplus: arith.zero(), residual: arith.zero(), candidates, log: Vec::new() };
    let mut residual = arith.zero();
    for ballot in &profile.ballots {
        match profile.top_cand(ballot) {
            Some(c) => {
                let add = arith.from_count(ballot.multiplicity);
                let old = round.candidate(c).vote.clone();
                round.candidate_mut(c).vote = arith.add(&old, &add);
            }
            None => {
                residual = arith.add(&residual, &arith.from_count(ballot.multiplicity));
            }
        }
    }
    round.residual = residual;
    let live: Vec<A::V> = round.candidates.iter().filter(|cs| cs.status != CandidateStatus::Withdrawn).map(|cs| cs.vote.clone()).collect();
    round.votes = arith.sum(&live);
    round.quota = compute_quota(arith, &round.votes, profile.seats);
    round
}

fn compute_quota<A: Arithmetic>(arith: &A, votes: &A::V, seats: usize) -> A::V {
    let divisor = arith.from_count((seats + 1) as u64);
    let q = arith.div(votes, &divisor, Rounding::Down);
    if arith.exact() { q } else { arith.add(&q, &arith.epsilon()) }
}

fn has_quota<A: Arithmetic>(arith: &A, vote: &A::V, quota: &A::V) -> bool {
    if arith.exact() { arith.gt(vote, quota) } else { arith.ge(vote, quota) }
}

fn omega_threshold<A: Arithmetic>(arith: &A, omega_exponent: u32) -> A::V {
    let denom = arith.from_count(10u64.saturating_pow(omega_exponent));
    arith.div(&arith.one(), &denom, Rounding::Down)
}

fn run_round<A: Arithmetic>(election: &mut Election<A>, opts: &MeekOptions) {
    let arith = election.arith.clone();
    let seats = election.profile.seats;
    let mut round = election.current().new_round(arith.zero());
    let mut last_surplus: Option<A::V> = None;

    loop {
        distribute_ballots(&arith, &election.profile, &mut round, opts.variant);

        let live: Vec<A::V> = round.candidates.iter().filter(|cs| matches!(cs.status, CandidateStatus::Hopeful | CandidateStatus::Elected)).map(|cs| cs.vote.clone()).collect();
        round.votes = arith.sum(&live);
        round.quota = compute_quota(&arith, &round.votes, seats);

        let mut newly_elected: Vec<CandidateIndex> = round.hopeful().into_iter().filter(|&c| has_quota(&arith, &round.candidate(c).vote, &round.quota)).collect();
        if !newly_elected.is_empty() {
            sort_by_order(&mut newly_elected);
            for c in newly_elected {
                let vote_s = arith.format(&round.candidate(c).vote);
                let quota_s = arith.format(&round.quota);
                round.elect(c, format!("Elect: {} reaches quota ({} >= {})", election.profile.candidate(c).name, vote_s, quota_s));
            }
            break;
        }

        let elected = round.elected();
        let surpluses: Vec<A::V> = elected.iter().map(|&c| arith.sub(&round.candidate(c).vote, &round.quota)).collect();
        round.surplus = arith.sum(&surpluses);

        let omega_v = omega_threshold(&arith, opts.omega_exponent);
        if arith.le(&round.surplus, &omega_v) {
            let reason = format!("Defeat (surplus {} <= omega)", arith.format(&round.surplus));
            let surplus = round.surplus.clone();
            defeat_single_low(&arith, &mut round, &surplus, &reason);
            break;
        }
        if let Some(last) = last_surplus.clone() {
            if arith.ge(&round.surplus, &last) {
                round.note("Stable state detected");
                let reason = format!("Defeat (stable surplus {})", arith.format(&round.surplus));
                let surplus = round.surplus.clone();
                defeat_single_low(&arith, &mut round, &surplus, &reason);
                break;
            }
        }
        if opts.defeat_batch {
            let hopeful = round.hopeful();
            let seats_left = round.seats_left_to_fill(seats).max(0) as usize;
            let max_defeat = hopeful.len().saturating_sub(seats_left);
            let batch = batch_defeat(&arith, &round, hopeful, &round.surplus.clone(), max_defeat);
            if !batch.is_empty() {
                let mut sorted_batch = batch;
                sort_by_order(&mut sorted_batch);
                for c in sorted_batch {
                    round.candidate_mut(c).kf = arith.zero();
                    round.candidate_mut(c).vote = arith.zero();
                    round.defeat(c, "Defeat certain loser");
                }
                break;
            }
        }

        for c in round.elected() {
            let cs = round.candidate(c);
            let new_kf = arith.div(&arith.mul(&cs.kf, &round.quota, Rounding::Up), &cs.vote, Rounding::Up);
            round.candidate_mut(c).kf = new_kf;
        }
        last_surplus = Some(round.surplus.clone());
    }

    election.rounds.push(round);
}

fn distribute_ballots<A: Arithmetic>(arith: &A, profile: &Profile, round: &mut Round<A::V>, variant: MeekVariant) {
    for cs in round.candidates.iter_mut() {
        if matches!(cs.status, CandidateStatus::Hopeful | CandidateStatus::Elected) {
            cs.vote = arith.zero();
        }
    }
    round.residual = arith.zero();
    for ballot in &profile.ballots {
        let m = ballot.multiplicity;
        let mut weight = arith.one();
        let mut residual = arith.from_count(m);
        match variant {
            MeekVariant::Meek => {
                for &c in &ballot.ranking {
                    let kf = round.candidate(c).kf.clone();
                    let wm = arith.mul(&weight, &arith.from_count(m), Rounding::Down);
                    let kv = arith.mul(&wm, &kf, Rounding::Down);
                    let old_vote = round.candidate(c).vote.clone();
                    round.candidate_mut(c).vote = arith.add(&old_vote, &kv);
                    let one_minus_kf = arith.sub(&arith.one(), &kf);
                    weight = arith.mul(&weight, &one_minus_kf, Rounding::Down);
                    residual = arith.sub(&residual, &kv);
                    if arith.le(&weight, &arith.zero()) { break; }
                }
            }
            MeekVariant::Warren => {
                for &c in &ballot.ranking {
                    let kf = round.candidate(c).kf.clone();
                    let keep = arith.min(&[kf, residual.clone()]);
                    weight = arith.sub(&weight, &keep);
                    let keep_m = arith.mul(&keep, &arith.from_count(m), Rounding::Down);
                    let old_vote = round.candidate(c).vote.clone();
                    round.candidate_mut(c).vote = arith.add(&old_vote, &keep_m);
                    residual = arith.sub(&residual, &keep_m);
                    if arith.le(&weight, &arith.zero()) { break; }
                }
            }
        }
        round.residual = arith.add(&round.residual, &residual);
    }
}

/// Defeat the single lowest-vote hopeful; candidates within `surplus` of the minimum
/// form the tie set, broken by ballot order.
fn defeat_single_low<A: Arithmetic>(arith: &A, round: &mut Round<A::V>, surplus: &A::V, reason: &str) {
    let mut hopeful = round.hopeful();
    if hopeful.is_empty() { return; }
    sort_by_vote(arith, round, &mut hopeful);
    let min_vote = round.candidate(hopeful[0]).vote.clone();
    let mut tie_set: Vec<CandidateIndex> = hopeful.into_iter().filter(|&c| arith.le(&arith.sub(&round.candidate(c).vote, &min_vote), surplus)).collect();
    sort_by_order(&mut tie_set);
    let chosen = tie_set[0];
    if tie_set.len() > 1 {
        round.tie(Some(chosen), format!("Break tie ({} candidates at minimum vote, chosen by ballot order)", tie_set.len()));
    }
    round.candidate_mut(chosen).kf = arith.zero();
    round.candidate_mut(chosen).vote = arith.zero();
    round.defeat(chosen, reason.to_string());
}

fn finalize<A: Arithmetic>(election: &mut Election<A>) {
    let arith = election.arith.clone();
    let seats = election.profile.seats;
    let prev = election.current();
    let mut hopeful = prev.hopeful();
    if hopeful.is_empty() { return; }
    let seats_left = prev.seats_left_to_fill(seats).max(0) as usize;
    let mut round = prev.new_round(arith.zero());
    round.quota = prev.quota.clone();
    round.votes = prev.votes.clone();
    round.residual = prev.residual.clone();
    sort_by_order(&mut hopeful);
    if hopeful.len() <= seats_left {
        for c in hopeful {
            round.elect(c, "Elect remaining: insufficient hopefuls to require further rounds");
        }
    } else {
        for c in hopeful {
            round.candidate_mut(c).kf = arith.zero();
            round.candidate_mut(c).vote = arith.zero();
            round.defeat(c, "Defeat: all seats already filled");
        }
    }
    election.rounds.push(round);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arithmetic::GuardedArithmetic;
    use crate::profile::{Ballot, Candidate};
    use std::collections::HashSet;

    fn castor_pollux_helen() -> Profile {
        Profile {
            seats: 2,
            candidates: vec![Candidate { name: "Castor".into() }, Candidate { name: "Pollux".into() }, Candidate { name: "Helen".into() }],
            withdrawn: HashSet::new(),
            ballots: vec![
                Ballot { multiplicity: 4, ranking: vec![CandidateIndex(0), CandidateIndex(1)] },
                Ballot { multiplicity: 2, ranking: vec![CandidateIndex(2)] },
            ],
        }
    }

    #[test]
    fn elects_castor_and_pollux() {
        let arith = GuardedArithmetic::new(9, 9).unwrap();
        let opts = MeekOptions { variant: MeekVariant::Meek, defeat_batch: true, omega_exponent: 6 };
        let profile = castor_pollux_helen();
        let election = count(&arith, &profile, &opts).unwrap();
        let last = election.rounds.last().unwrap();
        let mut elected = last.elected();
        sort_by_order(&mut elected);
        assert_eq!(elected, vec![CandidateIndex(0), CandidateIndex(1)]);
    }

    #[test]
    fn withdrawn_candidate_skipped_for_first_preference() {
        let arith = GuardedArithmetic::new(6, 6).unwrap();
        let profile = Profile {
            seats: 1,
            candidates: vec![Candidate { name: "A".into() }, Candidate { name: "B".into() }, Candidate { name: "C".into() }],
            withdrawn: HashSet::from([CandidateIndex(1)]),
            ballots: vec![Ballot { multiplicity: 5, ranking: vec![CandidateIndex(1), CandidateIndex(2), CandidateIndex(0)] }],
        };
        let r0 = initial_round(&arith, &profile);
        assert_eq!(r0.candidate(CandidateIndex(2)).vote, arith.from_count(5));
        assert_eq!(r0.candidate(CandidateIndex(1)).status, CandidateStatus::Withdrawn);
    }

    #[test]
    fn single_seat_majority_elects_a() {
        let arith = GuardedArithmetic::new(6, 6).unwrap();
        let profile = Profile {
            seats: 1,
            candidates: vec![Candidate { name: "A".into() }, Candidate { name: "B".into() }, Candidate { name: "C".into() }],
            withdrawn: HashSet::new(),
            ballots: vec![
                Ballot { multiplicity: 3, ranking: vec![CandidateIndex(0), CandidateIndex(1)] },
                Ballot { multiplicity: 2, ranking: vec![CandidateIndex(1), CandidateIndex(2)] },
                Ballot { multiplicity: 2, ranking: vec![CandidateIndex(2), CandidateIndex(1)] },
            ],
        };
        let opts = MeekOptions { variant: MeekVariant::Meek, defeat_batch: true, omega_exponent: 4 };
        let election = count(&arith, &profile, &opts).unwrap();
        let last = election.rounds.last().unwrap();
        assert_eq!(last.elected(), vec![CandidateIndex(0)]);
    }
}
