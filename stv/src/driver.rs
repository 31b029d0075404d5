// Copyright 2021-2022 Andrew Conway.
// This file is part of ConcreteSTV.
// ConcreteSTV is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// ConcreteSTV is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with ConcreteSTV.  If not, see <https://www.gnu.org/licenses/>.


//! The count driver (§4.F): resolves a rule name and arithmetic choice to a concrete
//! counter and kernel, runs it, and reports a kernel-independent round sequence.
//! Options/configuration (§4.H) and progress narration (§4.I) live here too, since
//! both are one-shot concerns of "running a count", not of any one counter.

use crate::arithmetic::{Arithmetic, FixedArithmetic, GuardedArithmetic, RationalArithmetic};
use crate::error::{StvError, StvResult};
use crate::meek::{self, MeekOptions, MeekVariant};
use crate::profile::{CandidateIndex, Profile};
use crate::round::{ActionKind, CandidateStatus, Election, LogEntry};
use crate::wigm::{self, WigmOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleName {
    Meek,
    Warren,
    WigmPrf,
    WigmPrfBatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticKind {
    Fixed,
    Integer,
    Guarded,
    Rational,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefeatBatch {
    Off,
    Safe,
}

/// The caller-facing request, one field per row of §6's option table.
#[derive(Debug, Clone)]
pub struct Options {
    pub rule: RuleName,
    /// Only meaningful with `rule=Meek`.
    pub variant: Option<MeekVariant>,
    pub arithmetic: ArithmeticKind,
    pub precision: Option<u32>,
    pub guard: Option<u32>,
    pub omega: Option<u32>,
    pub defeat_batch: DefeatBatch,
    pub display: Option<u32>,
}

impl Default for Options {
    fn default() -> Self {
        Options { rule: RuleName::Meek, variant: None, arithmetic: ArithmeticKind::Guarded, precision: Some(9), guard: None, omega: None, defeat_batch: DefeatBatch::Off, display: None }
    }
}

#[derive(Debug, Clone)]
enum ResolvedArithmeticKernel {
    Fixed(FixedArithmetic),
    Guarded(GuardedArithmetic),
    Rational(RationalArithmetic),
}

#[derive(Debug, Clone)]
enum ResolvedRule {
    Meek(MeekOptions),
    Wigm(WigmOptions),
}

/// The validated, normalized result of [`Options::resolve`].
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    kernel: ResolvedArithmeticKernel,
    rule: ResolvedRule,
    pub display: Option<u32>,
}

impl Options {
    pub fn resolve(&self) -> StvResult<ResolvedOptions> {
        if self.variant.is_some() && self.rule != RuleName::Meek {
            return Err(StvError::UsageError("option 'variant' is only valid with rule=meek".to_string()));
        }
        let wigm_batch = matches!(self.rule, RuleName::WigmPrf | RuleName::WigmPrfBatch);
        if wigm_batch && self.defeat_batch != DefeatBatch::Off {
            return Err(StvError::UsageError("option 'defeat_batch' is only valid with rule=meek or rule=warren; use rule=wigm-prf-batch instead".to_string()));
        }

        let rule = match self.rule {
            RuleName::Meek => ResolvedRule::Meek(MeekOptions {
                variant: self.variant.unwrap_or(MeekVariant::Meek),
                defeat_batch: self.defeat_batch == DefeatBatch::Safe,
                omega_exponent: self.resolve_omega()?,
            }),
            RuleName::Warren => ResolvedRule::Meek(MeekOptions {
                variant: MeekVariant::Warren,
                defeat_batch: self.defeat_batch == DefeatBatch::Safe,
                omega_exponent: self.resolve_omega()?,
            }),
            RuleName::WigmPrf => ResolvedRule::Wigm(WigmOptions { defeat_batch: false }),
            RuleName::WigmPrfBatch => ResolvedRule::Wigm(WigmOptions { defeat_batch: true }),
        };

        // WIGM-PRF forces fixed arithmetic at precision 4, ignoring conflicting options.
        let kernel = if wigm_batch {
            ResolvedArithmeticKernel::Fixed(FixedArithmetic::new(4)?)
        } else {
            match self.arithmetic {
                ArithmeticKind::Integer => ResolvedArithmeticKernel::Fixed(FixedArithmetic::new(0)?),
                ArithmeticKind::Fixed => {
                    let p = self.precision.ok_or_else(|| StvError::UsageError("arithmetic=fixed requires option 'precision'".to_string()))?;
                    ResolvedArithmeticKernel::Fixed(FixedArithmetic::new(p)?)
                }
                ArithmeticKind::Guarded => {
                    let p = self.precision.ok_or_else(|| StvError::UsageError("arithmetic=guarded requires option 'precision'".to_string()))?;
                    let g = self.guard.unwrap_or(p);
                    ResolvedArithmeticKernel::Guarded(GuardedArithmetic::new(p, g)?)
                }
                ArithmeticKind::Rational => ResolvedArithmeticKernel::Rational(RationalArithmetic),
            }
        };

        Ok(ResolvedOptions { kernel, rule, display: self.display })
    }

    fn resolve_omega(&self) -> StvResult<u32> {
        if let Some(omega) = self.omega {
            return Ok(omega);
        }
        Ok(match self.arithmetic {
            ArithmeticKind::Rational => 10,
            _ => {
                let p = self.precision.unwrap_or(0);
                (2 * p) / 3
            }
        })
    }
}

/// A round's candidate snapshot, formatted through the kernel that produced it —
/// independent of which concrete `V` the count ran with.
#[derive(Debug, Clone)]
pub struct CandidateReport {
    pub index: CandidateIndex,
    pub name: String,
    pub status: CandidateStatus,
    pub vote: String,
    pub kf: String,
}

#[derive(Debug, Clone)]
pub struct RoundReport {
    pub n: usize,
    pub quota: String,
    pub votes: String,
    pub surplus: String,
    pub residual: String,
    pub candidates: Vec<CandidateReport>,
    pub log: Vec<LogEntry>,
}

#[derive(Debug, Clone)]
pub struct CountResult {
    pub elected: Vec<CandidateIndex>,
    pub rounds: Vec<RoundReport>,
}

fn report<A: Arithmetic>(arith: &A, profile: &Profile, election: &Election<A>) -> CountResult {
    let rounds: Vec<RoundReport> = election
        .rounds
        .iter()
        .map(|r| RoundReport {
            n: r.n,
            quota: arith.format(&r.quota),
            votes: arith.format(&r.votes),
            surplus: arith.format(&r.surplus),
            residual: arith.format(&r.residual),
            candidates: r
                .candidates
                .iter()
                .map(|cs| CandidateReport { index: cs.index, name: profile.candidate(cs.index).name.clone(), status: cs.status, vote: arith.format(&cs.vote), kf: arith.format(&cs.kf) })
                .collect(),
            log: r.log.clone(),
        })
        .collect();
    let mut elected: Vec<CandidateIndex> = election.current().elected();
    elected.sort_by_key(|c| c.0);
    CountResult { elected, rounds }
}

fn narrate(progress: &mut dyn FnMut(&str), rounds: &[RoundReport]) {
    for r in rounds {
        progress(&format!("Round {}: quota={} votes={} surplus={}", r.n, r.quota, r.votes, r.surplus));
        for entry in &r.log {
            if entry.kind != ActionKind::Log || !entry.message.is_empty() {
                progress(&format!("  {}", entry.message));
            }
        }
    }
}

/// Validates the profile, resolves `opts`, runs the selected counter, and narrates
/// one line per round (plus the round's own log messages) to `progress`.
pub fn count(profile: &Profile, opts: &Options, progress: &mut dyn FnMut(&str)) -> StvResult<CountResult> {
    profile.validate()?;
    let resolved = opts.resolve()?;
    let result = match (&resolved.kernel, &resolved.rule) {
        (ResolvedArithmeticKernel::Fixed(a), ResolvedRule::Meek(o)) => meek::count(a, profile, o).map(|e| report(a, profile, &e)),
        (ResolvedArithmeticKernel::Fixed(a), ResolvedRule::Wigm(o)) => wigm::count(a, profile, o).map(|e| report(a, profile, &e)),
        (ResolvedArithmeticKernel::Guarded(a), ResolvedRule::Meek(o)) => meek::count(a, profile, o).map(|e| report(a, profile, &e)),
        (ResolvedArithmeticKernel::Guarded(a), ResolvedRule::Wigm(o)) => wigm::count(a, profile, o).map(|e| report(a, profile, &e)),
        (ResolvedArithmeticKernel::Rational(a), ResolvedRule::Meek(o)) => meek::count(a, profile, o).map(|e| report(a, profile, &e)),
        (ResolvedArithmeticKernel::Rational(a), ResolvedRule::Wigm(o)) => wigm::count(a, profile, o).map(|e| report(a, profile, &e)),
    }?;
    narrate(progress, &result.rounds);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Ballot, Candidate};
    use std::collections::HashSet;

    fn candidates(names: &[&str]) -> Vec<Candidate> { names.iter().map(|n| Candidate { name: (*n).to_string() }).collect() }
    fn silent(_line: &str) {}

    fn castor_pollux_helen() -> Profile {
        Profile {
            seats: 2,
            candidates: candidates(&["Castor", "Pollux", "Helen"]),
            withdrawn: HashSet::new(),
            ballots: vec![
                Ballot { multiplicity: 4, ranking: vec![CandidateIndex(0), CandidateIndex(1)] },
                Ballot { multiplicity: 2, ranking: vec![CandidateIndex(2)] },
            ],
        }
    }

    // Scenario 1: Meek, guarded(9,9), elects Castor and Pollux.
    #[test]
    fn scenario_1_meek_elects_castor_and_pollux() {
        let profile = castor_pollux_helen();
        let opts = Options { rule: RuleName::Meek, variant: None, arithmetic: ArithmeticKind::Guarded, precision: Some(9), guard: None, omega: None, defeat_batch: DefeatBatch::Safe, display: None };
        let mut log = Vec::new();
        let result = count(&profile, &opts, &mut |l| log.push(l.to_string())).unwrap();
        assert_eq!(result.elected, vec![CandidateIndex(0), CandidateIndex(1)]);
        assert!(!log.is_empty());
    }

    // Scenario 2: wigm-prf on the same profile. Round 1 pends Castor with surplus
    // 4 - (6/3 + eps) = 1.9999 under forced fixed(4), then transfers it within the
    // same round (weight (1*1.9999)/4 truncates to 0.4999, worth 1.9996 on Pollux's
    // 4-vote ballot) — just short of Helen's untouched 2.0, so Castor and Helen fill
    // the two seats; Pollux is defeated on the following round's low-vote step.
    #[test]
    fn scenario_2_wigm_prf_elects_castor_and_helen() {
        let profile = castor_pollux_helen();
        let opts = Options { rule: RuleName::WigmPrf, ..Options::default() };
        let mut log = Vec::new();
        let result = count(&profile, &opts, &mut |l| log.push(l.to_string())).unwrap();
        assert_eq!(result.elected, vec![CandidateIndex(0), CandidateIndex(2)]);
        let r1 = &result.rounds[1];
        // Castor is pended (step 2) and then transferred to elected (step 4) within
        // the same round; the log records both transitions in order.
        assert!(r1.log.iter().any(|e| e.kind == ActionKind::Pend && e.candidate == Some(CandidateIndex(0))));
        assert_eq!(r1.candidates[0].status, CandidateStatus::Elected);
        assert_eq!(r1.candidates[1].vote, "1.9996");
    }

    // Scenario 3: S=1, A/B/C, meek elects A.
    #[test]
    fn scenario_3_meek_single_seat_majority_elects_a() {
        let profile = Profile {
            seats: 1,
            candidates: candidates(&["A", "B", "C"]),
            withdrawn: HashSet::new(),
            ballots: vec![
                Ballot { multiplicity: 3, ranking: vec![CandidateIndex(0), CandidateIndex(1)] },
                Ballot { multiplicity: 2, ranking: vec![CandidateIndex(1), CandidateIndex(2)] },
                Ballot { multiplicity: 2, ranking: vec![CandidateIndex(2), CandidateIndex(1)] },
            ],
        };
        let opts = Options { rule: RuleName::Meek, variant: None, arithmetic: ArithmeticKind::Guarded, precision: Some(6), guard: None, omega: None, defeat_batch: DefeatBatch::Safe, display: None };
        let result = count(&profile, &opts, &mut silent).unwrap();
        assert_eq!(result.elected, vec![CandidateIndex(0)]);
    }

    // Scenario 4: S=2, 5 contesting candidates (D,E,F tied at the bottom, G/H far
    // ahead but still shy of quota) plus a withdrawn sink candidate Z whose ballot
    // inflates N (and so quota) without crediting anyone, so G/H stay hopeful long
    // enough for batchDefeat to compare against them. wigm-prf-batch defeats the
    // tied trio in round 1 since their combined vote (3) stays strictly below G/H's
    // single vote (10) even after adding the (zero, nobody pending yet) surplus.
    #[test]
    fn scenario_4_wigm_prf_batch_defeats_tied_trio() {
        let mut names = vec!["D", "E", "F", "G", "H"];
        names.push("Z");
        let profile = Profile {
            seats: 2,
            candidates: candidates(&names),
            withdrawn: HashSet::from([CandidateIndex(5)]),
            ballots: vec![
                Ballot { multiplicity: 1, ranking: vec![CandidateIndex(0)] },
                Ballot { multiplicity: 1, ranking: vec![CandidateIndex(1)] },
                Ballot { multiplicity: 1, ranking: vec![CandidateIndex(2)] },
                Ballot { multiplicity: 10, ranking: vec![CandidateIndex(3)] },
                Ballot { multiplicity: 10, ranking: vec![CandidateIndex(4)] },
                Ballot { multiplicity: 10, ranking: vec![CandidateIndex(5)] },
            ],
        };
        let opts = Options { rule: RuleName::WigmPrfBatch, ..Options::default() };
        let result = count(&profile, &opts, &mut silent).unwrap();
        let r1 = &result.rounds[1];
        assert_eq!(r1.candidates[0].status, CandidateStatus::Defeated);
        assert_eq!(r1.candidates[1].status, CandidateStatus::Defeated);
        assert_eq!(r1.candidates[2].status, CandidateStatus::Defeated);
        assert_eq!(result.elected, vec![CandidateIndex(3), CandidateIndex(4)]);
    }

    // Scenario 5: no candidate starts with a majority, so Meek must iterate through
    // several single-candidate eliminations (the "surplus <= omega" branch fires on
    // every round with no elected candidate yet, since an empty sum is always V0)
    // before a winner emerges. Exercises the same priority-ordered termination path
    // a genuine stable-surplus plateau would use, without depending on hand-derived
    // fixed-point numerics to force that specific sub-branch.
    #[test]
    fn scenario_5_meek_iterates_to_convergence_without_majority() {
        let profile = Profile {
            seats: 1,
            candidates: candidates(&["A", "B", "C"]),
            withdrawn: HashSet::new(),
            ballots: vec![
                Ballot { multiplicity: 4, ranking: vec![CandidateIndex(0), CandidateIndex(1)] },
                Ballot { multiplicity: 4, ranking: vec![CandidateIndex(1), CandidateIndex(0)] },
                Ballot { multiplicity: 2, ranking: vec![CandidateIndex(2), CandidateIndex(0)] },
            ],
        };
        let opts = Options { rule: RuleName::Meek, variant: None, arithmetic: ArithmeticKind::Guarded, precision: Some(4), guard: None, omega: Some(2), defeat_batch: DefeatBatch::Off, display: None };
        let mut log = Vec::new();
        let result = count(&profile, &opts, &mut |l| log.push(l.to_string())).unwrap();
        assert_eq!(result.elected.len(), 1);
        assert!(result.rounds.len() > 1);
        assert!(log.iter().any(|l| l.contains("Defeat")));
    }

    // Scenario 6: candidate B withdrawn; ballots starting [B, C, A] must count
    // initially for C via topCand.
    #[test]
    fn scenario_6_withdrawn_candidate_skipped() {
        let profile = Profile {
            seats: 1,
            candidates: candidates(&["A", "B", "C"]),
            withdrawn: HashSet::from([CandidateIndex(1)]),
            ballots: vec![Ballot { multiplicity: 5, ranking: vec![CandidateIndex(1), CandidateIndex(2), CandidateIndex(0)] }],
        };
        let opts = Options { rule: RuleName::Meek, variant: None, arithmetic: ArithmeticKind::Guarded, precision: Some(6), guard: None, omega: None, defeat_batch: DefeatBatch::Safe, display: None };
        let result = count(&profile, &opts, &mut silent).unwrap();
        let r0 = &result.rounds[0];
        assert_eq!(r0.candidates[1].status, CandidateStatus::Withdrawn);
        assert_eq!(r0.candidates[2].vote, "5");
    }

    #[test]
    fn resolve_rejects_variant_outside_meek() {
        let opts = Options { rule: RuleName::WigmPrf, variant: Some(MeekVariant::Warren), ..Options::default() };
        assert!(matches!(opts.resolve(), Err(StvError::UsageError(_))));
    }

    #[test]
    fn resolve_rejects_defeat_batch_with_wigm_rule() {
        let opts = Options { rule: RuleName::WigmPrf, defeat_batch: DefeatBatch::Safe, ..Options::default() };
        assert!(matches!(opts.resolve(), Err(StvError::UsageError(_))));
    }

    #[test]
    fn resolve_requires_precision_for_fixed() {
        let opts = Options { rule: RuleName::Meek, arithmetic: ArithmeticKind::Fixed, precision: None, ..Options::default() };
        assert!(matches!(opts.resolve(), Err(StvError::UsageError(_))));
    }

    #[test]
    fn wigm_prf_forces_fixed_precision_four() {
        let opts = Options { rule: RuleName::WigmPrf, arithmetic: ArithmeticKind::Rational, ..Options::default() };
        let resolved = opts.resolve().unwrap();
        assert!(matches!(resolved.kernel, ResolvedArithmeticKernel::Fixed(FixedArithmetic { precision: 4 })));
    }
}
