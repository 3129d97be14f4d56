//! C3 — attaching row/bank-state cases to each access sequence.
//!
//! Full mode (annotator versions 1 and 2, feeding the V1 positional and V2
//! counting resolvers) enumerates every row/bank assignment a sequence's
//! target-channel slots could take: same row, same bank but a different row,
//! or a different bank entirely. That is a 3-way branch at every
//! target-channel slot, walked with an explicit stack of arena records
//! instead of recursion, so a sequence with many target slots doesn't pay
//! for cloning the whole prefix at each branch.
//!
//! Coarse mode (annotator version 3, feeding the V3 existence resolver)
//! collapses that branching to the three outcomes the existence resolver
//! actually distinguishes: no same-bank access at all, at least one
//! same-bank-different-row access but no same-row access, or at least one
//! same-row access.

use crate::error::{ModelError, Result};
use crate::types::{AccSeqCase, AccessSequence, AccessStatus, ThreadInfo};

const CASE_SUM_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotatorVersion {
    /// Versions 1/2: exact per-slot row/bank enumeration.
    Full,
    /// Version 3: coarse existence classification.
    Coarse,
}

impl AnnotatorVersion {
    pub fn from_step(step: u8) -> Option<Self> {
        match step {
            1 | 2 => Some(AnnotatorVersion::Full),
            3 => Some(AnnotatorVersion::Coarse),
            _ => None,
        }
    }
}

/// Attach `.cases` to every sequence at every reuse distance of `thr_info`.
pub fn annotate(thr_info: &mut ThreadInfo, version: AnnotatorVersion) -> Result<()> {
    let snapshot = thr_info.clone();
    for entry in thr_info.reuse_dists.iter_mut() {
        for seq in entry.sequences.iter_mut() {
            seq.cases = match version {
                AnnotatorVersion::Full => annotate_full(&snapshot, seq)?,
                AnnotatorVersion::Coarse => annotate_coarse(snapshot.bank_prob, snapshot.row_prob, seq)?,
            };
        }
    }
    Ok(())
}

struct CaseNode {
    parent: Option<usize>,
    slot: AccessStatus,
    depth: usize,
    total_same_row: usize,
    total_same_bank_diff_row: usize,
    last_target_depth: Option<usize>,
    prob: f64,
}

/// Three branch weights for one target-channel slot, keyed to the three
/// states a slot can land in: same-bank-same-row, same-bank-different-row,
/// different-bank.
struct BranchWeights {
    sbsr: f64,
    sbdr: f64,
    db: f64,
}

fn marginal_weights(bank_prob: f64, row_prob: f64) -> BranchWeights {
    BranchWeights {
        sbsr: bank_prob * row_prob,
        sbdr: bank_prob * (1.0 - row_prob),
        db: 1.0 - bank_prob,
    }
}

/// Split a reuse-distance entry's hit/miss/conf mass across the three new
/// states, given the previous target-channel slot's state. HIT keeps the
/// previous state; MISS opens the bank fresh (or, if the previous access
/// wasn't already same-bank, falls back to the marginal split); CONFLICT
/// swaps same-row for same-bank-different-row and vice versa, or opens a
/// different bank if the previous access wasn't same-bank at all.
fn transition_weights(
    prev_same_bank: bool,
    prev_same_row: bool,
    hit_prob: f64,
    miss_prob: f64,
    conf_prob: f64,
    bank_prob: f64,
    row_prob: f64,
) -> BranchWeights {
    let mut w = BranchWeights { sbsr: 0.0, sbdr: 0.0, db: 0.0 };

    // HIT: same state as previous.
    if prev_same_bank && prev_same_row {
        w.sbsr += hit_prob;
    } else if prev_same_bank {
        w.sbdr += hit_prob;
    } else {
        w.db += hit_prob;
    }

    // MISS: the bank closed. If it was already open (same-bank), it can
    // only close to a different bank; otherwise there was nothing open to
    // begin with, so the marginal split applies.
    if prev_same_bank {
        w.db += miss_prob;
    } else {
        let m = marginal_weights(bank_prob, row_prob);
        w.sbsr += miss_prob * m.sbsr;
        w.sbdr += miss_prob * m.sbdr;
        w.db += miss_prob * m.db;
    }

    // CONFLICT: same bank, different row than whatever was open before.
    if prev_same_bank && prev_same_row {
        w.sbdr += conf_prob;
    } else if prev_same_bank {
        w.sbsr += conf_prob;
    } else {
        w.db += conf_prob;
    }

    w
}

fn annotate_full(thr_info: &ThreadInfo, seq: &AccessSequence) -> Result<Vec<AccSeqCase>> {
    let bank_prob = thr_info.bank_prob;
    let row_prob = thr_info.row_prob;

    let mut arena: Vec<CaseNode> = vec![CaseNode {
        parent: None,
        slot: AccessStatus::other_channel(1.0),
        depth: 0,
        total_same_row: 0,
        total_same_bank_diff_row: 0,
        last_target_depth: None,
        prob: 1.0,
    }];
    let mut frontier: Vec<usize> = vec![0];

    for orig_slot in &seq.slots {
        let mut next_frontier = Vec::with_capacity(frontier.len());
        for &parent_idx in &frontier {
            let (depth, total_same_row, total_same_bank_diff_row, last_target_depth, prob, prev_slot) = {
                let n = &arena[parent_idx];
                (n.depth, n.total_same_row, n.total_same_bank_diff_row, n.last_target_depth, n.prob, n.slot)
            };

            if !orig_slot.same_chnl {
                arena.push(CaseNode {
                    parent: Some(parent_idx),
                    slot: *orig_slot,
                    depth: depth + 1,
                    total_same_row,
                    total_same_bank_diff_row,
                    last_target_depth,
                    prob,
                });
                next_frontier.push(arena.len() - 1);
                continue;
            }

            let weights = match last_target_depth {
                None => marginal_weights(bank_prob, row_prob),
                Some(last_depth) => {
                    let gap = depth - last_depth;
                    let entry = thr_info.find_reuse_dist(gap).ok_or(ModelError::ReuseDistanceNotFound {
                        dist: gap,
                        stage: "annotator",
                    })?;
                    transition_weights(
                        prev_slot.same_bank,
                        prev_slot.same_row,
                        entry.hit_prob,
                        entry.miss_prob,
                        entry.conf_prob,
                        bank_prob,
                        row_prob,
                    )
                }
            };

            let branches = [
                (
                    AccessStatus::same_bank_same_row(weights.sbsr),
                    total_same_row + 1,
                    total_same_bank_diff_row,
                ),
                (
                    AccessStatus::same_bank_diff_row(weights.sbdr),
                    total_same_row,
                    total_same_bank_diff_row + 1,
                ),
                (
                    AccessStatus::diff_bank(weights.db),
                    total_same_row,
                    total_same_bank_diff_row,
                ),
            ];

            for (slot, new_same_row, new_same_bank_diff_row) in branches {
                if slot.prob <= 0.0 {
                    continue;
                }
                arena.push(CaseNode {
                    parent: Some(parent_idx),
                    slot,
                    depth: depth + 1,
                    total_same_row: new_same_row,
                    total_same_bank_diff_row: new_same_bank_diff_row,
                    last_target_depth: Some(depth + 1),
                    prob: prob * slot.prob,
                });
                next_frontier.push(arena.len() - 1);
            }
        }
        frontier = next_frontier;
    }

    let mut cases = Vec::with_capacity(frontier.len());
    let mut prob_sum = 0.0;
    for leaf in frontier {
        let (total_same_row, total_same_bank_diff_row, prob) = {
            let n = &arena[leaf];
            (n.total_same_row, n.total_same_bank_diff_row, n.prob)
        };
        let slots = reconstruct(&arena, leaf);

        let observed_targets = slots.iter().filter(|s| s.same_chnl).count();
        if observed_targets != seq.total_target_accs {
            return Err(ModelError::TotalAccessMismatch {
                expected: seq.total_target_accs,
                observed: observed_targets,
            });
        }

        prob_sum += prob;
        cases.push(AccSeqCase {
            slots,
            total_target_accs: seq.total_target_accs,
            total_same_row,
            total_same_bank_diff_row,
            prob,
        });
    }

    if (prob_sum - 1.0).abs() > CASE_SUM_TOLERANCE && prob_sum > 0.0 {
        return Err(ModelError::CaseProbabilitySum {
            observed: prob_sum,
            tolerance: CASE_SUM_TOLERANCE,
        });
    }

    Ok(cases)
}

fn reconstruct(arena: &[CaseNode], leaf: usize) -> Vec<AccessStatus> {
    let mut out = Vec::new();
    let mut cur = leaf;
    loop {
        let n = &arena[cur];
        if n.depth == 0 {
            break;
        }
        out.push(n.slot);
        cur = n.parent.expect("non-root case node always has a parent");
    }
    out.reverse();
    out
}

/// Three coarse outcomes for a sequence with at least one target-channel
/// slot, all target slots assumed to land in the same state: every one
/// lands on the same row (prob `bank_prob * row_prob`), every one lands on
/// the same bank but a different row (prob `bank_prob * (1 - row_prob)`),
/// or every one lands on a different bank (prob `1 - bank_prob`) — constant
/// probabilities, with no dependence on how many target slots the sequence
/// has. A sequence with zero target-channel slots is the pathological case:
/// a single case, prob 1, touching neither a row nor a bank.
fn annotate_coarse(bank_prob: f64, row_prob: f64, seq: &AccessSequence) -> Result<Vec<AccSeqCase>> {
    let k = seq.total_target_accs;

    if k == 0 {
        return Ok(vec![AccSeqCase {
            slots: Vec::new(),
            total_target_accs: 0,
            total_same_row: 0,
            total_same_bank_diff_row: 0,
            prob: 1.0,
        }]);
    }

    let cases = vec![
        AccSeqCase {
            slots: Vec::new(),
            total_target_accs: k,
            total_same_row: k,
            total_same_bank_diff_row: 0,
            prob: bank_prob * row_prob,
        },
        AccSeqCase {
            slots: Vec::new(),
            total_target_accs: k,
            total_same_row: 0,
            total_same_bank_diff_row: k,
            prob: bank_prob * (1.0 - row_prob),
        },
        AccSeqCase {
            slots: Vec::new(),
            total_target_accs: k,
            total_same_row: 0,
            total_same_bank_diff_row: 0,
            prob: 1.0 - bank_prob,
        },
    ];

    let prob_sum: f64 = cases.iter().map(|c| c.prob).sum();
    if (prob_sum - 1.0).abs() > CASE_SUM_TOLERANCE {
        return Err(ModelError::CaseProbabilitySum {
            observed: prob_sum,
            tolerance: CASE_SUM_TOLERANCE,
        });
    }

    Ok(cases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReuseDistEntry;

    fn sequence(slots: Vec<AccessStatus>, total_target_accs: usize) -> AccessSequence {
        AccessSequence {
            slots,
            prob: 1.0,
            total_target_accs,
            cases: Vec::new(),
        }
    }

    fn thr_info_for_annotation() -> ThreadInfo {
        ThreadInfo {
            chnl_prob: 0.25,
            bank_prob: 0.4,
            row_prob: 0.3,
            reorder_time_ns: 0.0,
            autoclose_time_ns: 0.0,
            est_serv_time_ns: 1.0,
            half_reorder: false,
            min_con_acc: 1,
            min_con_noacc: 1,
            reuse_dists: vec![ReuseDistEntry {
                dist: 1,
                prob: 1.0,
                hit_prob: 0.5,
                miss_prob: 0.3,
                conf_prob: 0.2,
                sequences: Vec::new(),
            }],
        }
    }

    #[test]
    fn full_cases_sum_to_one() {
        let seq = sequence(
            vec![
                AccessStatus::other_channel(0.5),
                AccessStatus::diff_bank(0.5),
            ],
            1,
        );
        let cases = annotate_full(&thr_info_for_annotation(), &seq).unwrap();
        assert_eq!(cases.len(), 3);
        let sum: f64 = cases.iter().map(|c| c.prob).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn full_cases_second_target_slot_uses_reuse_distance_split() {
        // Two target-channel slots, one apart: the second slot's state must
        // be derived from the reuse-distance entry for gap=1, not the
        // marginals, and must still sum to one across all resulting cases.
        let seq = sequence(
            vec![AccessStatus::diff_bank(0.6), AccessStatus::diff_bank(0.4)],
            2,
        );
        let cases = annotate_full(&thr_info_for_annotation(), &seq).unwrap();
        let sum: f64 = cases.iter().map(|c| c.prob).sum();
        assert!((sum - 1.0).abs() < 1e-9, "sum was {sum}");
        for case in &cases {
            assert_eq!(case.total_target_accs, 2);
        }
    }

    #[test]
    fn coarse_cases_sum_to_one() {
        let seq = sequence(Vec::new(), 3);
        let cases = annotate_coarse(0.4, 0.3, &seq).unwrap();
        assert_eq!(cases.len(), 3);
        let sum: f64 = cases.iter().map(|c| c.prob).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn coarse_case_probabilities_are_constant_in_target_count() {
        // bank=row=0.5: spec/original give (0.25, 0.25, 0.5) regardless of
        // how many target-channel slots the sequence has.
        let two = annotate_coarse(0.5, 0.5, &sequence(Vec::new(), 2)).unwrap();
        let five = annotate_coarse(0.5, 0.5, &sequence(Vec::new(), 5)).unwrap();
        for cases in [&two, &five] {
            assert!((cases[0].prob - 0.25).abs() < 1e-9);
            assert!((cases[1].prob - 0.25).abs() < 1e-9);
            assert!((cases[2].prob - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn coarse_zero_target_accs_is_single_pathological_case() {
        let cases = annotate_coarse(0.4, 0.3, &sequence(Vec::new(), 0)).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].prob, 1.0);
        assert_eq!(cases[0].total_same_row, 0);
        assert_eq!(cases[0].total_same_bank_diff_row, 0);
    }

    #[test]
    fn annotate_populates_every_sequence() {
        let mut thr = ThreadInfo {
            chnl_prob: 0.25,
            bank_prob: 0.4,
            row_prob: 0.3,
            reorder_time_ns: 0.0,
            autoclose_time_ns: 0.0,
            est_serv_time_ns: 1.0,
            half_reorder: false,
            min_con_acc: 1,
            min_con_noacc: 1,
            reuse_dists: vec![ReuseDistEntry {
                dist: 1,
                prob: 1.0,
                hit_prob: 0.5,
                miss_prob: 0.3,
                conf_prob: 0.2,
                sequences: vec![sequence(vec![AccessStatus::diff_bank(1.0)], 1)],
            }],
        };
        annotate(&mut thr, AnnotatorVersion::Full).unwrap();
        assert_eq!(thr.reuse_dists[0].sequences[0].cases.len(), 3);
    }
}
