//! C2 — access-sequence generation (V1/V2/V4 full enumeration, V3 Bernoulli).
//!
//! V1 and V2 share the same sequence set (a breadth-first enumeration of the
//! binary decision tree, respecting the minimum-consecutive constraints);
//! they differ only in how [`crate::composer`] combines sequences across
//! threads. V4 runs the identical search but skips the minimum-consecutive
//! check. Both walk an arena of `{parent, slot, run length}` records instead
//! of cloning partial sequences at every node, so memory stays proportional
//! to the reuse distance rather than to the search tree.

use std::collections::VecDeque;

use crate::error::{ModelError, Result};
use crate::types::{AccessSequence, AccessStatus, ConsecutiveAccProbs, ConsecutiveNoAccProbs, ThreadInfo};

const CASE_SUM_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorVersion {
    /// V1/V2: full enumeration honoring min-consecutive constraints.
    Full,
    /// V3: independent Bernoulli trial per slot, one representative
    /// sequence per target-count.
    Bernoulli,
    /// V4: full enumeration, minimum-consecutive constraints ignored.
    Independent,
}

impl GeneratorVersion {
    pub fn from_step(step: u8) -> Option<Self> {
        match step {
            1 | 2 => Some(GeneratorVersion::Full),
            3 => Some(GeneratorVersion::Bernoulli),
            4 => Some(GeneratorVersion::Independent),
            _ => None,
        }
    }
}

struct ArenaNode {
    parent: Option<usize>,
    same_chnl: bool,
    forced: bool,
    depth: usize,
    run_len: usize,
    last_target_pos: Option<usize>,
}

/// Generate every valid length-`dist` access sequence for one thread.
pub fn generate_for_distance(
    thr_info: &ThreadInfo,
    dist: usize,
    con_acc: &ConsecutiveAccProbs,
    con_noacc: &ConsecutiveNoAccProbs,
    version: GeneratorVersion,
) -> Result<Vec<AccessSequence>> {
    match version {
        GeneratorVersion::Bernoulli => generate_bernoulli(thr_info, dist),
        GeneratorVersion::Full => generate_bfs(thr_info, dist, con_acc, con_noacc, true),
        GeneratorVersion::Independent => generate_bfs(thr_info, dist, con_acc, con_noacc, false),
    }
}

fn generate_bfs(
    thr_info: &ThreadInfo,
    dist: usize,
    con_acc: &ConsecutiveAccProbs,
    con_noacc: &ConsecutiveNoAccProbs,
    enforce_min_consecutive: bool,
) -> Result<Vec<AccessSequence>> {
    let mut arena: Vec<ArenaNode> = vec![ArenaNode {
        parent: None,
        same_chnl: false,
        forced: false,
        depth: 0,
        run_len: 0,
        last_target_pos: None,
    }];
    let mut queue: VecDeque<usize> = VecDeque::new();
    queue.push_back(0);

    let mut leaves: Vec<usize> = Vec::new();

    while let Some(idx) = queue.pop_front() {
        let (depth, same_chnl, run_len, last_target_pos) = {
            let n = &arena[idx];
            (n.depth, n.same_chnl, n.run_len, n.last_target_pos)
        };

        let left_valid = child_is_valid(
            thr_info,
            true,
            depth,
            same_chnl,
            run_len,
            last_target_pos,
            enforce_min_consecutive,
        );
        let right_valid = child_is_valid(
            thr_info,
            false,
            depth,
            same_chnl,
            run_len,
            last_target_pos,
            enforce_min_consecutive,
        );

        let left_forced = left_valid && !right_valid;
        let right_forced = right_valid && !left_valid;

        if left_valid {
            let child = push_child(&mut arena, idx, true, left_forced, depth, same_chnl, run_len, last_target_pos);
            enqueue_or_finish(&mut arena, &mut queue, &mut leaves, child, dist);
        }
        if right_valid {
            let child = push_child(&mut arena, idx, false, right_forced, depth, same_chnl, run_len, last_target_pos);
            enqueue_or_finish(&mut arena, &mut queue, &mut leaves, child, dist);
        }
    }

    let mut sequences = Vec::with_capacity(leaves.len());
    for leaf in leaves {
        let slots = reconstruct(&arena, leaf);
        sequences.push(assign_probabilities(thr_info, con_acc, con_noacc, &slots));
    }
    Ok(sequences)
}

#[allow(clippy::too_many_arguments)]
fn child_is_valid(
    thr_info: &ThreadInfo,
    target: bool,
    parent_depth: usize,
    parent_same_chnl: bool,
    parent_run_len: usize,
    parent_last_target_pos: Option<usize>,
    enforce_min_consecutive: bool,
) -> bool {
    if target {
        if let Some(last) = parent_last_target_pos {
            let gap = parent_depth - last;
            if !thr_info.reuse_dist_is_valid(gap) {
                return false;
            }
        }
    }
    if !enforce_min_consecutive || parent_depth == 0 {
        return true;
    }
    // A transition ends the parent's run; the ending run must meet its
    // minimum length. Continuing the same run never fails here.
    if parent_same_chnl != target {
        let min_len = if parent_same_chnl {
            thr_info.min_con_acc
        } else {
            thr_info.min_con_noacc
        };
        parent_run_len >= min_len
    } else {
        true
    }
}

#[allow(clippy::too_many_arguments)]
fn push_child(
    arena: &mut Vec<ArenaNode>,
    parent_idx: usize,
    same_chnl: bool,
    forced: bool,
    parent_depth: usize,
    parent_same_chnl: bool,
    parent_run_len: usize,
    parent_last_target_pos: Option<usize>,
) -> usize {
    let run_len = if parent_depth > 0 && parent_same_chnl == same_chnl {
        parent_run_len + 1
    } else {
        1
    };
    let last_target_pos = if same_chnl {
        Some(parent_depth)
    } else {
        parent_last_target_pos
    };
    arena.push(ArenaNode {
        parent: Some(parent_idx),
        same_chnl,
        forced,
        depth: parent_depth + 1,
        run_len,
        last_target_pos,
    });
    arena.len() - 1
}

fn enqueue_or_finish(
    arena: &[ArenaNode],
    queue: &mut VecDeque<usize>,
    leaves: &mut Vec<usize>,
    node: usize,
    dist: usize,
) {
    if arena[node].depth == dist {
        leaves.push(node);
    } else {
        queue.push_back(node);
    }
}

fn reconstruct(arena: &[ArenaNode], leaf: usize) -> Vec<(bool, bool)> {
    let mut out = Vec::new();
    let mut cur = leaf;
    loop {
        let n = &arena[cur];
        if n.depth == 0 {
            break;
        }
        out.push((n.same_chnl, n.forced));
        cur = n.parent.expect("non-root arena node always has a parent");
    }
    out.reverse();
    out
}

/// `acc_prob`/`noacc_prob` entries are indexed by consecutive run length;
/// a run longer than the supplied table saturates at the last entry rather
/// than panicking on malformed parameter files.
fn acc_prob_at(table: &ConsecutiveAccProbs, idx: usize) -> f64 {
    table
        .acc_prob
        .get(idx)
        .or_else(|| table.acc_prob.last())
        .map(|r| r.to_f64())
        .unwrap_or(0.0)
}

fn noacc_prob_at(table: &ConsecutiveNoAccProbs, idx: usize) -> f64 {
    table
        .noacc_prob
        .get(idx)
        .or_else(|| table.noacc_prob.last())
        .map(|r| r.to_f64())
        .unwrap_or(0.0)
}

fn assign_probabilities(
    thr_info: &ThreadInfo,
    con_acc: &ConsecutiveAccProbs,
    con_noacc: &ConsecutiveNoAccProbs,
    slots: &[(bool, bool)],
) -> AccessSequence {
    let mut seq = AccessSequence::empty();
    seq.prob = 1.0;

    let mut con_acc_len = 0usize;
    let mut con_noacc_len = 0usize;

    for (i, &(chnl, forced)) in slots.iter().enumerate() {
        if chnl {
            seq.total_target_accs += 1;
        }

        let p = if forced {
            1.0
        } else if i == 0 {
            if chnl {
                thr_info.chnl_prob
            } else {
                1.0 - thr_info.chnl_prob
            }
        } else if con_acc_len != 0 && chnl {
            acc_prob_at(con_acc, con_acc_len)
        } else if con_acc_len != 0 && !chnl {
            1.0 - acc_prob_at(con_acc, con_acc_len)
        } else if con_noacc_len != 0 && !chnl {
            noacc_prob_at(con_noacc, con_noacc_len)
        } else {
            1.0 - noacc_prob_at(con_noacc, con_noacc_len)
        };

        if chnl {
            con_acc_len += 1;
            con_noacc_len = 0;
        } else {
            con_acc_len = 0;
            con_noacc_len += 1;
        }

        seq.prob *= p;
        seq.slots.push(AccessStatus {
            same_chnl: chnl,
            same_bank: false,
            same_row: false,
            prob: p,
        });
    }

    seq
}

fn generate_bernoulli(thr_info: &ThreadInfo, dist: usize) -> Result<Vec<AccessSequence>> {
    let p = thr_info.chnl_prob;
    let mut sequences = Vec::with_capacity(dist + 1);
    let mut sum_prob = 0.0;

    for k in 0..=dist {
        let mut slots = Vec::with_capacity(dist);
        for _ in 0..k {
            slots.push(AccessStatus {
                same_chnl: true,
                same_bank: false,
                same_row: false,
                prob: p,
            });
        }
        for _ in k..dist {
            slots.push(AccessStatus {
                same_chnl: false,
                same_bank: false,
                same_row: false,
                prob: 1.0 - p,
            });
        }
        if slots.len() != dist {
            return Err(ModelError::V3LengthMismatch {
                expected: dist,
                observed: slots.len(),
            });
        }
        let prob = crate::combinatorics::combination(dist as i64, k as i64)
            * p.powi(k as i32)
            * (1.0 - p).powi((dist - k) as i32);
        sum_prob += prob;
        sequences.push(AccessSequence {
            slots,
            prob,
            total_target_accs: k,
            cases: Vec::new(),
        });
    }

    if (sum_prob - 1.0).abs() > CASE_SUM_TOLERANCE.max(1e-6) {
        return Err(ModelError::V3ProbabilitySum(sum_prob));
    }

    Ok(sequences)
}
