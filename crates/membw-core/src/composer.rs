//! C4 — composing per-thread access sequences into interference patterns.
//!
//! Ordered composition (step3 version 1) takes the Cartesian product of the
//! contending threads' sequence sets: thread position matters, so `(A, B)`
//! and `(B, A)` are distinct patterns each carrying the plain product of
//! probabilities. Multiset composition (versions 2 and 3) instead enumerates
//! combinations-with-replacement and folds the distinct orderings back in
//! through [`crate::combinatorics::multinomial_count`], since the resolver
//! only distinguishes threads by which sequence they drew, not by position.

use std::rc::Rc;

use crate::combinatorics::multinomial_count;
use crate::error::{ModelError, Result};
use crate::types::{AccessSequence, InterferencePattern, ReuseDistEntry};

const PATTERN_SUM_TOLERANCE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerVersion {
    /// Ordered Cartesian product (feeds the V1 positional resolver).
    Ordered,
    /// Combinations-with-replacement (feeds the V2 counting and V3
    /// existence resolvers).
    Multiset,
}

impl ComposerVersion {
    pub fn from_step(step: u8) -> Option<Self> {
        match step {
            1 => Some(ComposerVersion::Ordered),
            2 | 3 => Some(ComposerVersion::Multiset),
            _ => None,
        }
    }
}

/// Compose one reuse-distance group's interference patterns.
///
/// `target_entry` is the target thread's own reuse-distance statistics.
/// `contender_entry` is the (shared, since contending threads are
/// statistically interchangeable) reuse-distance entry every other thread
/// draws its access sequence from; `contender_cnt` is `thread_cnt - 1`, the
/// number of contending threads (the orchestrator subtracts the target
/// thread before calling in here).
///
/// `contender_cnt == 0` (no contention) short-circuits to a single pattern
/// with an empty thread list, carrying the whole group's probability mass
/// untouched — the resolver then has nothing to interfere with the target
/// thread's own hit/miss/conflict state.
pub fn compose(
    target_entry: &ReuseDistEntry,
    contender_entry: &ReuseDistEntry,
    contender_cnt: usize,
    version: ComposerVersion,
) -> Result<Vec<InterferencePattern>> {
    if contender_cnt == 0 {
        return Ok(vec![InterferencePattern {
            dist: target_entry.dist,
            thread_cnt: 1,
            prob: target_entry.prob,
            total_target_accs: 0,
            threads: Vec::new(),
        }]);
    }

    if contender_entry.dist != target_entry.dist {
        return Err(ModelError::ReuseDistanceNotFound {
            dist: target_entry.dist,
            stage: "composer",
        });
    }

    let sequences: Vec<Rc<AccessSequence>> = contender_entry
        .sequences
        .iter()
        .cloned()
        .map(Rc::new)
        .collect();

    let patterns = match version {
        ComposerVersion::Ordered => compose_ordered(target_entry, &sequences, contender_cnt),
        ComposerVersion::Multiset => compose_multiset(target_entry, &sequences, contender_cnt),
    };

    let observed: f64 = patterns.iter().map(|p| p.prob).sum();
    let expected = target_entry.prob;
    if (observed - expected).abs() > PATTERN_SUM_TOLERANCE {
        return Err(ModelError::ProbabilityMass {
            stage: format!("composer(dist={})", target_entry.dist),
            expected,
            observed,
            tolerance: PATTERN_SUM_TOLERANCE,
        });
    }

    Ok(patterns)
}

fn compose_ordered(
    target_entry: &ReuseDistEntry,
    sequences: &[Rc<AccessSequence>],
    contender_cnt: usize,
) -> Vec<InterferencePattern> {
    if sequences.is_empty() {
        return Vec::new();
    }

    let mut patterns = Vec::new();
    let mut indices = vec![0usize; contender_cnt];
    loop {
        let threads: Vec<Rc<AccessSequence>> = indices.iter().map(|&i| sequences[i].clone()).collect();
        let prob: f64 = target_entry.prob * threads.iter().map(|s| s.prob).product::<f64>();
        let total_target_accs = threads.iter().map(|s| s.total_target_accs).sum();
        patterns.push(InterferencePattern {
            dist: target_entry.dist,
            thread_cnt: contender_cnt + 1,
            prob,
            total_target_accs,
            threads,
        });

        // Odometer increment over `sequences.len()` digits.
        let mut pos = contender_cnt;
        loop {
            if pos == 0 {
                return patterns;
            }
            pos -= 1;
            indices[pos] += 1;
            if indices[pos] < sequences.len() {
                break;
            }
            indices[pos] = 0;
        }
    }
}

fn compose_multiset(
    target_entry: &ReuseDistEntry,
    sequences: &[Rc<AccessSequence>],
    contender_cnt: usize,
) -> Vec<InterferencePattern> {
    if sequences.is_empty() {
        return Vec::new();
    }

    let mut patterns = Vec::new();
    let mut combo = Vec::with_capacity(contender_cnt);
    combinations_with_replacement(sequences.len(), contender_cnt, 0, &mut combo, &mut |indices| {
        let weight = multinomial_count(indices);
        let threads: Vec<Rc<AccessSequence>> = indices.iter().map(|&i| sequences[i].clone()).collect();
        let base_prob: f64 = threads.iter().map(|s| s.prob).product();
        let prob = target_entry.prob * weight * base_prob;
        let total_target_accs = threads.iter().map(|s| s.total_target_accs).sum();
        patterns.push(InterferencePattern {
            dist: target_entry.dist,
            thread_cnt: contender_cnt + 1,
            prob,
            total_target_accs,
            threads,
        });
    });
    patterns
}

fn combinations_with_replacement(
    n: usize,
    k: usize,
    start: usize,
    combo: &mut Vec<usize>,
    emit: &mut dyn FnMut(&[usize]),
) {
    if combo.len() == k {
        emit(combo);
        return;
    }
    for i in start..n {
        combo.push(i);
        combinations_with_replacement(n, k, i, combo, emit);
        combo.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AccessSequence;

    fn entry(dist: usize, prob: f64, seq_probs: &[f64]) -> ReuseDistEntry {
        ReuseDistEntry {
            dist,
            prob,
            hit_prob: 0.0,
            miss_prob: 0.0,
            conf_prob: 0.0,
            sequences: seq_probs
                .iter()
                .map(|&p| AccessSequence {
                    slots: Vec::new(),
                    prob: p,
                    total_target_accs: 0,
                    cases: Vec::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn ordered_covers_every_combination() {
        let target = entry(1, 1.0, &[1.0]);
        let contender = entry(1, 1.0, &[0.5, 0.5]);
        let patterns = compose(&target, &contender, 2, ComposerVersion::Ordered).unwrap();
        assert_eq!(patterns.len(), 4);
        let sum: f64 = patterns.iter().map(|p| p.prob).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn multiset_weights_distinct_orderings() {
        let target = entry(1, 1.0, &[1.0]);
        let contender = entry(1, 1.0, &[0.5, 0.5]);
        let patterns = compose(&target, &contender, 2, ComposerVersion::Multiset).unwrap();
        // (0,0), (0,1), (1,1): three multiset combos.
        assert_eq!(patterns.len(), 3);
        let sum: f64 = patterns.iter().map(|p| p.prob).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn mismatched_distance_is_rejected() {
        let target = entry(1, 1.0, &[1.0]);
        let contender = entry(2, 1.0, &[1.0]);
        let err = compose(&target, &contender, 1, ComposerVersion::Ordered).unwrap_err();
        assert!(matches!(err, ModelError::ReuseDistanceNotFound { .. }));
    }

    #[test]
    fn zero_contenders_is_a_single_trivial_pattern() {
        let target = entry(3, 0.4, &[1.0]);
        // Distance mismatch here would normally be rejected, but zero
        // contenders never looks at the contender entry at all.
        let contender = entry(9, 1.0, &[1.0]);
        let patterns = compose(&target, &contender, 0, ComposerVersion::Ordered).unwrap();
        assert_eq!(patterns.len(), 1);
        assert!(patterns[0].threads.is_empty());
        assert!((patterns[0].prob - 0.4).abs() < 1e-12);
    }
}
