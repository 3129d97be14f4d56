//! Shared data model: thread statistics, reuse-distance entries, access
//! sequences and their annotated cases, interference patterns, and the
//! final HIT/MISS/CONFLICT ratio triple.
//!
//! Ownership flows strictly downstream — generator produces sequences,
//! annotator attaches cases to them, composer groups them into patterns,
//! resolver consumes patterns and folds them into ratios. Nothing is
//! mutated once handed to the next stage.

use std::rc::Rc;

use crate::rational::Rational;

/// Probability of a single memory access, with its row/bank/channel state
/// relative to the target thread's previous same-channel access.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccessStatus {
    pub same_chnl: bool,
    pub same_bank: bool,
    pub same_row: bool,
    pub prob: f64,
}

impl AccessStatus {
    pub fn other_channel(prob: f64) -> Self {
        AccessStatus {
            same_chnl: false,
            same_bank: false,
            same_row: false,
            prob,
        }
    }

    pub fn same_bank_same_row(prob: f64) -> Self {
        AccessStatus {
            same_chnl: true,
            same_bank: true,
            same_row: true,
            prob,
        }
    }

    pub fn same_bank_diff_row(prob: f64) -> Self {
        AccessStatus {
            same_chnl: true,
            same_bank: true,
            same_row: false,
            prob,
        }
    }

    pub fn diff_bank(prob: f64) -> Self {
        AccessStatus {
            same_chnl: true,
            same_bank: false,
            same_row: false,
            prob,
        }
    }
}

/// One fully annotated realization of an access sequence: every slot has a
/// concrete row/bank/channel state, and the totals used by the counting and
/// existence resolvers are precomputed.
#[derive(Debug, Clone)]
pub struct AccSeqCase {
    pub slots: Vec<AccessStatus>,
    pub total_target_accs: usize,
    pub total_same_row: usize,
    pub total_same_bank_diff_row: usize,
    pub prob: f64,
}

/// A single non-target thread's accesses between two consecutive
/// same-channel accesses of the target thread.
#[derive(Debug, Clone)]
pub struct AccessSequence {
    pub slots: Vec<AccessStatus>,
    pub prob: f64,
    pub total_target_accs: usize,
    pub cases: Vec<AccSeqCase>,
}

impl AccessSequence {
    pub fn empty() -> Self {
        AccessSequence {
            slots: Vec::new(),
            prob: 0.0,
            total_target_accs: 0,
            cases: Vec::new(),
        }
    }
}

/// Statistics for one channel reuse distance of the target thread.
#[derive(Debug, Clone)]
pub struct ReuseDistEntry {
    pub dist: usize,
    pub prob: f64,
    pub hit_prob: f64,
    pub miss_prob: f64,
    pub conf_prob: f64,
    pub sequences: Vec<AccessSequence>,
}

/// Full per-thread statistics driving both ratio-model stages.
#[derive(Debug, Clone)]
pub struct ThreadInfo {
    pub chnl_prob: f64,
    pub bank_prob: f64,
    pub row_prob: f64,
    pub reorder_time_ns: f64,
    pub autoclose_time_ns: f64,
    pub est_serv_time_ns: f64,
    pub half_reorder: bool,
    pub min_con_acc: usize,
    pub min_con_noacc: usize,
    pub reuse_dists: Vec<ReuseDistEntry>,
}

impl ThreadInfo {
    pub fn find_reuse_dist(&self, dist: usize) -> Option<&ReuseDistEntry> {
        self.reuse_dists.iter().find(|d| d.dist == dist)
    }

    pub fn reuse_dist_is_valid(&self, dist: usize) -> bool {
        self.reuse_dists.iter().any(|d| d.dist == dist)
    }
}

/// `acc_prob[k]`: P(next slot targets the channel | k consecutive target hits).
#[derive(Debug, Clone, Default)]
pub struct ConsecutiveAccProbs {
    pub acc_prob: Vec<Rational>,
}

/// `noacc_prob[k]`: P(next slot misses the channel | k consecutive misses).
#[derive(Debug, Clone, Default)]
pub struct ConsecutiveNoAccProbs {
    pub noacc_prob: Vec<Rational>,
}

/// One reuse-distance group's composed interference pattern: the target
/// thread's slot plus `thread_cnt - 1` contending access sequences.
#[derive(Debug, Clone)]
pub struct InterferencePattern {
    pub dist: usize,
    pub thread_cnt: usize,
    pub prob: f64,
    pub total_target_accs: usize,
    pub threads: Vec<Rc<AccessSequence>>,
}

/// Final HIT / MISS / CONFLICT mass, always intended to sum to 1.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct HmcRatios {
    pub hit: f64,
    pub miss: f64,
    pub conflict: f64,
}

impl HmcRatios {
    pub fn zero() -> Self {
        HmcRatios::default()
    }

    pub fn sum(&self) -> f64 {
        self.hit + self.miss + self.conflict
    }

    pub fn add(&mut self, other: HmcRatios) {
        self.hit += other.hit;
        self.miss += other.miss;
        self.conflict += other.conflict;
    }
}
