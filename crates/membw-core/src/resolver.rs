//! C5 — resolving interference patterns into HIT/MISS/CONFLICT mass.
//!
//! Every pattern is resolved three times, once per possible prior state of
//! the target thread's previous same-channel access (HIT-like, MISS-like,
//! CONFLICT-like), weighted by the reuse-distance group's own
//! `hit_prob`/`miss_prob`/`conf_prob`. The prior state matters only when the
//! contending threads leave no trace of their own: a thread that opened no
//! row in the target's bank can't override what the target's own last
//! access left behind, so in that case the resolver falls back to the prior
//! state untouched. This is what makes `thread_cnt == 1` (zero contenders,
//! see [`crate::composer`]) reproduce the reuse-distance entry's own ratios
//! exactly, regardless of which resolver version is selected.
//!
//! All three resolvers share [`cases_for_pattern`], the Cartesian product of
//! every contending thread's annotated cases, weighted by the product of
//! their case probabilities. They differ in what they do with the combined
//! state that product represents:
//!
//! - V1 (positional) walks the interleaved slot grid backward from the end
//!   of the pattern, looking for the nearest same-bank and same-row access.
//!   The prior state itself acts as a virtual access standing just beyond
//!   the pattern: a HIT-like prior promotes a virtual same-row access, a
//!   CONFLICT-like prior promotes a virtual same-bank access, and it's only
//!   consulted when nothing closer exists.
//! - V2 (counting) only needs how many same-row and same-bank-different-row
//!   accesses occurred in the window, and reasons about where the last one
//!   of each landed using the [`crate::combinatorics`] positional-probability
//!   helpers.
//! - V3 (existence) only needs whether each kind of access occurred at all,
//!   dispatching on a fixed (prior state, has-same-row, has-same-bank) table.
//!
//! One quirk is preserved deliberately rather than "fixed": V2's half-reorder
//! adjustment is applied twice for the same-bank-only scenario — once
//! locally, once again in a pattern-wide pass after every scenario's base
//! ratios are computed.

use crate::combinatorics::{prob_m_after_n, prob_m_between_d1_d2, prob_m_within_d};
use crate::error::Result;
use crate::types::{AccSeqCase, AccessStatus, HmcRatios, InterferencePattern, ReuseDistEntry, ThreadInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverVersion {
    Positional,
    Counting,
    Existence,
}

impl ResolverVersion {
    pub fn from_step(step: u8) -> Option<Self> {
        match step {
            1 => Some(ResolverVersion::Positional),
            2 => Some(ResolverVersion::Counting),
            3 => Some(ResolverVersion::Existence),
            _ => None,
        }
    }
}

/// The target thread's previous same-channel access, as it looked before
/// any of the current window's contending accesses happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrigState {
    Hit,
    Miss,
    Conflict,
}

impl OrigState {
    const ALL: [OrigState; 3] = [OrigState::Hit, OrigState::Miss, OrigState::Conflict];

    fn weight(self, entry: &ReuseDistEntry) -> f64 {
        match self {
            OrigState::Hit => entry.hit_prob,
            OrigState::Miss => entry.miss_prob,
            OrigState::Conflict => entry.conf_prob,
        }
    }

    fn identity(self) -> HmcRatios {
        match self {
            OrigState::Hit => HmcRatios { hit: 1.0, miss: 0.0, conflict: 0.0 },
            OrigState::Miss => HmcRatios { hit: 0.0, miss: 1.0, conflict: 0.0 },
            OrigState::Conflict => HmcRatios { hit: 0.0, miss: 0.0, conflict: 1.0 },
        }
    }
}

/// Every combination of one case per contending thread, with its joint
/// probability already folded in.
pub fn cases_for_pattern(pattern: &InterferencePattern) -> Vec<(f64, Vec<AccSeqCase>)> {
    let mut combos: Vec<(f64, Vec<AccSeqCase>)> = vec![(1.0, Vec::new())];
    for thread in &pattern.threads {
        let mut next = Vec::with_capacity(combos.len() * thread.cases.len().max(1));
        for (prob, chosen) in &combos {
            for case in &thread.cases {
                let mut chosen = chosen.clone();
                chosen.push(case.clone());
                next.push((prob * case.prob, chosen));
            }
        }
        combos = next;
    }
    combos
}

/// Resolve every pattern in a reuse-distance group, weighted across the
/// group's hit/miss/conflict prior states, folding the result into a
/// running total.
pub fn resolve_group(
    patterns: &[InterferencePattern],
    target_entry: &ReuseDistEntry,
    thr_info: &ThreadInfo,
    version: ResolverVersion,
) -> Result<HmcRatios> {
    let mut total = HmcRatios::zero();
    for pattern in patterns {
        let combos = cases_for_pattern(pattern);
        for (combo_prob, cases) in combos {
            let weight = pattern.prob * combo_prob;
            for orig in OrigState::ALL {
                let prior_weight = orig.weight(target_entry);
                if prior_weight == 0.0 {
                    continue;
                }
                let ratios = match version {
                    ResolverVersion::Positional => resolve_positional(&cases, thr_info, orig),
                    ResolverVersion::Counting => resolve_counting(&cases, thr_info, orig),
                    ResolverVersion::Existence => resolve_existence(&cases, thr_info, orig),
                };
                let w = weight * prior_weight;
                total.hit += ratios.hit * w;
                total.miss += ratios.miss * w;
                total.conflict += ratios.conflict * w;
            }
        }
    }
    Ok(total)
}

fn half(a: HmcRatios, b: HmcRatios) -> HmcRatios {
    HmcRatios {
        hit: 0.5 * (a.hit + b.hit),
        miss: 0.5 * (a.miss + b.miss),
        conflict: 0.5 * (a.conflict + b.conflict),
    }
}

const HIT: HmcRatios = HmcRatios { hit: 1.0, miss: 0.0, conflict: 0.0 };
const MISS: HmcRatios = HmcRatios { hit: 0.0, miss: 1.0, conflict: 0.0 };
const CONFLICT: HmcRatios = HmcRatios { hit: 0.0, miss: 0.0, conflict: 1.0 };

/// Merge every contending thread's slots in slot-major, then thread-major
/// order (the spec's interleaving: all threads' first slot, then all
/// threads' second slot, ...), keeping only the target-channel ones — only
/// those count as "intervening accesses" between the target's own two
/// endpoint accesses.
fn merged_target_channel_slots(cases: &[AccSeqCase]) -> Vec<AccessStatus> {
    let max_len = cases.iter().map(|c| c.slots.len()).max().unwrap_or(0);
    let mut merged = Vec::new();
    for i in 0..max_len {
        for case in cases {
            if let Some(slot) = case.slots.get(i) {
                if slot.same_chnl {
                    merged.push(*slot);
                }
            }
        }
    }
    merged
}

fn resolve_positional(cases: &[AccSeqCase], thr_info: &ThreadInfo, orig: OrigState) -> HmcRatios {
    let merged = merged_target_channel_slots(cases);

    let mut last_bank_pos: Option<usize> = None;
    let mut last_row_pos: Option<usize> = None;
    for (back_idx, slot) in merged.iter().rev().enumerate() {
        let pos = back_idx + 1;
        if slot.same_bank && last_bank_pos.is_none() {
            last_bank_pos = Some(pos);
        }
        if slot.same_row && last_row_pos.is_none() {
            last_row_pos = Some(pos);
        }
        if last_bank_pos.is_some() && last_row_pos.is_some() {
            break;
        }
    }

    // The prior access itself stands one slot beyond every real contending
    // access; it only dominates when nothing closer already answered the
    // same question.
    let beyond = merged.len() + 1;
    match orig {
        OrigState::Conflict if last_bank_pos.is_none() => last_bank_pos = Some(beyond),
        OrigState::Hit if last_row_pos.is_none() => last_row_pos = Some(beyond),
        _ => {}
    }

    let autoclose = thr_info.autoclose_time_ns;
    let reorder = thr_info.reorder_time_ns;
    let est = thr_info.est_serv_time_ns;
    let half_reorder = thr_info.half_reorder;

    let row_time = last_row_pos.map(|p| p as f64 * est);
    let bank_time = last_bank_pos.map(|p| p as f64 * est);

    // HIT reached only via the reorder window (never via autoclose) is the
    // one `half_reorder` splits, per the spec's note on Case 1/2/4.
    let hit_via_reorder = || if half_reorder { half(HIT, CONFLICT) } else { HIT };

    match (last_bank_pos, last_row_pos) {
        (Some(b), Some(r)) if r <= b => {
            // Case 1: the most recent access left the target's row open.
            if row_time.unwrap() <= autoclose {
                HIT
            } else if row_time.unwrap() <= reorder {
                hit_via_reorder()
            } else {
                MISS
            }
        }
        (Some(_), Some(_)) => {
            // Case 2: the row was closed more recently than it was opened.
            // A reorder window lets the controller still serve it as a hit;
            // otherwise it falls through to case 3's bank-state test.
            if row_time.unwrap() <= reorder {
                hit_via_reorder()
            } else if bank_time.unwrap() <= autoclose {
                CONFLICT
            } else {
                MISS
            }
        }
        (Some(_), None) => {
            // Case 3: the bank was touched but never on the target's row.
            if bank_time.unwrap() <= autoclose {
                CONFLICT
            } else {
                MISS
            }
        }
        (None, Some(_)) => {
            // Case 4: same as case 1, just without a same-bank reference.
            if row_time.unwrap() <= autoclose {
                HIT
            } else if row_time.unwrap() <= reorder {
                hit_via_reorder()
            } else {
                MISS
            }
        }
        (None, None) => MISS,
    }
}

fn resolve_counting(cases: &[AccSeqCase], thr_info: &ThreadInfo, orig: OrigState) -> HmcRatios {
    let total_sr: usize = cases.iter().map(|c| c.total_same_row).sum();
    let total_sb: usize = cases.iter().map(|c| c.total_same_bank_diff_row).sum();

    if total_sr == 0 && total_sb == 0 {
        return orig.identity();
    }

    let l: i64 = cases.iter().map(|c| c.slots.len() as i64).sum::<i64>().max(1);

    let d_reorder = (thr_info.reorder_time_ns / thr_info.est_serv_time_ns).max(0.0).round() as i64;
    let d_autoclose = (thr_info.autoclose_time_ns / thr_info.est_serv_time_ns).max(0.0).round() as i64;

    let (mut hit, mut miss, mut conflict, scenario);

    if total_sb > 0 && total_sr == 0 {
        scenario = 1;
        let m = total_sb as i64;
        let n = l - m;
        let p_recent = prob_m_within_d(m, n, l, d_autoclose);
        conflict = p_recent;
        miss = 1.0 - p_recent;
        hit = 0.0;
        if thr_info.half_reorder {
            let shifted = miss * 0.5;
            miss -= shifted;
            hit += shifted;
        }
    } else if total_sr > 0 && total_sb == 0 {
        scenario = 2;
        let m = total_sr as i64;
        let n = l - m;
        let p_recent = prob_m_within_d(m, n, l, d_reorder);
        hit = p_recent;
        miss = 1.0 - p_recent;
        conflict = 0.0;
    } else {
        scenario = 3;
        let m_sb = total_sb as i64;
        let n_sb = l - m_sb;
        // Autoclose is the nearer (smaller) bound, reorder the farther one —
        // the window the bank stays a conflict spans from the autoclose
        // frame out to the reorder frame, same ordering as every other
        // autoclose/reorder pair in this resolver.
        let p_between = prob_m_between_d1_d2(m_sb, n_sb, l, d_autoclose, d_reorder);
        let p_sr_after_sb = prob_m_after_n(total_sr as i64, total_sb as i64, l);
        conflict = p_between;
        hit = p_sr_after_sb * (1.0 - p_between);
        miss = (1.0 - hit - conflict).max(0.0);
    }

    // A same-bank-only scenario gets its half-reorder credit twice: once
    // above, and again here.
    if scenario == 1 && thr_info.half_reorder {
        let shifted = conflict * 0.5;
        conflict -= shifted;
        hit += shifted;
    }

    HmcRatios { hit, miss, conflict }
}

/// The existence resolver's prior-state × (has-same-row, has-same-bank)
/// dispatch table, straight out of the spec. `n_access_time` is the
/// pattern's aggregate `N * est_serv_time` used for the autoclose/reorder
/// tests in the two "neither present" and "bank only" rows.
fn resolve_existence(cases: &[AccSeqCase], thr_info: &ThreadInfo, orig: OrigState) -> HmcRatios {
    let has_row = cases.iter().any(|c| c.total_same_row > 0);
    let has_sb = cases.iter().any(|c| c.total_same_bank_diff_row > 0);

    let n: usize = cases.iter().map(|c| c.total_target_accs).sum();
    let n_access_time = n as f64 * thr_info.est_serv_time_ns;
    let reorder_able = n_access_time <= thr_info.reorder_time_ns;
    let autoclose_open = n_access_time <= thr_info.autoclose_time_ns;
    let half_reorder = thr_info.half_reorder;

    let ratios = match (orig, has_row, has_sb) {
        (OrigState::Hit, false, false) => {
            if autoclose_open {
                HIT
            } else if reorder_able {
                HIT
            } else {
                MISS
            }
        }
        (OrigState::Hit, true, false) => HIT,
        (OrigState::Hit, false, true) => {
            if reorder_able {
                HIT
            } else {
                half(MISS, CONFLICT)
            }
        }
        (OrigState::Hit, true, true) => {
            if reorder_able {
                HIT
            } else {
                half(HIT, CONFLICT)
            }
        }
        (OrigState::Miss, false, false) => MISS,
        (OrigState::Miss, true, false) => HIT,
        (OrigState::Miss, false, true) => CONFLICT,
        (OrigState::Miss, true, true) => half(HIT, CONFLICT),
        (OrigState::Conflict, false, false) => {
            if autoclose_open {
                CONFLICT
            } else {
                MISS
            }
        }
        (OrigState::Conflict, true, false) => {
            if half_reorder {
                half(HIT, CONFLICT)
            } else {
                HIT
            }
        }
        (OrigState::Conflict, false, true) => CONFLICT,
        (OrigState::Conflict, true, true) => half(HIT, CONFLICT),
    };

    ratios
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thr_info(half_reorder: bool, reorder_ns: f64, autoclose_ns: f64) -> ThreadInfo {
        ThreadInfo {
            chnl_prob: 0.25,
            bank_prob: 0.4,
            row_prob: 0.3,
            reorder_time_ns: reorder_ns,
            autoclose_time_ns: autoclose_ns,
            est_serv_time_ns: 1.0,
            half_reorder,
            min_con_acc: 1,
            min_con_noacc: 1,
            reuse_dists: Vec::new(),
        }
    }

    fn group(hit: f64, miss: f64, conf: f64) -> ReuseDistEntry {
        ReuseDistEntry {
            dist: 1,
            prob: 1.0,
            hit_prob: hit,
            miss_prob: miss,
            conf_prob: conf,
            sequences: Vec::new(),
        }
    }

    #[test]
    fn positional_no_interference_preserves_prior() {
        let info = thr_info(false, 5.0, 10.0);
        assert_eq!(resolve_positional(&[], &info, OrigState::Hit).hit, 1.0);
        assert_eq!(resolve_positional(&[], &info, OrigState::Miss).miss, 1.0);
        assert_eq!(resolve_positional(&[], &info, OrigState::Conflict).conflict, 1.0);
    }

    #[test]
    fn positional_bank_only_is_conflict_within_autoclose() {
        let case = AccSeqCase {
            slots: vec![AccessStatus::diff_bank(1.0)],
            total_target_accs: 1,
            total_same_row: 0,
            total_same_bank_diff_row: 1,
            prob: 1.0,
        };
        let ratios = resolve_positional(std::slice::from_ref(&case), &thr_info(false, 5.0, 10.0), OrigState::Hit);
        assert_eq!(ratios.conflict, 1.0);
        assert_eq!(ratios.miss, 0.0);
    }

    #[test]
    fn existence_both_present_always_splits_hit_conflict() {
        let case = AccSeqCase {
            slots: Vec::new(),
            total_target_accs: 2,
            total_same_row: 1,
            total_same_bank_diff_row: 1,
            prob: 1.0,
        };
        let ratios = resolve_existence(std::slice::from_ref(&case), &thr_info(true, 5.0, 10.0), OrigState::Hit);
        assert_eq!(ratios.hit, 0.5);
        assert_eq!(ratios.conflict, 0.5);
        assert_eq!(ratios.miss, 0.0);
    }

    #[test]
    fn existence_miss_prior_with_bank_interference_is_conflict() {
        let case = AccSeqCase {
            slots: Vec::new(),
            total_target_accs: 1,
            total_same_row: 0,
            total_same_bank_diff_row: 1,
            prob: 1.0,
        };
        let ratios = resolve_existence(std::slice::from_ref(&case), &thr_info(false, 5.0, 10.0), OrigState::Miss);
        assert_eq!(ratios.conflict, 1.0);
    }

    #[test]
    fn counting_no_events_preserves_prior() {
        let case = AccSeqCase {
            slots: vec![AccessStatus::other_channel(1.0)],
            total_target_accs: 0,
            total_same_row: 0,
            total_same_bank_diff_row: 0,
            prob: 1.0,
        };
        let info = thr_info(false, 5.0, 10.0);
        assert_eq!(resolve_counting(std::slice::from_ref(&case), &info, OrigState::Conflict).conflict, 1.0);
    }

    #[test]
    fn counting_both_row_and_bank_interference_can_emit_conflict() {
        // scenario 3 (total_sr>0 && total_sb>0): with reorder_time_ns well
        // past autoclose_time_ns, the window between the two frames must
        // contribute non-zero conflict mass via prob_m_between_d1_d2.
        let case = AccSeqCase {
            slots: vec![AccessStatus::diff_bank(1.0); 6],
            total_target_accs: 3,
            total_same_row: 1,
            total_same_bank_diff_row: 2,
            prob: 1.0,
        };
        let info = thr_info(false, 4.0, 2.0);
        let ratios = resolve_counting(std::slice::from_ref(&case), &info, OrigState::Hit);
        assert!(ratios.conflict > 0.0, "conflict={}", ratios.conflict);
        assert!((ratios.hit + ratios.miss + ratios.conflict - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cases_for_pattern_is_cartesian_product() {
        let seq_a = std::rc::Rc::new(crate::types::AccessSequence {
            slots: Vec::new(),
            prob: 1.0,
            total_target_accs: 0,
            cases: vec![
                AccSeqCase {
                    slots: Vec::new(),
                    total_target_accs: 0,
                    total_same_row: 0,
                    total_same_bank_diff_row: 0,
                    prob: 0.5,
                },
                AccSeqCase {
                    slots: Vec::new(),
                    total_target_accs: 0,
                    total_same_row: 1,
                    total_same_bank_diff_row: 0,
                    prob: 0.5,
                },
            ],
        });
        let pattern = InterferencePattern {
            dist: 1,
            thread_cnt: 2,
            prob: 1.0,
            total_target_accs: 0,
            threads: vec![seq_a.clone(), seq_a],
        };
        let combos = cases_for_pattern(&pattern);
        assert_eq!(combos.len(), 4);
        let sum: f64 = combos.iter().map(|(p, _)| p).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn resolve_group_with_no_contention_reproduces_marginal() {
        let pattern = InterferencePattern {
            dist: 1,
            thread_cnt: 1,
            prob: 1.0,
            total_target_accs: 0,
            threads: Vec::new(),
        };
        let entry = group(0.5, 0.3, 0.2);
        let info = thr_info(false, 5.0, 10.0);
        for version in [ResolverVersion::Positional, ResolverVersion::Counting, ResolverVersion::Existence] {
            let ratios = resolve_group(std::slice::from_ref(&pattern), &entry, &info, version).unwrap();
            assert!((ratios.hit - 0.5).abs() < 1e-9, "{version:?}: hit={}", ratios.hit);
            assert!((ratios.miss - 0.3).abs() < 1e-9, "{version:?}: miss={}", ratios.miss);
            assert!((ratios.conflict - 0.2).abs() < 1e-9, "{version:?}: conflict={}", ratios.conflict);
        }
    }
}
