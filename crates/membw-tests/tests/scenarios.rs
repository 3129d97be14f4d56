//! Black-box scenario tests against the public `membw-core` API: feed a
//! parameter file (or hand-built latency parameters) through the same entry
//! points the CLIs use and check the documented end-to-end behavior.

use membw_core::latency::{compute_latency, LatencyParams};
use membw_core::orchestrator::{run_ratio_model, StepVersions};
use membw_core::params;
use membw_core::types::HmcRatios;

fn one_thread_param_file() -> String {
    "t:0.25,0.4,0.3,1,1\na:4,1.0,0.5,0.3,0.2,5.0,10.0,1.0\nca:1/4\ncn:3/4\n".to_string()
}

/// S1: a solo thread (no contention) must reproduce its own marginal
/// hit/miss/conflict split exactly, for every step-version combination.
#[test]
fn solo_thread_reproduces_marginal_for_every_step_combo() {
    let contents = one_thread_param_file();
    let con_acc_noacc = params::parse_consecutive_tables(&contents).unwrap();

    for step1 in 1..=4u8 {
        for step2 in 1..=3u8 {
            for step3 in 1..=3u8 {
                for step4 in 1..=3u8 {
                    let target = params::parse_thread_info(&contents).unwrap();
                    let mut contender = params::parse_thread_info(&contents).unwrap();
                    let steps = StepVersions { step1, step2, step3, step4 };
                    let ratios =
                        run_ratio_model(&target, &mut contender, 1, &con_acc_noacc.0, &con_acc_noacc.1, steps)
                            .unwrap_or_else(|e| panic!("steps {step1},{step2},{step3},{step4}: {e}"));
                    assert!((ratios.hit - 0.5).abs() < 1e-9, "steps {step1},{step2},{step3},{step4}");
                    assert!((ratios.miss - 0.3).abs() < 1e-9, "steps {step1},{step2},{step3},{step4}");
                    assert!((ratios.conflict - 0.2).abs() < 1e-9, "steps {step1},{step2},{step3},{step4}");
                }
            }
        }
    }
}

/// thread_cnt=1 with multiple reuse distances must reproduce the
/// probability-weighted marginal across every distance, not just a single
/// one.
#[test]
fn solo_thread_with_multiple_reuse_distances_reproduces_weighted_marginal() {
    let contents = "t:0.25,0.4,0.3,1,1\n\
                    a:1,0.6,0.9,0.1,0.0,5.0,10.0,1.0\n\
                    a:4,0.4,0.2,0.3,0.5,5.0,10.0,1.0\n\
                    ca:1/4\ncn:3/4\n";
    let target = params::parse_thread_info(contents).unwrap();
    let mut contender = params::parse_thread_info(contents).unwrap();
    let (con_acc, con_noacc) = params::parse_consecutive_tables(contents).unwrap();
    let steps = StepVersions { step1: 1, step2: 1, step3: 1, step4: 1 };

    let ratios = run_ratio_model(&target, &mut contender, 1, &con_acc, &con_noacc, steps).unwrap();

    let expected_hit = 0.6 * 0.9 + 0.4 * 0.2;
    let expected_miss = 0.6 * 0.1 + 0.4 * 0.3;
    let expected_conf = 0.6 * 0.0 + 0.4 * 0.5;
    assert!((ratios.hit - expected_hit).abs() < 1e-9);
    assert!((ratios.miss - expected_miss).abs() < 1e-9);
    assert!((ratios.conflict - expected_conf).abs() < 1e-9);
}

/// S5: with contention present but the target's original state a HIT, and
/// the autoclose window wide enough to cover the whole contending window
/// (`N * est_serv <= autoclose`), HIT mass must still dominate MISS and
/// CONFLICT, and the three classes must still conserve probability.
#[test]
fn contended_hit_origin_still_dominates_when_autoclose_covers_window() {
    let contents = "t:0.5,0.5,0.5,1,1\na:2,1.0,1.0,0.0,0.0,0.0,10.0,5.0\nca:1/2\ncn:1/2\n";
    let target = params::parse_thread_info(contents).unwrap();
    let mut contender = params::parse_thread_info(contents).unwrap();
    let (con_acc, con_noacc) = params::parse_consecutive_tables(contents).unwrap();
    let steps = StepVersions { step1: 3, step2: 3, step3: 3, step4: 3 };

    let ratios = run_ratio_model(&target, &mut contender, 2, &con_acc, &con_noacc, steps).unwrap();

    assert!((ratios.sum() - 1.0).abs() < 0.1, "sum was {}", ratios.sum());
    assert!(ratios.hit > ratios.miss, "hit={} miss={}", ratios.hit, ratios.miss);
    assert!(ratios.hit > ratios.conflict, "hit={} conflict={}", ratios.hit, ratios.conflict);
}

/// S6: half_reorder can only move HIT mass obtained via a reorder into
/// CONFLICT, never increase HIT, and never decrease the overall HIT+MISS
/// sum below what CONFLICT picks up.
#[test]
fn half_reorder_only_ever_trades_hit_for_conflict() {
    // Reorder window wide, autoclose narrow: plenty of patterns resolve via
    // reorder rather than a plain autoclose hit.
    let contents = "t:0.5,0.5,0.5,1,1\na:2,1.0,1.0,0.0,0.0,50.0,5.0,1.0\nca:1/2\ncn:1/2\n";

    let run = |half: bool| {
        let mut target = params::parse_thread_info(contents).unwrap();
        let mut contender = params::parse_thread_info(contents).unwrap();
        target.half_reorder = half;
        contender.half_reorder = half;
        let (con_acc, con_noacc) = params::parse_consecutive_tables(contents).unwrap();
        let steps = StepVersions { step1: 1, step2: 1, step3: 1, step4: 1 };
        run_ratio_model(&target, &mut contender, 2, &con_acc, &con_noacc, steps).unwrap()
    };

    let without_half = run(false);
    let with_half = run(true);

    assert!(with_half.hit <= without_half.hit + 1e-9);
    assert!(with_half.conflict >= without_half.conflict - 1e-9);
}

/// S3: a pure-HIT, uncontended latency computation is floored by
/// `max(trans_cyc * cycle_time, min_issue_time)`.
#[test]
fn pure_hit_latency_matches_worked_example() {
    let params = LatencyParams {
        ratios: HmcRatios { hit: 1.0, miss: 0.0, conflict: 0.0 },
        issue_time_ns: 6.5,
        thread_cnt: 1,
        trans_cyc: 4.0,
        max_hit_cyc: 13.0,
        max_miss_cyc: 0.0,
        max_conf_cyc: 0.0,
        wr_ratio: 0.0,
        cycle_time_ns: 1.5,
        min_issue_time_ns: 6.5,
        rank_cnt: 1,
    };
    let (latency, _) = compute_latency(&params, false);
    assert!((latency - 6.5).abs() < 1e-9);
}

/// S4: a pure-MISS, heavily-contended latency computation exercises the
/// rank/thread overlap path.
#[test]
fn heavy_miss_latency_matches_worked_example() {
    let params = LatencyParams {
        ratios: HmcRatios { hit: 0.0, miss: 1.0, conflict: 0.0 },
        issue_time_ns: 20.0,
        thread_cnt: 8,
        trans_cyc: 4.0,
        max_hit_cyc: 13.0,
        max_miss_cyc: 22.0,
        max_conf_cyc: 31.0,
        wr_ratio: 0.0,
        cycle_time_ns: 1.5,
        min_issue_time_ns: 6.5,
        rank_cnt: 1,
    };
    let (latency, trace) = compute_latency(&params, true);
    let trace = trace.unwrap();
    assert!((trace.mc_overlap - 3.0).abs() < 1e-9);
    assert!((trace.miss_cyc - 10.0).abs() < 1e-9);
    assert!((latency - 15.0).abs() < 1e-9);
}

/// Boundary: miss=0 and conf=0 must never propagate a NaN into the final
/// latency, since the overlap ratios would otherwise divide by zero.
#[test]
fn zero_miss_and_conflict_never_produces_nan() {
    let params = LatencyParams {
        ratios: HmcRatios { hit: 1.0, miss: 0.0, conflict: 0.0 },
        issue_time_ns: 10.0,
        thread_cnt: 4,
        trans_cyc: 4.0,
        max_hit_cyc: 13.0,
        max_miss_cyc: 22.0,
        max_conf_cyc: 31.0,
        wr_ratio: 0.5,
        cycle_time_ns: 1.5,
        min_issue_time_ns: 6.5,
        rank_cnt: 2,
    };
    let (latency, trace) = compute_latency(&params, true);
    let trace = trace.unwrap();
    assert!(latency.is_finite());
    assert!(trace.h_2_miss_overlap.is_finite() || trace.h_2_miss_overlap.is_infinite());
    assert!(!trace.h_2_miss_overlap.is_nan());
    assert!(!trace.h_2_conf_overlap.is_nan());
}

/// Latency is linear in `wr_ratio` for fixed hit/miss/conflict ratios: the
/// final latency is a straight blend between the pure-read and pure-write
/// endpoints.
#[test]
fn latency_is_linear_in_write_ratio() {
    let base = LatencyParams {
        ratios: HmcRatios { hit: 0.5, miss: 0.3, conflict: 0.2 },
        issue_time_ns: 6.5,
        thread_cnt: 2,
        trans_cyc: 4.0,
        max_hit_cyc: 13.0,
        max_miss_cyc: 22.0,
        max_conf_cyc: 31.0,
        wr_ratio: 0.0,
        cycle_time_ns: 1.5,
        min_issue_time_ns: 6.5,
        rank_cnt: 1,
    };

    let (read_only, _) = compute_latency(&base, false);
    let mut write_only_params = LatencyParams { wr_ratio: 1.0, ..base_copy(&base) };
    let (write_only, _) = compute_latency(&write_only_params, false);

    for &wr in &[0.0, 0.25, 0.5, 0.75, 1.0] {
        write_only_params.wr_ratio = wr;
        let (blended, _) = compute_latency(&write_only_params, false);
        let expected = (1.0 - wr) * read_only + wr * write_only;
        assert!((blended - expected).abs() < 1e-9, "wr_ratio={wr}");
    }
}

fn base_copy(p: &LatencyParams) -> LatencyParams {
    LatencyParams {
        ratios: p.ratios,
        issue_time_ns: p.issue_time_ns,
        thread_cnt: p.thread_cnt,
        trans_cyc: p.trans_cyc,
        max_hit_cyc: p.max_hit_cyc,
        max_miss_cyc: p.max_miss_cyc,
        max_conf_cyc: p.max_conf_cyc,
        wr_ratio: p.wr_ratio,
        cycle_time_ns: p.cycle_time_ns,
        min_issue_time_ns: p.min_issue_time_ns,
        rank_cnt: p.rank_cnt,
    }
}

/// Malformed parameter files are rejected with a diagnostic, never silently
/// accepted with shifted fields.
#[test]
fn malformed_parameter_file_is_rejected() {
    assert!(params::parse_thread_info("t:0.25,0.4,0.3\nzz:1\n").is_err());
    assert!(params::parse_thread_info("a:1,0.5,0.5,0.3,0.2,5.0,10.0,1.0\n").is_err());
    assert!(params::parse_thread_info("").is_err());
}

/// A reuse distance missing from the contending thread's statistics is a
/// model-invariant violation, not a silent zero.
#[test]
fn reuse_distance_absent_from_contender_is_an_error() {
    let target_contents = "t:0.25,0.4,0.3,1,1\na:4,1.0,0.5,0.3,0.2,5.0,10.0,1.0\n";
    let contender_contents = "t:0.25,0.4,0.3,1,1\na:7,1.0,0.5,0.3,0.2,5.0,10.0,1.0\n";
    let target = params::parse_thread_info(target_contents).unwrap();
    let mut contender = params::parse_thread_info(contender_contents).unwrap();
    let con_acc = Default::default();
    let con_noacc = Default::default();
    let steps = StepVersions { step1: 1, step2: 1, step3: 1, step4: 1 };

    let err = run_ratio_model(&target, &mut contender, 2, &con_acc, &con_noacc, steps).unwrap_err();
    assert!(matches!(err, membw_core::ModelError::ReuseDistanceNotFound { .. }));
}
