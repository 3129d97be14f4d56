//! C6 — translating HIT/MISS/CONFLICT ratios into an expected access latency.
//!
//! Read and write latency share the same overlap-ratio math; write latency
//! only shifts the cycle budgets up by one transfer cycle and drops the
//! minimum-issue-time floor the read path enforces. `final_latency` then
//! blends the two by the write ratio. `hit_cyc` deliberately never
//! subtracts an overlap term the way the miss/conflict cycles do — a hit
//! never rides behind another access, so there is nothing to overlap with.

use crate::types::HmcRatios;

/// Every named intermediate of one latency computation, captured only when
/// the caller asks for it (the CLI's `-d`/`-v` trace output).
#[derive(Debug, Clone, Default)]
pub struct LatencyTrace {
    pub ideal_issue_time: f64,
    pub rank_overlap: f64,
    pub h_2_miss_overlap: f64,
    pub h_2_conf_overlap: f64,
    pub mc_overlap: f64,
    pub hit_cyc: f64,
    pub miss_cyc: f64,
    pub conf_cyc: f64,
    pub read_latency: f64,
    pub wr_hit_cyc: f64,
    pub wr_miss_cyc: f64,
    pub wr_conf_cyc: f64,
    pub write_latency: f64,
    pub final_latency: f64,
}

pub struct LatencyParams {
    pub ratios: HmcRatios,
    pub issue_time_ns: f64,
    pub thread_cnt: usize,
    pub trans_cyc: f64,
    pub max_hit_cyc: f64,
    pub max_miss_cyc: f64,
    pub max_conf_cyc: f64,
    pub wr_ratio: f64,
    pub cycle_time_ns: f64,
    pub min_issue_time_ns: f64,
    pub rank_cnt: u32,
}

pub fn compute_latency(params: &LatencyParams, trace: bool) -> (f64, Option<LatencyTrace>) {
    let mut t = LatencyTrace::default();

    let hit = params.ratios.hit;
    let miss = params.ratios.miss;
    let conf = params.ratios.conflict;

    let thread_cnt = params.thread_cnt.max(1) as f64;
    t.ideal_issue_time = (params.issue_time_ns / thread_cnt).max(params.min_issue_time_ns);
    t.rank_overlap = (4 * params.rank_cnt) as f64 - 1.0;

    t.h_2_miss_overlap = if miss > 0.0 {
        t.rank_overlap.min(miss_overlap_bound(hit, miss))
    } else {
        t.rank_overlap
    };
    t.h_2_conf_overlap = if conf > 0.0 {
        t.rank_overlap.min(conf_overlap_bound(hit, conf))
    } else {
        t.rank_overlap
    };
    // mc_2_miss_overlap and mc_2_conf_overlap are the same expression in
    // every branch of the source this was ported from, so they collapse to
    // one shared value here. FAW-limited, same as the hit overlaps above.
    t.mc_overlap = t.rank_overlap.min(thread_cnt * (miss + conf) - 1.0);

    let (hit_cyc, miss_cyc, conf_cyc) = if miss + conf < 0.7 {
        (
            params.trans_cyc,
            (params.max_miss_cyc - t.h_2_miss_overlap * params.trans_cyc).max(params.trans_cyc),
            (params.max_conf_cyc - t.h_2_conf_overlap * params.trans_cyc).max(params.trans_cyc),
        )
    } else {
        (
            params.trans_cyc,
            (params.max_miss_cyc - (t.h_2_miss_overlap + t.mc_overlap) * params.trans_cyc).max(params.trans_cyc),
            (params.max_conf_cyc - (t.h_2_conf_overlap + t.mc_overlap) * params.trans_cyc).max(params.trans_cyc),
        )
    };
    t.hit_cyc = hit_cyc;
    t.miss_cyc = miss_cyc;
    t.conf_cyc = conf_cyc;

    let raw_read = hit * hit_cyc + miss * miss_cyc + conf * conf_cyc;
    t.read_latency = (raw_read * params.cycle_time_ns).max(t.ideal_issue_time);

    let wr_trans_cyc = params.trans_cyc + 1.0;
    let wr_max_hit = params.max_hit_cyc + 1.0;
    let wr_max_miss = params.max_miss_cyc + 1.0;
    let wr_max_conf = params.max_conf_cyc + 1.0;

    let (wr_hit_cyc, wr_miss_cyc, wr_conf_cyc) = if miss + conf < 0.7 {
        (
            wr_trans_cyc,
            (wr_max_miss - t.h_2_miss_overlap * wr_trans_cyc).max(wr_trans_cyc),
            (wr_max_conf - t.h_2_conf_overlap * wr_trans_cyc).max(wr_trans_cyc),
        )
    } else {
        (
            wr_trans_cyc,
            (wr_max_miss - (t.h_2_miss_overlap + t.mc_overlap) * wr_trans_cyc).max(wr_trans_cyc),
            (wr_max_conf - (t.h_2_conf_overlap + t.mc_overlap) * wr_trans_cyc).max(wr_trans_cyc),
        )
    };
    let _ = wr_max_hit;
    t.wr_hit_cyc = wr_hit_cyc;
    t.wr_miss_cyc = wr_miss_cyc;
    t.wr_conf_cyc = wr_conf_cyc;

    t.write_latency = (hit * wr_hit_cyc + miss * wr_miss_cyc + conf * wr_conf_cyc) * params.cycle_time_ns;

    t.final_latency = (1.0 - params.wr_ratio) * t.read_latency + params.wr_ratio * t.write_latency;

    let final_latency = t.final_latency;
    (final_latency, trace.then_some(t))
}

fn miss_overlap_bound(hit: f64, miss: f64) -> f64 {
    if miss == 0.0 {
        f64::INFINITY
    } else {
        (hit + miss) / miss - 1.0
    }
}

fn conf_overlap_bound(hit: f64, conf: f64) -> f64 {
    if conf == 0.0 {
        f64::INFINITY
    } else {
        (hit + conf) / conf - 1.0
    }
}
