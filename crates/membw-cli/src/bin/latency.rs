//! `membw-latency` — turn a HIT/MISS/CONFLICT split into an expected DRAM
//! access latency, in nanoseconds.

use std::io::Write as _;

use clap::Parser;
use log::debug;

use membw_core::latency::{compute_latency, LatencyParams};
use membw_core::types::HmcRatios;

/// Predict read/write/final DRAM access latency from a HIT/MISS/CONFLICT
/// split and the memory controller's timing parameters.
#[derive(Parser)]
#[command(name = "membw-latency")]
#[command(version = membw_core::VERSION)]
struct Args {
    /// Total number of threads contending for the channel.
    #[arg(short = 't')]
    thread_cnt: Option<usize>,

    /// CONFLICT ratio.
    #[arg(short = 'r')]
    conf: Option<f64>,

    /// MISS ratio.
    #[arg(short = 'm')]
    miss: Option<f64>,

    /// Memory bus cycle time (ns).
    #[arg(short = 'c')]
    cycle_time: Option<f64>,

    /// Issue time for the whole channel (ns), divided across `thread_cnt`.
    #[arg(short = 'i')]
    issue_time: Option<f64>,

    /// Max HIT latency, in cycles.
    #[arg(long = "max_hit", default_value_t = 0.0)]
    max_hit: f64,

    /// Max MISS latency, in cycles.
    #[arg(long = "max_miss", default_value_t = 0.0)]
    max_miss: f64,

    /// Max CONFLICT latency, in cycles.
    #[arg(long = "max_conf", default_value_t = 0.0)]
    max_conf: f64,

    /// Transfer time, in cycles.
    #[arg(long = "trans", default_value_t = 4.0)]
    trans_cyc: f64,

    /// RAS-to-CAS delay, in cycles (an alias recorded for diagnostics only;
    /// the model folds this into `max_miss`/`max_conf` via the parameter
    /// file, not a separate term).
    #[arg(long = "tRCD", default_value_t = 0.0)]
    trcd: f64,

    /// Fraction of accesses that are writes.
    #[arg(short = 'w', default_value_t = 0.0)]
    wr_ratio: f64,

    /// Cycle time is also accepted as `--cycle_time` for parameter-file
    /// symmetry with `-c`.
    #[arg(long = "cycle_time")]
    cycle_time_long: Option<f64>,

    /// Minimum issue time (ns), the floor `ideal_issue_time` can't go below.
    #[arg(long = "min_time", default_value_t = 0.0)]
    min_issue_time: f64,

    /// Number of ranks (FAW-limited overlap scales with this).
    #[arg(long = "rank", default_value_t = 1)]
    rank_cnt: u32,

    /// Print per-stage progress.
    #[arg(short = 'd')]
    debug: bool,

    /// Print the full intermediate trace (overlaps, per-class cycles).
    #[arg(short = 'v')]
    verbose: bool,
}

fn init_logging(debug: bool) {
    env_logger::Builder::new()
        .target(env_logger::Target::Stdout)
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .filter_level(if debug { log::LevelFilter::Trace } else { log::LevelFilter::Warn })
        .init();
}

fn missing(flag: &str) -> ! {
    eprintln!("membw-latency: missing required argument -{flag}");
    eprintln!();
    eprintln!(
        "usage: membw-latency -t <thread_cnt> -r <conf> -m <miss> -c <cycle_time_ns> -i <issue_time_ns> \
         [--max_hit/miss/conf ns] [--trans ns] [--tRCD ns] [-w ratio] [--min_time ns] [--rank n] [-d] [-v]"
    );
    std::process::exit(-1);
}

fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    let Some(thread_cnt) = args.thread_cnt else { missing("t") };
    let Some(conf) = args.conf else { missing("r") };
    let Some(miss) = args.miss else { missing("m") };
    let Some(cycle_time_ns) = args.cycle_time_long.or(args.cycle_time) else {
        missing("c")
    };
    let Some(issue_time_ns) = args.issue_time else { missing("i") };

    let hit = (1.0 - miss - conf).max(0.0);
    let ratios = HmcRatios { hit, miss, conflict: conf };

    debug!("Step 1: computing latency for {thread_cnt} threads, hit/miss/conf = {hit}/{miss}/{conf}");
    let params = LatencyParams {
        ratios,
        issue_time_ns,
        thread_cnt,
        trans_cyc: args.trans_cyc,
        max_hit_cyc: args.max_hit,
        max_miss_cyc: args.max_miss,
        max_conf_cyc: args.max_conf,
        wr_ratio: args.wr_ratio,
        cycle_time_ns,
        min_issue_time_ns: args.min_issue_time,
        rank_cnt: args.rank_cnt,
    };
    let _ = args.trcd;

    let (final_latency, trace) = compute_latency(&params, true);
    let trace = trace.expect("trace requested");

    if args.verbose {
        println!(
            "ideal_issue={:.6} rank_overlap={:.6} mc_overlap={:.6} hit_cyc={:.6} miss_cyc={:.6} conf_cyc={:.6}",
            trace.ideal_issue_time, trace.rank_overlap, trace.mc_overlap, trace.hit_cyc, trace.miss_cyc, trace.conf_cyc
        );
    }
    println!("read_latency={:.6}", trace.read_latency);
    println!("write_latency={:.6}", trace.write_latency);
    println!("final_latency={final_latency:.6}");
}
