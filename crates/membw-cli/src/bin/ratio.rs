//! `membw-ratio` — predict a thread's DRAM HIT/MISS/CONFLICT split.
//!
//! Reads a parameter file describing the target thread (and, since
//! contending threads are statistically interchangeable, the same file
//! doubles as the contender's statistics), runs the four-stage pipeline at
//! the requested step versions, and prints the resulting ratios.

use std::io::Write as _;
use std::process::ExitCode;

use clap::Parser;
use log::debug;

use membw_core::error::ModelError;
use membw_core::orchestrator::{self, StepVersions};
use membw_core::params;

/// Predict the HIT/MISS/CONFLICT split of a thread's DRAM accesses under
/// contention from other threads sharing the same channel.
#[derive(Parser)]
#[command(name = "membw-ratio")]
#[command(version = membw_core::VERSION)]
struct Args {
    /// Parameter file path.
    #[arg(short = 'f')]
    file: Option<String>,

    /// Total number of threads contending for the channel, including the
    /// target thread itself.
    #[arg(short = 't')]
    thread_cnt: Option<usize>,

    /// Step versions for generator,annotator,composer,resolver, e.g. `1,1,1,1`.
    #[arg(short = 's')]
    steps: Option<String>,

    /// Override the autoclose window (ns). 0 disables it.
    #[arg(short = 'o')]
    autoclose_ns: Option<f64>,

    /// Override the reorder window (ns). 0 disables it.
    #[arg(short = 'r')]
    reorder_ns: Option<f64>,

    /// Override the estimated per-access service time (ns).
    #[arg(short = 'e')]
    est_serv_ns: Option<f64>,

    /// Split every reordered HIT into half HIT / half CONFLICT.
    #[arg(long)]
    half: bool,

    /// Print per-stage progress and per-group diagnostics.
    #[arg(short = 'd')]
    debug: bool,
}

fn init_logging(debug: bool) {
    env_logger::Builder::new()
        .target(env_logger::Target::Stdout)
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .filter_level(if debug { log::LevelFilter::Trace } else { log::LevelFilter::Debug })
        .init();
}

fn missing(flag: &str) -> ! {
    eprintln!("membw-ratio: missing required argument -{flag}");
    eprintln!();
    eprintln!("usage: membw-ratio -f <file> -t <thread_cnt> -s <v1,v2,v3,v4> [-o ns] [-r ns] [-e ns] [--half] [-d]");
    std::process::exit(-1);
}

fn parse_steps(spec: &str) -> StepVersions {
    let fields: Vec<&str> = spec.split(',').collect();
    if fields.len() != 4 {
        eprintln!("membw-ratio: -s expects four comma-separated integers, got {spec:?}");
        std::process::exit(-1);
    }
    let mut parsed = [0u8; 4];
    for (slot, field) in parsed.iter_mut().zip(fields.iter()) {
        *slot = match field.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                eprintln!("membw-ratio: -s field {field:?} is not an integer");
                std::process::exit(-1);
            }
        };
    }
    StepVersions {
        step1: parsed[0],
        step2: parsed[1],
        step3: parsed[2],
        step4: parsed[3],
    }
}

fn exit_code_for(err: &ModelError) -> u8 {
    match err {
        ModelError::ProbabilityMass { .. } => 1,
        ModelError::ReuseDistanceNotFound { .. } => 3,
        ModelError::CaseProbabilitySum { .. } => 5,
        ModelError::TotalAccessMismatch { .. } => 6,
        ModelError::ResolverUnreachable { .. } => 8,
        ModelError::V3LengthMismatch { .. } => 13,
        ModelError::V3ProbabilitySum(_) => 15,
        ModelError::V4ProbabilitySum(_) => 16,
        ModelError::UnknownStepVersion { .. } => 61,
        ModelError::ParamFile(_) => 255,
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.debug);

    let Some(file) = args.file else { missing("f") };
    let Some(thread_cnt) = args.thread_cnt else { missing("t") };
    let Some(steps_raw) = args.steps else { missing("s") };
    let steps = parse_steps(&steps_raw);

    let contents = match std::fs::read_to_string(&file) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("membw-ratio: cannot read {file:?}: {e}");
            return ExitCode::from(255);
        }
    };

    let mut target = match params::parse_thread_info(&contents) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("membw-ratio: {e}");
            return ExitCode::from(255);
        }
    };
    let mut contender = target.clone();

    if let Some(autoclose) = args.autoclose_ns {
        target.autoclose_time_ns = autoclose;
        contender.autoclose_time_ns = autoclose;
    }
    if let Some(reorder) = args.reorder_ns {
        target.reorder_time_ns = reorder;
        contender.reorder_time_ns = reorder;
    }
    if let Some(est_serv) = args.est_serv_ns {
        target.est_serv_time_ns = est_serv;
        contender.est_serv_time_ns = est_serv;
    }
    target.half_reorder = args.half;
    contender.half_reorder = args.half;

    let (con_acc, con_noacc) = match params::parse_consecutive_tables(&contents) {
        Ok(tables) => tables,
        Err(e) => {
            eprintln!("membw-ratio: {e}");
            return ExitCode::from(255);
        }
    };

    debug!("membw-ratio: {thread_cnt} threads, steps {steps_raw}");
    match orchestrator::run_ratio_model(&target, &mut contender, thread_cnt, &con_acc, &con_noacc, steps) {
        Ok(ratios) => {
            println!("hit={:.6} miss={:.6} conflict={:.6}", ratios.hit, ratios.miss, ratios.conflict);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("membw-ratio: {e}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}
