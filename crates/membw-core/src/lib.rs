//! # membw-core
//!
//! A DRAM row-buffer HIT/MISS/CONFLICT ratio and latency prediction model.
//!
//! Given a thread's channel/bank/row access statistics and a description of
//! how many other threads contend for the same channel, this crate predicts
//! what fraction of that thread's DRAM accesses land on an already-open row
//! (HIT), a closed row in the same bank (MISS), or a row in a different
//! bank of the same rank (CONFLICT) — and from those ratios, an expected
//! access latency.
//!
//! ## Quick Start
//!
//! ```no_run
//! use membw_core::params;
//! use membw_core::orchestrator::{run_ratio_model, StepVersions};
//!
//! # fn run() -> membw_core::error::Result<()> {
//! let contents = std::fs::read_to_string("params.txt").unwrap();
//! let target = params::parse_thread_info(&contents)?;
//! let mut contender = params::parse_thread_info(&contents)?;
//! let (con_acc, con_noacc) = params::parse_consecutive_tables(&contents)?;
//!
//! let steps = StepVersions { step1: 1, step2: 1, step3: 1, step4: 1 };
//! let ratios = run_ratio_model(&target, &mut contender, 2, &con_acc, &con_noacc, steps)?;
//! println!("{:?}", ratios);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The pipeline runs in five stages, each its own module:
//!
//! - [`generator`] (C2) enumerates the access sequences one contending
//!   thread could produce between two consecutive target-channel accesses.
//! - [`annotator`] (C3) attaches a row/bank-state case to each sequence.
//! - [`composer`] (C4) combines per-thread sequences into full interference
//!   patterns across all contending threads.
//! - [`resolver`] (C5) turns a pattern's annotated cases into
//!   HIT/MISS/CONFLICT probability mass.
//! - [`latency`] (C6) converts that mass into an expected access latency.
//!
//! [`orchestrator`] wires all five together per the `-s` step-version
//! selection; [`params`] parses the parameter file feeding the whole thing.

pub mod annotator;
pub mod combinatorics;
pub mod composer;
pub mod error;
pub mod generator;
pub mod latency;
pub mod orchestrator;
pub mod params;
pub mod rational;
pub mod resolver;
pub mod types;

pub use error::{ModelError, Result};
pub use types::HmcRatios;

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
