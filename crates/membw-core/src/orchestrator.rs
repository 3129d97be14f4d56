//! C7 — wiring the generator, annotator, composer, and resolver into one
//! run, the way `-s v1,v2,v3,v4` selects a concrete pipeline.
//!
//! The four step integers select, in order, which generator, annotator,
//! composer, and resolver implementation runs. Not every combination the
//! integers can spell is meaningful — the CLI validates compatible
//! combinations before calling in here — but this module only checks that
//! each integer maps to *something*, leaving combination validity to the
//! caller.

use log::debug;

use crate::annotator::{self, AnnotatorVersion};
use crate::composer::{self, ComposerVersion};
use crate::error::{ModelError, Result};
use crate::generator::{self, GeneratorVersion};
use crate::resolver::{self, ResolverVersion};
use crate::types::{ConsecutiveAccProbs, ConsecutiveNoAccProbs, HmcRatios, ThreadInfo};

const TOTAL_SUM_TOLERANCE: f64 = 0.1;

/// The four `-s` integers, one per pipeline stage.
#[derive(Debug, Clone, Copy)]
pub struct StepVersions {
    pub step1: u8,
    pub step2: u8,
    pub step3: u8,
    pub step4: u8,
}

struct ResolvedSteps {
    generator: GeneratorVersion,
    annotator: AnnotatorVersion,
    composer: ComposerVersion,
    resolver: ResolverVersion,
}

impl StepVersions {
    fn resolve(&self) -> Result<ResolvedSteps> {
        Ok(ResolvedSteps {
            generator: GeneratorVersion::from_step(self.step1).ok_or(ModelError::UnknownStepVersion {
                stage: "generator",
                version: self.step1,
            })?,
            annotator: AnnotatorVersion::from_step(self.step2).ok_or(ModelError::UnknownStepVersion {
                stage: "annotator",
                version: self.step2,
            })?,
            composer: ComposerVersion::from_step(self.step3).ok_or(ModelError::UnknownStepVersion {
                stage: "composer",
                version: self.step3,
            })?,
            resolver: ResolverVersion::from_step(self.step4).ok_or(ModelError::UnknownStepVersion {
                stage: "resolver",
                version: self.step4,
            })?,
        })
    }
}

/// Run the full pipeline: generate and annotate the contending thread's
/// access sequences once, then compose and resolve every reuse-distance
/// group of the target thread against them.
pub fn run_ratio_model(
    target: &ThreadInfo,
    contender: &mut ThreadInfo,
    thread_cnt: usize,
    con_acc: &ConsecutiveAccProbs,
    con_noacc: &ConsecutiveNoAccProbs,
    steps: StepVersions,
) -> Result<HmcRatios> {
    let resolved = steps.resolve()?;

    debug!("Step 1: generating access sequences (version {})", steps.step1);
    for entry in contender.reuse_dists.iter_mut() {
        entry.sequences = generator::generate_for_distance(contender, entry.dist, con_acc, con_noacc, resolved.generator)?;
    }

    debug!("Step 2: annotating access sequences (version {})", steps.step2);
    annotator::annotate(contender, resolved.annotator)?;

    let contender_cnt = thread_cnt.saturating_sub(1);

    let mut total = HmcRatios::zero();
    for target_entry in &target.reuse_dists {
        debug!("Step 3: composing interference patterns (version {})", steps.step3);
        let patterns = if contender_cnt == 0 {
            // No contenders: skip the reuse-distance lookup entirely, since
            // composer::compose never consults it in this case either.
            composer::compose(target_entry, target_entry, 0, resolved.composer)?
        } else {
            let contender_entry = contender
                .find_reuse_dist(target_entry.dist)
                .ok_or(ModelError::ReuseDistanceNotFound {
                    dist: target_entry.dist,
                    stage: "orchestrator",
                })?;
            composer::compose(target_entry, contender_entry, contender_cnt, resolved.composer)?
        };

        debug!("Step 4: resolving hit/miss/conflict (version {})", steps.step4);
        let group = resolver::resolve_group(&patterns, target_entry, target, resolved.resolver)?;

        debug!(
            "Group hit/miss/conflict: {} {} {}",
            group.hit, group.miss, group.conflict
        );
        total.add(group);
    }

    let observed = total.sum();
    if (observed - 1.0).abs() > TOTAL_SUM_TOLERANCE {
        return Err(ModelError::ProbabilityMass {
            stage: "orchestrator".to_string(),
            expected: 1.0,
            observed,
            tolerance: TOTAL_SUM_TOLERANCE,
        });
    }

    debug!(
        "Final hit/miss/conflict: {} {} {}",
        total.hit, total.miss, total.conflict
    );

    Ok(total)
}
