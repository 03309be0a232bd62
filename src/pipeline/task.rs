//! # Frame Task
//!
//! One extraction task per scanned location. The cancellation token is
//! polled at three checkpoints so a stop is reported with the phase it
//! interrupted.

use crate::classify;
use crate::container::RawContainer;
use crate::dedup::{self, Fingerprint};
use crate::extract::{BoundPolicy, ExtractError};
use crate::output::NamingScheme;
use crate::scanner::FrameLocation;

use super::RunContext;
use super::events::{ExtractedArtifact, InterruptPhase, TaskOutcome, TaskReport};

pub fn run_task(
    ctx: &RunContext,
    container: &RawContainer,
    location: &FrameLocation,
    naming: &NamingScheme,
) -> TaskReport {
    TaskReport {
        index: location.index,
        offset: location.start_offset,
        container: container.name().to_string(),
        outcome: process_frame(ctx, container, location, naming),
    }
}

fn process_frame(
    ctx: &RunContext,
    container: &RawContainer,
    location: &FrameLocation,
    naming: &NamingScheme,
) -> TaskOutcome {
    if ctx.cancel.is_cancelled() {
        return TaskOutcome::Interrupted(InterruptPhase::BeforeDecode);
    }

    let data = container.as_bytes();
    let (payload, fp) = match ctx.extractor.policy() {
        BoundPolicy::Unbounded => {
            let payload = match ctx.extractor.extract(data, location) {
                Ok(payload) => payload,
                Err(err) => return extract_failure(err),
            };
            if ctx.cancel.is_cancelled() {
                return TaskOutcome::Interrupted(InterruptPhase::AfterDecode);
            }
            let fp = dedup::fingerprint(&payload);
            if !ctx.dedup.try_admit(fp) {
                return duplicate(&fp);
            }
            (payload, fp)
        }
        BoundPolicy::Windowed => {
            // The raw block is fingerprinted so duplicates skip decoding.
            let block = match ctx.extractor.frame_input(data, location) {
                Ok(block) => block,
                Err(err) => return extract_failure(err),
            };
            let fp = dedup::fingerprint(block);
            if !ctx.dedup.try_admit(fp) {
                return duplicate(&fp);
            }
            if ctx.cancel.is_cancelled() {
                return TaskOutcome::Interrupted(InterruptPhase::AfterDedup);
            }
            match ctx.extractor.decode(block) {
                Ok(payload) => (payload, fp),
                Err(err) => return extract_failure(err),
            }
        }
    };

    if ctx.cancel.is_cancelled() {
        return TaskOutcome::Interrupted(InterruptPhase::BeforeWrite);
    }

    let label = if ctx.type_detection {
        classify::classify(&payload)
    } else {
        ""
    };
    let category = classify::category_for(label);
    let name = naming.task_file_name(location.index, label);

    match ctx.writer.write(category, &name, &payload) {
        Ok(output_path) => TaskOutcome::Extracted(ExtractedArtifact {
            sequence_index: location.index,
            container: container.name().to_string(),
            source_offset: location.start_offset,
            content_hash: dedup::fingerprint_hex(&fp),
            detected_extension: label.to_string(),
            category,
            byte_size: payload.len() as u64,
            output_path,
        }),
        Err(err) => TaskOutcome::WriteFailed(err.to_string()),
    }
}

fn extract_failure(err: ExtractError) -> TaskOutcome {
    match err {
        ExtractError::BelowMinimum { size, min } => TaskOutcome::Discarded { size, min },
        other => TaskOutcome::DecodeFailed(other.to_string()),
    }
}

fn duplicate(fp: &Fingerprint) -> TaskOutcome {
    TaskOutcome::Duplicate {
        content_hash: dedup::fingerprint_hex(fp),
    }
}
