//! Reproduction records: the seed plus the ordered trace of a failed
//! sequence, enough to re-run it exactly.

use std::fmt::Write as _;

use flowfuzz_gen::Args;
use flowfuzz_model::{Observed, StateSnapshot};
use serde::{Deserialize, Serialize};

use crate::failure::SequenceFailure;
use crate::runner::SequenceOutcome;
use crate::trace::TraceStep;

/// How the campaign's random stream was laid out across sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamMode {
    /// One stream for the whole campaign. Reproducing sequence `k` by
    /// re-running from the seed requires re-running sequences `0..k` first.
    Shared,
    /// Stream derived from `(seed, sequence_index)`.
    PerSequence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReproductionRecord {
    pub seed: u64,
    pub sequence_index: u32,
    pub stream_mode: StreamMode,
    pub draws_before_sequence: u64,
    pub flows_count: u64,
    pub initial_snapshot: Option<StateSnapshot>,
    pub baseline: Vec<(String, Observed)>,
    pub trace: Vec<TraceStep>,
    pub failure: SequenceFailure,
}

impl ReproductionRecord {
    /// `None` unless the outcome failed.
    pub fn from_outcome(
        seed: u64,
        stream_mode: StreamMode,
        flows_count: u64,
        outcome: &SequenceOutcome,
    ) -> Option<Self> {
        let failure = outcome.failure.clone()?;
        Some(Self {
            seed,
            sequence_index: outcome.index,
            stream_mode,
            draws_before_sequence: outcome.draws_before,
            flows_count,
            initial_snapshot: outcome.trace.initial_snapshot.clone(),
            baseline: outcome.trace.baseline.clone(),
            trace: outcome.trace.steps().to_vec(),
            failure,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// The (flow, arguments) pairs to replay, in order.
    pub fn calls(&self) -> Vec<(String, Args)> {
        self.trace
            .iter()
            .map(|s| (s.flow.clone(), s.args.clone()))
            .collect()
    }

    /// Human-readable form for terminals and logs.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "sequence {} failed (seed {}, {:?} stream, {} draws before sequence)",
            self.sequence_index, self.seed, self.stream_mode, self.draws_before_sequence
        );
        let _ = writeln!(out, "  failure: {}", self.failure);
        for (name, value) in &self.baseline {
            let _ = writeln!(out, "  baseline {name} = {value}");
        }
        for step in &self.trace {
            let _ = write!(out, "  #{:<4} {}{}", step.step, step.flow, step.args);
            if step.snapshot.is_none() {
                let _ = write!(out, "  [rejected]");
            }
            for check in &step.checks {
                let mark = if check.passed { "ok" } else { "FAILED" };
                let _ = write!(out, "  {}={} {}", check.invariant, check.observed, mark);
            }
            out.push('\n');
        }
        out
    }
}
