use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use flowfuzz_core::{
    run_campaign, run_campaign_isolated, CampaignConfig, CampaignError, FailurePolicy, StopReason,
};
use flowfuzz_explore::{NoInterrupt, SequenceFailure, SequenceRunner, SequenceState, StreamMode};
use flowfuzz_gen::{ArgSpec, Args, RandomStream};
use flowfuzz_model::{
    FlowDef, FuzzPlan, InvariantDef, Observed, StateSnapshot, SutError, SystemUnderTest,
};

#[derive(Default)]
struct Counter {
    value: i128,
    delay: Option<Duration>,
}

impl SystemUnderTest for Counter {
    fn call(&mut self, flow: &str, args: &Args) -> Result<StateSnapshot, SutError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        match flow {
            "inc" => self.value += args.int("amount")?,
            "dec" => self.value -= args.int("amount")?,
            other => return Err(SutError::unknown_flow(other)),
        }
        Ok(StateSnapshot::from(self.value.to_string()))
    }
}

fn counter(_index: u32) -> Result<Counter, SutError> {
    Ok(Counter::default())
}

fn inc_only() -> FuzzPlan<Counter> {
    FuzzPlan::builder()
        .flow(FlowDef::new("inc").arg("amount", ArgSpec::int(1, 10, 0.1)))
        .invariant(InvariantDef::new("value", |c: &Counter| {
            Ok(Observed::Int(c.value))
        }))
        .build()
        .unwrap()
}

fn inc_dec() -> FuzzPlan<Counter> {
    FuzzPlan::builder()
        .flow(FlowDef::new("inc").arg("amount", ArgSpec::int(1, 10, 0.1)))
        .flow(FlowDef::new("dec").arg("amount", ArgSpec::int(1, 3, 0.0)))
        .invariant(InvariantDef::new("value", |c: &Counter| {
            Ok(Observed::Int(c.value))
        }))
        .build()
        .unwrap()
}

fn config(seed: u64, sequences: u32, flows: u64) -> CampaignConfig {
    CampaignConfig {
        seed,
        sequences_count: sequences,
        flows_count: flows,
        ..CampaignConfig::default()
    }
}

#[test]
fn test_campaign_is_deterministic() {
    let plan = inc_dec();
    let cfg = CampaignConfig {
        failure_policy: FailurePolicy::Aggregate,
        ..config(44, 3, 20)
    };

    let a = run_campaign(&plan, &counter, &cfg).unwrap();
    let b = run_campaign(&plan, &counter, &cfg).unwrap();
    assert_eq!(a.calls(), b.calls());
    assert_eq!(a.failures, b.failures);
}

#[test]
fn test_stream_is_not_reset_between_sequences() {
    let plan = inc_only();
    let report = run_campaign(&plan, &counter, &config(44, 2, 10)).unwrap();

    assert!(report.is_success());
    assert_eq!(report.stop_reason, StopReason::Complete);
    assert_eq!(report.sequences.len(), 2);
    assert_eq!(report.sequences[0].draws_before, 0);
    assert!(report.sequences[1].draws_before > 0);

    let calls = report.calls();
    assert_ne!(calls[0], calls[1]);

    // The second sequence is the continuation of the first one's stream.
    let mut stream = RandomStream::new(44);
    let mut first = Counter::default();
    SequenceRunner::new(0, &plan, &mut first, &mut stream).run(10, &NoInterrupt);
    let mut second = Counter::default();
    let continued = SequenceRunner::new(1, &plan, &mut second, &mut stream).run(10, &NoInterrupt);
    assert_eq!(continued.trace.calls(), calls[1]);
}

#[test]
fn test_fresh_sut_per_sequence() {
    let created = Mutex::new(Vec::new());
    let factory = |index: u32| -> Result<Counter, SutError> {
        created.lock().unwrap().push(index);
        Ok(Counter::default())
    };
    let report = run_campaign(&inc_only(), &factory, &config(1, 4, 5)).unwrap();

    assert!(report.is_success());
    assert_eq!(*created.lock().unwrap(), vec![0, 1, 2, 3]);
    for outcome in &report.sequences {
        assert_eq!(outcome.trace.baseline[0].1, Observed::Int(0));
    }
}

#[test]
fn test_fail_fast_stops_at_first_failure() {
    let report = run_campaign(&inc_dec(), &counter, &config(44, 3, 64)).unwrap();

    assert!(!report.is_success());
    assert_eq!(report.stop_reason, StopReason::FailFast);
    assert_eq!(report.sequences.len(), 1);
    assert_eq!(report.failures.len(), 1);

    let record = report.first_failure().unwrap();
    assert_eq!(record.seed, 44);
    assert_eq!(record.stream_mode, StreamMode::Shared);
    assert!(record.failure.is_invariant_violation());
    assert_eq!(record.trace.last().unwrap().flow, "dec");
}

#[test]
fn test_aggregate_runs_every_sequence() {
    let cfg = CampaignConfig {
        failure_policy: FailurePolicy::Aggregate,
        ..config(44, 3, 64)
    };
    let report = run_campaign(&inc_dec(), &counter, &cfg).unwrap();

    assert_eq!(report.stop_reason, StopReason::Complete);
    assert_eq!(report.sequences.len(), 3);
    assert_eq!(report.failures.len(), 3);
    let indices: Vec<u32> = report.failures.iter().map(|r| r.sequence_index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[test]
fn test_factory_failure_is_setup_failure() {
    let factory = |index: u32| -> Result<Counter, SutError> {
        if index == 1 {
            Err(SutError::new("fork unavailable"))
        } else {
            Ok(Counter::default())
        }
    };
    let cfg = CampaignConfig {
        failure_policy: FailurePolicy::Aggregate,
        ..config(2, 3, 5)
    };
    let report = run_campaign(&inc_only(), &factory, &cfg).unwrap();

    assert_eq!(report.failures.len(), 1);
    let record = &report.failures[0];
    assert_eq!(record.sequence_index, 1);
    assert!(record.trace.is_empty());
    assert!(matches!(record.failure, SequenceFailure::SetupFailure { .. }));
    assert_eq!(report.sequences[2].state, SequenceState::Completed);
}

#[test]
fn test_isolated_campaign_is_ordered_and_deterministic() {
    let plan = inc_only();
    let cfg = config(9, 8, 15);

    let a = run_campaign_isolated(&plan, &counter, &cfg).unwrap();
    let b = run_campaign_isolated(&plan, &counter, &cfg).unwrap();

    assert_eq!(a.stream_mode, StreamMode::PerSequence);
    let indices: Vec<u32> = a.sequences.iter().map(|o| o.index).collect();
    assert_eq!(indices, (0..8).collect::<Vec<_>>());
    assert_eq!(a.calls(), b.calls());

    let mut stream = RandomStream::for_sequence(9, 5);
    let mut sut = Counter::default();
    let alone = SequenceRunner::new(5, &plan, &mut sut, &mut stream).run(15, &NoInterrupt);
    assert_eq!(alone.trace.calls(), a.calls()[5]);
}

#[test]
fn test_isolated_campaign_aggregates_failures() {
    let report = run_campaign_isolated(&inc_dec(), &counter, &config(44, 4, 64)).unwrap();
    assert_eq!(report.sequences.len(), 4);
    assert_eq!(report.failures.len(), 4);
    assert!(report
        .failures
        .iter()
        .all(|r| r.stream_mode == StreamMode::PerSequence));
}

#[test]
fn test_time_limit_interrupts_between_flows() {
    let calls = AtomicU32::new(0);
    let factory = |_index: u32| -> Result<Counter, SutError> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Counter {
            value: 0,
            delay: Some(Duration::from_millis(20)),
        })
    };
    let cfg = CampaignConfig {
        time_limit_secs: Some(1),
        ..config(3, 5, 10_000)
    };
    let report = run_campaign(&inc_only(), &factory, &cfg).unwrap();

    assert_eq!(report.stop_reason, StopReason::TimeLimit);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.sequences.len(), 1);
    assert_eq!(report.sequences[0].state, SequenceState::Interrupted);
    assert!(report.sequences[0].trace.len() < 10_000);
    assert!(report.is_success());
}

#[test]
fn test_invalid_config_rejected() {
    let err = run_campaign(&inc_only(), &counter, &config(1, 0, 5)).unwrap_err();
    assert!(matches!(err, CampaignError::Config(_)));
}

#[test]
fn test_report_serializes() {
    let report = run_campaign(&inc_dec(), &counter, &config(44, 1, 64)).unwrap();
    let json = report.to_json().unwrap();
    assert!(json.contains("\"seed\": 44"));
    assert!(json.contains("invariant_violation"));
}
