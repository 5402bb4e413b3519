use flowfuzz_gen::{ArgSpec, Args};
use flowfuzz_model::invariant::TrackedValue;
use flowfuzz_model::{
    Comparator, FlowDef, FuzzPlan, InvariantDef, InvariantError, Observed, PlanError,
    RegistryError, StateSnapshot, SutError, SystemUnderTest, Tolerance,
};

fn int(v: i128) -> Observed {
    Observed::Int(v)
}

fn tuple(vs: &[i128]) -> Observed {
    Observed::Tuple(vs.iter().copied().map(Observed::Int).collect())
}

#[test]
fn test_non_decreasing_is_default() {
    let cmp = Comparator::default();
    assert_eq!(cmp.holds(&int(100), &int(100)), Ok(true));
    assert_eq!(cmp.holds(&int(100), &int(101)), Ok(true));
    assert_eq!(cmp.holds(&int(100), &int(99)), Ok(false));
}

#[test]
fn test_integer_comparison_keeps_full_precision() {
    // Values that collapse to the same f64.
    let big = 200_000_000_000_000_000_001i128;
    let cmp = Comparator::default();
    assert_eq!(cmp.holds(&int(big), &int(big - 1)), Ok(false));
}

#[test]
fn test_tolerance_allows_bounded_regression() {
    let cmp = Comparator::NonDecreasing(Tolerance::Int(5));
    assert_eq!(cmp.holds(&int(100), &int(95)), Ok(true));
    assert_eq!(cmp.holds(&int(100), &int(94)), Ok(false));

    let cmp = Comparator::NonDecreasing(Tolerance::Float(0.01));
    assert_eq!(
        cmp.holds(&Observed::Float(1.0), &Observed::Float(0.995)),
        Ok(true)
    );
}

#[test]
fn test_mismatched_tolerance_kind_is_incomparable() {
    let cmp = Comparator::NonDecreasing(Tolerance::Float(0.5));
    assert!(cmp.holds(&int(1), &int(1)).is_err());
}

#[test]
fn test_non_increasing_and_unchanged() {
    let down = Comparator::NonIncreasing(Tolerance::Exact);
    assert_eq!(down.holds(&int(10), &int(9)), Ok(true));
    assert_eq!(down.holds(&int(10), &int(11)), Ok(false));

    let same = Comparator::Unchanged;
    assert_eq!(same.holds(&tuple(&[1, 2]), &tuple(&[1, 2])), Ok(true));
    assert_eq!(same.holds(&tuple(&[1, 2]), &tuple(&[1, 3])), Ok(false));
    assert!(same.holds(&int(1), &Observed::Float(1.0)).is_err());
}

#[test]
fn test_tuples_compare_component_wise() {
    let cmp = Comparator::default();
    assert_eq!(cmp.holds(&tuple(&[5, 5]), &tuple(&[6, 5])), Ok(true));
    // First component grows but the second shrinks.
    assert_eq!(cmp.holds(&tuple(&[5, 5]), &tuple(&[9, 4])), Ok(false));
    assert!(cmp.holds(&tuple(&[5, 5]), &tuple(&[5, 5, 5])).is_err());
}

#[test]
fn test_leading_component_comparison() {
    let cmp = Comparator::leading(Comparator::default());
    // Only the first component matters.
    assert_eq!(cmp.holds(&tuple(&[5, 5]), &tuple(&[9, 4])), Ok(true));
    assert_eq!(cmp.holds(&tuple(&[5, 5]), &tuple(&[4, 9])), Ok(false));
    // Scalars behave like the plain comparator, so one comparator covers
    // both the scalar and the tuple harness shapes.
    assert_eq!(cmp.holds(&int(5), &int(4)), Ok(false));
    assert!(cmp.holds(&Observed::Tuple(vec![]), &int(1)).is_err());
}

#[test]
fn test_custom_comparator() {
    let within_one_percent = Comparator::custom("within_1pct", |prev, obs| match (prev, obs) {
        (Observed::Int(p), Observed::Int(o)) => (p - o).abs() * 100 <= *p,
        _ => false,
    });
    assert_eq!(within_one_percent.holds(&int(1000), &int(991)), Ok(true));
    assert_eq!(within_one_percent.holds(&int(1000), &int(980)), Ok(false));
    assert_eq!(within_one_percent.describe(), "custom(within_1pct)");
}

#[test]
fn test_tracked_value_only_moves_on_pass() {
    let cmp = Comparator::default();
    let mut tracked = TrackedValue::default();
    tracked.initialize("utility", int(100)).unwrap();

    assert_eq!(tracked.check("utility", &cmp, int(120), 1), Ok(Ok(())));
    assert_eq!(tracked.last_value(), Some(&int(120)));

    let violation = tracked
        .check("utility", &cmp, int(90), 2)
        .unwrap()
        .unwrap_err();
    assert_eq!(violation.previous, int(120));
    assert_eq!(violation.observed, int(90));
    assert_eq!(violation.step, 2);
    assert_eq!(violation.reason, None);
    assert_eq!(tracked.last_value(), Some(&int(120)));
}

#[test]
fn test_shape_mismatch_is_a_violation() {
    let mut tracked = TrackedValue::default();
    tracked.initialize("reserves", tuple(&[1, 2])).unwrap();

    let violation = tracked
        .check("reserves", &Comparator::default(), int(3), 1)
        .unwrap()
        .unwrap_err();
    assert!(violation.reason.is_some());
    assert_eq!(tracked.last_value(), Some(&tuple(&[1, 2])));
}

struct Nop;

impl SystemUnderTest for Nop {
    fn call(&mut self, _flow: &str, _args: &Args) -> Result<StateSnapshot, SutError> {
        Ok(StateSnapshot::Null)
    }
}

#[test]
fn test_plan_rejects_zero_period() {
    let err = FuzzPlan::<Nop>::builder()
        .flow(FlowDef::new("noop"))
        .invariant(InvariantDef::new("x", |_: &Nop| Ok(Observed::Int(0))).period(0))
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        PlanError::Invariant(InvariantError::InvalidPeriod("x".to_string()))
    );
}

#[test]
fn test_plan_rejects_duplicate_invariant() {
    let err = FuzzPlan::<Nop>::builder()
        .flow(FlowDef::new("noop"))
        .invariant(InvariantDef::new("x", |_: &Nop| Ok(Observed::Int(0))))
        .invariant(InvariantDef::new("x", |_: &Nop| Ok(Observed::Int(1))))
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        PlanError::Invariant(InvariantError::Duplicate("x".to_string()))
    );
}

#[test]
fn test_plan_requires_a_flow() {
    let err = FuzzPlan::<Nop>::builder().build().unwrap_err();
    assert_eq!(err, PlanError::Registry(RegistryError::NoSelectableFlow));
}

#[test]
fn test_plan_surfaces_generator_misconfiguration() {
    let err = FuzzPlan::<Nop>::builder()
        .flow(FlowDef::new("deposit").arg("amount", ArgSpec::int(0, 10, 1.5)))
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        PlanError::Registry(RegistryError::Generator { .. })
    ));
}
