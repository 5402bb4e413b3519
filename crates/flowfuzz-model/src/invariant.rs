//! Invariants: a domain read, a period and a comparator against the last
//! accepted value.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::sut::SutError;

/// A value read from the SUT for an invariant check.
///
/// Integers keep the SUT's native precision; tuples compare component-wise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Observed {
    Int(i128),
    Float(f64),
    Tuple(Vec<Observed>),
}

impl Observed {
    fn kind(&self) -> &'static str {
        match self {
            Observed::Int(_) => "int",
            Observed::Float(_) => "float",
            Observed::Tuple(_) => "tuple",
        }
    }
}

impl std::fmt::Display for Observed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Observed::Int(i) => write!(f, "{i}"),
            Observed::Float(x) => write!(f, "{x}"),
            Observed::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Slack allowed by the ordering comparators. Must match the observed kind.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tolerance {
    #[default]
    Exact,
    Int(i128),
    Float(f64),
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Up,
    Down,
}

/// How an observed value is judged against the last accepted one.
#[derive(Clone)]
pub enum Comparator {
    /// `observed >= previous - tolerance`.
    NonDecreasing(Tolerance),
    /// `observed <= previous + tolerance`.
    NonIncreasing(Tolerance),
    Unchanged,
    /// Apply the inner comparator to the first tuple component. Scalars are
    /// compared as they are.
    Leading(Box<Comparator>),
    Custom {
        name: String,
        check: Arc<dyn Fn(&Observed, &Observed) -> bool + Send + Sync>,
    },
}

impl Default for Comparator {
    fn default() -> Self {
        Comparator::NonDecreasing(Tolerance::Exact)
    }
}

impl std::fmt::Debug for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

impl Comparator {
    pub fn custom<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Observed, &Observed) -> bool + Send + Sync + 'static,
    {
        Comparator::Custom {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    pub fn leading(inner: Comparator) -> Self {
        Comparator::Leading(Box::new(inner))
    }

    pub fn describe(&self) -> String {
        match self {
            Comparator::NonDecreasing(Tolerance::Exact) => "non_decreasing".to_string(),
            Comparator::NonDecreasing(t) => format!("non_decreasing(tolerance={t:?})"),
            Comparator::NonIncreasing(Tolerance::Exact) => "non_increasing".to_string(),
            Comparator::NonIncreasing(t) => format!("non_increasing(tolerance={t:?})"),
            Comparator::Unchanged => "unchanged".to_string(),
            Comparator::Leading(inner) => format!("leading({})", inner.describe()),
            Comparator::Custom { name, .. } => format!("custom({name})"),
        }
    }

    /// `Ok(true)` if the transition is accepted. `Err` carries the reason the
    /// two values cannot be compared at all.
    pub fn holds(&self, previous: &Observed, observed: &Observed) -> Result<bool, String> {
        match self {
            Comparator::NonDecreasing(tol) => ordered(previous, observed, *tol, Direction::Up),
            Comparator::NonIncreasing(tol) => ordered(previous, observed, *tol, Direction::Down),
            Comparator::Unchanged => {
                if previous.kind() != observed.kind() {
                    return Err(shape_mismatch(previous, observed));
                }
                Ok(previous == observed)
            }
            Comparator::Leading(inner) => {
                let prev = leading(previous)?;
                let obs = leading(observed)?;
                inner.holds(prev, obs)
            }
            Comparator::Custom { check, .. } => Ok(check(previous, observed)),
        }
    }
}

fn leading(value: &Observed) -> Result<&Observed, String> {
    match value {
        Observed::Tuple(items) => items
            .first()
            .ok_or_else(|| "empty tuple has no leading component".to_string()),
        scalar => Ok(scalar),
    }
}

fn shape_mismatch(previous: &Observed, observed: &Observed) -> String {
    format!(
        "cannot compare {} with {}",
        previous.kind(),
        observed.kind()
    )
}

fn ordered(
    previous: &Observed,
    observed: &Observed,
    tol: Tolerance,
    dir: Direction,
) -> Result<bool, String> {
    match (previous, observed) {
        (Observed::Int(a), Observed::Int(b)) => {
            let t = match tol {
                Tolerance::Exact => 0,
                Tolerance::Int(t) => t,
                Tolerance::Float(_) => return Err("float tolerance on int value".to_string()),
            };
            Ok(match dir {
                Direction::Up => *b >= a.saturating_sub(t),
                Direction::Down => *b <= a.saturating_add(t),
            })
        }
        (Observed::Float(a), Observed::Float(b)) => {
            let t = match tol {
                Tolerance::Exact => 0.0,
                Tolerance::Float(t) => t,
                Tolerance::Int(_) => return Err("int tolerance on float value".to_string()),
            };
            Ok(match dir {
                Direction::Up => *b >= a - t,
                Direction::Down => *b <= a + t,
            })
        }
        (Observed::Tuple(xs), Observed::Tuple(ys)) => {
            if xs.len() != ys.len() {
                return Err(format!(
                    "tuple arity changed from {} to {}",
                    xs.len(),
                    ys.len()
                ));
            }
            for (x, y) in xs.iter().zip(ys) {
                if !ordered(x, y, tol, dir)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        _ => Err(shape_mismatch(previous, observed)),
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvariantError {
    #[error("invariant '{0}' has period 0")]
    InvalidPeriod(String),

    #[error("invariant '{0}' is already registered")]
    Duplicate(String),

    #[error("invariant '{0}' checked before its baseline was captured")]
    NotInitialized(String),

    #[error("invariant '{0}' baseline captured twice")]
    AlreadyInitialized(String),
}

/// A failed check. `previous` is the last accepted value, which the failing
/// check leaves in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub invariant: String,
    pub step: u64,
    pub comparator: String,
    pub previous: Observed,
    pub observed: Observed,
    /// Set when the values could not be compared at all.
    pub reason: Option<String>,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invariant '{}' ({}) violated at step {}: {} -> {}",
            self.invariant, self.comparator, self.step, self.previous, self.observed
        )?;
        if let Some(reason) = &self.reason {
            write!(f, " ({reason})")?;
        }
        Ok(())
    }
}

/// Per-sequence state of one invariant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackedValue {
    last_value: Option<Observed>,
}

impl TrackedValue {
    pub fn last_value(&self) -> Option<&Observed> {
        self.last_value.as_ref()
    }

    pub fn initialize(&mut self, name: &str, baseline: Observed) -> Result<(), InvariantError> {
        if self.last_value.is_some() {
            return Err(InvariantError::AlreadyInitialized(name.to_string()));
        }
        self.last_value = Some(baseline);
        Ok(())
    }

    /// Judge `observed`. Only a passing check replaces the stored value.
    pub fn check(
        &mut self,
        name: &str,
        comparator: &Comparator,
        observed: Observed,
        step: u64,
    ) -> Result<Result<(), Violation>, InvariantError> {
        let previous = self
            .last_value
            .as_ref()
            .ok_or_else(|| InvariantError::NotInitialized(name.to_string()))?;

        let (passed, reason) = match comparator.holds(previous, &observed) {
            Ok(passed) => (passed, None),
            Err(reason) => (false, Some(reason)),
        };

        if passed {
            self.last_value = Some(observed);
            return Ok(Ok(()));
        }

        Ok(Err(Violation {
            invariant: name.to_string(),
            step,
            comparator: comparator.describe(),
            previous: previous.clone(),
            observed,
            reason,
        }))
    }
}

pub type ObserveFn<S> = Arc<dyn Fn(&S) -> Result<Observed, SutError> + Send + Sync>;
pub type InitFn<S> = Arc<dyn Fn(&mut S) -> Result<Observed, SutError> + Send + Sync>;

/// Registration record for one invariant.
pub struct InvariantDef<S> {
    name: String,
    period: u64,
    comparator: Comparator,
    observe: ObserveFn<S>,
    init: Option<InitFn<S>>,
}

impl<S> InvariantDef<S> {
    /// Period 1, must not decrease, baseline taken with `observe`.
    pub fn new<F>(name: impl Into<String>, observe: F) -> Self
    where
        F: Fn(&S) -> Result<Observed, SutError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            period: 1,
            comparator: Comparator::default(),
            observe: Arc::new(observe),
            init: None,
        }
    }

    pub fn period(mut self, period: u64) -> Self {
        self.period = period;
        self
    }

    pub fn comparator(mut self, comparator: Comparator) -> Self {
        self.comparator = comparator;
        self
    }

    /// Custom baseline capture, run once during pre-sequence setup.
    pub fn init<F>(mut self, init: F) -> Self
    where
        F: Fn(&mut S) -> Result<Observed, SutError> + Send + Sync + 'static,
    {
        self.init = Some(Arc::new(init));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn period_steps(&self) -> u64 {
        self.period
    }

    pub fn comparator_ref(&self) -> &Comparator {
        &self.comparator
    }

    pub fn validate(&self) -> Result<(), InvariantError> {
        if self.period == 0 {
            return Err(InvariantError::InvalidPeriod(self.name.clone()));
        }
        Ok(())
    }

    /// Whether a check is due after `step` completed flows.
    pub fn is_due(&self, step: u64) -> bool {
        step > 0 && self.period > 0 && step % self.period == 0
    }

    pub fn observe(&self, sut: &S) -> Result<Observed, SutError> {
        (self.observe)(sut)
    }

    pub fn baseline(&self, sut: &mut S) -> Result<Observed, SutError> {
        match &self.init {
            Some(init) => init(sut),
            None => (self.observe)(sut),
        }
    }
}

impl<S> Clone for InvariantDef<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            period: self.period,
            comparator: self.comparator.clone(),
            observe: self.observe.clone(),
            init: self.init.clone(),
        }
    }
}

impl<S> std::fmt::Debug for InvariantDef<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvariantDef")
            .field("name", &self.name)
            .field("period", &self.period)
            .field("comparator", &self.comparator)
            .field("custom_init", &self.init.is_some())
            .finish()
    }
}
