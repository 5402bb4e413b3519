//! Bounded scalar generators with edge bias.
//!
//! Draw order is part of the contract. `random_int` always takes one unit
//! draw for the edge decision, then either one unit draw (min or max) or one
//! uniform integer draw. `random_float`, `random_bool` and `random_choice`
//! take exactly one draw each. Argument specs of a flow are generated in
//! declaration order.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::rng::RandomStream;
use crate::value::ArgValue;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenError {
    #[error("invalid range: min {min} is greater than max {max}")]
    InvalidRange { min: String, max: String },

    #[error("invalid parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: String },
}

/// Integer in `min..=max`. With probability `edge_bias` the result is forced
/// to `min` or `max` (50/50) instead of a uniform draw.
pub fn random_int(
    stream: &mut RandomStream,
    min: i128,
    max: i128,
    edge_bias: f64,
) -> Result<i128, GenError> {
    check_int(min, max, edge_bias)?;

    let value = if stream.unit() < edge_bias {
        if stream.unit() < 0.5 {
            min
        } else {
            max
        }
    } else {
        stream.int_inclusive(min, max)
    };
    trace!(min, max, edge_bias, value, "random_int");
    Ok(value)
}

/// Float in `[min, max]`.
pub fn random_float(stream: &mut RandomStream, min: f64, max: f64) -> Result<f64, GenError> {
    check_float(min, max)?;

    // Interpolate without forming `max - min`, which overflows for wide ranges.
    let u = stream.unit();
    let value = (min * (1.0 - u) + max * u).clamp(min, max);
    trace!(min, max, value, "random_float");
    Ok(value)
}

/// `true` with probability `true_prob`.
pub fn random_bool(stream: &mut RandomStream, true_prob: f64) -> Result<bool, GenError> {
    check_probability("true_prob", true_prob)?;
    Ok(stream.unit() < true_prob)
}

/// One of `options`, uniformly.
pub fn random_choice(stream: &mut RandomStream, options: &[String]) -> Result<String, GenError> {
    if options.is_empty() {
        return Err(GenError::InvalidParameter {
            name: "options",
            value: "empty".to_string(),
        });
    }
    Ok(options[stream.index(options.len())].clone())
}

fn check_int(min: i128, max: i128, edge_bias: f64) -> Result<(), GenError> {
    if min > max {
        return Err(GenError::InvalidRange {
            min: min.to_string(),
            max: max.to_string(),
        });
    }
    check_probability("edge_bias", edge_bias)
}

fn check_float(min: f64, max: f64) -> Result<(), GenError> {
    if !min.is_finite() {
        return Err(GenError::InvalidParameter {
            name: "min",
            value: min.to_string(),
        });
    }
    if !max.is_finite() {
        return Err(GenError::InvalidParameter {
            name: "max",
            value: max.to_string(),
        });
    }
    if min > max {
        return Err(GenError::InvalidRange {
            min: min.to_string(),
            max: max.to_string(),
        });
    }
    Ok(())
}

fn check_probability(name: &'static str, p: f64) -> Result<(), GenError> {
    // NaN fails the range check too.
    if !(0.0..=1.0).contains(&p) {
        return Err(GenError::InvalidParameter {
            name,
            value: p.to_string(),
        });
    }
    Ok(())
}

/// Declarative generator for one flow argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgSpec {
    Int { min: i128, max: i128, edge_bias: f64 },
    Float { min: f64, max: f64 },
    Bool { true_prob: f64 },
    Choice { options: Vec<String> },
}

impl ArgSpec {
    pub fn int(min: i128, max: i128, edge_bias: f64) -> Self {
        ArgSpec::Int { min, max, edge_bias }
    }

    pub fn float(min: f64, max: f64) -> Self {
        ArgSpec::Float { min, max }
    }

    pub fn bool(true_prob: f64) -> Self {
        ArgSpec::Bool { true_prob }
    }

    pub fn choice<I, T>(options: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        ArgSpec::Choice {
            options: options.into_iter().map(Into::into).collect(),
        }
    }

    /// Reject misconfigured specs before any draw happens.
    pub fn validate(&self) -> Result<(), GenError> {
        match self {
            ArgSpec::Int { min, max, edge_bias } => check_int(*min, *max, *edge_bias),
            ArgSpec::Float { min, max } => check_float(*min, *max),
            ArgSpec::Bool { true_prob } => check_probability("true_prob", *true_prob),
            ArgSpec::Choice { options } if options.is_empty() => Err(GenError::InvalidParameter {
                name: "options",
                value: "empty".to_string(),
            }),
            ArgSpec::Choice { .. } => Ok(()),
        }
    }

    pub fn generate(&self, stream: &mut RandomStream) -> Result<ArgValue, GenError> {
        match self {
            ArgSpec::Int { min, max, edge_bias } => {
                random_int(stream, *min, *max, *edge_bias).map(ArgValue::Int)
            }
            ArgSpec::Float { min, max } => random_float(stream, *min, *max).map(ArgValue::Float),
            ArgSpec::Bool { true_prob } => random_bool(stream, *true_prob).map(ArgValue::Bool),
            ArgSpec::Choice { options } => random_choice(stream, options).map(ArgValue::Choice),
        }
    }

    /// Whether `value` lies inside this generator's domain.
    pub fn contains(&self, value: &ArgValue) -> bool {
        match (self, value) {
            (ArgSpec::Int { min, max, .. }, ArgValue::Int(v)) => min <= v && v <= max,
            (ArgSpec::Float { min, max }, ArgValue::Float(v)) => min <= v && v <= max,
            (ArgSpec::Bool { .. }, ArgValue::Bool(_)) => true,
            (ArgSpec::Choice { options }, ArgValue::Choice(v)) => options.contains(v),
            _ => false,
        }
    }
}
