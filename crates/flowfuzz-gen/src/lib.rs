//! Random value generation for flow arguments.
//!
//! Every draw comes from a single [`RandomStream`] owned by the campaign
//! driver. Generators borrow the stream mutably, so the order of calls fixes
//! the values produced: same seed, same call order, same arguments.

pub mod generator;
pub mod rng;
pub mod value;

pub use generator::{random_bool, random_choice, random_float, random_int, ArgSpec, GenError};
pub use rng::RandomStream;
pub use value::{ArgError, ArgValue, Args};
