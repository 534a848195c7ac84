//! Pulse-sequence processing: normalization, confirmation and store-wide
//! canonicalization.
//!
//! A pulse sequence is a `Vec<f64>` of microsecond durations alternating
//! mark (even index, carrier on) and space (odd index, carrier off), always
//! starting with a mark. Values are fractional in flight (the normalizer
//! averages to two decimal places) and whole microseconds at rest: the
//! comparator and tidier both round, and the tidier always runs before the
//! store is written.

pub mod compare;
pub mod normalize;
pub mod tidy;

pub use compare::compare;
pub use normalize::normalize;
pub use tidy::tidy;
