//! qn-core: stable foundation for queuenet.
//!
//! Contains:
//! - rational (exact arbitrary-precision scalar + conversion helpers)
//! - combinatorics (binomial coefficients and enumeration counts)
//! - error (shared error types)

pub mod combinatorics;
pub mod error;
pub mod rational;

// Re-exports: nice ergonomics for downstream crates
pub use combinatorics::*;
pub use error::{QnError, QnResult};
pub use rational::*;
