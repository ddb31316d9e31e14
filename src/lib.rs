//! Reference-count gated recency replacement for cache simulators.
//!
//! A line only gets recency protection once it has been referenced more than
//! the admission threshold since it was installed; until then it stays at the
//! front of the eviction order. [`FixedThreshold`] keeps the threshold
//! constant, [`AdaptiveThreshold`] hill-climbs it from observed miss rates.

pub mod config;
pub mod error;
pub mod feedback;
pub mod replace;

pub use config::{Config, FeedbackScope, PolicyBuilder, PolicyConfig};
pub use error::PolicyError;
pub use feedback::{FeedbackHandle, FeedbackParams, FeedbackSnapshot, WindowOutcome};
pub use replace::{AdaptiveThreshold, FixedThreshold, LineState, Policy, Priority, Replace, Tick};
