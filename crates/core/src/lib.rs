//! `folio-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod clock;
pub mod decider;
pub mod error;
pub mod id;

pub use clock::{Clock, FixedClock, SystemClock};
pub use decider::{Decider, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::StreamId;
