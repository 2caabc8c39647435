//! Event mechanics shared by deciders and infrastructure.
//!
//! Domain-agnostic: event/command traits, envelopes, and the pub/sub bus used to
//! fan committed events out to read models.

pub mod bus;
pub mod command;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use command::Command;
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
