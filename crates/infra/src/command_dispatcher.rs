//! Command execution pipeline (application-level orchestration).
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the stream from the store
//!   ↓
//! 2. Validate it (single stream, monotonic sequence numbers)
//!   ↓
//! 3. Fold history into current state (Decider::fold)
//!   ↓
//! 4. Decide (pure, produces events or a rejection)
//!   ↓
//! 5. Append with ExpectedVersion::Exact(loaded version)
//!   ↓
//! 6. Publish committed envelopes to the bus
//! ```
//!
//! A stale append (another writer committed first) restarts from step 1, up to
//! `max_attempts` times. Deciders never retry on their own.
//!
//! Once step 5 succeeds the command has happened. A failed publish is logged
//! and the dispatch still succeeds; read models catch up on rebuild.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use folio_core::{Decider, DomainError, ExpectedVersion, StreamId};
use folio_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// Attempts made before a concurrency conflict is surfaced to the caller.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Optimistic concurrency failure that outlived every retry.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// Input rejected before or by the decider.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The command is not allowed in the stream's current state.
    #[error("precondition failed ({code}): {message}")]
    Precondition { code: &'static str, message: String },

    #[error("not found")]
    NotFound,

    /// Stored payloads could not be decoded into the decider's event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),

    #[error(transparent)]
    Store(EventStoreError),

    /// A server-side invariant did not hold.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => DispatchError::Validation(msg),
            DomainError::Precondition { code, message } => DispatchError::Precondition { code, message },
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::Conflict(msg) => DispatchError::Concurrency(msg),
        }
    }
}

/// Outcome of a successful dispatch.
///
/// `events` are the typed events the decider produced; `committed` are the same
/// events as persisted (with sequence numbers). Both are empty when the decider
/// had nothing to say.
#[derive(Debug, Clone)]
pub struct Dispatched<E> {
    pub events: Vec<E>,
    pub committed: Vec<StoredEvent>,
}

impl<E> Dispatched<E> {
    /// Stream version after the append (`None` if nothing was appended).
    pub fn version(&self) -> Option<u64> {
        self.committed.last().map(StoredEvent::stream_version)
    }
}

/// Reusable command execution engine for deciders.
///
/// Generic over the store and the bus so tests run on the in-memory
/// implementations and production swaps in Postgres without touching domain code.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
    max_attempts: u32,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store,
            bus,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Bound the number of load/decide/append attempts (at least one).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Run `command` against the stream `stream_id`.
    ///
    /// Rejections from the decider are returned as errors and nothing is
    /// appended. On success the committed events have been handed to the bus
    /// (or the publish failure logged).
    #[instrument(
        skip(self, command),
        fields(stream_id = %stream_id, stream_type = stream_type),
        err
    )]
    pub async fn dispatch<D>(
        &self,
        stream_id: &StreamId,
        stream_type: &str,
        command: D::Command,
    ) -> Result<Dispatched<D::Event>, DispatchError>
    where
        D: Decider,
        D::Event: folio_events::Event + Serialize + DeserializeOwned,
        D::Error: Into<DomainError>,
    {
        let mut attempt = 1;
        loop {
            match self.try_dispatch::<D>(stream_id, stream_type, &command).await {
                Err(DispatchError::Concurrency(msg)) if attempt < self.max_attempts => {
                    warn!(attempt, max_attempts = self.max_attempts, reason = %msg, "stale append, retrying");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Rebuild current state and version of a stream without deciding anything.
    #[instrument(skip(self), fields(stream_id = %stream_id), err)]
    pub async fn load_state<D>(&self, stream_id: &StreamId) -> Result<(D::State, u64), DispatchError>
    where
        D: Decider,
        D::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(stream_id).await?;
        validate_loaded_stream(stream_id, &history)?;
        let events = decode_history::<D::Event>(&history)?;
        Ok((D::fold(&events), stream_version(&history)))
    }

    async fn try_dispatch<D>(
        &self,
        stream_id: &StreamId,
        stream_type: &str,
        command: &D::Command,
    ) -> Result<Dispatched<D::Event>, DispatchError>
    where
        D: Decider,
        D::Event: folio_events::Event + Serialize + DeserializeOwned,
        D::Error: Into<DomainError>,
    {
        let history = self.store.load_stream(stream_id).await?;
        validate_loaded_stream(stream_id, &history)?;
        let version = stream_version(&history);

        let state = D::fold(&decode_history::<D::Event>(&history)?);

        let decided = D::decide(command, &state).map_err(|e| {
            let err: DomainError = e.into();
            DispatchError::from(err)
        })?;
        if decided.is_empty() {
            return Ok(Dispatched {
                events: vec![],
                committed: vec![],
            });
        }

        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(stream_id.clone(), stream_type, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self
            .store
            .append(uncommitted, ExpectedVersion::Exact(version))
            .await?;

        for stored in &committed {
            if let Err(e) = self.bus.publish(stored.to_envelope()) {
                error!(
                    sequence_number = stored.sequence_number,
                    error = ?e,
                    "committed event not published; read models need a rebuild"
                );
                break;
            }
        }

        debug!(
            from_version = version,
            appended = committed.len(),
            "events committed"
        );

        Ok(Dispatched {
            events: decided,
            committed,
        })
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(stream_id: &StreamId, stream: &[StoredEvent]) -> Result<(), DispatchError> {
    // A misbehaving backend must not leak another stream's history into a decision.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if &e.stream_id != stream_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream contains foreign stream_id at index {idx}"
            ))));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn decode_history<E: DeserializeOwned>(history: &[StoredEvent]) -> Result<Vec<E>, DispatchError> {
    history
        .iter()
        .map(|stored| {
            serde_json::from_value(stored.payload.clone())
                .map_err(|e| DispatchError::Deserialize(format!("{} #{}: {e}", stored.event_type, stored.sequence_number)))
        })
        .collect()
}
