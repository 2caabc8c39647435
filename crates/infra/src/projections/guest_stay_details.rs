use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use folio_core::StreamId;
use folio_events::EventEnvelope;
use folio_guest_stay::{CheckoutFailureReason, GuestId, GuestStayAccountId, GuestStayEvent, RoomId, STREAM_TYPE};

use crate::read_model::ReadModelStore;

/// Envelopes held per stream while waiting for an earlier sequence number.
pub const MAX_PENDING_PER_STREAM: usize = 1024;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuestStayStatus {
    Open,
    CheckedOut,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Charge,
    Payment,
}

/// One line on the folio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolioTransaction {
    pub transaction_id: Uuid,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub recorded_at: DateTime<Utc>,
}

/// Queryable view of one guest stay account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuestStayDetails {
    pub guest_stay_account_id: GuestStayAccountId,
    pub guest_id: GuestId,
    pub room_id: RoomId,
    pub check_in_date: NaiveDate,
    pub status: GuestStayStatus,
    pub balance: Decimal,
    pub transactions: Vec<FolioTransaction>,
    pub checked_in_at: DateTime<Utc>,
    pub checked_out_at: Option<DateTime<Utc>>,
    pub failed_checkout_attempts: u32,
    pub last_checkout_failure: Option<CheckoutFailureReason>,
}

#[derive(Debug, Error)]
pub enum GuestStayProjectionError {
    #[error("failed to deserialize guest stay event: {0}")]
    Deserialize(String),

    #[error("event account id does not match envelope stream: {0}")]
    StreamMismatch(String),

    #[error("event for unknown account {0} (no check-in seen)")]
    UnknownAccount(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("projection cursor lock poisoned")]
    Poisoned,
}

/// Applied position of one stream plus envelopes that arrived ahead of it.
#[derive(Debug, Default)]
struct StreamProgress {
    applied: u64,
    pending: BTreeMap<u64, EventEnvelope<JsonValue>>,
}

/// Guest stay details projection.
///
/// Consumes published envelopes and keeps one `GuestStayDetails` per account.
/// Envelopes from other stream types are ignored. Duplicates (sequence number
/// at or below the stream cursor) are skipped, so at-least-once delivery is safe.
/// Concurrent writers on one stream may publish out of order; an envelope ahead
/// of the cursor is held until the missing ones arrive.
#[derive(Debug)]
pub struct GuestStayDetailsProjection<S>
where
    S: ReadModelStore<GuestStayAccountId, GuestStayDetails>,
{
    store: S,
    streams: RwLock<HashMap<StreamId, StreamProgress>>,
}

impl<S> GuestStayDetailsProjection<S>
where
    S: ReadModelStore<GuestStayAccountId, GuestStayDetails>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            streams: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, id: &GuestStayAccountId) -> Option<GuestStayDetails> {
        self.store.get(id)
    }

    /// All known accounts, ordered by account id.
    pub fn list(&self) -> Vec<GuestStayDetails> {
        let mut all = self.store.list();
        all.sort_by(|a, b| a.guest_stay_account_id.as_str().cmp(b.guest_stay_account_id.as_str()));
        all
    }

    /// Last applied sequence number for a stream.
    pub fn cursor(&self, stream_id: &StreamId) -> u64 {
        self.streams
            .read()
            .ok()
            .and_then(|s| s.get(stream_id).map(|p| p.applied))
            .unwrap_or(0)
    }

    /// Envelopes held for a stream because an earlier one has not arrived yet.
    pub fn pending(&self, stream_id: &StreamId) -> usize {
        self.streams
            .read()
            .ok()
            .and_then(|s| s.get(stream_id).map(|p| p.pending.len()))
            .unwrap_or(0)
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), GuestStayProjectionError> {
        if envelope.stream_type() != STREAM_TYPE {
            return Ok(());
        }

        let seq = envelope.sequence_number();
        let mut streams = self
            .streams
            .write()
            .map_err(|_| GuestStayProjectionError::Poisoned)?;
        let progress = streams.entry(envelope.stream_id().clone()).or_default();

        if seq == 0 {
            return Err(GuestStayProjectionError::NonMonotonicSequence {
                last: progress.applied,
                found: seq,
            });
        }
        if seq <= progress.applied {
            // Duplicate delivery.
            return Ok(());
        }
        if seq != progress.applied + 1 {
            if progress.pending.len() >= MAX_PENDING_PER_STREAM && !progress.pending.contains_key(&seq) {
                return Err(GuestStayProjectionError::NonMonotonicSequence {
                    last: progress.applied,
                    found: seq,
                });
            }
            debug!(stream_id = %envelope.stream_id(), applied = progress.applied, seq, "holding early envelope");
            progress.pending.insert(seq, envelope.clone());
            return Ok(());
        }

        self.apply_next(envelope)?;
        progress.applied = seq;

        while let Some(next) = progress.pending.remove(&(progress.applied + 1)) {
            self.apply_next(&next)?;
            progress.applied = next.sequence_number();
        }
        Ok(())
    }

    /// Fold one in-order envelope into the read model.
    fn apply_next(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), GuestStayProjectionError> {
        let event: GuestStayEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| GuestStayProjectionError::Deserialize(e.to_string()))?;

        let account_id = event.guest_stay_account_id();
        if account_id.stream_id() != envelope.stream_id() {
            return Err(GuestStayProjectionError::StreamMismatch(envelope.stream_id().to_string()));
        }

        let updated = match event {
            GuestStayEvent::GuestCheckedIn(e) => GuestStayDetails {
                guest_stay_account_id: e.guest_stay_account_id,
                guest_id: e.guest_id,
                room_id: e.room_id,
                check_in_date: e.check_in_date,
                status: GuestStayStatus::Open,
                balance: Decimal::ZERO,
                transactions: vec![],
                checked_in_at: e.checked_in_at,
                checked_out_at: None,
                failed_checkout_attempts: 0,
                last_checkout_failure: None,
            },
            GuestStayEvent::ChargeRecorded(e) => {
                let mut details = self.existing(&e.guest_stay_account_id)?;
                details.balance = details.balance.saturating_add(e.amount.value());
                details.transactions.push(FolioTransaction {
                    transaction_id: e.charge_id,
                    kind: TransactionKind::Charge,
                    amount: e.amount.value(),
                    recorded_at: e.recorded_at,
                });
                details
            }
            GuestStayEvent::PaymentRecorded(e) => {
                let mut details = self.existing(&e.guest_stay_account_id)?;
                details.balance = details.balance.saturating_sub(e.amount.value());
                details.transactions.push(FolioTransaction {
                    transaction_id: e.payment_id,
                    kind: TransactionKind::Payment,
                    amount: e.amount.value(),
                    recorded_at: e.recorded_at,
                });
                details
            }
            GuestStayEvent::GuestCheckedOut(e) => {
                let mut details = self.existing(&e.guest_stay_account_id)?;
                details.status = GuestStayStatus::CheckedOut;
                details.checked_out_at = Some(e.checked_out_at);
                details
            }
            GuestStayEvent::GuestCheckoutFailed(e) => {
                let mut details = self.existing(&e.guest_stay_account_id)?;
                details.failed_checkout_attempts += 1;
                details.last_checkout_failure = Some(e.reason);
                details
            }
        };

        self.store.upsert(updated.guest_stay_account_id.clone(), updated);
        Ok(())
    }

    /// Drop everything and replay `envelopes` in stream/sequence order.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), GuestStayProjectionError> {
        self.streams
            .write()
            .map_err(|_| GuestStayProjectionError::Poisoned)?
            .clear();
        self.store.clear();

        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by(|a, b| {
            a.stream_id()
                .cmp(b.stream_id())
                .then(a.sequence_number().cmp(&b.sequence_number()))
        });

        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }

    fn existing(&self, id: &GuestStayAccountId) -> Result<GuestStayDetails, GuestStayProjectionError> {
        self.store
            .get(id)
            .ok_or_else(|| GuestStayProjectionError::UnknownAccount(id.to_string()))
    }
}
