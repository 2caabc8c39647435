//! Infrastructure wiring behind the HTTP handlers.
//!
//! One `AppServices` per process: event store, bus, dispatcher, stay registry,
//! clock and the guest stay details projection (fed by a background worker).

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use folio_core::{Clock, SystemClock};
use folio_events::{EventEnvelope, InMemoryEventBus};
use folio_guest_stay::{
    Amount, CheckIn, CheckOut, CheckoutFailureReason, GuestId, GuestStayAccountId, GuestStayCommand,
    GuestStayDecider, GuestStayEvent, RecordCharge, RecordPayment, RoomId, STREAM_TYPE,
};
use folio_infra::{
    command_dispatcher::{CommandDispatcher, DispatchError},
    config::{FolioConfig, StorageConfig},
    event_store::{EventStore, InMemoryEventStore, StoredEvent},
    projections::{GuestStayDetails, GuestStayDetailsProjection, GuestStayProjectionError},
    read_model::InMemoryReadModelStore,
    stay_registry::{InMemoryStayRegistry, StayRegistry, StayRegistryError},
    workers::{ProjectionWorker, WorkerHandle},
};

#[cfg(feature = "postgres")]
use folio_infra::event_store::PostgresEventStore;

pub type SharedStore = Arc<dyn EventStore>;
pub type SharedBus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type Dispatcher = CommandDispatcher<SharedStore, SharedBus>;
pub type DetailsProjection =
    GuestStayDetailsProjection<Arc<InMemoryReadModelStore<GuestStayAccountId, GuestStayDetails>>>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The registry does not know this guest/room/date combination.
    #[error("no stay registered for guest {guest_id} in room {room_id}")]
    StayNotFound { guest_id: GuestId, room_id: RoomId },

    #[error(transparent)]
    Registry(#[from] StayRegistryError),
}

/// Result of a check-out attempt that was accepted and recorded.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    CheckedOut,
    Failed(CheckoutFailureReason),
}

pub struct AppServices {
    dispatcher: Dispatcher,
    registry: Arc<dyn StayRegistry>,
    clock: Arc<dyn Clock>,
    details: Arc<DetailsProjection>,
    _worker: WorkerHandle,
}

impl core::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppServices")
            .field("max_attempts", &self.dispatcher.max_attempts())
            .finish_non_exhaustive()
    }
}

impl AppServices {
    /// Wire services around `store` and start the projection worker.
    pub fn new(
        store: SharedStore,
        registry: Arc<dyn StayRegistry>,
        clock: Arc<dyn Clock>,
        max_attempts: u32,
    ) -> std::io::Result<Self> {
        let bus: SharedBus = Arc::new(InMemoryEventBus::new());
        let details: Arc<DetailsProjection> =
            Arc::new(GuestStayDetailsProjection::new(Arc::new(InMemoryReadModelStore::new())));

        let sink = details.clone();
        let worker = ProjectionWorker::spawn("guest-stay-details", &bus, move |env: EventEnvelope<JsonValue>| {
            sink.apply_envelope(&env)
        })?;

        Ok(Self {
            dispatcher: CommandDispatcher::new(store, bus).with_max_attempts(max_attempts),
            registry,
            clock,
            details,
            _worker: worker,
        })
    }

    /// In-memory store, every stay allowed, wall clock.
    pub fn in_memory(max_attempts: u32) -> std::io::Result<Self> {
        Self::new(
            Arc::new(InMemoryEventStore::new()),
            Arc::new(InMemoryStayRegistry::allow_all()),
            Arc::new(SystemClock),
            max_attempts,
        )
    }

    /// Build services for a loaded configuration.
    ///
    /// With Postgres storage the details read model is rebuilt from the full
    /// event history before any command is served.
    pub async fn from_config(config: &FolioConfig) -> anyhow::Result<Self> {
        match &config.storage {
            StorageConfig::InMemory => Ok(Self::in_memory(config.max_append_attempts)?),
            StorageConfig::Postgres { database_url } => {
                #[cfg(feature = "postgres")]
                {
                    let store = PostgresEventStore::connect(database_url).await?;
                    let history = store.all_events().await?;
                    let services = Self::new(
                        Arc::new(store),
                        Arc::new(InMemoryStayRegistry::allow_all()),
                        Arc::new(SystemClock),
                        config.max_append_attempts,
                    )?;
                    services.rebuild_details(&history)?;
                    info!(events = history.len(), "guest stay details rebuilt from postgres");
                    Ok(services)
                }
                #[cfg(not(feature = "postgres"))]
                {
                    let _ = database_url;
                    warn!("USE_PERSISTENT_STORES=true but postgres feature not enabled, falling back to in-memory");
                    Ok(Self::in_memory(config.max_append_attempts)?)
                }
            }
        }
    }

    /// Open the folio for a guest arriving today.
    ///
    /// Returns the account id and the check-in date it was derived from.
    pub async fn check_in(
        &self,
        guest_id: GuestId,
        room_id: RoomId,
    ) -> Result<(GuestStayAccountId, NaiveDate), ServiceError> {
        let now = self.clock.now();
        if !self.registry.exists(&guest_id, &room_id, now.date_naive()).await? {
            return Err(ServiceError::StayNotFound { guest_id, room_id });
        }

        let cmd = CheckIn { guest_id, room_id, now };
        let id = cmd.guest_stay_account_id();
        let date = cmd.check_in_date();
        self.dispatch(&id, GuestStayCommand::CheckIn(cmd)).await?;

        info!(guest_stay_account_id = %id, "guest checked in");
        Ok((id, date))
    }

    pub async fn record_charge(&self, id: &GuestStayAccountId, amount: Amount) -> Result<Uuid, ServiceError> {
        let charge_id = Uuid::now_v7();
        let cmd = RecordCharge {
            guest_stay_account_id: id.clone(),
            charge_id,
            amount,
            now: self.clock.now(),
        };
        self.dispatch(id, GuestStayCommand::RecordCharge(cmd)).await?;
        Ok(charge_id)
    }

    pub async fn record_payment(&self, id: &GuestStayAccountId, amount: Amount) -> Result<Uuid, ServiceError> {
        let payment_id = Uuid::now_v7();
        let cmd = RecordPayment {
            guest_stay_account_id: id.clone(),
            payment_id,
            amount,
            now: self.clock.now(),
        };
        self.dispatch(id, GuestStayCommand::RecordPayment(cmd)).await?;
        Ok(payment_id)
    }

    /// Attempt check-out. A refused check-out is still recorded.
    pub async fn check_out(&self, id: &GuestStayAccountId) -> Result<CheckoutOutcome, ServiceError> {
        let cmd = CheckOut {
            guest_stay_account_id: id.clone(),
            now: self.clock.now(),
        };
        let events = self.dispatch(id, GuestStayCommand::CheckOut(cmd)).await?;

        let outcome = checkout_outcome(&events)?;

        if let CheckoutOutcome::Failed(reason) = outcome {
            warn!(guest_stay_account_id = %id, %reason, "check-out refused");
        }
        Ok(outcome)
    }

    /// Current balance by replaying the stream (not the read model).
    pub async fn balance(&self, id: &GuestStayAccountId) -> Result<Option<Decimal>, ServiceError> {
        let (state, _) = self
            .dispatcher
            .load_state::<GuestStayDecider>(id.stream_id())
            .await?;
        Ok(state.balance())
    }

    pub fn details(&self, id: &GuestStayAccountId) -> Option<GuestStayDetails> {
        self.details.get(id)
    }

    /// Replace the details read model with a replay of `history`.
    pub fn rebuild_details(&self, history: &[StoredEvent]) -> Result<(), GuestStayProjectionError> {
        self.details
            .rebuild_from_scratch(history.iter().map(StoredEvent::to_envelope))
    }

    async fn dispatch(
        &self,
        id: &GuestStayAccountId,
        command: GuestStayCommand,
    ) -> Result<Vec<GuestStayEvent>, DispatchError> {
        self.dispatcher
            .dispatch::<GuestStayDecider>(id.stream_id(), STREAM_TYPE, command)
            .await
            .map(|d| d.events)
    }
}

/// The single outcome event a check-out must produce.
fn checkout_outcome(events: &[GuestStayEvent]) -> Result<CheckoutOutcome, DispatchError> {
    events
        .iter()
        .find_map(|e| match e {
            GuestStayEvent::GuestCheckedOut(_) => Some(CheckoutOutcome::CheckedOut),
            GuestStayEvent::GuestCheckoutFailed(f) => Some(CheckoutOutcome::Failed(f.reason)),
            _ => None,
        })
        .ok_or_else(|| DispatchError::Internal("check-out produced no outcome event".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};
    use folio_guest_stay::GuestCheckoutFailed;

    #[test]
    fn missing_checkout_outcome_is_an_internal_error() {
        assert!(matches!(checkout_outcome(&[]), Err(DispatchError::Internal(_))));
    }

    #[test]
    fn failed_checkout_carries_its_reason() {
        let at = Utc.with_ymd_and_hms(2024, 5, 17, 11, 0, 0).unwrap();
        let id = GuestStayAccountId::new(
            &GuestId::new("g").unwrap(),
            &RoomId::new("1").unwrap(),
            at.date_naive(),
        );
        let events = [GuestStayEvent::GuestCheckoutFailed(GuestCheckoutFailed {
            guest_stay_account_id: id,
            reason: CheckoutFailureReason::BalanceNotSettled,
            attempted_at: at,
        })];
        assert_eq!(
            checkout_outcome(&events).unwrap(),
            CheckoutOutcome::Failed(CheckoutFailureReason::BalanceNotSettled)
        );
    }
}
