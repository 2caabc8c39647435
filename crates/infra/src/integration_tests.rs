//! Full pipeline: Command → EventStore → EventBus → Projection → ReadModel.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use folio_events::{EventEnvelope, InMemoryEventBus};
use folio_guest_stay::{
    Amount, CheckIn, CheckOut, GuestId, GuestStayAccountId, GuestStayCommand, GuestStayDecider, GuestStayEvent,
    RecordCharge, RecordPayment, RoomId, STREAM_TYPE,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, InMemoryEventStore};
use crate::projections::{GuestStayDetails, GuestStayDetailsProjection, GuestStayStatus};
use crate::read_model::InMemoryReadModelStore;
use crate::workers::{ProjectionWorker, WorkerHandle};

type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Bus>;
type Projection = GuestStayDetailsProjection<Arc<InMemoryReadModelStore<GuestStayAccountId, GuestStayDetails>>>;

struct Harness {
    dispatcher: Arc<Dispatcher>,
    store: Arc<InMemoryEventStore>,
    projection: Arc<Projection>,
    worker: WorkerHandle,
}

fn setup() -> Harness {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let projection: Arc<Projection> = Arc::new(GuestStayDetailsProjection::new(Arc::new(InMemoryReadModelStore::new())));

    let sink = projection.clone();
    let worker = ProjectionWorker::spawn("guest-stay-details-test", &bus, move |env: EventEnvelope<JsonValue>| {
        sink.apply_envelope(&env)
    })
    .unwrap();

    Harness {
        dispatcher: Arc::new(CommandDispatcher::new(store.clone(), bus).with_max_attempts(16)),
        store,
        projection,
        worker,
    }
}

fn check_in(guest: &str, room: &str) -> CheckIn {
    CheckIn {
        guest_id: GuestId::new(guest).unwrap(),
        room_id: RoomId::new(room).unwrap(),
        now: Utc.with_ymd_and_hms(2024, 11, 2, 13, 45, 0).unwrap(),
    }
}

fn charge(id: &GuestStayAccountId, amount: Decimal) -> GuestStayCommand {
    GuestStayCommand::RecordCharge(RecordCharge {
        guest_stay_account_id: id.clone(),
        charge_id: Uuid::now_v7(),
        amount: Amount::new(amount).unwrap(),
        now: Utc::now(),
    })
}

fn payment(id: &GuestStayAccountId, amount: Decimal) -> GuestStayCommand {
    GuestStayCommand::RecordPayment(RecordPayment {
        guest_stay_account_id: id.clone(),
        payment_id: Uuid::now_v7(),
        amount: Amount::new(amount).unwrap(),
        now: Utc::now(),
    })
}

fn check_out(id: &GuestStayAccountId) -> GuestStayCommand {
    GuestStayCommand::CheckOut(CheckOut {
        guest_stay_account_id: id.clone(),
        now: Utc::now(),
    })
}

async fn run(
    dispatcher: &Dispatcher,
    id: &GuestStayAccountId,
    command: GuestStayCommand,
) -> Result<Vec<GuestStayEvent>, DispatchError> {
    dispatcher
        .dispatch::<GuestStayDecider>(id.stream_id(), STREAM_TYPE, command)
        .await
        .map(|d| d.events)
}

/// Poll the read model until it reaches `version` (projection runs on its own thread).
fn details_eventually(h: &Harness, id: &GuestStayAccountId, version: u64) -> GuestStayDetails {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if h.projection.cursor(id.stream_id()) >= version {
            if let Some(details) = h.projection.get(id) {
                return details;
            }
        }
        assert!(Instant::now() < deadline, "projection did not catch up to version {version}");
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[tokio::test]
async fn settled_stay_checks_out_and_read_model_follows() {
    let h = setup();
    let cmd = check_in("guest-a", "101");
    let id = cmd.guest_stay_account_id();

    run(&h.dispatcher, &id, GuestStayCommand::CheckIn(cmd)).await.unwrap();
    run(&h.dispatcher, &id, charge(&id, dec!(100))).await.unwrap();
    run(&h.dispatcher, &id, payment(&id, dec!(100))).await.unwrap();
    let events = run(&h.dispatcher, &id, check_out(&id)).await.unwrap();
    assert!(matches!(events.as_slice(), [GuestStayEvent::GuestCheckedOut(_)]));

    let details = details_eventually(&h, &id, 4);
    assert_eq!(details.status, GuestStayStatus::CheckedOut);
    assert_eq!(details.balance, Decimal::ZERO);
    assert_eq!(details.transactions.len(), 2);

    h.worker.shutdown();
}

#[tokio::test]
async fn unsettled_checkout_is_recorded_and_stay_remains_open() {
    let h = setup();
    let cmd = check_in("guest-b", "102");
    let id = cmd.guest_stay_account_id();

    run(&h.dispatcher, &id, GuestStayCommand::CheckIn(cmd)).await.unwrap();
    run(&h.dispatcher, &id, charge(&id, dec!(50))).await.unwrap();
    let events = run(&h.dispatcher, &id, check_out(&id)).await.unwrap();
    assert!(matches!(events.as_slice(), [GuestStayEvent::GuestCheckoutFailed(_)]));

    // Still open: more charges are accepted.
    run(&h.dispatcher, &id, charge(&id, dec!(5))).await.unwrap();

    let details = details_eventually(&h, &id, 4);
    assert_eq!(details.status, GuestStayStatus::Open);
    assert_eq!(details.balance, dec!(55));
    assert_eq!(details.failed_checkout_attempts, 1);

    h.worker.shutdown();
}

#[tokio::test]
async fn closed_stays_reject_further_entries() {
    let h = setup();
    let cmd = check_in("guest-c", "103");
    let id = cmd.guest_stay_account_id();

    run(&h.dispatcher, &id, GuestStayCommand::CheckIn(cmd)).await.unwrap();
    run(&h.dispatcher, &id, check_out(&id)).await.unwrap();

    let err = run(&h.dispatcher, &id, payment(&id, dec!(1))).await.unwrap_err();
    assert!(matches!(err, DispatchError::Precondition { code: "already_closed", .. }));
    assert_eq!(h.store.load_stream(id.stream_id()).await.unwrap().len(), 2);

    h.worker.shutdown();
}

#[tokio::test]
async fn accounts_are_independent_streams() {
    let h = setup();
    let first = check_in("guest-d", "201");
    let second = check_in("guest-d", "202");
    let a = first.guest_stay_account_id();
    let b = second.guest_stay_account_id();
    assert_ne!(a, b);

    run(&h.dispatcher, &a, GuestStayCommand::CheckIn(first)).await.unwrap();
    run(&h.dispatcher, &b, GuestStayCommand::CheckIn(second)).await.unwrap();
    run(&h.dispatcher, &a, charge(&a, dec!(30))).await.unwrap();

    assert_eq!(details_eventually(&h, &a, 2).balance, dec!(30));
    assert_eq!(details_eventually(&h, &b, 1).balance, Decimal::ZERO);

    h.worker.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_charges_all_land_via_retry() {
    let h = setup();
    let cmd = check_in("guest-e", "301");
    let id = cmd.guest_stay_account_id();
    run(&h.dispatcher, &id, GuestStayCommand::CheckIn(cmd)).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let dispatcher = h.dispatcher.clone();
        let id = id.clone();
        tasks.push(tokio::spawn(async move { run(&dispatcher, &id, charge(&id, dec!(10))).await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let (state, version) = h
        .dispatcher
        .load_state::<GuestStayDecider>(id.stream_id())
        .await
        .unwrap();
    assert_eq!(version, 11);
    assert_eq!(state.balance(), Some(dec!(100)));
    assert_eq!(details_eventually(&h, &id, 11).balance, dec!(100));

    h.worker.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn read_model_keeps_up_with_concurrent_writers_over_many_rounds() {
    let h = setup();

    for round in 0..100 {
        let cmd = check_in(&format!("guest-round-{round}"), "501");
        let id = cmd.guest_stay_account_id();
        run(&h.dispatcher, &id, GuestStayCommand::CheckIn(cmd)).await.unwrap();

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let dispatcher = h.dispatcher.clone();
                let id = id.clone();
                tokio::spawn(async move { run(&dispatcher, &id, charge(&id, dec!(1))).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let details = details_eventually(&h, &id, 11);
        assert_eq!(details.balance, dec!(10), "round {round}");
        assert_eq!(details.transactions.len(), 10, "round {round}");
        assert_eq!(h.projection.pending(id.stream_id()), 0, "round {round}");
    }

    h.worker.shutdown();
}

#[tokio::test]
async fn read_model_rebuilds_from_the_store() {
    let h = setup();
    let cmd = check_in("guest-f", "401");
    let id = cmd.guest_stay_account_id();

    run(&h.dispatcher, &id, GuestStayCommand::CheckIn(cmd)).await.unwrap();
    run(&h.dispatcher, &id, charge(&id, dec!(30))).await.unwrap();
    run(&h.dispatcher, &id, charge(&id, dec!(20))).await.unwrap();
    run(&h.dispatcher, &id, payment(&id, dec!(50))).await.unwrap();
    run(&h.dispatcher, &id, check_out(&id)).await.unwrap();
    let live = details_eventually(&h, &id, 5);
    h.worker.shutdown();

    let rebuilt: Projection = GuestStayDetailsProjection::new(Arc::new(InMemoryReadModelStore::new()));
    let envelopes = h
        .store
        .all_events()
        .unwrap()
        .iter()
        .map(|e| e.to_envelope())
        .collect::<Vec<_>>();
    rebuilt.rebuild_from_scratch(envelopes).unwrap();

    assert_eq!(rebuilt.get(&id), Some(live));
}
