use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rust_decimal_macros::dec;
use tokio::runtime::Runtime;
use uuid::Uuid;

use folio_core::{Decider, ExpectedVersion};
use folio_events::{EventEnvelope, InMemoryEventBus};
use folio_guest_stay::{
    Amount, ChargeRecorded, CheckIn, GuestCheckedIn, GuestId, GuestStayAccountId, GuestStayCommand,
    GuestStayDecider, GuestStayEvent, RecordCharge, RoomId, STREAM_TYPE,
};
use folio_infra::command_dispatcher::CommandDispatcher;
use folio_infra::event_store::{EventStore, InMemoryEventStore, UncommittedEvent};
use folio_infra::projections::{GuestStayDetails, GuestStayDetailsProjection};
use folio_infra::read_model::InMemoryReadModelStore;

type Dispatcher = CommandDispatcher<InMemoryEventStore, Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>>;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("bench runtime")
}

fn dispatcher() -> Dispatcher {
    CommandDispatcher::new(InMemoryEventStore::new(), Arc::new(InMemoryEventBus::new()))
}

fn check_in(n: usize) -> CheckIn {
    CheckIn {
        guest_id: GuestId::new(format!("guest-{n}")).expect("guest id"),
        room_id: RoomId::new("101").expect("room id"),
        now: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + Duration::days(n as i64 % 365),
    }
}

fn charge_cmd(id: &GuestStayAccountId) -> GuestStayCommand {
    GuestStayCommand::RecordCharge(RecordCharge {
        guest_stay_account_id: id.clone(),
        charge_id: Uuid::now_v7(),
        amount: Amount::new(dec!(12.50)).expect("amount"),
        now: Utc::now(),
    })
}

/// Check-in followed by `charges` charges, as typed events.
fn history(charges: usize) -> (GuestStayAccountId, Vec<GuestStayEvent>) {
    let cmd = check_in(0);
    let id = cmd.guest_stay_account_id();
    let mut events = vec![GuestStayEvent::GuestCheckedIn(GuestCheckedIn {
        guest_stay_account_id: id.clone(),
        guest_id: cmd.guest_id.clone(),
        room_id: cmd.room_id.clone(),
        check_in_date: cmd.check_in_date(),
        checked_in_at: cmd.now,
    })];
    events.extend((0..charges).map(|_| {
        GuestStayEvent::ChargeRecorded(ChargeRecorded {
            guest_stay_account_id: id.clone(),
            charge_id: Uuid::now_v7(),
            amount: Amount::new(dec!(3)).expect("amount"),
            recorded_at: cmd.now,
        })
    }));
    (id, events)
}

fn bench_dispatch_latency(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("dispatch_latency");

    group.bench_function("check_in_fresh_account", |b| {
        let dispatcher = dispatcher();
        let mut n = 0usize;
        b.iter(|| {
            n += 1;
            let cmd = check_in(n);
            let id = cmd.guest_stay_account_id();
            rt.block_on(dispatcher.dispatch::<GuestStayDecider>(
                id.stream_id(),
                STREAM_TYPE,
                GuestStayCommand::CheckIn(cmd),
            ))
            .ok();
        });
    });

    group.bench_function("charge_with_growing_history", |b| {
        let dispatcher = dispatcher();
        let cmd = check_in(0);
        let id = cmd.guest_stay_account_id();
        rt.block_on(dispatcher.dispatch::<GuestStayDecider>(id.stream_id(), STREAM_TYPE, GuestStayCommand::CheckIn(cmd)))
            .expect("check in");

        b.iter(|| {
            rt.block_on(dispatcher.dispatch::<GuestStayDecider>(id.stream_id(), STREAM_TYPE, charge_cmd(&id)))
                .expect("charge");
        });
    });

    group.finish();
}

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay_fold");

    for charges in [10usize, 100, 1_000, 10_000] {
        let (_, events) = history(charges);
        group.throughput(Throughput::Elements(events.len() as u64));
        group.bench_with_input(BenchmarkId::new("fold", charges), &events, |b, events| {
            b.iter(|| black_box(GuestStayDecider::fold(events.iter())));
        });
    }

    group.finish();
}

fn bench_projection_rebuild(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("projection_rebuild");

    for charges in [10usize, 100, 1_000] {
        let (id, events) = history(charges);
        let store = InMemoryEventStore::new();
        let uncommitted = events
            .iter()
            .map(|e| UncommittedEvent::from_typed(id.stream_id().clone(), STREAM_TYPE, Uuid::now_v7(), e))
            .collect::<Result<Vec<_>, _>>()
            .expect("serialize");
        let stored = rt
            .block_on(store.append(uncommitted, ExpectedVersion::Exact(0)))
            .expect("append");
        let envelopes: Vec<_> = stored.iter().map(|e| e.to_envelope()).collect();

        let read_models: Arc<InMemoryReadModelStore<GuestStayAccountId, GuestStayDetails>> =
            Arc::new(InMemoryReadModelStore::new());
        let projection = GuestStayDetailsProjection::new(read_models);

        group.throughput(Throughput::Elements(envelopes.len() as u64));
        group.bench_with_input(BenchmarkId::new("rebuild_from_envelopes", charges), &envelopes, |b, envs| {
            b.iter(|| projection.rebuild_from_scratch(black_box(envs.clone())).expect("rebuild"));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_dispatch_latency, bench_replay, bench_projection_rebuild);
criterion_main!(benches);
