use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::runtime::Runtime;

use replica_core::{
    AggregateId, CommandId, ExpectedVersion, NamedAggregate, RequestId, StateRoot, TailVersion,
    TenantId,
};
use replica_events::{
    CommandBus, CommandMessage, ConstructorStateAggregateFactory, DomainEvent, Event,
    EventMetadata, InMemoryCommandBus, Snapshot, StateAggregate, StateAggregateFactory,
    StateAggregateMetadata,
};
use replica_infra::{
    CommandGateway, DefaultCommandGateway, EventSourcingStateAggregateRepository, EventStore,
    InMemoryEventStore, InMemorySnapshotRepository, SnapshotRepository, StateAggregateRepository,
    WaitStrategyRegistrar,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Ledger {
    balance: i64,
    entries: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Posted {
    amount: i64,
}

impl Event for Posted {
    fn event_name(&self) -> &'static str {
        "ledger.posted"
    }
}

impl StateRoot for Ledger {
    type Event = Posted;

    fn apply(&mut self, event: &Self::Event) {
        self.balance += event.amount;
        self.entries += 1;
    }
}

type Repo = EventSourcingStateAggregateRepository<
    ConstructorStateAggregateFactory,
    Arc<InMemorySnapshotRepository>,
    Arc<InMemoryEventStore>,
>;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

fn metadata() -> StateAggregateMetadata<Ledger> {
    StateAggregateMetadata::new(
        NamedAggregate::new("bench", "ledger"),
        |_| Ledger::default(),
    )
}

fn ledger_id(id: &str) -> AggregateId {
    AggregateId::new("bench", "ledger", id, TenantId::from("bench-tenant"))
}

fn stream(aggregate_id: &AggregateId, from: u64, len: u64) -> Vec<DomainEvent> {
    (from..from + len)
        .map(|version| {
            let meta = EventMetadata::new(CommandId::generate(), RequestId::generate())
                .with_operator("bench");
            DomainEvent::from_typed(
                aggregate_id.clone(),
                version,
                &Posted {
                    amount: version as i64,
                },
                meta,
            )
            .unwrap()
        })
        .collect()
}

/// Repository over a stream of `len` events, with a snapshot `tail` events
/// short of the head when `tail` is given.
fn setup_stream(rt: &Runtime, len: u64, tail: Option<u64>) -> (Repo, AggregateId) {
    let snapshots = Arc::new(InMemorySnapshotRepository::new());
    let events = Arc::new(InMemoryEventStore::new());
    let id = ledger_id("L1");
    let all = stream(&id, 1, len);

    rt.block_on(async {
        events
            .append(all.clone(), ExpectedVersion::Exact(0))
            .await
            .unwrap();

        if let Some(tail) = tail {
            let mut aggregate: StateAggregate<Ledger> =
                ConstructorStateAggregateFactory.create(&metadata(), &id);
            for event in &all[..(len - tail) as usize] {
                aggregate.on_sourcing(event).unwrap();
            }
            snapshots.save(&Snapshot::new(aggregate)).await.unwrap();
        }
    });

    let repo = EventSourcingStateAggregateRepository::new(
        ConstructorStateAggregateFactory,
        snapshots,
        events,
    );
    (repo, id)
}

fn bench_replay_vs_snapshot(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("aggregate_load");

    for len in [10u64, 100, 1_000] {
        group.throughput(Throughput::Elements(len));

        let (full, id) = setup_stream(&rt, len, None);
        group.bench_with_input(BenchmarkId::new("full_replay", len), &len, |b, _| {
            b.iter(|| {
                let aggregate = rt
                    .block_on(full.load_latest(&id, &metadata()))
                    .unwrap();
                black_box(aggregate.version())
            });
        });

        let (snapshotted, id) = setup_stream(&rt, len, Some(5u64.min(len)));
        group.bench_with_input(BenchmarkId::new("snapshot_plus_tail", len), &len, |b, _| {
            b.iter(|| {
                let aggregate = rt
                    .block_on(snapshotted.load_latest(&id, &metadata()))
                    .unwrap();
                black_box(aggregate.version())
            });
        });

        group.bench_with_input(BenchmarkId::new("historical_half", len), &len, |b, _| {
            b.iter(|| {
                let aggregate = rt
                    .block_on(snapshotted.load(&id, &metadata(), TailVersion::Exact(len / 2)))
                    .unwrap();
                black_box(aggregate.version())
            });
        });
    }

    group.finish();
}

fn bench_event_append_throughput(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("event_append_throughput");

    for batch_size in [1u64, 10, 100] {
        group.throughput(Throughput::Elements(batch_size));
        group.bench_with_input(
            BenchmarkId::new("batch_append", batch_size),
            &batch_size,
            |b, &size| {
                let store = InMemoryEventStore::new();
                let id = ledger_id("append");
                let mut next = 1u64;

                b.iter(|| {
                    let batch = stream(&id, next, size);
                    next += size;
                    black_box(
                        rt.block_on(store.append(batch, ExpectedVersion::Any))
                            .unwrap(),
                    )
                });
            },
        );
    }

    group.finish();
}

fn bench_gateway_dispatch(c: &mut Criterion) {
    let rt = runtime();
    let bus = Arc::new(InMemoryCommandBus::new());
    let gateway =
        DefaultCommandGateway::new(Arc::clone(&bus), Arc::new(WaitStrategyRegistrar::new()));
    let mut inbox = bus.receive();

    c.bench_function("gateway_send_and_wait_for_sent", |b| {
        b.iter(|| {
            let command =
                CommandMessage::new(ledger_id("L1"), "ledger.post", serde_json::Value::Null);
            let result = rt.block_on(gateway.send_and_wait_for_sent(command));
            while inbox.try_recv().is_ok() {}
            black_box(result.succeeded)
        });
    });
}

criterion_group!(
    benches,
    bench_replay_vs_snapshot,
    bench_event_append_throughput,
    bench_gateway_dispatch
);
criterion_main!(benches);
