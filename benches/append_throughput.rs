//! Throughput of `EventStore::append` against the in-memory backend: the
//! per-command hot path every dispatched command goes through (sequence
//! assignment, dedup insert, event insert).

use criterion::{criterion_group, criterion_main, Criterion};
use grimoire_core::event_store::{AppendRequest, EventStore, InMemoryEventStore};
use grimoire_core::model::{CommandResult, NewDedupRecord, NewEvent};
use std::hint::black_box;
use uuid::Uuid;

fn append_request(actor: Uuid, key: String) -> AppendRequest {
    AppendRequest {
        events: vec![NewEvent {
            event_id: Uuid::new_v4(),
            event_type: "chat.sent".to_string(),
            actor_user_id: actor,
            causation_command_id: None,
            payload: serde_json::json!({"text": "benchmark payload"}),
        }],
        dedup: NewDedupRecord {
            actor_user_id: actor,
            idempotency_key: key,
            command_type: "send_chat".to_string(),
            command_id: Uuid::new_v4(),
            result: CommandResult::Accepted {
                applied_seq_from: 0,
                applied_seq_to: 0,
                data: serde_json::Value::Null,
            },
        },
        snapshot: None,
    }
}

fn bench_append_to_one_room(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("append_sequential_same_room", |b| {
        b.iter_batched(
            || (InMemoryEventStore::new(), Uuid::new_v4(), Uuid::new_v4()),
            |(store, room_id, actor)| {
                rt.block_on(async {
                    for i in 0..256u32 {
                        let request = append_request(actor, format!("bench-{i}"));
                        black_box(store.append(room_id, request).await.unwrap());
                    }
                });
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_append_across_many_rooms(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("append_across_distinct_rooms", |b| {
        b.iter_batched(
            || InMemoryEventStore::new(),
            |store| {
                rt.block_on(async {
                    for _ in 0..256u32 {
                        let room_id = Uuid::new_v4();
                        let actor = Uuid::new_v4();
                        let request = append_request(actor, "k".to_string());
                        black_box(store.append(room_id, request).await.unwrap());
                    }
                });
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(append_throughput, bench_append_to_one_room, bench_append_across_many_rooms);
criterion_main!(append_throughput);
