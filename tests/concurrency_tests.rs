//! Concurrency properties of the single-writer room actor: commands
//! submitted concurrently from multiple callers still land with a dense,
//! consecutive sequence, and every subscriber observes the same total
//! order.

mod test_helpers;

use std::sync::Arc;

use grimoire_core::model::{CommandResult, ProjectedEvent, Viewer};
use test_helpers::{command, create_game, TestRoom};
use tokio::sync::{mpsc, Barrier};
use uuid::Uuid;

#[tokio::test]
async fn concurrent_submissions_from_distinct_clients_interleave_onto_one_dense_sequence() {
    let room = Arc::new(TestRoom::spawn());
    let user = Uuid::new_v4();
    room.handle.dispatch(create_game(room.room_id, user, &[])).await.unwrap();

    const SENDERS: usize = 10;
    let barrier = Arc::new(Barrier::new(SENDERS));

    let mut tasks = Vec::with_capacity(SENDERS);
    for i in 0..SENDERS {
        let handle = room.handle.clone();
        let room_id = room.room_id;
        let barrier = Arc::clone(&barrier);
        tasks.push(tokio::spawn(async move {
            barrier.wait().await;
            let cmd = command(room_id, user, "send_chat", &format!("concurrent-{i}"), serde_json::json!({"text": i}));
            handle.dispatch(cmd).await.unwrap()
        }));
    }

    let mut ranges = Vec::with_capacity(SENDERS);
    for task in tasks {
        let result = task.await.unwrap();
        let CommandResult::Accepted { applied_seq_from, applied_seq_to, .. } = result else {
            panic!("expected every concurrent send_chat to be accepted, got {result:?}");
        };
        ranges.push(applied_seq_from);
        assert_eq!(applied_seq_from, applied_seq_to);
    }

    ranges.sort_unstable();
    let expected: Vec<u64> = (2..=(SENDERS as u64 + 1)).collect();
    assert_eq!(ranges, expected, "single-writer discipline must produce a dense, collision-free sequence");
}

#[tokio::test]
async fn two_subscribers_observe_concurrently_submitted_events_in_the_same_order() {
    let room = Arc::new(TestRoom::spawn());
    let user = Uuid::new_v4();
    room.handle.dispatch(create_game(room.room_id, user, &[])).await.unwrap();

    let (sink_a, mut rx_a) = mpsc::channel::<ProjectedEvent>(64);
    let (sink_b, mut rx_b) = mpsc::channel::<ProjectedEvent>(64);
    room.handle.subscribe(Viewer::player(user), 0, sink_a).await.unwrap();
    room.handle.subscribe(Viewer::player(user), 0, sink_b).await.unwrap();

    const SENDERS: usize = 8;
    let barrier = Arc::new(Barrier::new(SENDERS));
    let mut tasks = Vec::with_capacity(SENDERS);
    for i in 0..SENDERS {
        let handle = room.handle.clone();
        let room_id = room.room_id;
        let barrier = Arc::clone(&barrier);
        tasks.push(tokio::spawn(async move {
            barrier.wait().await;
            let cmd = command(room_id, user, "send_chat", &format!("order-{i}"), serde_json::json!({"text": i}));
            handle.dispatch(cmd).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let mut seqs_a = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(std::time::Duration::from_secs(1), rx_a.recv()).await {
        seqs_a.push(event.seq);
        if seqs_a.len() == SENDERS + 1 {
            break;
        }
    }
    let mut seqs_b = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(std::time::Duration::from_secs(1), rx_b.recv()).await {
        seqs_b.push(event.seq);
        if seqs_b.len() == SENDERS + 1 {
            break;
        }
    }

    assert_eq!(seqs_a, seqs_b, "both subscribers must see the same event order");
    let mut sorted = seqs_a.clone();
    sorted.sort_unstable();
    assert_eq!(seqs_a, sorted, "the shared order must itself be sequence-ascending");
}

/// A single command can produce more than one event (`end_day` emits
/// `day.ended` then `night.started`); the broadcast fan-out must deliver
/// those to one subscriber in the same order they were appended, never
/// interleaved or reordered, however the runtime schedules the per-event
/// delivery tasks.
#[tokio::test]
async fn a_subscriber_sees_a_multi_event_commands_events_in_append_order() {
    let room = Arc::new(TestRoom::spawn());
    let user = Uuid::new_v4();
    room.handle.dispatch(create_game(room.room_id, user, &[])).await.unwrap();

    let (sink, mut rx) = mpsc::channel::<ProjectedEvent>(64);
    room.handle.subscribe(Viewer::player(user), 0, sink).await.unwrap();

    // Repeat several times: a race between the two events' delivery tasks
    // wouldn't necessarily reproduce on the first attempt.
    for round in 0..20u32 {
        let end_day = command(room.room_id, user, "end_day", &format!("end-day-{round}"), serde_json::json!({}));
        let result = room.handle.dispatch(end_day).await.unwrap();
        let CommandResult::Accepted { applied_seq_from, applied_seq_to, .. } = result else {
            panic!("expected end_day to be accepted, got {result:?}");
        };
        assert_eq!(applied_seq_to, applied_seq_from + 1, "end_day must append exactly two events");

        let first = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for day.ended")
            .expect("sink closed");
        let second = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for night.started")
            .expect("sink closed");

        assert_eq!(first.seq, applied_seq_from);
        assert_eq!(first.event_type, "day.ended");
        assert_eq!(second.seq, applied_seq_to);
        assert_eq!(second.event_type, "night.started");
    }
}
