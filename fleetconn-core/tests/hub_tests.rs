//! Integration tests for the broadcast hub
//!
//! These exercise the fan-out contract end to end: registration through
//! the dispatch loop, FIFO delivery per client, room targeting, and the
//! lossy behavior that keeps slow consumers from stalling anyone else.

use std::time::Duration;

use fleetconn_core::hub::{Hub, OUTBOUND_QUEUE_CAPACITY};
use fleetconn_core::models::{MetricSnapshot, ServerStatus};

/// Polls the hub until its client count reaches the expected value
async fn wait_for_clients(hub: &Hub, expected: usize) {
    for _ in 0..200 {
        if hub.client_count().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("hub never reached {expected} clients");
}

fn snapshot_for(server_id: u32) -> MetricSnapshot {
    MetricSnapshot {
        server_id,
        server_name: format!("host-{server_id}"),
        cpu_usage: 1.0,
        ..MetricSnapshot::default()
    }
}

#[tokio::test]
async fn broadcast_reaches_registered_client() {
    let (hub, dispatcher) = Hub::new();
    tokio::spawn(dispatcher.run());

    let mut rx = hub.register("client-1").await;
    wait_for_clients(&hub, 1).await;

    hub.broadcast_status(4, ServerStatus::Online).await;

    let frame = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out")
        .expect("queue closed");
    let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(value["type"], "server_status");
    assert_eq!(value["payload"]["server_id"], 4);
    assert_eq!(value["payload"]["status"], "online");
}

#[tokio::test]
async fn frames_are_delivered_in_order() {
    let (hub, dispatcher) = Hub::new();
    tokio::spawn(dispatcher.run());

    let mut rx = hub.register("client-1").await;
    wait_for_clients(&hub, 1).await;

    for id in 1..=20u32 {
        hub.broadcast_status(id, ServerStatus::Online).await;
    }

    for expected in 1..=20u32 {
        let frame = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out")
            .expect("queue closed");
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["payload"]["server_id"], expected);
    }
}

#[tokio::test]
async fn slow_consumer_drops_frames_without_stalling_others() {
    let (hub, dispatcher) = Hub::new();
    tokio::spawn(dispatcher.run());

    let mut fast_rx = hub.register("fast").await;
    let mut slow_rx = hub.register("slow").await;
    wait_for_clients(&hub, 2).await;

    let total = OUTBOUND_QUEUE_CAPACITY + 50;
    let producer = {
        let hub = hub.clone();
        tokio::spawn(async move {
            for id in 0..total {
                hub.broadcast_status(id as u32, ServerStatus::Online).await;
            }
        })
    };

    // The fast client drains concurrently and must see every frame even
    // while the slow one saturates.
    let mut fast_received = 0usize;
    while fast_received < total {
        let frame = tokio::time::timeout(Duration::from_secs(2), fast_rx.recv())
            .await
            .expect("fast client stalled")
            .expect("queue closed");
        assert!(frame.contains("server_status"));
        fast_received += 1;
    }
    producer.await.unwrap();

    // The slow client kept at most one queue's worth; the rest were
    // dropped silently.
    let mut slow_received = 0usize;
    while slow_rx.try_recv().is_ok() {
        slow_received += 1;
    }
    assert_eq!(slow_received, OUTBOUND_QUEUE_CAPACITY);
}

#[tokio::test]
async fn subscribed_client_receives_room_copy() {
    let (hub, dispatcher) = Hub::new();
    tokio::spawn(dispatcher.run());

    let mut plain_rx = hub.register("plain").await;
    let mut member_rx = hub.register("member").await;
    wait_for_clients(&hub, 2).await;

    hub.subscribe("member", 9).await;
    hub.broadcast_metrics(&snapshot_for(9)).await;

    // Every client gets the broadcast copy; the room member also gets
    // the targeted one.
    let first = tokio::time::timeout(Duration::from_secs(1), member_rx.recv())
        .await
        .unwrap()
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(1), member_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, second);

    let only = tokio::time::timeout(Duration::from_secs(1), plain_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(only.contains("server_metrics"));
    assert!(plain_rx.try_recv().is_err());
}

#[tokio::test]
async fn unsubscribe_stops_room_copies() {
    let (hub, dispatcher) = Hub::new();
    tokio::spawn(dispatcher.run());

    let mut rx = hub.register("member").await;
    wait_for_clients(&hub, 1).await;

    hub.subscribe("member", 3).await;
    hub.unsubscribe("member", 3).await;
    hub.broadcast_metrics(&snapshot_for(3)).await;

    // Broadcast copy only.
    let _ = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn unregister_closes_the_outbound_queue() {
    let (hub, dispatcher) = Hub::new();
    tokio::spawn(dispatcher.run());

    let mut rx = hub.register("client-1").await;
    wait_for_clients(&hub, 1).await;

    hub.unregister("client-1").await;
    wait_for_clients(&hub, 0).await;

    let closed = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out");
    assert!(closed.is_none());
}

#[tokio::test]
async fn shutdown_closes_every_client() {
    let (hub, dispatcher) = Hub::new();
    tokio::spawn(dispatcher.run());

    let mut receivers = Vec::new();
    for i in 0..3 {
        receivers.push(hub.register(format!("client-{i}")).await);
    }
    wait_for_clients(&hub, 3).await;

    hub.shutdown().await;
    wait_for_clients(&hub, 0).await;

    for mut rx in receivers {
        let closed = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out");
        assert!(closed.is_none());
    }
}
