//! Integration tests for the monitor supervisor
//!
//! No live SSH endpoint is available here, so these exercise the
//! supervisor contract around unreachable hosts: worker lifecycle flags,
//! idempotent add/remove, and bounded shutdown.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use fleetconn_core::hub::Hub;
use fleetconn_core::models::{ConnectionKind, Server, ServerStatus, ServerSys};
use fleetconn_core::monitor::MonitorPool;
use fleetconn_core::registry::HostRegistry;
use fleetconn_core::sftp::SftpPool;
use fleetconn_core::ssh::SshPool;
use fleetconn_core::vault::CredentialVault;
use sqlx::mysql::MySqlPoolOptions;

fn unreachable_server(id: u32) -> Server {
    Server {
        id,
        ip_address: "127.0.0.1".to_string(),
        password: String::new(),
        port: "4".to_string(),
        sys: ServerSys::Linux,
        connection: ConnectionKind::Ssh,
        username: "nobody".to_string(),
        name: format!("host-{id}"),
        status: ServerStatus::Offline,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        deleted_at: None,
    }
}

/// A supervisor wired to an unreachable database and unreachable hosts;
/// status writes fail fast and are logged, which is the contract.
fn test_pool(hub: Hub) -> MonitorPool {
    let registry = HostRegistry::from_pool(
        MySqlPoolOptions::new()
            .acquire_timeout(Duration::from_millis(100))
            .connect_lazy("mysql://root:@127.0.0.1:3306/fleetconn_test")
            .expect("lazy pool"),
    );
    let ssh_pool = Arc::new(SshPool::new(
        Duration::from_millis(200),
        Duration::from_secs(60),
    ));
    let sftp_pool = Arc::new(SftpPool::new(Arc::clone(&ssh_pool)));
    let vault = Arc::new(CredentialVault::new("0123456789abcdef0123456789abcdef").unwrap());

    MonitorPool::new(
        ssh_pool,
        sftp_pool,
        registry,
        vault,
        hub,
        Duration::from_millis(100),
    )
}

async fn wait_for_status(pool: &MonitorPool, server_id: u32, expected: bool) {
    for _ in 0..200 {
        if pool.status(server_id).await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("worker {server_id} never reached running={expected}");
}

#[tokio::test(flavor = "multi_thread")]
async fn worker_running_flag_follows_lifecycle() {
    let (hub, dispatcher) = Hub::new();
    tokio::spawn(dispatcher.run());
    let pool = test_pool(hub);

    let server = unreachable_server(1);
    pool.add(&server, "pw").await;
    wait_for_status(&pool, 1, true).await;

    pool.remove(1).await;
    assert!(!pool.status(1).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn add_is_idempotent() {
    let (hub, dispatcher) = Hub::new();
    tokio::spawn(dispatcher.run());
    let pool = test_pool(hub);

    let server = unreachable_server(2);
    pool.add(&server, "pw").await;
    pool.add(&server, "pw").await;
    wait_for_status(&pool, 2, true).await;

    pool.remove(2).await;
    assert!(!pool.status(2).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn remove_is_idempotent_for_unknown_hosts() {
    let (hub, dispatcher) = Hub::new();
    tokio::spawn(dispatcher.run());
    let pool = test_pool(hub);

    pool.remove(99).await;
    assert!(!pool.status(99).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_all_exits_within_grace_period() {
    let (hub, dispatcher) = Hub::new();
    tokio::spawn(dispatcher.run());
    let pool = test_pool(hub);

    for id in 10..15 {
        pool.add(&unreachable_server(id), "pw").await;
    }
    for id in 10..15 {
        wait_for_status(&pool, id, true).await;
    }

    let started = Instant::now();
    pool.stop_all().await;
    assert!(started.elapsed() < Duration::from_secs(2));

    for id in 10..15 {
        assert!(!pool.status(id).await);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn status_changes_are_broadcast() {
    let (hub, dispatcher) = Hub::new();
    tokio::spawn(dispatcher.run());

    let mut rx = hub.register("watcher").await;
    for _ in 0..200 {
        if hub.client_count().await == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let pool = test_pool(hub);
    pool.add(&unreachable_server(3), "pw").await;

    // The initial connect to an unreachable host pushes a status frame.
    let frame = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no status frame within deadline")
        .expect("queue closed");
    let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(value["type"], "server_status");
    assert_eq!(value["payload"]["server_id"], 3);
    assert_eq!(value["payload"]["status"], "error");

    pool.remove(3).await;
}
