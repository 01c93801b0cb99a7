// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test code readability
#![allow(clippy::too_many_lines)] // Scenario tests

//! Control-plane tests against a discovery server on a loopback socket.

use courier::{
    ClientError, Connection, DiscoveryClient, DiscoveryRequest, DiscoveryResponse,
    DisseminationMode, MessageKind, RegisterRequest, RegistrantInfo, Role, RoleWire, Status,
    DEFAULT_MAX_FRAME_SIZE,
};
use courier_discovery_server::{DiscoveryServer, ServerConfig, ServerHandle};
use serde_json::json;

async fn start(config: ServerConfig) -> ServerHandle {
    let server = DiscoveryServer::bind(ServerConfig {
        bind_address: "127.0.0.1".parse().unwrap(),
        port: 0,
        ..config
    })
    .await
    .unwrap();
    let handle = server.handle();
    tokio::spawn(server.run());
    handle
}

async fn client(handle: &ServerHandle) -> DiscoveryClient {
    DiscoveryClient::connect(&handle.local_addr().to_string())
        .await
        .unwrap()
}

fn topics(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_registration_scenario_reaches_ready() {
    let handle = start(ServerConfig::default()).await;
    let mut publisher = client(&handle).await;
    let mut broker = client(&handle).await;
    let mut subscriber = client(&handle).await;

    publisher
        .register(
            Role::Publisher,
            RegistrantInfo::new("pub1", "10.0.0.2", 5577),
            &topics(&["weather"]),
        )
        .await
        .unwrap();
    assert!(!publisher.is_ready().await.unwrap());

    // No broker yet.
    assert!(matches!(
        subscriber.lookup_broker().await,
        Err(ClientError::NotFound(MessageKind::LookupBroker))
    ));

    broker
        .register(Role::Broker, RegistrantInfo::new("broker", "10.0.0.5", 6000), &[])
        .await
        .unwrap();
    assert!(!broker.is_ready().await.unwrap());

    subscriber
        .register(
            Role::Subscriber,
            RegistrantInfo::new("sub1", "10.0.0.3", 0),
            &topics(&["weather"]),
        )
        .await
        .unwrap();
    assert!(subscriber.is_ready().await.unwrap());
    assert!(publisher.is_ready().await.unwrap());

    let found = subscriber.lookup_broker().await.unwrap();
    assert_eq!(found.addr, "10.0.0.5");
    assert_eq!(found.port, 6000);

    // Broker mode answers topic lookups with the broker itself.
    let sources = subscriber
        .lookup_pub_by_topic(&topics(&["weather"]))
        .await
        .unwrap();
    assert_eq!(sources, vec![RegistrantInfo::new("broker", "10.0.0.5", 6000)]);

    let all = broker.lookup_all_publishers().await.unwrap();
    assert_eq!(all, vec![RegistrantInfo::new("pub1", "10.0.0.2", 5577)]);

    let stats = handle.stats();
    assert_eq!(stats.registrations, 3);
    assert_eq!(stats.failures, 1);
    handle.shutdown();
}

#[tokio::test]
async fn test_invalid_role_is_rejected_and_ignored() {
    let handle = start(ServerConfig {
        pub_count: 0,
        sub_count: 0,
        ..Default::default()
    })
    .await;
    let mut conn = client(&handle).await;

    let request = DiscoveryRequest::Register(RegisterRequest {
        role: RoleWire("OBSERVER".into()),
        info: RegistrantInfo::new("obs1", "10.0.0.9", 1),
        topics: Vec::new(),
    });
    let response = conn.request(&request).await.unwrap();
    assert_eq!(
        response,
        DiscoveryResponse::Register {
            status: Status::Failure,
            reason: "Invalid role".into(),
        }
    );

    // Nothing was recorded: still waiting for a broker.
    assert!(!conn.is_ready().await.unwrap());
    handle.shutdown();
}

#[tokio::test]
async fn test_unknown_and_malformed_requests_keep_connection_open() {
    let handle = start(ServerConfig::default()).await;
    let mut conn = Connection::connect(&handle.local_addr().to_string(), DEFAULT_MAX_FRAME_SIZE)
        .await
        .unwrap();

    conn.write_frame(&json!({"type": "subscribe_all"}))
        .await
        .unwrap();
    let response: DiscoveryResponse = conn.read_frame().await.unwrap().unwrap();
    assert_eq!(response.kind(), MessageKind::Unknown);
    assert_eq!(response.status(), Status::Failure);

    conn.write_frame(&json!(42)).await.unwrap();
    let response: DiscoveryResponse = conn.read_frame().await.unwrap().unwrap();
    assert_eq!(response, DiscoveryResponse::unknown());

    // The same connection still serves regular requests.
    conn.write_frame(&DiscoveryRequest::IsReady).await.unwrap();
    let response: DiscoveryResponse = conn.read_frame().await.unwrap().unwrap();
    assert_eq!(response, DiscoveryResponse::IsReady { ready: false });

    handle.shutdown();
}

#[tokio::test]
async fn test_direct_mode_returns_matching_publishers() {
    let handle = start(ServerConfig {
        dissemination: DisseminationMode::Direct,
        pub_count: 2,
        ..Default::default()
    })
    .await;
    let mut conn = client(&handle).await;

    conn.register(
        Role::Publisher,
        RegistrantInfo::new("pub1", "10.0.0.2", 5577),
        &topics(&["weather", "humidity"]),
    )
    .await
    .unwrap();
    conn.register(
        Role::Publisher,
        RegistrantInfo::new("pub2", "10.0.0.4", 5577),
        &topics(&["light"]),
    )
    .await
    .unwrap();

    let matched = conn
        .lookup_pub_by_topic(&topics(&["humidity", "sound"]))
        .await
        .unwrap();
    assert_eq!(matched, vec![RegistrantInfo::new("pub1", "10.0.0.2", 5577)]);

    assert!(matches!(
        conn.lookup_pub_by_topic(&topics(&["altitude"])).await,
        Err(ClientError::NotFound(MessageKind::LookupPubByTopic))
    ));
    handle.shutdown();
}

#[tokio::test]
async fn test_full_registry_rejects_new_ids_only() {
    let handle = start(ServerConfig {
        max_registrations: 1,
        ..Default::default()
    })
    .await;
    let mut conn = client(&handle).await;

    conn.register(Role::Publisher, RegistrantInfo::new("pub1", "h", 1), &[])
        .await
        .unwrap();
    match conn
        .register(Role::Publisher, RegistrantInfo::new("pub2", "h", 2), &[])
        .await
    {
        Err(ClientError::Rejected { reason }) => assert_eq!(reason, "Registry full"),
        other => panic!("unexpected result: {:?}", other),
    }
    conn.register(Role::Publisher, RegistrantInfo::new("pub1", "h", 3), &[])
        .await
        .unwrap();
    handle.shutdown();
}
