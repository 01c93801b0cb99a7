// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request dispatch against the registry.
//!
//! The [`DiscoveryService`] is the only owner of the [`Registry`]. Connection
//! tasks hand it requests over a channel and it answers them strictly one at a
//! time, which makes every register-then-recompute-readiness step atomic with
//! respect to other requests.

use super::registry::{ReadinessThreshold, Registration, RegistrationError, Registry};
use crate::config::ServerConfig;
use courier::{
    BrokerInfo, DiscoveryRequest, DiscoveryResponse, DisseminationMode, MessageKind,
    RegisterRequest, RegistrantInfo, Role, Status, StopHandle,
};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Id reported for the broker entry in topic lookups.
pub const BROKER_ENTRY_ID: &str = "broker";

/// A request together with the channel its response goes back on.
pub struct ServiceRequest {
    pub request: DiscoveryRequest,
    pub reply: oneshot::Sender<DiscoveryResponse>,
}

/// Request counters, shared with the server handle.
#[derive(Debug, Default)]
pub struct ServiceStats {
    pub requests: AtomicU64,
    pub registrations: AtomicU64,
    pub lookups: AtomicU64,
    pub failures: AtomicU64,
    pub unknown: AtomicU64,
}

impl ServiceStats {
    fn record(&self, kind: MessageKind, response: &DiscoveryResponse) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        match kind {
            MessageKind::Register => {
                self.registrations.fetch_add(1, Ordering::Relaxed);
            }
            MessageKind::LookupPubByTopic
            | MessageKind::LookupAllPubs
            | MessageKind::LookupBroker => {
                self.lookups.fetch_add(1, Ordering::Relaxed);
            }
            MessageKind::Unknown => {
                self.unknown.fetch_add(1, Ordering::Relaxed);
            }
            MessageKind::IsReady => {}
        }
        // A "not ready" answer is not a failure.
        if kind != MessageKind::IsReady && !response.status().is_success() {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get a point-in-time snapshot.
    pub fn snapshot(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            registrations: self.registrations.load(Ordering::Relaxed),
            lookups: self.lookups.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            unknown: self.unknown.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of [`ServiceStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStatsSnapshot {
    pub requests: u64,
    pub registrations: u64,
    pub lookups: u64,
    pub failures: u64,
    pub unknown: u64,
}

/// Discovery request handler.
pub struct DiscoveryService {
    registry: Registry,
    mode: DisseminationMode,
    stats: Arc<ServiceStats>,
    /// Make the next dispatch panic.
    #[cfg(test)]
    fault_next: bool,
}

impl DiscoveryService {
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_stats(config, Arc::new(ServiceStats::default()))
    }

    pub fn with_stats(config: &ServerConfig, stats: Arc<ServiceStats>) -> Self {
        let threshold = ReadinessThreshold {
            publishers: config.pub_count,
            subscribers: config.sub_count,
        };
        Self {
            registry: Registry::new(threshold, config.max_registrations),
            mode: config.dissemination,
            stats,
            #[cfg(test)]
            fault_next: false,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn stats(&self) -> &Arc<ServiceStats> {
        &self.stats
    }

    /// Answer one request. Never fails: faults become FAILURE responses.
    pub fn handle(&mut self, request: DiscoveryRequest) -> DiscoveryResponse {
        let kind = request.kind();
        let response = match catch_unwind(AssertUnwindSafe(|| self.dispatch(request))) {
            Ok(response) => response,
            Err(panic) => {
                let reason = RegistrationError::Internal(panic_message(panic.as_ref()));
                error!("Internal error while handling {}: {}", kind, reason);
                DiscoveryResponse::failure(kind, reason.to_string())
            }
        };
        self.stats.record(kind, &response);
        response
    }

    fn dispatch(&mut self, request: DiscoveryRequest) -> DiscoveryResponse {
        #[cfg(test)]
        if std::mem::take(&mut self.fault_next) {
            panic!("injected fault");
        }

        match request {
            DiscoveryRequest::Register(req) => self.handle_register(req),
            DiscoveryRequest::IsReady => self.handle_is_ready(),
            DiscoveryRequest::LookupPubByTopic { topics } => self.handle_lookup(&topics),
            DiscoveryRequest::LookupAllPubs => self.handle_lookup_all_publishers(),
            DiscoveryRequest::LookupBroker => self.handle_broker_lookup(),
            DiscoveryRequest::Unknown => {
                error!("Unknown request type");
                DiscoveryResponse::unknown()
            }
        }
    }

    /// Register a publisher, subscriber or broker.
    pub fn handle_register(&mut self, req: RegisterRequest) -> DiscoveryResponse {
        debug!("Register request: {:?}", req);
        match self.register(req) {
            Ok(_) => DiscoveryResponse::Register {
                status: Status::Success,
                reason: "Registration successful".into(),
            },
            Err(e) => {
                warn!("Registration rejected: {:?}", e);
                DiscoveryResponse::failure(MessageKind::Register, e.to_string())
            }
        }
    }

    fn register(&mut self, req: RegisterRequest) -> Result<Registration, RegistrationError> {
        let wire_role = req.role.0.clone();
        let role =
            Role::try_from(req.role).map_err(|_| RegistrationError::InvalidRole(wire_role))?;
        let info = req.info;

        let outcome = match role {
            Role::Publisher => {
                let outcome =
                    self.registry
                        .register_publisher(&info.id, &info.addr, info.port, &req.topics)?;
                info!(
                    "Registered publisher: {} at {} with topics: {:?}",
                    info.id,
                    info.endpoint(),
                    req.topics
                );
                outcome
            }
            Role::Subscriber => {
                let outcome = self.registry.register_subscriber(&info.id, &req.topics)?;
                info!(
                    "Registered subscriber: {} with topics: {:?}",
                    info.id, req.topics
                );
                outcome
            }
            Role::Broker => {
                let outcome = self.registry.register_broker(&info.addr, info.port);
                info!("Registered broker at {}", info.endpoint());
                outcome
            }
        };

        if outcome == Registration::Replaced {
            debug!("{} {} re-registered, previous record replaced", role, info.id);
        }
        Ok(outcome)
    }

    pub fn handle_is_ready(&self) -> DiscoveryResponse {
        DiscoveryResponse::IsReady {
            ready: self.registry.is_ready(),
        }
    }

    /// Topic lookup.
    ///
    /// In broker mode the broker is the single source for every topic, so the
    /// requested topics are not used to filter.
    pub fn handle_lookup(&self, topics: &[String]) -> DiscoveryResponse {
        debug!("Lookup request, topics requested: {:?}", topics);
        let matched: Vec<RegistrantInfo> = match self.mode {
            DisseminationMode::Broker => match self.registry.broker() {
                Some(broker) => {
                    info!("Returning broker address {}:{}", broker.addr, broker.port);
                    vec![RegistrantInfo::new(
                        BROKER_ENTRY_ID,
                        broker.addr.clone(),
                        broker.port,
                    )]
                }
                None => {
                    error!("No broker registered");
                    Vec::new()
                }
            },
            DisseminationMode::Direct => self
                .registry
                .publishers_for_topics(topics)
                .into_iter()
                .map(|p| RegistrantInfo::new(p.id.clone(), p.addr.clone(), p.port))
                .collect(),
        };

        if matched.is_empty() {
            return DiscoveryResponse::failure(MessageKind::LookupPubByTopic, "");
        }
        DiscoveryResponse::LookupPubByTopic {
            status: Status::Success,
            matched,
        }
    }

    /// Every registered publisher; an empty list is still a successful answer.
    pub fn handle_lookup_all_publishers(&self) -> DiscoveryResponse {
        let matched: Vec<RegistrantInfo> = self
            .registry
            .publishers()
            .into_iter()
            .map(|p| RegistrantInfo::new(p.id.clone(), p.addr.clone(), p.port))
            .collect();
        debug!("Returning {} publishers", matched.len());
        DiscoveryResponse::LookupAllPubs {
            status: Status::Success,
            matched,
        }
    }

    pub fn handle_broker_lookup(&self) -> DiscoveryResponse {
        match self.registry.broker() {
            Some(broker) => {
                info!("Broker info provided: {}:{}", broker.addr, broker.port);
                DiscoveryResponse::LookupBroker {
                    status: Status::Success,
                    broker: Some(BrokerInfo {
                        addr: broker.addr.clone(),
                        port: broker.port,
                    }),
                }
            }
            None => {
                error!("No broker registered for lookup");
                DiscoveryResponse::failure(MessageKind::LookupBroker, "")
            }
        }
    }

    /// Serve requests until the channel closes or `stop` fires.
    ///
    /// Returns the service so callers can inspect the final registry.
    pub async fn run(
        mut self,
        mut requests: mpsc::Receiver<ServiceRequest>,
        stop: StopHandle,
    ) -> Self {
        info!("Discovery service running");
        loop {
            tokio::select! {
                next = requests.recv() => match next {
                    Some(ServiceRequest { request, reply }) => {
                        let response = self.handle(request);
                        if reply.send(response).is_err() {
                            debug!("Requester went away before the response was sent");
                        }
                    }
                    None => break,
                },
                _ = stop.stopped() => break,
            }
        }
        debug!("Discovery service stopped");
        self
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(pub_count: usize, sub_count: usize) -> DiscoveryService {
        DiscoveryService::new(&ServerConfig {
            pub_count,
            sub_count,
            ..Default::default()
        })
    }

    fn register(role: &str, id: &str, addr: &str, port: u16, topics: &[&str]) -> DiscoveryRequest {
        DiscoveryRequest::Register(RegisterRequest {
            role: courier::RoleWire(role.into()),
            info: RegistrantInfo::new(id, addr, port),
            topics: topics.iter().map(|s| s.to_string()).collect(),
        })
    }

    fn is_ready(service: &mut DiscoveryService) -> bool {
        match service.handle(DiscoveryRequest::IsReady) {
            DiscoveryResponse::IsReady { ready } => ready,
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_end_to_end_readiness_scenario() {
        let mut svc = service(1, 1);

        let resp = svc.handle(register("PUBLISHER", "pub1", "10.0.0.2", 5577, &["weather"]));
        assert_eq!(resp.status(), Status::Success);
        assert!(!is_ready(&mut svc));

        let resp = svc.handle(register("BROKER", "broker1", "10.0.0.5", 6000, &[]));
        assert_eq!(resp.status(), Status::Success);
        assert!(!is_ready(&mut svc));

        let resp = svc.handle(register("SUBSCRIBER", "sub1", "10.0.0.3", 0, &["weather"]));
        assert_eq!(resp.status(), Status::Success);
        assert!(is_ready(&mut svc));

        assert_eq!(
            svc.handle(DiscoveryRequest::LookupBroker),
            DiscoveryResponse::LookupBroker {
                status: Status::Success,
                broker: Some(BrokerInfo {
                    addr: "10.0.0.5".into(),
                    port: 6000
                }),
            }
        );
    }

    #[test]
    fn test_register_success_reason() {
        let mut svc = service(1, 1);
        assert_eq!(
            svc.handle(register("PUBLISHER", "pub1", "h", 1, &["weather"])),
            DiscoveryResponse::Register {
                status: Status::Success,
                reason: "Registration successful".into()
            }
        );
    }

    #[test]
    fn test_empty_id_registers() {
        let mut svc = service(1, 1);
        let resp = svc.handle(register("PUBLISHER", "", "h", 1, &["weather"]));
        assert_eq!(resp.status(), Status::Success);
        assert_eq!(svc.registry().publisher_count(), 1);
    }

    #[test]
    fn test_invalid_role_rejected() {
        let mut svc = service(1, 1);

        let resp = svc.handle(register("OBSERVER", "x", "h", 1, &["weather"]));
        assert_eq!(
            resp,
            DiscoveryResponse::Register {
                status: Status::Failure,
                reason: "Invalid role".into()
            }
        );
        assert_eq!(svc.registry().publisher_count(), 0);
        assert_eq!(svc.registry().subscriber_count(), 0);
        assert!(svc.registry().broker().is_none());
        assert_eq!(svc.stats().snapshot().failures, 1);
    }

    #[test]
    fn test_idempotent_registration() {
        let mut svc = service(1, 1);
        svc.handle(register("SUBSCRIBER", "sub1", "h", 0, &["weather"]));
        svc.handle(register("SUBSCRIBER", "sub1", "h", 0, &["light", "sound"]));

        assert_eq!(svc.registry().subscriber_count(), 1);
        let topics: Vec<_> = svc
            .registry()
            .subscriber("sub1")
            .unwrap()
            .topics
            .iter()
            .cloned()
            .collect();
        assert_eq!(topics, vec!["light".to_string(), "sound".to_string()]);
    }

    #[test]
    fn test_readiness_monotone() {
        let mut svc = service(2, 1);
        let steps = [
            register("PUBLISHER", "pub1", "h", 1, &["weather"]),
            register("BROKER", "b", "h", 9, &[]),
            register("SUBSCRIBER", "sub1", "h", 0, &["weather"]),
            register("PUBLISHER", "pub1", "h", 1, &["light"]),
            register("PUBLISHER", "pub2", "h", 2, &["light"]),
            register("OBSERVER", "pub3", "h", 3, &[]),
            register("PUBLISHER", "pub1", "h", 1, &[]),
            register("BROKER", "b", "h2", 10, &[]),
        ];

        let mut seen_ready = false;
        for (i, step) in steps.into_iter().enumerate() {
            svc.handle(step);
            let ready = is_ready(&mut svc);
            if seen_ready {
                assert!(ready, "readiness regressed at step {}", i);
            }
            // pub2 at step 4 completes the threshold.
            assert_eq!(ready, i >= 4, "unexpected readiness at step {}", i);
            seen_ready |= ready;
        }
    }

    #[test]
    fn test_lookups_fail_without_broker() {
        let mut svc = service(1, 1);
        svc.handle(register("PUBLISHER", "pub1", "h", 1, &["weather"]));

        let resp = svc.handle(DiscoveryRequest::LookupPubByTopic {
            topics: vec!["weather".into()],
        });
        assert_eq!(resp.kind(), MessageKind::LookupPubByTopic);
        assert_eq!(resp.status(), Status::Failure);

        let resp = svc.handle(DiscoveryRequest::LookupBroker);
        assert_eq!(resp.kind(), MessageKind::LookupBroker);
        assert_eq!(resp.status(), Status::Failure);
    }

    #[test]
    fn test_broker_mode_lookup_ignores_topics() {
        let mut svc = service(1, 1);
        svc.handle(register("BROKER", "b", "10.0.0.5", 6000, &[]));

        let resp = svc.handle(DiscoveryRequest::LookupPubByTopic {
            topics: vec!["not-a-topic".into()],
        });
        assert_eq!(
            resp,
            DiscoveryResponse::LookupPubByTopic {
                status: Status::Success,
                matched: vec![RegistrantInfo::new(BROKER_ENTRY_ID, "10.0.0.5", 6000)],
            }
        );
    }

    #[test]
    fn test_direct_mode_lookup_filters_publishers() {
        let mut svc = DiscoveryService::new(&ServerConfig {
            dissemination: DisseminationMode::Direct,
            ..Default::default()
        });
        svc.handle(register("PUBLISHER", "pub1", "h1", 1, &["weather", "light"]));
        svc.handle(register("PUBLISHER", "pub2", "h2", 2, &["sound"]));
        svc.handle(register("BROKER", "b", "hb", 9, &[]));

        match svc.handle(DiscoveryRequest::LookupPubByTopic {
            topics: vec!["light".into()],
        }) {
            DiscoveryResponse::LookupPubByTopic { status, matched } => {
                assert_eq!(status, Status::Success);
                assert_eq!(matched, vec![RegistrantInfo::new("pub1", "h1", 1)]);
            }
            other => panic!("unexpected response: {:?}", other),
        }

        let resp = svc.handle(DiscoveryRequest::LookupPubByTopic {
            topics: vec!["altitude".into()],
        });
        assert_eq!(resp.status(), Status::Failure);
    }

    #[test]
    fn test_lookup_all_publishers() {
        let mut svc = service(1, 1);
        match svc.handle(DiscoveryRequest::LookupAllPubs) {
            DiscoveryResponse::LookupAllPubs { status, matched } => {
                assert_eq!(status, Status::Success);
                assert!(matched.is_empty());
            }
            other => panic!("unexpected response: {:?}", other),
        }

        svc.handle(register("PUBLISHER", "pub2", "h2", 2, &["sound"]));
        svc.handle(register("PUBLISHER", "pub1", "h1", 1, &["weather"]));
        match svc.handle(DiscoveryRequest::LookupAllPubs) {
            DiscoveryResponse::LookupAllPubs { matched, .. } => {
                let ids: Vec<_> = matched.into_iter().map(|p| p.id).collect();
                assert_eq!(ids, vec!["pub1", "pub2"]);
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_request_then_service_continues() {
        let mut svc = service(0, 0);

        assert_eq!(svc.handle(DiscoveryRequest::Unknown), DiscoveryResponse::unknown());

        let resp = svc.handle(register("BROKER", "b", "h", 1, &[]));
        assert_eq!(resp.status(), Status::Success);
        assert!(is_ready(&mut svc));

        let stats = svc.stats().snapshot();
        assert_eq!(stats.unknown, 1);
        assert_eq!(stats.registrations, 1);
        assert_eq!(stats.requests, 3);
    }

    #[test]
    fn test_registry_full_reported() {
        let mut svc = DiscoveryService::new(&ServerConfig {
            max_registrations: 1,
            ..Default::default()
        });
        svc.handle(register("SUBSCRIBER", "sub1", "h", 0, &[]));
        let resp = svc.handle(register("SUBSCRIBER", "sub2", "h", 0, &[]));
        assert_eq!(
            resp,
            DiscoveryResponse::Register {
                status: Status::Failure,
                reason: "Registry full".into()
            }
        );
        assert_eq!(svc.registry().subscriber_count(), 1);
    }

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }

    #[test]
    fn test_dispatch_fault_becomes_failure_and_service_continues() {
        let mut svc = service(0, 0);

        svc.fault_next = true;
        let resp = svc.handle(register("BROKER", "b", "10.0.0.5", 6000, &[]));
        assert_eq!(resp.kind(), MessageKind::Register);
        assert_eq!(
            resp,
            DiscoveryResponse::Register {
                status: Status::Failure,
                reason: "Internal error: injected fault".into(),
            }
        );
        assert!(svc.registry().broker().is_none());

        svc.fault_next = true;
        let resp = svc.handle(DiscoveryRequest::LookupBroker);
        assert_eq!(resp.kind(), MessageKind::LookupBroker);
        assert_eq!(resp.status(), Status::Failure);
        assert_eq!(svc.stats().snapshot().failures, 2);

        // The next request is served normally.
        let resp = svc.handle(register("BROKER", "b", "10.0.0.5", 6000, &[]));
        assert_eq!(resp.status(), Status::Success);
        assert!(is_ready(&mut svc));
    }

    #[tokio::test]
    async fn test_run_answers_over_channel() {
        let svc = service(0, 0);
        let (tx, rx) = mpsc::channel(8);
        let stop = StopHandle::new();
        let task = tokio::spawn(svc.run(rx, stop.clone()));

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(ServiceRequest {
            request: register("BROKER", "b", "h", 1, &[]),
            reply: reply_tx,
        })
        .await
        .unwrap();
        assert_eq!(reply_rx.await.unwrap().status(), Status::Success);

        stop.stop();
        let svc = task.await.unwrap();
        assert!(svc.registry().is_ready());
    }
}
