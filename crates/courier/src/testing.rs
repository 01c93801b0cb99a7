// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scripted discovery service for tests.

use crate::connection::{Connection, DEFAULT_MAX_FRAME_SIZE};
use crate::protocol::{DiscoveryRequest, DiscoveryResponse, MessageKind};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A discovery endpoint that answers every request with a caller-supplied closure.
///
/// Serves a single client connection and records the kinds it received.
pub struct FakeDiscovery {
    addr: SocketAddr,
    task: JoinHandle<Vec<MessageKind>>,
}

impl FakeDiscovery {
    pub async fn start<F>(mut respond: F) -> Self
    where
        F: FnMut(&DiscoveryRequest) -> DiscoveryResponse + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake discovery");
        let addr = listener.local_addr().expect("fake discovery address");

        let task = tokio::spawn(async move {
            let mut seen = Vec::new();
            let (stream, _) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(_) => return seen,
            };
            let mut conn = Connection::new(stream, DEFAULT_MAX_FRAME_SIZE);
            while let Ok(Some(request)) = conn.read_frame::<DiscoveryRequest>().await {
                seen.push(request.kind());
                let response = respond(&request);
                if conn.write_frame(&response).await.is_err() {
                    break;
                }
            }
            seen
        });

        Self { addr, task }
    }

    /// `host:port` to hand to a client.
    pub fn endpoint(&self) -> String {
        self.addr.to_string()
    }

    /// Request kinds received, available once the client has disconnected.
    pub async fn finish(self) -> Vec<MessageKind> {
        self.task.await.unwrap_or_default()
    }
}
