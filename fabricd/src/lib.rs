// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Last-value fabric server

use anyhow::{Context, Error};
use futures::{SinkExt, StreamExt};
use log::{debug, info, trace, warn};
use questlink::com::protocol::{self, fabric_pdu::Kind, FabricPdu};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::codec::{FramedRead, FramedWrite};

mod codec;
mod store;

pub use codec::FabricCodec;
pub use questlink::configuration::DEFAULT_FABRIC_ADDRESS;
pub use store::{Store, Update};

/// Number of updates buffered per connection before it lags
const UPDATE_CHANNEL_SIZE: usize = 1024;

/// Fabric server bound to a TCP address
pub struct Server {
    listener: TcpListener,
    store: Arc<Store>,
}

impl Server {
    /// Bind the listener
    pub async fn bind(address: SocketAddr) -> Result<Self, Error> {
        info!("Binding to {address}");
        let listener = TcpListener::bind(address)
            .await
            .with_context(|| format!("failed to bind to {address}"))?;
        Ok(Self {
            listener,
            store: Arc::new(Store::new(UPDATE_CHANNEL_SIZE)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        self.listener
            .local_addr()
            .context("failed to get local address")
    }

    pub fn store(&self) -> Arc<Store> {
        self.store.clone()
    }

    /// Accept connections and serve each on its own task
    pub async fn run(self) -> Result<(), Error> {
        info!("Listening on {}", self.local_addr()?);
        loop {
            let (stream, peer) = self
                .listener
                .accept()
                .await
                .context("failed to accept connection")?;
            info!("Accepted connection from {peer}");

            // Spawn a new task to handle the connection
            let store = self.store.clone();
            tokio::spawn(async move {
                match connection(stream, peer, store).await {
                    Ok(()) => info!("Connection from {peer} closed"),
                    Err(e) => info!("Connection from {peer} failed: {e:#}"),
                }
            });
        }
    }
}

/// Bind to `address` and serve until an error occurs
pub async fn run(address: SocketAddr) -> Result<(), Error> {
    Server::bind(address).await?.run().await
}

/// Handle a connection.
async fn connection(stream: TcpStream, peer: SocketAddr, store: Arc<Store>) -> Result<(), Error> {
    stream.set_nodelay(true).context("failed to set TCP_NODELAY")?;
    let (reader, writer) = stream.into_split();
    let mut input = FramedRead::new(reader, FabricCodec::default());
    let mut output = FramedWrite::new(writer, FabricCodec::default());
    let mut updates = store.updates();
    let mut subscriptions: HashSet<String> = HashSet::new();

    loop {
        tokio::select! {
            pdu = input.next() => {
                let pdu = match pdu {
                    Some(Ok(pdu)) => pdu,
                    Some(Err(e)) => {
                        info!("Failed to read from {peer}: {e}. Closing connection");
                        return Ok(());
                    }
                    None => return Ok(()),
                };
                match pdu.kind {
                    Some(Kind::Publish(publish)) => {
                        // Subscribers would fail to receive what does not fit in an update
                        match protocol::check_publish_size(&publish.topic, &publish.payload) {
                            Ok(()) => {
                                store.publish(&publish.topic, publish.payload);
                            }
                            Err(e) => warn!("Dropping publish on {} from {peer}: {e}", publish.topic),
                        }
                    }
                    Some(Kind::Subscribe(subscribe)) => {
                        debug!("{peer} subscribed to {}", subscribe.topic);
                        if let Some(cell) = store.get(&subscribe.topic) {
                            output
                                .send(FabricPdu::update(&subscribe.topic, cell.payload, cell.server_time))
                                .await
                                .context("failed to send update")?;
                        }
                        subscriptions.insert(subscribe.topic);
                    }
                    Some(Kind::TimeRequest(request)) => {
                        let reply = FabricPdu::time_reply(request.client_time_us, store.now());
                        output.send(reply).await.context("failed to send time reply")?;
                    }
                    Some(other) => warn!("Ignoring unexpected pdu from {peer}: {other:?}"),
                    None => warn!("Ignoring empty pdu from {peer}"),
                }
            }
            update = updates.recv() => match update {
                Ok(update) => {
                    if subscriptions.contains(&*update.topic) {
                        trace!("Forwarding update on {} to {peer}", update.topic);
                        output
                            .send(FabricPdu::update(&update.topic, update.cell.payload, update.cell.server_time))
                            .await
                            .context("failed to send update")?;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    // Only the latest value of each topic matters, so catch up with a snapshot
                    warn!("{peer} lagged behind by {skipped} updates");
                    for topic in &subscriptions {
                        if let Some(cell) = store.get(topic) {
                            output
                                .send(FabricPdu::update(topic, cell.payload, cell.server_time))
                                .await
                                .context("failed to send update")?;
                        }
                    }
                }
                Err(RecvError::Closed) => return Ok(()),
            }
        }
    }
}
