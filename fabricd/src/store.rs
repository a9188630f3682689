// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

use bytes::Bytes;
use log::trace;
use questlink::com::Cell;
use questlink::timestamp::{Clock, MonotonicClock, Timestamp};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

/// A new value of a topic, as fanned out to all connections
#[derive(Debug, Clone)]
pub struct Update {
    pub topic: Arc<str>,
    pub cell: Cell,
}

/// Last-value cells of all topics, stamped with the server clock
#[derive(Debug)]
pub struct Store {
    cells: Mutex<HashMap<Arc<str>, Cell>>,
    clock: MonotonicClock,
    updates: broadcast::Sender<Update>,
}

impl Store {
    pub fn new(update_capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(update_capacity);
        Self {
            cells: Mutex::default(),
            clock: MonotonicClock::new(),
            updates,
        }
    }

    /// Overwrite `topic`, stamp the value with server time and notify all connections
    pub fn publish(&self, topic: &str, payload: Bytes) -> Cell {
        let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();
        let (topic, server_time) = match cells.get_key_value(topic) {
            Some((topic, current)) => (topic.clone(), now.max(current.server_time)),
            None => (Arc::from(topic), now),
        };
        let cell = Cell {
            payload,
            server_time,
        };
        trace!("Stored {} bytes on {topic} at {server_time}", cell.payload.len());
        cells.insert(topic.clone(), cell.clone());

        // Sent under the lock, so updates of one topic are broadcast in stamp order
        _ = self.updates.send(Update {
            topic,
            cell: cell.clone(),
        }); // no receivers is fine
        cell
    }

    pub fn get(&self, topic: &str) -> Option<Cell> {
        self.cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .cloned()
    }

    /// Receiver of all future updates
    pub fn updates(&self) -> broadcast::Receiver<Update> {
        self.updates.subscribe()
    }

    /// Server time
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }
}
