// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

use crate::com::interface::{Cell, Fabric};
use crate::error::Error;
use crate::timestamp::{Clock, MonotonicClock, Timestamp};
use bytes::Bytes;
use log::trace;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// In-process last-value fabric.
///
/// Clones share the same store, so a controller and a device in one process can talk through it.
/// It is also the local cache behind [SocketFabric](crate::com::SocketFabric).
#[derive(Clone)]
pub struct LocalFabric {
    cells: Arc<Mutex<HashMap<String, Cell>>>,
    clock: Arc<dyn Clock>,
}

impl LocalFabric {
    /// Create a fabric stamping publishes with a monotonic clock starting now
    pub fn new() -> Self {
        Self::with_clock(Arc::new(MonotonicClock::new()))
    }

    /// Create a fabric stamping publishes with the given clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            cells: Arc::default(),
            clock,
        }
    }

    /// Store a cell that was already stamped elsewhere.
    ///
    /// An update older than the current value of the topic is dropped. Returns whether the cell
    /// was stored.
    pub fn store(&self, topic: &str, cell: Cell) -> bool {
        let mut cells = self.lock();
        match cells.get(topic) {
            Some(current) if current.server_time > cell.server_time => {
                trace!(
                    "Dropping out-of-date update on {topic}: {} < {}",
                    cell.server_time,
                    current.server_time
                );
                false
            }
            _ => {
                cells.insert(topic.to_owned(), cell);
                true
            }
        }
    }

    /// Names of all topics that hold a value
    pub fn topics(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Cell>> {
        // A panic while holding the lock cannot leave a cell half-written
        self.cells.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LocalFabric {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LocalFabric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFabric")
            .field("topics", &self.topics())
            .finish()
    }
}

impl Fabric for LocalFabric {
    fn publish(&self, topic: &str, payload: Bytes) -> Result<(), Error> {
        let mut cells = self.lock();
        // Per topic, server time never goes backwards
        let now = self.clock.now();
        let server_time = cells
            .get(topic)
            .map_or(now, |current| now.max(current.server_time));
        trace!("Publishing {} bytes on {topic} at {server_time}", payload.len());
        cells.insert(
            topic.to_owned(),
            Cell {
                payload,
                server_time,
            },
        );
        Ok(())
    }

    fn subscribe(&self, _topic: &str) -> Result<(), Error> {
        // Every topic of the in-process store is always current
        Ok(())
    }

    fn latest(&self, topic: &str) -> Option<Cell> {
        self.lock().get(topic).cloned()
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }
}
