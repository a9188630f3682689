// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

use crate::error::Error;
use crate::timestamp::Timestamp;
use bytes::Bytes;
use log::warn;
use prost::Message;
use std::cell::Cell as StdCell;
use std::marker::PhantomData;
use std::sync::Arc;

/// Current value of one topic: the encoded payload and the server time of its publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub payload: Bytes,
    pub server_time: Timestamp,
}

/// A last-value pub/sub fabric.
///
/// Each topic holds exactly one current [Cell]. Publishing overwrites it and the fabric stamps
/// the new value with its server clock. Reads never block and never wait for a fresher value.
pub trait Fabric: Send + Sync {
    /// Overwrite the current value of `topic`
    fn publish(&self, topic: &str, payload: Bytes) -> Result<(), Error>;

    /// Declare interest in `topic` so that its value is kept current locally
    fn subscribe(&self, topic: &str) -> Result<(), Error>;

    /// Snapshot of the current value of `topic`, if it was ever published
    fn latest(&self, topic: &str) -> Option<Cell>;

    /// Now, in the fabric server clock domain
    fn now(&self) -> Timestamp;

    /// Whether [Fabric::now] can be compared with server times of published values.
    ///
    /// A remote fabric only knows the server clock after its first synchronization.
    fn is_clock_synced(&self) -> bool {
        true
    }
}

/// A decoded topic value with the server time of its publish
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampedValue<T> {
    pub value: T,
    pub server_time: Timestamp,
}

/// Typed read handle of a topic
pub struct Input<T> {
    fabric: Arc<dyn Fabric>,
    topic: String,
    // Server time of the last value that failed to decode, to report it only once
    undecodable: StdCell<Timestamp>,
    _type: PhantomData<fn() -> T>,
}

impl<T: Message + Default> Input<T> {
    /// Get an input handle by topic. Subscribes to the topic.
    pub fn get(fabric: Arc<dyn Fabric>, topic: &str) -> Result<Self, Error> {
        fabric.subscribe(topic)?;
        Ok(Self {
            fabric,
            topic: topic.to_owned(),
            undecodable: StdCell::new(Timestamp::NEVER),
            _type: PhantomData,
        })
    }

    /// Read and decode the current value.
    ///
    /// Returns `None` if the topic was never published or the current value cannot be decoded.
    pub fn read(&self) -> Option<TimestampedValue<T>> {
        let cell = self.fabric.latest(&self.topic)?;
        match T::decode(cell.payload) {
            Ok(value) => Some(TimestampedValue {
                value,
                server_time: cell.server_time,
            }),
            Err(e) => {
                if self.undecodable.replace(cell.server_time) != cell.server_time {
                    warn!(
                        "Dropping undecodable value on {} published at {}: {e}",
                        self.topic, cell.server_time
                    );
                }
                None
            }
        }
    }

    /// Server time of the current value, or [Timestamp::NEVER]
    pub fn last_change(&self) -> Timestamp {
        self.fabric
            .latest(&self.topic)
            .map(|cell| cell.server_time)
            .unwrap_or(Timestamp::NEVER)
    }

    /// Now, in the fabric server clock domain
    pub fn now(&self) -> Timestamp {
        self.fabric.now()
    }

    pub fn is_clock_synced(&self) -> bool {
        self.fabric.is_clock_synced()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl<T> std::fmt::Debug for Input<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Input").field("topic", &self.topic).finish()
    }
}

/// Typed write handle of a topic
pub struct Output<T> {
    fabric: Arc<dyn Fabric>,
    topic: String,
    _type: PhantomData<fn(T)>,
}

impl<T: Message> Output<T> {
    /// Get an output handle by topic.
    pub fn get(fabric: Arc<dyn Fabric>, topic: &str) -> Self {
        Self {
            fabric,
            topic: topic.to_owned(),
            _type: PhantomData,
        }
    }

    /// Encode `value` and overwrite the topic with it in a single fabric write.
    pub fn write(&self, value: &T) -> Result<(), Error> {
        self.fabric
            .publish(&self.topic, Bytes::from(value.encode_to_vec()))
    }

    /// Now, in the fabric server clock domain
    pub fn now(&self) -> Timestamp {
        self.fabric.now()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl<T> std::fmt::Debug for Output<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Output").field("topic", &self.topic).finish()
    }
}
