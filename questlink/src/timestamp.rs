// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Fabric time
//!
//! All freshness decisions are taken in the clock domain of the fabric server. A [Timestamp] is
//! the duration since the server's epoch (its startup), exchanged on the wire as microseconds.
//! Peers that do not host the fabric estimate the server clock through [ServerClock].

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Maximal accepted round trip of a clock synchronization exchange.
///
/// Samples with a longer round trip carry too much uncertainty about when the server sampled
/// its clock and are dropped once a first estimate exists.
pub const MAX_SYNC_ROUND_TRIP: Duration = Duration::from_millis(20);

/// A timestamp in the fabric server clock domain: duration since the server epoch
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(pub Duration);

impl Timestamp {
    /// Sentinel for "never published". Servers never hand out this value.
    pub const NEVER: Timestamp = Timestamp(Duration::ZERO);

    /// Create a timestamp from microseconds since the server epoch
    pub const fn from_micros(micros: u64) -> Self {
        Timestamp(Duration::from_micros(micros))
    }

    /// Microseconds since the server epoch, saturating at `u64::MAX`
    pub fn as_micros(&self) -> u64 {
        u64::try_from(self.0.as_micros()).unwrap_or(u64::MAX)
    }

    /// Whether this is the [Timestamp::NEVER] sentinel
    pub fn is_never(&self) -> bool {
        *self == Self::NEVER
    }

    /// Time elapsed from `earlier` to `self`, or zero if `earlier` is later
    pub fn saturating_duration_since(&self, earlier: Timestamp) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}us", self.as_micros())
    }
}

impl From<u64> for Timestamp {
    fn from(micros: u64) -> Timestamp {
        Timestamp::from_micros(micros)
    }
}

impl From<Timestamp> for u64 {
    fn from(tstamp: Timestamp) -> u64 {
        tstamp.as_micros()
    }
}

/// Source of "now" in the fabric server clock domain
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Monotonic clock counting from its creation. Used by the fabric server (and the in-process
/// fabric) as the authoritative server clock.
#[derive(Debug)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        // Never hand out the NEVER sentinel, even right at the epoch
        let elapsed = self.epoch.elapsed().max(Duration::from_micros(1));
        Timestamp(elapsed)
    }
}

/// Clock that only moves when told to. Deterministic time for tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    micros: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            micros: AtomicU64::new(start.as_micros()),
        }
    }

    /// Move the clock forward by `duration`
    pub fn advance(&self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.micros.fetch_add(micros, Ordering::Relaxed);
    }

    /// Jump to an absolute time
    pub fn set(&self, now: Timestamp) {
        self.micros.store(now.as_micros(), Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_micros(self.micros.load(Ordering::Relaxed))
    }
}

/// Estimate of the fabric server clock on a client.
///
/// The estimate is `local + offset`, where the offset is derived from time request/reply
/// exchanges with the server (server time plus half the round trip, minus local receive time).
/// Until the first exchange completes the offset is zero. Once synchronized, the returned time
/// never goes backwards, even if a later sample moves the offset back.
#[derive(Debug)]
pub struct ServerClock {
    local: MonotonicClock,
    offset_micros: AtomicI64,
    synced: AtomicBool,
    last: AtomicU64,
}

impl ServerClock {
    pub fn new() -> Self {
        Self {
            local: MonotonicClock::new(),
            offset_micros: AtomicI64::new(0),
            synced: AtomicBool::new(false),
            last: AtomicU64::new(0),
        }
    }

    /// Local (unsynchronized) time, as sent in time requests
    pub fn local_now(&self) -> Timestamp {
        self.local.now()
    }

    /// Whether at least one synchronization sample has been applied
    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    /// Apply one time request/reply exchange.
    ///
    /// `sent` and `received` are local times of the request and of the reply, `server` is the
    /// server time contained in the reply. Returns whether the sample was used.
    pub fn apply_sample(&self, sent: Timestamp, server: Timestamp, received: Timestamp) -> bool {
        let round_trip = received.saturating_duration_since(sent);
        if self.is_synced() && round_trip > MAX_SYNC_ROUND_TRIP {
            return false;
        }

        let half_trip = i64::try_from(round_trip.as_micros() / 2).unwrap_or(i64::MAX);
        let server = i64::try_from(server.as_micros()).unwrap_or(i64::MAX);
        let received = i64::try_from(received.as_micros()).unwrap_or(i64::MAX);
        let offset = server.saturating_add(half_trip).saturating_sub(received);

        self.offset_micros.store(offset, Ordering::Release);
        self.synced.store(true, Ordering::Release);
        true
    }
}

impl Default for ServerClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ServerClock {
    fn now(&self) -> Timestamp {
        let local = i64::try_from(self.local.now().as_micros()).unwrap_or(i64::MAX);
        let offset = self.offset_micros.load(Ordering::Acquire);
        let estimate = u64::try_from(local.saturating_add(offset).max(1)).unwrap_or(1);
        // Unsynced estimates must not hold back the first synced ones
        if !self.is_synced() {
            return Timestamp::from_micros(estimate);
        }
        let previous = self.last.fetch_max(estimate, Ordering::AcqRel);
        Timestamp::from_micros(previous.max(estimate))
    }
}
