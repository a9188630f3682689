// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Telemetry and link freshness on the controller side

use crate::com::{Fabric, Input};
use crate::configuration::topics::Topics;
use crate::error::Error;
use crate::messages::ProtobufFrameData;
use crate::pose::Pose2d;
use crate::timestamp::Timestamp;
use std::sync::Arc;
use std::time::Duration;

/// Latest perception sample of the device
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameData {
    pub pose: Pose2d,
    /// Frame counter of the device, -1 if nothing was published
    pub frame_count: i32,
    /// Device uptime in seconds when the frame was captured, -1 if nothing was published
    pub app_timestamp: f64,
    /// Fabric server time of the publish, [Timestamp::NEVER] if nothing was published
    pub server_time: Timestamp,
}

impl FrameData {
    /// Returned when no frame was ever published
    pub const NONE: FrameData = FrameData {
        pose: Pose2d::ZERO,
        frame_count: -1,
        app_timestamp: -1.0,
        server_time: Timestamp::NEVER,
    };
}

/// Reads the telemetry topic and judges link freshness from its timestamps
#[derive(Debug)]
pub struct TelemetryReader {
    frames: Input<ProtobufFrameData>,
    freshness_threshold: Duration,
}

impl TelemetryReader {
    pub fn new(
        fabric: Arc<dyn Fabric>,
        topics: &Topics,
        freshness_threshold: Duration,
    ) -> Result<Self, Error> {
        Ok(Self {
            frames: Input::get(fabric, &topics.frame_data)?,
            freshness_threshold,
        })
    }

    /// Latest frame with the server time of its publish, or [FrameData::NONE]
    pub fn latest_frame(&self) -> FrameData {
        match self.frames.read() {
            Some(frame) => FrameData {
                pose: frame.value.pose2d.map(Pose2d::from).unwrap_or(Pose2d::ZERO),
                frame_count: frame.value.frame_count,
                app_timestamp: frame.value.timestamp,
                server_time: frame.server_time,
            },
            None => FrameData::NONE,
        }
    }

    pub fn pose(&self) -> Pose2d {
        self.latest_frame().pose
    }

    pub fn frame_count(&self) -> i32 {
        self.latest_frame().frame_count
    }

    pub fn app_timestamp(&self) -> f64 {
        self.latest_frame().app_timestamp
    }

    /// Server time of the last frame publish
    pub fn data_timestamp(&self) -> Timestamp {
        self.frames.last_change()
    }

    /// Whether the last frame is younger than the freshness threshold.
    ///
    /// Never connected if no frame was ever published, or while the age of the last frame
    /// cannot be told because the fabric clock is not synchronized yet.
    pub fn is_connected(&self) -> bool {
        !self.data_timestamp().is_never()
            && self.frames.is_clock_synced()
            && self.latency() < self.freshness_threshold
    }

    /// Age of the last frame in the fabric server clock domain.
    ///
    /// This measures liveness, not a round trip. Without any frame it is the age of the server
    /// epoch.
    pub fn latency(&self) -> Duration {
        self.frames
            .now()
            .saturating_duration_since(self.data_timestamp())
    }

    pub fn freshness_threshold(&self) -> Duration {
        self.freshness_threshold
    }
}

#[cfg(test)]
mod test {
    use super::{FrameData, TelemetryReader};
    use crate::com::{Cell, Fabric, LocalFabric, Output};
    use crate::configuration::topics::Topics;
    use crate::configuration::FRESHNESS_THRESHOLD;
    use crate::error::Error;
    use crate::messages::ProtobufFrameData;
    use crate::pose::Pose2d;
    use crate::timestamp::{ManualClock, Timestamp};
    use bytes::Bytes;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Local fabric whose clock starts out unsynchronized
    struct Syncing {
        inner: LocalFabric,
        synced: AtomicBool,
    }

    impl Fabric for Syncing {
        fn publish(&self, topic: &str, payload: Bytes) -> Result<(), Error> {
            self.inner.publish(topic, payload)
        }

        fn subscribe(&self, topic: &str) -> Result<(), Error> {
            self.inner.subscribe(topic)
        }

        fn latest(&self, topic: &str) -> Option<Cell> {
            self.inner.latest(topic)
        }

        fn now(&self) -> Timestamp {
            self.inner.now()
        }

        fn is_clock_synced(&self) -> bool {
            self.synced.load(Ordering::Relaxed)
        }
    }

    fn setup() -> (Arc<ManualClock>, TelemetryReader, Output<ProtobufFrameData>) {
        let clock = Arc::new(ManualClock::new(Timestamp::from_micros(1_000_000)));
        let fabric: Arc<dyn Fabric> = Arc::new(LocalFabric::with_clock(clock.clone()));
        let topics = Topics::default();
        let reader = TelemetryReader::new(fabric.clone(), &topics, FRESHNESS_THRESHOLD).unwrap();
        let output = Output::get(fabric, &topics.frame_data);
        (clock, reader, output)
    }

    fn frame(frame_count: i32, pose: Pose2d) -> ProtobufFrameData {
        ProtobufFrameData {
            frame_count,
            timestamp: 12.5,
            pose2d: Some(pose.into()),
        }
    }

    #[test]
    fn sentinels_before_first_frame() {
        let (_, reader, _) = setup();
        assert_eq!(reader.latest_frame(), FrameData::NONE);
        assert_eq!(reader.pose(), Pose2d::ZERO);
        assert_eq!(reader.frame_count(), -1);
        assert_eq!(reader.app_timestamp(), -1.0);
        assert_eq!(reader.data_timestamp(), Timestamp::NEVER);
        assert!(!reader.is_connected());
    }

    #[test]
    fn latest_frame_carries_server_time() {
        let (clock, reader, output) = setup();
        let pose = Pose2d::new(3.0, 4.0, 45.0);
        output.write(&frame(10, pose)).unwrap();
        clock.advance(Duration::from_millis(5));

        let latest = reader.latest_frame();
        assert_eq!(latest.pose, pose);
        assert_eq!(latest.frame_count, 10);
        assert_eq!(latest.app_timestamp, 12.5);
        assert_eq!(latest.server_time, Timestamp::from_micros(1_000_000));
        assert_eq!(reader.latency(), Duration::from_millis(5));
        assert!(reader.is_connected());
    }

    #[test]
    fn frame_without_pose_reads_as_zero_pose() {
        let (_, reader, output) = setup();
        output
            .write(&ProtobufFrameData {
                frame_count: 1,
                timestamp: 0.1,
                pose2d: None,
            })
            .unwrap();
        assert_eq!(reader.pose(), Pose2d::ZERO);
        assert_eq!(reader.frame_count(), 1);
    }

    #[test]
    fn disconnects_after_threshold() {
        let (clock, reader, output) = setup();
        output.write(&frame(1, Pose2d::ZERO)).unwrap();

        clock.advance(FRESHNESS_THRESHOLD - Duration::from_micros(1));
        assert!(reader.is_connected());

        clock.advance(Duration::from_micros(1));
        assert!(!reader.is_connected());
        assert_eq!(reader.latency(), FRESHNESS_THRESHOLD);

        clock.advance(Duration::from_millis(200));
        assert!(!reader.is_connected());
        assert_eq!(reader.latency(), Duration::from_millis(250));

        // A fresh frame restores the link
        output.write(&frame(2, Pose2d::ZERO)).unwrap();
        assert!(reader.is_connected());
        assert_eq!(reader.latency(), Duration::ZERO);
    }

    #[test]
    fn freshness_is_monotone_without_updates() {
        let (clock, reader, output) = setup();
        output.write(&frame(1, Pose2d::ZERO)).unwrap();

        let mut previous = reader.latency();
        let mut was_connected = reader.is_connected();
        for _ in 0..20 {
            clock.advance(Duration::from_millis(7));
            let latency = reader.latency();
            assert!(latency >= previous);
            // Once disconnected, stays disconnected until the next frame
            assert!(was_connected || !reader.is_connected());
            previous = latency;
            was_connected = reader.is_connected();
        }
        assert!(!was_connected);
    }

    #[test]
    fn not_connected_before_clock_sync() {
        let clock = Arc::new(ManualClock::new(Timestamp::from_micros(1_000_000)));
        let fabric = Arc::new(Syncing {
            inner: LocalFabric::with_clock(clock),
            synced: AtomicBool::new(false),
        });
        let topics = Topics::default();
        let reader = TelemetryReader::new(fabric.clone(), &topics, FRESHNESS_THRESHOLD).unwrap();
        Output::get(fabric.clone(), &topics.frame_data)
            .write(&frame(1, Pose2d::ZERO))
            .unwrap();

        // The cached frame may be arbitrarily old in server time
        assert_eq!(reader.frame_count(), 1);
        assert!(!reader.is_connected());

        fabric.synced.store(true, Ordering::Relaxed);
        assert!(reader.is_connected());
    }
}
