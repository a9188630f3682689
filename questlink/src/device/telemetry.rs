// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

use crate::com::{Fabric, Output};
use crate::configuration::topics::Topics;
use crate::device::tracking::TrackingMonitor;
use crate::error::Error;
use crate::messages::{ProtobufDeviceData, ProtobufFrameData};
use crate::pose::Pose2d;
use log::trace;
use std::sync::Arc;

/// Publishes frame data and device status
#[derive(Debug)]
pub struct TelemetryPublisher {
    frames: Output<ProtobufFrameData>,
    device_data: Output<ProtobufDeviceData>,
    tracking: TrackingMonitor,
}

impl TelemetryPublisher {
    pub fn new(fabric: Arc<dyn Fabric>, topics: &Topics) -> Self {
        Self {
            frames: Output::get(fabric.clone(), &topics.frame_data),
            device_data: Output::get(fabric, &topics.device_data),
            tracking: TrackingMonitor::new(),
        }
    }

    /// Publish one perception sample
    pub fn publish_frame(
        &self,
        frame_count: i32,
        app_timestamp: f64,
        pose: Pose2d,
    ) -> Result<(), Error> {
        trace!("Publishing frame {frame_count} at {app_timestamp:.3}s: {pose}");
        self.frames.write(&ProtobufFrameData {
            frame_count,
            timestamp: app_timestamp,
            pose2d: Some(pose.into()),
        })
    }

    /// Feed the current tracking state. Returns whether tracking was just lost.
    pub fn update_tracking(&mut self, tracking: bool) -> bool {
        self.tracking.update(tracking)
    }

    pub fn tracking(&self) -> &TrackingMonitor {
        &self.tracking
    }

    /// Publish the battery level with the current tracking state
    pub fn publish_device_data(&self, battery_percent: i32) -> Result<(), Error> {
        self.device_data.write(&ProtobufDeviceData {
            tracking_lost_counter: self.tracking.lost_counter(),
            currently_tracking: self.tracking.is_tracking(),
            battery_percent,
        })
    }
}

#[cfg(test)]
mod test {
    use super::TelemetryPublisher;
    use crate::com::{Fabric, Input, LocalFabric};
    use crate::configuration::topics::Topics;
    use crate::messages::{ProtobufDeviceData, ProtobufFrameData};
    use crate::pose::Pose2d;
    use std::sync::Arc;

    #[test]
    fn device_data_reflects_tracking_history() {
        let fabric: Arc<dyn Fabric> = Arc::new(LocalFabric::new());
        let topics = Topics::default();
        let mut publisher = TelemetryPublisher::new(fabric.clone(), &topics);
        let device_data = Input::<ProtobufDeviceData>::get(fabric.clone(), &topics.device_data).unwrap();
        let frames = Input::<ProtobufFrameData>::get(fabric, &topics.frame_data).unwrap();

        publisher.update_tracking(true);
        publisher.update_tracking(false);
        publisher.publish_device_data(64).unwrap();
        assert_eq!(
            device_data.read().unwrap().value,
            ProtobufDeviceData {
                tracking_lost_counter: 1,
                currently_tracking: false,
                battery_percent: 64,
            }
        );

        let pose = Pose2d::new(1.0, 2.0, 3.0);
        publisher.publish_frame(7, 1.25, pose).unwrap();
        let frame = frames.read().unwrap().value;
        assert_eq!(frame.frame_count, 7);
        assert_eq!(frame.timestamp, 1.25);
        assert_eq!(frame.pose2d.map(Pose2d::from), Some(pose));
    }
}
