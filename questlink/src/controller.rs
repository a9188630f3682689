// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Robot side of the link

use crate::com::{Fabric, TimestampedValue};
use crate::configuration::controller::ControllerConfig;
use crate::correlator::{CommandId, CommandOutcome, Correlator};
use crate::error::Error;
use crate::messages::ProtobufDeviceData;
use crate::pose::Pose2d;
use crate::status::StatusReader;
use crate::telemetry::{FrameData, TelemetryReader};
use crate::timestamp::Timestamp;
use log::debug;
use std::sync::Arc;
use std::time::Duration;

/// Controller view of one tracking device.
///
/// Call [Controller::command_responses] periodically, e.g. once per robot loop, to learn the
/// outcome of the last command. All other accessors are snapshots of the latest published values.
#[derive(Debug)]
pub struct Controller {
    correlator: Correlator,
    telemetry: TelemetryReader,
    status: StatusReader,
}

impl Controller {
    pub fn new(fabric: Arc<dyn Fabric>, config: ControllerConfig) -> Result<Self, Error> {
        debug!(
            "Creating controller on {} with freshness threshold {:?}",
            config.topics.request, config.freshness_threshold
        );
        Ok(Self {
            correlator: Correlator::new(fabric.clone(), &config.topics)?,
            telemetry: TelemetryReader::new(
                fabric.clone(),
                &config.topics,
                config.freshness_threshold,
            )?,
            status: StatusReader::new(fabric, &config.topics)?,
        })
    }

    /// Ask the device to reset its pose estimate to `pose`
    pub fn set_pose(&mut self, pose: Pose2d) -> Result<CommandId, Error> {
        self.correlator.reset_pose(pose)
    }

    /// Outcome of the last command, reported once
    pub fn command_responses(&mut self) -> Option<CommandOutcome> {
        self.correlator.poll()
    }

    /// The last command, unless its outcome was already reported
    pub fn pending_command(&self) -> Option<CommandId> {
        self.correlator.pending()
    }

    pub fn correlator(&mut self) -> &mut Correlator {
        &mut self.correlator
    }

    pub fn latest_frame(&self) -> FrameData {
        self.telemetry.latest_frame()
    }

    pub fn pose(&self) -> Pose2d {
        self.telemetry.pose()
    }

    pub fn frame_count(&self) -> i32 {
        self.telemetry.frame_count()
    }

    pub fn app_timestamp(&self) -> f64 {
        self.telemetry.app_timestamp()
    }

    pub fn data_timestamp(&self) -> Timestamp {
        self.telemetry.data_timestamp()
    }

    pub fn is_connected(&self) -> bool {
        self.telemetry.is_connected()
    }

    pub fn latency(&self) -> Duration {
        self.telemetry.latency()
    }

    pub fn battery_percent(&self) -> i32 {
        self.status.battery_percent()
    }

    pub fn is_tracking(&self) -> bool {
        self.status.is_tracking()
    }

    pub fn tracking_lost_counter(&self) -> i32 {
        self.status.tracking_lost_counter()
    }

    pub fn device_data(&self) -> Option<TimestampedValue<ProtobufDeviceData>> {
        self.status.device_data()
    }
}
