// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Tracking device side of the link
//!
//! The device publishes frame data at the display rate and its status at a lower rate, and
//! executes the commands the controller places on the request topic. A typical loop calls
//! [Device::publish_frame] every frame and [Device::update_tracking],
//! [Device::publish_device_data] and [Device::process_commands] at the slower status rate.

mod processor;
mod telemetry;
mod tracking;

use crate::com::Fabric;
use crate::configuration::device::DeviceConfig;
use crate::error::Error;
use crate::messages::ProtobufCommandResponse;
use crate::pose::Pose2d;
use log::debug;
use std::sync::Arc;

pub use processor::{CommandProcessor, PoseResetHandler};
pub use telemetry::TelemetryPublisher;
pub use tracking::TrackingMonitor;

#[derive(Debug)]
pub struct Device {
    processor: CommandProcessor,
    telemetry: TelemetryPublisher,
}

impl Device {
    pub fn new(
        fabric: Arc<dyn Fabric>,
        config: DeviceConfig,
        handler: Box<dyn PoseResetHandler>,
    ) -> Result<Self, Error> {
        debug!(
            "Creating device on {} with command ttl {:?}",
            config.topics.request, config.command_ttl
        );
        Ok(Self {
            processor: CommandProcessor::new(fabric.clone(), &config, handler)?,
            telemetry: TelemetryPublisher::new(fabric, &config.topics),
        })
    }

    /// Execute the current command if it is new
    pub fn process_commands(&mut self) -> Result<Option<ProtobufCommandResponse>, Error> {
        self.processor.process()
    }

    pub fn publish_frame(
        &self,
        frame_count: i32,
        app_timestamp: f64,
        pose: Pose2d,
    ) -> Result<(), Error> {
        self.telemetry.publish_frame(frame_count, app_timestamp, pose)
    }

    /// Feed the current tracking state. Returns whether tracking was just lost.
    pub fn update_tracking(&mut self, tracking: bool) -> bool {
        self.telemetry.update_tracking(tracking)
    }

    pub fn publish_device_data(&self, battery_percent: i32) -> Result<(), Error> {
        self.telemetry.publish_device_data(battery_percent)
    }

    pub fn tracking(&self) -> &TrackingMonitor {
        self.telemetry.tracking()
    }
}
