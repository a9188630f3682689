// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Device builder

use crate::com::Fabric;
use crate::configuration::topics::{Topics, BASE_PATH};
use crate::configuration::DEFAULT_COMMAND_TTL;
use crate::device::{Device, PoseResetHandler};
use crate::error::Error;
use crate::pose::Pose2d;
use std::sync::Arc;
use std::time::Duration;

/// Rectangle of valid field positions, with the origin in one corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldBounds {
    /// Extent along x in meters
    pub length: f64,
    /// Extent along y in meters
    pub width: f64,
}

impl FieldBounds {
    /// Default field of 17.548 m by 8.052 m
    pub const DEFAULT: FieldBounds = FieldBounds {
        length: 17.548,
        width: 8.052,
    };

    /// Whether the position of `pose` lies on the field, edges included
    pub fn contains(&self, pose: &Pose2d) -> bool {
        (0.0..=self.length).contains(&pose.x()) && (0.0..=self.width).contains(&pose.y())
    }
}

impl Default for FieldBounds {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Device configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    pub topics: Topics,
    /// Commands at least this old are refused
    pub command_ttl: Duration,
    pub field_bounds: FieldBounds,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            topics: Topics::default(),
            command_ttl: DEFAULT_COMMAND_TTL,
            field_bounds: FieldBounds::DEFAULT,
        }
    }
}

/// Device builder
#[derive(Default)]
pub struct Builder {
    pub fabric: Option<Arc<dyn Fabric>>,
    pub base_path: Option<String>,
    pub command_ttl: Option<Duration>,
    pub field_bounds: Option<FieldBounds>,
    pub pose_reset_handler: Option<Box<dyn PoseResetHandler>>,
}

impl Builder {
    /// Set the fabric to talk through
    pub fn fabric(mut self, fabric: Arc<dyn Fabric>) -> Self {
        self.fabric = Some(fabric);
        self
    }

    /// Set the base path of the topics, defaults to [BASE_PATH]
    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    /// Set the command time to live, defaults to [DEFAULT_COMMAND_TTL]
    pub fn command_ttl(mut self, ttl: Duration) -> Self {
        self.command_ttl = Some(ttl);
        self
    }

    /// Set the field bounds for pose validation
    pub fn field_bounds(mut self, bounds: FieldBounds) -> Self {
        self.field_bounds = Some(bounds);
        self
    }

    /// Set the handler applying accepted pose resets
    pub fn pose_reset_handler(mut self, handler: impl PoseResetHandler + 'static) -> Self {
        self.pose_reset_handler = Some(Box::new(handler));
        self
    }

    /// Build the device. Subscribes to the request topic.
    pub fn build(self) -> Result<Device, Error> {
        let fabric = self.fabric.expect("missing fabric");
        let handler = self.pose_reset_handler.expect("missing pose reset handler");
        let base_path = self.base_path.as_deref().unwrap_or(BASE_PATH);

        let config = DeviceConfig {
            topics: Topics::new(base_path),
            command_ttl: self.command_ttl.unwrap_or(DEFAULT_COMMAND_TTL),
            field_bounds: self.field_bounds.unwrap_or_default(),
        };

        Device::new(fabric, config, handler)
    }
}
