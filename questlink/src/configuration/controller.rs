// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Controller builder

use crate::com::Fabric;
use crate::configuration::topics::{Topics, BASE_PATH};
use crate::configuration::FRESHNESS_THRESHOLD;
use crate::controller::Controller;
use crate::error::Error;
use std::sync::Arc;
use std::time::Duration;

/// Controller configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub topics: Topics,
    pub freshness_threshold: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            topics: Topics::default(),
            freshness_threshold: FRESHNESS_THRESHOLD,
        }
    }
}

/// Controller builder
#[derive(Default)]
pub struct Builder {
    pub fabric: Option<Arc<dyn Fabric>>,
    pub base_path: Option<String>,
    pub freshness_threshold: Option<Duration>,
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

    /// Set the maximal telemetry age, defaults to [FRESHNESS_THRESHOLD]
    pub fn freshness_threshold(mut self, threshold: Duration) -> Self {
        self.freshness_threshold = Some(threshold);
        self
    }

    /// Build the controller. Subscribes to the device topics.
    pub fn build(self) -> Result<Controller, Error> {
        let fabric = self.fabric.expect("missing fabric");
        let base_path = self.base_path.as_deref().unwrap_or(BASE_PATH);

        let config = ControllerConfig {
            topics: Topics::new(base_path),
            freshness_threshold: self.freshness_threshold.unwrap_or(FRESHNESS_THRESHOLD),
        };

        Controller::new(fabric, config)
    }
}
