// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

use crate::com::{Fabric, Input, TimestampedValue};
use crate::configuration::topics::Topics;
use crate::error::Error;
use crate::messages::ProtobufDeviceData;
use std::sync::Arc;

/// Reads the device status topic
#[derive(Debug)]
pub struct StatusReader {
    device_data: Input<ProtobufDeviceData>,
}

impl StatusReader {
    pub fn new(fabric: Arc<dyn Fabric>, topics: &Topics) -> Result<Self, Error> {
        Ok(Self {
            device_data: Input::get(fabric, &topics.device_data)?,
        })
    }

    /// Latest status with the server time of its publish
    pub fn device_data(&self) -> Option<TimestampedValue<ProtobufDeviceData>> {
        self.device_data.read()
    }

    /// Battery charge in percent, -1 if unknown
    pub fn battery_percent(&self) -> i32 {
        self.device_data()
            .map_or(-1, |data| data.value.battery_percent)
    }

    /// Whether the device currently tracks, false if unknown
    pub fn is_tracking(&self) -> bool {
        self.device_data()
            .is_some_and(|data| data.value.currently_tracking)
    }

    /// Number of tracking losses since device start, -1 if unknown
    pub fn tracking_lost_counter(&self) -> i32 {
        self.device_data()
            .map_or(-1, |data| data.value.tracking_lost_counter)
    }
}

#[cfg(test)]
mod test {
    use super::StatusReader;
    use crate::com::{Fabric, LocalFabric, Output};
    use crate::configuration::topics::Topics;
    use crate::messages::ProtobufDeviceData;
    use std::sync::Arc;

    #[test]
    fn sentinels_until_published() {
        let fabric: Arc<dyn Fabric> = Arc::new(LocalFabric::new());
        let topics = Topics::default();
        let status = StatusReader::new(fabric.clone(), &topics).unwrap();

        assert_eq!(status.battery_percent(), -1);
        assert!(!status.is_tracking());
        assert_eq!(status.tracking_lost_counter(), -1);
        assert!(status.device_data().is_none());

        Output::get(fabric, &topics.device_data)
            .write(&ProtobufDeviceData {
                tracking_lost_counter: 0,
                currently_tracking: true,
                battery_percent: 87,
            })
            .unwrap();
        assert_eq!(status.battery_percent(), 87);
        assert!(status.is_tracking());
        assert_eq!(status.tracking_lost_counter(), 0);
        assert!(!status.device_data().unwrap().server_time.is_never());
    }
}
