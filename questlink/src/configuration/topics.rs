// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Topic names

pub type Topic = &'static str;

/// Default base path of all topics
pub const BASE_PATH: Topic = "QuestNav";

/// Controller to device: the single outstanding command
pub const REQUEST: Topic = "request";
/// Device to controller: result of the most recently executed command
pub const RESPONSE: Topic = "response";
/// Device to controller: pose and frame data
pub const FRAME_DATA: Topic = "frameData";
/// Device to controller: battery and tracking status
pub const DEVICE_DATA: Topic = "deviceData";

/// Fully qualified names of the four topics below one base path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub request: String,
    pub response: String,
    pub frame_data: String,
    pub device_data: String,
}

impl Topics {
    pub fn new(base_path: &str) -> Self {
        let base_path = base_path.trim_end_matches('/');
        let qualify = |name: Topic| format!("{base_path}/{name}");
        Self {
            request: qualify(REQUEST),
            response: qualify(RESPONSE),
            frame_data: qualify(FRAME_DATA),
            device_data: qualify(DEVICE_DATA),
        }
    }
}

impl Default for Topics {
    fn default() -> Self {
        Self::new(BASE_PATH)
    }
}
