// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Messages
//!
//! Protobuf messages of the values published on the four QuestNav topics, derived by hand from
//! `proto/questlink.proto`. That file is the schema other implementations build against. Field
//! numbers are part of the wire contract between independently deployed controllers and devices
//! and must never be renumbered or reused.

use crate::pose::Pose2d;

/// Field-relative pose on the wire
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ProtobufPose2d {
    #[prost(double, tag = "1")]
    pub x: f64,
    #[prost(double, tag = "2")]
    pub y: f64,
    #[prost(double, tag = "3")]
    pub heading_deg: f64,
}

/// Payload of a pose reset command
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ProtobufPoseResetPayload {
    #[prost(message, optional, tag = "1")]
    pub target_pose: ::core::option::Option<ProtobufPose2d>,
}

/// Kind of command issued by the controller
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum CommandType {
    Unspecified = 0,
    PoseReset = 1,
}

/// Command published on the request topic
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtobufCommand {
    #[prost(enumeration = "CommandType", tag = "1")]
    pub r#type: i32,
    #[prost(uint32, tag = "2")]
    pub command_id: u32,
    #[prost(oneof = "command::Payload", tags = "10")]
    pub payload: ::core::option::Option<command::Payload>,
}

pub mod command {
    /// Payload keyed by command type
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "10")]
        PoseResetPayload(super::ProtobufPoseResetPayload),
    }
}

/// Result of the most recently executed command
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtobufCommandResponse {
    #[prost(uint32, tag = "1")]
    pub command_id: u32,
    #[prost(bool, tag = "2")]
    pub success: bool,
    #[prost(string, tag = "3")]
    pub error_message: ::prost::alloc::string::String,
}

/// One perception sample
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ProtobufFrameData {
    #[prost(int32, tag = "1")]
    pub frame_count: i32,
    /// Device-local uptime in seconds
    #[prost(double, tag = "2")]
    pub timestamp: f64,
    #[prost(message, optional, tag = "3")]
    pub pose2d: ::core::option::Option<ProtobufPose2d>,
}

/// Low-rate device health snapshot
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ProtobufDeviceData {
    #[prost(int32, tag = "1")]
    pub tracking_lost_counter: i32,
    #[prost(bool, tag = "2")]
    pub currently_tracking: bool,
    #[prost(int32, tag = "3")]
    pub battery_percent: i32,
}

impl From<Pose2d> for ProtobufPose2d {
    fn from(pose: Pose2d) -> Self {
        Self {
            x: pose.x(),
            y: pose.y(),
            heading_deg: pose.heading_deg(),
        }
    }
}

impl From<ProtobufPose2d> for Pose2d {
    fn from(pose: ProtobufPose2d) -> Self {
        Pose2d::new(pose.x, pose.y, pose.heading_deg)
    }
}

impl ProtobufCommand {
    /// Build a pose reset command
    pub fn pose_reset(command_id: u32, target: Pose2d) -> Self {
        Self {
            r#type: CommandType::PoseReset.into(),
            command_id,
            payload: Some(command::Payload::PoseResetPayload(ProtobufPoseResetPayload {
                target_pose: Some(target.into()),
            })),
        }
    }

    /// The target pose, if this command carries a pose reset payload with a pose
    pub fn target_pose(&self) -> Option<Pose2d> {
        match &self.payload {
            Some(command::Payload::PoseResetPayload(payload)) => {
                payload.target_pose.map(Pose2d::from)
            }
            None => None,
        }
    }
}

impl ProtobufCommandResponse {
    pub fn success(command_id: u32) -> Self {
        Self {
            command_id,
            success: true,
            error_message: String::new(),
        }
    }

    pub fn failure(command_id: u32, error_message: impl Into<String>) -> Self {
        Self {
            command_id,
            success: false,
            error_message: error_message.into(),
        }
    }
}
