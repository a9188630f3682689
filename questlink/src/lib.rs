// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! questlink connects a robot controller with an independently clocked tracking device over a
//! last-value pub/sub fabric.
//!
//! # Fabric
//!
//! The [fabric](crate::com::Fabric) offers named topics. Each topic holds a single current value
//! plus the server time of its publish. There is no queue and no acknowledgement: readers see the
//! most recent value, or nothing.
//!
//! # Commands
//!
//! The controller issues one-shot commands through the [Correlator](crate::correlator::Correlator).
//! Every command carries a fresh id, and the device answers with the id of the command it
//! executed. A response is acted upon at most once and only if it belongs to the latest command.
//!
//! # Freshness
//!
//! Liveness is inferred from the server timestamps of telemetry updates alone. The link counts
//! as connected while the latest frame is younger than
//! [FRESHNESS_THRESHOLD](crate::configuration::FRESHNESS_THRESHOLD).

pub mod com;
pub mod configuration;
pub mod controller;
pub mod correlator;
pub mod device;
pub mod error;
pub mod messages;
pub mod pose;
pub mod status;
pub mod telemetry;
pub mod timestamp;

/// Re-export the public API
pub mod prelude {
    pub use crate::com::{self, Fabric, LocalFabric, SocketFabric};
    pub use crate::configuration::{self, FRESHNESS_THRESHOLD};
    pub use crate::controller::Controller;
    pub use crate::correlator::{CommandId, CommandOutcome};
    pub use crate::device::{Device, PoseResetHandler};
    pub use crate::error::Error;
    pub use crate::pose::Pose2d;
    pub use crate::timestamp::Timestamp;
}
