// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Configuration of controllers and devices

use std::time::Duration;

pub mod controller;
pub mod device;
pub mod topics;

/// Maximal age of the latest telemetry frame for the link to count as connected.
///
/// Age is measured from the fabric server timestamp of the last `frameData` publish to the
/// current fabric server time. At the nominal telemetry rate of 100 Hz this tolerates four
/// consecutive missed frames.
pub const FRESHNESS_THRESHOLD: Duration = Duration::from_millis(50);

/// Maximal age of a command at the device before it is refused
pub const DEFAULT_COMMAND_TTL: Duration = Duration::from_millis(50);

/// Default address of the fabric server
pub const DEFAULT_FABRIC_ADDRESS: &str = "127.0.0.1:5810";
