// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Topic based communication over a last-value fabric

mod backend_local;
mod backend_socket;
mod interface;
pub mod protocol;

pub use backend_local::LocalFabric;
pub use backend_socket::{SocketFabric, CONNECT_TIMEOUT, SYNC_INTERVAL};
pub use interface::{Cell, Fabric, Input, Output, TimestampedValue};
