// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

use log::warn;

/// Counts how often tracking was lost after having been acquired
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrackingMonitor {
    tracking: bool,
    lost_counter: i32,
}

impl TrackingMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the current tracking state. Returns whether tracking was just lost.
    pub fn update(&mut self, tracking: bool) -> bool {
        let lost = self.tracking && !tracking;
        if lost {
            self.lost_counter = self.lost_counter.saturating_add(1);
            warn!("Tracking lost, {} times since start", self.lost_counter);
        }
        self.tracking = tracking;
        lost
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn lost_counter(&self) -> i32 {
        self.lost_counter
    }
}
