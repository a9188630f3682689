// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;

/// Field-relative 2D pose: position in meters, heading in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose2d {
    x: f64,
    y: f64,
    heading_deg: f64,
}

impl Pose2d {
    /// The origin with zero heading. Also what accessors return when no frame was published.
    pub const ZERO: Pose2d = Pose2d::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, heading_deg: f64) -> Self {
        Self { x, y, heading_deg }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn heading_deg(&self) -> f64 {
        self.heading_deg
    }

    pub fn heading_rad(&self) -> f64 {
        self.heading_deg.to_radians()
    }

    /// Whether all components are finite numbers
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.heading_deg.is_finite()
    }
}

impl Display for Pose2d {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({:.3}, {:.3}, {:.1}deg)",
            self.x, self.y, self.heading_deg
        )
    }
}

#[cfg(test)]
mod test {
    use super::Pose2d;

    #[test]
    fn finite_check() {
        assert!(Pose2d::new(1.0, 2.0, 90.0).is_finite());
        assert!(!Pose2d::new(f64::NAN, 2.0, 90.0).is_finite());
        assert!(!Pose2d::new(1.0, f64::INFINITY, 90.0).is_finite());
    }

    #[test]
    fn display() {
        assert_eq!(Pose2d::new(1.0, 2.5, 90.0).to_string(), "(1.000, 2.500, 90.0deg)");
        assert_eq!(Pose2d::ZERO, Pose2d::default());
    }
}
