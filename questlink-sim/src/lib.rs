// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Simulated controller and device talking through a fabric server

use anyhow::{Context, Error};
use log::LevelFilter;
use questlink::com::SocketFabric;
use questlink::configuration::device::FieldBounds;
use questlink::configuration::DEFAULT_FABRIC_ADDRESS;
use questlink::pose::Pose2d;
use rand::Rng;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Initialize logging. `RUST_LOG` applies unless a level is given.
pub fn init_logging(level: Option<LevelFilter>) {
    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = level {
        logger.filter_level(level);
    }
    logger.init();
}

/// Connect to the fabric server at `address`, or at the default address
pub fn connect(address: Option<SocketAddr>) -> Result<Arc<SocketFabric>, Error> {
    let address = match address {
        Some(address) => address,
        None => DEFAULT_FABRIC_ADDRESS
            .parse()
            .context("invalid default address")?,
    };
    let fabric = SocketFabric::connect(address)
        .with_context(|| format!("failed to connect to fabric server at {address}"))?;
    Ok(Arc::new(fabric))
}

/// Loop period for a rate in Hz
pub fn period(rate_hz: u32) -> Duration {
    Duration::from_secs(1) / rate_hz.max(1)
}

/// Random pose on the field
pub fn random_pose<R: Rng>(rng: &mut R, bounds: &FieldBounds) -> Pose2d {
    Pose2d::new(
        rng.gen_range(0.0..=bounds.length),
        rng.gen_range(0.0..=bounds.width),
        rng.gen_range(-180.0..180.0),
    )
}

/// Pose drifting randomly within the field, emulating a robot driving around
#[derive(Debug)]
pub struct RandomWalk {
    pose: Pose2d,
    bounds: FieldBounds,
    /// Maximal change of position per step in meters
    max_step: f64,
    /// Maximal change of heading per step in degrees
    max_turn: f64,
}

impl RandomWalk {
    pub fn new(start: Pose2d, bounds: FieldBounds, max_step: f64, max_turn: f64) -> Self {
        Self {
            pose: start,
            bounds,
            max_step,
            max_turn,
        }
    }

    pub fn pose(&self) -> Pose2d {
        self.pose
    }

    /// Jump to `pose`, e.g. after a pose reset
    pub fn reset(&mut self, pose: Pose2d) {
        self.pose = pose;
    }

    pub fn step<R: Rng>(&mut self, rng: &mut R) -> Pose2d {
        let x = random_walk_float(rng, self.pose.x(), self.max_step).clamp(0.0, self.bounds.length);
        let y = random_walk_float(rng, self.pose.y(), self.max_step).clamp(0.0, self.bounds.width);
        let heading = wrap_degrees(random_walk_float(rng, self.pose.heading_deg(), self.max_turn));
        self.pose = Pose2d::new(x, y, heading);
        self.pose
    }
}

fn random_walk_float<R: Rng>(rng: &mut R, previous: f64, max_delta: f64) -> f64 {
    if max_delta <= 0.0 {
        return previous;
    }
    previous + rng.gen_range(-max_delta..=max_delta)
}

/// Wrap an angle into [-180, 180)
fn wrap_degrees(degrees: f64) -> f64 {
    (degrees + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod test {
    use super::{period, random_pose, wrap_degrees, RandomWalk};
    use questlink::configuration::device::FieldBounds;
    use questlink::pose::Pose2d;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;

    #[test]
    fn walk_stays_on_field() {
        let mut rng = StdRng::seed_from_u64(7);
        let bounds = FieldBounds::DEFAULT;
        let mut walk = RandomWalk::new(Pose2d::new(0.1, 8.0, 179.0), bounds, 0.5, 20.0);
        for _ in 0..1000 {
            let pose = walk.step(&mut rng);
            assert!(bounds.contains(&pose), "{pose} left the field");
            assert!((-180.0..180.0).contains(&pose.heading_deg()));
        }
    }

    #[test]
    fn reset_moves_the_walk() {
        let mut walk = RandomWalk::new(Pose2d::ZERO, FieldBounds::DEFAULT, 0.0, 0.0);
        walk.reset(Pose2d::new(3.0, 4.0, 5.0));
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(walk.step(&mut rng), Pose2d::new(3.0, 4.0, 5.0));
    }

    #[test]
    fn random_poses_are_valid_reset_targets() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            assert!(FieldBounds::DEFAULT.contains(&random_pose(&mut rng, &FieldBounds::DEFAULT)));
        }
    }

    #[test]
    fn helpers() {
        assert_eq!(wrap_degrees(190.0), -170.0);
        assert_eq!(wrap_degrees(-180.0), -180.0);
        assert_eq!(wrap_degrees(180.0), -180.0);
        assert_eq!(period(100), Duration::from_millis(10));
        assert_eq!(period(0), Duration::from_secs(1));
    }
}
