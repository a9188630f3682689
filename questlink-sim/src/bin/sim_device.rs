// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Simulated tracking device
//!
//! Publishes a randomly drifting pose at the frame rate, and battery and tracking status at a
//! tenth of it. Tracking drops out now and then. Pose resets from the controller move the
//! simulated pose.

use anyhow::{Context, Error};
use argh::FromArgs;
use log::{debug, info, LevelFilter};
use questlink::configuration::device::{self, FieldBounds};
use questlink::pose::Pose2d;
use questlink_sim::{connect, init_logging, period, RandomWalk};
use rand::Rng;
use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

/// Default frame rate in Hz
const DEFAULT_RATE_HZ: u32 = 100;
/// Status is published every this many frames
const STATUS_DIVIDER: i32 = 10;
/// Chance per status update to lose tracking
const TRACKING_LOSS_PROBABILITY: f64 = 0.005;
/// Chance per status update to regain tracking
const TRACKING_RECOVERY_PROBABILITY: f64 = 0.3;

#[derive(FromArgs)]
#[argh(help_triggers("-h", "--help", "help"))]
/// Simulated device arguments
struct Args {
    #[argh(description = "address of the fabric server")]
    #[argh(option, short = 'c')]
    connect: Option<SocketAddr>,

    #[argh(description = "frame rate in Hz")]
    #[argh(option, short = 'r')]
    rate: Option<u32>,

    #[argh(description = "run duration in seconds")]
    #[argh(option, short = 'd')]
    duration: Option<u64>,

    #[argh(description = "log level")]
    #[argh(option, short = 'l')]
    log_level: Option<LevelFilter>,
}

fn main() -> Result<(), Error> {
    let Args {
        connect: address,
        rate,
        duration,
        log_level,
    } = argh::from_env();
    init_logging(log_level);

    info!("Starting sim_device");

    let fabric = connect(address)?;
    let walk = Rc::new(RefCell::new(RandomWalk::new(
        Pose2d::new(8.0, 4.0, 0.0),
        FieldBounds::DEFAULT,
        0.01,
        0.5,
    )));
    let reset_walk = walk.clone();
    let mut device = device::Builder::default()
        .fabric(fabric)
        .pose_reset_handler(move |target: Pose2d| {
            reset_walk.borrow_mut().reset(target);
            Ok::<(), String>(())
        })
        .build()
        .context("failed to create device")?;

    let period = period(rate.unwrap_or(DEFAULT_RATE_HZ));
    let deadline = duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    let start = Instant::now();
    let mut rng = rand::thread_rng();
    let mut tracking = true;
    let mut battery = 100.0_f64;
    let mut frame_count: i32 = 0;
    let mut next = Instant::now();

    while deadline.map_or(true, |deadline| Instant::now() < deadline) {
        device.process_commands().context("failed to process commands")?;

        frame_count = frame_count.wrapping_add(1);
        let pose = walk.borrow_mut().step(&mut rng);
        if tracking {
            device
                .publish_frame(frame_count, start.elapsed().as_secs_f64(), pose)
                .context("failed to publish frame")?;
        }

        if frame_count % STATUS_DIVIDER == 0 {
            tracking = if tracking {
                !rng.gen_bool(TRACKING_LOSS_PROBABILITY)
            } else {
                rng.gen_bool(TRACKING_RECOVERY_PROBABILITY)
            };
            if device.update_tracking(tracking) {
                debug!("Simulated tracking loss at frame {frame_count}");
            }
            battery = (battery - 0.001).max(0.0);
            device
                .publish_device_data(battery.round() as i32)
                .context("failed to publish device data")?;
        }

        next += period;
        thread::sleep(next.saturating_duration_since(Instant::now()));
    }

    info!("sim_device done after {frame_count} frames");
    Ok(())
}
