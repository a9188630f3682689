// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Simulated robot controller
//!
//! Periodically resets the device pose to a random position, reports command outcomes and link
//! state changes, and logs a status line once per second.

use anyhow::{Context, Error};
use argh::FromArgs;
use log::{info, warn, LevelFilter};
use questlink::configuration::controller;
use questlink::configuration::device::FieldBounds;
use questlink::correlator::CommandOutcome;
use questlink_sim::{connect, init_logging, period, random_pose};
use std::net::SocketAddr;
use std::thread;
use std::time::{Duration, Instant};

/// Default loop rate in Hz
const DEFAULT_RATE_HZ: u32 = 50;
/// Default interval between pose resets in seconds
const DEFAULT_RESET_INTERVAL: u64 = 5;
const STATUS_INTERVAL: Duration = Duration::from_secs(1);

#[derive(FromArgs)]
#[argh(help_triggers("-h", "--help", "help"))]
/// Simulated controller arguments
struct Args {
    #[argh(description = "address of the fabric server")]
    #[argh(option, short = 'c')]
    connect: Option<SocketAddr>,

    #[argh(description = "loop rate in Hz")]
    #[argh(option, short = 'r')]
    rate: Option<u32>,

    #[argh(description = "seconds between pose resets")]
    #[argh(option, short = 'p')]
    reset_interval: Option<u64>,

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
        reset_interval,
        duration,
        log_level,
    } = argh::from_env();
    init_logging(log_level);

    info!("Starting sim_controller");

    let fabric = connect(address)?;
    let mut controller = controller::Builder::default()
        .fabric(fabric)
        .build()
        .context("failed to create controller")?;

    let period = period(rate.unwrap_or(DEFAULT_RATE_HZ));
    let reset_interval = Duration::from_secs(reset_interval.unwrap_or(DEFAULT_RESET_INTERVAL));
    let deadline = duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut rng = rand::thread_rng();
    let mut connected = false;
    let mut next_reset = Instant::now() + reset_interval;
    let mut next_status = Instant::now();
    let mut next = Instant::now();

    while deadline.map_or(true, |deadline| Instant::now() < deadline) {
        let now = Instant::now();

        match controller.command_responses() {
            Some(CommandOutcome::Succeeded(id)) => info!("Command {id} succeeded"),
            Some(CommandOutcome::Failed { id, message }) => {
                warn!("Command {id} failed: {message}")
            }
            None => (),
        }

        if controller.is_connected() != connected {
            connected = !connected;
            if connected {
                info!("Device connected, latency {:?}", controller.latency());
            } else {
                warn!("Device disconnected, last frame {:?} ago", controller.latency());
            }
        }

        if now >= next_reset {
            let target = random_pose(&mut rng, &FieldBounds::DEFAULT);
            let id = controller.set_pose(target).context("failed to issue pose reset")?;
            info!("Issued pose reset {id} to {target}");
            next_reset = now + reset_interval;
        }

        if now >= next_status {
            let frame = controller.latest_frame();
            info!(
                "frame {} pose {} latency {:?} battery {}% tracking {} losses {}",
                frame.frame_count,
                frame.pose,
                controller.latency(),
                controller.battery_percent(),
                controller.is_tracking(),
                controller.tracking_lost_counter()
            );
            next_status = now + STATUS_INTERVAL;
        }

        next += period;
        thread::sleep(next.saturating_duration_since(Instant::now()));
    }

    info!("sim_controller done");
    Ok(())
}
