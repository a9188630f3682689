// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Last-value fabric server for questlink controllers and devices

use anyhow::{Context, Error};
use argh::FromArgs;
use log::{info, LevelFilter};
use std::net::SocketAddr;
use tokio::runtime;

#[derive(FromArgs)]
#[argh(help_triggers("-h", "--help", "help"))]
/// Fabric server arguments
struct Args {
    #[argh(description = "address to bind to")]
    #[argh(option, short = 'b')]
    bind: Option<SocketAddr>,

    #[argh(description = "log level")]
    #[argh(option, short = 'l')]
    log_level: Option<LevelFilter>,
}

fn main() -> Result<(), Error> {
    let Args { bind, log_level } = argh::from_env();

    // RUST_LOG applies unless a level is given on the command line
    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = log_level {
        logger.filter_level(level);
    }
    logger.init();

    let address = match bind {
        Some(address) => address,
        None => fabricd::DEFAULT_FABRIC_ADDRESS
            .parse()
            .context("invalid default address")?,
    };

    info!("Starting fabricd");

    runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()?
        .block_on(fabricd::run(address))
}
