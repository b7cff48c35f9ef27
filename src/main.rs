use std::{path::PathBuf, process, time::Duration};

use clap::Parser;
use ftail::Ftail;
use log::{error, info, LevelFilter};

mod command;
mod config;
mod headset;
mod keepalive;
mod lighthouse;

use config::Configuration;
use headset::UsbHeadset;
use keepalive::{KeepAlive, ThreadSleeper};
use lighthouse::Lighthouse;

/// Keeps a base station awake for as long as the headset is plugged in.
#[derive(Parser, Debug)]
#[command(name = "bs-keepalive", version, long_about = None)]
struct Args {
    /// INI file holding the station address, station id and headset vendor id
    #[arg(short, long, default_value = "configuration.ini")]
    config: PathBuf,

    /// Disable the USB search for the headset
    #[arg(long, alias = "debug_ignore_usb")]
    debug_ignore_usb: bool,

    /// Timeout in seconds sent with every refresh
    #[arg(long, default_value_t = command::DEFAULT_TIMEOUT_SECS, value_parser = clap::value_parser!(u16).range(1..))]
    timeout: u16,

    /// Upper bound in seconds for each bluetooth step (scan, write, disconnect)
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    ble_timeout: u64,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Also write daily log files into this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let mut logger = Ftail::new().console(level);
    if let Some(dir) = &args.log_dir {
        let dir = dir.to_string_lossy().into_owned();
        logger = logger.daily_file(&dir, level);
    }
    if let Err(err) = logger.init() {
        eprintln!("failed to set up logging: {err:?}");
        process::exit(1);
    }

    let mut config = match Configuration::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            error!("invalid configuration: {err}");
            process::exit(1);
        }
    };
    config.bypass_usb = args.debug_ignore_usb;
    config.timeout_secs = args.timeout;

    let headset = if config.bypass_usb {
        info!("USB presence check disabled");
        UsbHeadset::bypassed(config.vendor_id)
    } else {
        UsbHeadset::new(config.vendor_id)
    };

    let lighthouse = match Lighthouse::new(Duration::from_secs(args.ble_timeout)) {
        Ok(lighthouse) => lighthouse,
        Err(err) => {
            error!("failed to start the bluetooth runtime: {err}");
            process::exit(1);
        }
    };

    info!(
        "keeping station {:#010x} at {} awake, refresh timeout {}s",
        config.station_id, config.address, config.timeout_secs
    );

    KeepAlive::new(&config, headset, lighthouse, ThreadSleeper).run()
}
