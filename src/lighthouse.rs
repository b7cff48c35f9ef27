//! Sending command frames to a base station over BLE.

use std::{future::Future, io, time::Duration};

use bleasy::{BDAddr, Device, ScanConfig, Scanner};
use futures::StreamExt;
use log::{debug, warn};
use thiserror::Error;
use tokio::runtime::{self, Runtime};

use crate::{
    command::{CommandFrame, COMMAND_CHARACTERISTIC},
    config::DeviceAddress,
};

pub trait Transport {
    /// Delivers one frame. Either the whole write succeeded or an error is returned.
    fn send_command(&mut self, address: &DeviceAddress, frame: &CommandFrame) -> Result<(), TransportError>;
}

/// A connected station that can take a frame and be let go of.
trait Station {
    async fn send_frame(&self, frame: &CommandFrame) -> Result<(), TransportError>;

    async fn release(&self) -> Result<(), TransportError>;
}

impl Station for Device {
    async fn send_frame(&self, frame: &CommandFrame) -> Result<(), TransportError> {
        let characteristic = self
            .characteristic(COMMAND_CHARACTERISTIC)
            .await?
            .ok_or(TransportError::MissingCharacteristic)?;

        characteristic.write_command(frame.as_bytes()).await?;

        Ok(())
    }

    async fn release(&self) -> Result<(), TransportError> {
        Ok(self.disconnect().await?)
    }
}

/// Connects to the station for every command and disconnects right after.
pub struct Lighthouse {
    runtime: Runtime,
    stage_timeout: Duration,
}

impl Lighthouse {
    /// `stage_timeout` bounds discovery, the write and the disconnect separately.
    pub fn new(stage_timeout: Duration) -> io::Result<Self> {
        let runtime = runtime::Builder::new_current_thread().enable_all().build()?;

        Ok(Self { runtime, stage_timeout })
    }
}

impl Transport for Lighthouse {
    fn send_command(&mut self, address: &DeviceAddress, frame: &CommandFrame) -> Result<(), TransportError> {
        let address = address.bd_addr();

        self.runtime
            .block_on(deliver(self.stage_timeout, address, find(address), frame))
    }
}

/// Acquires the station, writes `frame` and releases the station again whatever the
/// write did. The caller gets the outcome of the write.
async fn deliver<S, A>(limit: Duration, address: BDAddr, acquire: A, frame: &CommandFrame) -> Result<(), TransportError>
where
    S: Station,
    A: Future<Output = Result<S, TransportError>>,
{
    let station = bounded(limit, acquire).await?;

    let written = bounded(limit, station.send_frame(frame)).await;

    match bounded(limit, station.release()).await {
        Ok(()) => debug!("disconnected from {address}"),
        Err(err) => warn!("failed to disconnect from {address}: {err}"),
    }

    written
}

async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(limit)),
    }
}

async fn find(address: BDAddr) -> Result<Device, TransportError> {
    let config = ScanConfig::default()
        .filter_by_address(move |found| found == address)
        .stop_after_first_match();

    let mut scanner = Scanner::new();
    scanner.start(config).await?;

    let mut devices = scanner.device_stream();
    let device = devices.next().await;

    // Discovery must not keep running while we connect and write.
    if let Err(err) = scanner.stop().await {
        debug!("stopping scan: {err}");
    }

    device.ok_or(TransportError::NotFound(address))
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("bluetooth: {0}")]
    Ble(#[from] bleasy::Error),
    #[error("no base station advertising as {0}")]
    NotFound(BDAddr),
    #[error("station does not expose the command characteristic")]
    MissingCharacteristic,
    #[error("gave up after {0:?}")]
    Timeout(Duration),
}
