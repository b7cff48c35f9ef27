use std::{fmt, path::Path, str::FromStr};

use bleasy::BDAddr;
use ini::Ini;
use log::debug;
use thiserror::Error;

use crate::command::DEFAULT_TIMEOUT_SECS;

const STATION_SECTION: &str = "BaseStation";
const HEADSET_SECTION: &str = "HeadSet";

const ADDRESS_KEY: &str = "B_MAC_ADDRESS";
const STATION_ID_KEY: &str = "B_UNIQUE_ID";
const VENDOR_ID_KEY: &str = "USB_VENDOR_ID";

/// Bluetooth address of a base station, `AA:BB:CC:DD:EE:FF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceAddress(BDAddr);

impl DeviceAddress {
    pub fn bd_addr(&self) -> BDAddr {
        self.0
    }
}

impl FromStr for DeviceAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse()
            .map(Self)
            .map_err(|err| ConfigError::InvalidAddress {
                value: s.to_owned(),
                reason: format!("{err}"),
            })
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Everything the keep-alive loop needs, fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub address: DeviceAddress,
    pub station_id: u32,
    pub vendor_id: u16,
    /// Skip USB presence detection and assume the headset is always connected.
    pub bypass_usb: bool,
    /// Timeout written into every refresh command.
    pub timeout_secs: u16,
}

impl Configuration {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let ini = Ini::load_from_file(path).map_err(|err| ConfigError::Read {
            path: path.display().to_string(),
            source: err,
        })?;

        Self::from_ini(&ini)
    }

    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let address = require(ini, STATION_SECTION, ADDRESS_KEY)?;
        let station_id = require(ini, STATION_SECTION, STATION_ID_KEY)?;
        let vendor_id = require(ini, HEADSET_SECTION, VENDOR_ID_KEY)?;

        debug!("CONFIG : {ADDRESS_KEY} = {address}");
        debug!("CONFIG : {STATION_ID_KEY} = {station_id}");
        debug!("CONFIG : {VENDOR_ID_KEY} = {vendor_id}");

        Ok(Self {
            address: address.parse()?,
            station_id: parse_int(STATION_ID_KEY, station_id)?,
            vendor_id: parse_int(VENDOR_ID_KEY, vendor_id)?,
            bypass_usb: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }
}

fn require<'a>(ini: &'a Ini, section: &'static str, key: &'static str) -> Result<&'a str, ConfigError> {
    ini.get_from(Some(section), key)
        .map(str::trim)
        .ok_or(ConfigError::MissingKey { section, key })
}

/// Parses an integer the way the configuration file has always been written:
/// decimal, or with a `0x`, `0o` or `0b` prefix. Underscores may only separate digits
/// (or follow the prefix), and decimal numbers other than zero have no leading zeros.
fn parse_int<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: TryFrom<u64>,
{
    let invalid = |reason: &str| ConfigError::InvalidInteger {
        key,
        value: value.to_owned(),
        reason: reason.to_owned(),
    };

    let lower = value.to_ascii_lowercase();
    let (radix, body) = match lower.get(..2) {
        Some("0x") => (16, lower[2..].strip_prefix('_').unwrap_or(&lower[2..])),
        Some("0o") => (8, lower[2..].strip_prefix('_').unwrap_or(&lower[2..])),
        Some("0b") => (2, lower[2..].strip_prefix('_').unwrap_or(&lower[2..])),
        _ => (10, lower.as_str()),
    };

    if body.is_empty() {
        return Err(invalid("no digits"));
    }
    if body.starts_with('_') || body.ends_with('_') || body.contains("__") {
        return Err(invalid("underscores must sit between digits"));
    }

    let digits: String = body.chars().filter(|&c| c != '_').collect();
    if !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid("invalid digit"));
    }
    if radix == 10 && digits.starts_with('0') && digits.bytes().any(|b| b != b'0') {
        return Err(invalid("leading zeros in a decimal number, use a 0o prefix for octal"));
    }

    let wide = u64::from_str_radix(&digits, radix).map_err(|err| invalid(&err.to_string()))?;
    T::try_from(wide).map_err(|_| invalid("value out of range"))
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read `{path}`: {source}")]
    Read {
        path: String,
        #[source]
        source: ini::Error,
    },
    #[error("missing key `{key}` in section [{section}]")]
    MissingKey {
        section: &'static str,
        key: &'static str,
    },
    #[error("`{key}` = `{value}` is not a valid integer: {reason}")]
    InvalidInteger {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("`{value}` is not a bluetooth address (expected AA:BB:CC:DD:EE:FF): {reason}")]
    InvalidAddress { value: String, reason: String },
}
