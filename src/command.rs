//! Command frames understood by the base station's BLE command characteristic.

use std::fmt;

use uuid::Uuid;

/// GATT characteristic that accepts [`CommandFrame`] writes.
pub const COMMAND_CHARACTERISTIC: Uuid = Uuid::from_u128(0x0000cb01_0000_1000_8000_00805f9b34fb);

pub const WAKE_NO_TIMEOUT: u16 = 0x1200;
pub const WAKE_DEFAULT_TIMEOUT: u16 = 0x1201;
pub const WAKE_EXPLICIT_TIMEOUT: u16 = 0x1202;

/// Station id addressing every base station in range. Only valid for wake-up.
pub const BROADCAST_STATION: u32 = 0xFFFF_FFFF;

/// Keep-alive timeout the station is refreshed with unless configured otherwise.
pub const DEFAULT_TIMEOUT_SECS: u16 = 30;

pub const FRAME_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandFrame([u8; FRAME_LEN]);

impl CommandFrame {
    /// Wakes every station and lets it fall back to its own default timeout.
    pub fn wake_up() -> Self {
        encode(WAKE_DEFAULT_TIMEOUT, 0, BROADCAST_STATION)
    }

    /// Pushes the inactivity timeout of a single station `timeout_secs` into the future.
    pub fn refresh(timeout_secs: u16, station_id: u32) -> Self {
        encode(WAKE_EXPLICIT_TIMEOUT, timeout_secs, station_id)
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }
}

/// Builds a frame: command id and timeout are big-endian, the station id is little-endian.
/// The mixed byte order is what the firmware expects.
pub fn encode(command_id: u16, timeout_secs: u16, station_id: u32) -> CommandFrame {
    let mut frame = [0; FRAME_LEN];

    frame[0..2].copy_from_slice(&command_id.to_be_bytes());
    frame[2..4].copy_from_slice(&timeout_secs.to_be_bytes());
    frame[4..8].copy_from_slice(&station_id.to_le_bytes());

    CommandFrame(frame)
}

impl fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wake_up_matches_firmware_vector() {
        let frame = encode(0x1201, 0, 0xFFFF_FFFF);

        let mut expected = [0u8; FRAME_LEN];
        expected[..8].copy_from_slice(&[0x12, 0x01, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(frame.as_bytes(), &expected);
        assert_eq!(CommandFrame::wake_up(), frame);
    }

    #[test]
    fn refresh_matches_firmware_vector() {
        let frame = encode(0x1202, 30, 0x0000_0007);

        let mut expected = [0u8; FRAME_LEN];
        expected[..8].copy_from_slice(&[0x12, 0x02, 0x00, 0x1E, 0x07, 0x00, 0x00, 0x00]);
        assert_eq!(frame.as_bytes(), &expected);
        assert_eq!(CommandFrame::refresh(30, 7), frame);
    }

    #[test]
    fn fields_keep_their_byte_order() {
        let cases = [
            (0u16, 0u16, 0u32),
            (WAKE_NO_TIMEOUT, u16::MAX, 0x1234_5678),
            (u16::MAX, 1, u32::MAX),
            (0xABCD, 0x0102, 0xDEAD_BEEF),
        ];

        for (command, timeout, station) in cases {
            let bytes = encode(command, timeout, station).as_bytes().to_owned();

            assert_eq!(bytes.len(), FRAME_LEN);
            assert_eq!(u16::from_be_bytes([bytes[0], bytes[1]]), command);
            assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), timeout);
            assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), station);
            assert!(bytes[8..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn encoding_is_deterministic() {
        assert_eq!(encode(0x1202, 45, 99), encode(0x1202, 45, 99));
    }

    #[test]
    fn displays_as_lowercase_hex() {
        assert_eq!(
            CommandFrame::refresh(30, 7).to_string(),
            "1202001e07000000000000000000000000000000"
        );
    }

    #[test]
    fn characteristic_uuid() {
        assert_eq!(
            COMMAND_CHARACTERISTIC.to_string(),
            "0000cb01-0000-1000-8000-00805f9b34fb"
        );
    }
}
