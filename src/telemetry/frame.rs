//! Fixed-layout binary telemetry frame
//!
//! # Frame Format
//!
//! ```text
//! [reading: u16][battery_mv: u16][temp_dc: i16][uptime_s: u32][checksum: u8]
//! ```
//!
//! - All multi-byte fields are little-endian.
//! - `temp_dc`: internal temperature in tenths of a degree Celsius.
//! - `checksum`: sum of bytes 0-9 modulo 256.
//!
//! The codec does no range validation; out-of-range readings and the
//! sentinel pass through unchanged.

use crate::telemetry::SensorReading;

/// Encoded frame length in bytes
pub const FRAME_LEN: usize = 11;

/// Errors when parsing a received frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Input is not exactly one frame long
    Length,
    /// Trailing byte does not match the sum of the fields
    Checksum,
}

/// One telemetry record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryFrame {
    pub reading: SensorReading,
    pub battery_mv: u16,
    pub temp_dc: i16,
    pub uptime_s: u32,
}

impl TelemetryFrame {
    /// Pack the fields and append the checksum
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut out = [0u8; FRAME_LEN];
        out[0..2].copy_from_slice(&self.reading.raw().to_le_bytes());
        out[2..4].copy_from_slice(&self.battery_mv.to_le_bytes());
        out[4..6].copy_from_slice(&self.temp_dc.to_le_bytes());
        out[6..10].copy_from_slice(&self.uptime_s.to_le_bytes());
        out[10] = checksum(&out[..10]);
        out
    }

    /// Parse a frame, verifying its checksum
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() != FRAME_LEN {
            return Err(FrameError::Length);
        }
        if checksum(&bytes[..10]) != bytes[10] {
            return Err(FrameError::Checksum);
        }

        Ok(Self {
            reading: SensorReading::from_raw(u16::from_le_bytes([bytes[0], bytes[1]])),
            battery_mv: u16::from_le_bytes([bytes[2], bytes[3]]),
            temp_dc: i16::from_le_bytes([bytes[4], bytes[5]]),
            uptime_s: u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]),
        })
    }
}

/// 8-bit wrapping sum
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}
