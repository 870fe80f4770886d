//! MODBUS RTU framing for the single-register irradiance query
//!
//! # Request (8 bytes)
//!
//! ```text
//! [slave][function][reg_hi][reg_lo][count_hi][count_lo][crc_lo][crc_hi]
//! ```
//!
//! # Response (7 bytes)
//!
//! ```text
//! [slave][function][byte_count][value_hi][value_lo][crc_lo][crc_hi]
//! ```
//!
//! # CRC Calculation
//!
//! CRC-16/MODBUS: reflected polynomial 0xA001 applied LSB-first, seed 0xFFFF,
//! transmitted little-endian. The request never varies, so its CRC is
//! computed at compile time.

use crate::config::protocol::{
    FUNCTION_CODE, REGISTER_ADDRESS, REGISTER_COUNT, REQUEST_LEN, RESPONSE_LEN, SLAVE_ADDRESS,
};
use crate::serial::SerialError;
use crc::{Crc, CRC_16_MODBUS};

const CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Errors from one request/response transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer than seven bytes arrived before the deadline
    Timeout,
    /// Response CRC does not match its first five bytes
    CrcMismatch,
    /// The request could not be written
    Bus(SerialError),
}

/// Calculate CRC-16/MODBUS
pub const fn crc16(data: &[u8]) -> u16 {
    CRC.checksum(data)
}

/// The fixed read request, CRC included
pub const REQUEST: [u8; REQUEST_LEN] = build_request();

const fn build_request() -> [u8; REQUEST_LEN] {
    let [reg_hi, reg_lo] = REGISTER_ADDRESS.to_be_bytes();
    let [count_hi, count_lo] = REGISTER_COUNT.to_be_bytes();
    let body = [SLAVE_ADDRESS, FUNCTION_CODE, reg_hi, reg_lo, count_hi, count_lo];
    let [crc_lo, crc_hi] = crc16(&body).to_le_bytes();

    [
        body[0], body[1], body[2], body[3], body[4], body[5], crc_lo, crc_hi,
    ]
}

/// Validate a complete response and extract the register value
pub fn parse_response(frame: &[u8; RESPONSE_LEN]) -> Result<u16, ProtocolError> {
    let received_crc = u16::from_le_bytes([frame[5], frame[6]]);
    if crc16(&frame[..5]) != received_crc {
        return Err(ProtocolError::CrcMismatch);
    }

    Ok(u16::from_be_bytes([frame[3], frame[4]]))
}

/// Build a response as the sensor would send it (for tests and simulators)
pub fn build_response(value: u16) -> [u8; RESPONSE_LEN] {
    let [value_hi, value_lo] = value.to_be_bytes();
    let body = [SLAVE_ADDRESS, FUNCTION_CODE, 0x02, value_hi, value_lo];
    let [crc_lo, crc_hi] = crc16(&body).to_le_bytes();

    [body[0], body[1], body[2], body[3], body[4], crc_lo, crc_hi]
}
