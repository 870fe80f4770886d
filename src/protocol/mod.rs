pub mod client;
pub mod modbus;

pub use client::ProtocolClient;
pub use modbus::{crc16, ProtocolError, REQUEST};
