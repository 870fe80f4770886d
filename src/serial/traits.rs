//! Serial port trait for abstraction and testability
//!
//! This trait defines the interface for the half-duplex RS-485 bus,
//! allowing the actual UART driver to be swapped with a mock for testing.

use core::future::Future;

/// Errors that can occur during serial operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialError {
    /// Framing error in received data
    FramingError,
    /// Buffer overflow
    OverflowError,
    /// Operation timed out
    Timeout,
    /// Write error
    WriteError,
}

/// Abstract serial port interface for testability
pub trait SerialPort {
    /// Read whatever bytes are already buffered
    ///
    /// Never waits for data: returns `Ok(0)` when nothing has arrived, so the
    /// caller owns the polling deadline.
    fn read(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<usize, SerialError>>;

    /// Write all bytes from buffer
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<(), SerialError>>;

    /// Wait until written bytes have left the transmitter
    fn flush(&mut self) -> impl Future<Output = Result<(), SerialError>>;
}
