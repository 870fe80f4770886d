//! esp-hal UART adapter for the RS-485 bus

use crate::serial::traits::{SerialError, SerialPort};
use esp_hal::uart::{RxError, Uart};
use esp_hal::Blocking;

/// UART wired to an auto-direction RS-485 transceiver
pub struct UartPort<'d> {
    uart: Uart<'d, Blocking>,
}

impl<'d> UartPort<'d> {
    pub fn new(uart: Uart<'d, Blocking>) -> Self {
        Self { uart }
    }
}

fn rx_error(error: RxError) -> SerialError {
    match error {
        RxError::FifoOverflowed => SerialError::OverflowError,
        _ => SerialError::FramingError,
    }
}

impl SerialPort for UartPort<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        self.uart.read_buffered(buf).map_err(rx_error)
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), SerialError> {
        let mut written = 0;
        while written < data.len() {
            written += self
                .uart
                .write(&data[written..])
                .map_err(|_| SerialError::WriteError)?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SerialError> {
        self.uart.flush().map_err(|_| SerialError::WriteError)
    }
}
