//! Request/response client for the RS-485 irradiance sensor
//!
//! One transaction drains stray bytes, writes the fixed request, waits a
//! guard interval for the half-duplex line to turn around, then busy-polls
//! for the seven-byte response until a deadline.

use crate::config::protocol::{GUARD_MS, RESPONSE_LEN, RESPONSE_TIMEOUT_US};
use crate::power::Clock;
use crate::protocol::modbus::{parse_response, ProtocolError, REQUEST};
use crate::serial::SerialPort;
use crate::telemetry::SensorReading;

/// Client for the single-register read transaction
///
/// Holds no bus state of its own; no retries happen inside a transaction.
pub struct ProtocolClient;

impl ProtocolClient {
    /// Create a new protocol client
    pub fn new() -> Self {
        Self
    }

    /// Discard leftovers, write the request and wait for the line to settle
    pub async fn send<S: SerialPort, C: Clock>(
        &self,
        serial: &mut S,
        clock: &mut C,
    ) -> Result<(), ProtocolError> {
        let discarded = self.discard_input(serial).await;
        if discarded > 0 {
            log::debug!("protocol: discarded {} stray bytes", discarded);
        }

        serial.write(&REQUEST).await.map_err(ProtocolError::Bus)?;
        serial.flush().await.map_err(ProtocolError::Bus)?;

        clock.delay_ms(GUARD_MS).await;
        Ok(())
    }

    /// Poll for a complete response and validate it
    pub async fn receive<S: SerialPort, C: Clock>(
        &self,
        serial: &mut S,
        clock: &mut C,
    ) -> Result<u16, ProtocolError> {
        let mut response = [0u8; RESPONSE_LEN];
        let mut received = 0;
        let start = clock.now_us();

        while received < RESPONSE_LEN {
            if clock.now_us().saturating_sub(start) >= RESPONSE_TIMEOUT_US {
                log::debug!("protocol: timeout after {} of {} bytes", received, RESPONSE_LEN);
                return Err(ProtocolError::Timeout);
            }

            match serial.read(&mut response[received..]).await {
                Ok(n) => received += n,
                // Line noise; whatever is missing shows up as timeout or CRC failure
                Err(e) => log::debug!("protocol: read error {:?}", e),
            }
        }

        parse_response(&response)
    }

    /// One full transaction
    pub async fn transact<S: SerialPort, C: Clock>(
        &self,
        serial: &mut S,
        clock: &mut C,
    ) -> Result<u16, ProtocolError> {
        self.send(serial, clock).await?;
        self.receive(serial, clock).await
    }

    /// One transaction, failures collapsed to the sentinel
    pub async fn read<S: SerialPort, C: Clock>(&self, serial: &mut S, clock: &mut C) -> SensorReading {
        let result = self.transact(serial, clock).await;
        if let Err(e) = result {
            log::debug!("protocol: transaction failed: {:?}", e);
        }
        SensorReading::from(result)
    }

    /// Average of up to `samples` independent transactions
    ///
    /// Only valid results are averaged. The sentinel is returned only if
    /// every transaction failed.
    pub async fn read_averaged<S: SerialPort, C: Clock>(
        &self,
        serial: &mut S,
        clock: &mut C,
        samples: u8,
        spacing_ms: u32,
    ) -> SensorReading {
        let mut sum: u32 = 0;
        let mut valid: u32 = 0;

        for i in 0..samples.max(1) {
            if i > 0 {
                clock.delay_ms(spacing_ms).await;
            }

            let reading = self.read(serial, clock).await;
            if !reading.is_sentinel() {
                sum += reading.raw() as u32;
                valid += 1;
            }
        }

        if valid == 0 {
            return SensorReading::SENTINEL;
        }
        SensorReading::from_raw((sum / valid) as u16)
    }

    /// Drain bytes left over from an earlier, incomplete transaction
    async fn discard_input<S: SerialPort>(&self, serial: &mut S) -> usize {
        let mut scratch = [0u8; 16];
        let mut discarded = 0;

        loop {
            match serial.read(&mut scratch).await {
                Ok(0) => return discarded,
                Ok(n) => discarded += n,
                Err(_) => return discarded,
            }
        }
    }
}

impl Default for ProtocolClient {
    fn default() -> Self {
        Self::new()
    }
}
