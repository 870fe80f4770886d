//! SX1278 LoRa driver
//!
//! Register-level driver for the SX127x family in LoRa mode, implementing
//! the LoraRadio trait on top of an async SPI bus with manual chip select.

use crate::config::protocol::MAX_LORA_PAYLOAD;
use crate::lora::traits::{LoraConfig, LoraError, LoraRadio};
use embassy_time::{Duration, Instant, Timer};
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_async::spi::SpiBus;

/// SX127x register addresses
mod reg {
    pub const FIFO: u8 = 0x00;
    pub const OP_MODE: u8 = 0x01;
    pub const FRF_MSB: u8 = 0x06;
    pub const FRF_MID: u8 = 0x07;
    pub const FRF_LSB: u8 = 0x08;
    pub const PA_CONFIG: u8 = 0x09;
    pub const OCP: u8 = 0x0B;
    pub const LNA: u8 = 0x0C;
    pub const FIFO_ADDR_PTR: u8 = 0x0D;
    pub const FIFO_TX_BASE_ADDR: u8 = 0x0E;
    pub const FIFO_RX_BASE_ADDR: u8 = 0x0F;
    pub const IRQ_FLAGS: u8 = 0x12;
    pub const MODEM_CONFIG_1: u8 = 0x1D;
    pub const MODEM_CONFIG_2: u8 = 0x1E;
    pub const PREAMBLE_MSB: u8 = 0x20;
    pub const PREAMBLE_LSB: u8 = 0x21;
    pub const PAYLOAD_LENGTH: u8 = 0x22;
    pub const MODEM_CONFIG_3: u8 = 0x26;
    pub const SYNC_WORD: u8 = 0x39;
    pub const DIO_MAPPING_1: u8 = 0x40;
    pub const VERSION: u8 = 0x42;
    pub const PA_DAC: u8 = 0x4D;
}

/// Operating modes (with the LoRa bit set)
mod mode {
    pub const LONG_RANGE: u8 = 0x80;
    pub const SLEEP: u8 = 0x00;
    pub const STANDBY: u8 = 0x01;
    pub const TX: u8 = 0x03;
}

/// IRQ flags
mod irq {
    pub const TX_DONE: u8 = 0x08;
}

/// Silicon revision reported by SX1276/77/78/79
const EXPECTED_VERSION: u8 = 0x12;

/// Crystal frequency
const FXOSC_HZ: u64 = 32_000_000;

/// Upper bound on one transmission at SF12
const TX_TIMEOUT_MS: u64 = 10_000;

/// Control pins for SX1278
pub struct Sx1278Pins<Nss, Dio0, Nrst> {
    pub nss: Nss,
    pub dio0: Dio0,
    pub nrst: Nrst,
}

/// SX1278 LoRa driver
///
/// Implements the LoraRadio trait using dependency injection for SPI and GPIO pins.
/// Uses SpiBus trait with manual NSS control.
pub struct Sx1278Driver<Spi, Nss, Dio0, Nrst>
where
    Spi: SpiBus,
    Nss: OutputPin,
    Dio0: InputPin,
    Nrst: OutputPin,
{
    spi: Spi,
    nss: Nss,
    dio0: Dio0,
    nrst: Nrst,
    initialised: bool,
}

impl<Spi, Nss, Dio0, Nrst> Sx1278Driver<Spi, Nss, Dio0, Nrst>
where
    Spi: SpiBus,
    Nss: OutputPin,
    Dio0: InputPin,
    Nrst: OutputPin,
{
    /// Create a new SX1278 driver
    pub fn new(spi: Spi, pins: Sx1278Pins<Nss, Dio0, Nrst>) -> Self {
        Self {
            spi,
            nss: pins.nss,
            dio0: pins.dio0,
            nrst: pins.nrst,
            initialised: false,
        }
    }

    /// Reset the radio
    async fn reset(&mut self) {
        let _ = self.nrst.set_low();
        Timer::after(Duration::from_millis(10)).await;
        let _ = self.nrst.set_high();
        Timer::after(Duration::from_millis(10)).await;
    }

    /// Read a single register
    async fn read_register(&mut self, addr: u8) -> Result<u8, LoraError> {
        let tx_buf = [addr & 0x7F, 0x00];
        let mut rx_buf = [0u8; 2];

        let _ = self.nss.set_low();
        let result = self.spi.transfer(&mut rx_buf, &tx_buf).await;
        let _ = self.nss.set_high();

        result.map_err(|_| LoraError::SpiError)?;
        Ok(rx_buf[1])
    }

    /// Write a single register
    async fn write_register(&mut self, addr: u8, value: u8) -> Result<(), LoraError> {
        let _ = self.nss.set_low();
        let result = self.spi.write(&[addr | 0x80, value]).await;
        let _ = self.nss.set_high();

        result.map_err(|_| LoraError::SpiError)
    }

    /// Burst-write into the FIFO
    async fn write_fifo(&mut self, data: &[u8]) -> Result<(), LoraError> {
        let mut buf = [0u8; MAX_LORA_PAYLOAD + 1];
        buf[0] = reg::FIFO | 0x80;
        buf[1..1 + data.len()].copy_from_slice(data);

        let _ = self.nss.set_low();
        let result = self.spi.write(&buf[..1 + data.len()]).await;
        let _ = self.nss.set_high();

        result.map_err(|_| LoraError::SpiError)
    }

    async fn set_mode(&mut self, op: u8) -> Result<(), LoraError> {
        self.write_register(reg::OP_MODE, mode::LONG_RANGE | op)
            .await
    }

    /// Set RF frequency
    async fn set_frequency(&mut self, freq_hz: u32) -> Result<(), LoraError> {
        // Frf = freq_rf * 2^19 / 32MHz
        let frf = ((freq_hz as u64) << 19) / FXOSC_HZ;
        self.write_register(reg::FRF_MSB, (frf >> 16) as u8).await?;
        self.write_register(reg::FRF_MID, (frf >> 8) as u8).await?;
        self.write_register(reg::FRF_LSB, frf as u8).await
    }

    /// Set modulation parameters
    async fn set_modulation_params(&mut self, config: &LoraConfig) -> Result<(), LoraError> {
        if !(6..=12).contains(&config.spreading_factor) || !(5..=8).contains(&config.coding_rate)
        {
            return Err(LoraError::InvalidConfig);
        }

        let bw = match config.bandwidth_khz {
            7 | 8 => 0x00,   // 7.8 kHz
            10 => 0x01,      // 10.4 kHz
            15 | 16 => 0x02, // 15.6 kHz
            20 | 21 => 0x03, // 20.8 kHz
            31 => 0x04,      // 31.25 kHz
            41 | 42 => 0x05, // 41.7 kHz
            62 | 63 => 0x06, // 62.5 kHz
            125 => 0x07,     // 125 kHz
            250 => 0x08,     // 250 kHz
            500 => 0x09,     // 500 kHz
            _ => return Err(LoraError::InvalidConfig),
        };
        let cr = config.coding_rate - 4;

        // Explicit header
        self.write_register(reg::MODEM_CONFIG_1, (bw << 4) | (cr << 1))
            .await?;

        let config_2 = self.read_register(reg::MODEM_CONFIG_2).await?;
        self.write_register(
            reg::MODEM_CONFIG_2,
            (config_2 & 0x0F) | (config.spreading_factor << 4),
        )
        .await?;

        // Low data rate optimisation: required for SF11/SF12 at 125kHz, AGC auto on
        let ldro = if config.spreading_factor >= 11 && config.bandwidth_khz <= 125 {
            0x08
        } else {
            0x00
        };
        self.write_register(reg::MODEM_CONFIG_3, 0x04 | ldro).await
    }

    /// Set TX power on the PA_BOOST pin
    async fn set_tx_power(&mut self, power_dbm: i8) -> Result<(), LoraError> {
        let level = power_dbm.clamp(2, 20);

        if level > 17 {
            // High-power DAC adds 3 dB; needs a higher current limit
            self.write_register(reg::PA_DAC, 0x87).await?;
            self.set_current_limit(140).await?;
            self.write_register(reg::PA_CONFIG, 0x80 | (level - 5) as u8)
                .await
        } else {
            self.write_register(reg::PA_DAC, 0x84).await?;
            self.set_current_limit(100).await?;
            self.write_register(reg::PA_CONFIG, 0x80 | (level - 2) as u8)
                .await
        }
    }

    /// Set current limit (OCP - Over Current Protection)
    async fn set_current_limit(&mut self, current_ma: u8) -> Result<(), LoraError> {
        let trim = if current_ma <= 120 {
            (current_ma.saturating_sub(45)) / 5
        } else {
            (current_ma.saturating_sub(30) / 10).min(27)
        };
        self.write_register(reg::OCP, 0x20 | trim).await
    }

    /// Wait for DIO0 (mapped to TxDone) with timeout
    async fn wait_for_tx_done(&mut self) -> Result<u8, LoraError> {
        let deadline = Instant::now() + Duration::from_millis(TX_TIMEOUT_MS);

        loop {
            if self.dio0.is_high().unwrap_or(false) {
                return self.read_register(reg::IRQ_FLAGS).await;
            }

            if Instant::now() >= deadline {
                return Err(LoraError::Timeout);
            }

            Timer::after(Duration::from_micros(500)).await;
        }
    }
}

impl<Spi, Nss, Dio0, Nrst> LoraRadio for Sx1278Driver<Spi, Nss, Dio0, Nrst>
where
    Spi: SpiBus,
    Nss: OutputPin,
    Dio0: InputPin,
    Nrst: OutputPin,
{
    async fn init(&mut self) -> Result<(), LoraError> {
        let _ = self.nss.set_high();
        self.reset().await;

        let version = self.read_register(reg::VERSION).await?;
        if version != EXPECTED_VERSION {
            log::warn!("lora: unexpected silicon version 0x{:02X}", version);
            return Err(LoraError::NotDetected);
        }

        // Mode changes into LoRa are only accepted from sleep
        self.set_mode(mode::SLEEP).await?;

        self.write_register(reg::FIFO_TX_BASE_ADDR, 0x00).await?;
        self.write_register(reg::FIFO_RX_BASE_ADDR, 0x00).await?;

        // LNA boost
        let lna = self.read_register(reg::LNA).await?;
        self.write_register(reg::LNA, lna | 0x03).await?;

        // Preamble: 8 symbols
        self.write_register(reg::PREAMBLE_MSB, 0x00).await?;
        self.write_register(reg::PREAMBLE_LSB, 0x08).await?;

        // DIO0 signals TxDone
        self.write_register(reg::DIO_MAPPING_1, 0x40).await?;

        self.set_mode(mode::STANDBY).await?;

        self.initialised = true;
        Ok(())
    }

    async fn configure(&mut self, config: &LoraConfig) -> Result<(), LoraError> {
        if !self.initialised {
            return Err(LoraError::NotInitialised);
        }

        self.set_mode(mode::STANDBY).await?;
        self.set_frequency(config.frequency_hz).await?;
        self.set_modulation_params(config).await?;
        self.set_tx_power(config.tx_power_dbm).await?;
        self.write_register(reg::SYNC_WORD, config.sync_word).await
    }

    async fn transmit(&mut self, data: &[u8]) -> Result<(), LoraError> {
        if !self.initialised {
            return Err(LoraError::NotInitialised);
        }

        if data.is_empty() || data.len() > MAX_LORA_PAYLOAD {
            return Err(LoraError::InvalidConfig);
        }

        self.set_mode(mode::STANDBY).await?;

        // Load the FIFO from the TX base
        self.write_register(reg::FIFO_ADDR_PTR, 0x00).await?;
        self.write_fifo(data).await?;
        self.write_register(reg::PAYLOAD_LENGTH, data.len() as u8)
            .await?;

        self.write_register(reg::IRQ_FLAGS, 0xFF).await?;
        self.set_mode(mode::TX).await?;

        let flags = self.wait_for_tx_done().await?;

        // Clear IRQ
        self.write_register(reg::IRQ_FLAGS, 0xFF).await?;

        if flags & irq::TX_DONE != 0 {
            Ok(())
        } else {
            Err(LoraError::TransmitFailed)
        }
    }

    async fn sleep(&mut self) -> Result<(), LoraError> {
        self.set_mode(mode::SLEEP).await
    }
}
