//! LoRa radio trait for abstraction and testability
//!
//! This trait defines the interface for the transmit-only uplink,
//! allowing the actual hardware driver to be swapped with a mock for testing.

use core::future::Future;

/// Errors that can occur during LoRa operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoraError {
    /// Operation timed out
    Timeout,
    /// Transmission failed
    TransmitFailed,
    /// Invalid configuration or payload size
    InvalidConfig,
    /// Chip did not answer with the expected silicon version
    NotDetected,
    /// SPI communication error
    SpiError,
    /// Radio not initialised
    NotInitialised,
}

/// Configuration for LoRa modulation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoraConfig {
    /// Carrier frequency in Hz
    pub frequency_hz: u32,
    /// Network sync word
    pub sync_word: u8,
    /// Spreading factor (6-12)
    pub spreading_factor: u8,
    /// Bandwidth in kHz (7.8, 10.4, 15.6, 20.8, 31.25, 41.7, 62.5, 125, 250, 500)
    pub bandwidth_khz: u32,
    /// Coding rate denominator (5-8 for 4/5 to 4/8)
    pub coding_rate: u8,
    /// Transmit power in dBm
    pub tx_power_dbm: i8,
}

impl Default for LoraConfig {
    fn default() -> Self {
        use crate::config::lora_defaults;

        Self {
            frequency_hz: lora_defaults::FREQUENCY_HZ,
            sync_word: lora_defaults::SYNC_WORD,
            spreading_factor: lora_defaults::SPREADING_FACTOR,
            bandwidth_khz: lora_defaults::BANDWIDTH_KHZ,
            coding_rate: lora_defaults::CODING_RATE,
            tx_power_dbm: lora_defaults::TX_POWER_DBM,
        }
    }
}

/// Abstract LoRa radio interface for testability
pub trait LoraRadio {
    /// Initialise the radio hardware
    fn init(&mut self) -> impl Future<Output = Result<(), LoraError>>;

    /// Configure the radio parameters
    fn configure(&mut self, config: &LoraConfig) -> impl Future<Output = Result<(), LoraError>>;

    /// Transmit data over LoRa
    ///
    /// Blocks until transmission is complete or an error occurs.
    fn transmit(&mut self, data: &[u8]) -> impl Future<Output = Result<(), LoraError>>;

    /// Put the radio into its lowest-power mode
    fn sleep(&mut self) -> impl Future<Output = Result<(), LoraError>>;
}
