//! Hardware configuration constants for the ESP32-C3 sensor node with an SX1278
//! radio and an RS-485 pyranometer, plus the runtime node configuration.

use crate::lora::LoraConfig;

/// RS-485 transceiver pins
pub mod rs485_pins {
    pub const RX: u8 = 20;
    pub const TX: u8 = 21;
}

/// SPI pins for LoRa module
pub mod spi {
    pub const SCLK: u8 = 4;
    pub const MISO: u8 = 5;
    pub const MOSI: u8 = 6;
}

/// LoRa control pins
pub mod lora_pins {
    pub const NSS: u8 = 7;
    pub const DIO0: u8 = 2;
    pub const NRST: u8 = 10;
}

/// Battery voltage sense
pub mod battery {
    /// ADC pin behind the resistor divider
    pub const ADC_PIN: u8 = 3;
    /// ADC reference in millivolts (11 dB attenuation)
    pub const ADC_REFERENCE_MV: u32 = 3300;
    /// Full-scale raw reading of the 12-bit ADC
    pub const ADC_FULL_SCALE: u32 = 4095;
    /// Divider factor scaled by 100 (1.75)
    pub const DIVIDER_X100: u32 = 175;
}

/// Default LoRa configuration
pub mod lora_defaults {
    /// 433 MHz ISM band
    pub const FREQUENCY_HZ: u32 = 433_000_000;
    pub const SYNC_WORD: u8 = 0xA5;
    pub const SPREADING_FACTOR: u8 = 7;
    pub const BANDWIDTH_KHZ: u32 = 125;
    /// Coding rate 4/5
    pub const CODING_RATE: u8 = 5;
    pub const TX_POWER_DBM: i8 = 17;
}

/// Serial bus configuration
pub mod serial {
    pub const BAUD_RATE: u32 = 9600;
}

/// Sensor request/response protocol
pub mod protocol {
    pub const SLAVE_ADDRESS: u8 = 0x01;
    /// Read input registers
    pub const FUNCTION_CODE: u8 = 0x04;
    pub const REGISTER_ADDRESS: u16 = 0x0000;
    pub const REGISTER_COUNT: u16 = 0x0001;

    pub const REQUEST_LEN: usize = 8;
    pub const RESPONSE_LEN: usize = 7;

    /// Settle time after the request before listening
    pub const GUARD_MS: u32 = 10;
    /// Deadline for the whole response
    pub const RESPONSE_TIMEOUT_US: u64 = 100_000;

    /// Default spacing between averaged transactions
    pub const SAMPLE_SPACING_MS: u32 = 50;

    /// Maximum sensor magnitude in W/m2
    pub const MAX_READING: u16 = 2000;

    /// Maximum payload size for the SX1278 FIFO
    pub const MAX_LORA_PAYLOAD: usize = 255;
}

/// Power cycle timing
pub mod cycle {
    pub const US_PER_SECOND: u64 = 1_000_000;
    /// Target period between transmissions
    pub const TARGET_PERIOD_US: u64 = 60 * US_PER_SECOND;
    /// Shortest sleep the timer wakeup accepts
    pub const MIN_SLEEP_US: u64 = 1_000;
}

/// Cipher sizes
pub mod crypto {
    pub const KEY_SIZE: usize = 16;
    pub const BLOCK_SIZE: usize = 16;
    /// Largest ciphertext that still fits a radio packet behind the IV
    pub const MAX_CIPHERTEXT: usize = 224;
}

/// Radio failure reporting before a forced restart
pub mod fatal {
    pub const REPORT_COUNT: u8 = 6;
    pub const REPORT_SPACING_MS: u32 = 10_000;
}

/// How the telemetry frame goes on air
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadMode {
    /// Human-readable legacy line
    Text,
    /// IV followed by AES-128-CBC ciphertext of the binary frame
    Sealed,
}

/// Settings supplied at boot by the provisioning layer
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub lora: LoraConfig,
    pub target_period_us: u64,
    pub payload_mode: PayloadMode,
    pub cipher_key: Option<[u8; crypto::KEY_SIZE]>,
    /// Protocol transactions averaged into one reading
    pub samples_per_cycle: u8,
    pub sample_spacing_ms: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            lora: LoraConfig::default(),
            target_period_us: cycle::TARGET_PERIOD_US,
            payload_mode: PayloadMode::Sealed,
            cipher_key: None,
            samples_per_cycle: 1,
            sample_spacing_ms: protocol::SAMPLE_SPACING_MS,
        }
    }
}

impl NodeConfig {
    /// Payload mode that will actually be used.
    ///
    /// Sealed mode needs a key; without one the node falls back to text.
    pub fn effective_payload_mode(&self) -> PayloadMode {
        match (self.payload_mode, self.cipher_key) {
            (PayloadMode::Sealed, None) => PayloadMode::Text,
            (mode, _) => mode,
        }
    }
}

/// Parse a 128-bit key written as 32 hex digits.
pub fn parse_key_hex(text: &str) -> Option<[u8; crypto::KEY_SIZE]> {
    let text = text.trim();
    if text.len() != crypto::KEY_SIZE * 2 {
        return None;
    }

    let mut key = [0u8; crypto::KEY_SIZE];
    for (byte, pair) in key.iter_mut().zip(text.as_bytes().chunks(2)) {
        let hi = hex_digit(pair[0])?;
        let lo = hex_digit(pair[1])?;
        *byte = (hi << 4) | lo;
    }
    Some(key)
}

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
