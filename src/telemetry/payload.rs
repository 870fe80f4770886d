//! Radio payload builders
//!
//! Two on-air forms exist: the legacy human-readable line, and the sealed
//! form `IV(16) || AES-128-CBC(frame)`, which is always 32 bytes for an
//! 11-byte frame.

use crate::config::protocol::MAX_LORA_PAYLOAD;
use crate::crypto::{CipherEngine, CipherError};
use crate::telemetry::TelemetryFrame;
use core::fmt::Write;
use heapless::{String, Vec};
use rand_core::{CryptoRng, RngCore};

/// Bytes handed to the radio
pub type RadioPayload = Vec<u8, MAX_LORA_PAYLOAD>;

/// Render the legacy text line
///
/// `Irr:<w/m2> W/m2,TempESP:<c> C,Bat:<v> V,Ts:<s> s`
pub fn text_payload(frame: &TelemetryFrame) -> RadioPayload {
    let mut line: String<MAX_LORA_PAYLOAD> = String::new();

    let sign = if frame.temp_dc < 0 { "-" } else { "" };
    let temp = frame.temp_dc.unsigned_abs();
    let centivolts = (frame.battery_mv as u32 + 5) / 10;

    // Bounded well below the payload capacity
    let _ = write!(
        line,
        "Irr:{} W/m2,TempESP:{}{}.{} C,Bat:{}.{:02} V,Ts:{} s",
        frame.reading,
        sign,
        temp / 10,
        temp % 10,
        centivolts / 100,
        centivolts % 100,
        frame.uptime_s,
    );

    line.into_bytes()
}

/// Encrypt the binary frame under a fresh IV
pub fn sealed_payload<R: RngCore + CryptoRng>(
    frame: &TelemetryFrame,
    engine: &CipherEngine,
    rng: &mut R,
) -> Result<RadioPayload, CipherError> {
    let envelope = engine.encrypt(&frame.encode(), rng)?;
    envelope.to_wire()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::cipher::test_rng::CountingRng;
    use crate::crypto::CipherEnvelope;
    use crate::telemetry::SensorReading;

    fn frame(reading: SensorReading, temp_dc: i16, battery_mv: u16) -> TelemetryFrame {
        TelemetryFrame {
            reading,
            battery_mv,
            temp_dc,
            uptime_s: 3600,
        }
    }

    #[test]
    fn test_text_payload() {
        let payload = text_payload(&frame(SensorReading::from_raw(850), 421, 3987));
        assert_eq!(
            core::str::from_utf8(&payload).unwrap(),
            "Irr:850 W/m2,TempESP:42.1 C,Bat:3.99 V,Ts:3600 s"
        );
    }

    #[test]
    fn test_text_payload_sentinel_and_negative_temperature() {
        let payload = text_payload(&frame(SensorReading::SENTINEL, -5, 4000));
        assert_eq!(
            core::str::from_utf8(&payload).unwrap(),
            "Irr:-1 W/m2,TempESP:-0.5 C,Bat:4.00 V,Ts:3600 s"
        );
    }

    #[test]
    fn test_sealed_payload_is_32_bytes() {
        let engine = CipherEngine::new(&[0x11; 16]);
        let mut rng = CountingRng::new(0);
        let original = frame(SensorReading::from_raw(1200), 250, 3700);

        let payload = sealed_payload(&original, &engine, &mut rng).unwrap();
        assert_eq!(payload.len(), 32);

        let envelope = CipherEnvelope::from_wire(&payload).unwrap();
        let plaintext = engine.decrypt(&envelope.iv, &envelope.ciphertext).unwrap();
        assert_eq!(TelemetryFrame::decode(&plaintext), Ok(original));
    }
}
