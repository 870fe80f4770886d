//! Node housekeeping metrics: battery voltage and die temperature

use crate::config::battery::{ADC_FULL_SCALE, ADC_REFERENCE_MV, DIVIDER_X100};

/// Source of the housekeeping fields carried in every frame
pub trait Housekeeping {
    /// Battery voltage in millivolts
    fn battery_mv(&mut self) -> u16;

    /// Internal temperature in tenths of a degree Celsius
    fn internal_temp_dc(&mut self) -> i16;
}

/// Convert a raw 12-bit ADC sample behind the battery divider to millivolts
pub fn battery_mv_from_raw(raw: u16) -> u16 {
    let raw = (raw as u32).min(ADC_FULL_SCALE);
    (raw * ADC_REFERENCE_MV * DIVIDER_X100 / (ADC_FULL_SCALE * 100)) as u16
}

#[cfg(feature = "embedded")]
pub use self::esp::EspHousekeeping;

#[cfg(feature = "embedded")]
mod esp {
    use super::{battery_mv_from_raw, Housekeeping};
    use esp_hal::analog::adc::{Adc, AdcPin};
    use esp_hal::peripherals::{ADC1, GPIO3};
    use esp_hal::tsens::TemperatureSensor;
    use esp_hal::Blocking;

    /// ADC battery sense plus the on-die temperature sensor
    pub struct EspHousekeeping<'d> {
        adc: Adc<'d, ADC1<'d>, Blocking>,
        pin: AdcPin<GPIO3<'d>, ADC1<'d>>,
        tsens: TemperatureSensor<'d>,
    }

    impl<'d> EspHousekeeping<'d> {
        pub fn new(
            adc: Adc<'d, ADC1<'d>, Blocking>,
            pin: AdcPin<GPIO3<'d>, ADC1<'d>>,
            tsens: TemperatureSensor<'d>,
        ) -> Self {
            Self { adc, pin, tsens }
        }
    }

    impl Housekeeping for EspHousekeeping<'_> {
        fn battery_mv(&mut self) -> u16 {
            match nb::block!(self.adc.read_oneshot(&mut self.pin)) {
                Ok(raw) => battery_mv_from_raw(raw),
                Err(_) => {
                    log::warn!("housekeeping: battery ADC read failed");
                    0
                }
            }
        }

        fn internal_temp_dc(&mut self) -> i16 {
            let celsius = self.tsens.get_temperature().to_celsius();
            // Float-to-int casts saturate
            (celsius * 10.0) as i16
        }
    }
}
