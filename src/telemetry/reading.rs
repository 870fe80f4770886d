//! Irradiance reading with an "unavailable" sentinel

use crate::config::protocol::MAX_READING;
use core::fmt;

/// One irradiance value in W/m2, or the sentinel
///
/// The sentinel is 0xFFFF on the wire (a signed `-1`), far outside the
/// sensor's 0..=2000 range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorReading(u16);

impl SensorReading {
    pub const SENTINEL: SensorReading = SensorReading(0xFFFF);

    /// Wrap a raw register value without range checks
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn is_sentinel(self) -> bool {
        self.0 == Self::SENTINEL.0
    }

    /// True if the value lies in the sensor's physical range
    pub const fn is_in_range(self) -> bool {
        self.0 <= MAX_READING
    }
}

impl<E> From<Result<u16, E>> for SensorReading {
    fn from(result: Result<u16, E>) -> Self {
        match result {
            Ok(raw) => Self::from_raw(raw),
            Err(_) => Self::SENTINEL,
        }
    }
}

impl fmt::Display for SensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_sentinel() {
            f.write_str("-1")
        } else {
            write!(f, "{}", self.0)
        }
    }
}
