pub mod traits;

#[cfg(feature = "embedded")]
pub mod uart;

pub use traits::{SerialError, SerialPort};
