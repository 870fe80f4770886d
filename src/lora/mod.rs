#[cfg(feature = "embedded")]
pub mod driver;
pub mod traits;

#[cfg(feature = "embedded")]
pub use driver::{Sx1278Driver, Sx1278Pins};
pub use traits::{LoraConfig, LoraError, LoraRadio};
