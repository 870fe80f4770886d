pub mod frame;
pub mod payload;
pub mod reading;

pub use frame::{checksum, FrameError, TelemetryFrame, FRAME_LEN};
pub use payload::{sealed_payload, text_payload, RadioPayload};
pub use reading::SensorReading;
