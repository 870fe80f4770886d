pub mod cycle;

pub use cycle::{CycleOutcome, TelemetryNode};
