pub mod accountant;
pub mod clock;
pub mod state;

pub use accountant::{sleep_duration_us, CycleAccountant, CycleSummary};
pub use clock::Clock;
pub use state::{CycleState, CycleStore, MemoryStore, RetainedStore, RECORD_LEN};
