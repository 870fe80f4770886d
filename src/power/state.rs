//! Cycle state that survives deep sleep
//!
//! # Retained Record Format
//!
//! ```text
//! [magic: u32][boot_count: u32][total_active_us: u64][last_sleep_us: u64][crc32: u32]
//! ```
//!
//! All fields little-endian; CRC-32/ISO-HDLC over the first 24 bytes.
//! Retained memory holds garbage after a cold power-on, and the magic plus
//! CRC tell that apart from a real record.

use crc::{Crc, CRC_32_ISO_HDLC};

const RECORD_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Marker for a record written by this firmware
const RECORD_MAGIC: u32 = 0x5059_524E;

/// Size of the sealed record in bytes
pub const RECORD_LEN: usize = 28;

/// Timing state carried from one wake to the next
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleState {
    /// Number of boots since the last power loss
    pub boot_count: u32,
    /// Active plus credited sleep time, in microseconds
    pub total_active_us: u64,
    /// Sleep requested at the end of the previous cycle
    pub last_sleep_us: u64,
}

/// Read-at-start, write-at-end persistence for [`CycleState`]
pub trait CycleStore {
    /// Load the state, or the zero state if none was stored
    fn load(&mut self) -> CycleState;

    /// Persist the state for the next boot
    fn save(&mut self, state: &CycleState);
}

/// Serialise the state with magic and CRC
pub fn seal_record(state: &CycleState) -> [u8; RECORD_LEN] {
    let mut record = [0u8; RECORD_LEN];
    record[0..4].copy_from_slice(&RECORD_MAGIC.to_le_bytes());
    record[4..8].copy_from_slice(&state.boot_count.to_le_bytes());
    record[8..16].copy_from_slice(&state.total_active_us.to_le_bytes());
    record[16..24].copy_from_slice(&state.last_sleep_us.to_le_bytes());

    let crc = RECORD_CRC.checksum(&record[..24]);
    record[24..28].copy_from_slice(&crc.to_le_bytes());
    record
}

/// Recover the state from a record, `None` if it is not a valid record
pub fn open_record(record: &[u8; RECORD_LEN]) -> Option<CycleState> {
    let magic = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
    if magic != RECORD_MAGIC {
        return None;
    }

    let crc = u32::from_le_bytes([record[24], record[25], record[26], record[27]]);
    if RECORD_CRC.checksum(&record[..24]) != crc {
        return None;
    }

    let mut u64_at = [0u8; 8];
    u64_at.copy_from_slice(&record[8..16]);
    let total_active_us = u64::from_le_bytes(u64_at);
    u64_at.copy_from_slice(&record[16..24]);
    let last_sleep_us = u64::from_le_bytes(u64_at);

    Some(CycleState {
        boot_count: u32::from_le_bytes([record[4], record[5], record[6], record[7]]),
        total_active_us,
        last_sleep_us,
    })
}

/// Store over a record buffer in retained memory
pub struct RetainedStore<'a> {
    record: &'a mut [u8; RECORD_LEN],
}

impl<'a> RetainedStore<'a> {
    pub fn new(record: &'a mut [u8; RECORD_LEN]) -> Self {
        Self { record }
    }
}

impl CycleStore for RetainedStore<'_> {
    fn load(&mut self) -> CycleState {
        match open_record(&*self.record) {
            Some(state) => state,
            None => {
                log::info!("cycle: no retained state, starting from zero");
                CycleState::default()
            }
        }
    }

    fn save(&mut self, state: &CycleState) {
        *self.record = seal_record(state);
    }
}

/// Volatile store, for tests and hosts without retained memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: CycleState,
    saves: u32,
}

impl MemoryStore {
    pub fn new(state: CycleState) -> Self {
        Self { state, saves: 0 }
    }

    /// Last saved state
    pub fn state(&self) -> &CycleState {
        &self.state
    }

    /// Number of save() calls
    pub fn saves(&self) -> u32 {
        self.saves
    }
}

impl CycleStore for MemoryStore {
    fn load(&mut self) -> CycleState {
        self.state
    }

    fn save(&mut self, state: &CycleState) {
        self.state = *state;
        self.saves += 1;
    }
}
