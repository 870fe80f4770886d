#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod crypto;
pub mod housekeeping;
pub mod lora;
pub mod node;
pub mod power;
pub mod protocol;
pub mod serial;
pub mod telemetry;
