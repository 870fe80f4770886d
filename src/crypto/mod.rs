pub mod cipher;
pub mod padding;

pub use cipher::{CipherEngine, CipherEnvelope, CipherError};
pub use padding::{pkcs7_pad, pkcs7_unpad};
