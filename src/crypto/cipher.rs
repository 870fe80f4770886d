//! AES-128-CBC engine with random IVs
//!
//! The block primitive comes from the `aes` crate. This module owns the
//! chaining, the per-message IV and the padding checks around it. There is
//! no MAC: integrity rests on the frame's own checksum, which is not
//! authenticated.

use crate::config::crypto::{BLOCK_SIZE, KEY_SIZE, MAX_CIPHERTEXT};
use crate::config::protocol::MAX_LORA_PAYLOAD;
use crate::crypto::padding::{pkcs7_pad, pkcs7_unpad};
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use heapless::Vec;
use rand_core::{CryptoRng, RngCore};

/// Errors from the cipher layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherError {
    /// Ciphertext empty or not a whole number of blocks
    Length,
    /// Decrypted padding is malformed
    Padding,
    /// Data does not fit the fixed-size buffers
    Overflow,
}

/// IV and ciphertext of one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherEnvelope {
    pub iv: [u8; BLOCK_SIZE],
    pub ciphertext: Vec<u8, MAX_CIPHERTEXT>,
}

impl CipherEnvelope {
    /// Wire form: IV first, then ciphertext
    pub fn to_wire(&self) -> Result<Vec<u8, MAX_LORA_PAYLOAD>, CipherError> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.iv)
            .map_err(|_| CipherError::Overflow)?;
        out.extend_from_slice(&self.ciphertext)
            .map_err(|_| CipherError::Overflow)?;
        Ok(out)
    }

    /// Split a received payload into IV and ciphertext
    pub fn from_wire(bytes: &[u8]) -> Result<Self, CipherError> {
        if bytes.len() < BLOCK_SIZE {
            return Err(CipherError::Length);
        }

        let (iv_bytes, body) = bytes.split_at(BLOCK_SIZE);
        let mut iv = [0u8; BLOCK_SIZE];
        iv.copy_from_slice(iv_bytes);
        let ciphertext = Vec::from_slice(body).map_err(|_| CipherError::Overflow)?;

        Ok(Self { iv, ciphertext })
    }
}

/// AES-128-CBC with PKCS#7 padding under one provisioned key
pub struct CipherEngine {
    cipher: Aes128,
}

impl CipherEngine {
    /// Load the provisioned key
    pub fn new(key: &[u8; KEY_SIZE]) -> Self {
        Self {
            cipher: Aes128::new(GenericArray::from_slice(key)),
        }
    }

    /// Encrypt under a fresh IV drawn from `rng`
    pub fn encrypt<R: RngCore + CryptoRng>(
        &self,
        plaintext: &[u8],
        rng: &mut R,
    ) -> Result<CipherEnvelope, CipherError> {
        let mut iv = [0u8; BLOCK_SIZE];
        rng.fill_bytes(&mut iv);
        self.encrypt_with_iv(plaintext, iv)
    }

    fn encrypt_with_iv(
        &self,
        plaintext: &[u8],
        iv: [u8; BLOCK_SIZE],
    ) -> Result<CipherEnvelope, CipherError> {
        let mut buffer: Vec<u8, MAX_CIPHERTEXT> = pkcs7_pad(plaintext)?;
        self.cbc_encrypt(&iv, &mut buffer);
        Ok(CipherEnvelope {
            iv,
            ciphertext: buffer,
        })
    }

    /// Decrypt and strip padding
    ///
    /// Fails closed: no plaintext is returned unless the padding checks out.
    pub fn decrypt(
        &self,
        iv: &[u8; BLOCK_SIZE],
        ciphertext: &[u8],
    ) -> Result<Vec<u8, MAX_CIPHERTEXT>, CipherError> {
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(CipherError::Length);
        }

        let mut buffer: Vec<u8, MAX_CIPHERTEXT> =
            Vec::from_slice(ciphertext).map_err(|_| CipherError::Overflow)?;
        self.cbc_decrypt(iv, &mut buffer);

        let len = pkcs7_unpad(&buffer)?.len();
        buffer.truncate(len);
        Ok(buffer)
    }

    /// Chain-encrypt whole blocks in place
    fn cbc_encrypt(&self, iv: &[u8; BLOCK_SIZE], blocks: &mut [u8]) {
        let mut prev = *iv;

        for chunk in blocks.chunks_exact_mut(BLOCK_SIZE) {
            for (b, p) in chunk.iter_mut().zip(prev.iter()) {
                *b ^= p;
            }
            self.cipher
                .encrypt_block(GenericArray::from_mut_slice(chunk));
            prev.copy_from_slice(chunk);
        }
    }

    /// Chain-decrypt whole blocks in place
    fn cbc_decrypt(&self, iv: &[u8; BLOCK_SIZE], blocks: &mut [u8]) {
        let mut prev = *iv;

        for chunk in blocks.chunks_exact_mut(BLOCK_SIZE) {
            let mut current = [0u8; BLOCK_SIZE];
            current.copy_from_slice(chunk);

            self.cipher
                .decrypt_block(GenericArray::from_mut_slice(chunk));
            for (b, p) in chunk.iter_mut().zip(prev.iter()) {
                *b ^= p;
            }
            prev = current;
        }
    }
}

#[cfg(test)]
pub(crate) mod test_rng {
    //! Deterministic entropy sources for tests

    use rand_core::{impls, CryptoRng, Error, RngCore};

    /// Repeats a fixed 16-byte pattern
    pub struct FixedRng(pub [u8; 16]);

    impl RngCore for FixedRng {
        fn next_u32(&mut self) -> u32 {
            impls::next_u32_via_fill(self)
        }

        fn next_u64(&mut self) -> u64 {
            impls::next_u64_via_fill(self)
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            for (d, s) in dest.iter_mut().zip(self.0.iter().cycle()) {
                *d = *s;
            }
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    impl CryptoRng for FixedRng {}

    /// Emits an incrementing byte sequence, so no two draws repeat
    pub struct CountingRng {
        next: u8,
    }

    impl CountingRng {
        pub fn new(start: u8) -> Self {
            Self { next: start }
        }
    }

    impl RngCore for CountingRng {
        fn next_u32(&mut self) -> u32 {
            impls::next_u32_via_fill(self)
        }

        fn next_u64(&mut self) -> u64 {
            impls::next_u64_via_fill(self)
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            for d in dest.iter_mut() {
                *d = self.next;
                self.next = self.next.wrapping_add(1);
            }
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    impl CryptoRng for CountingRng {}
}

#[cfg(test)]
mod tests {
    use super::test_rng::{CountingRng, FixedRng};
    use super::*;

    // NIST SP 800-38A, F.2.1 CBC-AES128.Encrypt
    const NIST_KEY: [u8; 16] = [
        0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf, 0x4f,
        0x3c,
    ];
    const NIST_IV: [u8; 16] = [
        0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
        0x0f,
    ];
    const NIST_PLAINTEXT: [u8; 32] = [
        0x6b, 0xc1, 0xbe, 0xe2, 0x2e, 0x40, 0x9f, 0x96, 0xe9, 0x3d, 0x7e, 0x11, 0x73, 0x93, 0x17,
        0x2a, 0xae, 0x2d, 0x8a, 0x57, 0x1e, 0x03, 0xac, 0x9c, 0x9e, 0xb7, 0x6f, 0xac, 0x45, 0xaf,
        0x8e, 0x51,
    ];
    const NIST_CIPHERTEXT: [u8; 32] = [
        0x76, 0x49, 0xab, 0xac, 0x81, 0x19, 0xb2, 0x46, 0xce, 0xe9, 0x8e, 0x9b, 0x12, 0xe9, 0x19,
        0x7d, 0x50, 0x86, 0xcb, 0x9b, 0x50, 0x72, 0x19, 0xee, 0x95, 0xdb, 0x11, 0x3a, 0x91, 0x76,
        0x78, 0xb2,
    ];

    #[test]
    fn test_cbc_known_answer() {
        let engine = CipherEngine::new(&NIST_KEY);
        let mut blocks = NIST_PLAINTEXT;

        engine.cbc_encrypt(&NIST_IV, &mut blocks);
        assert_eq!(blocks, NIST_CIPHERTEXT);

        engine.cbc_decrypt(&NIST_IV, &mut blocks);
        assert_eq!(blocks, NIST_PLAINTEXT);
    }

    #[test]
    fn test_encrypt_uses_injected_iv() {
        let engine = CipherEngine::new(&NIST_KEY);
        let mut rng = FixedRng(NIST_IV);

        let envelope = engine.encrypt(&NIST_PLAINTEXT, &mut rng).unwrap();
        assert_eq!(envelope.iv, NIST_IV);
        // Aligned input gains a full padding block after the known blocks
        assert_eq!(envelope.ciphertext.len(), 48);
        assert_eq!(&envelope.ciphertext[..32], &NIST_CIPHERTEXT);
    }

    #[test]
    fn test_encrypt_decrypt_all_lengths() {
        let engine = CipherEngine::new(&NIST_KEY);
        let mut rng = CountingRng::new(0x40);
        let source: [u8; 48] = core::array::from_fn(|i| (i as u8) ^ 0x5A);

        for len in 1..=48 {
            let envelope = engine.encrypt(&source[..len], &mut rng).unwrap();
            assert_eq!(envelope.ciphertext.len(), (len / BLOCK_SIZE + 1) * BLOCK_SIZE);

            let plaintext = engine.decrypt(&envelope.iv, &envelope.ciphertext).unwrap();
            assert_eq!(plaintext.as_slice(), &source[..len]);
        }
    }

    #[test]
    fn test_fresh_iv_per_message() {
        let engine = CipherEngine::new(&NIST_KEY);
        let mut rng = CountingRng::new(0);
        let frame = [0x42u8; 11];

        let first = engine.encrypt(&frame, &mut rng).unwrap();
        let second = engine.encrypt(&frame, &mut rng).unwrap();
        assert_ne!(first.iv, second.iv);
        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[test]
    fn test_decrypt_length_error() {
        let engine = CipherEngine::new(&NIST_KEY);

        assert_eq!(engine.decrypt(&NIST_IV, &[]), Err(CipherError::Length));
        assert_eq!(engine.decrypt(&NIST_IV, &[0u8; 15]), Err(CipherError::Length));
        assert_eq!(engine.decrypt(&NIST_IV, &[0u8; 17]), Err(CipherError::Length));
    }

    #[test]
    fn test_decrypt_padding_error() {
        let engine = CipherEngine::new(&NIST_KEY);

        // Final plaintext byte 0, then 17, encrypted without padding
        for last in [0x00u8, 0x11] {
            let mut block = [0x07u8; 16];
            block[15] = last;
            engine.cbc_encrypt(&NIST_IV, &mut block);

            assert_eq!(
                engine.decrypt(&NIST_IV, &block),
                Err(CipherError::Padding)
            );
        }
    }

    #[test]
    fn test_decrypt_tampered_iv_breaks_padding() {
        let engine = CipherEngine::new(&NIST_KEY);
        let mut rng = FixedRng(NIST_IV);
        let envelope = engine.encrypt(&[0x42u8; 11], &mut rng).unwrap();

        // Flipping the IV flips the last plaintext byte: pad 5 becomes 5 ^ 0x80
        let mut iv = envelope.iv;
        iv[15] ^= 0x80;
        assert_eq!(
            engine.decrypt(&iv, &envelope.ciphertext),
            Err(CipherError::Padding)
        );
    }

    #[test]
    fn test_envelope_wire_form() {
        let engine = CipherEngine::new(&NIST_KEY);
        let mut rng = FixedRng(NIST_IV);
        let envelope = engine.encrypt(&[0u8; 11], &mut rng).unwrap();

        let wire = envelope.to_wire().unwrap();
        assert_eq!(wire.len(), 32);
        assert_eq!(&wire[..16], &NIST_IV);
        assert_eq!(CipherEnvelope::from_wire(&wire), Ok(envelope));

        assert_eq!(
            CipherEnvelope::from_wire(&wire[..10]),
            Err(CipherError::Length)
        );
    }

    #[test]
    fn test_plaintext_too_large() {
        let engine = CipherEngine::new(&NIST_KEY);
        let mut rng = CountingRng::new(0);
        let big = [0u8; MAX_CIPHERTEXT];

        assert_eq!(
            engine.encrypt(&big, &mut rng).map(|_| ()),
            Err(CipherError::Overflow)
        );
    }
}
