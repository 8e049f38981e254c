//! Random token generation.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;

/// Source of opaque random token values.
pub trait TokenGenerator: Send + Sync {
    /// Returns a fresh token value.
    fn generate(&self) -> String;
}

/// Generates URL-safe base64 tokens from cryptographically random bytes.
#[derive(Debug, Clone)]
pub struct UrlSafeTokenGenerator {
    bytes: usize,
}

impl UrlSafeTokenGenerator {
    /// Default number of random bytes per token.
    pub const DEFAULT_BYTES: usize = 16;

    /// Creates a generator drawing `bytes` random bytes per token.
    pub fn new(bytes: usize) -> Self {
        Self {
            bytes: bytes.max(1),
        }
    }
}

impl Default for UrlSafeTokenGenerator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BYTES)
    }
}

impl TokenGenerator for UrlSafeTokenGenerator {
    fn generate(&self) -> String {
        let mut rng = rand::rng();
        let bytes: Vec<u8> = (0..self.bytes).map(|_| rng.random::<u8>()).collect();
        URL_SAFE_NO_PAD.encode(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_url_safe() {
        let token = UrlSafeTokenGenerator::default().generate();

        // 16 bytes encode to 22 unpadded base64 characters
        assert_eq!(token.len(), 22);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_tokens_differ() {
        let generator = UrlSafeTokenGenerator::new(32);
        assert_ne!(generator.generate(), generator.generate());
        assert_eq!(generator.generate().len(), 43);
    }

    #[test]
    fn test_zero_bytes_clamped() {
        assert!(!UrlSafeTokenGenerator::new(0).generate().is_empty());
    }
}
