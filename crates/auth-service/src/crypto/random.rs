//! Randomness sources for rotation secrets and token ids.

use crate::errors::AuthError;
use ring::rand::{SecureRandom, SystemRandom};

/// Fills buffers with random bytes.
///
/// Production uses [`SystemRandomSource`]; tests swap in deterministic or
/// failing sources.
pub trait RandomSource: Send + Sync + 'static {
    fn fill(&self, dest: &mut [u8]) -> Result<(), AuthError>;
}

/// Operating system CSPRNG via `ring`.
#[derive(Debug)]
pub struct SystemRandomSource {
    rng: SystemRandom,
}

impl SystemRandomSource {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for SystemRandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for SystemRandomSource {
    fn fill(&self, dest: &mut [u8]) -> Result<(), AuthError> {
        self.rng
            .fill(dest)
            .map_err(|e| AuthError::Crypto(format!("Random generation failed: {}", e)))
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use fixtures::{ExhaustedRandom, SequenceRandom};

#[cfg(any(test, feature = "test-utils"))]
mod fixtures {
    use super::RandomSource;
    use crate::errors::AuthError;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Deterministic source: every call yields a different, reproducible
    /// byte pattern derived from a call counter.
    #[derive(Debug, Default)]
    pub struct SequenceRandom {
        calls: AtomicU64,
    }

    impl SequenceRandom {
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of fills performed so far.
        pub fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl RandomSource for SequenceRandom {
        fn fill(&self, dest: &mut [u8]) -> Result<(), AuthError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let seed = call.to_be_bytes();
            for (i, byte) in dest.iter_mut().enumerate() {
                let s = seed.get(i % seed.len()).copied().unwrap_or(0);
                *byte = s ^ (i as u8).wrapping_mul(31).wrapping_add(call as u8);
            }
            Ok(())
        }
    }

    /// Source that always fails.
    #[derive(Debug, Default)]
    pub struct ExhaustedRandom;

    impl RandomSource for ExhaustedRandom {
        fn fill(&self, _dest: &mut [u8]) -> Result<(), AuthError> {
            Err(AuthError::Crypto("Random source exhausted".to_string()))
        }
    }
}
