use crate::{Error, RandSource, Result};
use rand::{Rng, SeedableRng, rngs::StdRng};

/// A `RandSource` owning a private [`StdRng`] seeded from OS entropy.
///
/// Every call to [`OsRandom::new`] draws a fresh seed from the operating
/// system, so two instances never share or correlate their sequences. This is
/// the default generator for both table construction and lookup workers.
///
/// ## Features
///
/// - ✅ Independent per-instance state
/// - ✅ Cryptographically strong (ChaCha-based)
/// - ❌ Not reproducible; use [`crate::SeededRandom`] for that
#[derive(Clone, Debug)]
pub struct OsRandom {
    rng: StdRng,
}

impl OsRandom {
    /// Seeds a new generator from the OS entropy source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Entropy`] if the operating system cannot provide
    /// randomness. Without it no keys can be produced, so callers should treat
    /// this as fatal.
    pub fn new() -> Result<Self> {
        let rng = StdRng::try_from_os_rng().map_err(|e| Error::Entropy {
            reason: e.to_string(),
        })?;
        Ok(Self { rng })
    }
}

impl RandSource<u64> for OsRandom {
    fn rand(&mut self) -> u64 {
        self.rng.random()
    }
}
