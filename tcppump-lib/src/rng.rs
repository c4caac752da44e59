use rand::RngCore;

/// Source of randomness for MAC address generation, injectable so tests and
/// `--predictable-random` can substitute a deterministic sequence.
pub trait Rng: Send {
    fn random_bytes6(&mut self) -> [u8; 6];
}

/// Cryptographically-seeded randomness, the default source.
pub struct SecureRng(rand::rngs::ThreadRng);

impl SecureRng {
    pub fn new() -> Self {
        Self(rand::thread_rng())
    }
}

impl Default for SecureRng {
    fn default() -> Self {
        Self::new()
    }
}

impl Rng for SecureRng {
    fn random_bytes6(&mut self) -> [u8; 6] {
        let mut bytes = [0u8; 6];
        self.0.fill_bytes(&mut bytes);
        bytes
    }
}

/// Deterministic counter-based source, selected by `--predictable-random`;
/// makes scripted test runs reproducible.
pub struct PredictableRng {
    counter: u64,
}

impl PredictableRng {
    pub fn new() -> Self {
        Self { counter: 0 }
    }
}

impl Default for PredictableRng {
    fn default() -> Self {
        Self::new()
    }
}

impl Rng for PredictableRng {
    fn random_bytes6(&mut self) -> [u8; 6] {
        self.counter = self.counter.wrapping_add(1);
        let c = self.counter.to_be_bytes();
        [c[2], c[3], c[4], c[5], c[6], c[7]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predictable_rng_is_deterministic_and_advances() {
        let mut a = PredictableRng::new();
        let mut b = PredictableRng::new();
        assert_eq!(a.random_bytes6(), b.random_bytes6());
        let first = {
            let mut r = PredictableRng::new();
            r.random_bytes6()
        };
        let mut r = PredictableRng::new();
        let _ = r.random_bytes6();
        let second = r.random_bytes6();
        assert_ne!(first, second);
    }
}
