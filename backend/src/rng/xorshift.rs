//! xorshift64* random number generator
//!
//! This is a fast, high-quality PRNG that is deterministic and suitable
//! for simulation purposes.
//!
//! # Determinism
//!
//! Same seed → same sequence of random numbers. This matters for the
//! uncertainty perturbation applied to free-place queries: two monitor runs
//! with the same seed and the same query sequence report identical
//! perturbed counts.

use serde::{Deserialize, Serialize};

/// Deterministic random number generator using xorshift64*
///
/// # Example
/// ```
/// use parking_monitor_core_rs::RngManager;
///
/// let mut rng = RngManager::new(12345);
/// let value = rng.next();
/// let draw = rng.normal(0.0, 2.0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngManager {
    /// Internal state (64-bit)
    state: u64,
}

impl RngManager {
    /// Create a new RNG with given seed
    ///
    /// # Example
    /// ```
    /// use parking_monitor_core_rs::RngManager;
    ///
    /// let rng = RngManager::new(12345);
    /// ```
    pub fn new(seed: u64) -> Self {
        // Ensure seed is never zero (xorshift requirement)
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Generate next random u64 value
    ///
    /// This advances the internal state and returns a random value.
    pub fn next(&mut self) -> u64 {
        // xorshift64* algorithm
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Generate random f64 in range [0.0, 1.0)
    pub fn next_f64(&mut self) -> f64 {
        let value = self.next();
        // 53 significant bits, uniform in [0.0, 1.0)
        (value >> 11) as f64 * (1.0 / ((1u64 << 53) as f64))
    }

    /// Sample a normally distributed value with the given mean and
    /// standard deviation (Box–Muller transform).
    ///
    /// Advances the internal state twice. A `sigma` of zero returns `mu`
    /// exactly.
    ///
    /// # Example
    /// ```
    /// use parking_monitor_core_rs::RngManager;
    ///
    /// let mut rng = RngManager::new(42);
    /// assert_eq!(rng.normal(3.0, 0.0), 3.0);
    /// ```
    pub fn normal(&mut self, mu: f64, sigma: f64) -> f64 {
        // Draw before the early return so a zero-sigma facility consumes
        // the same amount of state as any other.
        let mut u1 = self.next_f64();
        let u2 = self.next_f64();
        if sigma == 0.0 {
            return mu;
        }
        // ln(0) is -inf; clamp to the smallest representable draw.
        if u1 <= 0.0 {
            u1 = f64::MIN_POSITIVE;
        }
        let radius = (-2.0 * u1.ln()).sqrt();
        let angle = 2.0 * std::f64::consts::PI * u2;
        mu + sigma * radius * angle.cos()
    }

    /// Get current RNG state (for replay)
    pub fn get_state(&self) -> u64 {
        self.state
    }
}
