//! Deterministic random number generation for synthetic datasets.
//!
//! RULE: synthetic data never touches a platform RNG.
//! Every stream is derived from one master seed and a stable stream
//! index, so the same seed always yields the same dataset.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

pub struct SeededRng {
    inner: Pcg64Mcg,
}

impl SeededRng {
    pub fn new(master_seed: u64, stream: DataStream) -> Self {
        let derived_seed = master_seed ^ (stream as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self {
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        (self.inner.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    /// Roll a u64 in [0, n). Returns 0 when `n == 0`.
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        if n == 0 {
            return 0;
        }
        self.inner.next_u64() % n
    }

    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Simplified Pareto draw: heavy right tail above `x_min`.
    pub fn pareto(&mut self, x_min: f64, alpha: f64) -> f64 {
        let u = self.next_f64().max(1e-10);
        x_min * u.powf(-1.0 / alpha)
    }

    /// A 20-byte hex account address.
    pub fn address(&mut self) -> String {
        format!(
            "0x{:016x}{:016x}{:08x}",
            self.next_u64(),
            self.next_u64(),
            self.next_u64() as u32
        )
    }
}

/// Stable stream assignments. Append only: reordering reseeds every stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum DataStream {
    Accounts = 0,
    Transactions = 1,
    Coverage = 2,
}
