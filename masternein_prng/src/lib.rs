// Portable pseudo-random number generator for Masternein.
//
// Implements xoshiro256++ (Blackman & Vigna, 2019) with SplitMix64 seeding.
// Two consumers draw from it: the relay, when it generates room codes, and the
// feedback engine's `random_rack()` helper. Neither needs cryptographic
// strength; room codes are short-lived rendezvous names, not secrets.
//
// Tests seed explicitly with `CodeRng::new(seed)` for reproducible output.
// Production code uses `CodeRng::from_entropy()`, which mixes the wall clock
// with the process-randomized `RandomState` hasher keys so that two relays
// started in the same nanosecond still diverge.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Xoshiro256++ generator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CodeRng {
    s: [u64; 4],
}

impl CodeRng {
    /// Create a generator from a `u64` seed. The same seed always yields the
    /// same sequence.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    /// Create a generator seeded from the clock and per-process hasher keys.
    pub fn from_entropy() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        let mut hasher = RandomState::new().build_hasher();
        hasher.write_u64(nanos);
        hasher.write_u32(std::process::id());
        Self::new(hasher.finish() ^ nanos.rotate_left(32))
    }

    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Uniform integer in `[0, bound)`, without modulo bias.
    ///
    /// Panics if `bound` is zero.
    pub fn below(&mut self, bound: u64) -> u64 {
        assert!(bound > 0, "below: bound must be positive");
        if bound.is_power_of_two() {
            return self.next_u64() & (bound - 1);
        }
        let threshold = bound.wrapping_neg() % bound;
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return r % bound;
            }
        }
    }

    /// Uniform index in `[0, len)`.
    ///
    /// Panics if `len` is zero.
    pub fn index(&mut self, len: usize) -> usize {
        self.below(len as u64) as usize
    }

    /// Pick one element uniformly, or `None` for an empty slice.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let i = self.index(items.len());
        items.get(i)
    }
}

/// SplitMix64 step, used to expand a single seed into the 256-bit state.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = CodeRng::new(42);
        let mut b = CodeRng::new(42);
        for _ in 0..1000 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = CodeRng::new(42);
        let mut b = CodeRng::new(43);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn below_stays_in_bounds() {
        let mut rng = CodeRng::new(999);
        for bound in [1u64, 2, 9, 22, 1000] {
            for _ in 0..2_000 {
                assert!(rng.below(bound) < bound);
            }
        }
    }

    #[test]
    fn choose_reaches_every_element() {
        let mut rng = CodeRng::new(7);
        let items = ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i'];
        let mut seen = [false; 9];
        for _ in 0..5_000 {
            let c = rng.choose(&items).unwrap();
            let pos = items.iter().position(|x| x == c).unwrap();
            seen[pos] = true;
        }
        assert!(seen.iter().all(|s| *s), "some element never chosen: {seen:?}");
    }

    #[test]
    fn choose_empty_is_none() {
        let mut rng = CodeRng::new(1);
        let empty: [u8; 0] = [];
        assert!(rng.choose(&empty).is_none());
    }

    #[test]
    fn entropy_seeded_generators_differ() {
        let mut a = CodeRng::from_entropy();
        let mut b = CodeRng::from_entropy();
        // RandomState keys differ per instance, so the seeds differ even when
        // the clock reads identically.
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn serialization_preserves_state() {
        let mut rng = CodeRng::new(42);
        for _ in 0..10 {
            rng.next_u64();
        }
        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: CodeRng = serde_json::from_str(&json).unwrap();
        for _ in 0..10 {
            assert_eq!(rng.next_u64(), restored.next_u64());
        }
    }
}
