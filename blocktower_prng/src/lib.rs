// Deterministic, portable pseudo-random number generator.
//
// xoshiro256++ (Blackman & Vigna, 2019) seeded through SplitMix64. Every
// random decision in the workspace draws from a `TowerRng`: which placement
// the builder picks, how block shapes are shuffled, which substance a block
// gets, and how the entropy analyzer jitters block positions.
//
// Parallel callers never share a generator. `fork(stream)` derives an
// independent generator from the current state plus a stream index without
// advancing the parent, so "tower #7 of a batch" or "perturbation #12 of an
// analysis" gets the same stream regardless of which rayon worker runs it.
//
// **Critical constraint: determinism.** The integer core must produce
// identical output for identical state on every platform. The float helpers
// (`next_f64`, `range_f64`) are exact conversions of integer output. The
// Gaussian helper goes through `ln`/`cos`, whose last-bit behavior is up to
// the platform libm; treat normal draws as reproducible per platform.

use serde::{Deserialize, Serialize};

/// Xoshiro256++ PRNG, the workspace's sole source of randomness.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TowerRng {
    s: [u64; 4],
}

impl TowerRng {
    /// Create a generator from a `u64` seed.
    ///
    /// SplitMix64 expands the seed into the 256-bit state, so nearby seeds
    /// (0, 1, 2, ...) still yield unrelated streams.
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

    /// Derive an independent generator for `stream` without advancing `self`.
    ///
    /// Forking the same parent state with the same stream index always
    /// yields the same child.
    pub fn fork(&self, stream: u64) -> Self {
        let mut sm = self.s[0]
            ^ self.s[1].rotate_left(17)
            ^ self.s[2].rotate_left(31)
            ^ self.s[3].rotate_left(47)
            ^ stream.wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    /// Next `u64` in the sequence.
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

    /// Uniform `f64` in [0, 1), built from the upper 53 bits.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform `f64` in `[low, high)`.
    ///
    /// Panics if `low >= high` or either bound is not finite.
    pub fn range_f64(&mut self, low: f64, high: f64) -> f64 {
        assert!(
            low.is_finite() && high.is_finite() && low < high,
            "range_f64: need finite low < high, got [{low}, {high})"
        );
        low + self.next_f64() * (high - low)
    }

    /// Uniform integer in `[low, high)` without modulo bias.
    ///
    /// Panics if `low >= high`.
    pub fn range_u64(&mut self, low: u64, high: u64) -> u64 {
        assert!(low < high, "range_u64: low must be less than high");
        let range = high - low;
        if range.is_power_of_two() {
            return low + (self.next_u64() & (range - 1));
        }
        let threshold = range.wrapping_neg() % range;
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return low + (r % range);
            }
        }
    }

    /// Uniform `usize` in `[low, high)`.
    pub fn range_usize(&mut self, low: usize, high: usize) -> usize {
        self.range_u64(low as u64, high as u64) as usize
    }

    /// Uniformly pick an index into a collection of length `len`.
    ///
    /// Returns `None` for an empty collection.
    pub fn choose_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            None
        } else {
            Some(self.range_usize(0, len))
        }
    }

    /// `true` with probability `p`. `p <= 0` never fires, `p >= 1` always does.
    pub fn random_bool(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Standard normal draw (mean 0, std 1) via the Box–Muller transform.
    ///
    /// Consumes exactly two `u64`s per call; the second Box–Muller variate is
    /// discarded so the state stays a plain `[u64; 4]`.
    pub fn standard_normal(&mut self) -> f64 {
        // 1 - U keeps u1 in (0, 1], so ln(u1) is finite.
        let u1 = 1.0 - self.next_f64();
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }

    /// Normal draw with the given mean and standard deviation.
    ///
    /// A zero `std_dev` returns `mean` but still consumes the draw, so
    /// streams stay aligned when noise is switched off.
    pub fn normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        mean + std_dev * self.standard_normal()
    }

    /// Fisher–Yates shuffle in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.range_usize(0, i + 1);
            items.swap(i, j);
        }
    }
}

/// SplitMix64 step, used only to expand seeds into xoshiro state.
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
    fn same_seed_same_stream() {
        let mut a = TowerRng::new(42);
        let mut b = TowerRng::new(42);
        for _ in 0..1000 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = TowerRng::new(42);
        let mut b = TowerRng::new(43);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn fork_is_stable_and_does_not_advance_parent() {
        let parent = TowerRng::new(7);
        let before = parent.clone();
        let mut c1 = parent.fork(3);
        let mut c2 = parent.fork(3);
        assert_eq!(parent, before);
        for _ in 0..100 {
            assert_eq!(c1.next_u64(), c2.next_u64());
        }
    }

    #[test]
    fn forks_with_different_streams_diverge() {
        let parent = TowerRng::new(7);
        let mut a = parent.fork(0);
        let mut b = parent.fork(1);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn f64_in_unit_range() {
        let mut rng = TowerRng::new(12345);
        for _ in 0..10_000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v), "f64 out of range: {v}");
        }
    }

    #[test]
    fn range_f64_within_bounds() {
        let mut rng = TowerRng::new(777);
        for _ in 0..10_000 {
            let v = rng.range_f64(0.1, 0.9);
            assert!((0.1..0.9).contains(&v), "range_f64 out of range: {v}");
        }
    }

    #[test]
    fn range_usize_within_bounds() {
        let mut rng = TowerRng::new(555);
        for _ in 0..10_000 {
            let v = rng.range_usize(5, 15);
            assert!((5..15).contains(&v), "range_usize out of range: {v}");
        }
    }

    #[test]
    fn choose_index_empty_is_none() {
        let mut rng = TowerRng::new(1);
        assert_eq!(rng.choose_index(0), None);
        assert_eq!(rng.choose_index(1), Some(0));
    }

    #[test]
    fn random_bool_extremes() {
        let mut rng = TowerRng::new(42);
        for _ in 0..100 {
            assert!(!rng.random_bool(0.0));
            assert!(rng.random_bool(1.0));
        }
    }

    #[test]
    fn normal_moments_are_plausible() {
        let mut rng = TowerRng::new(2024);
        let n = 20_000;
        let samples: Vec<f64> = (0..n).map(|_| rng.normal(2.0, 0.5)).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        assert!((mean - 2.0).abs() < 0.02, "mean drifted: {mean}");
        let std = var.sqrt();
        assert!((std - 0.5).abs() < 0.02, "std drifted: {std}");
    }

    #[test]
    fn zero_std_normal_returns_mean() {
        let mut rng = TowerRng::new(9);
        assert_eq!(rng.normal(1.25, 0.0), 1.25);
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = TowerRng::new(31);
        let mut items: Vec<u32> = (0..50).collect();
        rng.shuffle(&mut items);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn serialization_roundtrip_continues_stream() {
        let mut rng = TowerRng::new(42);
        for _ in 0..100 {
            rng.next_u64();
        }
        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: TowerRng = serde_json::from_str(&json).unwrap();
        for _ in 0..100 {
            assert_eq!(rng.next_u64(), restored.next_u64());
        }
    }
}
