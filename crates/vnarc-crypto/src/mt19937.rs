//! MT19937 Mersenne Twister with the original `sgenrand` seeding
//!
//! CatSystem2 seeds the generator with the 1998 reference routine, which
//! fills the state from two steps of the `69069 * x + 1` LCG per word,
//! rather than the later `init_genrand`.

const N: usize = 624;
const M: usize = 397;
const MATRIX_A: u32 = 0x9908_B0DF;
const UPPER_MASK: u32 = 0x8000_0000;
const LOWER_MASK: u32 = 0x7FFF_FFFF;

/// 32-bit Mersenne Twister
#[derive(Clone)]
pub struct Mt19937 {
    mt: Box<[u32; N]>,
    mti: usize,
}

impl std::fmt::Debug for Mt19937 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mt19937")
            .field("mti", &self.mti)
            .finish_non_exhaustive()
    }
}

impl Mt19937 {
    /// Create a generator seeded with `seed`
    pub fn new(seed: u32) -> Self {
        let mut mt = Self {
            mt: Box::new([0; N]),
            mti: N,
        };
        mt.reseed(seed);
        mt
    }

    /// Re-initialise the state in place
    pub fn reseed(&mut self, mut seed: u32) {
        for word in self.mt.iter_mut() {
            *word = seed & 0xFFFF_0000;
            seed = seed.wrapping_mul(69069).wrapping_add(1);
            *word |= (seed & 0xFFFF_0000) >> 16;
            seed = seed.wrapping_mul(69069).wrapping_add(1);
        }
        self.mti = N;
    }

    fn twist(&mut self) {
        for k in 0..N {
            let y = (self.mt[k] & UPPER_MASK) | (self.mt[(k + 1) % N] & LOWER_MASK);
            let mag = if y & 1 == 0 { 0 } else { MATRIX_A };
            self.mt[k] = self.mt[(k + M) % N] ^ (y >> 1) ^ mag;
        }
        self.mti = 0;
    }

    /// Next tempered 32-bit output
    pub fn next_u32(&mut self) -> u32 {
        if self.mti >= N {
            self.twist();
        }
        let mut y = self.mt[self.mti];
        self.mti += 1;

        y ^= y >> 11;
        y ^= (y << 7) & 0x9D2C_5680;
        y ^= (y << 15) & 0xEFC6_0000;
        y ^ (y >> 18)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_outputs() {
        let mut mt = Mt19937::new(4357);
        assert_eq!(mt.next_u32(), 2_867_219_139);
        assert_eq!(mt.next_u32(), 1_585_203_162);
        assert_eq!(mt.next_u32(), 3_113_124_129);
    }

    #[test]
    fn test_reseed_restarts_sequence() {
        let mut mt = Mt19937::new(0x1234_5678);
        assert_eq!(mt.next_u32(), 2_023_340_405);
        mt.next_u32();
        mt.reseed(0x1234_5678);
        assert_eq!(mt.next_u32(), 2_023_340_405);
    }

    #[test]
    fn test_long_run_crosses_twist() {
        let mut mt = Mt19937::new(1);
        let values: Vec<u32> = (0..N * 2 + 5).map(|_| mt.next_u32()).collect();
        assert_eq!(values.len(), N * 2 + 5);
        assert_ne!(values[0], values[N]);
    }
}
