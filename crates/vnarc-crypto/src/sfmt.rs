//! SIMD-oriented Fast Mersenne Twister (SFMT-19937)
//!
//! Portable implementation of the SFMT-19937 parameter set. The 128-bit
//! lanes are stored as four little-endian `u32` words and the byte shifts
//! are done on the combined 128-bit value, matching the SSE2 reference.
//!
//! AZ System derives archive content keys from the first outputs of this
//! generator, so the recursion must match the reference exactly.

const MEXP: usize = 19937;
/// Number of 128-bit words in the state
const N: usize = MEXP / 128 + 1;
/// Number of 32-bit words in the state
const N32: usize = N * 4;
const POS1: usize = 122;
const SL1: u32 = 18;
const SL2: u32 = 1;
const SR1: u32 = 11;
const SR2: u32 = 1;
const MSK: [u32; 4] = [0xDFFF_FFEF, 0xDDFE_CB7F, 0xBFFA_FFFF, 0xBFFF_FFF6];
const PARITY: [u32; 4] = [0x0000_0001, 0x0000_0000, 0x0000_0000, 0x13C9_E684];

type W128 = [u32; 4];

#[inline]
const fn to_u128(w: W128) -> u128 {
    (w[0] as u128) | ((w[1] as u128) << 32) | ((w[2] as u128) << 64) | ((w[3] as u128) << 96)
}

#[inline]
const fn from_u128(v: u128) -> W128 {
    [v as u32, (v >> 32) as u32, (v >> 64) as u32, (v >> 96) as u32]
}

#[inline]
fn do_recursion(a: W128, b: W128, c: W128, d: W128) -> W128 {
    let x = from_u128(to_u128(a) << (SL2 * 8));
    let y = from_u128(to_u128(c) >> (SR2 * 8));
    let mut r = [0u32; 4];
    for i in 0..4 {
        r[i] = a[i] ^ x[i] ^ ((b[i] >> SR1) & MSK[i]) ^ y[i] ^ (d[i] << SL1);
    }
    r
}

/// SFMT-19937 generator producing 32-bit outputs
#[derive(Clone)]
pub struct Sfmt19937 {
    state: Box<[u32; N32]>,
    idx: usize,
}

impl std::fmt::Debug for Sfmt19937 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sfmt19937")
            .field("idx", &self.idx)
            .finish_non_exhaustive()
    }
}

impl Sfmt19937 {
    /// Seed the generator (`init_gen_rand`)
    pub fn new(seed: u32) -> Self {
        let mut state = Box::new([0u32; N32]);
        state[0] = seed;
        for i in 1..N32 {
            let prev = state[i - 1];
            state[i] = 1_812_433_253_u32
                .wrapping_mul(prev ^ (prev >> 30))
                .wrapping_add(i as u32);
        }
        let mut sfmt = Self { state, idx: N32 };
        sfmt.period_certification();
        sfmt
    }

    fn period_certification(&mut self) {
        let mut inner = 0u32;
        for (word, parity) in self.state.iter().zip(PARITY) {
            inner ^= word & parity;
        }
        let mut shift = 16;
        while shift > 0 {
            inner ^= inner >> shift;
            shift >>= 1;
        }
        if inner & 1 == 1 {
            return;
        }

        for (i, parity) in PARITY.iter().enumerate() {
            let mut work = 1u32;
            for _ in 0..32 {
                if work & parity != 0 {
                    self.state[i] ^= work;
                    return;
                }
                work <<= 1;
            }
        }
    }

    #[inline]
    fn word(&self, i: usize) -> W128 {
        let base = i * 4;
        [
            self.state[base],
            self.state[base + 1],
            self.state[base + 2],
            self.state[base + 3],
        ]
    }

    fn gen_rand_all(&mut self) {
        let mut r1 = self.word(N - 2);
        let mut r2 = self.word(N - 1);
        for i in 0..N {
            let b = self.word((i + POS1) % N);
            let r = do_recursion(self.word(i), b, r1, r2);
            self.state[i * 4..i * 4 + 4].copy_from_slice(&r);
            r1 = r2;
            r2 = r;
        }
    }

    /// Next 32-bit output (`gen_rand32`)
    pub fn gen_u32(&mut self) -> u32 {
        if self.idx >= N32 {
            self.gen_rand_all();
            self.idx = 0;
        }
        let value = self.state[self.idx];
        self.idx += 1;
        value
    }
}
