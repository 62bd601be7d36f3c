//! ISAAC-64 generator and the AZ System keystream built on it
//!
//! [`Isaac64`] is Bob Jenkins' reference ISAAC-64 (`RANDSIZL = 8`).
//! [`AzIsaacKeystream`] seeds it from a single 32-bit key through a
//! Knuth-style linear fill instead of ISAAC's usual seeding, keeps the low
//! 32 bits of the first 256 results and XORs entry bytes with rotated
//! keystream words.

const RANDSIZL: u32 = 8;
const RANDSIZ: usize = 1 << RANDSIZL;
const GOLDEN_RATIO: u64 = 0x9E37_79B9_7F4A_7C13;

/// Size of the expanded 32-bit seed buffer
const SEED_WORDS: usize = RANDSIZ * 2;
const SEED_MULTIPLIER: u32 = 0x9E37_79B9;
const KEYSTREAM_SALT: u32 = 0x0100_0193;

/// Reference ISAAC-64 state
#[derive(Clone)]
pub struct Isaac64 {
    rsl: [u64; RANDSIZ],
    mm: [u64; RANDSIZ],
    aa: u64,
    bb: u64,
    cc: u64,
}

impl std::fmt::Debug for Isaac64 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Isaac64").finish_non_exhaustive()
    }
}

#[inline]
fn mix(x: &mut [u64; 8]) {
    let [a, b, c, d, e, f, g, h] = x;
    *a = a.wrapping_sub(*e);
    *f ^= *h >> 9;
    *h = h.wrapping_add(*a);
    *b = b.wrapping_sub(*f);
    *g ^= *a << 9;
    *a = a.wrapping_add(*b);
    *c = c.wrapping_sub(*g);
    *h ^= *b >> 23;
    *b = b.wrapping_add(*c);
    *d = d.wrapping_sub(*h);
    *a ^= *c << 15;
    *c = c.wrapping_add(*d);
    *e = e.wrapping_sub(*a);
    *b ^= *d >> 14;
    *d = d.wrapping_add(*e);
    *f = f.wrapping_sub(*b);
    *c ^= *e << 20;
    *e = e.wrapping_add(*f);
    *g = g.wrapping_sub(*c);
    *d ^= *f >> 17;
    *f = f.wrapping_add(*g);
    *h = h.wrapping_sub(*d);
    *e ^= *g << 14;
    *g = g.wrapping_add(*h);
}

impl Isaac64 {
    /// Initialise from a full seed block (`randinit` with `flag = TRUE`)
    pub fn from_seed(seed: [u64; RANDSIZ]) -> Self {
        let mut state = Self {
            rsl: seed,
            mm: [0; RANDSIZ],
            aa: 0,
            bb: 0,
            cc: 0,
        };

        let mut x = [GOLDEN_RATIO; 8];
        for _ in 0..4 {
            mix(&mut x);
        }

        // First pass folds in the seed, second pass folds in the first pass
        for i in (0..RANDSIZ).step_by(8) {
            for (j, v) in x.iter_mut().enumerate() {
                *v = v.wrapping_add(state.rsl[i + j]);
            }
            mix(&mut x);
            state.mm[i..i + 8].copy_from_slice(&x);
        }
        for i in (0..RANDSIZ).step_by(8) {
            for (j, v) in x.iter_mut().enumerate() {
                *v = v.wrapping_add(state.mm[i + j]);
            }
            mix(&mut x);
            state.mm[i..i + 8].copy_from_slice(&x);
        }

        state.generate();
        state
    }

    #[inline]
    fn ind(&self, x: u64) -> u64 {
        self.mm[((x >> 3) as usize) & (RANDSIZ - 1)]
    }

    /// Produce the next block of 256 results
    pub fn generate(&mut self) {
        let mut a = self.aa;
        self.cc = self.cc.wrapping_add(1);
        let mut b = self.bb.wrapping_add(self.cc);

        for i in 0..RANDSIZ {
            a = match i % 4 {
                0 => !(a ^ (a << 21)),
                1 => a ^ (a >> 5),
                2 => a ^ (a << 12),
                _ => a ^ (a >> 33),
            };
            let x = self.mm[i];
            a = a.wrapping_add(self.mm[(i + RANDSIZ / 2) & (RANDSIZ - 1)]);
            let y = self.ind(x).wrapping_add(a).wrapping_add(b);
            self.mm[i] = y;
            b = self.ind(y >> RANDSIZL).wrapping_add(x);
            self.rsl[i] = b;
        }

        self.aa = a;
        self.bb = b;
    }

    /// Results of the most recent block
    pub fn results(&self) -> &[u64; RANDSIZ] {
        &self.rsl
    }
}

/// Expand a 32-bit seed into 256 little-endian packed 64-bit words
pub fn expand_seed(seed: u32) -> [u64; RANDSIZ] {
    let mut words = [0u32; SEED_WORDS];
    words[0] = seed;
    for i in 1..SEED_WORDS {
        let prev = words[i - 1];
        words[i] = (i as u32).wrapping_add(SEED_MULTIPLIER.wrapping_mul(prev ^ (prev >> 30)));
    }

    let mut packed = [0u64; RANDSIZ];
    for (out, pair) in packed.iter_mut().zip(words.chunks_exact(2)) {
        *out = u64::from(pair[0]) | (u64::from(pair[1]) << 32);
    }
    packed
}

/// ISAAC-derived keystream used for AZ System entry payloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzIsaacKeystream {
    key: Box<[u32; RANDSIZ]>,
}

impl AzIsaacKeystream {
    /// Build the keystream table for `seed`
    pub fn new(seed: u32) -> Self {
        let isaac = Isaac64::from_seed(expand_seed(seed));
        let mut key = Box::new([0u32; RANDSIZ]);
        for (k, r) in key.iter_mut().zip(isaac.results()) {
            *k = *r as u32;
        }
        Self { key }
    }

    /// Keystream words
    pub fn words(&self) -> &[u32; RANDSIZ] {
        &self.key
    }

    /// XOR `data` in place; `position` is the offset of `data[0]` in the entry
    pub fn apply(&self, data: &mut [u8], position: u64) {
        for (pos, byte) in (position..).zip(data.iter_mut()) {
            let word = self.key[(pos as usize) & (RANDSIZ - 1)] ^ KEYSTREAM_SALT;
            *byte ^= word.rotate_left(((pos >> 8) & 0x1F) as u32) as u8;
        }
    }
}
