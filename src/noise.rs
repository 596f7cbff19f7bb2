use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const TABLE_SIZE: usize = 256;

/// Classic Perlin-style gradient noise over a single axis.
///
/// Sampling at nearby inputs gives nearby outputs, so feeding it simulation
/// time produces a continuous signal instead of per-tick jitter. Output lies
/// in `[-1, 1]` and is exactly zero at integer inputs.
#[derive(Debug, Clone)]
pub struct CoherentNoise {
    perm: Vec<u8>,
}

impl CoherentNoise {
    /// Build the permutation table from a fixed seed.
    pub fn new(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut perm: Vec<u8> = (0..TABLE_SIZE).map(|i| i as u8).collect();
        perm.shuffle(&mut rng);
        Self { perm }
    }

    /// Build the table from an unseeded source.
    pub fn random() -> Self {
        Self::new(rand::thread_rng().gen())
    }

    fn gradient(&self, lattice: i64) -> f64 {
        let idx = lattice.rem_euclid(TABLE_SIZE as i64) as usize;
        // Second pass through the table decorrelates neighbouring lattice points
        let hashed = self.perm[(self.perm[idx] as usize + idx) % TABLE_SIZE];
        hashed as f64 / 127.5 - 1.0
    }

    /// Sample the noise at `x`.
    pub fn sample(&self, x: f64) -> f64 {
        let cell = x.floor();
        let f = x - cell;
        let i0 = cell as i64;
        let n0 = self.gradient(i0) * f;
        let n1 = self.gradient(i0 + 1) * (f - 1.0);
        let u = fade(f);
        ((n0 + (n1 - n0) * u) * 2.0).clamp(-1.0, 1.0)
    }
}

/// Quintic smoothstep, zero first and second derivative at both ends.
fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}
