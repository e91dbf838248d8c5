use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

/// Counts ticks towards a randomized election timeout.
#[derive(Debug)]
pub(crate) struct ElectionTimer {
    rng: StdRng,

    /// Timeouts are chosen in `[base, 2 * base)`.
    base: u64,

    elapsed: u64,
    timeout: u64,
}

impl ElectionTimer {
    pub(crate) fn new(base: u64, seed: u64) -> Self {
        let mut t = Self {
            rng: StdRng::seed_from_u64(seed),
            base: base.max(1),
            elapsed: 0,
            timeout: 0,
        };
        t.reset();
        t
    }

    /// Restart counting with a new random timeout.
    pub(crate) fn reset(&mut self) {
        self.elapsed = 0;
        self.timeout = self.rng.random_range(self.base..self.base * 2);
    }

    /// Returns true if fewer than the base timeout ticks passed since the
    /// last reset.
    pub(crate) fn within_base(&self) -> bool {
        self.elapsed < self.base
    }

    /// Count one tick; returns true once the timeout is reached.
    pub(crate) fn tick(&mut self) -> bool {
        self.elapsed += 1;
        self.elapsed >= self.timeout
    }

    #[allow(dead_code)]
    pub(crate) fn timeout(&self) -> u64 {
        self.timeout
    }
}
