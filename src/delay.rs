//! Randomized anti-automation delays.
//!
//! The scraper pauses once per article fetch for a duration drawn from a
//! right-skewed Beta distribution scaled into a seconds range, so most waits
//! sit near the lower bound with an occasional longer one.

use rand::Rng;
use std::time::Duration;

/// Produces the pause taken before extracting a fetched page.
pub trait DelayPolicy: Send + Sync {
    fn next_delay(&self) -> Duration;
}

/// Beta(alpha, beta) sample scaled into `[min, max]`.
///
/// Shapes are integers so a sample is the `alpha`-th smallest of
/// `alpha + beta - 1` uniform draws.
#[derive(Debug, Clone)]
pub struct BetaDelay {
    alpha: u32,
    beta: u32,
    min: Duration,
    max: Duration,
}

impl BetaDelay {
    /// Beta(2, 5) between `min_secs` and `max_secs`
    pub fn new(min_secs: f64, max_secs: f64) -> Self {
        Self::with_shape(2, 5, min_secs, max_secs)
    }

    pub fn with_shape(alpha: u32, beta: u32, min_secs: f64, max_secs: f64) -> Self {
        let min_secs = min_secs.max(0.0);
        let max_secs = max_secs.max(min_secs);
        Self {
            alpha: alpha.max(1),
            beta: beta.max(1),
            min: Duration::from_secs_f64(min_secs),
            max: Duration::from_secs_f64(max_secs),
        }
    }

    /// Draw a delay from the given generator
    pub fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let draws = (self.alpha + self.beta - 1) as usize;
        let mut uniforms: Vec<f64> = (0..draws).map(|_| rng.gen::<f64>()).collect();
        uniforms.sort_by(f64::total_cmp);
        let fraction = uniforms[(self.alpha - 1) as usize];

        let span = self.max.saturating_sub(self.min);
        self.min + span.mul_f64(fraction)
    }
}

impl DelayPolicy for BetaDelay {
    fn next_delay(&self) -> Duration {
        self.sample_with(&mut rand::thread_rng())
    }
}

/// No pause at all; for tests and local mirrors.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl DelayPolicy for NoDelay {
    fn next_delay(&self) -> Duration {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_samples_within_range() {
        let policy = BetaDelay::new(2.0, 5.0);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            let d = policy.sample_with(&mut rng);
            assert!(d >= Duration::from_secs(2));
            assert!(d <= Duration::from_secs(5));
        }
    }

    #[test]
    fn test_distribution_is_right_skewed() {
        // Beta(2,5) has mean 2/7, so the average lands well below the midpoint.
        let policy = BetaDelay::new(0.0, 7.0);
        let mut rng = StdRng::seed_from_u64(42);
        let n = 5_000;
        let total: f64 = (0..n).map(|_| policy.sample_with(&mut rng).as_secs_f64()).sum();
        let mean = total / n as f64;
        assert!((mean - 2.0).abs() < 0.15, "mean was {}", mean);
    }

    #[test]
    fn test_inverted_range_collapses() {
        let policy = BetaDelay::new(6.5, 1.0);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(policy.sample_with(&mut rng), Duration::from_secs_f64(6.5));
    }

    #[test]
    fn test_no_delay() {
        assert_eq!(NoDelay.next_delay(), Duration::ZERO);
    }
}
