use rand::Rng;
use std::time::Duration;

/// Uniformly distributed delay between `min` and `max` (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jitter {
    min: Duration,
    max: Duration,
}

impl Jitter {
    pub const ZERO: Jitter = Jitter::between_ms(0, 0);

    pub const fn between_ms(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min: Duration::from_millis(min_ms),
            max: Duration::from_millis(max_ms),
        }
    }

    /// `base_ms` plus up to `spread_ms` of random jitter.
    pub const fn base_plus(base_ms: u64, spread_ms: u64) -> Self {
        Self::between_ms(base_ms, base_ms.saturating_add(spread_ms))
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max.max(self.min)
    }

    pub fn delay(&self) -> Duration {
        let mut rng = rand::thread_rng();
        self.delay_with_rng(&mut rng)
    }

    pub fn delay_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let min_ms = self.min.as_millis().min(u128::from(u64::MAX)) as u64;
        let max_ms = self.max().as_millis().min(u128::from(u64::MAX)) as u64;
        Duration::from_millis(rng.gen_range(min_ms..=max_ms))
    }

    pub async fn wait(&self) {
        let delay = self.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn zero_jitter_never_waits() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(Jitter::ZERO.delay_with_rng(&mut rng), Duration::ZERO);
    }

    #[test]
    fn base_plus_stays_in_window() {
        let jitter = Jitter::base_plus(90, 120);
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let delay = jitter.delay_with_rng(&mut rng);
            assert!(delay >= Duration::from_millis(90));
            assert!(delay <= Duration::from_millis(210));
        }
    }

    #[test]
    fn base_plus_saturates_at_the_top() {
        let jitter = Jitter::base_plus(u64::MAX, 300);
        assert_eq!(jitter.min(), Duration::from_millis(u64::MAX));
        assert_eq!(jitter.max(), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn inverted_window_collapses_to_min() {
        let jitter = Jitter::between_ms(500, 100);
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(jitter.delay_with_rng(&mut rng), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_sleeps_inside_window() {
        let start = tokio::time::Instant::now();
        Jitter::between_ms(1000, 2000).wait().await;
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(1000));
        assert!(waited <= Duration::from_millis(2000) + Duration::from_millis(5));
    }
}
