use serde::{Deserialize, Serialize};
use tracing::info;

/// Page-Hinkley change detector over a stream of scores.
///
/// State persists across batches for the life of the detector. The first
/// value seen after construction or after a detection seeds the moving mean,
/// so a constant stream never accumulates drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageHinkley {
    /// Tolerated magnitude of change.
    pub delta: f64,
    /// Detection threshold on the cumulative deviation.
    pub lambda: f64,
    /// Forgetting factor of the moving mean.
    pub alpha: f64,
    mean: f64,
    cumulative_sum: f64,
    min_cumulative_sum: f64,
    seeded: bool,
    detections: u64,
}

impl PageHinkley {
    pub const DEFAULT_DELTA: f64 = 0.005;
    pub const DEFAULT_LAMBDA: f64 = 50.0;
    pub const DEFAULT_ALPHA: f64 = 0.999;

    pub fn new(delta: f64, lambda: f64, alpha: f64) -> Self {
        Self {
            delta,
            lambda,
            alpha,
            mean: 0.0,
            cumulative_sum: 0.0,
            min_cumulative_sum: 0.0,
            seeded: false,
            detections: 0,
        }
    }

    /// Feed one value; returns true when drift is detected on it.
    ///
    /// The first value after construction or a detection becomes the mean
    /// before the update, rather than starting the mean at zero.
    pub fn update(&mut self, value: f64) -> bool {
        if !self.seeded {
            self.mean = value;
            self.seeded = true;
        }

        self.mean = self.alpha * self.mean + (1.0 - self.alpha) * value;
        self.cumulative_sum += value - self.mean - self.delta;
        self.min_cumulative_sum = self.min_cumulative_sum.min(self.cumulative_sum);

        if self.cumulative_sum - self.min_cumulative_sum > self.lambda {
            self.detections += 1;
            info!(
                value,
                statistic = self.cumulative_sum - self.min_cumulative_sum,
                detections = self.detections,
                "concept drift detected"
            );
            self.reset();
            return true;
        }
        false
    }

    /// Feed values in order, one flag per value.
    pub fn update_all(&mut self, values: &[f64]) -> Vec<bool> {
        values.iter().map(|v| self.update(*v)).collect()
    }

    pub fn reset(&mut self) {
        self.mean = 0.0;
        self.cumulative_sum = 0.0;
        self.min_cumulative_sum = 0.0;
        self.seeded = false;
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn cumulative_sum(&self) -> f64 {
        self.cumulative_sum
    }

    pub fn min_cumulative_sum(&self) -> f64 {
        self.min_cumulative_sum
    }

    /// Detections since construction.
    pub fn detections(&self) -> u64 {
        self.detections
    }
}

impl Default for PageHinkley {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELTA, Self::DEFAULT_LAMBDA, Self::DEFAULT_ALPHA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_stream_never_drifts() {
        for v in [0.0, 0.3, 1.0, 42.0] {
            let mut ph = PageHinkley::default();
            assert!((0..20_000).all(|_| !ph.update(v)), "drift on constant {v}");
        }
    }

    #[test]
    fn sustained_step_drifts_exactly_once() {
        let mut ph = PageHinkley::default();
        let low = ph.update_all(&vec![0.1; 2_000]);
        assert!(low.iter().all(|d| !d));

        let high = ph.update_all(&vec![1.0; 5_000]);
        assert_eq!(high.iter().filter(|d| **d).count(), 1);
        assert_eq!(ph.detections(), 1);

        // Detection happens within the first hundred high values.
        let first = high.iter().position(|d| *d).unwrap();
        assert!(first < 100, "detected at {first}");
    }

    #[test]
    fn first_value_seeds_the_mean() {
        let mut ph = PageHinkley::default();
        assert!(!ph.update(0.7));
        assert!((ph.mean() - 0.7).abs() < 1e-12);
        assert!((ph.cumulative_sum() + PageHinkley::DEFAULT_DELTA).abs() < 1e-12);
    }

    #[test]
    fn detection_resets_state() {
        let mut ph = PageHinkley::new(0.0, 1.0, 0.999);
        ph.update(0.0);
        assert!(!ph.update(0.9));
        assert!(ph.update(0.9));
        assert_eq!(ph.mean(), 0.0);
        assert_eq!(ph.cumulative_sum(), 0.0);
        assert_eq!(ph.min_cumulative_sum(), 0.0);
    }

    #[test]
    fn state_carries_across_calls() {
        let mut split = PageHinkley::default();
        let mut whole = PageHinkley::default();
        let values: Vec<f64> = (0..500).map(|i| (i % 7) as f64 / 7.0).collect();

        let mut a = split.update_all(&values[..250]);
        a.extend(split.update_all(&values[250..]));
        assert_eq!(a, whole.update_all(&values));
        assert_eq!(split, whole);
    }
}
