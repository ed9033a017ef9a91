/// Huber tuning constant (95% efficiency under normal data)
pub const HUBER_K: f64 = 1.345;
/// Consistency factor turning the MAD into a normal-scale estimate
pub const MAD_SCALE_FACTOR: f64 = 1.4826;
/// Lower bound for the scale so residuals stay finite on degenerate data
pub const MIN_SCALE: f64 = 0.001;
pub const DEFAULT_MAX_ITERATIONS: usize = 100;
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Result of a robust estimation run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobustEstimate {
    pub location: f64,
    pub scale: f64,
    /// Reweighting passes performed
    pub iterations: usize,
    /// False when the iteration cap was reached first
    pub converged: bool,
}

impl RobustEstimate {
    fn empty() -> Self {
        Self {
            location: 0.0,
            scale: 0.0,
            iterations: 0,
            converged: true,
        }
    }
}

/// Huber M-estimator of location and scale.
///
/// Starts from the median and the normal-consistent MAD, then alternates
/// weighted-mean updates where samples further than `k` scales from the
/// current location get weight `k / residual`. The scale update is the
/// weighted mean absolute residual. Runs at most `max_iterations` passes.
///
/// Samples must be finite; callers filter NaN and infinities out first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HuberEstimator {
    pub k: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for HuberEstimator {
    fn default() -> Self {
        Self {
            k: HUBER_K,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl HuberEstimator {
    pub fn new(k: f64, max_iterations: usize, tolerance: f64) -> Self {
        Self {
            k,
            max_iterations,
            tolerance,
        }
    }

    /// `(0, 0)` for empty input. Otherwise `scale > 0` and
    /// `location` lies between the smallest and the largest sample.
    pub fn estimate(&self, samples: &[f64]) -> RobustEstimate {
        if samples.is_empty() {
            return RobustEstimate::empty();
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        let mut location = median(&sorted);
        let mut scale = floor_scale(mad(&sorted, location) * MAD_SCALE_FACTOR);

        let mut weights = vec![0.0; samples.len()];
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iterations {
            iterations += 1;
            let previous_location = location;
            let previous_scale = scale;

            for (weight, &x) in weights.iter_mut().zip(samples) {
                let residual = ((x - location) / scale).abs();
                *weight = if residual <= self.k {
                    1.0
                } else {
                    self.k / residual
                };
            }

            // every weight is in (0, 1], so the sum is positive
            let weight_sum: f64 = weights.iter().sum();
            location = weights
                .iter()
                .zip(samples)
                .map(|(w, x)| w * x)
                .sum::<f64>()
                / weight_sum;

            let weighted_residuals: f64 = weights
                .iter()
                .zip(samples)
                .map(|(w, x)| w * (x - location).abs())
                .sum();
            scale = floor_scale(weighted_residuals / weight_sum);

            if (location - previous_location).abs() < self.tolerance
                && (scale - previous_scale).abs() < self.tolerance
            {
                converged = true;
                break;
            }
        }

        RobustEstimate {
            location,
            scale,
            iterations,
            converged,
        }
    }
}

/// Median of already sorted, non-empty data
fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Raw median absolute deviation around `center`
fn mad(sorted: &[f64], center: f64) -> f64 {
    let mut deviations: Vec<f64> = sorted.iter().map(|x| (x - center).abs()).collect();
    deviations.sort_by(f64::total_cmp);
    median(&deviations)
}

fn floor_scale(scale: f64) -> f64 {
    if scale > 0.0 {
        scale
    } else {
        MIN_SCALE
    }
}
