//! Gaussian random-walk proposals reflected into a box.

use rand::RngExt;
use rand::rngs::StdRng;

use super::InferenceError;

/// Component-wise box constraints `lower <= theta <= upper`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Bounds {
    /// # Errors
    ///
    /// Returns `InferenceError` if the bounds are empty, differ in length,
    /// are NaN, or have `lower > upper` for any component.
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self, InferenceError> {
        if lower.is_empty() {
            return Err(InferenceError::EmptyParameters);
        }
        if lower.len() != upper.len() {
            return Err(InferenceError::DimensionMismatch {
                expected: lower.len(),
                found: upper.len(),
            });
        }
        for (index, (&lo, &hi)) in lower.iter().zip(&upper).enumerate() {
            if lo.is_nan() || hi.is_nan() || lo > hi {
                return Err(InferenceError::InvertedBounds {
                    index,
                    lower: lo,
                    upper: hi,
                });
            }
        }
        Ok(Self { lower, upper })
    }

    /// `[0, 1]` for every one of `dimension` components.
    ///
    /// # Errors
    ///
    /// Returns `InferenceError::EmptyParameters` when `dimension == 0`.
    pub fn unit(dimension: usize) -> Result<Self, InferenceError> {
        Self::new(vec![0.0; dimension], vec![1.0; dimension])
    }

    #[must_use]
    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    #[must_use]
    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.lower.len()
    }

    /// Whether every component of `theta` lies within the box.
    #[must_use]
    pub fn contains(&self, theta: &[f64]) -> bool {
        theta.len() == self.dimension()
            && theta
                .iter()
                .zip(self.lower.iter().zip(&self.upper))
                .all(|(value, (lo, hi))| (lo..=hi).contains(&value))
    }

    /// # Errors
    ///
    /// Returns `InferenceError` if `theta` has the wrong length or any
    /// component lies outside the box.
    pub fn check(&self, theta: &[f64]) -> Result<(), InferenceError> {
        if theta.len() != self.dimension() {
            return Err(InferenceError::DimensionMismatch {
                expected: self.dimension(),
                found: theta.len(),
            });
        }
        for (index, &value) in theta.iter().enumerate() {
            let (lower, upper) = (self.lower[index], self.upper[index]);
            if !(lower..=upper).contains(&value) {
                return Err(InferenceError::OutOfBounds {
                    index,
                    value,
                    lower,
                    upper,
                });
            }
        }
        Ok(())
    }
}

/// Mirror `value` across the violated boundary until it lies in `[lower, upper]`.
///
/// With two finite bounds the repeated reflections fold onto a triangle
/// wave of period `2 * (upper - lower)`, which is evaluated directly.
#[must_use]
pub fn reflect(value: f64, lower: f64, upper: f64) -> f64 {
    if (lower..=upper).contains(&value) {
        return value;
    }
    if lower == upper {
        return lower;
    }
    if lower.is_finite() && upper.is_finite() {
        let width = upper - lower;
        let folded = (value - lower).rem_euclid(2.0 * width);
        let offset = if folded > width { 2.0f64.mul_add(width, -folded) } else { folded };
        return (lower + offset).clamp(lower, upper);
    }
    if value > upper {
        2.0f64.mul_add(upper, -value)
    } else {
        2.0f64.mul_add(lower, -value)
    }
}

/// Draw `x + N(0, scale^2)` per component and reflect into `bounds`.
///
/// # Errors
///
/// Returns `InferenceError` for a non-positive scale or a vector whose
/// length differs from the bounds.
pub fn reflected_proposal(
    x: &[f64],
    bounds: &Bounds,
    scale: f64,
    rng: &mut StdRng,
) -> Result<Vec<f64>, InferenceError> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(InferenceError::InvalidScale(scale));
    }
    if x.len() != bounds.dimension() {
        return Err(InferenceError::DimensionMismatch {
            expected: bounds.dimension(),
            found: x.len(),
        });
    }

    Ok(x.iter()
        .enumerate()
        .map(|(k, value)| {
            let draw = scale.mul_add(sample_standard_normal(rng), *value);
            reflect(draw, bounds.lower[k], bounds.upper[k])
        })
        .collect())
}

pub(crate) fn sample_standard_normal(rng: &mut StdRng) -> f64 {
    let u1 = (1.0_f64 - rng.random::<f64>()).max(f64::MIN_POSITIVE);
    let u2 = rng.random::<f64>();
    (-2.0_f64 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn reflect_is_identity_inside_bounds() {
        assert!((reflect(0.3, 0.0, 1.0) - 0.3).abs() < 1.0e-15);
        assert!((reflect(1.0, 0.0, 1.0) - 1.0).abs() < 1.0e-15);
    }

    #[test]
    fn reflect_matches_repeated_mirroring() {
        // 2.7 -> 2 * 1 - 2.7 = -0.7 -> 2 * 0 + 0.7 = 0.7
        assert!((reflect(2.7, 0.0, 1.0) - 0.7).abs() < 1.0e-12);
        // -0.2 -> 0.2
        assert!((reflect(-0.2, 0.0, 1.0) - 0.2).abs() < 1.0e-12);
        // 3.2 -> -1.2 -> 1.2 -> 0.8
        assert!((reflect(3.2, 0.0, 1.0) - 0.8).abs() < 1.0e-12);
        // One-sided bound reflects once.
        assert!((reflect(-3.0, 0.0, f64::INFINITY) - 3.0).abs() < 1.0e-12);
        // Degenerate interval collapses onto the point.
        assert!((reflect(5.0, 2.0, 2.0) - 2.0).abs() < 1.0e-15);
    }

    #[test]
    fn large_scale_proposals_stay_in_bounds() {
        let bounds = Bounds::new(vec![0.0, -1.0, 0.2], vec![1.0, 1.0, 0.3]).expect("valid");
        let mut rng = StdRng::seed_from_u64(7);
        let mut x = vec![0.5, 0.0, 0.25];
        for _ in 0..2_000 {
            x = reflected_proposal(&x, &bounds, 250.0, &mut rng).expect("valid proposal");
            assert!(bounds.contains(&x), "{x:?} escaped the bounds");
        }
    }

    #[test]
    fn bounds_validation() {
        assert!(matches!(
            Bounds::new(vec![0.0, 1.0], vec![1.0, 0.5]),
            Err(InferenceError::InvertedBounds { index: 1, .. })
        ));
        assert!(matches!(
            Bounds::new(vec![0.0], vec![1.0, 2.0]),
            Err(InferenceError::DimensionMismatch { .. })
        ));
        assert_eq!(Bounds::unit(0), Err(InferenceError::EmptyParameters));

        let bounds = Bounds::unit(2).expect("valid");
        assert!(matches!(
            bounds.check(&[0.5, 1.5]),
            Err(InferenceError::OutOfBounds { index: 1, .. })
        ));
        assert!(bounds.check(&[0.0, 1.0]).is_ok());
    }

    #[test]
    fn proposal_rejects_bad_inputs() {
        let bounds = Bounds::unit(2).expect("valid");
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            reflected_proposal(&[0.5, 0.5], &bounds, 0.0, &mut rng),
            Err(InferenceError::InvalidScale(_))
        ));
        assert!(matches!(
            reflected_proposal(&[0.5], &bounds, 0.1, &mut rng),
            Err(InferenceError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn standard_normal_has_unit_moments() {
        let mut rng = StdRng::seed_from_u64(2_026);
        let draws: Vec<f64> = (0..20_000).map(|_| sample_standard_normal(&mut rng)).collect();
        let mean = draws.iter().sum::<f64>() / 20_000.0;
        let variance = draws.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / 20_000.0;
        assert!(mean.abs() < 0.05);
        assert!((variance - 1.0).abs() < 0.05);
    }
}
