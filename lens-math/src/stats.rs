//! Goodness-of-fit helpers for checking random samplers against analytic curves

/// One-sample Kolmogorov-Smirnov statistic
///
/// Largest vertical gap between the empirical CDF of `samples` and `cdf`,
/// checked on both sides of every step. NaN samples are dropped; with no
/// samples left the statistic is 1.
pub fn ks_statistic<F>(samples: &[f64], cdf: F) -> f64
where
    F: Fn(f64) -> f64,
{
    let mut sorted: Vec<f64> = samples.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return 1.0;
    }
    sorted.sort_unstable_by(f64::total_cmp);

    let n = sorted.len() as f64;
    sorted
        .iter()
        .enumerate()
        .map(|(rank, &value)| {
            let model = cdf(value);
            let below = (model - rank as f64 / n).abs();
            let above = ((rank + 1) as f64 / n - model).abs();
            below.max(above)
        })
        .fold(0.0, f64::max)
}

/// Asymptotic KS critical value for `n` samples at significance `alpha`
///
/// Uses `sqrt(-ln(alpha / 2) / 2) / sqrt(n)`, accurate for n above a few
/// dozen. `alpha` outside (0, 1) yields NaN.
pub fn ks_critical_value(n: usize, alpha: f64) -> f64 {
    if !(alpha > 0.0 && alpha < 1.0) {
        return f64::NAN;
    }
    (-0.5 * (alpha / 2.0).ln()).sqrt() / (n as f64).sqrt()
}

/// Median of the non-NaN values, averaging the middle pair for even counts
pub fn median(values: &[f64]) -> Option<f64> {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    let len = finite.len();
    if len == 0 {
        return None;
    }
    finite.sort_unstable_by(f64::total_cmp);

    let mid = len / 2;
    Some(if len % 2 == 1 {
        finite[mid]
    } else {
        0.5 * (finite[mid - 1] + finite[mid])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn uniform_cdf(x: f64) -> f64 {
        x.clamp(0.0, 1.0)
    }

    #[test]
    fn test_bin_midpoints_are_closest_to_uniform() {
        let n = 1000;
        let samples: Vec<f64> = (0..n).map(|i| (i as f64 + 0.5) / n as f64).collect();
        assert_relative_eq!(ks_statistic(&samples, uniform_cdf), 0.5 / n as f64, epsilon = 1e-12);
    }

    #[test]
    fn test_skewed_sample_is_flagged() {
        let samples: Vec<f64> = (0..1000).map(|i| (i as f64 / 1000.0).powi(2)).collect();
        let d = ks_statistic(&samples, uniform_cdf);
        assert!(d > 0.2);
        assert!(d > ks_critical_value(samples.len(), 0.01));
    }

    #[test]
    fn test_no_samples() {
        assert_eq!(ks_statistic(&[], uniform_cdf), 1.0);
        assert_eq!(ks_statistic(&[f64::NAN, f64::NAN], uniform_cdf), 1.0);
    }

    #[test]
    fn test_critical_values_match_tables() {
        // Classic large-sample coefficients 1.224, 1.358, 1.628
        assert_relative_eq!(ks_critical_value(1, 0.10), 1.2239, epsilon = 1e-4);
        assert_relative_eq!(ks_critical_value(100, 0.05), 0.13581, epsilon = 1e-5);
        assert_relative_eq!(ks_critical_value(10_000, 0.01), 0.016276, epsilon = 1e-6);
        assert!(ks_critical_value(10, 0.0).is_nan());
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[f64::NAN, 5.0]), Some(5.0));
        assert_eq!(median(&[f64::NAN]), None);
        assert_eq!(median(&[]), None);
    }
}
