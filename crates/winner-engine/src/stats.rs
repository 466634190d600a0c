//! Order statistics, trend slope and concentration over small samples.
//!
//! Empty inputs never panic: order statistics return `None`, sums and
//! spreads return `0.0`, and [`hhi`] returns `1.0`.

/// Standard median: middle value, or the mean of the two middle values.
#[must_use]
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted(values);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Value at sorted index `floor(n * p)`, clamped to the last element.
///
/// No interpolation: the result is always one of the inputs.
#[must_use]
pub fn percentile_index(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted(values);
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let idx = ((sorted.len() as f64) * p.clamp(0.0, 1.0)).floor() as usize;
    Some(sorted[idx.min(sorted.len() - 1)])
}

#[must_use]
pub fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    Some(sum(values) / n)
}

/// Sample standard deviation (n − 1 denominator); `0.0` below two points.
#[must_use]
pub fn sample_stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values).unwrap_or(0.0);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    #[allow(clippy::cast_precision_loss)]
    let denom = (values.len() - 1) as f64;
    (ss / denom).sqrt()
}

/// Ordinary least-squares slope of `y` against `x`.
///
/// `(nΣxy − ΣxΣy) / (nΣx² − (Σx)²)`; `0.0` with fewer than two points or a
/// zero denominator.
#[must_use]
pub fn slope(points: &[(f64, f64)]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = points.len() as f64;
    let (mut sx, mut sy, mut sxy, mut sxx) = (0.0, 0.0, 0.0, 0.0);
    for &(x, y) in points {
        sx += x;
        sy += y;
        sxy += x * y;
        sxx += x * x;
    }
    let denom = n * sxx - sx * sx;
    if denom == 0.0 {
        return 0.0;
    }
    (n * sxy - sx * sy) / denom
}

/// Herfindahl-Hirschman index of the shares `v_i / Σv`.
///
/// Ranges from `1/K` for an even K-way split to `1.0` for a monopoly. An
/// empty set or a zero total is treated as maximal concentration.
#[must_use]
pub fn hhi(values: &[f64]) -> f64 {
    let total = sum(values);
    if values.is_empty() || total <= 0.0 {
        return 1.0;
    }
    values.iter().map(|v| (v / total).powi(2)).sum()
}

/// Relative change `(from − to) / from`; `None` when `from` is not positive.
#[must_use]
pub fn relative_drop(from: f64, to: f64) -> Option<f64> {
    if from > 0.0 {
        Some((from - to) / from)
    } else {
        None
    }
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn percentile_index_uses_floor_without_interpolation() {
        let v: Vec<f64> = (1..=10).map(f64::from).collect();
        // floor(10 * 0.9) = 9 -> the largest value
        assert_eq!(percentile_index(&v, 0.9), Some(10.0));
        // floor(10 * 0.5) = 5 -> sixth value
        assert_eq!(percentile_index(&v, 0.5), Some(6.0));
        let v20: Vec<f64> = (1..=20).map(f64::from).collect();
        assert_eq!(percentile_index(&v20, 0.9), Some(19.0));
        assert_eq!(percentile_index(&[], 0.9), None);
    }

    #[test]
    fn percentile_index_clamps_p_of_one() {
        assert_eq!(percentile_index(&[5.0, 1.0], 1.0), Some(5.0));
    }

    #[test]
    fn slope_of_a_line() {
        let pts: Vec<(f64, f64)> = (0..5)
            .map(|x| (f64::from(x), 3.0 * f64::from(x) + 1.0))
            .collect();
        assert!((slope(&pts) - 3.0).abs() < EPS);
    }

    #[test]
    fn slope_degenerate_cases_are_zero() {
        assert_eq!(slope(&[]), 0.0);
        assert_eq!(slope(&[(1.0, 5.0)]), 0.0);
        // every x equal -> zero denominator
        assert_eq!(slope(&[(2.0, 1.0), (2.0, 9.0), (2.0, 4.0)]), 0.0);
    }

    #[test]
    fn hhi_empty_is_one() {
        assert_eq!(hhi(&[]), 1.0);
        assert_eq!(hhi(&[0.0, 0.0]), 1.0);
    }

    #[test]
    fn hhi_even_ten_way_split() {
        let v = vec![100.0; 10];
        assert!((hhi(&v) - 0.10).abs() < EPS);
    }

    #[test]
    fn hhi_monopoly_is_one() {
        assert!((hhi(&[500.0, 0.0, 0.0]) - 1.0).abs() < EPS);
    }

    #[test]
    fn sample_stdev_matches_hand_calculation() {
        // mean 5, squared deviations 9+1+1+9 = 20, / 3
        let sd = sample_stdev(&[2.0, 4.0, 6.0, 8.0]);
        assert!((sd - (20.0_f64 / 3.0).sqrt()).abs() < EPS);
        assert_eq!(sample_stdev(&[7.0]), 0.0);
    }

    #[test]
    fn relative_drop_requires_positive_base() {
        assert_eq!(relative_drop(0.0, 5.0), None);
        assert!((relative_drop(100.0, 70.0).unwrap() - 0.3).abs() < EPS);
    }
}
