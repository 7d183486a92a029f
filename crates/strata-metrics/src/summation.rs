//! Full-precision floating point summation.
//!
//! Keeps a list of non-overlapping partial sums (Shewchuk's algorithm) so that
//! the result does not depend on the order in which values arrive.

/// Accumulator holding the exact running sum as non-overlapping partials.
///
/// # Examples
///
/// ```
/// use strata_metrics::ExactSum;
///
/// let total: ExactSum = [1e100, 1.0, -1e100].into_iter().collect();
/// assert_eq!(total.value(), 1.0);
///
/// let naive: f64 = [1e100, 1.0, -1e100].iter().sum();
/// assert_eq!(naive, 0.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExactSum {
    partials: Vec<f64>,
}

impl ExactSum {
    /// Empty accumulator with value `0.0`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one value, merging it through the partials largest magnitude first.
    pub fn add(&mut self, value: f64) {
        let mut x = value;
        let mut kept = 0;
        for j in 0..self.partials.len() {
            let mut y = self.partials[j];
            if x.abs() < y.abs() {
                std::mem::swap(&mut x, &mut y);
            }
            let hi = x + y;
            let lo = y - (hi - x);
            if lo != 0.0 {
                self.partials[kept] = lo;
                kept += 1;
            }
            x = hi;
        }
        self.partials.truncate(kept);
        self.partials.push(x);
    }

    /// Current sum rounded to one `f64`.
    pub fn value(&self) -> f64 {
        self.partials.iter().fold(0.0, |acc, p| acc + p)
    }
}

impl Extend<f64> for ExactSum {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for value in iter {
            self.add(value);
        }
    }
}

impl FromIterator<f64> for ExactSum {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut sum = Self::new();
        sum.extend(iter);
        sum
    }
}

/// Sum `values` without intermediate rounding loss.
///
/// # Examples
///
/// ```
/// use strata_metrics::exact_sum;
///
/// assert_eq!(exact_sum([0.1; 10]), 1.0);
/// assert_eq!(exact_sum(std::iter::empty()), 0.0);
/// ```
pub fn exact_sum<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    values.into_iter().collect::<ExactSum>().value()
}

/// Sort ascending in place, then sum exactly.
pub(crate) fn sorted_exact_sum(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    exact_sum(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sum_is_zero() {
        assert_eq!(ExactSum::new().value(), 0.0);
    }

    #[test]
    fn order_does_not_change_result() {
        let forward = exact_sum([1e16, 1.0, 1.0, -1e16]);
        let backward = exact_sum([-1e16, 1.0, 1.0, 1e16]);
        assert_eq!(forward, 2.0);
        assert_eq!(backward, 2.0);
    }

    #[test]
    fn tenths_sum_to_one() {
        let naive: f64 = std::iter::repeat(0.1).take(10).sum();
        assert_ne!(naive, 1.0);
        assert_eq!(exact_sum(std::iter::repeat(0.1).take(10)), 1.0);
    }

    #[test]
    fn extend_keeps_accumulating() {
        let mut sum = ExactSum::new();
        sum.add(0.5);
        sum.extend([0.25, 0.25]);
        assert_eq!(sum.value(), 1.0);
    }

    #[test]
    fn nan_propagates() {
        assert!(exact_sum([1.0, f64::NAN]).is_nan());
    }

    #[test]
    fn sorted_sum_matches_exact_sum() {
        assert_eq!(sorted_exact_sum(vec![3.0, -1.0, 0.5]), 2.5);
    }
}
