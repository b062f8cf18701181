//! Observation sequence with an explicit missing-value predicate.

/// A bounded sequence of scalar observations.
///
/// Missing values are encoded as non-finite doubles (NaN by convention),
/// and reads outside the sequence bounds are treated as missing as well —
/// some callers filter over a range longer than the data they hold. The
/// missing test lives here, at the sequence boundary, instead of relying
/// on NaN propagating through downstream arithmetic.
#[derive(Clone, Copy, Debug)]
pub struct Observations<'a> {
    data: &'a [f64],
}

impl<'a> Observations<'a> {
    /// Wraps a borrowed slice of observations.
    pub fn new(data: &'a [f64]) -> Self {
        Self { data }
    }

    /// Number of stored values (missing entries included).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the sequence holds no values at all.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at `pos`; NaN when `pos` is out of range.
    pub fn get(&self, pos: usize) -> f64 {
        self.data.get(pos).copied().unwrap_or(f64::NAN)
    }

    /// True when the observation at `pos` carries no information: either
    /// the stored value is non-finite or `pos` is out of range.
    pub fn is_missing(&self, pos: usize) -> bool {
        match self.data.get(pos) {
            Some(v) => !v.is_finite(),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finite_values_are_present() {
        let data = [1.0, -2.5, 0.0];
        let obs = Observations::new(&data);
        assert_eq!(obs.len(), 3);
        assert!(!obs.is_missing(0));
        assert!(!obs.is_missing(2));
        assert_eq!(obs.get(1), -2.5);
    }

    #[test]
    fn nan_and_infinity_are_missing() {
        let data = [1.0, f64::NAN, f64::INFINITY];
        let obs = Observations::new(&data);
        assert!(obs.is_missing(1));
        assert!(obs.is_missing(2));
    }

    #[test]
    fn out_of_range_is_missing() {
        let data = [1.0];
        let obs = Observations::new(&data);
        assert!(obs.is_missing(1));
        assert!(obs.is_missing(100));
        assert!(obs.get(5).is_nan());
    }

    #[test]
    fn empty_sequence() {
        let obs = Observations::new(&[]);
        assert!(obs.is_empty());
        assert!(obs.is_missing(0));
    }
}
