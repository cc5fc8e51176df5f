//! Multilinear lookup tables with edge clamping.
//!
//! A table has zero or more axes. Each axis holds strictly increasing
//! breakpoints; the values are stored row-major with the first axis outermost.
//! Inputs outside an axis' domain are clamped to its first/last breakpoint, so
//! the table never extrapolates.

use crate::error::{ControlError, ControlResult};

/// Largest number of axes a table may have.
pub const MAX_AXES: usize = 6;

/// One independent axis of a lookup table.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    breakpoints: Vec<f64>,
}

impl Axis {
    /// Create an axis. Breakpoints must be finite, non-empty and strictly increasing.
    pub fn new(breakpoints: Vec<f64>) -> ControlResult<Self> {
        if breakpoints.is_empty() {
            return Err(ControlError::InvalidArg {
                what: "axis needs at least one breakpoint",
            });
        }
        if breakpoints.iter().any(|b| !b.is_finite()) {
            return Err(ControlError::InvalidArg {
                what: "axis breakpoints must be finite",
            });
        }
        if breakpoints.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ControlError::InvalidArg {
                what: "axis breakpoints must be strictly increasing",
            });
        }
        Ok(Self { breakpoints })
    }

    pub fn breakpoints(&self) -> &[f64] {
        &self.breakpoints
    }

    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }

    /// Lower bracketing index and the fractional position towards the next
    /// breakpoint, after clamping `x` to the axis domain.
    ///
    /// A single-breakpoint axis always yields `(0, 0.0)`.
    pub fn bracket(&self, x: f64) -> (usize, f64) {
        let bp = &self.breakpoints;
        let n = bp.len();
        if n == 1 {
            return (0, 0.0);
        }
        let x = x.clamp(bp[0], bp[n - 1]);
        let lo = bp.partition_point(|b| *b <= x).saturating_sub(1).min(n - 2);
        let t = (x - bp[lo]) / (bp[lo + 1] - bp[lo]);
        (lo, t.clamp(0.0, 1.0))
    }
}

/// Lookup table over [`Axis`] breakpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupTable {
    axes: Vec<Axis>,
    values: Vec<f64>,
    strides: Vec<usize>,
}

impl LookupTable {
    /// Create a table. `values.len()` must equal the product of the axis
    /// lengths (1 for a table without axes).
    pub fn new(axes: Vec<Axis>, values: Vec<f64>) -> ControlResult<Self> {
        if axes.len() > MAX_AXES {
            return Err(ControlError::InvalidArg {
                what: "too many table axes",
            });
        }
        let expected: usize = axes.iter().map(Axis::len).product();
        if values.len() != expected {
            return Err(ControlError::InvalidArg {
                what: "table value count must equal the product of axis lengths",
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ControlError::InvalidArg {
                what: "table values must be finite",
            });
        }

        let mut strides = vec![1; axes.len()];
        for k in (0..axes.len().saturating_sub(1)).rev() {
            strides[k] = strides[k + 1] * axes[k + 1].len();
        }

        Ok(Self {
            axes,
            values,
            strides,
        })
    }

    /// Single-axis convenience constructor from `(breakpoint, value)` pairs.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> ControlResult<Self> {
        let axis = Axis::new(pairs.iter().map(|p| p.0).collect())?;
        Self::new(vec![axis], pairs.iter().map(|p| p.1).collect())
    }

    /// Table without axes: always yields `value`.
    pub fn constant(value: f64) -> ControlResult<Self> {
        Self::new(Vec::new(), vec![value])
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of axes (and therefore of inputs `evaluate` expects).
    pub fn dimensions(&self) -> usize {
        self.axes.len()
    }

    /// Interpolate at `inputs`, one value per axis.
    ///
    /// Returns `None` if the input count is wrong or any input is NaN.
    pub fn evaluate(&self, inputs: &[f64]) -> Option<f64> {
        if inputs.len() != self.axes.len() || inputs.iter().any(|x| x.is_nan()) {
            return None;
        }

        let mut lows = [0usize; MAX_AXES];
        let mut fracs = [0f64; MAX_AXES];
        for (k, (axis, x)) in self.axes.iter().zip(inputs).enumerate() {
            let (lo, t) = axis.bracket(*x);
            lows[k] = lo;
            fracs[k] = t;
        }

        let dims = self.axes.len();
        let mut acc = 0.0;
        // Visit the 2^dims corners of the enclosing cell.
        for corner in 0..(1usize << dims) {
            let mut weight = 1.0;
            let mut index = 0;
            for k in 0..dims {
                let upper = corner & (1 << k) != 0;
                if upper && self.axes[k].len() == 1 {
                    weight = 0.0;
                    break;
                }
                weight *= if upper { fracs[k] } else { 1.0 - fracs[k] };
                index += (lows[k] + usize::from(upper)) * self.strides[k];
            }
            if weight != 0.0 {
                acc += weight * self.values[index];
            }
        }
        Some(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn axis_rejects_bad_breakpoints() {
        assert!(Axis::new(vec![]).is_err());
        assert!(Axis::new(vec![0.0, 0.0]).is_err());
        assert!(Axis::new(vec![1.0, 0.5]).is_err());
        assert!(Axis::new(vec![0.0, f64::NAN]).is_err());
        assert!(Axis::new(vec![3.0]).is_ok());
    }

    #[test]
    fn single_axis_interpolates_and_clamps() {
        let table = LookupTable::from_pairs(&[(0.0, 10.0), (100.0, 20.0)]).unwrap();
        assert_eq!(table.evaluate(&[50.0]), Some(15.0));
        assert_eq!(table.evaluate(&[150.0]), Some(20.0));
        assert_eq!(table.evaluate(&[-5.0]), Some(10.0));
        assert_eq!(table.evaluate(&[100.0]), Some(20.0));
    }

    #[test]
    fn single_axis_hits_interior_breakpoints_exactly() {
        let table =
            LookupTable::from_pairs(&[(600.0, 130.0), (900.0, 125.0), (1100.0, 120.0)]).unwrap();
        assert_eq!(table.evaluate(&[900.0]), Some(125.0));
        assert_eq!(table.evaluate(&[1000.0]), Some(122.5));
    }

    #[test]
    fn bilinear_matches_hand_computation() {
        // rows: speed 1000, 2000; columns: load 0, 50
        let table = LookupTable::new(
            vec![
                Axis::new(vec![1000.0, 2000.0]).unwrap(),
                Axis::new(vec![0.0, 50.0]).unwrap(),
            ],
            vec![10.0, 20.0, 30.0, 60.0],
        )
        .unwrap();
        let v = table.evaluate(&[1500.0, 25.0]).unwrap();
        assert!((v - 30.0).abs() < 1e-12);
        // clamp on both axes
        assert_eq!(table.evaluate(&[5000.0, 100.0]), Some(60.0));
        assert_eq!(table.evaluate(&[0.0, 50.0]), Some(20.0));
    }

    #[test]
    fn single_breakpoint_axis_is_constant_along_it() {
        let table = LookupTable::new(
            vec![
                Axis::new(vec![5.0]).unwrap(),
                Axis::new(vec![0.0, 10.0]).unwrap(),
            ],
            vec![1.0, 3.0],
        )
        .unwrap();
        assert_eq!(table.evaluate(&[-100.0, 5.0]), Some(2.0));
        assert_eq!(table.evaluate(&[100.0, 5.0]), Some(2.0));
    }

    #[test]
    fn constant_table_has_no_inputs() {
        let table = LookupTable::constant(4.0).unwrap();
        assert_eq!(table.dimensions(), 0);
        assert_eq!(table.evaluate(&[]), Some(4.0));
        assert_eq!(table.evaluate(&[1.0]), None);
    }

    #[test]
    fn nan_input_is_undefined() {
        let table = LookupTable::from_pairs(&[(0.0, 1.0), (1.0, 2.0)]).unwrap();
        assert_eq!(table.evaluate(&[f64::NAN]), None);
    }

    #[test]
    fn value_count_must_match() {
        let axis = Axis::new(vec![0.0, 1.0]).unwrap();
        assert!(LookupTable::new(vec![axis], vec![1.0]).is_err());
    }

    fn increasing_pairs() -> impl Strategy<Value = Vec<(f64, f64)>> {
        prop::collection::vec((0.1f64..50.0, -1000.0f64..1000.0), 2..12).prop_map(|steps| {
            let mut x = -100.0;
            steps
                .into_iter()
                .map(|(dx, v)| {
                    x += dx;
                    (x, v)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn in_domain_output_lies_between_bracketing_values(
            pairs in increasing_pairs(),
            frac in 0.0f64..=1.0,
        ) {
            let table = LookupTable::from_pairs(&pairs).unwrap();
            let first = pairs[0].0;
            let last = pairs[pairs.len() - 1].0;
            let x = (first + frac * (last - first)).min(last);
            let y = table.evaluate(&[x]).unwrap();

            let hi = pairs.iter().position(|p| p.0 >= x).unwrap();
            let lo = if pairs[hi].0 == x { hi } else { hi - 1 };
            let (a, b) = (pairs[lo].1, pairs[hi].1);
            let tol = 1e-9 * (1.0 + a.abs().max(b.abs()));
            prop_assert!(y >= a.min(b) - tol && y <= a.max(b) + tol);
        }

        #[test]
        fn out_of_domain_output_equals_edge_value(
            pairs in increasing_pairs(),
            beyond in 0.0f64..1e6,
        ) {
            let table = LookupTable::from_pairs(&pairs).unwrap();
            let first = pairs[0];
            let last = pairs[pairs.len() - 1];
            prop_assert_eq!(table.evaluate(&[first.0 - beyond]), Some(first.1));
            prop_assert_eq!(table.evaluate(&[last.0 + beyond]), Some(last.1));
        }
    }
}
