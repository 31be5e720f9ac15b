// SPDX-License-Identifier: MIT OR Apache-2.0
//! Element-wise approximate equality between an actual and an expected array.

use qimplant_fixtures::NumericArray;

use crate::rules::Tolerance;

/// Result of comparing two arrays under one tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    /// Elements compared after broadcasting.
    pub compared: usize,
    pub mismatched: usize,
    pub first_mismatch: Option<usize>,
    pub max_abs_diff: f64,
    /// Element counts differ and the expected side cannot broadcast.
    pub length_mismatch: bool,
}

impl Comparison {
    #[must_use]
    pub fn is_match(&self) -> bool {
        !self.length_mismatch && self.mismatched == 0
    }
}

/// Compare `actual` against `expected` element by element.
///
/// Integer pairs are compared exactly; anything involving floats goes through
/// `f64`. A single-element `expected` broadcasts over a non-empty `actual`.
/// Shapes are not compared, only flattened element sequences.
#[must_use]
pub fn compare_arrays(actual: &NumericArray, expected: &NumericArray, tol: Tolerance) -> Comparison {
    let (a, e) = (actual.data(), expected.data());
    match (a.to_i128(), e.to_i128()) {
        (Some(a), Some(e)) => compare_slices(&a, &e, |x, y| {
            (tol.allows_int(x, y), x.abs_diff(y) as f64)
        }),
        _ => compare_slices(&a.to_f64(), &e.to_f64(), |x, y| (tol.allows_f64(x, y), (x - y).abs())),
    }
}

fn compare_slices<T: Copy>(
    actual: &[T],
    expected: &[T],
    check: impl Fn(T, T) -> (bool, f64),
) -> Comparison {
    let broadcast = expected.len() == 1 && !actual.is_empty();
    if !broadcast && actual.len() != expected.len() {
        return Comparison {
            compared: 0,
            mismatched: actual.len().max(expected.len()),
            first_mismatch: None,
            max_abs_diff: f64::NAN,
            length_mismatch: true,
        };
    }

    let mut out = Comparison {
        compared: actual.len(),
        mismatched: 0,
        first_mismatch: None,
        max_abs_diff: 0.0,
        length_mismatch: false,
    };
    for (i, &x) in actual.iter().enumerate() {
        let y = if broadcast { expected[0] } else { expected[i] };
        let (ok, diff) = check(x, y);
        out.max_abs_diff = out.max_abs_diff.max(diff);
        if !ok {
            out.mismatched += 1;
            out.first_mismatch.get_or_insert(i);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use qimplant_fixtures::ArrayData;

    fn u8s(v: &[u8]) -> NumericArray {
        NumericArray::vector(ArrayData::U8(v.to_vec()))
    }

    #[test]
    fn exact_arrays_match() {
        let c = compare_arrays(&u8s(&[1, 2, 3]), &u8s(&[1, 2, 3]), Tolerance::EXACT);
        assert!(c.is_match());
        assert_eq!(c.compared, 3);
        assert_eq!(c.max_abs_diff, 0.0);
    }

    #[test]
    fn reports_count_and_first_index() {
        let c = compare_arrays(&u8s(&[1, 9, 3, 9]), &u8s(&[1, 2, 3, 4]), Tolerance::new(1.0, 0.0));
        assert!(!c.is_match());
        assert_eq!(c.mismatched, 2);
        assert_eq!(c.first_mismatch, Some(1));
        assert_eq!(c.max_abs_diff, 7.0);
    }

    #[test]
    fn single_expected_element_broadcasts() {
        let c = compare_arrays(&u8s(&[4, 5, 4]), &u8s(&[4]), Tolerance::new(1.0, 0.0));
        assert!(c.is_match());
        assert_eq!(c.compared, 3);
    }

    #[test]
    fn empty_actual_does_not_absorb_scalar_expected() {
        let c = compare_arrays(&u8s(&[]), &u8s(&[200]), Tolerance::EXACT);
        assert!(c.length_mismatch);
        assert!(!c.is_match());
        assert!(compare_arrays(&u8s(&[]), &u8s(&[]), Tolerance::EXACT).is_match());
    }

    #[test]
    fn length_mismatch_never_matches() {
        let c = compare_arrays(&u8s(&[1, 2]), &u8s(&[1, 2, 3]), Tolerance::new(100.0, 0.0));
        assert!(c.length_mismatch);
        assert!(!c.is_match());
    }

    #[test]
    fn mixed_int_float_goes_through_f64() {
        let actual = NumericArray::vector(ArrayData::I64(vec![3]));
        let expected = NumericArray::vector(ArrayData::F32(vec![2.5]));
        assert!(compare_arrays(&actual, &expected, Tolerance::new(0.5, 0.0)).is_match());
        assert!(!compare_arrays(&actual, &expected, Tolerance::new(0.25, 0.0)).is_match());
    }

    #[test]
    fn u64_extremes_compare_exactly() {
        let actual = NumericArray::vector(ArrayData::U64(vec![u64::MAX]));
        let expected = NumericArray::vector(ArrayData::U64(vec![u64::MAX - 5]));
        assert!(compare_arrays(&actual, &expected, Tolerance::new(5.0, 0.0)).is_match());
        let expected = NumericArray::vector(ArrayData::U64(vec![u64::MAX - 6]));
        assert!(!compare_arrays(&actual, &expected, Tolerance::new(5.0, 0.0)).is_match());
    }
}
