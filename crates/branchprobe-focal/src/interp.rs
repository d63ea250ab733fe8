//! Linear interpolation over evenly spaced sample tables.

/// `a + (b - a) * t`.
#[must_use]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Evaluate a table of samples spread evenly across `[0, 1]` at `x`.
///
/// `x` is clamped into range. Empty tables and non-finite `x` yield `None`;
/// a single-entry table is constant.
#[must_use]
pub fn eval_table(table: &[f64], x: f64) -> Option<f64> {
    if table.is_empty() || !x.is_finite() {
        return None;
    }
    if table.len() == 1 {
        return Some(table[0]);
    }
    let x = x.clamp(0.0, 1.0);
    let domain = (table.len() - 1) as f64;
    let pos = x * domain;
    let lo = pos.floor() as usize;
    if lo >= table.len() - 1 {
        return Some(table[table.len() - 1]);
    }
    Some(lerp(table[lo], table[lo + 1], pos - lo as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lerp_endpoints() {
        assert_eq!(lerp(2.0, 4.0, 0.0), 2.0);
        assert_eq!(lerp(2.0, 4.0, 1.0), 4.0);
    }

    #[test]
    fn table_edges() {
        assert_eq!(eval_table(&[], 0.5), None);
        assert_eq!(eval_table(&[1.0, 2.0], f64::NAN), None);
        assert_eq!(eval_table(&[7.0], 0.3), Some(7.0));
        assert_eq!(eval_table(&[0.0, 10.0], 2.0), Some(10.0));
        assert_eq!(eval_table(&[0.0, 10.0], -1.0), Some(0.0));
    }

    #[test]
    fn table_midpoint_is_close() {
        let v = eval_table(&[0.0, 1.0, 4.0], 0.75).unwrap();
        assert!((v - 2.5).abs() < 1e-12);
    }
}
