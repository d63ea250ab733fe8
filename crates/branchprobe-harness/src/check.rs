//! Assertion recording.
//!
//! A [`Recorder`] collects one [`CheckOutcome`] per evaluated check. A failed
//! check never unwinds: it is written to the diagnostic stream straight away
//! and kept for the case report.

use std::fmt::Debug;
use std::io::Write;

use serde::{Deserialize, Serialize};

/// Absolute tolerance used for float checks unless configured otherwise.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

/// Source position of a check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
}

impl Location {
    fn from_caller(caller: &std::panic::Location<'_>) -> Self {
        Self {
            file: caller.file().to_string(),
            line: caller.line(),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Result of one evaluated check. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub description: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// Float types compared with an absolute tolerance instead of `==`.
pub trait ApproxEq: Copy + Debug {
    fn approx_eq(self, other: Self, tolerance: f64) -> bool;
}

impl ApproxEq for f64 {
    fn approx_eq(self, other: Self, tolerance: f64) -> bool {
        // Equal infinities have a NaN difference.
        self == other || (self - other).abs() <= tolerance
    }
}

impl ApproxEq for f32 {
    fn approx_eq(self, other: Self, tolerance: f64) -> bool {
        f64::from(self).approx_eq(f64::from(other), tolerance)
    }
}

/// Equality as a check sees it: exact for discrete values, within a tolerance
/// for floats and anything containing them.
///
/// Implement it for your own float-free types with [`exact_check_eq!`].
pub trait CheckEq: Debug {
    fn eq_within(&self, other: &Self, tolerance: f64) -> bool;
}

/// Implement [`CheckEq`] as plain `==` for types with no float inside.
#[macro_export]
macro_rules! exact_check_eq {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::CheckEq for $ty {
                fn eq_within(&self, other: &Self, _tolerance: f64) -> bool {
                    self == other
                }
            }
        )+
    };
}

exact_check_eq!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, (), str,
    String, std::cmp::Ordering,
);

impl CheckEq for f64 {
    fn eq_within(&self, other: &Self, tolerance: f64) -> bool {
        self.approx_eq(*other, tolerance)
    }
}

impl CheckEq for f32 {
    fn eq_within(&self, other: &Self, tolerance: f64) -> bool {
        self.approx_eq(*other, tolerance)
    }
}

impl<T: CheckEq + ?Sized> CheckEq for &T {
    fn eq_within(&self, other: &Self, tolerance: f64) -> bool {
        (**self).eq_within(*other, tolerance)
    }
}

impl<T: CheckEq + ?Sized> CheckEq for Box<T> {
    fn eq_within(&self, other: &Self, tolerance: f64) -> bool {
        (**self).eq_within(other, tolerance)
    }
}

impl<T: CheckEq> CheckEq for Option<T> {
    fn eq_within(&self, other: &Self, tolerance: f64) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.eq_within(b, tolerance),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: CheckEq, E: CheckEq> CheckEq for Result<T, E> {
    fn eq_within(&self, other: &Self, tolerance: f64) -> bool {
        match (self, other) {
            (Ok(a), Ok(b)) => a.eq_within(b, tolerance),
            (Err(a), Err(b)) => a.eq_within(b, tolerance),
            _ => false,
        }
    }
}

impl<T: CheckEq> CheckEq for [T] {
    fn eq_within(&self, other: &Self, tolerance: f64) -> bool {
        self.len() == other.len()
            && self.iter().zip(other).all(|(a, b)| a.eq_within(b, tolerance))
    }
}

impl<T: CheckEq, const N: usize> CheckEq for [T; N] {
    fn eq_within(&self, other: &Self, tolerance: f64) -> bool {
        self.as_slice().eq_within(other.as_slice(), tolerance)
    }
}

impl<T: CheckEq> CheckEq for Vec<T> {
    fn eq_within(&self, other: &Self, tolerance: f64) -> bool {
        self.as_slice().eq_within(other.as_slice(), tolerance)
    }
}

macro_rules! tuple_check_eq {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: CheckEq),+> CheckEq for ($($name,)+) {
            fn eq_within(&self, other: &Self, tolerance: f64) -> bool {
                true $(&& self.$idx.eq_within(&other.$idx, tolerance))+
            }
        }
    };
}

tuple_check_eq!(A: 0);
tuple_check_eq!(A: 0, B: 1);
tuple_check_eq!(A: 0, B: 1, C: 2);
tuple_check_eq!(A: 0, B: 1, C: 2, D: 3);

/// Per-case check recorder.
pub struct Recorder<'a> {
    case: String,
    tolerance: f64,
    outcomes: Vec<CheckOutcome>,
    diag: &'a mut dyn Write,
}

impl<'a> Recorder<'a> {
    /// Create a recorder for `case` that writes failures to `diag`.
    pub fn new(case: impl Into<String>, tolerance: f64, diag: &'a mut dyn Write) -> Self {
        Self {
            case: case.into(),
            tolerance,
            outcomes: Vec::new(),
            diag,
        }
    }

    /// Name of the case being recorded.
    #[must_use]
    pub fn case_name(&self) -> &str {
        &self.case
    }

    /// Default absolute tolerance for float checks.
    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Record `condition` under `description`. Returns `condition`.
    #[track_caller]
    pub fn record_check(&mut self, condition: bool, description: impl Into<String>) -> bool {
        let location = Location::from_caller(std::panic::Location::caller());
        self.push(condition, description.into(), None, Some(location))
    }

    /// Record `actual == expected`. Floats, and values holding floats, are
    /// compared within the recorder's tolerance.
    #[track_caller]
    pub fn record_eq<T: CheckEq>(
        &mut self,
        actual: T,
        expected: T,
        description: impl Into<String>,
    ) -> bool {
        let location = Location::from_caller(std::panic::Location::caller());
        let passed = actual.eq_within(&expected, self.tolerance);
        let detail = Some((format!("{expected:?}"), format!("{actual:?}")));
        self.push(passed, description.into(), detail, Some(location))
    }

    /// Record `actual != unexpected`, with the same float tolerance as
    /// [`Recorder::record_eq`].
    #[track_caller]
    pub fn record_ne<T: CheckEq>(
        &mut self,
        actual: T,
        unexpected: T,
        description: impl Into<String>,
    ) -> bool {
        let location = Location::from_caller(std::panic::Location::caller());
        let passed = !actual.eq_within(&unexpected, self.tolerance);
        let detail = Some((format!("anything but {unexpected:?}"), format!("{actual:?}")));
        self.push(passed, description.into(), detail, Some(location))
    }

    /// Record `|actual - expected| <= tolerance` using the recorder's tolerance.
    #[track_caller]
    pub fn record_close<T: ApproxEq>(
        &mut self,
        actual: T,
        expected: T,
        description: impl Into<String>,
    ) -> bool {
        let location = Location::from_caller(std::panic::Location::caller());
        self.close_at(actual, expected, self.tolerance, description.into(), location)
    }

    /// Like [`Recorder::record_close`] with an explicit tolerance.
    #[track_caller]
    pub fn record_close_within<T: ApproxEq>(
        &mut self,
        actual: T,
        expected: T,
        tolerance: f64,
        description: impl Into<String>,
    ) -> bool {
        let location = Location::from_caller(std::panic::Location::caller());
        self.close_at(actual, expected, tolerance, description.into(), location)
    }

    /// Record that `value` is `Some`.
    #[track_caller]
    pub fn record_some<T: Debug>(&mut self, value: &Option<T>, description: impl Into<String>) -> bool {
        let location = Location::from_caller(std::panic::Location::caller());
        let detail = Some(("Some(_)".to_string(), format!("{value:?}")));
        self.push(value.is_some(), description.into(), detail, Some(location))
    }

    #[track_caller]
    pub fn record_none<T: Debug>(&mut self, value: &Option<T>, description: impl Into<String>) -> bool {
        let location = Location::from_caller(std::panic::Location::caller());
        let detail = Some(("None".to_string(), format!("{value:?}")));
        self.push(value.is_none(), description.into(), detail, Some(location))
    }

    #[track_caller]
    pub fn record_ok<T: Debug, E: Debug>(
        &mut self,
        value: &Result<T, E>,
        description: impl Into<String>,
    ) -> bool {
        let location = Location::from_caller(std::panic::Location::caller());
        let detail = Some(("Ok(_)".to_string(), format!("{value:?}")));
        self.push(value.is_ok(), description.into(), detail, Some(location))
    }

    #[track_caller]
    pub fn record_err<T: Debug, E: Debug>(
        &mut self,
        value: &Result<T, E>,
        description: impl Into<String>,
    ) -> bool {
        let location = Location::from_caller(std::panic::Location::caller());
        let detail = Some(("Err(_)".to_string(), format!("{value:?}")));
        self.push(value.is_err(), description.into(), detail, Some(location))
    }

    /// Record an unconditional failure, e.g. a fixture that could not be set up.
    pub fn fail(&mut self, description: impl Into<String>, location: Option<Location>) {
        self.push(false, description.into(), None, location);
    }

    /// Outcomes recorded so far, in check order.
    #[must_use]
    pub fn outcomes(&self) -> &[CheckOutcome] {
        &self.outcomes
    }

    /// Number of failed checks so far.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.passed).count()
    }

    #[must_use]
    pub fn into_outcomes(self) -> Vec<CheckOutcome> {
        self.outcomes
    }

    fn close_at<T: ApproxEq>(
        &mut self,
        actual: T,
        expected: T,
        tolerance: f64,
        description: String,
        location: Location,
    ) -> bool {
        let passed = actual.approx_eq(expected, tolerance);
        let detail = Some((format!("{expected:?} ± {tolerance:e}"), format!("{actual:?}")));
        self.push(passed, description, detail, Some(location))
    }

    fn push(
        &mut self,
        passed: bool,
        description: String,
        detail: Option<(String, String)>,
        location: Option<Location>,
    ) -> bool {
        let (expected, actual) = match detail {
            Some((e, a)) => (Some(e), Some(a)),
            None => (None, None),
        };
        let outcome = CheckOutcome {
            description,
            passed,
            expected,
            actual,
            location,
        };
        if !passed {
            self.write_diagnostic(&outcome);
        }
        self.outcomes.push(outcome);
        passed
    }

    fn write_diagnostic(&mut self, outcome: &CheckOutcome) {
        // A broken diagnostic stream must not turn a failed check into a crash.
        let _ = match &outcome.location {
            Some(loc) => writeln!(self.diag, "  [{}] {loc}: {}", self.case, outcome.description),
            None => writeln!(self.diag, "  [{}] {}", self.case, outcome.description),
        };
        if let (Some(expected), Some(actual)) = (&outcome.expected, &outcome.actual) {
            let _ = writeln!(self.diag, "      expected: {expected}");
            let _ = writeln!(self.diag, "        actual: {actual}");
        }
    }
}

/// Check a boolean condition; the description defaults to the expression text.
#[macro_export]
macro_rules! check {
    ($rec:expr, $cond:expr $(,)?) => {
        $rec.record_check($cond, stringify!($cond))
    };
    ($rec:expr, $cond:expr, $($msg:tt)+) => {
        $rec.record_check($cond, format!($($msg)+))
    };
}

/// Check `actual == expected`; floats compare within the recorder's tolerance.
#[macro_export]
macro_rules! check_eq {
    ($rec:expr, $actual:expr, $expected:expr $(,)?) => {
        $rec.record_eq(
            $actual,
            $expected,
            concat!(stringify!($actual), " == ", stringify!($expected)),
        )
    };
    ($rec:expr, $actual:expr, $expected:expr, $($msg:tt)+) => {
        $rec.record_eq($actual, $expected, format!($($msg)+))
    };
}

#[macro_export]
macro_rules! check_ne {
    ($rec:expr, $actual:expr, $unexpected:expr $(,)?) => {
        $rec.record_ne(
            $actual,
            $unexpected,
            concat!(stringify!($actual), " != ", stringify!($unexpected)),
        )
    };
    ($rec:expr, $actual:expr, $unexpected:expr, $($msg:tt)+) => {
        $rec.record_ne($actual, $unexpected, format!($($msg)+))
    };
}

/// Check two floats are within tolerance (the recorder's, or an explicit one).
#[macro_export]
macro_rules! check_close {
    ($rec:expr, $actual:expr, $expected:expr $(,)?) => {
        $rec.record_close(
            $actual,
            $expected,
            concat!(stringify!($actual), " ≈ ", stringify!($expected)),
        )
    };
    ($rec:expr, $actual:expr, $expected:expr, tolerance = $tol:expr $(,)?) => {
        $rec.record_close_within(
            $actual,
            $expected,
            $tol,
            concat!(stringify!($actual), " ≈ ", stringify!($expected)),
        )
    };
}

/// Check a condition and end the case body when it does not hold.
///
/// For checks later code depends on. The body must return `()`.
#[macro_export]
macro_rules! require {
    ($rec:expr, $cond:expr $(,)?) => {
        if !$rec.record_check($cond, stringify!($cond)) {
            return;
        }
    };
    ($rec:expr, $cond:expr, $($msg:tt)+) => {
        if !$rec.record_check($cond, format!($($msg)+)) {
            return;
        }
    };
}

/// Unwrap an `Option` or `Result`, recording one check, and end the case
/// body when there is no value.
#[macro_export]
macro_rules! require_some {
    (@with $rec:expr, $value:expr, $desc:expr) => {
        match $crate::check::Unwrappable::into_value($value) {
            Some(value) => {
                $rec.record_check(true, $desc);
                value
            }
            None => {
                $rec.record_check(false, $desc);
                return;
            }
        }
    };
    ($rec:expr, $value:expr $(,)?) => {
        $crate::require_some!(@with $rec, $value, concat!(stringify!($value), " has a value"))
    };
    ($rec:expr, $value:expr, $($msg:tt)+) => {
        $crate::require_some!(@with $rec, $value, format!($($msg)+))
    };
}

/// Values [`require_some!`] can unwrap.
pub trait Unwrappable {
    type Value;

    fn into_value(self) -> Option<Self::Value>;
}

impl<T> Unwrappable for Option<T> {
    type Value = T;

    fn into_value(self) -> Option<T> {
        self
    }
}

impl<T, E> Unwrappable for Result<T, E> {
    type Value = T;

    fn into_value(self) -> Option<T> {
        self.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diag_text(buf: &[u8]) -> String {
        String::from_utf8_lossy(buf).into_owned()
    }

    #[test]
    fn passing_check_writes_no_diagnostic() {
        let mut diag = Vec::new();
        let mut rec = Recorder::new("case", DEFAULT_TOLERANCE, &mut diag);
        assert!(rec.record_check(true, "holds"));
        assert_eq!(rec.outcomes().len(), 1);
        assert_eq!(rec.failed_count(), 0);
        drop(rec);
        assert!(diag.is_empty());
    }

    #[test]
    fn failed_check_is_reported_immediately_with_location() {
        let mut diag = Vec::new();
        let mut rec = Recorder::new("alloc_path", DEFAULT_TOLERANCE, &mut diag);
        assert!(!rec.record_check(false, "pointer should be non-null"));
        let outcome = rec.outcomes()[0].clone();
        drop(rec);

        assert!(!outcome.passed);
        let loc = outcome.location.expect("caller location captured");
        assert!(loc.file.ends_with("check.rs"));
        let text = diag_text(&diag);
        assert!(text.contains("[alloc_path]"));
        assert!(text.contains("pointer should be non-null"));
    }

    #[test]
    fn equality_failure_carries_expected_and_actual() {
        let mut diag = Vec::new();
        let mut rec = Recorder::new("eq", DEFAULT_TOLERANCE, &mut diag);
        rec.record_eq(3, 4, "count");
        let outcome = rec.outcomes()[0].clone();
        drop(rec);
        assert_eq!(outcome.expected.as_deref(), Some("4"));
        assert_eq!(outcome.actual.as_deref(), Some("3"));
        let text = diag_text(&diag);
        assert!(text.contains("expected: 4"));
        assert!(text.contains("actual: 3"));
    }

    #[test]
    fn float_within_tolerance_passes_and_outside_fails() {
        let mut diag = Vec::new();
        let mut rec = Recorder::new("float", 1e-9, &mut diag);
        assert!(rec.record_close(1.0_f64, 1.0 + 5e-10, "inside"));
        assert!(!rec.record_close(1.0_f64, 1.0 + 5e-9, "outside"));
        assert!(rec.record_close_within(0.5_f32, 0.5001, 1e-3, "explicit"));
        assert_eq!(rec.failed_count(), 1);
    }

    #[test]
    fn nan_never_compares_close() {
        assert!(!f64::NAN.approx_eq(f64::NAN, 1.0));
        assert!(f64::INFINITY.approx_eq(f64::INFINITY, 0.0));
        assert!(!f64::INFINITY.approx_eq(f64::NEG_INFINITY, 0.0));
    }

    #[test]
    fn option_and_result_helpers() {
        let mut diag = Vec::new();
        let mut rec = Recorder::new("shapes", DEFAULT_TOLERANCE, &mut diag);
        assert!(rec.record_some(&Some(1), "some"));
        assert!(rec.record_none::<u8>(&None, "none"));
        assert!(rec.record_ok::<u8, ()>(&Ok(1), "ok"));
        assert!(!rec.record_err::<u8, ()>(&Ok(1), "err"));
        assert_eq!(rec.outcomes().len(), 4);
        assert_eq!(rec.failed_count(), 1);
    }

    #[test]
    fn macros_describe_the_expression() {
        let mut diag = Vec::new();
        let mut rec = Recorder::new("macros", DEFAULT_TOLERANCE, &mut diag);
        let n = 2;
        check!(rec, n + 1 == 3);
        check_eq!(rec, n * 2, 4);
        check_ne!(rec, n, 0, "n must be nonzero, got {n}");
        check_close!(rec, 0.1 + 0.2, 0.3);
        check_close!(rec, 1.0, 1.05, tolerance = 0.1);
        let outcomes = rec.into_outcomes();
        assert!(outcomes.iter().all(|o| o.passed));
        assert_eq!(outcomes[0].description, "n + 1 == 3");
        assert_eq!(outcomes[1].description, "n * 2 == 4");
        assert_eq!(outcomes[2].description, "n must be nonzero, got 2");
    }

    #[test]
    fn float_equality_uses_tolerance() {
        let mut diag = Vec::new();
        let mut rec = Recorder::new("float_eq", DEFAULT_TOLERANCE, &mut diag);
        assert!(check_eq!(rec, 0.1 + 0.2, 0.3));
        assert!(check_eq!(rec, Some(0.1_f64 * 3.0), Some(0.3)));
        assert!(check_eq!(rec, vec![(1, 0.1 + 0.2)], vec![(1, 0.3)]));
        assert!(!check_eq!(rec, 1.0, 1.0 + 5e-9));
        assert!(!check_ne!(rec, 0.1 + 0.2, 0.3));
        assert!(!check_eq!(rec, Some(0.3), None));
        assert_eq!(rec.failed_count(), 3);
    }

    #[test]
    fn float_equality_follows_recorder_tolerance() {
        let mut diag = Vec::new();
        let mut rec = Recorder::new("loose", 1e-3, &mut diag);
        assert!(rec.record_eq(2.0_f64, 2.0005, "within 1e-3"));
        assert!(!rec.record_eq(2.0_f64, 2.01, "beyond 1e-3"));
    }

    #[derive(Debug, PartialEq)]
    struct Slot {
        chunk: usize,
        offset: usize,
    }

    exact_check_eq!(Slot);

    #[test]
    fn own_types_opt_into_exact_equality() {
        let mut diag = Vec::new();
        let mut rec = Recorder::new("slots", DEFAULT_TOLERANCE, &mut diag);
        let slot = Some(Slot { chunk: 0, offset: 8 });
        assert!(check_eq!(rec, slot.as_ref(), Some(&Slot { chunk: 0, offset: 8 })));
        assert!(!check_eq!(rec, slot, Some(Slot { chunk: 1, offset: 8 })));
    }

    fn guarded(rec: &mut Recorder<'_>, value: Option<u32>, reached: &mut bool) {
        let value = require_some!(rec, value);
        require!(rec, value > 1, "value {value} too small");
        check_eq!(rec, value, 7);
        *reached = true;
    }

    #[test]
    fn require_ends_the_body_on_failure() {
        let mut diag = Vec::new();
        let mut rec = Recorder::new("require", DEFAULT_TOLERANCE, &mut diag);
        let mut reached = false;
        guarded(&mut rec, None, &mut reached);
        assert!(!reached);
        assert_eq!(rec.outcomes().len(), 1);
        assert_eq!(rec.outcomes()[0].description, "value has a value");

        guarded(&mut rec, Some(1), &mut reached);
        assert!(!reached);
        assert_eq!(rec.outcomes().len(), 3);
        assert_eq!(rec.outcomes()[2].description, "value 1 too small");

        guarded(&mut rec, Some(7), &mut reached);
        assert!(reached);
        assert_eq!(rec.outcomes().len(), 6);
        assert_eq!(rec.failed_count(), 2);
    }

    #[test]
    fn require_some_unwraps_results() {
        let mut diag = Vec::new();
        let mut rec = Recorder::new("result", DEFAULT_TOLERANCE, &mut diag);
        let body = |rec: &mut Recorder<'_>| {
            let parsed: u8 = require_some!(rec, "12".parse::<u8>(), "parse succeeds");
            check_eq!(rec, parsed, 12);
        };
        body(&mut rec);
        assert_eq!(rec.failed_count(), 0);
        assert_eq!(rec.outcomes()[0].description, "parse succeeds");
    }
}
