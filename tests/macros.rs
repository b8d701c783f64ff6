//! Float assertions shared by the integration tests.

/// Assert that two `f64`s, such as a QUAL score or a histogram percentile,
/// differ by at most `epsilon` (default `1e-9`).
///
/// ```text
/// assert_approx_eq!(record.quality, 50.5);
/// assert_approx_eq!(stats.throughput(), 2_000.0, 0.5);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($actual:expr, $expected:expr $(,)?) => {
        assert_approx_eq!($actual, $expected, 1e-9)
    };
    ($actual:expr, $expected:expr, $epsilon:expr $(,)?) => {{
        let (actual, expected, epsilon): (f64, f64, f64) = ($actual, $expected, $epsilon);
        assert!(
            (actual - expected).abs() <= epsilon,
            "{} = {actual} is not within {epsilon} of {expected}",
            stringify!($actual),
        );
    }};
}
