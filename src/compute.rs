/// The computation a worker applies to each non-sentinel request value.
///
/// A plain function pointer keeps the protocol layer independent of what is
/// being computed and copies freely into spawned workers.
pub type ComputeFn = fn(i64) -> i64;

/// Iterative factorial over `i64`, the default computation.
///
/// Total over the full input range: anything below `2` produces `1`, and
/// the running product uses wrapping multiplication, so inputs past `20!`
/// overflow silently instead of aborting the worker. Callers that need
/// exact results must stay within `0..=20`.
pub fn factorial(n: i64) -> i64 {
    let mut acc: i64 = 1;
    let mut i: i64 = 2;
    while i <= n {
        acc = acc.wrapping_mul(i);
        i += 1;
    }
    acc
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(-3, 1)]
    #[case(0, 1)]
    #[case(1, 1)]
    #[case(2, 2)]
    #[case(5, 120)]
    #[case(10, 3_628_800)]
    #[case(20, 2_432_902_008_176_640_000)]
    fn factorial_cases(#[case] n: i64, #[case] expected: i64) {
        assert_eq!(factorial(n), expected);
    }

    #[test]
    fn wraps_instead_of_panicking_past_twenty() {
        assert_eq!(factorial(21), factorial(20).wrapping_mul(21));
        // still total far beyond the exact range
        factorial(10_000);
    }
}
