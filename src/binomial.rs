
use lazy_static::lazy_static;

/// Number of rows kept in the pre-computed Pascal triangle, every entry fits into a u64
const TABLE_ROWS: usize = 64;

lazy_static! {
    /// Pascal's triangle, built once on first use and read-only afterwards.
    /// Row `n` holds `binomial(n, k)` for `k` in `0..=n`.
    static ref PASCAL_TRIANGLE: Vec<Vec<u64>> = {
        let mut rows: Vec<Vec<u64>> = Vec::with_capacity(TABLE_ROWS);
        rows.push(vec![1]);
        for n in 1..TABLE_ROWS {
            let previous = &rows[n-1];
            let mut row: Vec<u64> = vec![1; n+1];
            for k in 1..n {
                row[k] = previous[k-1] + previous[k];
            }
            rows.push(row);
        }
        rows
    };
}

/// Returns `n choose k`.
/// Values for `n < 64` come from the shared table, larger ones are computed multiplicatively and saturate at `u64::MAX`.
pub fn binomial_coefficient(n: usize, k: usize) -> u64 {
    if k > n {
        return 0;
    }
    if n < TABLE_ROWS {
        return PASCAL_TRIANGLE[n][k];
    }

    // symmetric, so use the smaller side
    let k = k.min(n - k);
    let mut result: u128 = 1;
    for i in 0..k {
        // result * (n-i) / (i+1) is always integral at this point
        result = result * (n - i) as u128 / (i + 1) as u128;
        if result > u64::MAX as u128 {
            return u64::MAX;
        }
    }
    result as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    /// n! / (k! (n-k)!) without any cleverness
    fn closed_form(n: usize, k: usize) -> u128 {
        let factorial = |x: usize| -> u128 { (1..=x as u128).product() };
        factorial(n) / (factorial(k) * factorial(n - k))
    }

    #[test]
    fn test_table_matches_closed_form() {
        for n in 0..=30 {
            for k in 0..=n {
                assert_eq!(binomial_coefficient(n, k) as u128, closed_form(n, k), "n={n} k={k}");
            }
        }
    }

    #[test]
    fn test_edges() {
        assert_eq!(binomial_coefficient(5, 6), 0);
        assert_eq!(binomial_coefficient(0, 0), 1);
        assert_eq!(binomial_coefficient(63, 0), 1);
        assert_eq!(binomial_coefficient(63, 63), 1);

        // crossing the table boundary gives the same answers as the table side
        assert_eq!(binomial_coefficient(64, 2), 2016);
        assert_eq!(binomial_coefficient(64, 62), 2016);
        assert_eq!(binomial_coefficient(100, 3), 161700);
        assert_eq!(binomial_coefficient(1000, 500), u64::MAX);
    }
}
