//! Combination counting and the three positional-probability helpers used by
//! the V2 counting resolver.
//!
//! `combination` uses the multiplicative form rather than `n!/(k!(n-k)!)`
//! directly — reuse distances and thread counts stay small, but factorials
//! of even modest `n` overflow far sooner than the final ratio does.

/// C(n, k), or 0.0 for out-of-range k.
pub fn combination(n: i64, k: i64) -> f64 {
    if k < 0 || k > n || n < 0 {
        return 0.0;
    }
    let k = k.min(n - k);
    let mut result = 1.0f64;
    for i in 0..k {
        result *= (n - i) as f64 / (i + 1) as f64;
    }
    result
}

/// Multinomial coefficient counting how many ordered arrangements a given
/// multiset combination (as produced by `combinations_with_replacement`)
/// represents: `r! / (m_1! * m_2! * ... * m_n!)`.
pub fn multinomial_count(indices: &[usize]) -> f64 {
    let mut counts: std::collections::HashMap<usize, i64> = std::collections::HashMap::new();
    for &i in indices {
        *counts.entry(i).or_insert(0) += 1;
    }
    let mut remaining = indices.len() as i64;
    let mut count = 1.0f64;
    for &m in counts.values() {
        count *= combination(remaining, m);
        remaining -= m;
    }
    count
}

/// Given `l` slots holding `m` type-A and `n` type-B objects, the
/// probability that every B precedes the last A.
pub fn prob_m_after_n(m: i64, n: i64, l: i64) -> f64 {
    let total = combination(l, m) * combination(l - m, n);
    if total == 0.0 {
        return 0.0;
    }
    let mut total_a_before_b = 0.0f64;
    let mut i = m + n;
    while i <= l {
        total_a_before_b += combination(i - 1, m - 1) * combination(i - 1 - (m - 1), n);
        i += 1;
    }
    total_a_before_b / total
}

/// Probability that the last A is within `d` slots of the end of the
/// `l`-slot sequence.
pub fn prob_m_within_d(m: i64, n: i64, l: i64, d: i64) -> f64 {
    let _ = n;
    if d >= l {
        return 1.0;
    }
    let total_a = combination(l, m);
    if total_a == 0.0 {
        return 0.0;
    }
    let mut total_last_a_in_d = 0.0f64;
    let mut i = l - 1;
    while i >= l - d {
        if i >= m - 1 {
            total_last_a_in_d += combination(i, m - 1);
        }
        i -= 1;
    }
    total_last_a_in_d / total_a
}

/// Probability that the last A falls in the `[d1, d2)` window from the end
/// of the `l`-slot sequence.
pub fn prob_m_between_d1_d2(m: i64, n: i64, l: i64, d1: i64, d2: i64) -> f64 {
    let _ = n;
    let d1 = d1.min(l);
    let d2 = d2.min(l);
    if d2 <= d1 {
        return 0.0;
    }
    let d = d2 - d1;
    let x = l - d2;
    let total_a = combination(l, m);
    if total_a == 0.0 {
        return 0.0;
    }
    let mut total_last_a_in_middle = 0.0f64;
    let mut i = x + d - 1;
    while i >= x {
        total_last_a_in_middle += combination(i, m - 1);
        i -= 1;
    }
    total_last_a_in_middle / total_a
}
