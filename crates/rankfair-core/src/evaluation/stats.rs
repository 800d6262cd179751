//! Significance testing for comparing two recommender runs.
//!
//! Runs are compared user by user: the per-user scores of one metric from
//! both runs are aligned on [`UserId`] and fed to a paired test. Users scored
//! by only one run are dropped from the comparison.
//!
//! - [`paired_ttest`] - two-tailed Student t on the differences
//! - [`wilcoxon_signed_rank`] - rank-based alternative, normal approximation
//! - [`bootstrap_ci`] - percentile interval for the mean of one run
//!
//! # References
//!
//! - Smucker, Allan & Carterette (2007). "A comparison of statistical significance
//!   tests for information retrieval evaluation"
//! - Efron & Tibshirani (1993). "An Introduction to the Bootstrap"

use crate::error::StatsError;
use crate::types::UserId;
use serde::Serialize;
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fmt;

/// Aligns two per-user score maps, returning `(a, b)` pairs in user order.
///
/// # Errors
///
/// [`StatsError::NoCommonUsers`] if the maps share no user.
pub fn paired_scores(
    a: &BTreeMap<UserId, f64>,
    b: &BTreeMap<UserId, f64>,
) -> Result<Vec<(f64, f64)>, StatsError> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .filter_map(|(user, &score_a)| b.get(user).map(|&score_b| (score_a, score_b)))
        .collect();

    if pairs.is_empty() {
        return Err(StatsError::NoCommonUsers);
    }
    Ok(pairs)
}

// ============================================================================
// Paired t-test
// ============================================================================

/// Result of a paired t-test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TTestResult {
    /// Positive when run A scores higher on average
    pub t_statistic: f64,
    /// Two-tailed p-value
    pub p_value: f64,
    pub df: usize,
}

impl TTestResult {
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

impl fmt::Display for TTestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.is_significant(0.05) { "*" } else { "" };
        write!(
            f,
            "t({})={:.3}, p={:.4}{}",
            self.df, self.t_statistic, self.p_value, marker
        )
    }
}

/// Two-tailed paired t-test on `a - b`.
///
/// ```text
/// t = mean(d) / (sd(d) / √n)      df = n - 1
/// ```
///
/// Identical differences (zero variance) give `t = 0, p = 1`.
///
/// # Errors
///
/// [`StatsError::InsufficientSamples`] with fewer than two pairs.
pub fn paired_ttest(pairs: &[(f64, f64)]) -> Result<TTestResult, StatsError> {
    let n = pairs.len();
    if n < 2 {
        return Err(StatsError::InsufficientSamples { needed: 2, got: n });
    }

    let diffs: Vec<f64> = pairs.iter().map(|(a, b)| a - b).collect();
    let df = n - 1;
    let mean = diffs.iter().sum::<f64>() / n as f64;
    let variance = diffs.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / df as f64;
    let std_error = (variance / n as f64).sqrt();

    if std_error == 0.0 {
        return Ok(TTestResult {
            t_statistic: 0.0,
            p_value: 1.0,
            df,
        });
    }

    let t = mean / std_error;
    Ok(TTestResult {
        t_statistic: t,
        p_value: student_t_two_tailed(t, df),
        df,
    })
}

// ============================================================================
// Wilcoxon signed-rank test
// ============================================================================

/// Result of a Wilcoxon signed-rank test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WilcoxonResult {
    /// Rank sum of positive differences (A > B)
    pub w_plus: f64,
    /// Rank sum of negative differences
    pub w_minus: f64,
    pub z: f64,
    /// Two-tailed p-value from the normal approximation
    pub p_value: f64,
    /// Pairs left after discarding zero differences
    pub n: usize,
}

impl fmt::Display for WilcoxonResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "W+={:.1}, W-={:.1}, z={:.3}, p={:.4} (n={})",
            self.w_plus, self.w_minus, self.z, self.p_value, self.n
        )
    }
}

/// Wilcoxon signed-rank test on `a - b`.
///
/// Zero differences are discarded. Tied absolute differences share the
/// average of the ranks they span, and the variance is corrected for ties:
///
/// ```text
/// μ  = n(n+1)/4
/// σ² = n(n+1)(2n+1)/24 − Σ(t³ − t)/48
/// z  = (W+ − μ) / σ
/// ```
///
/// # Errors
///
/// [`StatsError::InsufficientSamples`] when every difference is zero.
pub fn wilcoxon_signed_rank(pairs: &[(f64, f64)]) -> Result<WilcoxonResult, StatsError> {
    let mut diffs: Vec<f64> = pairs
        .iter()
        .map(|(a, b)| a - b)
        .filter(|d| *d != 0.0)
        .collect();
    let n = diffs.len();
    if n == 0 {
        return Err(StatsError::InsufficientSamples { needed: 1, got: 0 });
    }

    diffs.sort_by(|x, y| x.abs().total_cmp(&y.abs()));

    let mut w_plus = 0.0;
    let mut w_minus = 0.0;
    let mut tie_correction = 0.0;
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && diffs[end].abs() == diffs[start].abs() {
            end += 1;
        }
        // Positions start..end hold ranks start+1..=end
        let rank = (start + 1 + end) as f64 / 2.0;
        for d in &diffs[start..end] {
            if *d > 0.0 {
                w_plus += rank;
            } else {
                w_minus += rank;
            }
        }
        let ties = (end - start) as f64;
        tie_correction += ties.powi(3) - ties;
        start = end;
    }

    let n_f = n as f64;
    let mean = n_f * (n_f + 1.0) / 4.0;
    let variance = n_f * (n_f + 1.0) * (2.0 * n_f + 1.0) / 24.0 - tie_correction / 48.0;

    let (z, p_value) = if variance > 0.0 {
        let z = (w_plus - mean) / variance.sqrt();
        (z, normal_two_tailed(z))
    } else {
        (0.0, 1.0)
    };

    Ok(WilcoxonResult {
        w_plus,
        w_minus,
        z,
        p_value,
        n,
    })
}

// ============================================================================
// Bootstrap confidence interval
// ============================================================================

/// Mean with a 95% percentile bootstrap interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BootstrapResult {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

impl fmt::Display for BootstrapResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4} [{:.4}, {:.4}]", self.mean, self.lower, self.upper)
    }
}

/// Resamples `values` with replacement `n_resamples` times and reports the
/// 2.5th and 97.5th percentiles of the resampled means.
///
/// The same `seed` always yields the same interval.
///
/// # Errors
///
/// [`StatsError::InsufficientSamples`] if `values` is empty or no resample
/// is requested.
pub fn bootstrap_ci(
    values: &[f64],
    n_resamples: usize,
    seed: u64,
) -> Result<BootstrapResult, StatsError> {
    if values.is_empty() {
        return Err(StatsError::InsufficientSamples { needed: 1, got: 0 });
    }
    if n_resamples == 0 {
        return Err(StatsError::InsufficientSamples { needed: 1, got: 0 });
    }

    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;

    let mut rng = SplitMix64::new(seed);
    let mut means: Vec<f64> = (0..n_resamples)
        .map(|_| (0..n).map(|_| values[rng.below(n)]).sum::<f64>() / n as f64)
        .collect();
    means.sort_by(f64::total_cmp);

    let last = means.len() - 1;
    let lower = ((n_resamples as f64 * 0.025).floor() as usize).min(last);
    let upper = ((n_resamples as f64 * 0.975).ceil() as usize)
        .saturating_sub(1)
        .min(last);

    Ok(BootstrapResult {
        mean,
        lower: means[lower],
        upper: means[upper],
    })
}

/// SplitMix64 generator; small, seedable and good enough for resampling.
struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform index in `0..bound`.
    fn below(&mut self, bound: usize) -> usize {
        ((self.next_u64() as u128 * bound as u128) >> 64) as usize
    }
}

// ============================================================================
// Distribution functions
// ============================================================================

/// `P(|T| ≥ |t|)` for Student's t with `df` degrees of freedom.
fn student_t_two_tailed(t: f64, df: usize) -> f64 {
    let df = df as f64;
    regularized_incomplete_beta(df / 2.0, 0.5, df / (df + t * t))
}

/// `P(|Z| ≥ |z|)` for a standard normal.
fn normal_two_tailed(z: f64) -> f64 {
    erfc(z.abs() / std::f64::consts::SQRT_2)
}

/// Complementary error function, fractional error below 1.2e-7.
fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87 + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let value = t * (-z * z + poly).exp();
    if x >= 0.0 {
        value
    } else {
        2.0 - value
    }
}

/// Natural log of the gamma function for `x > 0` (Lanczos, g = 7).
fn ln_gamma(x: f64) -> f64 {
    const LANCZOS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];

    let x = x - 1.0;
    let t = x + 7.5;
    let series = LANCZOS[1..]
        .iter()
        .enumerate()
        .fold(LANCZOS[0], |acc, (i, c)| acc + c / (x + i as f64 + 1.0));
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

/// Regularized incomplete beta `I_x(a, b)`.
fn regularized_incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();

    // The continued fraction converges fastest on this side of the mode
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

/// Modified Lentz evaluation of the incomplete beta continued fraction.
fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITERATIONS: usize = 300;
    const EPSILON: f64 = 1e-14;
    const TINY: f64 = 1e-300;

    let clamp = |v: f64| if v.abs() < TINY { TINY } else { v };

    let mut c = 1.0;
    let mut d = 1.0 / clamp(1.0 - (a + b) * x / (a + 1.0));
    let mut h = d;

    for m in 1..=MAX_ITERATIONS {
        let m = m as f64;
        let m2 = 2.0 * m;

        let even = m * (b - m) * x / ((a - 1.0 + m2) * (a + m2));
        d = 1.0 / clamp(1.0 + even * d);
        c = clamp(1.0 + even / c);
        h *= d * c;

        let odd = -(a + m) * (a + b + m) * x / ((a + m2) * (a + 1.0 + m2));
        d = 1.0 / clamp(1.0 + odd * d);
        c = clamp(1.0 + odd / c);
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPSILON {
            break;
        }
    }
    h
}
