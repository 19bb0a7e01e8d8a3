//! Student's t Critical Values
//!
//! Two-tailed critical values indexed by degrees of freedom. Rows cover
//! df 1..=30 exactly, then 40, 60, 80, 100, 1000 and infinity. A lookup
//! uses the first row whose df is at least the requested df, so it never
//! extrapolates below the table.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Confidence level for a margin of error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConfidenceLevel {
    /// 50%
    P50,
    /// 60%
    P60,
    /// 70%
    P70,
    /// 80%
    P80,
    /// 90%
    P90,
    /// 95%
    P95,
    /// 98%
    P98,
    /// 99%
    #[default]
    P99,
    /// 99.8%
    P99_8,
    /// 99.9%
    P99_9,
}

impl ConfidenceLevel {
    /// Every supported level, in table column order
    pub const ALL: [ConfidenceLevel; 10] = [
        ConfidenceLevel::P50,
        ConfidenceLevel::P60,
        ConfidenceLevel::P70,
        ConfidenceLevel::P80,
        ConfidenceLevel::P90,
        ConfidenceLevel::P95,
        ConfidenceLevel::P98,
        ConfidenceLevel::P99,
        ConfidenceLevel::P99_8,
        ConfidenceLevel::P99_9,
    ];

    /// The level as a percentage
    pub fn percent(self) -> f64 {
        match self {
            ConfidenceLevel::P50 => 50.0,
            ConfidenceLevel::P60 => 60.0,
            ConfidenceLevel::P70 => 70.0,
            ConfidenceLevel::P80 => 80.0,
            ConfidenceLevel::P90 => 90.0,
            ConfidenceLevel::P95 => 95.0,
            ConfidenceLevel::P98 => 98.0,
            ConfidenceLevel::P99 => 99.0,
            ConfidenceLevel::P99_8 => 99.8,
            ConfidenceLevel::P99_9 => 99.9,
        }
    }

    fn column(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percent())
    }
}

/// Error returned when a string does not name a supported confidence level
#[derive(Debug, Clone, PartialEq, Error)]
#[error("unsupported confidence level '{0}' (expected one of 50, 60, 70, 80, 90, 95, 98, 99, 99.8, 99.9)")]
pub struct ParseConfidenceError(pub String);

impl FromStr for ConfidenceLevel {
    type Err = ParseConfidenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches('%');
        let value: f64 = trimmed
            .parse()
            .map_err(|_| ParseConfidenceError(s.to_string()))?;
        // Accept fractions such as 0.95 as well as percentages
        let percent = if value > 0.0 && value < 1.0 {
            value * 100.0
        } else {
            value
        };
        Self::ALL
            .into_iter()
            .find(|level| (level.percent() - percent).abs() < 1e-9)
            .ok_or_else(|| ParseConfidenceError(s.to_string()))
    }
}

const INFINITE_DF: usize = usize::MAX;

struct Row {
    df: usize,
    t: [f64; 10],
}

const fn row(df: usize, t: [f64; 10]) -> Row {
    Row { df, t }
}

#[rustfmt::skip]
static T_TABLE: [Row; 36] = [
    row(1, [1.000, 1.376, 1.963, 3.078, 6.314, 12.71, 31.82, 63.66, 318.31, 636.62]),
    row(2, [0.816, 1.061, 1.386, 1.886, 2.920, 4.303, 6.965, 9.925, 22.327, 31.599]),
    row(3, [0.765, 0.978, 1.250, 1.638, 2.353, 3.182, 4.541, 5.841, 10.215, 12.924]),
    row(4, [0.741, 0.941, 1.190, 1.533, 2.132, 2.776, 3.747, 4.604, 7.173, 8.610]),
    row(5, [0.727, 0.920, 1.156, 1.476, 2.015, 2.571, 3.365, 4.032, 5.893, 6.869]),
    row(6, [0.718, 0.906, 1.134, 1.440, 1.943, 2.447, 3.143, 3.707, 5.208, 5.959]),
    row(7, [0.711, 0.896, 1.119, 1.415, 1.895, 2.365, 2.998, 3.499, 4.785, 5.408]),
    row(8, [0.706, 0.889, 1.108, 1.397, 1.860, 2.306, 2.896, 3.355, 4.501, 5.041]),
    row(9, [0.703, 0.883, 1.100, 1.383, 1.833, 2.262, 2.821, 3.250, 4.297, 4.781]),
    row(10, [0.700, 0.879, 1.093, 1.372, 1.812, 2.228, 2.764, 3.169, 4.144, 4.587]),
    row(11, [0.697, 0.876, 1.088, 1.363, 1.796, 2.201, 2.718, 3.106, 4.025, 4.437]),
    row(12, [0.695, 0.873, 1.083, 1.356, 1.782, 2.179, 2.681, 3.055, 3.930, 4.318]),
    row(13, [0.694, 0.870, 1.079, 1.350, 1.771, 2.160, 2.650, 3.012, 3.852, 4.221]),
    row(14, [0.692, 0.868, 1.076, 1.345, 1.761, 2.145, 2.624, 2.977, 3.787, 4.140]),
    row(15, [0.691, 0.866, 1.074, 1.341, 1.753, 2.131, 2.602, 2.947, 3.733, 4.073]),
    row(16, [0.690, 0.865, 1.071, 1.337, 1.746, 2.120, 2.583, 2.921, 3.686, 4.015]),
    row(17, [0.689, 0.863, 1.069, 1.333, 1.740, 2.110, 2.567, 2.898, 3.646, 3.965]),
    row(18, [0.688, 0.862, 1.067, 1.330, 1.734, 2.101, 2.552, 2.878, 3.610, 3.922]),
    row(19, [0.688, 0.861, 1.066, 1.328, 1.729, 2.093, 2.539, 2.861, 3.579, 3.883]),
    row(20, [0.687, 0.860, 1.064, 1.325, 1.725, 2.086, 2.528, 2.845, 3.552, 3.850]),
    row(21, [0.686, 0.859, 1.063, 1.323, 1.721, 2.080, 2.518, 2.831, 3.527, 3.819]),
    row(22, [0.686, 0.858, 1.061, 1.321, 1.717, 2.074, 2.508, 2.819, 3.505, 3.792]),
    row(23, [0.685, 0.858, 1.060, 1.319, 1.714, 2.069, 2.500, 2.807, 3.485, 3.768]),
    row(24, [0.685, 0.857, 1.059, 1.318, 1.711, 2.064, 2.492, 2.797, 3.467, 3.745]),
    row(25, [0.684, 0.856, 1.058, 1.316, 1.708, 2.060, 2.485, 2.787, 3.450, 3.725]),
    row(26, [0.684, 0.856, 1.058, 1.315, 1.706, 2.056, 2.479, 2.779, 3.435, 3.707]),
    row(27, [0.684, 0.855, 1.057, 1.314, 1.703, 2.052, 2.473, 2.771, 3.421, 3.690]),
    row(28, [0.683, 0.855, 1.056, 1.313, 1.701, 2.048, 2.467, 2.763, 3.408, 3.674]),
    row(29, [0.683, 0.854, 1.055, 1.311, 1.699, 2.045, 2.462, 2.756, 3.396, 3.659]),
    row(30, [0.683, 0.854, 1.055, 1.310, 1.697, 2.042, 2.457, 2.750, 3.385, 3.646]),
    row(40, [0.681, 0.851, 1.050, 1.303, 1.684, 2.021, 2.423, 2.704, 3.307, 3.551]),
    row(60, [0.679, 0.848, 1.045, 1.296, 1.671, 2.000, 2.390, 2.660, 3.232, 3.460]),
    row(80, [0.678, 0.846, 1.043, 1.292, 1.664, 1.990, 2.374, 2.639, 3.195, 3.416]),
    row(100, [0.677, 0.845, 1.042, 1.290, 1.660, 1.984, 2.364, 2.626, 3.174, 3.390]),
    row(1000, [0.675, 0.842, 1.037, 1.282, 1.646, 1.962, 2.330, 2.581, 3.098, 3.300]),
    row(INFINITE_DF, [0.674, 0.842, 1.036, 1.282, 1.645, 1.960, 2.326, 2.576, 3.090, 3.291]),
];

/// Critical t value for `df` degrees of freedom at the given confidence level.
///
/// Returns 0 when `df` is 0, i.e. for a single sample with no spread estimate.
pub fn t_score(df: usize, level: ConfidenceLevel) -> f64 {
    if df == 0 {
        return 0.0;
    }
    T_TABLE
        .iter()
        .find(|row| row.df >= df)
        .map(|row| row.t[level.column()])
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_rows() {
        assert!((t_score(1, ConfidenceLevel::P99) - 63.66).abs() < 1e-9);
        assert!((t_score(10, ConfidenceLevel::P95) - 2.228).abs() < 1e-9);
        assert!((t_score(30, ConfidenceLevel::P50) - 0.683).abs() < 1e-9);
    }

    #[test]
    fn test_conservative_row_selection() {
        // df 31..=40 all use the df=40 row
        assert!((t_score(31, ConfidenceLevel::P90) - 1.684).abs() < 1e-9);
        assert!((t_score(40, ConfidenceLevel::P90) - 1.684).abs() < 1e-9);
        assert!((t_score(41, ConfidenceLevel::P90) - 1.671).abs() < 1e-9);
        assert!((t_score(999, ConfidenceLevel::P99) - 2.581).abs() < 1e-9);
    }

    #[test]
    fn test_infinite_row() {
        assert!((t_score(1001, ConfidenceLevel::P95) - 1.960).abs() < 1e-9);
        assert!((t_score(usize::MAX, ConfidenceLevel::P99_9) - 3.291).abs() < 1e-9);
    }

    #[test]
    fn test_zero_df() {
        assert_eq!(t_score(0, ConfidenceLevel::P99), 0.0);
    }

    #[test]
    fn test_columns_increase_with_confidence() {
        for df in [1, 5, 30, 100, 5000] {
            let values: Vec<f64> = ConfidenceLevel::ALL
                .iter()
                .map(|level| t_score(df, *level))
                .collect();
            assert!(values.windows(2).all(|w| w[0] <= w[1]), "df={df}: {values:?}");
        }
    }

    #[test]
    fn test_parse_confidence() {
        assert_eq!("99".parse::<ConfidenceLevel>(), Ok(ConfidenceLevel::P99));
        assert_eq!("99.8%".parse::<ConfidenceLevel>(), Ok(ConfidenceLevel::P99_8));
        assert_eq!("0.95".parse::<ConfidenceLevel>(), Ok(ConfidenceLevel::P95));
        assert!("97".parse::<ConfidenceLevel>().is_err());
        assert!("high".parse::<ConfidenceLevel>().is_err());
        assert_eq!(ConfidenceLevel::P99_9.to_string(), "99.9%");
    }
}
