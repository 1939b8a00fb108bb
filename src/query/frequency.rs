//! Population frequency with precision scaled to cohort size.
//!
//! `digits = ceil(log10(total)) - 2` decimal places are kept, so a cohort of
//! 1,000 samples reports one decimal place and a cohort of 50 reports whole
//! percentages rounded to the nearest ten. Ties round to the even neighbour.

use serde::{Deserialize, Serialize};

/// A percentage; whole when the cohort is too small for decimals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Frequency {
    Whole(u64),
    Decimal(f64),
}

impl Frequency {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Whole(value) => value as f64,
            Self::Decimal(value) => value,
        }
    }
}

/// Percentage of `total` represented by `count`.
///
/// Returns `None` when `total` is zero.
pub fn frequency(count: u64, total: u64) -> Option<Frequency> {
    if total == 0 {
        return None;
    }
    let percent = 100.0 * count as f64 / total as f64;
    let digits = (total as f64).log10().ceil() as i32 - 2;

    if digits > 0 {
        let factor = 10f64.powi(digits);
        Some(Frequency::Decimal(
            (percent * factor).round_ties_even() / factor,
        ))
    } else {
        let step = 10f64.powi(-digits);
        Some(Frequency::Whole(
            ((percent / step).round_ties_even() * step) as u64,
        ))
    }
}
