use crate::types::{DemographicRecord, RankedEntry};

/// Outcome of comparing three category shares of a record's total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Total population absent, zero, or unusable.
    NoData,
    /// The named category's share strictly exceeds both others.
    Majority(String),
    /// No single category strictly dominates (ties included).
    NoMajority,
}

/// Classifies a record by which of the three compared categories holds a
/// majority share of the total.
///
/// A category wins only if its percentage strictly exceeds both others; any
/// tie for the maximum yields `NoMajority`. A missing, zero, negative, or
/// non-finite total yields `NoData`. The function never fails: counts for
/// unknown categories read as zero.
pub fn classify(record: &DemographicRecord, compare: [&str; 3]) -> Classification {
    let total = match record.total {
        Some(t) if t.is_finite() && t > 0.0 => t,
        _ => return Classification::NoData,
    };

    let shares = compare.map(|c| record.count(c) / total * 100.0);

    let mut best = 0;
    for i in 1..3 {
        if shares[i] > shares[best] {
            best = i;
        }
    }

    let tied = (0..3).any(|i| i != best && shares[i] == shares[best]);
    if tied {
        Classification::NoMajority
    } else {
        Classification::Majority(compare[best].to_string())
    }
}

/// Ranks the requested categories by raw count, largest first.
///
/// The sort is stable, so categories with equal counts keep their input
/// order. At most `n` entries are returned.
pub fn top_n(record: &DemographicRecord, keys: &[&str], n: usize) -> Vec<RankedEntry> {
    let mut ranked: Vec<RankedEntry> = keys
        .iter()
        .map(|k| RankedEntry {
            category: (*k).to_string(),
            count: record.count(k),
        })
        .collect();

    ranked.sort_by(|a, b| b.count.total_cmp(&a.count));
    ranked.truncate(n);
    ranked
}
