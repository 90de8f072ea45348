use std::collections::BTreeMap;

use crate::aggregate::{count_critical, CriticalThresholds};
use crate::model::{
    AdminLevel, AggregateStats, ExtractionSummary, NationalSummary, ReconciliationReport,
    WellProfile, WellSummaryStats,
};

/// Headline statistics over the well profiles.
pub fn summarize_wells(wells: &[WellProfile]) -> WellSummaryStats {
    let mut category_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut consensus_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut wells_with_trend = 0;
    let mut undefined_trends = 0;
    let mut declining = 0;
    let mut slope_sum = 0.0;
    let mut slope_count = 0usize;
    let mut max_slope: Option<f64> = None;

    for w in wells {
        if let Some(category) = w.category {
            wells_with_trend += 1;
            *category_counts.entry(category.to_string()).or_insert(0) += 1;
        }
        if w.undefined.is_some() {
            undefined_trends += 1;
        }
        if let Some(c) = w.consensus {
            *consensus_counts.entry(c.to_string()).or_insert(0) += 1;
        }
        if w.declining {
            declining += 1;
        }
        if let Some(s) = w.slope.filter(|s| s.is_finite()) {
            slope_sum += s;
            slope_count += 1;
            max_slope = Some(max_slope.map_or(s, |m| m.max(s)));
        }
    }

    let pct_declining = if wells.is_empty() {
        0.0
    } else {
        declining as f64 / wells.len() as f64 * 100.0
    };

    WellSummaryStats {
        total_wells: wells.len(),
        wells_with_trend,
        undefined_trends,
        declining,
        pct_declining,
        category_counts,
        consensus_counts,
        mean_slope: (slope_count > 0).then(|| slope_sum / slope_count as f64),
        max_slope,
    }
}

/// Registered vs. latest-census extraction from one reconciliation.
pub fn extraction_summary(report: &ReconciliationReport) -> ExtractionSummary {
    let t = &report.totals;
    let unregistered_estimate = t.census_b.saturating_sub(t.registry);
    let pct_unregistered =
        (t.census_b > 0).then(|| unregistered_estimate as f64 / t.census_b as f64 * 100.0);

    ExtractionSummary {
        level: report.level,
        registered: t.registry,
        census_latest: t.census_b,
        unregistered_estimate,
        pct_unregistered,
        dependency_ratio_change: t.dependency_ratio_change,
    }
}

/// National summary. Extraction figures come from the coarsest
/// reconciliation available.
pub fn compute_summary(
    wells: &[WellProfile],
    aggregates: &BTreeMap<AdminLevel, Vec<AggregateStats>>,
    critical: &CriticalThresholds,
    reconciliations: &[ReconciliationReport],
) -> NationalSummary {
    let extraction = reconciliations
        .iter()
        .min_by_key(|r| r.level)
        .map(extraction_summary);

    NationalSummary {
        wells: summarize_wells(wells),
        critical_units: count_critical(aggregates, critical),
        extraction,
    }
}
