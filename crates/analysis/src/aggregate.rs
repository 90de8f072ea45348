use std::collections::BTreeMap;

use serde::Deserialize;

use crate::classify::effective_declining;
use crate::error::AnalysisError;
use crate::model::{AdminLevel, AggregateStats, WellProfile};

pub const CRITICAL_REGION_PCT: f64 = 90.0;
pub const CRITICAL_UNIT_PCT: f64 = 75.0;

#[derive(Default)]
struct Accumulator {
    count: usize,
    slope_sum: f64,
    slope_count: usize,
    declining: usize,
}

/// Group wells by their unit key at `level` and compute per-unit statistics.
///
/// Wells with no key at `level` are skipped. Mean slope covers only wells
/// with a defined slope; the declining share covers every well in the group.
pub fn aggregate_by(wells: &[WellProfile], level: AdminLevel) -> Vec<AggregateStats> {
    let mut groups: BTreeMap<&str, Accumulator> = BTreeMap::new();

    for well in wells {
        let Some(unit) = well.units.key(level) else {
            continue;
        };
        let entry = groups.entry(unit).or_default();
        entry.count += 1;
        if let Some(slope) = well.slope.filter(|s| s.is_finite()) {
            entry.slope_sum += slope;
            entry.slope_count += 1;
        }
        if effective_declining(well.consensus, well.category) {
            entry.declining += 1;
        }
    }

    groups
        .into_iter()
        .map(|(unit, acc)| AggregateStats {
            level,
            unit: unit.to_string(),
            well_count: acc.count,
            wells_with_slope: acc.slope_count,
            mean_slope: (acc.slope_count > 0).then(|| acc.slope_sum / acc.slope_count as f64),
            declining_count: acc.declining,
            pct_declining: acc.declining as f64 / acc.count as f64 * 100.0,
        })
        .collect()
}

/// `aggregate_by` at every granularity.
pub fn aggregate_all(wells: &[WellProfile]) -> BTreeMap<AdminLevel, Vec<AggregateStats>> {
    AdminLevel::ALL
        .iter()
        .map(|&level| (level, aggregate_by(wells, level)))
        .collect()
}

// ---------------------------------------------------------------------------
// Critical units
// ---------------------------------------------------------------------------

/// Declining share (percent) at or above which a unit counts as critical.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CriticalThresholds {
    #[serde(default = "default_region_pct")]
    pub region: f64,
    #[serde(default = "default_unit_pct")]
    pub shac: f64,
    #[serde(default = "default_unit_pct")]
    pub comuna: f64,
}

fn default_region_pct() -> f64 {
    CRITICAL_REGION_PCT
}

fn default_unit_pct() -> f64 {
    CRITICAL_UNIT_PCT
}

impl Default for CriticalThresholds {
    fn default() -> Self {
        Self {
            region: CRITICAL_REGION_PCT,
            shac: CRITICAL_UNIT_PCT,
            comuna: CRITICAL_UNIT_PCT,
        }
    }
}

impl CriticalThresholds {
    pub fn for_level(&self, level: AdminLevel) -> f64 {
        match level {
            AdminLevel::Region => self.region,
            AdminLevel::Shac => self.shac,
            AdminLevel::Comuna => self.comuna,
        }
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        for level in AdminLevel::ALL {
            let pct = self.for_level(level);
            if !(pct.is_finite() && (0.0..=100.0).contains(&pct)) {
                return Err(AnalysisError::ConfigValidation(format!(
                    "critical_pct_declining.{level} must be within [0, 100], got {pct}"
                )));
            }
        }
        Ok(())
    }
}

/// Number of units per level whose declining share reaches the threshold.
pub fn count_critical(
    aggregates: &BTreeMap<AdminLevel, Vec<AggregateStats>>,
    thresholds: &CriticalThresholds,
) -> BTreeMap<AdminLevel, usize> {
    aggregates
        .iter()
        .map(|(&level, stats)| {
            let threshold = thresholds.for_level(level);
            let critical = stats.iter().filter(|s| s.pct_declining >= threshold).count();
            (level, critical)
        })
        .collect()
}
