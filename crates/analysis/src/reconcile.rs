//! Registry vs. census reconciliation per administrative unit.
//!
//! A negative gap means the registry holds fewer wells than the census
//! reports for that unit, i.e. unregistered extraction.

use std::collections::BTreeMap;

use log::warn;

use crate::geo::{retain_valid, GeoEnvelope};
use crate::matcher::{align_exact_key, AlignedUnit};
use crate::model::{
    ReconSources, ReconciliationReport, ReconciliationRow, ReconciliationTotals, SourceCount,
    SourcePoint,
};

/// (b − a) ÷ a × 100; undefined when `a` is zero.
pub fn pct_change(a: u64, b: u64) -> Option<f64> {
    if a == 0 {
        return None;
    }
    Some((b as f64 - a as f64) / a as f64 * 100.0)
}

/// Share of housing units reporting a well, in percent. Undefined when the
/// housing count is missing or zero.
pub fn dependency_ratio(wells: u64, housing_units: Option<u64>) -> Option<f64> {
    match housing_units {
        Some(h) if h > 0 => Some(wells as f64 / h as f64 * 100.0),
        _ => None,
    }
}

fn ratio_change(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(b? - a?)
}

fn gap(registry: u64, census: u64) -> i64 {
    registry as i64 - census as i64
}

pub fn reconcile_unit(unit: &AlignedUnit) -> ReconciliationRow {
    let registry = unit.registry.wells;
    let census_a = unit.census_a.wells;
    let census_b = unit.census_b.wells;
    let housing_a = unit.census_a.housing_units;
    let housing_b = unit.census_b.housing_units;

    let dependency_ratio_a = dependency_ratio(census_a, housing_a);
    let dependency_ratio_b = dependency_ratio(census_b, housing_b);

    ReconciliationRow {
        unit: unit.unit.clone(),
        registry,
        census_a,
        census_b,
        housing_a,
        housing_b,
        gap_vs_a: gap(registry, census_a),
        gap_vs_b: gap(registry, census_b),
        pct_change_a_to_b: pct_change(census_a, census_b),
        dependency_ratio_a,
        dependency_ratio_b,
        dependency_ratio_change: ratio_change(dependency_ratio_a, dependency_ratio_b),
    }
}

/// Sum the per-unit rows. Housing totals are defined only when every row
/// carries a housing count.
pub fn compute_totals(rows: &[ReconciliationRow]) -> ReconciliationTotals {
    let registry: u64 = rows.iter().map(|r| r.registry).sum();
    let census_a: u64 = rows.iter().map(|r| r.census_a).sum();
    let census_b: u64 = rows.iter().map(|r| r.census_b).sum();
    let housing_a: Option<u64> = rows.iter().map(|r| r.housing_a).sum();
    let housing_b: Option<u64> = rows.iter().map(|r| r.housing_b).sum();
    let (housing_a, housing_b) = if rows.is_empty() {
        (None, None)
    } else {
        (housing_a, housing_b)
    };

    let dependency_ratio_a = dependency_ratio(census_a, housing_a);
    let dependency_ratio_b = dependency_ratio(census_b, housing_b);

    ReconciliationTotals {
        units: rows.len(),
        registry,
        census_a,
        census_b,
        housing_a,
        housing_b,
        gap_vs_a: rows.iter().map(|r| r.gap_vs_a).sum(),
        gap_vs_b: rows.iter().map(|r| r.gap_vs_b).sum(),
        pct_change_a_to_b: pct_change(census_a, census_b),
        dependency_ratio_a,
        dependency_ratio_b,
        dependency_ratio_change: ratio_change(dependency_ratio_a, dependency_ratio_b),
    }
}

/// Reconcile three count tables at one granularity.
pub fn reconcile(sources: &ReconSources) -> ReconciliationReport {
    let alignment = align_exact_key(&sources.registry, &sources.census_a, &sources.census_b);

    if !alignment.unmatched.is_empty() {
        let excluded = alignment.unmatched.excluded_units();
        warn!(
            "{} reconciliation: {} unit key(s) not present in all sources, excluded: {}",
            sources.level,
            excluded.len(),
            excluded.join(", ")
        );
    }
    for dup in &alignment.duplicates {
        warn!(
            "{} reconciliation: {} has {} rows for '{}', counts summed",
            sources.level, dup.source, dup.rows, dup.unit
        );
    }

    let rows: Vec<ReconciliationRow> = alignment.aligned.iter().map(reconcile_unit).collect();
    let totals = compute_totals(&rows);

    ReconciliationReport {
        level: sources.level,
        labels: sources.labels.clone(),
        rows,
        totals,
        unmatched: alignment.unmatched,
        duplicates: alignment.duplicates,
    }
}

/// Count located points per unit. Points failing coordinate validation or
/// lacking a unit key are not counted, but every unit named in the table
/// is emitted, at zero when none of its points validate.
pub fn count_points(points: &[SourcePoint], envelope: &GeoEnvelope) -> Vec<SourceCount> {
    let mut counts: BTreeMap<&str, u64> = points
        .iter()
        .filter_map(|p| p.unit.as_deref())
        .map(|unit| (unit, 0))
        .collect();
    for point in retain_valid(points, envelope, |p| (p.latitude, p.longitude)) {
        if let Some(unit) = point.unit.as_deref() {
            *counts.entry(unit).or_insert(0) += 1;
        }
    }

    counts
        .into_iter()
        .map(|(unit, wells)| SourceCount {
            unit: unit.to_string(),
            wells,
            housing_units: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AdminLevel, SourceLabels};
    use approx::assert_relative_eq;

    fn count(unit: &str, wells: u64, housing: Option<u64>) -> SourceCount {
        SourceCount {
            unit: unit.into(),
            wells,
            housing_units: housing,
        }
    }

    fn sources(reg: Vec<SourceCount>, a: Vec<SourceCount>, b: Vec<SourceCount>) -> ReconSources {
        ReconSources {
            level: AdminLevel::Comuna,
            labels: SourceLabels::default(),
            registry: reg,
            census_a: a,
            census_b: b,
        }
    }

    #[test]
    fn row_arithmetic() {
        let report = reconcile(&sources(
            vec![count("Lampa", 120, None)],
            vec![count("Lampa", 400, Some(2000))],
            vec![count("Lampa", 500, Some(2500))],
        ));
        let row = &report.rows[0];
        assert_eq!(row.gap_vs_a, -280);
        assert_eq!(row.gap_vs_b, -380);
        assert_relative_eq!(row.pct_change_a_to_b.unwrap(), 25.0);
        assert_relative_eq!(row.dependency_ratio_a.unwrap(), 20.0);
        assert_relative_eq!(row.dependency_ratio_b.unwrap(), 20.0);
        assert_relative_eq!(row.dependency_ratio_change.unwrap(), 0.0);
    }

    #[test]
    fn zero_base_pct_change_is_undefined() {
        assert_eq!(pct_change(0, 10), None);
        assert_eq!(pct_change(0, 0), None);
        assert_relative_eq!(pct_change(10, 5).unwrap(), -50.0);
    }

    #[test]
    fn dependency_ratio_needs_housing() {
        assert_eq!(dependency_ratio(10, None), None);
        assert_eq!(dependency_ratio(10, Some(0)), None);
        assert_relative_eq!(dependency_ratio(25, Some(100)).unwrap(), 25.0);
    }

    #[test]
    fn ratio_change_undefined_when_either_side_missing() {
        let report = reconcile(&sources(
            vec![count("X", 1, None)],
            vec![count("X", 10, None)],
            vec![count("X", 12, Some(100))],
        ));
        let row = &report.rows[0];
        assert_eq!(row.dependency_ratio_a, None);
        assert_relative_eq!(row.dependency_ratio_b.unwrap(), 12.0);
        assert_eq!(row.dependency_ratio_change, None);
    }

    #[test]
    fn totals_round_trip() {
        let reg = vec![count("A", 10, None), count("B", 20, None), count("C", 5, None)];
        let a = vec![count("A", 30, Some(100)), count("B", 25, Some(300)), count("C", 0, Some(50))];
        let b = vec![count("A", 35, Some(110)), count("B", 15, Some(320)), count("C", 4, Some(60))];
        let national_registry: u64 = reg.iter().map(|c| c.wells).sum();
        let national_a: u64 = a.iter().map(|c| c.wells).sum();
        let national_b: u64 = b.iter().map(|c| c.wells).sum();

        let report = reconcile(&sources(reg, a, b));
        let t = &report.totals;
        assert_eq!(t.units, 3);
        assert_eq!(t.registry, national_registry);
        assert_eq!(t.registry, report.rows.iter().map(|r| r.registry).sum::<u64>());
        assert_eq!(t.gap_vs_a, national_registry as i64 - national_a as i64);
        assert_eq!(t.gap_vs_b, national_registry as i64 - national_b as i64);
        assert_eq!(t.housing_a, Some(450));
        assert_relative_eq!(t.pct_change_a_to_b.unwrap(), (54.0 - 55.0) / 55.0 * 100.0);
        // unit C: zero base
        assert_eq!(report.rows[2].pct_change_a_to_b, None);
    }

    #[test]
    fn unmatched_units_excluded_from_rows_and_totals() {
        let report = reconcile(&sources(
            vec![count("A", 10, None), count("Only registry", 99, None)],
            vec![count("A", 30, None)],
            vec![count("A", 40, None), count("Only B", 7, None)],
        ));
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.totals.registry, 10);
        assert_eq!(report.totals.census_b, 40);
        assert_eq!(report.unmatched.missing_from_registry, vec!["Only B"]);
        assert_eq!(
            report.unmatched.missing_from_census_a,
            vec!["Only B", "Only registry"]
        );
    }

    #[test]
    fn empty_sources() {
        let report = reconcile(&sources(vec![], vec![], vec![]));
        assert!(report.rows.is_empty());
        assert_eq!(report.totals.registry, 0);
        assert_eq!(report.totals.housing_a, None);
        assert_eq!(report.totals.pct_change_a_to_b, None);
    }

    #[test]
    fn count_points_drops_invalid_coordinates() {
        let pt = |unit: Option<&str>, lat: Option<f64>, lon: Option<f64>| SourcePoint {
            unit: unit.map(String::from),
            latitude: lat,
            longitude: lon,
        };
        let points = vec![
            pt(Some("Lampa"), Some(-33.28), Some(-70.87)),
            pt(Some("Lampa"), Some(-33.30), Some(-70.90)),
            pt(Some("Lampa"), Some(10.0), Some(10.0)),
            pt(Some("Colina"), Some(-33.20), None),
            pt(None, Some(-33.2), Some(-70.7)),
            pt(Some("Colina"), Some(-33.20), Some(-70.67)),
        ];
        let counts = count_points(&points, &GeoEnvelope::NATIONAL);
        assert_eq!(
            counts,
            vec![count("Colina", 1, None), count("Lampa", 2, None)]
        );
    }

    #[test]
    fn unit_with_only_invalid_points_counts_zero() {
        let pt = |unit: &str, lat: f64, lon: f64| SourcePoint {
            unit: Some(unit.into()),
            latitude: Some(lat),
            longitude: Some(lon),
        };
        let registry = count_points(
            &[pt("Lampa", -33.28, -70.87), pt("Colina", 0.0, 0.0)],
            &GeoEnvelope::NATIONAL,
        );
        assert_eq!(registry, vec![count("Colina", 0, None), count("Lampa", 1, None)]);

        let report = reconcile(&sources(
            registry,
            vec![count("Lampa", 10, None), count("Colina", 50, None)],
            vec![count("Lampa", 12, None), count("Colina", 70, None)],
        ));
        assert!(report.unmatched.is_empty());
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].unit, "Colina");
        assert_eq!(report.rows[0].gap_vs_b, -70);
        assert_eq!(report.totals.gap_vs_b, -81);
    }
}
