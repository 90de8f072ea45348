//! Ordered, truncated views ("top 20 SHACs", "top 30 comunas") over
//! aggregate and reconciliation tables.
//!
//! Ordering is computed as a permutation over the input rows, then applied.
//! The sort is stable in both directions: rows with equal keys keep their
//! input order. Rows whose metric is undefined always sort last.

use std::cmp::Ordering;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::model::{AggregateStats, ReconciliationRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Ascending,
    #[default]
    Descending,
}

impl Direction {
    pub fn reversed(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

/// Sortable columns of `AggregateStats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateMetric {
    WellCount,
    MeanSlope,
    DecliningCount,
    PctDeclining,
}

impl AggregateMetric {
    pub fn value(&self, row: &AggregateStats) -> Option<f64> {
        match self {
            Self::WellCount => Some(row.well_count as f64),
            Self::MeanSlope => row.mean_slope,
            Self::DecliningCount => Some(row.declining_count as f64),
            Self::PctDeclining => Some(row.pct_declining),
        }
    }
}

/// Sortable columns of `ReconciliationRow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconMetric {
    Registry,
    CensusA,
    CensusB,
    GapVsA,
    GapVsB,
    PctChangeAToB,
    DependencyRatioA,
    DependencyRatioB,
    DependencyRatioChange,
}

impl ReconMetric {
    pub fn value(&self, row: &ReconciliationRow) -> Option<f64> {
        match self {
            Self::Registry => Some(row.registry as f64),
            Self::CensusA => Some(row.census_a as f64),
            Self::CensusB => Some(row.census_b as f64),
            Self::GapVsA => Some(row.gap_vs_a as f64),
            Self::GapVsB => Some(row.gap_vs_b as f64),
            Self::PctChangeAToB => row.pct_change_a_to_b,
            Self::DependencyRatioA => row.dependency_ratio_a,
            Self::DependencyRatioB => row.dependency_ratio_b,
            Self::DependencyRatioChange => row.dependency_ratio_change,
        }
    }
}

/// Row indices of `rows` in sorted order.
pub fn sort_permutation<T, F>(rows: &[T], key: F, direction: Direction) -> Vec<usize>
where
    F: Fn(&T) -> Option<f64>,
{
    let keys: Vec<Option<OrderedFloat<f64>>> = rows
        .iter()
        .map(|row| key(row).filter(|v| !v.is_nan()).map(OrderedFloat))
        .collect();

    let mut order: Vec<usize> = (0..rows.len()).collect();
    // slice::sort_by is stable
    order.sort_by(|&a, &b| compare_keys(keys[a], keys[b], direction));
    order
}

fn compare_keys(
    a: Option<OrderedFloat<f64>>,
    b: Option<OrderedFloat<f64>>,
    direction: Direction,
) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match direction {
            Direction::Ascending => a.cmp(&b),
            Direction::Descending => b.cmp(&a),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable sort by `key`, then keep the first `limit` rows.
pub fn select_top<T, F>(rows: &[T], key: F, direction: Direction, limit: usize) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> Option<f64>,
{
    sort_permutation(rows, key, direction)
        .into_iter()
        .take(limit)
        .map(|i| rows[i].clone())
        .collect()
}

pub fn rank_aggregates(
    rows: &[AggregateStats],
    metric: AggregateMetric,
    direction: Direction,
    limit: usize,
) -> Vec<AggregateStats> {
    select_top(rows, |r| metric.value(r), direction, limit)
}

pub fn rank_reconciliation(
    rows: &[ReconciliationRow],
    metric: ReconMetric,
    direction: Direction,
    limit: usize,
) -> Vec<ReconciliationRow> {
    select_top(rows, |r| metric.value(r), direction, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AdminLevel;

    fn stats(unit: &str, well_count: usize, mean_slope: Option<f64>) -> AggregateStats {
        AggregateStats {
            level: AdminLevel::Shac,
            unit: unit.into(),
            well_count,
            wells_with_slope: if mean_slope.is_some() { well_count } else { 0 },
            mean_slope,
            declining_count: 0,
            pct_declining: 0.0,
        }
    }

    fn units(rows: &[AggregateStats]) -> Vec<&str> {
        rows.iter().map(|r| r.unit.as_str()).collect()
    }

    #[test]
    fn descending_truncates_to_limit() {
        let rows = vec![
            stats("Lampa", 3, Some(0.40)),
            stats("Colina", 5, Some(0.90)),
            stats("Maipo", 8, Some(0.10)),
            stats("Popeta", 2, Some(0.70)),
        ];
        let top = rank_aggregates(&rows, AggregateMetric::MeanSlope, Direction::Descending, 2);
        assert_eq!(units(&top), vec!["Colina", "Popeta"]);
    }

    #[test]
    fn ranking_is_idempotent() {
        let rows = vec![
            stats("a", 3, Some(0.2)),
            stats("b", 1, Some(0.5)),
            stats("c", 9, Some(-0.1)),
        ];
        let once = rank_aggregates(&rows, AggregateMetric::WellCount, Direction::Ascending, 3);
        let twice = rank_aggregates(&rows, AggregateMetric::WellCount, Direction::Ascending, 3);
        assert_eq!(once, twice);
        let again = rank_aggregates(&once, AggregateMetric::WellCount, Direction::Ascending, 3);
        assert_eq!(once, again);
    }

    #[test]
    fn reversing_direction_reverses_order() {
        let rows = vec![
            stats("a", 3, Some(0.2)),
            stats("b", 1, Some(0.5)),
            stats("c", 9, Some(-0.1)),
            stats("d", 4, Some(0.3)),
        ];
        let desc = rank_aggregates(&rows, AggregateMetric::MeanSlope, Direction::Descending, 10);
        let mut asc = rank_aggregates(
            &rows,
            AggregateMetric::MeanSlope,
            Direction::Descending.reversed(),
            10,
        );
        asc.reverse();
        assert_eq!(desc, asc);
        assert_eq!(units(&desc), vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn ties_keep_input_order_in_both_directions() {
        let rows = vec![
            stats("first", 2, Some(0.3)),
            stats("second", 2, Some(0.3)),
            stats("third", 1, Some(0.1)),
        ];
        let desc = rank_aggregates(&rows, AggregateMetric::WellCount, Direction::Descending, 3);
        assert_eq!(units(&desc), vec!["first", "second", "third"]);
        let asc = rank_aggregates(&rows, AggregateMetric::WellCount, Direction::Ascending, 3);
        assert_eq!(units(&asc), vec!["third", "first", "second"]);
    }

    #[test]
    fn undefined_metric_sorts_last() {
        let rows = vec![
            stats("none", 2, None),
            stats("low", 2, Some(-0.4)),
            stats("high", 2, Some(0.4)),
        ];
        let desc = rank_aggregates(&rows, AggregateMetric::MeanSlope, Direction::Descending, 3);
        assert_eq!(units(&desc), vec!["high", "low", "none"]);
        let asc = rank_aggregates(&rows, AggregateMetric::MeanSlope, Direction::Ascending, 3);
        assert_eq!(units(&asc), vec!["low", "high", "none"]);
    }

    #[test]
    fn limit_larger_than_table() {
        let rows = vec![stats("a", 1, Some(0.1))];
        let top = rank_aggregates(&rows, AggregateMetric::MeanSlope, Direction::Descending, 30);
        assert_eq!(top.len(), 1);
        let none = rank_aggregates(&[], AggregateMetric::MeanSlope, Direction::Descending, 30);
        assert!(none.is_empty());
    }

    #[test]
    fn reconciliation_metric_values() {
        let row = ReconciliationRow {
            unit: "Lampa".into(),
            registry: 100,
            census_a: 250,
            census_b: 300,
            housing_a: Some(1000),
            housing_b: None,
            gap_vs_a: -150,
            gap_vs_b: -200,
            pct_change_a_to_b: Some(20.0),
            dependency_ratio_a: Some(25.0),
            dependency_ratio_b: None,
            dependency_ratio_change: None,
        };
        assert_eq!(ReconMetric::GapVsB.value(&row), Some(-200.0));
        assert_eq!(ReconMetric::PctChangeAToB.value(&row), Some(20.0));
        assert_eq!(ReconMetric::DependencyRatioB.value(&row), None);
    }
}
