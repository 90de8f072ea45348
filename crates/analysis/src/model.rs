use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::rank::{AggregateMetric, Direction, ReconMetric};

// ---------------------------------------------------------------------------
// Administrative units
// ---------------------------------------------------------------------------

/// Aggregation granularity, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminLevel {
    Region,
    Shac,
    Comuna,
}

impl AdminLevel {
    pub const ALL: [AdminLevel; 3] = [AdminLevel::Region, AdminLevel::Shac, AdminLevel::Comuna];
}

impl std::fmt::Display for AdminLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Region => write!(f, "region"),
            Self::Shac => write!(f, "shac"),
            Self::Comuna => write!(f, "comuna"),
        }
    }
}

/// One optional unit key per granularity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdminUnits {
    pub region: Option<String>,
    pub shac: Option<String>,
    pub comuna: Option<String>,
}

impl AdminUnits {
    pub fn key(&self, level: AdminLevel) -> Option<&str> {
        match level {
            AdminLevel::Region => self.region.as_deref(),
            AdminLevel::Shac => self.shac.as_deref(),
            AdminLevel::Comuna => self.comuna.as_deref(),
        }
    }
}

// ---------------------------------------------------------------------------
// Well inputs
// ---------------------------------------------------------------------------

/// Static metadata carried alongside a depth measurement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WellMetadata {
    pub name: Option<String>,
    pub units: AdminUnits,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation: Option<f64>,
}

/// One depth-to-water measurement. Depth is meters below surface, so a
/// larger value means a lower water table.
#[derive(Debug, Clone, PartialEq)]
pub struct WellRecord {
    pub station_id: String,
    pub date: Option<NaiveDate>,
    pub depth: Option<f64>,
    pub metadata: WellMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DepthPoint {
    pub date: NaiveDate,
    pub depth: f64,
}

/// Date-ordered measurements for one station, without duplicate dates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WellSeries {
    pub station_id: String,
    pub points: Vec<DepthPoint>,
    /// Valid measurements dropped because their date was already taken.
    pub repeated_dates: usize,
}

impl WellSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }
}

/// Trend label computed upstream by the forecasting ensemble. Refers to the
/// water level, so `Decreasing` means a declining aquifer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusTrend {
    Decreasing,
    Increasing,
    Stable,
}

impl ConsensusTrend {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "decreasing" => Some(Self::Decreasing),
            "increasing" => Some(Self::Increasing),
            "stable" => Some(Self::Stable),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConsensusTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decreasing => write!(f, "decreasing"),
            Self::Increasing => write!(f, "increasing"),
            Self::Stable => write!(f, "stable"),
        }
    }
}

/// Pre-computed 2030 water-level predictions. Opaque inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Projections {
    pub arima: Option<f64>,
    pub prophet: Option<f64>,
    pub lstm: Option<f64>,
}

/// One row of the well summary table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WellSummary {
    pub station_id: String,
    pub name: Option<String>,
    pub units: AdminUnits,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub slope: Option<f64>,
    pub r_squared: Option<f64>,
    pub consensus: Option<ConsensusTrend>,
    pub current_level: Option<f64>,
    pub projections: Projections,
}

// ---------------------------------------------------------------------------
// Trend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendCategory {
    Declining,
    Recovering,
    Stable,
}

impl std::fmt::Display for TrendCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Declining => write!(f, "declining"),
            Self::Recovering => write!(f, "recovering"),
            Self::Stable => write!(f, "stable"),
        }
    }
}

/// Five-band interpretation of a slope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FineBand {
    CriticalDecline,
    ModerateDecline,
    SlightDecline,
    Stable,
    Recovery,
}

impl std::fmt::Display for FineBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CriticalDecline => write!(f, "critical_decline"),
            Self::ModerateDecline => write!(f, "moderate_decline"),
            Self::SlightDecline => write!(f, "slight_decline"),
            Self::Stable => write!(f, "stable"),
            Self::Recovery => write!(f, "recovery"),
        }
    }
}

/// Why a trend could not be fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Undefined {
    InsufficientData { points: usize },
    DegenerateTime,
}

impl std::fmt::Display for Undefined {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientData { points } => {
                write!(f, "insufficient data ({points} point(s), need 2)")
            }
            Self::DegenerateTime => write!(f, "all measurements share one date"),
        }
    }
}

/// Linear fit of depth against time for one well.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendResult {
    /// Depth units per calendar year; positive means the water table is deepening.
    pub slope: f64,
    /// Fitted depth at `origin`.
    pub intercept: f64,
    pub origin: NaiveDate,
    pub r_squared: f64,
    pub n: usize,
    pub category: TrendCategory,
}

impl TrendResult {
    pub fn slope_per_day(&self) -> f64 {
        self.slope / crate::trend::DAYS_PER_YEAR
    }

    /// Depth on the fitted line at `date`.
    pub fn fitted_depth(&self, date: NaiveDate) -> f64 {
        let days = (date - self.origin).num_days() as f64;
        self.intercept + self.slope_per_day() * days
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlopeSource {
    History,
    Summary,
}

/// A well after estimation and classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WellProfile {
    pub station_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub units: AdminUnits,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub coordinates_valid: bool,
    pub slope: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slope_source: Option<SlopeSource>,
    pub r_squared: Option<f64>,
    /// Usable measurements in the history table, one per date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_date: Option<NaiveDate>,
    pub category: Option<TrendCategory>,
    pub fine_band: Option<FineBand>,
    pub consensus: Option<ConsensusTrend>,
    /// Consensus when present, else the local category.
    pub declining: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_level: Option<f64>,
    #[serde(skip)]
    pub projections: Projections,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub undefined: Option<Undefined>,
}

/// A well that survived coordinate validation, for map layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPoint {
    pub station_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub slope: Option<f64>,
    pub category: Option<TrendCategory>,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateStats {
    pub level: AdminLevel,
    pub unit: String,
    pub well_count: usize,
    pub wells_with_slope: usize,
    pub mean_slope: Option<f64>,
    pub declining_count: usize,
    pub pct_declining: f64,
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRole {
    Registry,
    CensusA,
    CensusB,
}

impl std::fmt::Display for SourceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registry => write!(f, "registry"),
            Self::CensusA => write!(f, "census_a"),
            Self::CensusB => write!(f, "census_b"),
        }
    }
}

/// Wells counted for one unit by one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCount {
    pub unit: String,
    pub wells: u64,
    pub housing_units: Option<u64>,
}

/// A located extraction point, counted into a `SourceCount` table.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePoint {
    pub unit: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Display labels for the three sources (e.g. "DGA", "2017", "2024").
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLabels {
    pub registry: String,
    pub census_a: String,
    pub census_b: String,
}

impl Default for SourceLabels {
    fn default() -> Self {
        Self {
            registry: "registry".into(),
            census_a: "census_a".into(),
            census_b: "census_b".into(),
        }
    }
}

/// Three count tables at one granularity.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconSources {
    pub level: AdminLevel,
    pub labels: SourceLabels,
    pub registry: Vec<SourceCount>,
    pub census_a: Vec<SourceCount>,
    pub census_b: Vec<SourceCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationRow {
    pub unit: String,
    pub registry: u64,
    pub census_a: u64,
    pub census_b: u64,
    pub housing_a: Option<u64>,
    pub housing_b: Option<u64>,
    /// Negative means the registry under-counts relative to census A.
    pub gap_vs_a: i64,
    pub gap_vs_b: i64,
    pub pct_change_a_to_b: Option<f64>,
    pub dependency_ratio_a: Option<f64>,
    pub dependency_ratio_b: Option<f64>,
    pub dependency_ratio_change: Option<f64>,
}

/// Column sums over the reconciliation rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationTotals {
    pub units: usize,
    pub registry: u64,
    pub census_a: u64,
    pub census_b: u64,
    pub housing_a: Option<u64>,
    pub housing_b: Option<u64>,
    pub gap_vs_a: i64,
    pub gap_vs_b: i64,
    pub pct_change_a_to_b: Option<f64>,
    pub dependency_ratio_a: Option<f64>,
    pub dependency_ratio_b: Option<f64>,
    pub dependency_ratio_change: Option<f64>,
}

/// Unit keys seen in some source but missing from the named one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnmatchedKeys {
    pub missing_from_registry: Vec<String>,
    pub missing_from_census_a: Vec<String>,
    pub missing_from_census_b: Vec<String>,
}

impl UnmatchedKeys {
    pub fn is_empty(&self) -> bool {
        self.missing_from_registry.is_empty()
            && self.missing_from_census_a.is_empty()
            && self.missing_from_census_b.is_empty()
    }

    /// Distinct unit keys excluded from reconciliation.
    pub fn excluded_units(&self) -> Vec<String> {
        let mut units: Vec<String> = self
            .missing_from_registry
            .iter()
            .chain(&self.missing_from_census_a)
            .chain(&self.missing_from_census_b)
            .cloned()
            .collect();
        units.sort();
        units.dedup();
        units
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateKey {
    pub source: SourceRole,
    pub unit: String,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationReport {
    pub level: AdminLevel,
    pub labels: SourceLabels,
    pub rows: Vec<ReconciliationRow>,
    pub totals: ReconciliationTotals,
    pub unmatched: UnmatchedKeys,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub duplicates: Vec<DuplicateKey>,
}

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WellProjection {
    pub station_id: String,
    pub current_level: f64,
    pub arima_change: Option<f64>,
    pub prophet_change: Option<f64>,
    pub lstm_change: Option<f64>,
    pub ensemble: f64,
    pub ensemble_change: f64,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WellSummaryStats {
    pub total_wells: usize,
    pub wells_with_trend: usize,
    pub undefined_trends: usize,
    pub declining: usize,
    pub pct_declining: f64,
    pub category_counts: BTreeMap<String, usize>,
    pub consensus_counts: BTreeMap<String, usize>,
    pub mean_slope: Option<f64>,
    /// Steepest deepening across wells with a defined slope.
    pub max_slope: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionSummary {
    pub level: AdminLevel,
    pub registered: u64,
    pub census_latest: u64,
    /// Census wells beyond the registry total, floored at zero.
    pub unregistered_estimate: u64,
    pub pct_unregistered: Option<f64>,
    pub dependency_ratio_change: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NationalSummary {
    pub wells: WellSummaryStats,
    /// Units per level whose declining share reaches the critical threshold.
    pub critical_units: BTreeMap<AdminLevel, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction: Option<ExtractionSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "table", content = "rows", rename_all = "snake_case")]
pub enum ViewRows {
    Aggregate(Vec<AggregateStats>),
    Reconciliation(Vec<ReconciliationRow>),
}

impl ViewRows {
    pub fn len(&self) -> usize {
        match self {
            Self::Aggregate(rows) => rows.len(),
            Self::Reconciliation(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolved from the metric name; the two metric sets share no names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ViewMetric {
    Aggregate(AggregateMetric),
    Reconciliation(ReconMetric),
}

/// A named, ordered, truncated view over an aggregate or reconciliation table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedView {
    pub name: String,
    pub level: AdminLevel,
    pub metric: ViewMetric,
    pub direction: Direction,
    pub limit: usize,
    pub rows: ViewRows,
}

/// Caller-owned input tables for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct AnalysisInput {
    pub history: Vec<WellRecord>,
    pub summaries: Vec<WellSummary>,
    pub sources: Vec<ReconSources>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub meta: AnalysisMeta,
    pub summary: NationalSummary,
    pub wells: Vec<WellProfile>,
    pub map_points: Vec<MapPoint>,
    pub aggregates: BTreeMap<AdminLevel, Vec<AggregateStats>>,
    pub reconciliations: Vec<ReconciliationReport>,
    pub projections: Vec<WellProjection>,
    pub views: Vec<RankedView>,
}
