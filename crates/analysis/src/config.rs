use std::collections::HashSet;

use serde::Deserialize;

use crate::aggregate::CriticalThresholds;
use crate::classify::ClassificationConfig;
use crate::error::AnalysisError;
use crate::geo::GeoEnvelope;
use crate::model::{AdminLevel, SourceLabels, SourceRole, ViewMetric};
use crate::rank::Direction;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    pub name: String,
    #[serde(default)]
    pub envelope: GeoEnvelope,
    #[serde(default)]
    pub classification: ClassificationConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub wells: WellsConfig,
    #[serde(default)]
    pub reconcile: Vec<ReconcileConfig>,
    #[serde(default)]
    pub views: Vec<ViewConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregationConfig {
    /// Only wells inside the envelope enter the aggregates.
    #[serde(default)]
    pub require_valid_coordinates: bool,
    #[serde(default)]
    pub critical_pct_declining: CriticalThresholds,
}

// ---------------------------------------------------------------------------
// Well tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WellsConfig {
    #[serde(default)]
    pub history: Option<HistoryConfig>,
    #[serde(default)]
    pub summary: Option<SummaryConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    pub file: String,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    pub columns: HistoryColumns,
}

pub fn default_date_format() -> String {
    "%Y-%m-%d".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistoryColumns {
    pub station_id: String,
    pub date: String,
    pub depth: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub shac: Option<String>,
    #[serde(default)]
    pub comuna: Option<String>,
    #[serde(default)]
    pub latitude: Option<String>,
    #[serde(default)]
    pub longitude: Option<String>,
    #[serde(default)]
    pub elevation: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryConfig {
    pub file: String,
    pub columns: SummaryColumns,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SummaryColumns {
    pub station_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub shac: Option<String>,
    #[serde(default)]
    pub comuna: Option<String>,
    #[serde(default)]
    pub latitude: Option<String>,
    #[serde(default)]
    pub longitude: Option<String>,
    #[serde(default)]
    pub slope: Option<String>,
    #[serde(default)]
    pub r_squared: Option<String>,
    #[serde(default)]
    pub consensus: Option<String>,
    #[serde(default)]
    pub current_level: Option<String>,
    #[serde(default)]
    pub arima: Option<String>,
    #[serde(default)]
    pub prophet: Option<String>,
    #[serde(default)]
    pub lstm: Option<String>,
}

// ---------------------------------------------------------------------------
// Reconciliation sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileConfig {
    pub level: AdminLevel,
    pub registry: SourceConfig,
    pub census_a: SourceConfig,
    pub census_b: SourceConfig,
}

impl ReconcileConfig {
    pub fn sources(&self) -> [(SourceRole, &SourceConfig); 3] {
        [
            (SourceRole::Registry, &self.registry),
            (SourceRole::CensusA, &self.census_a),
            (SourceRole::CensusB, &self.census_b),
        ]
    }

    pub fn labels(&self) -> SourceLabels {
        let defaults = SourceLabels::default();
        SourceLabels {
            registry: self.registry.label.clone().unwrap_or(defaults.registry),
            census_a: self.census_a.label.clone().unwrap_or(defaults.census_a),
            census_b: self.census_b.label.clone().unwrap_or(defaults.census_b),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub file: String,
    #[serde(default)]
    pub label: Option<String>,
    pub columns: SourceColumns,
}

/// `counts`: one row per unit with a well count. `points`: one row per
/// located well, counted per unit after coordinate validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Counts,
    Points,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceColumns {
    pub unit: String,
    #[serde(default)]
    pub count: Option<String>,
    #[serde(default)]
    pub housing_units: Option<String>,
    #[serde(default)]
    pub latitude: Option<String>,
    #[serde(default)]
    pub longitude: Option<String>,
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// A ranked view. Aggregate metrics rank the well aggregates at `level`;
/// reconciliation metrics rank the reconciliation rows at `level`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewConfig {
    pub name: String,
    pub level: AdminLevel,
    pub metric: ViewMetric,
    #[serde(default)]
    pub direction: Direction,
    pub limit: usize,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl AnalysisConfig {
    pub fn from_toml(input: &str) -> Result<Self, AnalysisError> {
        let config: AnalysisConfig =
            toml::from_str(input).map_err(|e| AnalysisError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let env = &self.envelope;
        if !(env.lat_min < env.lat_max && env.lon_min < env.lon_max) {
            return Err(AnalysisError::ConfigValidation(format!(
                "envelope inverted: lat [{}, {}], lon [{}, {}]",
                env.lat_min, env.lat_max, env.lon_min, env.lon_max
            )));
        }

        self.classification.validate()?;
        self.aggregation.critical_pct_declining.validate()?;

        if self.wells.history.is_none() && self.wells.summary.is_none() && self.reconcile.is_empty()
        {
            return Err(AnalysisError::ConfigValidation(
                "no inputs: configure [wells.history], [wells.summary] or [[reconcile]]".into(),
            ));
        }

        if let Some(history) = &self.wells.history {
            if history.date_format.trim().is_empty() {
                return Err(AnalysisError::ConfigValidation(
                    "wells.history: date_format is empty".into(),
                ));
            }
        }

        let mut recon_levels = HashSet::new();
        for recon in &self.reconcile {
            if !recon_levels.insert(recon.level) {
                return Err(AnalysisError::ConfigValidation(format!(
                    "reconcile: level '{}' declared more than once",
                    recon.level
                )));
            }
            for (role, source) in recon.sources() {
                validate_source(recon.level, role, source)?;
            }
        }

        let has_wells = self.wells.history.is_some() || self.wells.summary.is_some();
        let mut names = HashSet::new();
        for view in &self.views {
            if !names.insert(view.name.as_str()) {
                return Err(AnalysisError::ConfigValidation(format!(
                    "duplicate view name '{}'",
                    view.name
                )));
            }
            if view.limit == 0 {
                return Err(AnalysisError::ConfigValidation(format!(
                    "view '{}': limit must be at least 1",
                    view.name
                )));
            }
            match view.metric {
                ViewMetric::Aggregate(_) if !has_wells => {
                    return Err(AnalysisError::ConfigValidation(format!(
                        "view '{}': aggregate metric needs a well table",
                        view.name
                    )));
                }
                ViewMetric::Reconciliation(_) if !recon_levels.contains(&view.level) => {
                    return Err(AnalysisError::ConfigValidation(format!(
                        "view '{}': no [[reconcile]] entry at level '{}'",
                        view.name, view.level
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }
}

fn validate_source(
    level: AdminLevel,
    role: SourceRole,
    source: &SourceConfig,
) -> Result<(), AnalysisError> {
    let c = &source.columns;
    let missing = match source.kind {
        SourceKind::Counts if c.count.is_none() => Some("count"),
        SourceKind::Points if c.latitude.is_none() => Some("latitude"),
        SourceKind::Points if c.longitude.is_none() => Some("longitude"),
        _ => None,
    };
    match missing {
        Some(column) => Err(AnalysisError::ConfigValidation(format!(
            "reconcile {level}.{role}: {:?} source needs a '{column}' column mapping",
            source.kind
        ))),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank::{AggregateMetric, ReconMetric};

    const VALID: &str = r#"
name = "Chile groundwater"

[wells.history]
file = "history.csv"

[wells.history.columns]
station_id = "CODIGO"
date       = "FECHA"
depth      = "NIVEL"
shac       = "SHAC"
latitude   = "LAT"
longitude  = "LON"

[wells.summary]
file = "summary.csv"

[wells.summary.columns]
station_id = "Station_ID"
region     = "Region"
shac       = "SHAC"
slope      = "Slope_m_per_year"
consensus  = "Consensus_Trend"

[[reconcile]]
level = "comuna"

[reconcile.registry]
kind  = "points"
file  = "dga.csv"
label = "DGA"
columns = { unit = "comuna", latitude = "lat", longitude = "lon" }

[reconcile.census_a]
kind  = "counts"
file  = "census_2017.csv"
label = "2017"
columns = { unit = "comuna", count = "pozos", housing_units = "viviendas" }

[reconcile.census_b]
kind  = "counts"
file  = "census_2024.csv"
label = "2024"
columns = { unit = "comuna", count = "pozos", housing_units = "viviendas" }

[[views]]
name   = "top_shacs_by_decline"
level  = "shac"
metric = "mean_slope"
limit  = 20

[[views]]
name      = "top_comunas_by_gap"
level     = "comuna"
metric    = "gap_vs_b"
direction = "ascending"
limit     = 15
"#;

    #[test]
    fn parse_valid() {
        let config = AnalysisConfig::from_toml(VALID).unwrap();
        assert_eq!(config.name, "Chile groundwater");
        assert_eq!(config.envelope, GeoEnvelope::NATIONAL);
        assert_eq!(config.classification, ClassificationConfig::default());
        assert!(!config.aggregation.require_valid_coordinates);

        let history = config.wells.history.as_ref().unwrap();
        assert_eq!(history.date_format, "%Y-%m-%d");
        assert_eq!(history.columns.shac.as_deref(), Some("SHAC"));
        assert!(history.columns.comuna.is_none());

        assert_eq!(config.reconcile.len(), 1);
        let recon = &config.reconcile[0];
        assert_eq!(recon.level, AdminLevel::Comuna);
        assert_eq!(recon.registry.kind, SourceKind::Points);
        assert_eq!(recon.labels().census_b, "2024");

        assert_eq!(config.views.len(), 2);
        assert_eq!(
            config.views[0].metric,
            ViewMetric::Aggregate(AggregateMetric::MeanSlope)
        );
        assert_eq!(config.views[0].direction, Direction::Descending);
        assert_eq!(
            config.views[1].metric,
            ViewMetric::Reconciliation(ReconMetric::GapVsB)
        );
        assert_eq!(config.views[1].direction, Direction::Ascending);
    }

    #[test]
    fn parse_threshold_overrides() {
        let input = format!(
            r#"{VALID}
[classification.coarse]
declining_above = 0.2
recovering_below = -0.2

[envelope]
lat_min = -40.0
lat_max = -30.0
lon_min = -75.0
lon_max = -70.0
"#
        );
        let config = AnalysisConfig::from_toml(&input).unwrap();
        assert_eq!(config.classification.coarse.declining_above, 0.2);
        assert_eq!(config.classification.fine.critical_above, 0.5);
        assert_eq!(config.envelope.lat_min, -40.0);
    }

    #[test]
    fn parse_critical_thresholds() {
        let config = AnalysisConfig::from_toml(VALID).unwrap();
        assert_eq!(
            config.aggregation.critical_pct_declining,
            CriticalThresholds::default()
        );

        let input = format!(
            r#"{VALID}
[aggregation]
require_valid_coordinates = true

[aggregation.critical_pct_declining]
region = 80.0
"#
        );
        let config = AnalysisConfig::from_toml(&input).unwrap();
        let critical = config.aggregation.critical_pct_declining;
        assert_eq!(critical.region, 80.0);
        assert_eq!(critical.shac, 75.0);

        let bad = format!("{VALID}\n[aggregation.critical_pct_declining]\nshac = 150.0\n");
        let err = AnalysisConfig::from_toml(&bad).unwrap_err();
        assert!(err.to_string().contains("critical_pct_declining.shac"));
    }

    #[test]
    fn reject_inverted_thresholds() {
        let input = format!(
            r#"{VALID}
[classification.coarse]
declining_above = -0.1
recovering_below = 0.1
"#
        );
        let err = AnalysisConfig::from_toml(&input).unwrap_err();
        assert!(matches!(err, AnalysisError::ConfigValidation(_)));
    }

    #[test]
    fn reject_inverted_envelope() {
        let input = format!(
            r#"{VALID}
[envelope]
lat_min = -17.0
lat_max = -56.0
lon_min = -76.0
lon_max = -66.0
"#
        );
        let err = AnalysisConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("envelope inverted"));
    }

    #[test]
    fn reject_zero_limit_and_duplicate_names() {
        let zero = format!(
            r#"{VALID}
[[views]]
name = "empty"
level = "region"
metric = "well_count"
limit = 0
"#
        );
        let err = AnalysisConfig::from_toml(&zero).unwrap_err();
        assert!(err.to_string().contains("limit"));

        let dup = format!(
            r#"{VALID}
[[views]]
name = "top_shacs_by_decline"
level = "region"
metric = "well_count"
limit = 5
"#
        );
        let err = AnalysisConfig::from_toml(&dup).unwrap_err();
        assert!(err.to_string().contains("duplicate view name"));
    }

    #[test]
    fn reject_view_without_source() {
        let input = format!(
            r#"{VALID}
[[views]]
name = "regions_by_gap"
level = "region"
metric = "gap_vs_a"
limit = 5
"#
        );
        let err = AnalysisConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("no [[reconcile]] entry"));
    }

    #[test]
    fn reject_unknown_metric() {
        let input = format!(
            r#"{VALID}
[[views]]
name = "bad"
level = "shac"
metric = "median_slope"
limit = 5
"#
        );
        let err = AnalysisConfig::from_toml(&input).unwrap_err();
        assert!(matches!(err, AnalysisError::ConfigParse(_)));
    }

    #[test]
    fn reject_counts_source_without_count_column() {
        let input = VALID.replace(
            r#"columns = { unit = "comuna", count = "pozos", housing_units = "viviendas" }"#,
            r#"columns = { unit = "comuna" }"#,
        );
        let err = AnalysisConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("'count' column"));
    }

    #[test]
    fn reject_empty_config() {
        let err = AnalysisConfig::from_toml(r#"name = "nothing""#).unwrap_err();
        assert!(err.to_string().contains("no inputs"));
    }
}
