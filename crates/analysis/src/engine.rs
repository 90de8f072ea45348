use std::collections::{BTreeMap, BTreeSet};

use log::info;

use crate::aggregate::aggregate_all;
use crate::classify::{effective_declining, ClassificationConfig};
use crate::config::{AnalysisConfig, ViewConfig};
use crate::error::Result;
use crate::geo::{is_valid, GeoEnvelope};
use crate::model::{
    AdminLevel, AdminUnits, AggregateStats, AnalysisInput, AnalysisMeta, AnalysisReport,
    MapPoint, RankedView, ReconciliationReport, SlopeSource, TrendResult, Undefined, ViewMetric,
    ViewRows, WellMetadata, WellProfile, WellRecord, WellSeries, WellSummary,
};
use crate::projection::project;
use crate::rank::{rank_aggregates, rank_reconciliation};
use crate::reconcile::reconcile;
use crate::series::build_all_series;
use crate::summary::compute_summary;
use crate::trend::estimate_trend;

/// Run the full analysis over pre-loaded tables.
pub fn run(config: &AnalysisConfig, input: &AnalysisInput) -> Result<AnalysisReport> {
    config.validate()?;

    let wells = build_profiles(
        &input.history,
        &input.summaries,
        &config.classification,
        &config.envelope,
    );
    info!(
        "profiled {} well(s) from {} measurement(s) and {} summary row(s)",
        wells.len(),
        input.history.len(),
        input.summaries.len()
    );

    let map_points = map_points(&wells);

    let aggregates = if config.aggregation.require_valid_coordinates {
        let located: Vec<WellProfile> = wells
            .iter()
            .filter(|w| w.coordinates_valid)
            .cloned()
            .collect();
        aggregate_all(&located)
    } else {
        aggregate_all(&wells)
    };

    let reconciliations: Vec<ReconciliationReport> = input.sources.iter().map(reconcile).collect();
    for r in &reconciliations {
        info!(
            "reconciled {} {} unit(s), {} excluded",
            r.rows.len(),
            r.level,
            r.unmatched.excluded_units().len()
        );
    }

    let projections = project(&wells);
    let views = config
        .views
        .iter()
        .map(|view| build_view(view, &aggregates, &reconciliations))
        .collect();
    let summary = compute_summary(
        &wells,
        &aggregates,
        &config.aggregation.critical_pct_declining,
        &reconciliations,
    );

    Ok(AnalysisReport {
        meta: AnalysisMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        wells,
        map_points,
        aggregates,
        reconciliations,
        projections,
        views,
    })
}

// ---------------------------------------------------------------------------
// Well profiles
// ---------------------------------------------------------------------------

/// One profile per station seen in either table, in station-id order.
///
/// The local fit supplies the slope when it is defined; otherwise the
/// summary slope is used. Summary fields take precedence over metadata
/// carried on the measurement rows.
pub fn build_profiles(
    history: &[WellRecord],
    summaries: &[WellSummary],
    classification: &ClassificationConfig,
    envelope: &GeoEnvelope,
) -> Vec<WellProfile> {
    let series = build_all_series(history);
    let fits: BTreeMap<&str, std::result::Result<TrendResult, Undefined>> = series
        .iter()
        .map(|(id, s)| (id.as_str(), estimate_trend(s, &classification.coarse)))
        .collect();
    let metadata = merge_metadata(history);

    let mut by_station: BTreeMap<&str, &WellSummary> = BTreeMap::new();
    for s in summaries {
        by_station.entry(s.station_id.as_str()).or_insert(s);
    }

    let ids: BTreeSet<&str> = fits
        .keys()
        .copied()
        .chain(by_station.keys().copied())
        .collect();

    ids.into_iter()
        .map(|id| {
            profile(
                id,
                series.get(id),
                fits.get(id),
                metadata.get(id),
                by_station.get(id).copied(),
                classification,
                envelope,
            )
        })
        .collect()
}

fn profile(
    station_id: &str,
    series: Option<&WellSeries>,
    fit: Option<&std::result::Result<TrendResult, Undefined>>,
    meta: Option<&WellMetadata>,
    summary: Option<&WellSummary>,
    classification: &ClassificationConfig,
    envelope: &GeoEnvelope,
) -> WellProfile {
    let summary_slope = summary.and_then(|s| s.slope).filter(|v| v.is_finite());

    let (slope, slope_source, r_squared, undefined) = match fit {
        Some(Ok(t)) => (
            Some(t.slope),
            Some(SlopeSource::History),
            Some(t.r_squared),
            None,
        ),
        Some(Err(reason)) => match summary_slope {
            Some(s) => (
                Some(s),
                Some(SlopeSource::Summary),
                summary.and_then(|s| s.r_squared),
                None,
            ),
            None => (None, None, None, Some(*reason)),
        },
        None => match summary_slope {
            Some(s) => (
                Some(s),
                Some(SlopeSource::Summary),
                summary.and_then(|s| s.r_squared),
                None,
            ),
            None => (
                None,
                None,
                None,
                Some(Undefined::InsufficientData { points: 0 }),
            ),
        },
    };

    let pick = |from_summary: Option<String>, from_meta: Option<String>| from_summary.or(from_meta);
    let meta_units = meta.map(|m| m.units.clone()).unwrap_or_default();
    let summary_units = summary.map(|s| s.units.clone()).unwrap_or_default();
    let units = AdminUnits {
        region: pick(summary_units.region, meta_units.region),
        shac: pick(summary_units.shac, meta_units.shac),
        comuna: pick(summary_units.comuna, meta_units.comuna),
    };

    let name = pick(
        summary.and_then(|s| s.name.clone()),
        meta.and_then(|m| m.name.clone()),
    );
    let latitude = summary
        .and_then(|s| s.latitude)
        .or_else(|| meta.and_then(|m| m.latitude));
    let longitude = summary
        .and_then(|s| s.longitude)
        .or_else(|| meta.and_then(|m| m.longitude));

    let category = slope.map(|s| classification.coarse.classify(s));
    let consensus = summary.and_then(|s| s.consensus);

    WellProfile {
        station_id: station_id.to_string(),
        name,
        units,
        latitude,
        longitude,
        coordinates_valid: is_valid(latitude, longitude, envelope),
        slope,
        slope_source,
        r_squared,
        sample_count: series.map(WellSeries::len),
        first_date: series.and_then(WellSeries::first_date),
        last_date: series.and_then(WellSeries::last_date),
        category,
        fine_band: slope.map(|s| classification.fine.classify(s)),
        consensus,
        declining: effective_declining(consensus, category),
        current_level: summary.and_then(|s| s.current_level),
        projections: summary.map(|s| s.projections).unwrap_or_default(),
        undefined,
    }
}

/// First non-missing value of each metadata field per station.
fn merge_metadata(history: &[WellRecord]) -> BTreeMap<&str, WellMetadata> {
    let mut merged: BTreeMap<&str, WellMetadata> = BTreeMap::new();
    for record in history {
        let m = merged.entry(record.station_id.as_str()).or_default();
        let r = &record.metadata;
        if m.name.is_none() {
            m.name = r.name.clone();
        }
        if m.units.region.is_none() {
            m.units.region = r.units.region.clone();
        }
        if m.units.shac.is_none() {
            m.units.shac = r.units.shac.clone();
        }
        if m.units.comuna.is_none() {
            m.units.comuna = r.units.comuna.clone();
        }
        if m.latitude.is_none() || m.longitude.is_none() {
            if r.latitude.is_some() && r.longitude.is_some() {
                m.latitude = r.latitude;
                m.longitude = r.longitude;
            }
        }
        if m.elevation.is_none() {
            m.elevation = r.elevation;
        }
    }
    merged
}

/// Wells whose coordinates passed validation.
pub fn map_points(wells: &[WellProfile]) -> Vec<MapPoint> {
    wells
        .iter()
        .filter(|w| w.coordinates_valid)
        .filter_map(|w| {
            Some(MapPoint {
                station_id: w.station_id.clone(),
                latitude: w.latitude?,
                longitude: w.longitude?,
                slope: w.slope,
                category: w.category,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

fn build_view(
    view: &ViewConfig,
    aggregates: &BTreeMap<AdminLevel, Vec<AggregateStats>>,
    reconciliations: &[ReconciliationReport],
) -> RankedView {
    let rows = match view.metric {
        ViewMetric::Aggregate(metric) => {
            let table = aggregates.get(&view.level).map(Vec::as_slice).unwrap_or(&[]);
            ViewRows::Aggregate(rank_aggregates(table, metric, view.direction, view.limit))
        }
        ViewMetric::Reconciliation(metric) => {
            let table = reconciliations
                .iter()
                .find(|r| r.level == view.level)
                .map(|r| r.rows.as_slice())
                .unwrap_or(&[]);
            ViewRows::Reconciliation(rank_reconciliation(
                table,
                metric,
                view.direction,
                view.limit,
            ))
        }
    };

    RankedView {
        name: view.name.clone(),
        level: view.level,
        metric: view.metric,
        direction: view.direction,
        limit: view.limit,
        rows,
    }
}
