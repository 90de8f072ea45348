//! CSV text → typed input tables, via the column mappings in the config.
//!
//! Cells are trimmed; empty cells are missing values. Unparseable dates
//! and depths are missing values too, but an unparseable well count is an
//! error for that table. File access stays with the caller.

use std::iter::Zip;
use std::ops::RangeFrom;

use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use log::{debug, warn};

use crate::config::{
    AnalysisConfig, HistoryConfig, SourceColumns, SourceConfig, SourceKind, SummaryConfig,
};
use crate::error::{AnalysisError, Result};
use crate::geo::GeoEnvelope;
use crate::model::{
    AdminUnits, AnalysisInput, ConsensusTrend, Projections, ReconSources, SourceCount,
    SourcePoint, WellMetadata, WellRecord, WellSummary,
};
use crate::reconcile::count_points;

// ---------------------------------------------------------------------------
// Header + cell helpers
// ---------------------------------------------------------------------------

struct Table<'a> {
    name: &'a str,
    headers: Vec<String>,
    reader: csv::Reader<&'a [u8]>,
}

impl<'a> Table<'a> {
    fn open(name: &'a str, csv_data: &'a str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(csv_data.as_bytes());
        let headers = reader
            .headers()
            .map_err(|e| csv_error(name, e))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        Ok(Self {
            name,
            headers,
            reader,
        })
    }

    fn idx(&self, column: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| AnalysisError::MissingColumn {
                table: self.name.into(),
                column: column.into(),
            })
    }

    /// A mapped optional column must still exist in the header.
    fn opt_idx(&self, column: Option<&String>) -> Result<Option<usize>> {
        column.map(|c| self.idx(c)).transpose()
    }

    /// Data rows with their 1-based row number.
    fn rows(&mut self) -> Zip<RangeFrom<usize>, csv::StringRecordsIter<'_, &'a [u8]>> {
        (1..).zip(self.reader.records())
    }
}

fn csv_error(table: &str, err: csv::Error) -> AnalysisError {
    AnalysisError::Csv {
        table: table.into(),
        message: err.to_string(),
    }
}

fn cell(record: &StringRecord, idx: Option<usize>) -> Option<&str> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn text(record: &StringRecord, idx: Option<usize>) -> Option<String> {
    cell(record, idx).map(String::from)
}

fn number(record: &StringRecord, idx: Option<usize>) -> Option<f64> {
    cell(record, idx)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn parse_date(value: &str, format: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, format)
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

fn count(
    table: &str,
    row: usize,
    column: &str,
    record: &StringRecord,
    idx: Option<usize>,
) -> Result<Option<u64>> {
    let Some(raw) = cell(record, idx) else {
        return Ok(None);
    };
    let parsed = raw.parse::<u64>().ok().or_else(|| {
        // Spreadsheet exports write integral counts as "1234.0".
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0 && v.fract() == 0.0)
            .map(|v| v as u64)
    });
    parsed.map(Some).ok_or_else(|| AnalysisError::ValueParse {
        table: table.into(),
        row,
        column: column.into(),
        value: raw.into(),
    })
}

// ---------------------------------------------------------------------------
// Well tables
// ---------------------------------------------------------------------------

/// Load the long-format measurement table.
pub fn load_history(csv_data: &str, config: &HistoryConfig) -> Result<Vec<WellRecord>> {
    let mut table = Table::open("wells.history", csv_data)?;
    let col = &config.columns;

    let station_idx = table.idx(&col.station_id)?;
    let date_idx = table.idx(&col.date)?;
    let depth_idx = table.idx(&col.depth)?;
    let name_idx = table.opt_idx(col.name.as_ref())?;
    let region_idx = table.opt_idx(col.region.as_ref())?;
    let shac_idx = table.opt_idx(col.shac.as_ref())?;
    let comuna_idx = table.opt_idx(col.comuna.as_ref())?;
    let lat_idx = table.opt_idx(col.latitude.as_ref())?;
    let lon_idx = table.opt_idx(col.longitude.as_ref())?;
    let elev_idx = table.opt_idx(col.elevation.as_ref())?;

    let name = table.name;
    let mut records = Vec::new();
    let mut no_station = 0usize;

    for (_, record) in table.rows() {
        let record = record.map_err(|e| csv_error(name, e))?;
        let Some(station_id) = text(&record, Some(station_idx)) else {
            no_station += 1;
            continue;
        };

        records.push(WellRecord {
            station_id,
            date: cell(&record, Some(date_idx)).and_then(|d| parse_date(d, &config.date_format)),
            depth: number(&record, Some(depth_idx)),
            metadata: WellMetadata {
                name: text(&record, name_idx),
                units: AdminUnits {
                    region: text(&record, region_idx),
                    shac: text(&record, shac_idx),
                    comuna: text(&record, comuna_idx),
                },
                latitude: number(&record, lat_idx),
                longitude: number(&record, lon_idx),
                elevation: number(&record, elev_idx),
            },
        });
    }

    if no_station > 0 {
        warn!("{name}: skipped {no_station} row(s) without a station id");
    }
    debug!("{name}: loaded {} measurement(s)", records.len());
    Ok(records)
}

/// Load the one-row-per-well summary table.
pub fn load_summary(csv_data: &str, config: &SummaryConfig) -> Result<Vec<WellSummary>> {
    let mut table = Table::open("wells.summary", csv_data)?;
    let col = &config.columns;

    let station_idx = table.idx(&col.station_id)?;
    let name_idx = table.opt_idx(col.name.as_ref())?;
    let region_idx = table.opt_idx(col.region.as_ref())?;
    let shac_idx = table.opt_idx(col.shac.as_ref())?;
    let comuna_idx = table.opt_idx(col.comuna.as_ref())?;
    let lat_idx = table.opt_idx(col.latitude.as_ref())?;
    let lon_idx = table.opt_idx(col.longitude.as_ref())?;
    let slope_idx = table.opt_idx(col.slope.as_ref())?;
    let r2_idx = table.opt_idx(col.r_squared.as_ref())?;
    let consensus_idx = table.opt_idx(col.consensus.as_ref())?;
    let level_idx = table.opt_idx(col.current_level.as_ref())?;
    let arima_idx = table.opt_idx(col.arima.as_ref())?;
    let prophet_idx = table.opt_idx(col.prophet.as_ref())?;
    let lstm_idx = table.opt_idx(col.lstm.as_ref())?;

    let name = table.name;
    let mut summaries = Vec::new();
    let mut unknown_labels = 0usize;

    for (_, record) in table.rows() {
        let record = record.map_err(|e| csv_error(name, e))?;
        let Some(station_id) = text(&record, Some(station_idx)) else {
            continue;
        };

        let label = cell(&record, consensus_idx);
        let consensus = label.and_then(ConsensusTrend::from_label);
        if label.is_some() && consensus.is_none() {
            unknown_labels += 1;
        }

        summaries.push(WellSummary {
            station_id,
            name: text(&record, name_idx),
            units: AdminUnits {
                region: text(&record, region_idx),
                shac: text(&record, shac_idx),
                comuna: text(&record, comuna_idx),
            },
            latitude: number(&record, lat_idx),
            longitude: number(&record, lon_idx),
            slope: number(&record, slope_idx),
            r_squared: number(&record, r2_idx),
            consensus,
            current_level: number(&record, level_idx),
            projections: Projections {
                arima: number(&record, arima_idx),
                prophet: number(&record, prophet_idx),
                lstm: number(&record, lstm_idx),
            },
        });
    }

    if unknown_labels > 0 {
        warn!("{name}: {unknown_labels} unrecognised consensus label(s) treated as absent");
    }
    debug!("{name}: loaded {} well(s)", summaries.len());
    Ok(summaries)
}

// ---------------------------------------------------------------------------
// Registry / census tables
// ---------------------------------------------------------------------------

/// Load a per-unit count table. Rows without a unit key are skipped.
pub fn load_counts(table_name: &str, csv_data: &str, columns: &SourceColumns) -> Result<Vec<SourceCount>> {
    let mut table = Table::open(table_name, csv_data)?;
    let count_column = columns.count.as_deref().ok_or_else(|| AnalysisError::ConfigValidation(
        format!("{table_name}: counts table needs a 'count' column mapping"),
    ))?;

    let unit_idx = table.idx(&columns.unit)?;
    let count_idx = table.idx(count_column)?;
    let housing_idx = table.opt_idx(columns.housing_units.as_ref())?;
    let housing_column = columns.housing_units.as_deref().unwrap_or_default();

    let mut counts = Vec::new();
    for (row, record) in table.rows() {
        let record = record.map_err(|e| csv_error(table_name, e))?;
        let Some(unit) = text(&record, Some(unit_idx)) else {
            debug!("{table_name}: row {row} has no unit key, skipped");
            continue;
        };
        let wells = count(table_name, row, count_column, &record, Some(count_idx))?.ok_or_else(
            || AnalysisError::ValueParse {
                table: table_name.into(),
                row,
                column: count_column.into(),
                value: String::new(),
            },
        )?;
        let housing_units = count(table_name, row, housing_column, &record, housing_idx)?;

        counts.push(SourceCount {
            unit,
            wells,
            housing_units,
        });
    }
    Ok(counts)
}

/// Load a point table (one row per located well).
pub fn load_points(table_name: &str, csv_data: &str, columns: &SourceColumns) -> Result<Vec<SourcePoint>> {
    let mut table = Table::open(table_name, csv_data)?;
    let (Some(lat_column), Some(lon_column)) = (&columns.latitude, &columns.longitude) else {
        return Err(AnalysisError::ConfigValidation(format!(
            "{table_name}: points table needs 'latitude' and 'longitude' column mappings"
        )));
    };

    let unit_idx = table.idx(&columns.unit)?;
    let lat_idx = table.idx(lat_column)?;
    let lon_idx = table.idx(lon_column)?;

    let mut points = Vec::new();
    for (_, record) in table.rows() {
        let record = record.map_err(|e| csv_error(table_name, e))?;
        points.push(SourcePoint {
            unit: text(&record, Some(unit_idx)),
            latitude: number(&record, Some(lat_idx)),
            longitude: number(&record, Some(lon_idx)),
        });
    }
    Ok(points)
}

/// Load one source as a count table, counting points when needed.
pub fn load_source(
    table_name: &str,
    csv_data: &str,
    source: &SourceConfig,
    envelope: &GeoEnvelope,
) -> Result<Vec<SourceCount>> {
    match source.kind {
        SourceKind::Counts => load_counts(table_name, csv_data, &source.columns),
        SourceKind::Points => {
            let points = load_points(table_name, csv_data, &source.columns)?;
            let counts = count_points(&points, envelope);
            let counted: u64 = counts.iter().map(|c| c.wells).sum();
            if counted < points.len() as u64 {
                debug!(
                    "{table_name}: {} of {} point(s) dropped (no unit or invalid coordinates)",
                    points.len() as u64 - counted,
                    points.len()
                );
            }
            Ok(counts)
        }
    }
}

// ---------------------------------------------------------------------------
// Whole input
// ---------------------------------------------------------------------------

/// Load every table named by `config`. `read` maps a configured file name
/// to its contents.
pub fn load_input<F>(config: &AnalysisConfig, mut read: F) -> Result<AnalysisInput>
where
    F: FnMut(&str) -> Result<String>,
{
    let mut input = AnalysisInput::default();

    if let Some(history) = &config.wells.history {
        let data = read(&history.file)?;
        input.history = load_history(&data, history)?;
    }
    if let Some(summary) = &config.wells.summary {
        let data = read(&summary.file)?;
        input.summaries = load_summary(&data, summary)?;
    }

    for recon in &config.reconcile {
        let mut tables: [Vec<SourceCount>; 3] = Default::default();
        for (slot, (role, source)) in tables.iter_mut().zip(recon.sources()) {
            let data = read(&source.file)?;
            let table_name = format!("reconcile.{}.{}", recon.level, role);
            *slot = load_source(&table_name, &data, source, &config.envelope)?;
        }
        let [registry, census_a, census_b] = tables;
        input.sources.push(ReconSources {
            level: recon.level,
            labels: recon.labels(),
            registry,
            census_a,
            census_b,
        });
    }

    Ok(input)
}
