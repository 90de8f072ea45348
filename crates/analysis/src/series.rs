use std::collections::{BTreeMap, HashSet};

use log::debug;

use crate::model::{DepthPoint, WellRecord, WellSeries};

/// Build the series for `station_id` from a flat record table.
///
/// Records without a date or a finite depth are skipped. Points are sorted
/// by date; when a date repeats, the first record in input order wins.
pub fn build_series(records: &[WellRecord], station_id: &str) -> WellSeries {
    let rows: Vec<&WellRecord> = records
        .iter()
        .filter(|r| r.station_id == station_id)
        .collect();
    series_from_rows(station_id, &rows)
}

/// Build one series per station, keyed by station id.
pub fn build_all_series(records: &[WellRecord]) -> BTreeMap<String, WellSeries> {
    let mut by_station: BTreeMap<&str, Vec<&WellRecord>> = BTreeMap::new();
    for record in records {
        by_station.entry(record.station_id.as_str()).or_default().push(record);
    }

    by_station
        .into_iter()
        .map(|(id, rows)| (id.to_string(), series_from_rows(id, &rows)))
        .collect()
}

fn series_from_rows(station_id: &str, rows: &[&WellRecord]) -> WellSeries {
    let mut points: Vec<DepthPoint> = Vec::with_capacity(rows.len());
    let mut seen = HashSet::new();
    let mut skipped = 0usize;
    let mut repeated_dates = 0usize;

    for row in rows {
        let (Some(date), Some(depth)) = (row.date, row.depth) else {
            skipped += 1;
            continue;
        };
        if !depth.is_finite() {
            skipped += 1;
            continue;
        }
        if !seen.insert(date) {
            repeated_dates += 1;
            continue;
        }
        points.push(DepthPoint { date, depth });
    }

    if skipped > 0 || repeated_dates > 0 {
        debug!(
            "{station_id}: dropped {skipped} record(s) with missing or invalid values, \
             {repeated_dates} with a repeated date"
        );
    }

    // stable, so first-seen order is kept for any equal dates
    points.sort_by_key(|p| p.date);

    WellSeries {
        station_id: station_id.to_string(),
        points,
        repeated_dates,
    }
}
