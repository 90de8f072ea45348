//! 2030 level changes from pre-computed model predictions.
//!
//! Predictions are consumed as given; nothing here forecasts.

use crate::model::{WellProfile, WellProjection};

/// Change per model and for the mean of the available predictions.
/// `None` when the well has no current level or no prediction at all.
pub fn project_well(well: &WellProfile) -> Option<WellProjection> {
    let current = well.current_level.filter(|v| v.is_finite())?;
    let p = &well.projections;
    let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
    let (arima, prophet, lstm) = (finite(p.arima), finite(p.prophet), finite(p.lstm));

    let available: Vec<f64> = [arima, prophet, lstm].into_iter().flatten().collect();
    if available.is_empty() {
        return None;
    }
    let ensemble = available.iter().sum::<f64>() / available.len() as f64;

    Some(WellProjection {
        station_id: well.station_id.clone(),
        current_level: current,
        arima_change: arima.map(|v| v - current),
        prophet_change: prophet.map(|v| v - current),
        lstm_change: lstm.map(|v| v - current),
        ensemble,
        ensemble_change: ensemble - current,
    })
}

pub fn project(wells: &[WellProfile]) -> Vec<WellProjection> {
    wells.iter().filter_map(project_well).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AdminUnits, Projections};
    use approx::assert_relative_eq;

    fn well(current: Option<f64>, projections: Projections) -> WellProfile {
        WellProfile {
            station_id: "W".into(),
            name: None,
            units: AdminUnits::default(),
            latitude: None,
            longitude: None,
            coordinates_valid: false,
            slope: None,
            slope_source: None,
            r_squared: None,
            sample_count: None,
            first_date: None,
            last_date: None,
            category: None,
            fine_band: None,
            consensus: None,
            declining: false,
            current_level: current,
            projections,
            undefined: None,
        }
    }

    #[test]
    fn ensemble_of_all_models() {
        let w = well(
            Some(20.0),
            Projections {
                arima: Some(22.0),
                prophet: Some(24.0),
                lstm: Some(23.0),
            },
        );
        let p = project_well(&w).unwrap();
        assert_relative_eq!(p.ensemble, 23.0);
        assert_relative_eq!(p.ensemble_change, 3.0);
        assert_relative_eq!(p.arima_change.unwrap(), 2.0);
        assert_relative_eq!(p.prophet_change.unwrap(), 4.0);
    }

    #[test]
    fn ensemble_uses_available_models_only() {
        let w = well(
            Some(10.0),
            Projections {
                arima: None,
                prophet: Some(8.0),
                lstm: Some(f64::NAN),
            },
        );
        let p = project_well(&w).unwrap();
        assert_eq!(p.arima_change, None);
        assert_eq!(p.lstm_change, None);
        assert_relative_eq!(p.ensemble, 8.0);
        assert_relative_eq!(p.ensemble_change, -2.0);
    }

    #[test]
    fn no_projection_without_level_or_predictions() {
        assert!(project_well(&well(None, Projections { arima: Some(1.0), ..Default::default() })).is_none());
        assert!(project_well(&well(Some(1.0), Projections::default())).is_none());
        assert!(project(&[well(Some(1.0), Projections::default())]).is_empty());
    }
}
