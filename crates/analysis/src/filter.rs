use std::collections::{BTreeSet, HashSet};

use crate::model::{AnalysisReport, ConsensusTrend, WellProfile};

/// Well selection for the explorer views. Empty fields select everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WellFilter {
    pub region: Option<String>,
    pub shac: Option<String>,
    pub consensus: Vec<ConsensusTrend>,
    /// Case-insensitive substring of station id or name.
    pub search: Option<String>,
}

impl WellFilter {
    pub fn is_empty(&self) -> bool {
        self.region.is_none()
            && self.shac.is_none()
            && self.consensus.is_empty()
            && self.search.as_deref().map_or(true, |s| s.trim().is_empty())
    }

    pub fn matches(&self, well: &WellProfile) -> bool {
        if let Some(region) = &self.region {
            if well.units.region.as_deref() != Some(region.as_str()) {
                return false;
            }
        }
        if let Some(shac) = &self.shac {
            if well.units.shac.as_deref() != Some(shac.as_str()) {
                return false;
            }
        }
        if !self.consensus.is_empty() {
            match well.consensus {
                Some(c) if self.consensus.contains(&c) => {}
                _ => return false,
            }
        }
        if let Some(needle) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = needle.to_lowercase();
            let in_id = well.station_id.to_lowercase().contains(&needle);
            let in_name = well
                .name
                .as_deref()
                .is_some_and(|n| n.to_lowercase().contains(&needle));
            if !(in_id || in_name) {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, wells: &'a [WellProfile]) -> Vec<&'a WellProfile> {
        wells.iter().filter(|w| self.matches(w)).collect()
    }

    /// Keep only selected wells in the per-well tables of a report (wells,
    /// map points, projections). Aggregates, reconciliations and the
    /// national summary stay as computed over the full population.
    pub fn restrict(&self, report: &mut AnalysisReport) {
        if self.is_empty() {
            return;
        }
        report.wells.retain(|w| self.matches(w));
        let kept: HashSet<&str> = report.wells.iter().map(|w| w.station_id.as_str()).collect();
        report.map_points.retain(|p| kept.contains(p.station_id.as_str()));
        report.projections.retain(|p| kept.contains(p.station_id.as_str()));
    }
}

/// SHAC keys seen among the wells of `region`, sorted.
pub fn shacs_in_region(wells: &[WellProfile], region: &str) -> Vec<String> {
    wells
        .iter()
        .filter(|w| w.units.region.as_deref() == Some(region))
        .filter_map(|w| w.units.shac.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AdminUnits, Projections};

    fn well(id: &str, name: &str, region: &str, shac: &str, consensus: Option<ConsensusTrend>) -> WellProfile {
        WellProfile {
            station_id: id.into(),
            name: Some(name.into()),
            units: AdminUnits {
                region: Some(region.into()),
                shac: Some(shac.into()),
                comuna: None,
            },
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
            consensus,
            declining: false,
            current_level: None,
            projections: Projections::default(),
            undefined: None,
        }
    }

    fn wells() -> Vec<WellProfile> {
        vec![
            well("05410001-6", "Lampa Norte", "Metropolitana", "Lampa", Some(ConsensusTrend::Decreasing)),
            well("05410002-4", "Colina Sur", "Metropolitana", "Chacabuco Polpaico", Some(ConsensusTrend::Stable)),
            well("03400001-2", "Copiapo Piedra Colgada", "Atacama", "Copiapo", None),
            well("05410003-2", "Batuco", "Metropolitana", "Lampa", Some(ConsensusTrend::Increasing)),
        ]
    }

    #[test]
    fn empty_filter_selects_all() {
        let w = wells();
        assert_eq!(WellFilter::default().apply(&w).len(), 4);
    }

    #[test]
    fn region_and_shac() {
        let w = wells();
        let f = WellFilter {
            region: Some("Metropolitana".into()),
            shac: Some("Lampa".into()),
            ..Default::default()
        };
        let ids: Vec<&str> = f.apply(&w).iter().map(|w| w.station_id.as_str()).collect();
        assert_eq!(ids, vec!["05410001-6", "05410003-2"]);
    }

    #[test]
    fn consensus_multiselect_excludes_unlabelled() {
        let w = wells();
        let f = WellFilter {
            consensus: vec![ConsensusTrend::Decreasing, ConsensusTrend::Stable],
            ..Default::default()
        };
        assert_eq!(f.apply(&w).len(), 2);
    }

    #[test]
    fn search_matches_id_or_name_case_insensitive() {
        let w = wells();
        let by_name = WellFilter {
            search: Some("copiapo".into()),
            ..Default::default()
        };
        assert_eq!(by_name.apply(&w)[0].station_id, "03400001-2");

        let by_id = WellFilter {
            search: Some("0541000".into()),
            ..Default::default()
        };
        assert_eq!(by_id.apply(&w).len(), 3);

        let blank = WellFilter {
            search: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(blank.apply(&w).len(), 4);
    }

    #[test]
    fn blank_filter_is_empty() {
        assert!(WellFilter::default().is_empty());
        let blank = WellFilter {
            search: Some(" ".into()),
            ..Default::default()
        };
        assert!(blank.is_empty());
        let region = WellFilter {
            region: Some("Atacama".into()),
            ..Default::default()
        };
        assert!(!region.is_empty());
    }

    #[test]
    fn shacs_listed_per_region() {
        let w = wells();
        assert_eq!(
            shacs_in_region(&w, "Metropolitana"),
            vec!["Chacabuco Polpaico", "Lampa"]
        );
        assert!(shacs_in_region(&w, "Magallanes").is_empty());
    }
}
