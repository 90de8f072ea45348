use std::collections::{BTreeMap, BTreeSet};

use crate::model::{DuplicateKey, SourceCount, SourceRole, UnmatchedKeys};

/// One unit present in all three sources.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedUnit {
    pub unit: String,
    pub registry: SourceCount,
    pub census_a: SourceCount,
    pub census_b: SourceCount,
}

#[derive(Debug)]
pub struct AlignmentOutput {
    pub aligned: Vec<AlignedUnit>,
    pub unmatched: UnmatchedKeys,
    pub duplicates: Vec<DuplicateKey>,
}

/// Collapse rows sharing a unit key: counts are summed, housing units are
/// summed only when every row carries them.
pub fn collapse_counts(
    source: SourceRole,
    rows: &[SourceCount],
) -> (BTreeMap<String, SourceCount>, Vec<DuplicateKey>) {
    let mut map: BTreeMap<String, (SourceCount, usize)> = BTreeMap::new();

    for row in rows {
        match map.get_mut(&row.unit) {
            Some((total, seen)) => {
                total.wells += row.wells;
                total.housing_units = match (total.housing_units, row.housing_units) {
                    (Some(a), Some(b)) => Some(a + b),
                    _ => None,
                };
                *seen += 1;
            }
            None => {
                map.insert(row.unit.clone(), (row.clone(), 1));
            }
        }
    }

    let duplicates = map
        .iter()
        .filter(|(_, (_, seen))| *seen > 1)
        .map(|(unit, (_, seen))| DuplicateKey {
            source,
            unit: unit.clone(),
            rows: *seen,
        })
        .collect();

    let collapsed = map.into_iter().map(|(k, (count, _))| (k, count)).collect();
    (collapsed, duplicates)
}

/// Align three count tables by exact unit key.
///
/// Keys present in all three sources are aligned (in key order). Any other
/// key is reported under each source it is missing from.
pub fn align_exact_key(
    registry: &[SourceCount],
    census_a: &[SourceCount],
    census_b: &[SourceCount],
) -> AlignmentOutput {
    let (reg_map, mut duplicates) = collapse_counts(SourceRole::Registry, registry);
    let (a_map, dup_a) = collapse_counts(SourceRole::CensusA, census_a);
    let (b_map, dup_b) = collapse_counts(SourceRole::CensusB, census_b);
    duplicates.extend(dup_a);
    duplicates.extend(dup_b);

    let all_keys: BTreeSet<&String> = reg_map.keys().chain(a_map.keys()).chain(b_map.keys()).collect();

    let mut aligned = Vec::new();
    let mut unmatched = UnmatchedKeys::default();

    for key in all_keys {
        match (reg_map.get(key), a_map.get(key), b_map.get(key)) {
            (Some(r), Some(a), Some(b)) => aligned.push(AlignedUnit {
                unit: key.clone(),
                registry: r.clone(),
                census_a: a.clone(),
                census_b: b.clone(),
            }),
            (r, a, b) => {
                if r.is_none() {
                    unmatched.missing_from_registry.push(key.clone());
                }
                if a.is_none() {
                    unmatched.missing_from_census_a.push(key.clone());
                }
                if b.is_none() {
                    unmatched.missing_from_census_b.push(key.clone());
                }
            }
        }
    }

    AlignmentOutput {
        aligned,
        unmatched,
        duplicates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(unit: &str, wells: u64, housing: Option<u64>) -> SourceCount {
        SourceCount {
            unit: unit.into(),
            wells,
            housing_units: housing,
        }
    }

    #[test]
    fn all_keys_matched() {
        let reg = vec![count("Lampa", 10, None), count("Colina", 5, None)];
        let a = vec![count("Colina", 8, Some(100)), count("Lampa", 30, Some(400))];
        let b = vec![count("Lampa", 40, Some(420)), count("Colina", 9, Some(110))];
        let out = align_exact_key(&reg, &a, &b);
        assert_eq!(out.aligned.len(), 2);
        assert!(out.unmatched.is_empty());
        // key order
        assert_eq!(out.aligned[0].unit, "Colina");
        assert_eq!(out.aligned[1].census_b.wells, 40);
    }

    #[test]
    fn unmatched_keys_reported_per_source() {
        let reg = vec![count("Lampa", 10, None), count("Til Til", 1, None)];
        let a = vec![count("Lampa", 30, None), count("Tiltil", 2, None)];
        let b = vec![count("Lampa", 40, None)];
        let out = align_exact_key(&reg, &a, &b);
        assert_eq!(out.aligned.len(), 1);
        assert_eq!(out.unmatched.missing_from_registry, vec!["Tiltil"]);
        assert_eq!(out.unmatched.missing_from_census_a, vec!["Til Til"]);
        assert_eq!(out.unmatched.missing_from_census_b, vec!["Til Til", "Tiltil"]);
        assert_eq!(out.unmatched.excluded_units(), vec!["Til Til", "Tiltil"]);
    }

    #[test]
    fn keys_are_case_sensitive() {
        let out = align_exact_key(
            &[count("lampa", 1, None)],
            &[count("Lampa", 1, None)],
            &[count("Lampa", 1, None)],
        );
        assert!(out.aligned.is_empty());
        assert_eq!(out.unmatched.missing_from_registry, vec!["Lampa"]);
    }

    #[test]
    fn duplicates_are_summed_and_reported() {
        let rows = vec![
            count("Lampa", 10, Some(100)),
            count("Lampa", 5, Some(50)),
            count("Colina", 1, Some(10)),
        ];
        let (map, dups) = collapse_counts(SourceRole::CensusA, &rows);
        assert_eq!(map["Lampa"].wells, 15);
        assert_eq!(map["Lampa"].housing_units, Some(150));
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].unit, "Lampa");
        assert_eq!(dups[0].rows, 2);
    }

    #[test]
    fn partial_housing_collapses_to_none() {
        let rows = vec![count("Lampa", 10, Some(100)), count("Lampa", 5, None)];
        let (map, _) = collapse_counts(SourceRole::CensusB, &rows);
        assert_eq!(map["Lampa"].housing_units, None);
    }
}
