use crate::region_code::normalize;
use crate::scale::Color;
use crate::types::{
    sanitize_value, AnnotatedFeature, CanonicalCode, FrequencyMode, RegionFeature, RegionKey,
    StatisticRecord,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Annotates every feature with the value of its region, or 0 when no record
/// matches. Codes are compared after normalization; when two records share a
/// code the later one wins.
pub fn join(features: &[Arc<RegionFeature>], records: &[StatisticRecord]) -> Vec<AnnotatedFeature> {
    let lookup = build_lookup(records);

    features
        .iter()
        .map(|feature| {
            let display_value = feature
                .key
                .code()
                .and_then(|code| lookup.get(code))
                .copied()
                .unwrap_or(0.0);
            AnnotatedFeature {
                region: Arc::clone(feature),
                display_value,
                display_color: Color::NO_DATA,
            }
        })
        .collect()
}

fn build_lookup(records: &[StatisticRecord]) -> HashMap<CanonicalCode, f64> {
    let mut lookup = HashMap::with_capacity(records.len());
    for record in records {
        match normalize(&record.region_code) {
            RegionKey::Code(code) => {
                if let Some(previous) = lookup.insert(code.clone(), sanitize_value(record.value)) {
                    tracing::debug!(%code, previous, "duplicate region record, keeping the later one");
                }
            }
            RegionKey::Unknown => {
                tracing::warn!(value = record.value, "statistic record without region code skipped");
            }
        }
    }
    lookup
}

/// Converts absolute values to percentage shares of the record set total.
/// A zero total yields all zeros.
pub fn to_percentage(records: &[StatisticRecord]) -> Vec<StatisticRecord> {
    let total: f64 = records.iter().map(|r| sanitize_value(r.value)).sum();

    records
        .iter()
        .map(|r| StatisticRecord {
            region_code: r.region_code.clone(),
            value: if total > 0.0 {
                100.0 * sanitize_value(r.value) / total
            } else {
                0.0
            },
        })
        .collect()
}

/// Applies the transform selected by `mode`. Runs before the join so shares
/// are computed over the statistics population only.
pub fn transform(records: Vec<StatisticRecord>, mode: FrequencyMode) -> Vec<StatisticRecord> {
    match mode {
        FrequencyMode::Absolute => records,
        FrequencyMode::Percentage => to_percentage(&records),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawRegionCode;
    use approx::assert_relative_eq;

    fn region(code: impl Into<RawRegionCode>, name: &str) -> Arc<RegionFeature> {
        let raw_code = code.into();
        Arc::new(RegionFeature {
            key: normalize(&raw_code),
            raw_code,
            name: name.to_string(),
            geometry: None,
            properties: Default::default(),
        })
    }

    fn values(joined: &[AnnotatedFeature]) -> Vec<(String, f64)> {
        joined
            .iter()
            .map(|f| (f.region.key.to_string(), f.display_value))
            .collect()
    }

    fn three_regions() -> Vec<Arc<RegionFeature>> {
        vec![
            region(1, "Piemonte"),
            region(2, "Valle d'Aosta"),
            region(3, "Lombardia"),
        ]
    }

    #[test]
    fn join_matches_across_code_forms() {
        let records = vec![
            StatisticRecord::new("1", 100.0),
            StatisticRecord::new("02", 50.0),
        ];
        let joined = join(&three_regions(), &records);
        assert_eq!(
            values(&joined),
            vec![("01".into(), 100.0), ("02".into(), 50.0), ("03".into(), 0.0)]
        );
    }

    #[test]
    fn join_with_no_records_is_all_zero() {
        let joined = join(&three_regions(), &[]);
        assert_eq!(joined.len(), 3);
        assert!(joined.iter().all(|f| f.display_value == 0.0));
    }

    #[test]
    fn later_duplicate_wins() {
        let records = vec![
            StatisticRecord::new(1, 10.0),
            StatisticRecord::new("01", 20.0),
            StatisticRecord::new("1", 30.0),
        ];
        let joined = join(&three_regions(), &records);
        assert_eq!(joined[0].display_value, 30.0);
    }

    #[test]
    fn join_is_total_and_only_uses_record_values() {
        let features = three_regions();
        let records = vec![
            StatisticRecord::new(3, 7.0),
            StatisticRecord::new(RawRegionCode::Missing, 99.0),
            StatisticRecord::new(42, 5.0),
        ];
        let joined = join(&features, &records);
        assert_eq!(joined.len(), features.len());
        for f in &joined {
            assert!(f.display_value == 0.0 || records.iter().any(|r| r.value == f.display_value));
            assert_ne!(f.display_value, 99.0);
        }
    }

    #[test]
    fn unknown_feature_code_never_matches() {
        let features = vec![region(RawRegionCode::Missing, "Nowhere")];
        let records = vec![StatisticRecord::new(RawRegionCode::Missing, 99.0)];
        assert_eq!(join(&features, &records)[0].display_value, 0.0);
    }

    #[test]
    fn join_leaves_base_features_untouched() {
        let features = three_regions();
        let joined = join(&features, &[StatisticRecord::new(1, 5.0)]);
        assert!(Arc::ptr_eq(&joined[0].region, &features[0]));
        assert_eq!(Arc::strong_count(&features[0]), 2);
        drop(joined);
        assert_eq!(Arc::strong_count(&features[0]), 1);
    }

    #[test]
    fn percentage_sums_to_one_hundred() {
        let records = vec![
            StatisticRecord::new("1", 100.0),
            StatisticRecord::new("02", 50.0),
        ];
        let shares = to_percentage(&records);
        assert_relative_eq!(shares[0].value, 66.666_666, epsilon = 0.01);
        assert_relative_eq!(shares[1].value, 33.333_333, epsilon = 0.01);
        assert_relative_eq!(shares.iter().map(|r| r.value).sum::<f64>(), 100.0, epsilon = 1e-9);
        assert_eq!(shares[0].region_code, records[0].region_code);
        assert_eq!(shares[1].region_code, records[1].region_code);
    }

    #[test]
    fn percentage_of_zero_total_is_all_zero() {
        let records = vec![StatisticRecord::new(1, 0.0), StatisticRecord::new(2, 0.0)];
        assert!(to_percentage(&records).iter().all(|r| r.value == 0.0));
        assert!(to_percentage(&[]).is_empty());
    }

    #[test]
    fn absolute_mode_passes_records_through() {
        let records = vec![StatisticRecord::new(1, 3.0)];
        assert_eq!(transform(records.clone(), FrequencyMode::Absolute), records);
    }

    #[test]
    fn percentage_runs_before_zero_fill() {
        let records = transform(
            vec![StatisticRecord::new("1", 100.0), StatisticRecord::new("02", 50.0)],
            FrequencyMode::Percentage,
        );
        let joined = join(&three_regions(), &records);
        assert_relative_eq!(joined[0].display_value, 66.67, epsilon = 0.01);
        assert_relative_eq!(joined[1].display_value, 33.33, epsilon = 0.01);
        assert_eq!(joined[2].display_value, 0.0);
    }
}
