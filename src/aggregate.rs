use crate::speed::parse_speed_kmh;
use crate::types::{SpeedRecord, VehicleObservation};
use std::collections::HashMap;

/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Rounds half away from zero to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Reduces one fetch worth of observations into one [`SpeedRecord`] per route.
///
/// Observations whose speed fails validation are dropped before grouping, so
/// a route whose every observation is invalid produces no record. Every
/// record carries `as_of_ms`. Output is sorted by route tag.
pub fn aggregate(observations: &[VehicleObservation], as_of_ms: i64) -> Vec<SpeedRecord> {
    let mut speeds_by_route: HashMap<&str, Vec<f64>> = HashMap::new();

    for obs in observations {
        if obs.route_tag.is_empty() {
            continue;
        }
        let Some(speed) = parse_speed_kmh(obs.speed.as_deref()) else {
            continue;
        };
        speeds_by_route
            .entry(obs.route_tag.as_str())
            .or_default()
            .push(speed);
    }

    let mut records: Vec<SpeedRecord> = speeds_by_route
        .into_iter()
        .map(|(route_tag, speeds)| SpeedRecord {
            timestamp_ms: as_of_ms,
            route_tag: route_tag.to_string(),
            speed_kmh: round1(mean(&speeds)),
            vehicle_count: speeds.len() as u32,
        })
        .collect();

    records.sort_by(|a, b| a.route_tag.cmp(&b.route_tag));
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn obs(route: &str, speed: &str) -> VehicleObservation {
        VehicleObservation::new(route, Some(speed))
    }

    fn by_route(records: Vec<SpeedRecord>) -> HashMap<String, SpeedRecord> {
        records
            .into_iter()
            .map(|r| (r.route_tag.clone(), r))
            .collect()
    }

    #[test]
    fn test_mean_with_empty_input() {
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_round1_half_away_from_zero() {
        assert_eq!(round1(9.25), 9.3);
        assert_eq!(round1(9.24), 9.2);
        assert_eq!(round1(0.04), 0.0);
        assert_eq!(round1(12.0), 12.0);
    }

    #[test]
    fn test_two_vehicles_on_one_route() {
        let records = aggregate(&[obs("7", "8.9"), obs("7", "9.1")], 1000);

        assert_eq!(
            records,
            vec![SpeedRecord {
                timestamp_ms: 1000,
                route_tag: "7".to_string(),
                speed_kmh: 9.0,
                vehicle_count: 2,
            }]
        );
    }

    #[test]
    fn test_all_invalid_route_is_omitted() {
        let records = aggregate(&[obs("8", "-1"), obs("8", ""), obs("8", "abc")], 1000);
        assert!(records.is_empty());
    }

    #[test]
    fn test_invalid_observations_do_not_affect_valid_ones() {
        let records = by_route(aggregate(
            &[
                obs("504", "20"),
                obs("504", "-5"),
                obs("504", "fast"),
                VehicleObservation::new("504", None),
                obs("504", "30"),
            ],
            42,
        ));

        let r = &records["504"];
        assert_eq!(r.vehicle_count, 2);
        assert_eq!(r.speed_kmh, 25.0);
    }

    #[test]
    fn test_stopped_vehicle_counts() {
        let records = by_route(aggregate(&[obs("29", "0"), obs("29", "10")], 1));
        assert_eq!(records["29"].vehicle_count, 2);
        assert_eq!(records["29"].speed_kmh, 5.0);
    }

    #[test]
    fn test_multiple_routes_share_timestamp() {
        let records = aggregate(
            &[obs("1", "10"), obs("2", "20"), obs("1", "11"), obs("3", "x")],
            1_700_000_000_000,
        );

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.timestamp_ms == 1_700_000_000_000));

        let records = by_route(records);
        assert_eq!(records["1"].speed_kmh, 10.5);
        assert_eq!(records["1"].vehicle_count, 2);
        assert_eq!(records["2"].vehicle_count, 1);
        assert!(!records.contains_key("3"));
    }

    #[test]
    fn test_order_insensitive() {
        let a = aggregate(&[obs("1", "3.3"), obs("2", "4"), obs("1", "5.1")], 7);
        let b = aggregate(&[obs("1", "5.1"), obs("1", "3.3"), obs("2", "4")], 7);
        assert_eq!(by_route(a), by_route(b));
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate(&[], 0).is_empty());
    }
}
