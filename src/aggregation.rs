//! Aggregation layer
//!
//! Pure functions deriving dashboard figures from the current tourist and
//! alert collections. Nothing is cached; every read recomputes from scratch.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::warn;

use crate::alerts::is_actionable;
use crate::models::{Alert, AlertStatus, LocationPoint, Tourist};

/// Scores strictly above this count as safe
pub const SAFE_SCORE_THRESHOLD: u8 = 80;

/// Scores strictly below this count as high risk
pub const HIGH_RISK_SCORE_THRESHOLD: u8 = 40;

/// Maximum entries in the live alert feed
pub const LIVE_FEED_LIMIT: usize = 10;

/// Region bucket for tourists without an itinerary
pub const UNKNOWN_REGION: &str = "Unknown";

pub fn active_alert_count(alerts: &[Alert]) -> usize {
    alerts.iter().filter(|alert| is_actionable(alert)).count()
}

pub fn safe_count(tourists: &[Tourist]) -> usize {
    tourists
        .iter()
        .filter(|t| t.safety_score > SAFE_SCORE_THRESHOLD)
        .count()
}

pub fn high_risk_count(tourists: &[Tourist]) -> usize {
    tourists
        .iter()
        .filter(|t| t.safety_score < HIGH_RISK_SCORE_THRESHOLD)
        .count()
}

/// Tourists referenced by at least one actionable alert
pub fn distressed_tourist_ids(alerts: &[Alert]) -> HashSet<&str> {
    alerts
        .iter()
        .filter(|alert| is_actionable(alert))
        .map(|alert| alert.tourist_id.as_str())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionCount {
    pub region: String,
    pub count: usize,
}

/// Tourist counts by first itinerary stop, in first-seen order.
///
/// Every tourist lands in exactly one bucket; all tourists with an empty
/// itinerary share the single [`UNKNOWN_REGION`] bucket.
pub fn regional_distribution(tourists: &[Tourist]) -> Vec<RegionCount> {
    let mut groups: Vec<RegionCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for tourist in tourists {
        let region = tourist.first_region().unwrap_or(UNKNOWN_REGION);
        match index.get(region) {
            Some(&slot) => groups[slot].count += 1,
            None => {
                index.insert(region, groups.len());
                groups.push(RegionCount {
                    region: region.to_string(),
                    count: 1,
                });
            }
        }
    }

    groups
}

/// First alerts with status `new`, in collection order (not sorted by time)
pub fn live_feed(alerts: &[Alert]) -> Vec<&Alert> {
    alerts
        .iter()
        .filter(|alert| alert.status == AlertStatus::New)
        .take(LIVE_FEED_LIMIT)
        .collect()
}

/// Headline figures for the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_tourists: usize,
    pub active_alert_count: usize,
    pub safe_count: usize,
    pub high_risk_count: usize,
    /// Sorted for stable output
    pub distressed_tourist_ids: Vec<String>,
    pub regional_distribution: Vec<RegionCount>,
}

pub fn dashboard_stats(tourists: &[Tourist], alerts: &[Alert]) -> DashboardStats {
    let mut distressed: Vec<String> = distressed_tourist_ids(alerts)
        .into_iter()
        .map(str::to_string)
        .collect();
    distressed.sort();

    DashboardStats {
        total_tourists: tourists.len(),
        active_alert_count: active_alert_count(alerts),
        safe_count: safe_count(tourists),
        high_risk_count: high_risk_count(tourists),
        distressed_tourist_ids: distressed,
        regional_distribution: regional_distribution(tourists),
    }
}

/// Stats plus live feed, as pushed to WebSocket clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub revision: u64,
    pub stats: DashboardStats,
    pub live_feed: Vec<Alert>,
}

pub fn dashboard_snapshot(revision: u64, tourists: &[Tourist], alerts: &[Alert]) -> DashboardSnapshot {
    DashboardSnapshot {
        revision,
        stats: dashboard_stats(tourists, alerts),
        live_feed: live_feed(alerts).into_iter().cloned().collect(),
    }
}

/// Safety score banding used on tourist detail cards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyBand {
    Good,
    Moderate,
    Poor,
}

impl SafetyBand {
    pub fn for_score(score: u8) -> Self {
        if score > 70 {
            SafetyBand::Good
        } else if score > 40 {
            SafetyBand::Moderate
        } else {
            SafetyBand::Poor
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            SafetyBand::Good => "green",
            SafetyBand::Moderate => "yellow",
            SafetyBand::Poor => "red",
        }
    }
}

/// One tourist dot on the map
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapMarker {
    pub tourist_id: String,
    pub name: String,
    pub position: LocationPoint,
    pub safety_score: u8,
    pub safety_band: SafetyBand,
    /// Referenced by an actionable alert
    pub in_alert: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapMarkers {
    pub markers: Vec<MapMarker>,
    /// Tourists left off the map for lack of a recorded position
    pub unplotted: usize,
}

/// Markers at each tourist's latest position. Tourists with an empty
/// location history are skipped and counted in `unplotted`.
pub fn map_markers(tourists: &[Tourist], alerts: &[Alert]) -> MapMarkers {
    let distressed = distressed_tourist_ids(alerts);
    let mut markers = Vec::with_capacity(tourists.len());
    let mut unplotted = 0;

    for tourist in tourists {
        let Some(position) = tourist.current_position() else {
            warn!(tourist_id = %tourist.id, "Tourist has no location history, not plotted");
            unplotted += 1;
            continue;
        };

        markers.push(MapMarker {
            tourist_id: tourist.id.clone(),
            name: tourist.full_name(),
            position: position.clone(),
            safety_score: tourist.safety_score,
            safety_band: SafetyBand::for_score(tourist.safety_score),
            in_alert: distressed.contains(tourist.id.as_str()),
        });
    }

    MapMarkers { markers, unplotted }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::SeedData;
    use chrono::Utc;

    fn seed() -> SeedData {
        SeedData::build(Utc::now())
    }

    fn alerts_with(statuses: &[AlertStatus]) -> Vec<Alert> {
        let template = seed().alerts.remove(0);
        statuses
            .iter()
            .enumerate()
            .map(|(i, status)| Alert {
                id: format!("a-{}", i),
                tourist_id: format!("t-{}", i % 3),
                status: *status,
                ..template.clone()
            })
            .collect()
    }

    #[test]
    fn test_seed_score_counts() {
        let seed = seed();
        // Scores 85, 35, 62
        assert_eq!(high_risk_count(&seed.tourists), 1);
        assert_eq!(safe_count(&seed.tourists), 1);
    }

    #[test]
    fn test_score_thresholds_are_strict() {
        let mut tourists = seed().tourists;
        tourists[0].safety_score = 80;
        tourists[1].safety_score = 40;
        tourists[2].safety_score = 81;

        assert_eq!(safe_count(&tourists), 1);
        assert_eq!(high_risk_count(&tourists), 0);
    }

    #[test]
    fn test_active_alert_count() {
        let alerts = alerts_with(&[AlertStatus::New, AlertStatus::Acknowledged]);
        assert_eq!(active_alert_count(&alerts), 1);

        let alerts = alerts_with(&[
            AlertStatus::New,
            AlertStatus::Escalated,
            AlertStatus::Resolved,
            AlertStatus::Acknowledged,
        ]);
        assert_eq!(active_alert_count(&alerts), 2);
    }

    #[test]
    fn test_distressed_ids_deduplicated() {
        let alerts = alerts_with(&[
            AlertStatus::New,
            AlertStatus::Resolved,
            AlertStatus::Escalated,
            AlertStatus::New,
        ]);
        // a-0 -> t-0, a-2 -> t-2, a-3 -> t-0
        let ids = distressed_tourist_ids(&alerts);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("t-0"));
        assert!(ids.contains("t-2"));
        assert!(!ids.contains("t-1"));
    }

    #[test]
    fn test_regional_distribution_first_seen_order() {
        let mut tourists = Vec::new();
        for (i, region) in ["Tawang", "Shillong", "Tawang", "Kaziranga", "Shillong"]
            .iter()
            .enumerate()
        {
            let mut tourist = seed().tourists[0].clone();
            tourist.id = format!("t-{}", i);
            tourist.trip_itinerary[0].location = region.to_string();
            tourists.push(tourist);
        }

        let groups = regional_distribution(&tourists);
        assert_eq!(
            groups,
            vec![
                RegionCount { region: "Tawang".into(), count: 2 },
                RegionCount { region: "Shillong".into(), count: 2 },
                RegionCount { region: "Kaziranga".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_regional_distribution_unknown_bucket() {
        let mut tourists = seed().tourists;
        tourists[0].trip_itinerary.clear();
        tourists[2].trip_itinerary.clear();

        let groups = regional_distribution(&tourists);

        let unknown: Vec<&RegionCount> =
            groups.iter().filter(|g| g.region == UNKNOWN_REGION).collect();
        assert_eq!(unknown.len(), 1);
        assert_eq!(unknown[0].count, 2);
        assert_eq!(groups[0].region, UNKNOWN_REGION);

        let total: usize = groups.iter().map(|g| g.count).sum();
        assert_eq!(total, tourists.len());
    }

    #[test]
    fn test_regional_distribution_sums_to_total() {
        let tourists = seed().tourists;
        let total: usize = regional_distribution(&tourists).iter().map(|g| g.count).sum();
        assert_eq!(total, tourists.len());
        assert!(regional_distribution(&[]).is_empty());
    }

    #[test]
    fn test_live_feed_first_ten_new_in_order() {
        let mut statuses = Vec::new();
        for i in 0..25 {
            statuses.push(if i % 2 == 0 {
                AlertStatus::New
            } else {
                AlertStatus::Acknowledged
            });
        }
        let mut alerts = alerts_with(&statuses);
        // Reverse timestamps so "most recent" would give a different answer
        let base = Utc::now();
        for (i, alert) in alerts.iter_mut().enumerate() {
            alert.timestamp = base - chrono::Duration::minutes(i as i64);
        }

        let feed = live_feed(&alerts);

        assert_eq!(feed.len(), LIVE_FEED_LIMIT);
        assert!(feed.iter().all(|a| a.status == AlertStatus::New));
        let ids: Vec<&str> = feed.iter().map(|a| a.id.as_str()).collect();
        let expected: Vec<String> = (0..10).map(|i| format!("a-{}", i * 2)).collect();
        assert_eq!(ids, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn test_live_feed_short_list() {
        let alerts = alerts_with(&[AlertStatus::Resolved, AlertStatus::New]);
        let feed = live_feed(&alerts);
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].id, "a-1");
    }

    #[test]
    fn test_dashboard_stats_seed() {
        let seed = seed();
        let stats = dashboard_stats(&seed.tourists, &seed.alerts);

        assert_eq!(stats.total_tourists, 3);
        assert_eq!(stats.active_alert_count, 1);
        assert_eq!(
            stats.distressed_tourist_ids,
            vec!["bcd02-b8c3-d4e5-f6g7-h8i9j0k1l2m3".to_string()]
        );
        assert_eq!(stats.regional_distribution.len(), 3);
    }

    #[test]
    fn test_map_markers_flag_alerts_and_skip_empty_history() {
        let seed = seed();
        let mut tourists = seed.tourists.clone();
        tourists[2].location_history.clear();

        let map = map_markers(&tourists, &seed.alerts);

        assert_eq!(map.markers.len(), 2);
        assert_eq!(map.unplotted, 1);

        let priya = map
            .markers
            .iter()
            .find(|m| m.name == "Priya Sharma")
            .unwrap();
        assert!(priya.in_alert);
        assert_eq!(priya.safety_band, SafetyBand::Poor);
        assert_eq!(&priya.position, tourists[1].location_history.last().unwrap());

        // John's alert is acknowledged, so not highlighted
        let john = map.markers.iter().find(|m| m.name == "John Doe").unwrap();
        assert!(!john.in_alert);
    }

    #[test]
    fn test_safety_band() {
        assert_eq!(SafetyBand::for_score(71), SafetyBand::Good);
        assert_eq!(SafetyBand::for_score(70), SafetyBand::Moderate);
        assert_eq!(SafetyBand::for_score(41), SafetyBand::Moderate);
        assert_eq!(SafetyBand::for_score(40), SafetyBand::Poor);
        assert_eq!(SafetyBand::Good.color(), "green");
    }
}
