//! Seed data
//!
//! Fixed tourists, alerts and zones used as the initial state and as the
//! fallback whenever bulk generation fails. The set is built once at start-up;
//! relative timestamps ("an hour ago") are resolved against that moment and
//! every later fallback restores the very same records.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::info;

use crate::models::{
    Alert, AlertStatus, AnomalyType, EmergencyContact, GeoPoint, IdDocumentType, ItineraryItem,
    Kyc, LocationPoint, Tourist, TouristStatus, Zone, ZoneType,
};

/// Complete seed dataset
#[derive(Debug, Clone, PartialEq)]
pub struct SeedData {
    pub tourists: Vec<Tourist>,
    pub alerts: Vec<Alert>,
    pub zones: Vec<Zone>,
}

impl SeedData {
    /// Build the seed set with timestamps relative to `now`
    pub fn build(now: DateTime<Utc>) -> Self {
        let seed = Self {
            tourists: tourists(now),
            alerts: alerts(now),
            zones: zones(),
        };

        info!(
            tourists = seed.tourists.len(),
            alerts = seed.alerts.len(),
            zones = seed.zones.len(),
            "Seed data prepared"
        );

        seed
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

fn point(lat: f64, lng: f64, timestamp: DateTime<Utc>) -> LocationPoint {
    LocationPoint {
        lat,
        lng,
        timestamp,
        zone_id: None,
    }
}

fn stop(location: &str, date: NaiveDate, activity: &str) -> ItineraryItem {
    ItineraryItem {
        location: location.to_string(),
        date,
        activity: activity.to_string(),
    }
}

fn contact(name: &str, phone: &str) -> EmergencyContact {
    EmergencyContact {
        name: name.to_string(),
        phone: phone.to_string(),
    }
}

fn kyc(
    document_type: IdDocumentType,
    id_number: &str,
    first_name: &str,
    last_name: &str,
    nationality: &str,
    dob: NaiveDate,
) -> Kyc {
    Kyc {
        document_type,
        id_number: id_number.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        nationality: nationality.to_string(),
        dob,
    }
}

fn tourists(now: DateTime<Utc>) -> Vec<Tourist> {
    vec![
        Tourist {
            id: "bcd01-a7b2-c3d4-e5f6-g7h8i9j0k1l2".to_string(),
            kyc: kyc(
                IdDocumentType::Passport,
                "A12345678",
                "John",
                "Doe",
                "USA",
                date(1990, 5, 15),
            ),
            trip_itinerary: vec![
                stop("Shillong", date(2024, 10, 20), "Sightseeing"),
                stop("Cherrapunji", date(2024, 10, 22), "Trekking"),
            ],
            emergency_contacts: vec![contact("Jane Doe", "123-456-7890")],
            safety_score: 85,
            // Samples recorded newest first; the last one still counts as current.
            location_history: vec![
                point(28.5, 77.2, now),
                point(28.51, 77.22, now - Duration::hours(1)),
            ],
            status: TouristStatus::Active,
            entry_date: date(2024, 10, 18),
            exit_date: date(2024, 10, 25),
        },
        Tourist {
            id: "bcd02-b8c3-d4e5-f6g7-h8i9j0k1l2m3".to_string(),
            kyc: kyc(
                IdDocumentType::Aadhaar,
                "1234 5678 9012",
                "Priya",
                "Sharma",
                "Indian",
                date(1995, 8, 22),
            ),
            trip_itinerary: vec![
                stop("Tawang", date(2024, 11, 1), "Monastery Visit"),
                stop("Guwahati", date(2024, 11, 5), "River Cruise"),
            ],
            emergency_contacts: vec![contact("Amit Sharma", "987-654-3210")],
            safety_score: 35,
            location_history: vec![
                point(27.6, 78.1, now),
                point(27.58, 78.05, now - Duration::hours(2)),
            ],
            status: TouristStatus::Distress,
            entry_date: date(2024, 10, 30),
            exit_date: date(2024, 11, 7),
        },
        Tourist {
            id: "bcd03-c9d4-e5f6-g7h8-i9j0k1l2m3n4".to_string(),
            kyc: kyc(
                IdDocumentType::Passport,
                "B87654321",
                "Hans",
                "Müller",
                "German",
                date(1988, 3, 10),
            ),
            trip_itinerary: vec![stop("Kaziranga", date(2024, 10, 25), "Wildlife Safari")],
            emergency_contacts: vec![contact("Greta Müller", "011-49-12345")],
            safety_score: 62,
            location_history: vec![point(27.9, 77.5, now)],
            status: TouristStatus::Active,
            entry_date: date(2024, 10, 24),
            exit_date: date(2024, 11, 2),
        },
    ]
}

fn alerts(now: DateTime<Utc>) -> Vec<Alert> {
    let half_hour_ago = now - Duration::minutes(30);

    vec![
        Alert {
            id: "alert-01".to_string(),
            tourist_id: "bcd02-b8c3-d4e5-f6g7-h8i9j0k1l2m3".to_string(),
            tourist_name: "Priya Sharma".to_string(),
            anomaly_type: AnomalyType::PanicButton,
            timestamp: now,
            location: point(27.6, 78.1, now),
            status: AlertStatus::New,
            details: "Panic button activated near Tawang Monastery.".to_string(),
        },
        Alert {
            id: "alert-02".to_string(),
            tourist_id: "bcd01-a7b2-c3d4-e5f6-g7h8i9j0k1l2".to_string(),
            tourist_name: "John Doe".to_string(),
            anomaly_type: AnomalyType::GeoFenceBreach,
            timestamp: half_hour_ago,
            location: point(28.5, 77.2, half_hour_ago),
            status: AlertStatus::Acknowledged,
            details: "Entered a restricted military zone.".to_string(),
        },
    ]
}

fn square(lat: f64, lng: f64, side: f64) -> Vec<GeoPoint> {
    vec![
        GeoPoint { lat, lng },
        GeoPoint { lat: lat + side, lng },
        GeoPoint {
            lat: lat + side,
            lng: lng + side,
        },
        GeoPoint { lat, lng: lng + side },
    ]
}

fn zones() -> Vec<Zone> {
    vec![
        Zone {
            id: "zone1".to_string(),
            name: "National Park".to_string(),
            zone_type: ZoneType::Restricted,
            polygon: square(28.0, 77.0, 0.1),
        },
        Zone {
            id: "zone2".to_string(),
            name: "Mountain Peak Trail".to_string(),
            zone_type: ZoneType::HighRisk,
            polygon: square(27.5, 78.0, 0.1),
        },
        Zone {
            id: "zone3".to_string(),
            name: "City Center".to_string(),
            zone_type: ZoneType::Safe,
            polygon: square(27.8, 77.5, 0.1),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_seed_shape() {
        let seed = SeedData::build(Utc::now());

        assert_eq!(seed.tourists.len(), 3);
        assert_eq!(seed.alerts.len(), 2);
        assert_eq!(seed.zones.len(), 3);

        let scores: Vec<u8> = seed.tourists.iter().map(|t| t.safety_score).collect();
        assert_eq!(scores, vec![85, 35, 62]);
    }

    #[test]
    fn test_seed_tourists_are_valid() {
        let seed = SeedData::build(Utc::now());
        for tourist in &seed.tourists {
            assert!(tourist.validate().is_ok(), "{}", tourist.id);
            assert!(tourist.current_position().is_some());
        }
    }

    #[test]
    fn test_seed_alerts_reference_seed_tourists() {
        let seed = SeedData::build(Utc::now());
        for alert in &seed.alerts {
            let tourist = seed
                .tourists
                .iter()
                .find(|t| t.id == alert.tourist_id)
                .expect("alert references a seed tourist");
            assert_eq!(alert.tourist_name, tourist.full_name());
        }
    }

    #[test]
    fn test_seed_is_deterministic_for_same_instant() {
        let now = Utc::now();
        assert_eq!(SeedData::build(now), SeedData::build(now));
    }
}
