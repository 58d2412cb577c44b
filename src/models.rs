//! Data models for tourists, alerts and zones
//!
//! Defines the core data structures used throughout the application. The
//! serialized shape (camelCase JSON) is the same one the external generator
//! produces, so generated payloads deserialize straight into these types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use crate::aggregation::DashboardSnapshot;

/// Identity document presented at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdDocumentType {
    Aadhaar,
    Passport,
}

/// Know-Your-Customer identity fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Kyc {
    #[serde(rename = "type")]
    pub document_type: IdDocumentType,

    #[validate(length(min = 1, message = "Document number must not be empty"))]
    pub id_number: String,

    #[validate(length(min = 1, message = "First name must not be empty"))]
    pub first_name: String,

    #[validate(length(min = 1, message = "Last name must not be empty"))]
    pub last_name: String,

    pub nationality: String,

    /// Date of birth (ISO 8601 date)
    pub dob: NaiveDate,
}

/// One planned stop of a trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryItem {
    pub location: String,
    pub date: NaiveDate,
    pub activity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
}

/// A timestamped position sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LocationPoint {
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub lat: f64,

    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub lng: f64,

    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
}

impl LocationPoint {
    pub fn geo(&self) -> GeoPoint {
        GeoPoint {
            lat: self.lat,
            lng: self.lng,
        }
    }
}

/// Tourist presence status, supplied externally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TouristStatus {
    Active,
    Inactive,
    Distress,
}

/// A registered tourist and everything known about their visit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Tourist {
    /// Opaque digital ID
    #[validate(length(min = 1, message = "Tourist id must not be empty"))]
    pub id: String,

    pub kyc: Kyc,

    /// Planned stops in the order the producer listed them
    #[serde(default)]
    pub trip_itinerary: Vec<ItineraryItem>,

    #[serde(default)]
    pub emergency_contacts: Vec<EmergencyContact>,

    /// 0 (high risk) to 100 (safe)
    #[validate(range(max = 100, message = "Safety score must be between 0 and 100"))]
    pub safety_score: u8,

    /// Oldest to newest; the last sample is the current position
    #[validate(length(min = 1, message = "Location history must contain at least one point"))]
    #[serde(default)]
    pub location_history: Vec<LocationPoint>,

    pub status: TouristStatus,

    pub entry_date: NaiveDate,

    pub exit_date: NaiveDate,
}

impl Tourist {
    /// "First Last" as shown on the dashboard
    pub fn full_name(&self) -> String {
        format!("{} {}", self.kyc.first_name, self.kyc.last_name)
    }

    /// Latest location sample, if any have been recorded
    pub fn current_position(&self) -> Option<&LocationPoint> {
        self.location_history.last()
    }

    /// Location of the first itinerary stop
    pub fn first_region(&self) -> Option<&str> {
        self.trip_itinerary.first().map(|item| item.location.as_str())
    }
}

/// Anomaly taxonomy reported by the detection side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyType {
    #[serde(rename = "Panic Button")]
    PanicButton,
    #[serde(rename = "Geo-fence Breach")]
    GeoFenceBreach,
    #[serde(rename = "Route Deviation")]
    RouteDeviation,
    #[serde(rename = "Prolonged Inactivity")]
    ProlongedInactivity,
    #[serde(rename = "Location Drop-off")]
    LocationDropoff,
}

impl AnomalyType {
    /// Declaration order, used when cycling types over generated alerts
    pub const ALL: [AnomalyType; 5] = [
        AnomalyType::PanicButton,
        AnomalyType::GeoFenceBreach,
        AnomalyType::RouteDeviation,
        AnomalyType::ProlongedInactivity,
        AnomalyType::LocationDropoff,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AnomalyType::PanicButton => "Panic Button",
            AnomalyType::GeoFenceBreach => "Geo-fence Breach",
            AnomalyType::RouteDeviation => "Route Deviation",
            AnomalyType::ProlongedInactivity => "Prolonged Inactivity",
            AnomalyType::LocationDropoff => "Location Drop-off",
        }
    }

    /// Accent colour for alert cards
    pub fn color(&self) -> &'static str {
        match self {
            AnomalyType::PanicButton => "red",
            AnomalyType::GeoFenceBreach => "yellow",
            AnomalyType::RouteDeviation => "orange",
            AnomalyType::ProlongedInactivity => "blue",
            AnomalyType::LocationDropoff => "gray",
        }
    }
}

impl fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Alert lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    New,
    Acknowledged,
    Resolved,
    Escalated,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::New => "new",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Resolved => "resolved",
            AlertStatus::Escalated => "escalated",
        }
    }

    /// Badge colour for the status pill
    pub fn color(&self) -> &'static str {
        match self {
            AlertStatus::New => "red",
            AlertStatus::Acknowledged => "yellow",
            AlertStatus::Resolved => "green",
            AlertStatus::Escalated => "purple",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected anomaly for one tourist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,

    /// Back-reference to the tourist the alert concerns
    pub tourist_id: String,

    /// Name captured when the alert was raised; not kept in sync
    pub tourist_name: String,

    #[serde(rename = "type")]
    pub anomaly_type: AnomalyType,

    pub timestamp: DateTime<Utc>,

    /// Tourist position at detection time
    pub location: LocationPoint,

    pub status: AlertStatus,

    pub details: String,
}

/// Plain coordinate pair used for zone polygons
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ZoneType {
    Safe,
    Restricted,
    HighRisk,
}

/// Named geographic area with a safety classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub zone_type: ZoneType,
    /// Vertices in order; the ring is implicitly closed
    pub polygon: Vec<GeoPoint>,
}

/// Operator-facing views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum View {
    #[default]
    Dashboard,
    Tourists,
    Alerts,
}

/// WebSocket message types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    /// Collections changed; fresh dashboard figures
    DashboardUpdate(DashboardSnapshot),
    /// Connection acknowledgment
    Connected { client_id: String },
    /// Error message
    Error { message: String },
    /// Heartbeat/ping
    Ping,
    /// Heartbeat/pong response
    Pong,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub tourist_count: usize,
    pub alert_count: usize,
    pub generator_configured: bool,
    pub connected_clients: usize,
}
