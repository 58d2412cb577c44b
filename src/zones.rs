//! Zone classification
//!
//! Display mapping for zone types plus point-in-polygon containment used to
//! report which tourists currently stand inside a restricted or high-risk
//! area. Breaches are reported, never turned into alerts here.

use serde::Serialize;
use tracing::debug;

use crate::models::{GeoPoint, LocationPoint, Tourist, Zone, ZoneType};

impl ZoneType {
    /// Map overlay colour
    pub fn color(&self) -> &'static str {
        match self {
            ZoneType::Safe => "green",
            ZoneType::Restricted => "yellow",
            ZoneType::HighRisk => "red",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ZoneType::Safe => "Safe Zone",
            ZoneType::Restricted => "Restricted Zone",
            ZoneType::HighRisk => "High-Risk Zone",
        }
    }

    /// Entering this zone counts as a geo-fence breach
    pub fn is_fenced(&self) -> bool {
        matches!(self, ZoneType::Restricted | ZoneType::HighRisk)
    }
}

impl Zone {
    /// Even-odd ray casting against the polygon ring.
    ///
    /// Polygons with fewer than three vertices contain nothing. Points lying
    /// exactly on an edge may fall on either side.
    pub fn contains(&self, point: GeoPoint) -> bool {
        let vertices = &self.polygon;
        if vertices.len() < 3 {
            return false;
        }

        let mut inside = false;
        let mut j = vertices.len() - 1;
        for i in 0..vertices.len() {
            let (a, b) = (vertices[i], vertices[j]);
            if (a.lat > point.lat) != (b.lat > point.lat) {
                let crossing = (b.lng - a.lng) * (point.lat - a.lat) / (b.lat - a.lat) + a.lng;
                if point.lng < crossing {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }
}

/// First zone (in declaration order) containing the point
pub fn zone_at(zones: &[Zone], point: GeoPoint) -> Option<&Zone> {
    zones.iter().find(|zone| zone.contains(point))
}

/// Zone with its display attributes resolved
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneView {
    #[serde(flatten)]
    pub zone: Zone,
    pub color: &'static str,
    pub label: &'static str,
}

impl From<&Zone> for ZoneView {
    fn from(zone: &Zone) -> Self {
        Self {
            color: zone.zone_type.color(),
            label: zone.zone_type.label(),
            zone: zone.clone(),
        }
    }
}

/// A tourist whose current position is inside a fenced zone
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceBreach {
    pub tourist_id: String,
    pub tourist_name: String,
    pub zone_id: String,
    pub zone_name: String,
    pub zone_type: ZoneType,
    pub position: LocationPoint,
}

/// Tourists currently standing inside restricted or high-risk zones, in
/// registry order. Tourists with no recorded position are skipped.
pub fn geofence_breaches(tourists: &[Tourist], zones: &[Zone]) -> Vec<GeofenceBreach> {
    let fenced: Vec<&Zone> = zones.iter().filter(|z| z.zone_type.is_fenced()).collect();

    tourists
        .iter()
        .filter_map(|tourist| {
            let position = tourist.current_position()?;
            let zone = fenced.iter().find(|zone| zone.contains(position.geo()))?;

            debug!(
                tourist_id = %tourist.id,
                zone_id = %zone.id,
                "Tourist inside fenced zone"
            );

            Some(GeofenceBreach {
                tourist_id: tourist.id.clone(),
                tourist_name: tourist.full_name(),
                zone_id: zone.id.clone(),
                zone_name: zone.name.clone(),
                zone_type: zone.zone_type,
                position: position.clone(),
            })
        })
        .collect()
}
