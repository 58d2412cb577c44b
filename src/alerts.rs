//! Alert lifecycle engine
//!
//! Owns the status state machine for alerts. Every mutation returns a fresh
//! collection; the input slice is never modified, so readers holding an older
//! snapshot keep seeing a consistent set.
//!
//! Graph of operator transitions:
//!
//! ```text
//! new ──► acknowledged ──► resolved
//!  │           │              ▲
//!  │           ▼              │
//!  ├──────► escalated ────────┘
//!  └──────────────────────────┘
//! ```
//!
//! Under [`TransitionPolicy::Permissive`] any status may be selected from any
//! other, matching how operators use the status dropdown today.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{Alert, AlertStatus, AnomalyType, Tourist};

/// Number of tourists that receive an alert after a bulk generation
pub const DERIVED_ALERT_COUNT: usize = 5;

/// How strictly operator status changes are checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionPolicy {
    /// Any status can be set from any status
    #[default]
    Permissive,
    /// Only the edges of the lifecycle graph are allowed
    Strict,
}

impl FromStr for TransitionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(TransitionPolicy::Permissive),
            "strict" => Ok(TransitionPolicy::Strict),
            other => Err(other.to_string()),
        }
    }
}

impl TransitionPolicy {
    /// Whether `from -> to` is allowed. Re-selecting the current status is
    /// always allowed.
    pub fn allows(&self, from: AlertStatus, to: AlertStatus) -> bool {
        if from == to {
            return true;
        }

        match self {
            TransitionPolicy::Permissive => true,
            TransitionPolicy::Strict => matches!(
                (from, to),
                (AlertStatus::New, AlertStatus::Acknowledged)
                    | (AlertStatus::New, AlertStatus::Escalated)
                    | (AlertStatus::New, AlertStatus::Resolved)
                    | (AlertStatus::Acknowledged, AlertStatus::Resolved)
                    | (AlertStatus::Acknowledged, AlertStatus::Escalated)
                    | (AlertStatus::Escalated, AlertStatus::Resolved)
            ),
        }
    }
}

/// An alert still needs operator attention
pub fn is_actionable(alert: &Alert) -> bool {
    matches!(alert.status, AlertStatus::New | AlertStatus::Escalated)
}

/// Replace the status of one alert, returning the updated collection.
///
/// Only the `status` field of the matching alert changes. Tourist records are
/// never touched from here.
pub fn set_status(
    alerts: &[Alert],
    alert_id: &str,
    status: AlertStatus,
    policy: TransitionPolicy,
) -> AppResult<Vec<Alert>> {
    let current = alerts
        .iter()
        .find(|alert| alert.id == alert_id)
        .ok_or_else(|| AppError::NotFound(format!("Alert {} not found", alert_id)))?;

    if !policy.allows(current.status, status) {
        warn!(
            alert_id = %alert_id,
            from = %current.status,
            to = %status,
            "Alert transition refused"
        );
        return Err(AppError::InvalidTransition(format!(
            "Alert {} cannot move from {} to {}",
            alert_id, current.status, status
        )));
    }

    info!(
        alert_id = %alert_id,
        from = %current.status,
        to = %status,
        "Alert status updated"
    );

    Ok(alerts
        .iter()
        .map(|alert| {
            if alert.id == alert_id {
                Alert {
                    status,
                    ..alert.clone()
                }
            } else {
                alert.clone()
            }
        })
        .collect())
}

/// Raise one `new` alert for each of the first few tourists of a freshly
/// generated batch, cycling through the anomaly types.
pub fn derive_alerts(tourists: &[Tourist], now: DateTime<Utc>) -> Vec<Alert> {
    let stamp = now.timestamp_millis();

    tourists
        .iter()
        .take(DERIVED_ALERT_COUNT)
        .enumerate()
        .filter_map(|(index, tourist)| {
            let Some(location) = tourist.current_position() else {
                debug!(tourist_id = %tourist.id, "No position recorded, skipping alert");
                return None;
            };

            Some(Alert {
                id: format!("alert-{}-{}", stamp, index),
                tourist_id: tourist.id.clone(),
                tourist_name: tourist.full_name(),
                anomaly_type: AnomalyType::ALL[index % AnomalyType::ALL.len()],
                timestamp: now,
                location: location.clone(),
                status: AlertStatus::New,
                details: format!("Anomaly detected for tourist {}.", tourist.kyc.first_name),
            })
        })
        .collect()
}
