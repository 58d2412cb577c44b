//! Application state management
//!
//! Central state container for the dashboard: the tourist registry, the alert
//! collection, zones, the operator session and the connected WebSocket
//! clients. Collections are shared `Arc` slices replaced as a whole, so a
//! reader's snapshot never changes underneath it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::alerts::{self, TransitionPolicy};
use crate::error::{AppError, AppResult};
use crate::models::{Alert, AlertStatus, Tourist, View, Zone};
use crate::registry::TouristRegistry;
use crate::seed::SeedData;

/// Warning shown after bulk generation fell back to the seed set
pub const FALLBACK_WARNING: &str =
    "Failed to generate data using Gemini API. Falling back to sample data. \
     Please ensure your API key is set up correctly.";

/// Message shown when an E-FIR could not be produced
pub const REPORT_FAILURE_MESSAGE: &str =
    "Failed to generate E-FIR. Please check your Gemini API key and try again.";

/// A generated incident report, kept verbatim
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentReport {
    pub alert_id: String,
    pub tourist_id: String,
    pub content: String,
    pub generated_at: DateTime<Utc>,
}

/// Last report request that failed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportError {
    pub alert_id: String,
    pub message: String,
}

/// Operator session: what the single UI session currently shows
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub view: View,
    /// Bulk generation outstanding
    pub loading: bool,
    /// Alert whose report is being generated
    pub report_in_flight: Option<String>,
    /// Set when bulk generation fell back to seed data
    pub warning: Option<String>,
    pub report_error: Option<ReportError>,
    pub last_report: Option<IncidentReport>,
}

/// Central application state
#[derive(Debug)]
pub struct AppState {
    registry: TouristRegistry,
    alerts: Arc<[Alert]>,
    zones: Arc<[Zone]>,
    /// Kept so every fallback restores the same records
    seed: SeedData,
    policy: TransitionPolicy,
    session: Session,
    /// Bumped on every applied change to tourists or alerts
    revision: u64,
    start_time: DateTime<Utc>,
    connected_clients: Vec<String>,
}

impl AppState {
    /// Create state holding the seed collections
    pub fn new(seed: SeedData, policy: TransitionPolicy) -> AppResult<Self> {
        info!(policy = ?policy, "Initializing application state");

        Ok(Self {
            registry: TouristRegistry::new(seed.tourists.clone())?,
            alerts: seed.alerts.clone().into(),
            zones: seed.zones.clone().into(),
            seed,
            policy,
            session: Session::default(),
            revision: 0,
            start_time: Utc::now(),
            connected_clients: Vec::new(),
        })
    }

    pub fn registry(&self) -> &TouristRegistry {
        &self.registry
    }

    pub fn tourists(&self) -> Arc<[Tourist]> {
        self.registry.snapshot()
    }

    pub fn alerts(&self) -> Arc<[Alert]> {
        Arc::clone(&self.alerts)
    }

    pub fn zones(&self) -> Arc<[Zone]> {
        Arc::clone(&self.zones)
    }

    pub fn find_alert(&self, alert_id: &str) -> Option<&Alert> {
        self.alerts.iter().find(|alert| alert.id == alert_id)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn bump_revision(&mut self) {
        self.revision += 1;
        debug!(revision = self.revision, "State revision bumped");
    }

    pub fn select_view(&mut self, view: View) {
        debug!(from = ?self.session.view, to = ?view, "View selected");
        self.session.view = view;
    }

    /// Change one alert's status under the configured policy
    pub fn set_alert_status(&mut self, alert_id: &str, status: AlertStatus) -> AppResult<Alert> {
        let updated = alerts::set_status(&self.alerts, alert_id, status, self.policy)?;
        self.alerts = updated.into();
        self.bump_revision();

        self.find_alert(alert_id)
            .cloned()
            .ok_or_else(|| AppError::InternalError(format!("Alert {} vanished", alert_id)))
    }

    /// Mark bulk generation in flight; refused while one is outstanding
    pub fn begin_generation(&mut self) -> AppResult<()> {
        if self.session.loading {
            warn!("Bulk generation already in flight");
            return Err(AppError::Conflict(
                "A data generation request is already in progress".to_string(),
            ));
        }

        self.session.loading = true;
        self.session.warning = None;
        Ok(())
    }

    /// Swap in a generated batch and its derived alerts
    pub fn apply_generated(&mut self, tourists: Vec<Tourist>, alerts: Vec<Alert>) -> AppResult<()> {
        self.session.loading = false;
        self.registry.replace_all(tourists)?;
        self.alerts = alerts.into();
        self.bump_revision();
        Ok(())
    }

    /// Reset collections to the seed set and raise the warning
    pub fn restore_seed(&mut self, warning: impl Into<String>) -> AppResult<()> {
        self.session.loading = false;
        self.registry.replace_all(self.seed.tourists.clone())?;
        self.alerts = self.seed.alerts.clone().into();
        self.session.warning = Some(warning.into());
        self.bump_revision();
        info!("Collections restored to seed data");
        Ok(())
    }

    /// Resolve the alert/tourist pair for a report and mark it in flight
    pub fn begin_report(&mut self, alert_id: &str) -> AppResult<(Alert, Tourist)> {
        if let Some(pending) = &self.session.report_in_flight {
            warn!(alert_id = %alert_id, pending = %pending, "Report already in flight");
            return Err(AppError::Conflict(format!(
                "A report for alert {} is already being generated",
                pending
            )));
        }

        let alert = self
            .find_alert(alert_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Alert {} not found", alert_id)))?;
        let tourist = self
            .registry
            .find_by_id(&alert.tourist_id)
            .cloned()
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Tourist {} for alert {} not found",
                    alert.tourist_id, alert_id
                ))
            })?;

        self.session.report_in_flight = Some(alert_id.to_string());
        self.session.report_error = None;
        Ok((alert, tourist))
    }

    pub fn complete_report(&mut self, report: IncidentReport) {
        self.session.report_in_flight = None;
        self.session.report_error = None;
        self.session.last_report = Some(report);
    }

    /// Record a failed report; the previous report stays visible
    pub fn fail_report(&mut self, alert_id: &str, message: impl Into<String>) {
        self.session.report_in_flight = None;
        self.session.report_error = Some(ReportError {
            alert_id: alert_id.to_string(),
            message: message.into(),
        });
    }

    /// Free the generation slot without touching the collections
    pub fn abandon_generation(&mut self) {
        if self.session.loading {
            warn!("Bulk generation abandoned before completion");
        }
        self.session.loading = false;
    }

    /// Free the report slot; the last report and error stay as they were
    pub fn abandon_report(&mut self) {
        if let Some(pending) = self.session.report_in_flight.take() {
            warn!(alert_id = %pending, "Report abandoned before completion");
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        (Utc::now() - self.start_time).num_seconds().max(0) as u64
    }

    /// Register a new WebSocket client
    pub fn add_client(&mut self, client_id: String) {
        info!(client_id = %client_id, "WebSocket client connected");
        self.connected_clients.push(client_id);
    }

    /// Remove a WebSocket client
    pub fn remove_client(&mut self, client_id: &str) {
        info!(client_id = %client_id, "WebSocket client disconnected");
        self.connected_clients.retain(|id| id != client_id);
    }

    /// Get count of connected clients
    pub fn client_count(&self) -> usize {
        self.connected_clients.len()
    }
}
