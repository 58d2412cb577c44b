//! Operator actions
//!
//! The five things an operator can do, expressed against the shared state.
//! Generator calls never run under the state lock: the action marks itself
//! in flight, releases the lock, awaits the generator and then re-locks to
//! apply the outcome. If the action is dropped while the generator is
//! pending, its in-flight flag is cleared on the way out.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::alerts::derive_alerts;
use crate::error::AppResult;
use crate::generator::ExternalGenerator;
use crate::models::{Alert, AlertStatus, Tourist, View};
use crate::state::{AppState, IncidentReport, Session, FALLBACK_WARNING, REPORT_FAILURE_MESSAGE};
use crate::validation::validate_search_query;

/// Result of a bulk generation request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    /// Generator failed and the seed set was restored
    pub fell_back: bool,
    pub warning: Option<String>,
    pub tourist_count: usize,
    pub alert_count: usize,
    pub revision: u64,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Generation,
    Report,
}

impl Slot {
    fn release(self, state: &mut AppState) {
        match self {
            Slot::Generation => state.abandon_generation(),
            Slot::Report => state.abandon_report(),
        }
    }
}

/// Holds an in-flight slot; releases it on drop unless disarmed
struct InFlight {
    state: Arc<RwLock<AppState>>,
    slot: Slot,
    armed: bool,
}

impl InFlight {
    fn new(state: &Arc<RwLock<AppState>>, slot: Slot) -> Self {
        Self {
            state: Arc::clone(state),
            slot,
            armed: true,
        }
    }

    /// The outcome has been applied and the slot is already free
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let slot = self.slot;
        if let Ok(mut state) = self.state.try_write() {
            slot.release(&mut state);
            return;
        }

        // Lock is busy: release from a task instead of blocking in drop
        match Handle::try_current() {
            Ok(handle) => {
                let state = Arc::clone(&self.state);
                handle.spawn(async move {
                    slot.release(&mut *state.write().await);
                });
            }
            Err(_) => error!(slot = ?slot, "No runtime available to release in-flight slot"),
        }
    }
}

/// Replace tourists with a generated batch, or restore the seed set if the
/// generator fails. Only a concurrent request is reported as an error.
pub async fn request_generation(
    state: &Arc<RwLock<AppState>>,
    generator: &dyn ExternalGenerator,
    count: u32,
) -> AppResult<GenerationOutcome> {
    state.write().await.begin_generation()?;
    let mut in_flight = InFlight::new(state, Slot::Generation);

    info!(count, configured = generator.is_configured(), "Bulk generation requested");
    let result = generator.generate_tourists(count).await;

    let mut state = state.write().await;
    in_flight.disarm();
    let fell_back = match result {
        Ok(tourists) => {
            let alerts = derive_alerts(&tourists, Utc::now());
            match state.apply_generated(tourists, alerts) {
                Ok(()) => false,
                Err(e) => {
                    warn!(error = %e, "Generated batch rejected, falling back to seed data");
                    state.restore_seed(FALLBACK_WARNING)?;
                    true
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "Bulk generation failed, falling back to seed data");
            state.restore_seed(FALLBACK_WARNING)?;
            true
        }
    };

    let outcome = GenerationOutcome {
        fell_back,
        warning: state.session().warning.clone(),
        tourist_count: state.registry().len(),
        alert_count: state.alerts().len(),
        revision: state.revision(),
    };

    info!(
        fell_back,
        tourists = outcome.tourist_count,
        alerts = outcome.alert_count,
        "Bulk generation finished"
    );
    Ok(outcome)
}

/// Ask the generator for an E-FIR covering one alert. On failure the error
/// is recorded on the session and the previous report stays in place.
pub async fn request_report(
    state: &Arc<RwLock<AppState>>,
    generator: &dyn ExternalGenerator,
    alert_id: &str,
) -> AppResult<IncidentReport> {
    let (alert, tourist) = state.write().await.begin_report(alert_id)?;
    let mut in_flight = InFlight::new(state, Slot::Report);

    info!(alert_id = %alert.id, tourist_id = %tourist.id, "E-FIR requested");
    let result = generator.generate_report(&alert, &tourist).await;

    let mut state = state.write().await;
    in_flight.disarm();
    match result {
        Ok(content) => {
            let report = IncidentReport {
                alert_id: alert.id,
                tourist_id: tourist.id,
                content,
                generated_at: Utc::now(),
            };
            state.complete_report(report.clone());
            Ok(report)
        }
        Err(e) => {
            error!(alert_id = %alert_id, error = %e, "E-FIR generation failed");
            state.fail_report(alert_id, REPORT_FAILURE_MESSAGE);
            Err(e.into())
        }
    }
}

pub async fn set_alert_status(
    state: &RwLock<AppState>,
    alert_id: &str,
    status: AlertStatus,
) -> AppResult<Alert> {
    state.write().await.set_alert_status(alert_id, status)
}

pub async fn select_view(state: &RwLock<AppState>, view: View) -> Session {
    let mut state = state.write().await;
    state.select_view(view);
    state.session().clone()
}

/// Tourists whose name or id contains the query, in registry order
pub async fn search_tourists(
    state: &RwLock<AppState>,
    query: Option<&str>,
) -> AppResult<Vec<Tourist>> {
    let query = validate_search_query(query)?;
    let state = state.read().await;

    Ok(state
        .registry()
        .filter_by_name_or_id(query)
        .into_iter()
        .cloned()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{TransitionPolicy, DERIVED_ALERT_COUNT};
    use crate::error::AppError;
    use crate::generator::GenerationError;
    use crate::models::AnomalyType;
    use crate::seed::SeedData;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;
    use tokio::time::timeout;

    enum Fake {
        Tourists(Vec<Tourist>),
        Report(String),
        Fails,
        Unconfigured,
    }

    #[async_trait]
    impl ExternalGenerator for Fake {
        async fn generate_tourists(&self, _count: u32) -> Result<Vec<Tourist>, GenerationError> {
            match self {
                Fake::Tourists(tourists) => Ok(tourists.clone()),
                Fake::Unconfigured => Err(GenerationError::NotConfigured),
                _ => Err(GenerationError::Transport("connection refused".to_string())),
            }
        }

        async fn generate_report(
            &self,
            _alert: &Alert,
            _tourist: &Tourist,
        ) -> Result<String, GenerationError> {
            match self {
                Fake::Report(text) => Ok(text.clone()),
                Fake::Unconfigured => Err(GenerationError::NotConfigured),
                _ => Err(GenerationError::Api {
                    status: 500,
                    message: "internal".to_string(),
                }),
            }
        }

        fn is_configured(&self) -> bool {
            !matches!(self, Fake::Unconfigured)
        }
    }

    /// Holds every call until released
    struct Gated(Arc<Notify>);

    #[async_trait]
    impl ExternalGenerator for Gated {
        async fn generate_tourists(&self, _count: u32) -> Result<Vec<Tourist>, GenerationError> {
            self.0.notified().await;
            Err(GenerationError::Transport("released".to_string()))
        }

        async fn generate_report(
            &self,
            _alert: &Alert,
            _tourist: &Tourist,
        ) -> Result<String, GenerationError> {
            self.0.notified().await;
            Ok("late report".to_string())
        }
    }

    fn seeded() -> (SeedData, Arc<RwLock<AppState>>) {
        let seed = SeedData::build(Utc::now());
        let state = AppState::new(seed.clone(), TransitionPolicy::Permissive).unwrap();
        (seed, Arc::new(RwLock::new(state)))
    }

    fn generated(count: usize) -> Vec<Tourist> {
        let template = SeedData::build(Utc::now()).tourists.remove(0);
        (0..count)
            .map(|i| Tourist {
                id: format!("gen-{}", i),
                ..template.clone()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_failed_generation_restores_seed_exactly() {
        let (seed, state) = seeded();
        set_alert_status(&state, "alert-01", AlertStatus::Resolved)
            .await
            .unwrap();

        let outcome = request_generation(&state, &Fake::Fails, 20).await.unwrap();

        assert!(outcome.fell_back);
        let state = state.read().await;
        assert_eq!(&*state.tourists(), seed.tourists.as_slice());
        assert_eq!(&*state.alerts(), seed.alerts.as_slice());
        assert_eq!(state.session().warning.as_deref(), Some(FALLBACK_WARNING));
        assert!(!state.session().loading);
    }

    #[tokio::test]
    async fn test_unconfigured_generator_falls_back() {
        let (seed, state) = seeded();

        let outcome = request_generation(&state, &Fake::Unconfigured, 20)
            .await
            .unwrap();

        assert!(outcome.fell_back);
        assert_eq!(outcome.tourist_count, seed.tourists.len());
        assert!(outcome.warning.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_batch_falls_back() {
        let (seed, state) = seeded();
        let mut batch = generated(2);
        batch[1].id = batch[0].id.clone();

        let outcome = request_generation(&state, &Fake::Tourists(batch), 2)
            .await
            .unwrap();

        assert!(outcome.fell_back);
        assert_eq!(&*state.read().await.tourists(), seed.tourists.as_slice());
    }

    #[tokio::test]
    async fn test_successful_generation_derives_alerts() {
        let (_, state) = seeded();

        let outcome = request_generation(&state, &Fake::Tourists(generated(8)), 8)
            .await
            .unwrap();

        assert!(!outcome.fell_back);
        assert!(outcome.warning.is_none());
        assert_eq!(outcome.tourist_count, 8);
        assert_eq!(outcome.alert_count, DERIVED_ALERT_COUNT);

        let state = state.read().await;
        let alerts = state.alerts();
        assert_eq!(alerts[0].tourist_id, "gen-0");
        assert_eq!(alerts[1].anomaly_type, AnomalyType::GeoFenceBreach);
        assert!(alerts.iter().all(|a| a.status == AlertStatus::New));
    }

    #[tokio::test]
    async fn test_concurrent_generation_refused() {
        let (_, state) = seeded();
        let gate = Arc::new(Notify::new());

        let first = {
            let state = Arc::clone(&state);
            let generator = Gated(Arc::clone(&gate));
            tokio::spawn(async move { request_generation(&state, &generator, 5).await })
        };

        while !state.read().await.session().loading {
            tokio::task::yield_now().await;
        }

        let second = request_generation(&state, &Fake::Tourists(generated(1)), 1).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));

        gate.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert!(outcome.fell_back);
    }

    /// Never answers
    struct Stalled;

    #[async_trait]
    impl ExternalGenerator for Stalled {
        async fn generate_tourists(&self, _count: u32) -> Result<Vec<Tourist>, GenerationError> {
            std::future::pending().await
        }

        async fn generate_report(
            &self,
            _alert: &Alert,
            _tourist: &Tourist,
        ) -> Result<String, GenerationError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_dropped_generation_frees_slot() {
        let (seed, state) = seeded();

        let dropped = timeout(
            Duration::from_millis(20),
            request_generation(&state, &Stalled, 5),
        )
        .await;
        assert!(dropped.is_err());

        {
            let state = state.read().await;
            assert!(!state.session().loading);
            assert_eq!(&*state.tourists(), seed.tourists.as_slice());
        }

        let outcome = request_generation(&state, &Fake::Fails, 5).await.unwrap();
        assert!(outcome.fell_back);
    }

    #[tokio::test]
    async fn test_dropped_report_frees_slot() {
        let (_, state) = seeded();

        let dropped = timeout(
            Duration::from_millis(20),
            request_report(&state, &Stalled, "alert-01"),
        )
        .await;
        assert!(dropped.is_err());

        {
            let state = state.read().await;
            assert!(state.session().report_in_flight.is_none());
            assert!(state.session().report_error.is_none());
        }

        let report = request_report(&state, &Fake::Report("E-FIR text".to_string()), "alert-01")
            .await
            .unwrap();
        assert_eq!(report.alert_id, "alert-01");
    }

    #[tokio::test]
    async fn test_dropped_action_waits_for_busy_lock() {
        let (_, state) = seeded();
        state.write().await.begin_generation().unwrap();

        let held = state.read().await;
        drop(InFlight::new(&state, Slot::Generation));
        assert!(held.session().loading);
        drop(held);

        while state.read().await.session().loading {
            tokio::task::yield_now().await;
        }
        assert!(state.write().await.begin_generation().is_ok());
    }

    #[tokio::test]
    async fn test_status_edit_not_blocked_by_report() {
        let (_, state) = seeded();
        let gate = Arc::new(Notify::new());

        let pending = {
            let state = Arc::clone(&state);
            let generator = Gated(Arc::clone(&gate));
            tokio::spawn(async move { request_report(&state, &generator, "alert-01").await })
        };

        while state.read().await.session().report_in_flight.is_none() {
            tokio::task::yield_now().await;
        }

        let alert = set_alert_status(&state, "alert-02", AlertStatus::Resolved)
            .await
            .unwrap();
        assert_eq!(alert.status, AlertStatus::Resolved);

        let second = request_report(&state, &Fake::Report("x".to_string()), "alert-02").await;
        assert!(matches!(second, Err(AppError::Conflict(_))));

        gate.notify_one();
        let report = pending.await.unwrap().unwrap();
        assert_eq!(report.content, "late report");
    }

    #[tokio::test]
    async fn test_report_success_and_failure() {
        let (_, state) = seeded();

        let report = request_report(&state, &Fake::Report("E-FIR text".to_string()), "alert-01")
            .await
            .unwrap();
        assert_eq!(report.content, "E-FIR text");
        assert_eq!(report.tourist_id, "bcd02-b8c3-d4e5-f6g7-h8i9j0k1l2m3");

        let alerts_before = state.read().await.alerts();
        let failed = request_report(&state, &Fake::Fails, "alert-02").await;
        assert!(matches!(failed, Err(AppError::GenerationError(_))));

        let state = state.read().await;
        let session = state.session();
        assert_eq!(session.last_report.as_ref(), Some(&report));
        assert_eq!(
            session.report_error.as_ref().map(|e| e.message.as_str()),
            Some(REPORT_FAILURE_MESSAGE)
        );
        assert!(session.report_in_flight.is_none());
        assert_eq!(&*state.alerts(), &*alerts_before);
    }

    #[tokio::test]
    async fn test_report_unconfigured_and_unknown() {
        let (_, state) = seeded();

        let result = request_report(&state, &Fake::Unconfigured, "alert-01").await;
        assert!(matches!(result, Err(AppError::ConfigurationError(_))));

        let result = request_report(&state, &Fake::Report("x".to_string()), "alert-404").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_search_and_view() {
        let (_, state) = seeded();

        let matches = search_tourists(&state, Some("müller")).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(search_tourists(&state, None).await.unwrap().len(), 3);

        let session = select_view(&state, View::Alerts).await;
        assert_eq!(session.view, View::Alerts);
    }
}
