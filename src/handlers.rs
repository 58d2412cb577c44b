//! HTTP request handlers
//!
//! Implements REST API endpoints for the dashboard.

use actix_web::{web, HttpRequest, HttpResponse, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::actions;
use crate::aggregation::{dashboard_stats, live_feed, map_markers, MapMarkers, SafetyBand};
use crate::alerts::is_actionable;
use crate::config::{GeneratorSettings, WsSettings};
use crate::error::AppError;
use crate::generator::ExternalGenerator;
use crate::models::{Alert, AlertStatus, HealthCheck, Tourist, View};
use crate::state::AppState;
use crate::validation::validate_generation_count;
use crate::websocket::WsSession;
use crate::zones::{geofence_breaches, zone_at, ZoneView};

/// Configure all application routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .app_data(web::JsonConfig::default().error_handler(|err, _| {
                AppError::BadRequest(format!("Invalid JSON body: {}", err)).into()
            }))
            .app_data(web::QueryConfig::default().error_handler(|err, _| {
                AppError::BadRequest(format!("Invalid query string: {}", err)).into()
            }))
            // Health check
            .route("/health", web::get().to(health_check))
            // Operator session
            .route("/session", web::get().to(get_session))
            .route("/session/view", web::put().to(select_view))
            // Dashboard
            .route("/dashboard", web::get().to(get_dashboard))
            .route("/dashboard/map", web::get().to(get_map))
            .route("/dashboard/feed", web::get().to(get_live_feed))
            // Tourists
            .route("/tourists", web::get().to(search_tourists))
            .route("/tourists/{id}", web::get().to(get_tourist))
            // Alerts
            .route("/alerts", web::get().to(list_alerts))
            .route("/alerts/{id}/status", web::put().to(set_alert_status))
            .route("/alerts/{id}/report", web::post().to(request_report))
            // Generation
            .route("/generate", web::post().to(request_generation))
            // Zones
            .route("/zones", web::get().to(list_zones))
            .route("/zones/breaches", web::get().to(list_breaches)),
    )
    // WebSocket endpoint
    .route("/ws", web::get().to(websocket_handler));
}

/// Health check endpoint
///
/// GET /api/health
pub async fn health_check(
    state: web::Data<Arc<RwLock<AppState>>>,
    generator: web::Data<dyn ExternalGenerator>,
) -> Result<HttpResponse, AppError> {
    let state = state.read().await;

    let health = HealthCheck {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        uptime_seconds: state.uptime_seconds(),
        tourist_count: state.registry().len(),
        alert_count: state.alerts().len(),
        generator_configured: generator.is_configured(),
        connected_clients: state.client_count(),
    };

    Ok(HttpResponse::Ok().json(health))
}

/// GET /api/session
pub async fn get_session(
    state: web::Data<Arc<RwLock<AppState>>>,
) -> Result<HttpResponse, AppError> {
    let state = state.read().await;
    Ok(HttpResponse::Ok().json(state.session()))
}

#[derive(Debug, Deserialize)]
pub struct ViewRequest {
    pub view: View,
}

/// PUT /api/session/view
pub async fn select_view(
    state: web::Data<Arc<RwLock<AppState>>>,
    body: web::Json<ViewRequest>,
) -> Result<HttpResponse, AppError> {
    let session = actions::select_view(&state, body.view).await;
    Ok(HttpResponse::Ok().json(session))
}

/// Dashboard headline figures
///
/// GET /api/dashboard
pub async fn get_dashboard(
    state: web::Data<Arc<RwLock<AppState>>>,
) -> Result<HttpResponse, AppError> {
    let (tourists, alerts) = {
        let state = state.read().await;
        (state.tourists(), state.alerts())
    };

    Ok(HttpResponse::Ok().json(dashboard_stats(&tourists, &alerts)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MapResponse {
    #[serde(flatten)]
    markers: MapMarkers,
    zones: Vec<ZoneView>,
}

/// Tourist markers and zone overlays
///
/// GET /api/dashboard/map
pub async fn get_map(
    state: web::Data<Arc<RwLock<AppState>>>,
) -> Result<HttpResponse, AppError> {
    let state = state.read().await;
    let zones = state.zones();

    Ok(HttpResponse::Ok().json(MapResponse {
        markers: map_markers(&state.tourists(), &state.alerts()),
        zones: zones.iter().map(ZoneView::from).collect(),
    }))
}

/// GET /api/dashboard/feed
pub async fn get_live_feed(
    state: web::Data<Arc<RwLock<AppState>>>,
) -> Result<HttpResponse, AppError> {
    let alerts = state.read().await.alerts();
    Ok(HttpResponse::Ok().json(live_feed(&alerts)))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// GET /api/tourists?q=priya
pub async fn search_tourists(
    state: web::Data<Arc<RwLock<AppState>>>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, AppError> {
    let tourists = actions::search_tourists(&state, query.q.as_deref()).await?;
    Ok(HttpResponse::Ok().json(tourists))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TouristDetail {
    #[serde(flatten)]
    tourist: Tourist,
    safety_band: SafetyBand,
    safety_color: &'static str,
    current_zone: Option<ZoneView>,
    alerts: Vec<Alert>,
}

/// Full record for one tourist with its alerts and current zone
///
/// GET /api/tourists/{id}
pub async fn get_tourist(
    state: web::Data<Arc<RwLock<AppState>>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let tourist_id = path.into_inner();
    let state = state.read().await;

    let tourist = state
        .registry()
        .find_by_id(&tourist_id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("Tourist {} not found", tourist_id)))?;

    let zones = state.zones();
    let current_zone = tourist
        .current_position()
        .and_then(|position| zone_at(&zones, position.geo()))
        .map(ZoneView::from);
    let alerts = state
        .alerts()
        .iter()
        .filter(|alert| alert.tourist_id == tourist.id)
        .cloned()
        .collect();
    let band = SafetyBand::for_score(tourist.safety_score);

    Ok(HttpResponse::Ok().json(TouristDetail {
        tourist,
        safety_band: band,
        safety_color: band.color(),
        current_zone,
        alerts,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AlertView {
    #[serde(flatten)]
    alert: Alert,
    actionable: bool,
    type_color: &'static str,
    status_color: &'static str,
}

impl From<&Alert> for AlertView {
    fn from(alert: &Alert) -> Self {
        Self {
            actionable: is_actionable(alert),
            type_color: alert.anomaly_type.color(),
            status_color: alert.status.color(),
            alert: alert.clone(),
        }
    }
}

/// GET /api/alerts
pub async fn list_alerts(
    state: web::Data<Arc<RwLock<AppState>>>,
) -> Result<HttpResponse, AppError> {
    let alerts = state.read().await.alerts();
    let views: Vec<AlertView> = alerts.iter().map(AlertView::from).collect();
    Ok(HttpResponse::Ok().json(views))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: AlertStatus,
}

/// PUT /api/alerts/{id}/status
pub async fn set_alert_status(
    state: web::Data<Arc<RwLock<AppState>>>,
    path: web::Path<String>,
    body: web::Json<StatusRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let correlation_id = extract_correlation_id(&req);
    let alert_id = path.into_inner();

    info!(
        correlation_id = %correlation_id,
        alert_id = %alert_id,
        status = %body.status,
        "Alert status change requested"
    );

    let alert = actions::set_alert_status(&state, &alert_id, body.status).await?;
    Ok(HttpResponse::Ok().json(AlertView::from(&alert)))
}

/// Generate an E-FIR for an alert
///
/// POST /api/alerts/{id}/report
pub async fn request_report(
    state: web::Data<Arc<RwLock<AppState>>>,
    generator: web::Data<dyn ExternalGenerator>,
    path: web::Path<String>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let correlation_id = extract_correlation_id(&req);
    let alert_id = path.into_inner();

    info!(correlation_id = %correlation_id, alert_id = %alert_id, "E-FIR request received");

    let report = actions::request_report(state.get_ref(), generator.get_ref(), &alert_id).await?;
    Ok(HttpResponse::Ok().json(report))
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    pub count: Option<u32>,
}

impl GenerateRequest {
    /// An empty or blank body means the configured count
    fn from_body(body: &[u8]) -> Result<Self, AppError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))
    }
}

/// Replace tourists with a generated batch
///
/// POST /api/generate
///
/// Generator failures are not errors here: the seed set is restored and the
/// response carries `fellBack: true` with the warning.
pub async fn request_generation(
    state: web::Data<Arc<RwLock<AppState>>>,
    generator: web::Data<dyn ExternalGenerator>,
    settings: web::Data<GeneratorSettings>,
    body: web::Bytes,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let correlation_id = extract_correlation_id(&req);
    let requested = GenerateRequest::from_body(&body)?.count;
    let count = validate_generation_count(requested, settings.tourist_count)?;

    info!(correlation_id = %correlation_id, count, "Bulk generation request received");

    let outcome = actions::request_generation(state.get_ref(), generator.get_ref(), count).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// GET /api/zones
pub async fn list_zones(
    state: web::Data<Arc<RwLock<AppState>>>,
) -> Result<HttpResponse, AppError> {
    let zones = state.read().await.zones();
    let views: Vec<ZoneView> = zones.iter().map(ZoneView::from).collect();
    Ok(HttpResponse::Ok().json(views))
}

/// Tourists currently inside restricted or high-risk zones
///
/// GET /api/zones/breaches
pub async fn list_breaches(
    state: web::Data<Arc<RwLock<AppState>>>,
) -> Result<HttpResponse, AppError> {
    let (tourists, zones) = {
        let state = state.read().await;
        (state.tourists(), state.zones())
    };

    Ok(HttpResponse::Ok().json(geofence_breaches(&tourists, &zones)))
}

/// WebSocket upgrade handler
///
/// GET /ws
pub async fn websocket_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<Arc<RwLock<AppState>>>,
    settings: web::Data<WsSettings>,
) -> Result<HttpResponse, actix_web::Error> {
    let client_id = Uuid::new_v4().to_string();

    info!(client_id = %client_id, "WebSocket connection request");

    // Register client
    {
        let mut state = state.write().await;
        state.add_client(client_id.clone());
    }

    let ws_session = WsSession::new(
        client_id,
        state.get_ref().clone(),
        Duration::from_millis(settings.push_interval_ms),
    );

    actix_web_actors::ws::start(ws_session, &req, stream)
}

/// Extract or generate correlation ID from request headers
fn extract_correlation_id(req: &HttpRequest) -> String {
    req.headers()
        .get("X-Correlation-ID")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
