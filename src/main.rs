//! Aegis tourist safety backend
//!
//! Serves the operator dashboard: tourist registry and search, safety
//! statistics, the alert lifecycle, zone overlays and generated E-FIR
//! reports, with live dashboard pushes over WebSocket.

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod actions;
mod aggregation;
mod alerts;
mod config;
mod error;
mod gemini;
mod generator;
mod handlers;
mod models;
mod registry;
mod seed;
mod state;
mod validation;
mod websocket;
mod zones;

use crate::config::Settings;
use crate::gemini::GeminiGenerator;
use crate::generator::ExternalGenerator;
use crate::seed::SeedData;
use crate::state::AppState;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenv::dotenv().ok();

    // Logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,aegis=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();

    // Load configuration
    let settings = Settings::from_env().context("Failed to load configuration")?;
    let bind_address = format!("{}:{}", settings.server.host, settings.server.port);

    info!("Starting Aegis backend");
    info!(
        model = %settings.generator.model,
        policy = ?settings.alerts.transition_policy,
        "Binding server to {}",
        bind_address
    );

    // Shared application state, starting from the seed set
    let seed = SeedData::build(Utc::now());
    let app_state = Arc::new(RwLock::new(
        AppState::new(seed, settings.alerts.transition_policy)
            .context("Failed to initialise application state")?,
    ));

    let generator: Arc<dyn ExternalGenerator> =
        Arc::new(GeminiGenerator::new(&settings.generator));

    let generator_settings = settings.generator.clone();
    let ws_settings = settings.ws.clone();

    // ---------------------------------------------------------------------
    // HTTP + WebSocket server
    // ---------------------------------------------------------------------
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::Data::from(generator.clone()))
            .app_data(web::Data::new(generator_settings.clone()))
            .app_data(web::Data::new(ws_settings.clone()))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(handlers::configure_routes)
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run()
    .await?;

    Ok(())
}
