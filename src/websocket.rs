//! WebSocket module for live dashboard updates
//!
//! Each session polls the shared state and pushes a fresh dashboard snapshot
//! whenever the state revision moves past the one it last sent.

use actix::{Actor, ActorContext, ActorFutureExt, AsyncContext, StreamHandler};
use actix_web_actors::ws;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::aggregation::{dashboard_snapshot, DashboardSnapshot};
use crate::models::WsMessage;
use crate::state::AppState;

/// How often heartbeat pings are sent
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// How long before lack of client response causes a timeout
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// WebSocket session actor
pub struct WsSession {
    client_id: String,
    last_heartbeat: Instant,
    state: Arc<RwLock<AppState>>,
    push_interval: Duration,
    /// Revision of the last snapshot sent; `None` until the first push
    last_revision: Option<u64>,
}

impl WsSession {
    pub fn new(client_id: String, state: Arc<RwLock<AppState>>, push_interval: Duration) -> Self {
        Self {
            client_id,
            last_heartbeat: Instant::now(),
            state,
            push_interval,
            last_revision: None,
        }
    }

    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                warn!(
                    client_id = %act.client_id,
                    "WebSocket heartbeat timeout"
                );
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    /// Send a snapshot if the state changed since the last push
    fn push_if_changed(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let state = self.state.clone();
        let last_revision = self.last_revision;

        let fut = async move {
            let state = state.read().await;
            let revision = state.revision();
            if last_revision == Some(revision) {
                return None;
            }
            Some(dashboard_snapshot(revision, &state.tourists(), &state.alerts()))
        };

        let fut = actix::fut::wrap_future::<_, Self>(fut);

        ctx.spawn(fut.map(|snapshot: Option<DashboardSnapshot>, act, ctx| {
            let Some(snapshot) = snapshot else {
                return;
            };

            debug!(
                client_id = %act.client_id,
                revision = snapshot.revision,
                "Pushing dashboard update"
            );
            act.last_revision = Some(snapshot.revision);

            let msg = WsMessage::DashboardUpdate(snapshot);
            if let Ok(json) = serde_json::to_string(&msg) {
                ctx.text(json);
            }
        }));
    }

    fn start_dashboard_polling(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(self.push_interval, |act, ctx| act.push_if_changed(ctx));
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(client_id = %self.client_id, "WebSocket connected");

        self.start_heartbeat(ctx);
        self.start_dashboard_polling(ctx);

        let msg = WsMessage::Connected {
            client_id: self.client_id.clone(),
        };

        if let Ok(json) = serde_json::to_string(&msg) {
            ctx.text(json);
        }

        // Initial snapshot without waiting for the first tick
        self.push_if_changed(ctx);
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        info!(client_id = %self.client_id, "WebSocket disconnected");

        let state = self.state.clone();
        let client_id = self.client_id.clone();

        // Runs on the actix runtime; the actor context is already gone
        actix_rt::spawn(async move {
            let mut state = state.write().await;
            state.remove_client(&client_id);
        });
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                debug!(client_id = %self.client_id, message = %text);

                match serde_json::from_str::<WsMessage>(&text) {
                    Ok(WsMessage::Ping) => {
                        self.last_heartbeat = Instant::now();
                        if let Ok(json) = serde_json::to_string(&WsMessage::Pong) {
                            ctx.text(json);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(client_id = %self.client_id, error = %e);
                        let err = WsMessage::Error {
                            message: "Invalid message format".into(),
                        };
                        if let Ok(json) = serde_json::to_string(&err) {
                            ctx.text(json);
                        }
                    }
                }
            }
            Ok(ws::Message::Close(reason)) => {
                info!(client_id = %self.client_id, reason = ?reason);
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                warn!(client_id = %self.client_id, error = %e);
                ctx.stop();
            }
            _ => {}
        }
    }
}
