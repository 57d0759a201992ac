//! WebSocket feeds of live change notices
//!
//! Each socket owns one [`Subscription`]; closing the socket drops it and
//! unsubscribes. Frames are JSON [`crate::live::Notice`] values.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};

use crate::http::error::ApiError;
use crate::http::extractors::{AdminSession, AuthSession, ValidUuid};
use crate::http::server::AppState;
use crate::live::{Subscription, Topic};

/// GET /cases/{id}/live - every change touching one case
async fn case_feed(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    ValidUuid(case_id): ValidUuid,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    session.authorize_case(&state, case_id).await?;

    let sub = state.live.subscribe(Topic::Activity(case_id));
    Ok(ws.on_upgrade(move |socket| pump(socket, sub)))
}

/// GET /cases/live - case-row changes across all cases (admin)
async fn dashboard_feed(
    State(state): State<Arc<AppState>>,
    _admin: AdminSession,
    ws: WebSocketUpgrade,
) -> Response {
    let sub = state.live.subscribe(Topic::AllCases);
    ws.on_upgrade(move |socket| pump(socket, sub))
}

/// Forward notices until either side goes away.
async fn pump(mut socket: WebSocket, mut sub: Subscription) {
    let topic = sub.topic();
    tracing::debug!(?topic, "live socket opened");

    loop {
        tokio::select! {
            notice = sub.recv() => {
                let Some(notice) = notice else { break };
                let frame = match serde_json::to_string(&notice) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to encode live notice");
                        continue;
                    }
                };
                if socket.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Client frames carry nothing; pings are answered by axum
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    sub.close();
    tracing::debug!(?topic, "live socket closed");
}

/// Live routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/cases/live", get(dashboard_feed))
        .route("/cases/{id}/live", get(case_feed))
}
