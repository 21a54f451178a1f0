//! Clock-offset endpoint.
//!
//! Clients `POST /timesync` with `{"id": n}` and get back `{"id": n,
//! "result": <server epoch ms>}`. The body is read before the clock is
//! sampled so the reply reflects the moment the request was handled.

use axum::Json;
use frames::{TimesyncRequest, TimesyncResponse};

/// `POST /timesync`.
pub async fn timesync(Json(req): Json<TimesyncRequest>) -> Json<TimesyncResponse> {
    Json(stamp(req, frames::now_ms()))
}

fn stamp(req: TimesyncRequest, now_ms: i64) -> TimesyncResponse {
    TimesyncResponse { id: req.id, result: now_ms }
}
