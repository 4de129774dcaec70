// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloud Tasks queue check for `/tasks/*` routes.

use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};

/// Header Cloud Tasks sets on every dispatched request.
pub const QUEUE_NAME_HEADER: &str = "x-cloudtasks-queuename";

/// Require the sync queue header on manual-trigger routes.
///
/// The header is set by the caller and can be forged by anyone who can reach
/// the service. It only filters stray traffic; the service must be deployed
/// with ingress or IAM restricted to the task queue.
pub async fn require_tasks_queue(request: Request, next: Next) -> Result<Response, StatusCode> {
    let queue_name_header = request.headers().get(QUEUE_NAME_HEADER);
    let is_valid_queue = queue_name_header
        .and_then(|h| h.to_str().ok())
        .map(|name| name == crate::config::SYNC_QUEUE_NAME)
        .unwrap_or(false);

    if !is_valid_queue {
        tracing::warn!(
            header = ?queue_name_header,
            path = %request.uri().path(),
            "Blocked tasks request with invalid queue header"
        );
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(request).await)
}
