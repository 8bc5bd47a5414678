// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error resource middleware.
//!
//! Error responses are rendered before the request URI is known. This layer
//! re-renders them with `resourceUrl` set to `uri=<path>`.

use crate::error::ErrorResponse;
use axum::{extract::Request, middleware::Next, response::IntoResponse, response::Response, Json};

/// Attach the originating request path to error bodies.
pub async fn describe_resource(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let response = next.run(req).await;

    let Some(body) = response.extensions().get::<ErrorResponse>().cloned() else {
        return response;
    };

    let status = response.status();
    let body = ErrorResponse {
        resource_url: Some(format!("uri={}", path)),
        ..body
    };

    let mut rendered = (status, Json(body.clone())).into_response();
    rendered.extensions_mut().insert(body);
    rendered
}
