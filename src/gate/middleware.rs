//! axum adapter for [`RequestGate`].

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{ConnectInfo, FromRequestParts, RawPathParams, Request, State};
use axum::http::{header, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};

use crate::error::GatewayError;
use crate::gate::{GateInput, RequestGate};
use crate::security::resolve_client;

/// Run the gate for one route, then hand the (possibly rewritten) request to
/// the handler.
///
/// The body is only buffered when the gate declares fields or a body symbol.
/// Anything that is not a JSON object is treated as `{}`.
pub async fn gate_middleware(
    State(gate): State<Arc<RequestGate>>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    let connect_info = parts.extensions.get::<ConnectInfo<SocketAddr>>().cloned();
    let client = resolve_client(&parts.headers, connect_info.as_ref(), gate.trusts_forwarded_for());

    if let Err(e) = gate.admit(&client) {
        return e.into_response();
    }

    let mut input = GateInput::default();

    if gate.needs_path() {
        if let Ok(params) = RawPathParams::from_request_parts(&mut parts, &()).await {
            input.path_params = params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
        }
    }

    let body = if gate.needs_body() {
        let bytes = match to_bytes(body, usize::MAX).await {
            Ok(bytes) => bytes,
            Err(_) => return GatewayError::PayloadTooLarge.into_response(),
        };
        input.body = serde_json::from_slice::<Map<String, Value>>(&bytes).unwrap_or_default();

        if let Err(e) = gate.validate(&client, &mut input) {
            return e.into_response();
        }

        let rewritten = match serde_json::to_vec(&input.body) {
            Ok(v) => v,
            Err(_) => return GatewayError::Internal.into_response(),
        };
        parts.headers.remove(header::CONTENT_LENGTH);
        parts
            .headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Body::from(rewritten)
    } else {
        if let Err(e) = gate.validate(&client, &mut input) {
            return e.into_response();
        }
        body
    };

    tracing::debug!(endpoint = gate.endpoint(), client = %client, "Request admitted");
    parts.extensions.insert(client);
    next.run(Request::from_parts(parts, body)).await
}
