//! Request handlers.
//!
//! # Flow (both variants)
//! ```text
//! resolve + validate target → [credential] → begin scope → open rendezvous
//!     → inject STREAM_HOST/STREAM_PORT → invoke → StreamRelay::respond
//! ```
//!
//! Every early return drops the `ScopeGuard`, which cancels the scope and
//! closes the rendezvous listener. Path segments and the credential are
//! checked before the scope exists, so a 400 never opens a socket.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use tracing::Instrument;

use crate::http::error::StreamError;
use crate::http::server::AppState;
use crate::http::stream::StreamRelay;
use crate::invoke::{extract_api_key, inject_stream_coordinates, InvocationTarget};
use crate::net::{listener, RequestScope, StreamGuard};
use crate::observability::metrics;

/// `GET /` liveness check.
pub async fn liveness() -> &'static str {
    "Streamer proxy running"
}

/// `/action/{ns}[/{pkg}]/{action}`: authenticated, non-blocking invocation.
pub async fn action_stream_handler(
    State(state): State<AppState>,
    Path(target): Path<InvocationTarget>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let tracked = state.streams.track();
    let span = tracing::info_span!(
        "action_stream",
        stream_id = %tracked.id(),
        namespace = %target.namespace,
        action = %target.action_path(),
    );

    async move {
        tracing::info!("Action stream request");
        match start_action_stream(&state, tracked, &target, &headers, &body).await {
            Ok(relay) => {
                metrics::record_invocation("action", "accepted");
                relay.respond().await
            }
            Err(e) => {
                tracing::warn!(error = %e, "Action stream rejected");
                metrics::record_invocation("action", "failed");
                e.into_response()
            }
        }
    }
    .instrument(span)
    .await
}

async fn start_action_stream(
    state: &AppState,
    tracked: StreamGuard,
    target: &InvocationTarget,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<StreamRelay, StreamError> {
    target.validate()?;
    let key = extract_api_key(headers)?;

    let (scope, guard) = RequestScope::begin(&state.shutdown);
    let endpoint = listener::open(tracked.id(), scope.clone(), &state.listener).await?;
    metrics::record_stream_opened("action");

    let body = inject_stream_coordinates(body, &endpoint.host, &endpoint.port)?;
    let status = state.invoker.invoke_action(target, &key, &body).await?;
    tracing::debug!(status = %status, port = %endpoint.port, "Invocation accepted");

    Ok(StreamRelay::new(tracked, scope, guard, endpoint.chunks))
}

/// `/web/{ns}[/{pkg}]/{action}`: public web action, called in the background.
pub async fn web_action_stream_handler(
    State(state): State<AppState>,
    Path(target): Path<InvocationTarget>,
    body: Bytes,
) -> Response {
    let tracked = state.streams.track();
    let span = tracing::info_span!(
        "web_action_stream",
        stream_id = %tracked.id(),
        namespace = %target.namespace,
        action = %target.action_path(),
    );

    async move {
        tracing::info!("Web action stream request");
        match start_web_action_stream(&state, tracked, &target, &body).await {
            Ok(relay) => {
                metrics::record_invocation("web", "dispatched");
                relay.respond().await
            }
            Err(e) => {
                tracing::warn!(error = %e, "Web action stream rejected");
                metrics::record_invocation("web", "failed");
                e.into_response()
            }
        }
    }
    .instrument(span)
    .await
}

async fn start_web_action_stream(
    state: &AppState,
    tracked: StreamGuard,
    target: &InvocationTarget,
    body: &[u8],
) -> Result<StreamRelay, StreamError> {
    target.validate()?;
    let (scope, guard) = RequestScope::begin(&state.shutdown);
    let endpoint = listener::open(tracked.id(), scope.clone(), &state.listener).await?;
    metrics::record_stream_opened("web");

    let body = inject_stream_coordinates(body, &endpoint.host, &endpoint.port)?;
    let url = target
        .web_action_url(state.invoker.api_host())
        .map_err(crate::invoke::InvokeError::from)?;
    tracing::debug!(url = %url, port = %endpoint.port, "Dispatching web action");

    let failures = state.invoker.spawn_web_action(url, body, scope.clone());
    Ok(StreamRelay::new(tracked, scope, guard, endpoint.chunks).with_failures(failures))
}
