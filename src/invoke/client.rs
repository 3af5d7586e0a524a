//! Invocation Service client.
//!
//! # Responsibilities
//! - Invoke an action non-blocking with the caller's API key
//! - Fire a web-action call in the background and report only failures
//!
//! # Design Decisions
//! - The HTTP reply never carries the action's output; that arrives over the
//!   rendezvous connection. A reply only says "accepted" or "rejected"
//! - Any 2xx counts as accepted, including 202 and 204
//! - Nothing is retried

use reqwest::StatusCode;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use url::Url;

use crate::config::InvokerConfig;
use crate::invoke::auth::ApiKey;
use crate::invoke::target::{InvocationTarget, TargetError};
use crate::net::scope::RequestScope;

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("invalid invocation URL: {0}")]
    Url(#[from] TargetError),

    #[error("invocation request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("not ok ({status})")]
    Rejected { status: StatusCode },
}

/// Whether the Invocation Service accepted the invocation.
pub fn is_accepted_status(status: StatusCode) -> bool {
    (200..300).contains(&status.as_u16())
}

/// HTTP client for the Invocation Service.
#[derive(Debug, Clone)]
pub struct InvocationClient {
    http: reqwest::Client,
    api_host: String,
    timeout: Duration,
}

impl InvocationClient {
    pub fn new(config: &InvokerConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            api_host: config.api_host.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    pub fn api_host(&self) -> &str {
        &self.api_host
    }

    /// Invoke `target` without waiting for its result.
    ///
    /// Returns the accepting status; anything outside 2xx is an error.
    pub async fn invoke_action(
        &self,
        target: &InvocationTarget,
        key: &ApiKey,
        body: &Map<String, Value>,
    ) -> Result<StatusCode, InvokeError> {
        let url = target.action_url(&self.api_host)?;
        let response = self
            .http
            .post(url)
            .basic_auth(&key.user, Some(&key.secret))
            .timeout(self.timeout)
            .json(body)
            .send()
            .await?;

        check_status(response.status())
    }

    /// Start a web-action call in the background.
    ///
    /// The returned receiver yields an error if the call fails. It closes
    /// without a value when the call was accepted, or when `scope` ended
    /// first and the call was abandoned.
    pub fn spawn_web_action(
        &self,
        url: Url,
        body: Map<String, Value>,
        scope: RequestScope,
    ) -> oneshot::Receiver<InvokeError> {
        let (tx, rx) = oneshot::channel();
        let http = self.http.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = scope.cancelled() => return,
                result = post_web_action(&http, url, &body) => result,
            };
            if let Err(e) = result {
                let _ = tx.send(e);
            }
        });

        rx
    }
}

/// `POST` the body to a web action. No timeout: a web action may run for as
/// long as it streams.
async fn post_web_action(
    http: &reqwest::Client,
    url: Url,
    body: &Map<String, Value>,
) -> Result<StatusCode, InvokeError> {
    let response = http.post(url).json(body).send().await?;
    check_status(response.status())
}

fn check_status(status: StatusCode) -> Result<StatusCode, InvokeError> {
    if is_accepted_status(status) {
        Ok(status)
    } else {
        Err(InvokeError::Rejected { status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode as AxumStatus, routing::post, Router};
    use std::net::SocketAddr;

    async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    #[test]
    fn status_acceptance_range() {
        for code in [200, 201, 202, 204, 299] {
            assert!(is_accepted_status(StatusCode::from_u16(code).unwrap()), "{code}");
        }
        for code in [100, 199, 300, 302, 400, 404, 500, 503] {
            assert!(!is_accepted_status(StatusCode::from_u16(code).unwrap()), "{code}");
        }
    }

    #[tokio::test]
    async fn web_action_success_closes_conduit_empty() {
        let addr = serve(Router::new().route("/ok", post(|| async { "ok" }))).await;
        let client = InvocationClient::new(&InvokerConfig::default()).unwrap();
        let (scope, _guard) = RequestScope::detached();

        let url = Url::parse(&format!("http://{addr}/ok")).unwrap();
        let rx = client.spawn_web_action(url, Map::new(), scope);
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn web_action_non_2xx_is_reported() {
        let addr = serve(Router::new().route(
            "/error",
            post(|| async { AxumStatus::INTERNAL_SERVER_ERROR }),
        ))
        .await;
        let client = InvocationClient::new(&InvokerConfig::default()).unwrap();
        let (scope, _guard) = RequestScope::detached();

        let url = Url::parse(&format!("http://{addr}/error")).unwrap();
        let err = client.spawn_web_action(url, Map::new(), scope).await.unwrap();
        assert!(err.to_string().contains("not ok (500 Internal Server Error)"));
    }

    #[tokio::test]
    async fn web_action_transport_error_is_reported() {
        // Bind then drop to get a port nothing listens on.
        let addr = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let client = InvocationClient::new(&InvokerConfig::default()).unwrap();
        let (scope, _guard) = RequestScope::detached();

        let url = Url::parse(&format!("http://{addr}/gone")).unwrap();
        let err = client.spawn_web_action(url, Map::new(), scope).await.unwrap();
        assert!(matches!(err, InvokeError::Transport(_)));
    }

    #[tokio::test]
    async fn invoke_action_sends_basic_auth_and_body() {
        use axum::extract::Path;
        use axum::http::HeaderMap;
        use axum::Json;

        let router = Router::new().route(
            "/api/v1/namespaces/{ns}/actions/{*action}",
            post(
                |Path((ns, action)): Path<(String, String)>,
                 headers: HeaderMap,
                 Json(body): Json<Value>| async move {
                    assert_eq!(ns, "ns");
                    assert_eq!(action, "pkg/act");
                    assert!(headers.contains_key("authorization"));
                    assert_eq!(body["STREAM_PORT"], "4000");
                    AxumStatus::ACCEPTED
                },
            ),
        );
        let addr = serve(router).await;

        let config = InvokerConfig {
            api_host: format!("http://{addr}"),
            ..InvokerConfig::default()
        };
        let client = InvocationClient::new(&config).unwrap();
        let target = InvocationTarget::new("ns", Some("pkg".into()), "act");
        let key = ApiKey {
            user: "user".into(),
            secret: "secret".into(),
        };
        let mut body = Map::new();
        body.insert("STREAM_PORT".into(), Value::String("4000".into()));

        let status = client.invoke_action(&target, &key, &body).await.unwrap();
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn invoke_action_rejection() {
        let router = Router::new().route(
            "/api/v1/namespaces/{ns}/actions/{action}",
            post(|| async { AxumStatus::UNAUTHORIZED }),
        );
        let addr = serve(router).await;
        let config = InvokerConfig {
            api_host: format!("http://{addr}"),
            ..InvokerConfig::default()
        };
        let client = InvocationClient::new(&config).unwrap();
        let key = ApiKey {
            user: "u".into(),
            secret: "s".into(),
        };

        let err = client
            .invoke_action(&InvocationTarget::new("ns", None, "act"), &key, &Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::Rejected { status } if status == StatusCode::UNAUTHORIZED));
    }
}
