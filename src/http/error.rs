//! Request-level errors and their HTTP mapping.
//!
//! Only errors that happen before the first streamed byte reach this type;
//! after that the status line is committed and failures are just logged.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::invoke::{AuthError, InjectError, InvokeError, TargetError};
use crate::net::ListenerError;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Target(#[from] TargetError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error(transparent)]
    Body(#[from] InjectError),

    #[error("Error invoking action: {0}")]
    Invoke(#[from] InvokeError),

    #[error("stream cancelled")]
    Cancelled,
}

impl StreamError {
    pub fn status(&self) -> StatusCode {
        match self {
            StreamError::Auth(_) => StatusCode::BAD_REQUEST,
            StreamError::Target(TargetError::InvalidSegment { .. }) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for StreamError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
