//! Invocation Service integration.
//!
//! # Data Flow
//! ```text
//! Path captures   → target.rs (namespace/package/action, URLs)
//! Authorization   → auth.rs (API key)
//! Request body    → body.rs (inject STREAM_HOST / STREAM_PORT)
//!                 → client.rs (direct invoke, or background web-action call)
//! ```

pub mod auth;
pub mod body;
pub mod client;
pub mod target;

pub use auth::{extract_api_key, ApiKey, AuthError};
pub use body::{inject_stream_coordinates, InjectError, STREAM_HOST_FIELD, STREAM_PORT_FIELD};
pub use client::{is_accepted_status, InvocationClient, InvokeError};
pub use target::{ensure_package_present, ensure_protocol_scheme, InvocationTarget, TargetError};
