//! Invocation target resolution.
//!
//! Path captures arrive percent-decoded, so a segment may hold `/`, `..`
//! or `?`. Every segment is checked before any URL is built, and URLs are
//! assembled segment by segment so a value can never leave its slot.

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::config::DEFAULT_PACKAGE;

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("invalid {field} in request path: {value:?}")]
    InvalidSegment { field: &'static str, value: String },

    #[error("invalid API host: {0}")]
    ApiHost(#[from] url::ParseError),

    #[error("API host {0:?} cannot carry a path")]
    NotABase(String),
}

/// Namespace/package/action, as captured from the request path.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InvocationTarget {
    #[serde(rename = "ns")]
    pub namespace: String,
    #[serde(rename = "pkg", default)]
    pub package: Option<String>,
    pub action: String,
}

impl InvocationTarget {
    pub fn new(
        namespace: impl Into<String>,
        package: Option<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            package: package.filter(|p| !p.is_empty()),
            action: action.into(),
        }
    }

    /// Reject segments that would not stay a single path segment.
    pub fn validate(&self) -> Result<(), TargetError> {
        check_segment("namespace", &self.namespace)?;
        if let Some(pkg) = &self.package {
            check_segment("package", pkg)?;
        }
        check_segment("action", &self.action)
    }

    /// Action name relative to the namespace: `action` or `pkg/action`.
    pub fn action_path(&self) -> String {
        match self.package.as_deref().filter(|p| !p.is_empty()) {
            Some(pkg) => format!("{}/{}", pkg, self.action),
            None => self.action.clone(),
        }
    }

    /// `POST` target for a non-blocking action invocation.
    pub fn action_url(&self, api_host: &str) -> Result<Url, TargetError> {
        self.validate()?;
        let mut url = api_base(api_host)?;
        url.path_segments_mut()
            .map_err(|_| TargetError::NotABase(api_host.to_string()))?
            .pop_if_empty()
            .extend(["api", "v1", "namespaces", self.namespace.as_str(), "actions"])
            .extend(self.package.as_deref())
            .push(&self.action);
        url.query_pairs_mut()
            .append_pair("blocking", "false")
            .append_pair("result", "false");
        Ok(url)
    }

    /// `POST` target for a web action; the package segment is always present.
    pub fn web_action_url(&self, api_host: &str) -> Result<Url, TargetError> {
        self.validate()?;
        let qualified = ensure_package_present(&self.action_path());
        let mut url = api_base(api_host)?;
        url.path_segments_mut()
            .map_err(|_| TargetError::NotABase(api_host.to_string()))?
            .pop_if_empty()
            .extend(["api", "v1", "web", self.namespace.as_str()])
            .extend(qualified.split('/'));
        Ok(url)
    }
}

fn check_segment(field: &'static str, value: &str) -> Result<(), TargetError> {
    let bad = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\', '?', '#']);
    if bad {
        return Err(TargetError::InvalidSegment {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn api_base(api_host: &str) -> Result<Url, TargetError> {
    let mut url = Url::parse(api_host)?;
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

impl std::fmt::Display for InvocationTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.action_path())
    }
}

/// Prefix `https://` when `host` has no scheme. Empty stays empty.
pub fn ensure_protocol_scheme(host: &str) -> String {
    if host.is_empty() || host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

/// Qualify a bare action with the default package. Empty stays empty.
pub fn ensure_package_present(action: &str) -> String {
    if action.is_empty() || action.contains('/') {
        action.to_string()
    } else {
        format!("{}/{}", DEFAULT_PACKAGE, action)
    }
}
