//! Shared-secret gate for the administrative API.

use std::sync::Arc;

use axum::http::HeaderMap;

use crate::config::AdminConfig;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Rejection raised when the admin key is missing, wrong, or not configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Unauthorized")]
pub struct AuthError;

/// Compares the `x-admin-key` header against the configured secret.
///
/// An unconfigured secret locks every admin route.
#[derive(Clone, Default)]
pub struct AdminGuard {
    expected: Option<Arc<str>>,
}

impl AdminGuard {
    pub fn new(admin_key: Option<&str>) -> Self {
        let expected = admin_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(Arc::from);
        Self { expected }
    }

    pub fn from_config(config: &AdminConfig) -> Self {
        Self::new(config.admin_key.as_deref())
    }

    pub fn is_configured(&self) -> bool {
        self.expected.is_some()
    }

    pub fn authorize(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let expected = self.expected.as_deref().ok_or(AuthError)?;
        let provided = headers
            .get(ADMIN_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(AuthError)?;

        if constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
            Ok(())
        } else {
            Err(AuthError)
        }
    }
}

impl std::fmt::Debug for AdminGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminGuard")
            .field("configured", &self.is_configured())
            .finish()
    }
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter()
        .zip(right)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
