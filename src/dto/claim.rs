//! Role claims presented by connecting clients.
//!
//! There is no account system: a deployment hands each console a signed
//! link whose claim payload rides along in a header. The backend trusts
//! the claim's role but refuses expired ones.

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{error::AppError, state::clock::wall_now_ms};

/// Header carrying the JSON claim payload.
pub const CLAIM_HEADER: &str = "x-board-claim";

/// Role a connection acts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full control over the whole board.
    Operator,
    /// Pad-bound operator with a restricted command set.
    Judge,
    /// Read-only spectator.
    Observer,
}

impl Role {
    /// Whether this role may issue board-wide mutations.
    pub fn is_operator(self) -> bool {
        matches!(self, Role::Operator)
    }
}

/// Claim payload presented in [`CLAIM_HEADER`].
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RoleClaim {
    /// Role the connection acts as.
    pub role: Role,
    /// Optional display name for presence.
    #[serde(default)]
    pub name: Option<String>,
    /// Expiry instant, epoch ms. Claims without one never expire.
    #[serde(default, rename = "expiresAt")]
    pub expires_at: Option<i64>,
}

impl RoleClaim {
    /// Whether the claim has lapsed at the given wall instant.
    pub fn expired(&self, wall_ms: i64) -> bool {
        self.expires_at.is_some_and(|expires| expires <= wall_ms)
    }
}

impl<S> FromRequestParts<S> for RoleClaim
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts.headers.get(CLAIM_HEADER) else {
            return Err(AppError::Unauthorized("missing role claim".into()));
        };
        let raw = raw
            .to_str()
            .map_err(|_| AppError::Unauthorized("role claim is not valid UTF-8".into()))?;
        let claim: RoleClaim = serde_json::from_str(raw)
            .map_err(|err| AppError::Unauthorized(format!("unreadable role claim: {err}")))?;
        if claim.expired(wall_now_ms()) {
            return Err(AppError::Unauthorized("role claim expired".into()));
        }
        Ok(claim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_parse_from_lowercase_names() {
        let claim: RoleClaim =
            serde_json::from_str(r#"{"role": "judge", "name": "Pat"}"#).unwrap();
        assert_eq!(claim.role, Role::Judge);
        assert_eq!(claim.name.as_deref(), Some("Pat"));
        assert!(claim.expires_at.is_none());
        assert!(serde_json::from_str::<RoleClaim>(r#"{"role": "root"}"#).is_err());
    }

    #[test]
    fn expiry_is_checked_only_when_present() {
        let open: RoleClaim = serde_json::from_str(r#"{"role": "observer"}"#).unwrap();
        assert!(!open.expired(i64::MAX));

        // The session layer writes camelCase keys; the expiry must bind.
        let bounded: RoleClaim =
            serde_json::from_str(r#"{"role": "operator", "expiresAt": 1000}"#).unwrap();
        assert_eq!(bounded.expires_at, Some(1000));
        assert!(!bounded.expired(999));
        assert!(bounded.expired(1000));
    }
}
