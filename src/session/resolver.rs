//! Role resolution for the signed-in user.
//!
//! Sources are consulted from cheapest and most trusted to least:
//! 1. the cached user descriptor
//! 2. role-specific endpoints, evaluated in configured order
//! 3. the generic profile endpoint
//! 4. claims decoded from the access token (unverified, a last resort)
//!
//! If nothing answers, the user is assumed to be a plain `user`. Every
//! newly discovered role is written back to the token store, so the next
//! resolution stops at the cache.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::claims::{self, Claims};
use super::{Role, Session, UserDescriptor, UserId};
use crate::client::{ApiClient, ApiRequest};
use crate::config::RoleConfig;
use crate::error::ApiError;

/// An endpoint that only answers 2xx for users holding `role`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleProbe {
    pub path: String,
    pub role: Role,
}

impl RoleProbe {
    pub fn new(path: impl Into<String>, role: Role) -> Self {
        Self {
            path: path.into(),
            role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    Unresolved,
    Probing,
    Resolved(Role),
}

pub struct RoleResolver {
    client: ApiClient,
    probes: Vec<RoleProbe>,
    profile_path: String,
    claim_names: Vec<String>,
    state: Mutex<ResolutionState>,
}

impl RoleResolver {
    pub fn new(client: ApiClient, config: &RoleConfig) -> Self {
        Self {
            client,
            probes: config.probes.clone(),
            profile_path: config.profile_path.clone(),
            claim_names: config.claim_names.clone(),
            state: Mutex::new(ResolutionState::Unresolved),
        }
    }

    pub fn state(&self) -> ResolutionState {
        *self.state.lock()
    }

    /// Back to `Unresolved`, e.g. after sign-out.
    pub fn reset(&self) {
        *self.state.lock() = ResolutionState::Unresolved;
    }

    /// Determine the current user's role.
    ///
    /// Returns `Role::Unknown` without any request when nobody is signed
    /// in. Probe failures are treated as "not this role"; only an expired
    /// session or a failed write to the store is reported as an error.
    pub async fn resolve(&self) -> Result<Role, ApiError> {
        let session = self.client.session();

        if let Some(role) = session.user.as_ref().map(|u| u.role).filter(Role::is_known) {
            debug!(%role, "Role served from cached descriptor");
            *self.state.lock() = ResolutionState::Resolved(role);
            return Ok(role);
        }

        let Some(access_token) = session.access_token.clone() else {
            debug!("Not signed in, role unknown");
            self.reset();
            return Ok(Role::Unknown);
        };

        *self.state.lock() = ResolutionState::Probing;
        match self.discover(&session, &access_token).await {
            Ok(role) => {
                *self.state.lock() = ResolutionState::Resolved(role);
                Ok(role)
            }
            Err(err) => {
                self.reset();
                Err(err)
            }
        }
    }

    async fn discover(&self, session: &Session, access_token: &str) -> Result<Role, ApiError> {
        let token_claims = claims::decode_payload(access_token);
        let mut profile: Option<Claims> = None;

        let (role, source) = if let Some(role) = self.probe_endpoints().await? {
            (role, "probe")
        } else if let Some(role) = self.profile_role(&mut profile).await? {
            (role, "profile")
        } else if let Some(role) = token_claims
            .as_ref()
            .and_then(|c| claims::role_claim(c, &self.claim_names))
        {
            (role, "token claims")
        } else {
            warn!("No source reported a role, assuming plain user");
            (Role::User, "default")
        };

        info!(%role, source, "Resolved user role");

        let fallback = || descriptor_from(session, profile.as_ref(), token_claims.as_ref());
        let user = self.client.store().record_role(role, fallback)?;
        Ok(user.role)
    }

    async fn probe_endpoints(&self) -> Result<Option<Role>, ApiError> {
        for probe in &self.probes {
            match self.client.execute(&ApiRequest::get(probe.path.clone())).await {
                Ok(_) => {
                    debug!(path = %probe.path, role = %probe.role, "Role probe matched");
                    return Ok(Some(probe.role));
                }
                Err(err @ ApiError::SessionExpired(_)) => return Err(err),
                Err(err) => {
                    debug!(path = %probe.path, error = %err, "Role probe did not match");
                }
            }
        }
        Ok(None)
    }

    async fn profile_role(&self, profile: &mut Option<Claims>) -> Result<Option<Role>, ApiError> {
        let body: Value = match self.client.get_json(&self.profile_path).await {
            Ok(body) => body,
            Err(err @ ApiError::SessionExpired(_)) => return Err(err),
            Err(err) => {
                debug!(error = %err, "Profile endpoint unavailable for role lookup");
                return Ok(None);
            }
        };

        let Value::Object(fields) = body else {
            return Ok(None);
        };

        let role = ["role", "user_type"]
            .iter()
            .filter_map(|key| fields.get(*key)?.as_str())
            .map(Role::parse)
            .find(Role::is_known);
        *profile = Some(fields);
        Ok(role)
    }
}

/// Descriptor for a session that has tokens but no stored user yet.
fn descriptor_from(
    session: &Session,
    profile: Option<&Claims>,
    token_claims: Option<&Claims>,
) -> UserDescriptor {
    if let Some(user) = &session.user {
        return user.clone();
    }

    let username = profile
        .and_then(|p| p.get("username")?.as_str().map(str::to_string))
        .or_else(|| token_claims.and_then(claims::username_claim))
        .unwrap_or_default();
    let user_id = profile
        .and_then(|p| p.get("id").and_then(UserId::from_json))
        .or_else(|| token_claims.and_then(claims::user_id_claim));

    UserDescriptor {
        username,
        user_id,
        role: Role::Unknown,
    }
}
