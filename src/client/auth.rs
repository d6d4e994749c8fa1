//! Sign-in, sign-out and account registration.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApiClient, ApiRequest};
use crate::api::models::UserProfile;
use crate::api::validation::{validate_email, validate_password, validate_required, validate_username};
use crate::error::{ApiError, ValidationErrorBuilder};
use crate::session::claims;
use crate::session::{Role, Session, UserDescriptor};

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(alias = "access_token")]
    access: String,
    #[serde(alias = "refresh_token")]
    refresh: String,
}

/// New account details, checked locally before they are sent.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip)]
    pub password_confirmation: String,
    /// `client` or `vendor`
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl Registration {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrorBuilder::new();
        errors.check("username", validate_username(&self.username));
        errors.check("email", validate_email(&self.email));
        errors.check("password", validate_password(&self.password));
        if self.password != self.password_confirmation {
            errors.add("password_confirmation", "Passwords do not match");
        }
        if !matches!(self.role, Role::Client | Role::Vendor) {
            errors.add("role", "Choose either client or vendor");
        }
        errors.finish()
    }
}

impl ApiClient {
    /// Exchange credentials for tokens and store the new session.
    ///
    /// The store is only written after the server accepted the credentials.
    pub async fn login(&self, username: &str, password: &str) -> Result<UserDescriptor, ApiError> {
        let mut errors = ValidationErrorBuilder::new();
        errors.check("username", validate_required("Username", username));
        errors.check("password", validate_required("Password", password));
        errors.finish()?;

        let request = ApiRequest::post(self.inner.token_path.clone())
            .anonymous()
            .json(&serde_json::json!({
                "username": username.trim(),
                "password": password,
            }))?;

        let tokens: TokenResponse = self.send_json(&request).await?;
        if tokens.access.is_empty() || tokens.refresh.is_empty() {
            return Err(ApiError::Decode("token response is missing a token".into()));
        }

        let user = UserDescriptor {
            username: username.trim().to_string(),
            user_id: claims::decode_payload(&tokens.access)
                .as_ref()
                .and_then(claims::user_id_claim),
            // Decided later by the role resolver, from server-confirmed sources first.
            role: Role::Unknown,
        };

        self.inner.store.save(&Session {
            access_token: Some(tokens.access),
            refresh_token: Some(tokens.refresh),
            user: Some(user.clone()),
        })?;

        info!(username = %user.username, "Signed in");
        Ok(user)
    }

    /// Forget the stored session.
    pub fn logout(&self) -> Result<(), ApiError> {
        self.inner.store.clear()?;
        info!("Signed out");
        Ok(())
    }

    /// Create an account. Does not sign in.
    pub async fn register(&self, registration: &Registration) -> Result<UserProfile, ApiError> {
        registration.validate()?;
        let request = ApiRequest::post("users/register/")
            .anonymous()
            .json(registration)?;
        let profile: UserProfile = self.send_json(&request).await?;
        info!(username = %profile.username, "Registered account");
        Ok(profile)
    }
}
