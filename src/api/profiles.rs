//! User profiles.

use serde_json::{Map, Value};
use tracing::info;

use super::models::{ProfileUpdate, UserProfile};
use super::validation::MAX_TITLE_LENGTH;
use crate::client::{ApiClient, ApiRequest, MultipartForm};
use crate::error::{ApiError, ValidationErrorBuilder};
use crate::session::UserId;

/// Longest accepted profile bio
pub const MAX_BIO_LENGTH: usize = 2000;

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.bio.is_none()
            && self.skills.is_none()
            && self.image.is_none()
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.is_empty() {
            return Err(ApiError::validation_field("profile", "Nothing to update"));
        }

        let mut errors = ValidationErrorBuilder::new();
        for (field, value) in [("first_name", &self.first_name), ("last_name", &self.last_name)] {
            if value.as_ref().is_some_and(|v| v.chars().count() > MAX_TITLE_LENGTH) {
                errors.add(field, format!("Must be at most {} characters", MAX_TITLE_LENGTH));
            }
        }
        if self
            .bio
            .as_ref()
            .is_some_and(|bio| bio.chars().count() > MAX_BIO_LENGTH)
        {
            errors.add("bio", format!("Bio must be at most {} characters", MAX_BIO_LENGTH));
        }
        if let Some(image) = &self.image {
            if !image.content_type.starts_with("image/") {
                errors.add("profile_image", "Profile image must be an image file");
            }
        }
        errors.finish()
    }

    fn to_request(&self) -> Result<ApiRequest, ApiError> {
        let request = ApiRequest::patch("users/me/");

        let Some(image) = &self.image else {
            let mut body = Map::new();
            let text_fields = [
                ("first_name", &self.first_name),
                ("last_name", &self.last_name),
                ("bio", &self.bio),
            ];
            for (key, value) in text_fields {
                if let Some(value) = value {
                    body.insert(key.to_string(), Value::String(value.clone()));
                }
            }
            if let Some(skills) = &self.skills {
                body.insert("skills".to_string(), Value::from(skills.clone()));
            }
            return request.json(&body);
        };

        let form = MultipartForm::new()
            .text_opt("first_name", self.first_name.as_deref())
            .text_opt("last_name", self.last_name.as_deref())
            .text_opt("bio", self.bio.as_deref());
        let form = self
            .skills
            .iter()
            .flatten()
            .fold(form, |form, skill| form.text("skills", skill))
            .file("profile_image", image.clone());
        Ok(request.multipart(form))
    }
}

pub struct ProfilesApi<'a> {
    client: &'a ApiClient,
}

impl<'a> ProfilesApi<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Profile of the signed-in user.
    pub async fn me(&self) -> Result<UserProfile, ApiError> {
        self.client.get_json("users/me/").await
    }

    /// Public profile of any user.
    pub async fn get(&self, id: &UserId) -> Result<UserProfile, ApiError> {
        self.client.get_json(&format!("users/{}/", id)).await
    }

    pub async fn update(&self, update: &ProfileUpdate) -> Result<UserProfile, ApiError> {
        update.validate()?;
        let profile: UserProfile = self.client.send_json(&update.to_request()?).await?;
        info!(username = %profile.username, "Profile updated");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Attachment;
    use crate::testing::MockBackend;

    #[test]
    fn test_empty_update_is_rejected() {
        match ProfileUpdate::default().validate().unwrap_err() {
            ApiError::Validation(errors) => assert!(errors.get("profile").is_some()),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_non_image_avatar_is_rejected() {
        let update = ProfileUpdate {
            image: Some(Attachment::new("resume.pdf", b"%PDF".to_vec())),
            ..ProfileUpdate::default()
        };
        assert!(update.validate().is_err());
    }

    #[tokio::test]
    async fn test_me_and_public_profile() {
        let backend = MockBackend::spawn().await;
        let client = backend.signed_in_client().await;

        let me = client.profiles().me().await.unwrap();
        assert_eq!(me.username, "alice");
        assert_eq!(me.id, UserId::Number(1));

        let other = client.profiles().get(&UserId::Number(5)).await.unwrap();
        assert_eq!(other.username, "victor");
    }

    #[tokio::test]
    async fn test_update_sends_only_changed_fields() {
        let backend = MockBackend::spawn().await;
        let client = backend.signed_in_client().await;

        let update = ProfileUpdate {
            bio: Some("Roofing specialist".to_string()),
            ..ProfileUpdate::default()
        };
        let profile = client.profiles().update(&update).await.unwrap();
        assert_eq!(profile.bio.as_deref(), Some("Roofing specialist"));

        let body = backend.state.last_json_body("/api/users/me/").unwrap();
        assert_eq!(body, serde_json::json!({ "bio": "Roofing specialist" }));
    }

    #[tokio::test]
    async fn test_update_with_image_is_multipart() {
        let backend = MockBackend::spawn().await;
        let client = backend.signed_in_client().await;

        let update = ProfileUpdate {
            first_name: Some("Alice".to_string()),
            image: Some(Attachment::new("me.jpg", vec![0xff, 0xd8, 0xff])),
            ..ProfileUpdate::default()
        };
        client.profiles().update(&update).await.unwrap();

        let recorded = backend.state.last_request("/api/users/me/").unwrap();
        assert_eq!(recorded.method, "PATCH");
        let body = String::from_utf8_lossy(&recorded.body);
        assert!(body.contains("name=\"profile_image\"; filename=\"me.jpg\""));
    }
}
