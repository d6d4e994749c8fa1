//! Tender comments, user reviews and vendor portfolios.

use serde_json::json;
use tracing::info;

use super::models::{
    Comment, Listing, NewPortfolioItem, NewReview, PortfolioItem, Project, ProjectStatus, Review,
};
use super::validation::{validate_rating, validate_required, validate_title};
use crate::client::{ApiClient, ApiRequest, MultipartForm};
use crate::error::{ApiError, ValidationErrorBuilder};
use crate::session::UserId;

pub struct CommentsApi<'a> {
    client: &'a ApiClient,
}

impl<'a> CommentsApi<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, tender_id: i64) -> Result<Vec<Comment>, ApiError> {
        let listing: Listing<Comment> = self
            .client
            .get_json(&format!("tenders/{}/comments/", tender_id))
            .await?;
        Ok(listing.into_vec())
    }

    pub async fn add(&self, tender_id: i64, text: &str) -> Result<Comment, ApiError> {
        validate_required("Comment", text)
            .map_err(|msg| ApiError::validation_field("text", msg))?;
        self.client
            .post_json(
                &format!("tenders/{}/comments/", tender_id),
                &json!({ "text": text.trim() }),
            )
            .await
    }
}

impl NewReview {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrorBuilder::new();
        errors.check("rating", validate_rating(self.rating));
        errors.finish()
    }
}

pub struct ReviewsApi<'a> {
    client: &'a ApiClient,
}

impl<'a> ReviewsApi<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn for_user(&self, user: &UserId) -> Result<Vec<Review>, ApiError> {
        let listing: Listing<Review> = self
            .client
            .get_json(&format!("users/{}/reviews/", user))
            .await?;
        Ok(listing.into_vec())
    }

    /// Review the other party of a completed project.
    pub async fn add(&self, project: &Project, review: &NewReview) -> Result<Review, ApiError> {
        if project.status != ProjectStatus::Completed {
            return Err(ApiError::validation_field(
                "project",
                "Only completed projects can be reviewed",
            ));
        }
        review.validate()?;

        let created: Review = self
            .client
            .post_json(&format!("projects/{}/review/", project.id), review)
            .await?;
        info!(project_id = project.id, rating = created.rating, "Review submitted");
        Ok(created)
    }
}

impl NewPortfolioItem {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrorBuilder::new();
        errors.check("title", validate_title(&self.title));
        if let Some(link) = &self.link {
            if !(link.starts_with("http://") || link.starts_with("https://")) {
                errors.add("link", "Link must start with http:// or https://");
            }
        }
        errors.finish()
    }

    fn to_request(&self) -> Result<ApiRequest, ApiError> {
        let request = ApiRequest::post("portfolio/");
        match &self.image {
            None => request.json(&json!({
                "title": self.title,
                "description": self.description,
                "link": self.link,
            })),
            Some(image) => {
                let form = MultipartForm::new()
                    .text("title", &self.title)
                    .text_opt("description", self.description.as_deref())
                    .text_opt("link", self.link.as_deref())
                    .file("image", image.clone());
                Ok(request.multipart(form))
            }
        }
    }
}

pub struct PortfoliosApi<'a> {
    client: &'a ApiClient,
}

impl<'a> PortfoliosApi<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn for_user(&self, user: &UserId) -> Result<Vec<PortfolioItem>, ApiError> {
        let listing: Listing<PortfolioItem> = self
            .client
            .get_json(&format!("users/{}/portfolio/", user))
            .await?;
        Ok(listing.into_vec())
    }

    pub async fn add(&self, item: &NewPortfolioItem) -> Result<PortfolioItem, ApiError> {
        item.validate()?;
        let created: PortfolioItem = self.client.send_json(&item.to_request()?).await?;
        info!(id = created.id, title = %created.title, "Portfolio item added");
        Ok(created)
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.client.delete(&format!("portfolio/{}/", id)).await
    }
}
