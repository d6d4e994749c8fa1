//! Categories, tags and skills used to classify tenders.

use tracing::info;

use super::models::{Category, Label, Listing, NewCategory};
use super::validation::validate_required;
use crate::client::ApiClient;
use crate::error::ApiError;

pub struct CatalogApi<'a> {
    client: &'a ApiClient,
}

impl<'a> CatalogApi<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        self.list("categories/").await
    }

    /// Admin only; the server answers 403 for everyone else.
    pub async fn create_category(&self, category: &NewCategory) -> Result<Category, ApiError> {
        validate_required("Name", &category.name)
            .map_err(|msg| ApiError::validation_field("name", msg))?;
        let created: Category = self.client.post_json("categories/", category).await?;
        info!(id = created.id, name = %created.name, "Category created");
        Ok(created)
    }

    pub async fn delete_category(&self, id: i64) -> Result<(), ApiError> {
        self.client.delete(&format!("categories/{}/", id)).await
    }

    pub async fn tags(&self) -> Result<Vec<Label>, ApiError> {
        self.list("tags/").await
    }

    pub async fn skills(&self) -> Result<Vec<Label>, ApiError> {
        self.list("skills/").await
    }

    async fn list<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ApiError> {
        let listing: Listing<T> = self.client.get_json(path).await?;
        Ok(listing.into_vec())
    }
}
