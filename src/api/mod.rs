//! Typed wrappers over the TenderHub resource endpoints.
//!
//! Each wrapper borrows an [`ApiClient`], validates its input locally and
//! then goes through the client's authenticated request pipeline.

pub mod catalog;
pub mod community;
pub mod models;
pub mod profiles;
pub mod projects;
pub mod tenders;
pub mod validation;

pub use catalog::CatalogApi;
pub use community::{CommentsApi, PortfoliosApi, ReviewsApi};
pub use profiles::ProfilesApi;
pub use projects::{available_actions, ActionKind, ProjectAction, ProjectsApi};
pub use tenders::{BidsApi, TendersApi};

use crate::client::ApiClient;

impl ApiClient {
    pub fn tenders(&self) -> TendersApi<'_> {
        TendersApi::new(self)
    }

    pub fn bids(&self) -> BidsApi<'_> {
        BidsApi::new(self)
    }

    pub fn projects(&self) -> ProjectsApi<'_> {
        ProjectsApi::new(self)
    }

    pub fn comments(&self) -> CommentsApi<'_> {
        CommentsApi::new(self)
    }

    pub fn reviews(&self) -> ReviewsApi<'_> {
        ReviewsApi::new(self)
    }

    pub fn portfolios(&self) -> PortfoliosApi<'_> {
        PortfoliosApi::new(self)
    }

    pub fn profiles(&self) -> ProfilesApi<'_> {
        ProfilesApi::new(self)
    }

    pub fn catalog(&self) -> CatalogApi<'_> {
        CatalogApi::new(self)
    }
}

/// Today's date in local time, used to reject past deadlines.
pub(crate) fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}
