//! Tenders and the bids placed on them.

use chrono::NaiveDate;
use tracing::info;

use super::models::{Bid, Listing, NewBid, NewTender, Project, Tender, TenderFilter, TenderUpdate};
use super::validation::{
    validate_amount, validate_budget_range, validate_deadline, validate_required, validate_title,
};
use crate::client::{ApiClient, ApiRequest, MultipartForm};
use crate::error::{ApiError, ValidationErrorBuilder};

impl NewTender {
    pub fn validate(&self, today: NaiveDate) -> Result<(), ApiError> {
        let mut errors = ValidationErrorBuilder::new();
        errors.check("title", validate_title(&self.title));
        errors.check("description", validate_required("Description", &self.description));
        errors.check("budget_min", validate_amount("Minimum budget", self.budget_min));
        errors.check("budget_max", validate_amount("Maximum budget", self.budget_max));
        errors.check("budget_min", validate_budget_range(self.budget_min, self.budget_max));
        errors.check("deadline", validate_deadline(self.deadline, today));
        errors.finish()
    }

    /// JSON unless files are attached, in which case a multipart form.
    fn to_request(&self) -> Result<ApiRequest, ApiError> {
        let request = ApiRequest::post("tenders/");
        if self.attachments.is_empty() {
            return request.json(self);
        }

        let form = MultipartForm::new()
            .text("title", &self.title)
            .text("description", &self.description)
            .text_opt("category", self.category.as_deref())
            .text("budget_min", self.budget_min)
            .text("budget_max", self.budget_max)
            .text("deadline", self.deadline);
        let form = self
            .skills
            .iter()
            .fold(form, |form, skill| form.text("skills", skill))
            .files("attachments", &self.attachments);
        Ok(request.multipart(form))
    }
}

impl TenderUpdate {
    pub fn validate(&self, today: NaiveDate) -> Result<(), ApiError> {
        let mut errors = ValidationErrorBuilder::new();
        if let Some(title) = &self.title {
            errors.check("title", validate_title(title));
        }
        if let Some(description) = &self.description {
            errors.check("description", validate_required("Description", description));
        }
        if let Some(min) = self.budget_min {
            errors.check("budget_min", validate_amount("Minimum budget", min));
        }
        if let Some(max) = self.budget_max {
            errors.check("budget_max", validate_amount("Maximum budget", max));
        }
        if let (Some(min), Some(max)) = (self.budget_min, self.budget_max) {
            errors.check("budget_min", validate_budget_range(min, max));
        }
        if let Some(deadline) = self.deadline {
            errors.check("deadline", validate_deadline(deadline, today));
        }
        errors.finish()
    }
}

impl NewBid {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrorBuilder::new();
        errors.check("amount", validate_amount("Bid amount", self.amount));
        if self.delivery_days == 0 {
            errors.add("delivery_days", "Delivery time must be at least one day");
        }
        errors.check("proposal", validate_required("Proposal", &self.proposal));
        errors.finish()
    }
}

pub struct TendersApi<'a> {
    client: &'a ApiClient,
}

impl<'a> TendersApi<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, filter: &TenderFilter) -> Result<Vec<Tender>, ApiError> {
        let request = ApiRequest::get("tenders/")
            .query_opt("search", filter.search.as_deref())
            .query_opt("category", filter.category.as_deref())
            .query_opt("status", filter.status.map(|s| s.as_str()))
            .query_opt("page", filter.page);
        let listing: Listing<Tender> = self.client.send_json(&request).await?;
        Ok(listing.into_vec())
    }

    pub async fn get(&self, id: i64) -> Result<Tender, ApiError> {
        self.client.get_json(&format!("tenders/{}/", id)).await
    }

    pub async fn create(&self, tender: &NewTender) -> Result<Tender, ApiError> {
        tender.validate(super::today())?;
        let created: Tender = self.client.send_json(&tender.to_request()?).await?;
        info!(id = created.id, title = %created.title, "Tender created");
        Ok(created)
    }

    pub async fn update(&self, id: i64, update: &TenderUpdate) -> Result<Tender, ApiError> {
        update.validate(super::today())?;
        self.client.patch_json(&format!("tenders/{}/", id), update).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.client.delete(&format!("tenders/{}/", id)).await?;
        info!(id, "Tender deleted");
        Ok(())
    }
}

pub struct BidsApi<'a> {
    client: &'a ApiClient,
}

impl<'a> BidsApi<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, tender_id: i64) -> Result<Vec<Bid>, ApiError> {
        let listing: Listing<Bid> = self
            .client
            .get_json(&format!("tenders/{}/bids/", tender_id))
            .await?;
        Ok(listing.into_vec())
    }

    pub async fn place(&self, tender_id: i64, bid: &NewBid) -> Result<Bid, ApiError> {
        bid.validate()?;
        let placed: Bid = self
            .client
            .post_json(&format!("tenders/{}/bids/", tender_id), bid)
            .await?;
        info!(tender_id, bid_id = placed.id, "Bid placed");
        Ok(placed)
    }

    /// Accept a bid; the server awards the tender and opens a project.
    pub async fn accept(&self, bid_id: i64) -> Result<Project, ApiError> {
        let project: Project = self
            .client
            .send_json(&ApiRequest::post(format!("bids/{}/accept/", bid_id)))
            .await?;
        info!(bid_id, project_id = project.id, "Bid accepted");
        Ok(project)
    }

    pub async fn withdraw(&self, bid_id: i64) -> Result<Bid, ApiError> {
        self.client
            .send_json(&ApiRequest::post(format!("bids/{}/withdraw/", bid_id)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::TenderStatus;
    use crate::client::Attachment;
    use crate::testing::MockBackend;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn new_tender() -> NewTender {
        NewTender {
            title: "Warehouse roof repair".to_string(),
            description: "Replace 400 m2 of roofing".to_string(),
            category: Some("construction".to_string()),
            budget_min: 5000.0,
            budget_max: 9000.0,
            deadline: date("2099-01-31"),
            skills: vec!["roofing".to_string()],
            attachments: Vec::new(),
        }
    }

    #[test]
    fn test_budget_min_above_max_is_rejected() {
        let mut tender = new_tender();
        tender.budget_min = 10_000.0;
        match tender.validate(date("2026-10-16")).unwrap_err() {
            ApiError::Validation(errors) => {
                assert_eq!(
                    errors.get("budget_min").unwrap()[0],
                    "Minimum budget cannot exceed maximum budget"
                );
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_fields_and_past_deadline() {
        let mut tender = new_tender();
        tender.title = String::new();
        tender.description = " ".to_string();
        tender.deadline = date("2020-01-01");
        match tender.validate(date("2026-10-16")).unwrap_err() {
            ApiError::Validation(errors) => {
                assert!(errors.get("title").is_some());
                assert!(errors.get("description").is_some());
                assert!(errors.get("deadline").is_some());
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_update_checks_budget_pair() {
        let update = TenderUpdate {
            budget_min: Some(900.0),
            budget_max: Some(100.0),
            ..TenderUpdate::default()
        };
        assert!(update.validate(date("2026-10-16")).is_err());
        assert!(TenderUpdate::default().validate(date("2026-10-16")).is_ok());
    }

    #[test]
    fn test_bid_validation() {
        let bid = NewBid {
            amount: 0.0,
            delivery_days: 0,
            proposal: String::new(),
        };
        match bid.validate().unwrap_err() {
            ApiError::Validation(errors) => assert_eq!(errors.fields().len(), 3),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_sends_filters() {
        let backend = MockBackend::spawn().await;
        let client = backend.signed_in_client().await;

        let filter = TenderFilter {
            search: Some("roof".to_string()),
            status: Some(TenderStatus::Open),
            ..TenderFilter::default()
        };
        let tenders = client.tenders().list(&filter).await.unwrap();
        assert_eq!(tenders.len(), 1);
        assert_eq!(tenders[0].status, TenderStatus::Open);

        let recorded = backend.state.last_request("/api/tenders/").unwrap();
        assert_eq!(recorded.query.as_deref(), Some("search=roof&status=open"));
    }

    #[tokio::test]
    async fn test_create_without_files_sends_json() {
        let backend = MockBackend::spawn().await;
        let client = backend.signed_in_client().await;

        let created = client.tenders().create(&new_tender()).await.unwrap();
        assert_eq!(created.title, "Warehouse roof repair");

        let body = backend.state.last_json_body("/api/tenders/").unwrap();
        assert_eq!(body["budget_max"], 9000.0);
        assert_eq!(body["deadline"], "2099-01-31");
    }

    #[tokio::test]
    async fn test_create_with_attachment_sends_multipart() {
        let backend = MockBackend::spawn().await;
        let client = backend.signed_in_client().await;

        let mut tender = new_tender();
        tender.attachments = vec![Attachment::new("drawings.pdf", b"%PDF-1.7".to_vec())];
        client.tenders().create(&tender).await.unwrap();

        let recorded = backend.state.last_request("/api/tenders/").unwrap();
        assert!(recorded
            .content_type
            .unwrap()
            .starts_with("multipart/form-data"));
        let body = String::from_utf8_lossy(&recorded.body);
        assert!(body.contains("filename=\"drawings.pdf\""));
        assert!(body.contains("Warehouse roof repair"));
    }

    #[tokio::test]
    async fn test_invalid_tender_never_reaches_server() {
        let backend = MockBackend::spawn().await;
        let client = backend.signed_in_client().await;
        let before = backend.state.total_requests();

        let mut tender = new_tender();
        tender.budget_min = 1_000_000.0;
        assert!(matches!(
            client.tenders().create(&tender).await,
            Err(ApiError::Validation(_))
        ));
        assert_eq!(backend.state.total_requests(), before);
    }

    #[tokio::test]
    async fn test_bid_lifecycle() {
        let backend = MockBackend::spawn().await;
        let client = backend.signed_in_client().await;

        let bids = client.bids().list(7).await.unwrap();
        assert_eq!(bids.len(), 1);

        let bid = client
            .bids()
            .place(
                7,
                &NewBid {
                    amount: 6400.0,
                    delivery_days: 14,
                    proposal: "Crew of four, two weeks".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(bid.tender, 7);

        let project = client.bids().accept(bid.id).await.unwrap();
        assert_eq!(project.tender, Some(7));
    }
}
