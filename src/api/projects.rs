//! Active projects: activity feed and role-gated actions.
//!
//! A project moves through `in_progress -> delivered -> completed`, with
//! `revision_requested` looping back to delivery. Transitions happen on the
//! server; the client only decides which actions to offer and refuses the
//! rest before sending anything.
//!
//! | action            | role   | allowed while                      |
//! |-------------------|--------|------------------------------------|
//! | comment           | both   | any non-terminal status            |
//! | deliver           | vendor | in progress, revision requested    |
//! | request revision  | client | delivered                          |
//! | complete          | client | delivered                          |
//! | update price      | client | in progress, revision requested    |
//! | update deadline   | client | in progress, revision requested    |

use chrono::NaiveDate;
use serde_json::json;
use std::fmt;
use tracing::info;

use super::models::{Activity, Listing, Project, ProjectStatus};
use super::validation::{validate_amount, validate_deadline, validate_required};
use crate::client::{ApiClient, ApiRequest, Attachment, MultipartForm};
use crate::error::{ApiError, ValidationErrorBuilder};
use crate::session::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Comment,
    Deliver,
    RequestRevision,
    Complete,
    UpdatePrice,
    UpdateDeadline,
}

impl ActionKind {
    pub const ALL: [ActionKind; 6] = [
        ActionKind::Comment,
        ActionKind::Deliver,
        ActionKind::RequestRevision,
        ActionKind::Complete,
        ActionKind::UpdatePrice,
        ActionKind::UpdateDeadline,
    ];

    /// Endpoint segment under `projects/{id}/`
    pub fn slug(&self) -> &'static str {
        match self {
            ActionKind::Comment => "comment",
            ActionKind::Deliver => "deliver",
            ActionKind::RequestRevision => "request_revision",
            ActionKind::Complete => "complete",
            ActionKind::UpdatePrice => "update_price",
            ActionKind::UpdateDeadline => "update_deadline",
        }
    }

    pub fn from_slug(slug: &str) -> Option<ActionKind> {
        Self::ALL.into_iter().find(|k| k.slug() == slug)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Comment => "Comment",
            ActionKind::Deliver => "Deliver work",
            ActionKind::RequestRevision => "Request revision",
            ActionKind::Complete => "Mark complete",
            ActionKind::UpdatePrice => "Update price",
            ActionKind::UpdateDeadline => "Update deadline",
        }
    }

    fn allowed(&self, role: Role, status: ProjectStatus) -> bool {
        use ProjectStatus::*;

        let working = matches!(status, InProgress | RevisionRequested);
        match (self, role) {
            (ActionKind::Comment, Role::Client | Role::Vendor) => !status.is_terminal(),
            (ActionKind::Deliver, Role::Vendor) => working,
            (ActionKind::RequestRevision | ActionKind::Complete, Role::Client) => {
                status == Delivered
            }
            (ActionKind::UpdatePrice | ActionKind::UpdateDeadline, Role::Client) => working,
            _ => false,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Actions `role` may take on a project in `status`, in menu order.
pub fn available_actions(role: Role, status: ProjectStatus) -> Vec<ActionKind> {
    ActionKind::ALL
        .into_iter()
        .filter(|kind| kind.allowed(role, status))
        .collect()
}

#[derive(Debug, Clone)]
pub enum ProjectAction {
    Comment {
        message: String,
        attachments: Vec<Attachment>,
    },
    Deliver {
        message: String,
        attachments: Vec<Attachment>,
    },
    RequestRevision {
        message: String,
    },
    Complete,
    UpdatePrice {
        price: f64,
    },
    UpdateDeadline {
        deadline: NaiveDate,
    },
}

impl ProjectAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            ProjectAction::Comment { .. } => ActionKind::Comment,
            ProjectAction::Deliver { .. } => ActionKind::Deliver,
            ProjectAction::RequestRevision { .. } => ActionKind::RequestRevision,
            ProjectAction::Complete => ActionKind::Complete,
            ProjectAction::UpdatePrice { .. } => ActionKind::UpdatePrice,
            ProjectAction::UpdateDeadline { .. } => ActionKind::UpdateDeadline,
        }
    }

    /// Check the payload and that `role` may take this action now.
    pub fn validate(&self, role: Role, status: ProjectStatus, today: NaiveDate) -> Result<(), ApiError> {
        let kind = self.kind();
        if !kind.allowed(role, status) {
            return Err(ApiError::validation_field(
                "action",
                format!(
                    "{} is not available to a {} while the project is {}",
                    kind.label(),
                    role,
                    status
                ),
            ));
        }

        let mut errors = ValidationErrorBuilder::new();
        match self {
            ProjectAction::Comment { message, .. } | ProjectAction::RequestRevision { message } => {
                errors.check("message", validate_required("Message", message));
            }
            ProjectAction::Deliver {
                message,
                attachments,
            } => {
                if message.trim().is_empty() && attachments.is_empty() {
                    errors.add("message", "Describe the delivery or attach the delivered files");
                }
            }
            ProjectAction::Complete => {}
            ProjectAction::UpdatePrice { price } => {
                errors.check("price", validate_amount("Price", *price));
            }
            ProjectAction::UpdateDeadline { deadline } => {
                errors.check("deadline", validate_deadline(*deadline, today));
            }
        }
        errors.finish()
    }

    fn to_request(&self, project_id: i64) -> Result<ApiRequest, ApiError> {
        let request = ApiRequest::post(format!("projects/{}/{}/", project_id, self.kind().slug()));
        match self {
            ProjectAction::Comment {
                message,
                attachments,
            }
            | ProjectAction::Deliver {
                message,
                attachments,
            } => {
                if attachments.is_empty() {
                    request.json(&json!({ "message": message }))
                } else {
                    let form = MultipartForm::new()
                        .text("message", message)
                        .files("attachments", attachments);
                    Ok(request.multipart(form))
                }
            }
            ProjectAction::RequestRevision { message } => {
                request.json(&json!({ "message": message }))
            }
            ProjectAction::Complete => Ok(request),
            ProjectAction::UpdatePrice { price } => request.json(&json!({ "price": price })),
            ProjectAction::UpdateDeadline { deadline } => {
                request.json(&json!({ "deadline": deadline }))
            }
        }
    }
}

pub struct ProjectsApi<'a> {
    client: &'a ApiClient,
}

impl<'a> ProjectsApi<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Projects the signed-in user takes part in.
    pub async fn list(&self) -> Result<Vec<Project>, ApiError> {
        let listing: Listing<Project> = self.client.get_json("projects/").await?;
        Ok(listing.into_vec())
    }

    pub async fn get(&self, id: i64) -> Result<Project, ApiError> {
        self.client.get_json(&format!("projects/{}/", id)).await
    }

    pub async fn activities(&self, id: i64) -> Result<Vec<Activity>, ApiError> {
        let listing: Listing<Activity> = self
            .client
            .get_json(&format!("projects/{}/activities/", id))
            .await?;
        Ok(listing.into_vec())
    }

    /// Run an action and return the project as the server left it.
    pub async fn perform(
        &self,
        project: &Project,
        role: Role,
        action: &ProjectAction,
    ) -> Result<Project, ApiError> {
        action.validate(role, project.status, super::today())?;
        let updated: Project = self
            .client
            .send_json(&action.to_request(project.id)?)
            .await?;
        info!(
            project_id = project.id,
            action = action.kind().slug(),
            status = %updated.status,
            "Project action performed"
        );
        Ok(updated)
    }
}
