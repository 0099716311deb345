use serde::{Deserialize, Serialize};

use super::WorkflowStatus;

/// A solicitation for evidence tied to one audit item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataRequest {
    pub id: String,
    pub audit_item_id: String,
    pub audit_id: String,
    pub status: WorkflowStatus,
    pub created_by_id: String,
    /// Unassigned requests are allowed
    #[serde(default)]
    pub assigned_to_id: Option<String>,
    pub details: String,
    pub created_at: u64,
}

/// Status of a single response to a data request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Pending,
    Responded,
    Accepted,
    Rejected,
}

/// Placeholder the assignee fills in with evidence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataRequestResponse {
    pub id: String,
    pub data_request_id: String,
    pub requester_id: String,
    #[serde(default)]
    pub requestee_id: Option<String>,
    pub status: ResponseStatus,
    #[serde(default)]
    pub response: Option<String>,
    pub created_at: u64,
}

impl DataRequestResponse {
    /// Empty response addressed to the request's assignee, if any
    pub fn pending_for(request: &DataRequest) -> Self {
        Self {
            id: format!("rsp_{}", uuid::Uuid::new_v4().simple()),
            data_request_id: request.id.clone(),
            requester_id: request.created_by_id.clone(),
            requestee_id: request.assigned_to_id.clone(),
            status: ResponseStatus::Pending,
            response: None,
            created_at: chrono::Utc::now().timestamp() as u64,
        }
    }
}
