use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::store::GrcStore;
use crate::types::{
    DataRequest, DataRequestResponse, GrcError, Notification, NotificationLevel, User,
    WorkflowStatus,
};

use super::editor::{load_item, resolve_auditable};

const SUCCESS_TITLE: &str = "Evidence Requested";
const SUCCESS_BODY: &str = "The evidence request has been submitted.";

/// Creates the response records that hang off a new data request
#[async_trait]
pub trait ResponseHook: Send + Sync {
    async fn create_responses(
        &self,
        store: &GrcStore,
        request: &DataRequest,
    ) -> Result<Vec<DataRequestResponse>, GrcError>;
}

/// One pending response for the request's assignee (or nobody yet)
pub struct AssigneeResponses;

#[async_trait]
impl ResponseHook for AssigneeResponses {
    async fn create_responses(
        &self,
        store: &GrcStore,
        request: &DataRequest,
    ) -> Result<Vec<DataRequestResponse>, GrcError> {
        let response = DataRequestResponse::pending_for(request);
        store.insert_response(&response).await?;
        Ok(vec![response])
    }
}

/// The "Request Evidence" modal form
#[derive(Debug, Default, Deserialize)]
pub struct EvidenceRequestForm {
    /// Assigned To
    pub user_id: Option<String>,
    /// Request Details
    pub details: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EvidenceRequested {
    pub data_request: DataRequest,
    pub responses: Vec<DataRequestResponse>,
    pub notification: Notification,
}

/// Ask for evidence against an audit item, optionally assigned to a user.
///
/// Writes the data request, then its responses through `hook`. If the hook
/// fails the request and any responses it already wrote are removed again,
/// so a request never exists without its responses. Notifications are sent
/// once everything is stored; failing to deliver one is logged only.
pub async fn request_evidence(
    store: &GrcStore,
    hook: &dyn ResponseHook,
    item_id: &str,
    requester: &User,
    form: EvidenceRequestForm,
) -> Result<EvidenceRequested, GrcError> {
    let details = form
        .details
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| GrcError::validation("details", "The Request Details field is required."))?;
    let assignee_id = form.user_id.filter(|id| !id.trim().is_empty());

    let (item, audit) = load_item(store, item_id).await?;
    let assignee = match assignee_id {
        Some(id) => Some(store.user(&id).await?.ok_or_else(|| {
            GrcError::validation("user_id", "The selected Assigned To is invalid.")
        })?),
        None => None,
    };

    let data_request = DataRequest {
        id: format!("req_{}", uuid::Uuid::new_v4().simple()),
        audit_item_id: item.id.clone(),
        audit_id: audit.id.clone(),
        status: WorkflowStatus::NotStarted,
        created_by_id: requester.id.clone(),
        assigned_to_id: assignee.as_ref().map(|u| u.id.clone()),
        details,
        created_at: chrono::Utc::now().timestamp() as u64,
    };
    store.insert_data_request(&data_request).await?;

    let responses = match hook.create_responses(store, &data_request).await {
        Ok(responses) => responses,
        Err(e) => {
            warn!(
                "Creating responses for data request {} failed: {}. Removing the request.",
                data_request.id, e
            );
            if let Err(cleanup) = discard_request(store, &data_request).await {
                error!(
                    "Failed to remove data request {} after response failure: {}",
                    data_request.id, cleanup
                );
            }
            return Err(e);
        }
    };

    if let Some(assignee) = &assignee {
        let code = resolve_auditable(store, &item.auditable)
            .await
            .map(|a| a.code)
            .unwrap_or_else(|_| item.auditable.id.clone());
        let assignment = Notification::new(
            &assignee.id,
            NotificationLevel::Info,
            "Evidence Requested",
            &format!(
                "{} has requested evidence for {} in audit \"{}\".",
                requester.name, code, audit.title
            ),
        );
        notify(store, &assignment).await;
    }

    let notification = Notification::new(
        &requester.id,
        NotificationLevel::Success,
        SUCCESS_TITLE,
        SUCCESS_BODY,
    );
    notify(store, &notification).await;

    info!(
        "Data request {} created for item {} (assigned to {}, {} response(s))",
        data_request.id,
        item.id,
        assignee.as_ref().map(|u| u.id.as_str()).unwrap_or("nobody"),
        responses.len()
    );

    Ok(EvidenceRequested {
        data_request,
        responses,
        notification,
    })
}

/// Remove a request together with whatever responses were written for it
async fn discard_request(store: &GrcStore, request: &DataRequest) -> Result<(), GrcError> {
    for response in store.responses_for_request(&request.id).await? {
        store.remove_response(&response).await?;
    }
    store.remove_data_request(request).await
}

/// The request is already stored at this point, so delivery failures don't fail it
async fn notify(store: &GrcStore, notification: &Notification) {
    if let Err(e) = store.push_notification(notification).await {
        error!(
            "Failed to deliver notification \"{}\" to {}: {}",
            notification.title, notification.user_id, e
        );
    }
}
