use serde::{Deserialize, Serialize};
use tracing::info;

use crate::store::GrcStore;
use crate::types::{
    Applicability, Audit, AuditItem, AuditType, AuditableRef, AuditableType, DataRequest,
    Effectiveness, GrcError, Implementation, WorkflowStatus,
};

/// Display data for the record an audit item points at
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedAuditable {
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub discussion: Option<String>,
    pub standard: Option<String>,
    pub implementations: Vec<Implementation>,
}

/// Look up the control or implementation behind an item.
///
/// The item only stores the reference; everything shown here is read live.
pub async fn resolve_auditable(
    store: &GrcStore,
    auditable: &AuditableRef,
) -> Result<ResolvedAuditable, GrcError> {
    match auditable.kind {
        AuditableType::Control => {
            let control = store
                .control(&auditable.id)
                .await?
                .ok_or_else(|| GrcError::not_found("Control", &auditable.id))?;

            let standard = match &control.standard_id {
                Some(id) => store.standard(id).await?.map(|s| s.name),
                None => None,
            };

            let mut implementations = Vec::with_capacity(control.implementation_ids.len());
            for id in &control.implementation_ids {
                if let Some(implementation) = store.implementation(id).await? {
                    implementations.push(implementation);
                }
            }

            Ok(ResolvedAuditable {
                code: control.code,
                title: control.title,
                description: control.description,
                discussion: control.discussion,
                standard,
                implementations,
            })
        }
        AuditableType::Implementation => {
            let implementation = store
                .implementation(&auditable.id)
                .await?
                .ok_or_else(|| GrcError::not_found("Implementation", &auditable.id))?;

            Ok(ResolvedAuditable {
                code: implementation.code,
                title: implementation.title,
                description: implementation.details,
                discussion: None,
                standard: None,
                implementations: Vec::new(),
            })
        }
    }
}

/// Where the editor sends the auditor after saving or going back
pub fn audit_url(audit_id: &str) -> String {
    format!("/audits/{}", audit_id)
}

/// A data request as listed under an item's evidence
#[derive(Debug, Serialize)]
pub struct DataRequestRow {
    #[serde(flatten)]
    pub request: DataRequest,
    pub assigned_to: Option<String>,
    pub created_by: Option<String>,
    pub responses: usize,
}

/// Everything the "Assess Audit Item" page shows
#[derive(Debug, Serialize)]
pub struct AuditItemView {
    pub title: &'static str,
    pub item: AuditItem,
    pub info: ResolvedAuditable,
    /// Hidden for implementation audits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementations: Option<Vec<Implementation>>,
    pub data_requests: Vec<DataRequestRow>,
    pub back_url: String,
}

/// Load an item, its audit, or fail with NotFound
pub async fn load_item(store: &GrcStore, item_id: &str) -> Result<(AuditItem, Audit), GrcError> {
    let item = store
        .audit_item(item_id)
        .await?
        .ok_or_else(|| GrcError::not_found("Audit item", item_id))?;
    let audit = store
        .audit(&item.audit_id)
        .await?
        .ok_or_else(|| GrcError::not_found("Audit", &item.audit_id))?;
    Ok((item, audit))
}

pub async fn item_view(store: &GrcStore, item_id: &str) -> Result<AuditItemView, GrcError> {
    let (item, audit) = load_item(store, item_id).await?;
    let mut info = resolve_auditable(store, &item.auditable).await?;

    let implementations = if audit.audit_type == AuditType::Implementations {
        None
    } else {
        Some(std::mem::take(&mut info.implementations))
    };

    let mut data_requests = Vec::new();
    for request in store.data_requests_for_item(&item.id).await? {
        let assigned_to = match &request.assigned_to_id {
            Some(id) => store.user(id).await?.map(|u| u.name),
            None => None,
        };
        let created_by = store.user(&request.created_by_id).await?.map(|u| u.name);
        let responses = store.responses_for_request(&request.id).await?.len();
        data_requests.push(DataRequestRow {
            request,
            assigned_to,
            created_by,
            responses,
        });
    }

    Ok(AuditItemView {
        title: "Assess Audit Item",
        back_url: audit_url(&audit.id),
        item,
        info,
        implementations,
        data_requests,
    })
}

/// The evaluation section of the editor; absent fields are left unchanged
#[derive(Debug, Default, Deserialize)]
pub struct Assessment {
    pub status: Option<WorkflowStatus>,
    pub effectiveness: Option<Effectiveness>,
    pub applicability: Option<Applicability>,
    pub auditor_notes: Option<String>,
}

/// Saved item plus the page to return to
#[derive(Debug, Serialize)]
pub struct AssessmentSaved {
    pub item: AuditItem,
    pub redirect: String,
}

pub async fn save_assessment(
    store: &GrcStore,
    item_id: &str,
    assessor_id: &str,
    assessment: Assessment,
) -> Result<AssessmentSaved, GrcError> {
    let (mut item, audit) = load_item(store, item_id).await?;

    if let Some(status) = assessment.status {
        item.status = status;
    }
    if let Some(effectiveness) = assessment.effectiveness {
        item.effectiveness = effectiveness;
    }
    if let Some(applicability) = assessment.applicability {
        item.applicability = applicability;
    }
    if let Some(notes) = assessment.auditor_notes {
        item.auditor_notes = if notes.trim().is_empty() { None } else { Some(notes) };
    }
    item.user_id = Some(assessor_id.to_string());
    item.updated_at = chrono::Utc::now().timestamp() as u64;

    store.save_audit_item(&item).await?;

    info!(
        "Audit item {} assessed by {}: {} / {} / {}",
        item.id,
        assessor_id,
        item.status.as_str(),
        item.effectiveness.as_str(),
        item.applicability.as_str()
    );

    Ok(AssessmentSaved {
        item,
        redirect: audit_url(&audit.id),
    })
}
