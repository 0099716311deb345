use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

use crate::store::GrcStore;
use crate::types::{
    compare_codes, Applicability, Audit, AuditItem, AuditType, AuditableRef, AuditableType,
    Effectiveness, GrcError, WorkflowStatus,
};

use super::editor::resolve_auditable;

/// Request to open an audit over a set of controls (or implementations)
#[derive(Debug, Deserialize)]
pub struct ScopeAudit {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub audit_type: AuditType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub manager_id: Option<String>,
    /// Control ids for standards audits, implementation ids otherwise
    #[serde(default)]
    pub auditable_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ScopedAudit {
    pub audit: Audit,
    pub items: Vec<AuditItem>,
}

/// Create an audit and one item per distinct auditable
pub async fn scope_audit(store: &GrcStore, request: ScopeAudit) -> Result<ScopedAudit, GrcError> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(GrcError::validation("title", "The Title field is required."));
    }
    if request.end_date < request.start_date {
        return Err(GrcError::validation(
            "end_date",
            "The end date must be on or after the start date.",
        ));
    }
    if let Some(manager_id) = &request.manager_id {
        if store.user(manager_id).await?.is_none() {
            return Err(GrcError::validation(
                "manager_id",
                "The selected manager is invalid.",
            ));
        }
    }

    let kind = match request.audit_type {
        AuditType::Standards => AuditableType::Control,
        AuditType::Implementations => AuditableType::Implementation,
    };

    let mut seen = BTreeSet::new();
    let mut auditables = Vec::new();
    for id in request.auditable_ids {
        if !seen.insert(id.clone()) {
            continue;
        }
        let auditable = AuditableRef { kind, id };
        resolve_auditable(store, &auditable).await.map_err(|e| match e {
            GrcError::NotFound { kind, id } => GrcError::validation(
                "auditable_ids",
                format!("{} {} does not exist.", kind, id),
            ),
            other => other,
        })?;
        auditables.push(auditable);
    }

    let audit = Audit {
        id: format!("aud_{}", uuid::Uuid::new_v4().simple()),
        title: title.to_string(),
        description: request.description,
        audit_type: request.audit_type,
        status: WorkflowStatus::NotStarted,
        start_date: request.start_date,
        end_date: request.end_date,
        manager_id: request.manager_id,
        created_at: chrono::Utc::now().timestamp() as u64,
    };
    store.put_audit(&audit).await?;

    let mut items = Vec::with_capacity(auditables.len());
    for auditable in auditables {
        let item = AuditItem::scoped(&audit.id, auditable);
        store.add_audit_item(&item).await?;
        items.push(item);
    }

    info!(
        "Scoped audit {} ({}) with {} item(s)",
        audit.id,
        audit.title,
        items.len()
    );

    Ok(ScopedAudit { audit, items })
}

/// One line of an audit's item table
#[derive(Debug, Serialize)]
pub struct ItemSummary {
    pub id: String,
    pub code: String,
    pub title: String,
    pub status: WorkflowStatus,
    pub effectiveness: Effectiveness,
    pub applicability: Applicability,
}

#[derive(Debug, Serialize)]
pub struct AuditOverview {
    pub audit: Audit,
    pub items: Vec<ItemSummary>,
}

/// Audit with its items in code order
pub async fn audit_overview(store: &GrcStore, audit_id: &str) -> Result<AuditOverview, GrcError> {
    let audit = store
        .audit(audit_id)
        .await?
        .ok_or_else(|| GrcError::not_found("Audit", audit_id))?;

    let mut items = Vec::new();
    for item in store.audit_items(audit_id).await? {
        let auditable = resolve_auditable(store, &item.auditable).await?;
        items.push(ItemSummary {
            id: item.id,
            code: auditable.code,
            title: auditable.title,
            status: item.status,
            effectiveness: item.effectiveness,
            applicability: item.applicability,
        });
    }
    items.sort_by(|a, b| compare_codes(&a.code, &b.code).then(a.id.cmp(&b.id)));

    Ok(AuditOverview { audit, items })
}
