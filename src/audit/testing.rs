//! Fixtures shared by the audit tests

use chrono::NaiveDate;

use crate::store::GrcStore;
use crate::types::{Audit, AuditType, Control, Implementation, Standard, User};

use super::scoping::{scope_audit, ScopeAudit};

pub struct Seeded {
    pub audit: Audit,
    pub auditor: User,
    pub assignee: User,
    pub item_ids: Vec<String>,
}

pub async fn seed_catalog(store: &GrcStore) {
    for (id, name) in [("usr_auditor", "Avery Auditor"), ("usr_owner", "Olu Owner")] {
        store
            .put_user(&User {
                id: id.to_string(),
                name: name.to_string(),
                email: None,
            })
            .await
            .unwrap();
    }

    store
        .put_standard(&Standard {
            id: "std_nist".to_string(),
            name: "NIST 800-53".to_string(),
            code: "800-53".to_string(),
            description: None,
        })
        .await
        .unwrap();

    store
        .put_implementation(&Implementation {
            id: "imp_1".to_string(),
            code: "IMP-1".to_string(),
            title: "Single sign-on".to_string(),
            details: Some("<p>All staff sign in through Okta with MFA.</p>".to_string()),
        })
        .await
        .unwrap();

    store
        .put_control(&Control {
            id: "ctl_ac1".to_string(),
            code: "AC-1".to_string(),
            title: "Policy & Procedures".to_string(),
            description: Some("<p>Develop an access control policy.</p>".to_string()),
            discussion: Some("<p>Review annually.</p>".to_string()),
            standard_id: Some("std_nist".to_string()),
            implementation_ids: vec!["imp_1".to_string()],
        })
        .await
        .unwrap();

    store
        .put_control(&Control {
            id: "ctl_ac2".to_string(),
            code: "AC-2".to_string(),
            title: "Account Management".to_string(),
            description: Some("<p>Manage system accounts.</p>".to_string()),
            discussion: None,
            standard_id: Some("std_nist".to_string()),
            implementation_ids: Vec::new(),
        })
        .await
        .unwrap();
}

pub async fn seed_audit(store: &GrcStore, audit_type: AuditType) -> Seeded {
    seed_catalog(store).await;

    let auditable_ids = match audit_type {
        AuditType::Standards => vec!["ctl_ac2".to_string(), "ctl_ac1".to_string()],
        AuditType::Implementations => vec!["imp_1".to_string()],
    };

    let scoped = scope_audit(
        store,
        ScopeAudit {
            title: "FY26 Access Review".to_string(),
            description: None,
            audit_type,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
            manager_id: Some("usr_auditor".to_string()),
            auditable_ids,
        },
    )
    .await
    .unwrap();

    // Sort so item_ids[0] is always AC-1 (or IMP-1)
    let mut items = Vec::new();
    for item in scoped.items {
        let code = super::editor::resolve_auditable(store, &item.auditable)
            .await
            .unwrap()
            .code;
        items.push((code, item.id));
    }
    items.sort();

    Seeded {
        audit: scoped.audit,
        auditor: store.user("usr_auditor").await.unwrap().unwrap(),
        assignee: store.user("usr_owner").await.unwrap().unwrap(),
        item_ids: items.into_iter().map(|(_, id)| id).collect(),
    }
}
