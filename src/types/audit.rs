use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Workflow status shared by audits, audit items and data requests
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum WorkflowStatus {
    #[serde(rename = "Unchanged")]
    Unchanged,
    #[default]
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Completed")]
    Completed,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Unchanged => "Unchanged",
            WorkflowStatus::NotStarted => "Not Started",
            WorkflowStatus::InProgress => "In Progress",
            WorkflowStatus::Completed => "Completed",
        }
    }
}

/// How well a control's implementation meets its objective
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Effectiveness {
    #[serde(rename = "Effective")]
    Effective,
    #[serde(rename = "Partially Effective")]
    Partial,
    #[default]
    #[serde(rename = "Not Effective")]
    Ineffective,
    #[serde(rename = "Not Assessed")]
    Unknown,
}

impl Effectiveness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effectiveness::Effective => "Effective",
            Effectiveness::Partial => "Partially Effective",
            Effectiveness::Ineffective => "Not Effective",
            Effectiveness::Unknown => "Not Assessed",
        }
    }
}

/// Whether a control applies to the audited scope
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Applicability {
    #[default]
    #[serde(rename = "Applicable")]
    Applicable,
    #[serde(rename = "Not Applicable")]
    NotApplicable,
    #[serde(rename = "Partially Applicable")]
    PartiallyApplicable,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl Applicability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Applicability::Applicable => "Applicable",
            Applicability::NotApplicable => "Not Applicable",
            Applicability::PartiallyApplicable => "Partially Applicable",
            Applicability::Unknown => "Unknown",
        }
    }
}

/// CSS class used by the report for an enum label: lowercased, spaces removed.
///
/// "Not Started" becomes "notstarted", "Partially Effective" becomes "partiallyeffective".
pub fn css_class(label: &str) -> String {
    label.replace(' ', "").to_lowercase()
}

/// Order control codes the way people read them: "AC-2" before "AC-10".
///
/// Runs of digits compare by value, everything else compares as text. Codes
/// that only differ in leading zeros fall back to plain string order.
pub fn compare_codes(a: &str, b: &str) -> Ordering {
    let (mut left, mut right) = (code_chunks(a), code_chunks(b));
    loop {
        let ord = match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if is_numeric(l) && is_numeric(r) => {
                let (l, r) = (l.trim_start_matches('0'), r.trim_start_matches('0'));
                l.len().cmp(&r.len()).then_with(|| l.cmp(r))
            }
            (Some(l), Some(r)) => l.cmp(r),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
}

/// Split a code into alternating runs of digits and non-digits
fn code_chunks(code: &str) -> impl Iterator<Item = &str> + '_ {
    let mut rest = code;
    std::iter::from_fn(move || {
        let digit = rest.chars().next()?.is_ascii_digit();
        let end = rest
            .find(|c: char| c.is_ascii_digit() != digit)
            .unwrap_or(rest.len());
        let (chunk, tail) = rest.split_at(end);
        rest = tail;
        Some(chunk)
    })
}

fn is_numeric(chunk: &str) -> bool {
    chunk.starts_with(|c: char| c.is_ascii_digit())
}

/// What an audit is scoped against
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditType {
    #[default]
    Standards,
    Implementations,
}

/// A scoped compliance review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Audit {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub audit_type: AuditType,
    pub status: WorkflowStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub manager_id: Option<String>,
    pub created_at: u64,
}

/// Kind of record an audit item points at
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditableType {
    Control,
    Implementation,
}

/// Polymorphic reference from an audit item to the thing being assessed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditableRef {
    #[serde(rename = "type")]
    pub kind: AuditableType,
    pub id: String,
}

/// One auditable's assessment record within an audit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditItem {
    pub id: String,
    pub audit_id: String,
    pub auditable: AuditableRef,
    pub status: WorkflowStatus,
    pub effectiveness: Effectiveness,
    pub applicability: Applicability,
    /// Rich text (HTML) written by the auditor
    #[serde(default)]
    pub auditor_notes: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl AuditItem {
    /// A freshly scoped item with the default evaluation
    pub fn scoped(audit_id: &str, auditable: AuditableRef) -> Self {
        let now = chrono::Utc::now().timestamp() as u64;
        Self {
            id: format!("itm_{}", uuid::Uuid::new_v4().simple()),
            audit_id: audit_id.to_string(),
            auditable,
            status: WorkflowStatus::NotStarted,
            effectiveness: Effectiveness::Ineffective,
            applicability: Applicability::Applicable,
            auditor_notes: None,
            user_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A compliance standard (e.g. "NIST 800-53")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Standard {
    pub id: String,
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A compliance requirement belonging to a standard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Control {
    pub id: String,
    pub code: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub discussion: Option<String>,
    #[serde(default)]
    pub standard_id: Option<String>,
    #[serde(default)]
    pub implementation_ids: Vec<String>,
}

/// How an organisation satisfies one or more controls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Implementation {
    pub id: String,
    pub code: String,
    pub title: String,
    /// Rich text (HTML)
    #[serde(default)]
    pub details: Option<String>,
}
