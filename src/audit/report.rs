use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::NaiveDate;
use handlebars::{
    Context, Handlebars, Helper, HelperResult, Output, RenderContext as HbRenderContext,
};
use serde::Serialize;
use std::path::Path;
use tokio::fs;
use tracing::info;

use crate::store::GrcStore;
use crate::types::{compare_codes, css_class, Audit, AuditItem, GrcError};

use super::editor::{resolve_auditable, ResolvedAuditable};

const REPORT_TEMPLATE: &str = include_str!("../../templates/audit_report.hbs");
const BUNDLED_LOGO: &[u8] = include_bytes!("../../assets/logo.svg");

/// Image embedded on the report cover
#[derive(Debug, Clone)]
pub struct Logo {
    mime: &'static str,
    data: Vec<u8>,
}

impl Logo {
    pub fn bundled() -> Self {
        Self {
            mime: "image/svg+xml",
            data: BUNDLED_LOGO.to_vec(),
        }
    }

    /// Read a logo from disk; the mime type follows the file extension
    pub async fn from_path(path: &Path) -> Result<Self, GrcError> {
        let data = fs::read(path).await.map_err(|e| {
            GrcError::Report(format!("Failed to read logo {}: {}", path.display(), e))
        })?;
        info!("Loaded report logo from {}", path.display());
        Ok(Self {
            mime: mime_for(path),
            data,
        })
    }

    /// `data:` URI with the image inlined as base64
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.data))
    }
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// An item together with the auditable it assesses
#[derive(Debug, Clone)]
pub struct ReportItem {
    pub item: AuditItem,
    pub auditable: ResolvedAuditable,
}

/// Load an audit's items for the report, in control-code order
pub async fn load_report_items(
    store: &GrcStore,
    audit_id: &str,
) -> Result<Vec<ReportItem>, GrcError> {
    let mut items = Vec::new();
    for item in store.audit_items(audit_id).await? {
        let auditable = resolve_auditable(store, &item.auditable).await?;
        items.push(ReportItem { item, auditable });
    }
    items.sort_by(|a, b| {
        compare_codes(&a.auditable.code, &b.auditable.code).then(a.item.id.cmp(&b.item.id))
    });
    Ok(items)
}

#[derive(Serialize)]
struct AuditContext<'a> {
    title: &'a str,
    start_date: String,
    end_date: String,
}

#[derive(Serialize)]
struct ItemContext<'a> {
    code: &'a str,
    title: &'a str,
    status: &'static str,
    applicability: &'static str,
    effectiveness: &'static str,
    standard: Option<&'a str>,
    description: Option<&'a str>,
    auditor_notes: Option<&'a str>,
    implementations: Vec<&'a str>,
}

#[derive(Serialize)]
struct ReportContext<'a> {
    audit: AuditContext<'a>,
    logo_src: String,
    created_on: String,
    items: Vec<ItemContext<'a>>,
}

/// Renders audit reports to printable HTML
pub struct ReportRenderer {
    handlebars: Handlebars<'static>,
}

impl ReportRenderer {
    pub fn new() -> Result<Self, GrcError> {
        let mut handlebars = Handlebars::new();
        // Optional fields are always present (as null), so a miss is a template typo
        handlebars.set_strict_mode(true);
        handlebars.register_helper("css_class", Box::new(css_class_helper));
        handlebars.register_template_string("audit_report", REPORT_TEMPLATE)?;
        Ok(Self { handlebars })
    }

    /// Cover page, summary table and one detail table per item.
    ///
    /// Text is escaped; control descriptions, auditor notes and implementation
    /// details are rich text and are emitted as-is.
    pub fn render(
        &self,
        audit: &Audit,
        items: &[ReportItem],
        logo: &Logo,
        created_on: NaiveDate,
    ) -> Result<String, GrcError> {
        let context = ReportContext {
            audit: AuditContext {
                title: &audit.title,
                start_date: audit.start_date.format("%Y-%m-%d").to_string(),
                end_date: audit.end_date.format("%Y-%m-%d").to_string(),
            },
            logo_src: logo.data_uri(),
            created_on: created_on.format("%Y-%m-%d").to_string(),
            items: items
                .iter()
                .map(|r| ItemContext {
                    code: &r.auditable.code,
                    title: &r.auditable.title,
                    status: r.item.status.as_str(),
                    applicability: r.item.applicability.as_str(),
                    effectiveness: r.item.effectiveness.as_str(),
                    standard: r.auditable.standard.as_deref(),
                    description: r.auditable.description.as_deref(),
                    auditor_notes: r.item.auditor_notes.as_deref(),
                    implementations: r
                        .auditable
                        .implementations
                        .iter()
                        .filter_map(|i| i.details.as_deref())
                        .collect(),
                })
                .collect(),
        };

        Ok(self.handlebars.render("audit_report", &context)?)
    }
}

fn css_class_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut HbRenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let label = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
    out.write(&css_class(label))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::editor::{save_assessment, Assessment};
    use crate::audit::testing::seed_audit;
    use crate::types::{AuditType, Effectiveness, WorkflowStatus};

    fn created_on() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, 1).unwrap()
    }

    fn section<'a>(html: &'a str, start: &str, end: &str) -> &'a str {
        let from = html.find(start).unwrap() + start.len();
        let to = from + html[from..].find(end).unwrap();
        &html[from..to]
    }

    #[tokio::test]
    async fn test_empty_audit_renders_header_only_summary() {
        let store = GrcStore::in_memory();
        let seeded = seed_audit(&store, AuditType::Standards).await;
        let renderer = ReportRenderer::new().unwrap();

        let html = renderer
            .render(&seeded.audit, &[], &Logo::bundled(), created_on())
            .unwrap();

        assert!(html.contains("<th>Control</th>"));
        assert!(html.contains("<th>Status</th>"));
        assert!(html.contains("<th>Applicability</th>"));
        assert!(html.contains("<th>Effectiveness</th>"));
        let body = section(&html, "<tbody>", "</tbody>");
        assert!(!body.contains("<tr>"));
        assert!(!html.contains("Auditor Notes"));
    }

    #[tokio::test]
    async fn test_items_render_with_css_classes() {
        let store = GrcStore::in_memory();
        let seeded = seed_audit(&store, AuditType::Standards).await;
        save_assessment(
            &store,
            &seeded.item_ids[0],
            &seeded.auditor.id,
            Assessment {
                status: Some(WorkflowStatus::InProgress),
                effectiveness: Some(Effectiveness::Partial),
                auditor_notes: Some("<p>Policy is <em>outdated</em></p>".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let items = load_report_items(&store, &seeded.audit.id).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].auditable.code, "AC-1");

        let html = ReportRenderer::new()
            .unwrap()
            .render(&seeded.audit, &items, &Logo::bundled(), created_on())
            .unwrap();

        let body = section(&html, "<tbody>", "</tbody>");
        assert_eq!(body.matches("<tr>").count(), 2);
        assert!(body.contains(r#"<td class="inprogress">In Progress</td>"#));
        assert!(body.contains(r#"<td class="partiallyeffective">Partially Effective</td>"#));
        assert!(body.contains(r#"<td class="notstarted">Not Started</td>"#));
        assert!(body.contains(r#"<td class="noteffective">Not Effective</td>"#));
        assert!(body.contains(r#"<td class="applicable">Applicable</td>"#));
        assert!(body.find("AC-1").unwrap() < body.find("AC-2").unwrap());

        // rich text is raw, plain text is escaped
        assert!(html.contains("<p>Policy is <em>outdated</em></p>"));
        assert!(html.contains("<p>All staff sign in through Okta with MFA.</p>"));
        assert!(html.contains("Policy &amp; Procedures"));
        assert!(html.contains("NIST 800-53"));
    }

    #[tokio::test]
    async fn test_strict_template_accepts_missing_optionals() {
        let store = GrcStore::in_memory();
        let seeded = seed_audit(&store, AuditType::Implementations).await;
        let renderer = ReportRenderer::new().unwrap();
        assert!(renderer.handlebars.strict_mode());

        // No standard, no notes and no implementations on this item
        let items = load_report_items(&store, &seeded.audit.id).await.unwrap();
        assert!(items[0].auditable.standard.is_none());
        assert!(items[0].item.auditor_notes.is_none());

        let html = renderer
            .render(&seeded.audit, &items, &Logo::bundled(), created_on())
            .unwrap();
        assert!(html.contains("IMP-1"));
        assert!(html.contains("Auditor Notes"));
    }

    #[tokio::test]
    async fn test_cover_and_layout() {
        let store = GrcStore::in_memory();
        let seeded = seed_audit(&store, AuditType::Standards).await;

        let html = ReportRenderer::new()
            .unwrap()
            .render(&seeded.audit, &[], &Logo::bundled(), created_on())
            .unwrap();

        assert!(html.contains("<b>AUDIT REPORT</b>"));
        assert!(html.contains("<b>CONFIDENTIAL</b>"));
        assert!(html.contains("Created on 2026-07-01"));
        assert!(html.contains("<h2>FY26 Access Review</h2>"));
        assert!(html.contains("Audit Date: 2026-01-01 - 2026-06-30"));
        assert!(html.contains(r#"src="data:image/svg+xml;base64,"#));
        assert_eq!(html.matches(r#"<div class="page-break"></div>"#).count(), 2);
    }

    #[test]
    fn test_logo_data_uri_and_mime() {
        let uri = Logo::bundled().data_uri();
        let encoded = uri.strip_prefix("data:image/svg+xml;base64,").unwrap();
        let decoded = STANDARD.decode(encoded).unwrap();
        assert!(String::from_utf8(decoded).unwrap().contains("<svg"));

        assert_eq!(mime_for(Path::new("public/img/logo.PNG")), "image/png");
        assert_eq!(mime_for(Path::new("logo.jpeg")), "image/jpeg");
        assert_eq!(mime_for(Path::new("logo")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_missing_logo_file_is_an_error() {
        let result = Logo::from_path(Path::new("/nonexistent/logo.png")).await;
        assert!(matches!(result, Err(GrcError::Report(_))));
    }
}
