use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::audit::testing::{seed_audit, Seeded};
use crate::audit::{AssigneeResponses, Logo, ReportRenderer};
use crate::auth::ProviderRegistry;
use crate::config::Config;
use crate::crypt::Encrypter;
use crate::store::GrcStore;
use crate::types::AuditType;
use crate::AppState;

use super::routes::app_router;

fn state_with(config: Config) -> Arc<AppState> {
    let encrypter = Encrypter::from_app_key(&config.app_key).unwrap();
    Arc::new(AppState {
        config,
        store: GrcStore::in_memory(),
        encrypter,
        providers: ProviderRegistry::new(),
        response_hook: Arc::new(AssigneeResponses),
        renderer: ReportRenderer::new().unwrap(),
        logo: Logo::bundled(),
    })
}

async fn seeded_app() -> (Router, Arc<AppState>, Seeded) {
    let state = state_with(Config::for_tests());
    let seeded = seed_audit(&state.store, AuditType::Standards).await;
    (app_router(state.clone()), state, seeded)
}

fn request(method: Method, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("X-User-Id", user);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, req).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let (app, _, _) = seeded_app().await;
    let (status, body) = send_json(&app, request(Method::GET, "/health", None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "memory");
    assert_eq!(body["oauth_providers"], 0);
}

#[tokio::test]
async fn test_unknown_or_missing_user_is_rejected() {
    let (app, _, _) = seeded_app().await;

    let (status, body) = send_json(&app, request(Method::GET, "/users", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");

    let (status, _) =
        send_json(&app, request(Method::GET, "/users", Some("usr_ghost"), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_assignee_options_sorted_by_name() {
    let (app, _, seeded) = seeded_app().await;
    let (status, body) =
        send_json(&app, request(Method::GET, "/users", Some(&seeded.auditor.id), None)).await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Avery Auditor", "Olu Owner"]);
}

#[tokio::test]
async fn test_request_evidence_flow() {
    let (app, _, seeded) = seeded_app().await;
    let item_id = &seeded.item_ids[0];

    let (status, body) = send_json(
        &app,
        request(
            Method::POST,
            &format!("/audit-items/{}/data-requests", item_id),
            Some(&seeded.auditor.id),
            Some(json!({ "user_id": seeded.assignee.id, "details": "Upload the policy PDF" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data_request"]["status"], "Not Started");
    assert_eq!(body["data_request"]["created_by_id"], seeded.auditor.id.as_str());
    assert_eq!(body["data_request"]["assigned_to_id"], seeded.assignee.id.as_str());
    assert_eq!(body["responses"].as_array().unwrap().len(), 1);
    assert_eq!(body["notification"]["title"], "Evidence Requested");

    let (status, view) = send_json(
        &app,
        request(
            Method::GET,
            &format!("/audit-items/{}", item_id),
            Some(&seeded.auditor.id),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let requests = view["data_requests"].as_array().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["assigned_to"], "Olu Owner");
    assert_eq!(requests[0]["created_by"], "Avery Auditor");
    assert_eq!(requests[0]["responses"], 1);

    let (status, inbox) = send_json(
        &app,
        request(Method::GET, "/notifications", Some(&seeded.auditor.id), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(inbox[0]["body"], "The evidence request has been submitted.");
}

#[tokio::test]
async fn test_request_evidence_without_assignee() {
    let (app, _, seeded) = seeded_app().await;

    let (status, body) = send_json(
        &app,
        request(
            Method::POST,
            &format!("/audit-items/{}/data-requests", seeded.item_ids[0]),
            Some(&seeded.auditor.id),
            Some(json!({ "details": "Please upload" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data_request"]["status"], "Not Started");
    assert!(body["data_request"]["assigned_to_id"].is_null());
    assert!(body["responses"][0]["requestee_id"].is_null());
}

#[tokio::test]
async fn test_request_evidence_requires_details() {
    let (app, _, seeded) = seeded_app().await;

    let (status, body) = send_json(
        &app,
        request(
            Method::POST,
            &format!("/audit-items/{}/data-requests", seeded.item_ids[0]),
            Some(&seeded.auditor.id),
            Some(json!({ "user_id": seeded.assignee.id, "details": "" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_failed");
    assert_eq!(body["details"]["field"], "details");
}

#[tokio::test]
async fn test_save_assessment_redirects_to_audit() {
    let (app, state, seeded) = seeded_app().await;
    let item_id = &seeded.item_ids[0];

    let (status, body) = send_json(
        &app,
        request(
            Method::PUT,
            &format!("/audit-items/{}", item_id),
            Some(&seeded.auditor.id),
            Some(json!({ "status": "Completed", "effectiveness": "Effective" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["redirect"], format!("/audits/{}", seeded.audit.id));
    assert_eq!(body["item"]["status"], "Completed");

    let stored = state.store.audit_item(item_id).await.unwrap().unwrap();
    assert_eq!(stored.status, crate::types::WorkflowStatus::Completed);
}

#[tokio::test]
async fn test_report_is_html() {
    let (app, _, seeded) = seeded_app().await;

    let response = app
        .clone()
        .oneshot(request(
            Method::GET,
            &format!("/audits/{}/report", seeded.audit.id),
            Some(&seeded.auditor.id),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/html"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("Audit Controls Summary"));
    assert!(html.contains("AC-1"));
    assert!(html.contains("AC-2"));
}

#[tokio::test]
async fn test_unknown_audit_is_404() {
    let (app, _, seeded) = seeded_app().await;
    let (status, body) = send_json(
        &app,
        request(Method::GET, "/audits/aud_missing", Some(&seeded.auditor.id), None),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_scope_audit_over_http() {
    let (app, _, seeded) = seeded_app().await;
    let (status, body) = send_json(
        &app,
        request(
            Method::POST,
            "/audits",
            Some(&seeded.auditor.id),
            Some(json!({
                "title": "Quarterly check",
                "start_date": "2026-04-01",
                "end_date": "2026-06-30",
                "auditable_ids": ["ctl_ac1"]
            })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["audit"]["audit_type"], "standards");
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["status"], "Not Started");
    assert_eq!(body["items"][0]["applicability"], "Applicable");
}

#[tokio::test]
async fn test_admin_settings_configure_providers() {
    let (app, _, _) = seeded_app().await;
    let settings = json!({
        "auth.google.enabled": true,
        "auth.google.client_id": "google-id",
        "auth.google.client_secret": "google-secret",
        "auth.okta.enabled": false
    });

    // Admin key is required
    let (status, _) = send(
        &app,
        request(Method::PUT, "/admin/settings", None, Some(settings.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut req = request(Method::PUT, "/admin/settings", None, Some(settings));
    req.headers_mut()
        .insert("X-Admin-API-Key", "admin-secret".parse().unwrap());
    let (status, body) = send_json(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["providers"], json!(["google"]));
    assert_eq!(body["updated"].as_array().unwrap().len(), 4);

    let (status, providers) =
        send_json(&app, request(Method::GET, "/auth/providers", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    let google = &providers[0];
    assert_eq!(google["provider"], "google");
    assert_eq!(google["client_id"], "google-id");
    assert_eq!(google["has_client_secret"], true);
    assert_eq!(
        google["redirect"],
        "https://grc.example.com/auth/google/callback"
    );
    assert!(google.get("client_secret").is_none());
}

#[tokio::test]
async fn test_admin_catalog_creation() {
    let (app, _, _) = seeded_app().await;

    let mut req = request(
        Method::POST,
        "/admin/controls",
        None,
        Some(json!({ "code": "AC-3", "title": "Access Enforcement", "standard_id": "std_nist" })),
    );
    req.headers_mut()
        .insert("X-Admin-API-Key", "admin-secret".parse().unwrap());
    let (status, body) = send_json(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["id"].as_str().unwrap().starts_with("ctl_"));

    let mut req = request(
        Method::POST,
        "/admin/controls",
        None,
        Some(json!({ "code": "AC-4", "title": "Flow", "standard_id": "std_missing" })),
    );
    req.headers_mut()
        .insert("X-Admin-API-Key", "admin-secret".parse().unwrap());
    let (status, body) = send_json(&app, req).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"]["field"], "standard_id");
}

#[tokio::test]
async fn test_api_key_guards_everything_but_health() {
    let mut config = Config::for_tests();
    config.api_key = Some("service-key".to_string());
    let state = state_with(config);
    let seeded = seed_audit(&state.store, AuditType::Standards).await;
    let app = app_router(state);

    let (status, _) = send(&app, request(Method::GET, "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        request(Method::GET, "/users", Some(&seeded.auditor.id), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut req = request(Method::GET, "/users", Some(&seeded.auditor.id), None);
    req.headers_mut()
        .insert("X-API-Key", "service-key".parse().unwrap());
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
}
