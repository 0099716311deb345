use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Html,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::audit::editor::{self, Assessment, AssessmentSaved, AuditItemView};
use crate::audit::evidence::{self, EvidenceRequestForm, EvidenceRequested};
use crate::audit::report::load_report_items;
use crate::audit::scoping::{self, AuditOverview, ScopeAudit, ScopedAudit};
use crate::auth::{configure_providers, OAuthProvider, ProviderConfig, RunContext};
use crate::settings;
use crate::types::{Control, GrcError, Implementation, Notification, Standard, User};
use crate::AppState;

use super::middleware::CurrentUser;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub storage: String,
    pub oauth_providers: usize,
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage: if state.store.has_redis() {
            "redis".to_string()
        } else {
            "memory".to_string()
        },
        oauth_providers: state.providers.configured().await.len(),
    })
}

#[derive(Serialize)]
pub struct ProviderEntry {
    pub provider: OAuthProvider,
    #[serde(flatten)]
    pub config: ProviderConfig,
    pub has_client_secret: bool,
}

/// GET /auth/providers
pub async fn list_providers(State(state): State<Arc<AppState>>) -> Json<Vec<ProviderEntry>> {
    let entries = state
        .providers
        .configured()
        .await
        .into_iter()
        .map(|(provider, config)| ProviderEntry {
            provider,
            has_client_secret: config.client_secret.is_some(),
            config,
        })
        .collect();
    Json(entries)
}

#[derive(Serialize)]
pub struct UserOption {
    pub id: String,
    pub name: String,
}

/// GET /users - options for the "Assigned To" select
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
) -> Result<Json<Vec<UserOption>>, GrcError> {
    let mut options: Vec<UserOption> = state
        .store
        .users()
        .await?
        .into_iter()
        .map(|u| UserOption {
            id: u.id,
            name: u.name,
        })
        .collect();
    options.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    Ok(Json(options))
}

/// POST /audits
pub async fn create_audit(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<ScopeAudit>,
) -> Result<(StatusCode, Json<ScopedAudit>), GrcError> {
    info!("Audit scoping requested by {}", user.id);
    let scoped = scoping::scope_audit(&state.store, request).await?;
    Ok((StatusCode::CREATED, Json(scoped)))
}

/// GET /audits/:audit_id
pub async fn get_audit(
    State(state): State<Arc<AppState>>,
    Path(audit_id): Path<String>,
    _user: CurrentUser,
) -> Result<Json<AuditOverview>, GrcError> {
    Ok(Json(scoping::audit_overview(&state.store, &audit_id).await?))
}

/// GET /audits/:audit_id/report
pub async fn get_audit_report(
    State(state): State<Arc<AppState>>,
    Path(audit_id): Path<String>,
    _user: CurrentUser,
) -> Result<Html<String>, GrcError> {
    let audit = state
        .store
        .audit(&audit_id)
        .await?
        .ok_or_else(|| GrcError::not_found("Audit", &audit_id))?;
    let items = load_report_items(&state.store, &audit_id).await?;

    info!("Rendering report for audit {} ({} items)", audit_id, items.len());

    let html = state.renderer.render(
        &audit,
        &items,
        &state.logo,
        chrono::Utc::now().date_naive(),
    )?;
    Ok(Html(html))
}

/// GET /audit-items/:item_id
pub async fn get_audit_item(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<String>,
    _user: CurrentUser,
) -> Result<Json<AuditItemView>, GrcError> {
    Ok(Json(editor::item_view(&state.store, &item_id).await?))
}

/// PUT /audit-items/:item_id
pub async fn update_audit_item(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<String>,
    CurrentUser(user): CurrentUser,
    Json(assessment): Json<Assessment>,
) -> Result<Json<AssessmentSaved>, GrcError> {
    Ok(Json(
        editor::save_assessment(&state.store, &item_id, &user.id, assessment).await?,
    ))
}

/// POST /audit-items/:item_id/data-requests - the "Request Evidence" action
pub async fn request_item_evidence(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<String>,
    CurrentUser(user): CurrentUser,
    Json(form): Json<EvidenceRequestForm>,
) -> Result<(StatusCode, Json<EvidenceRequested>), GrcError> {
    let outcome = evidence::request_evidence(
        &state.store,
        state.response_hook.as_ref(),
        &item_id,
        &user,
        form,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// GET /notifications
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Notification>>, GrcError> {
    Ok(Json(state.store.notifications_for(&user.id).await?))
}

// =============================================================================
// ADMIN ENDPOINTS (protected by ADMIN_API_KEY)
// =============================================================================

fn required(field: &str, label: &str, value: &str) -> Result<String, GrcError> {
    let value = value.trim();
    if value.is_empty() {
        Err(GrcError::validation(
            field,
            format!("The {} field is required.", label),
        ))
    } else {
        Ok(value.to_string())
    }
}

fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub email: Option<String>,
}

/// POST /admin/users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateUser>,
) -> Result<(StatusCode, Json<User>), GrcError> {
    let user = User {
        id: new_id("usr"),
        name: required("name", "Name", &request.name)?,
        email: request.email,
    };
    state.store.put_user(&user).await?;
    info!("Created user {}", user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Deserialize)]
pub struct CreateStandard {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
}

/// POST /admin/standards
pub async fn create_standard(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateStandard>,
) -> Result<(StatusCode, Json<Standard>), GrcError> {
    let standard = Standard {
        id: new_id("std"),
        name: required("name", "Name", &request.name)?,
        code: required("code", "Code", &request.code)?,
        description: request.description,
    };
    state.store.put_standard(&standard).await?;
    info!("Created standard {} ({})", standard.id, standard.code);
    Ok((StatusCode::CREATED, Json(standard)))
}

#[derive(Debug, Deserialize)]
pub struct CreateImplementation {
    pub code: String,
    pub title: String,
    pub details: Option<String>,
}

/// POST /admin/implementations
pub async fn create_implementation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateImplementation>,
) -> Result<(StatusCode, Json<Implementation>), GrcError> {
    let implementation = Implementation {
        id: new_id("imp"),
        code: required("code", "Code", &request.code)?,
        title: required("title", "Title", &request.title)?,
        details: request.details,
    };
    state.store.put_implementation(&implementation).await?;
    info!("Created implementation {} ({})", implementation.id, implementation.code);
    Ok((StatusCode::CREATED, Json(implementation)))
}

#[derive(Debug, Deserialize)]
pub struct CreateControl {
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub discussion: Option<String>,
    pub standard_id: Option<String>,
    #[serde(default)]
    pub implementation_ids: Vec<String>,
}

/// POST /admin/controls
pub async fn create_control(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateControl>,
) -> Result<(StatusCode, Json<Control>), GrcError> {
    if let Some(standard_id) = &request.standard_id {
        if state.store.standard(standard_id).await?.is_none() {
            return Err(GrcError::validation(
                "standard_id",
                "The selected standard is invalid.",
            ));
        }
    }
    for id in &request.implementation_ids {
        if state.store.implementation(id).await?.is_none() {
            return Err(GrcError::validation(
                "implementation_ids",
                format!("Implementation {} does not exist.", id),
            ));
        }
    }

    let control = Control {
        id: new_id("ctl"),
        code: required("code", "Code", &request.code)?,
        title: required("title", "Title", &request.title)?,
        description: request.description,
        discussion: request.discussion,
        standard_id: request.standard_id,
        implementation_ids: request.implementation_ids,
    };
    state.store.put_control(&control).await?;
    info!("Created control {} ({})", control.id, control.code);
    Ok((StatusCode::CREATED, Json(control)))
}

#[derive(Serialize)]
pub struct SettingsUpdated {
    pub updated: Vec<String>,
    pub providers: Vec<OAuthProvider>,
}

/// PUT /admin/settings - write settings and rebuild the OAuth provider registry
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(values): Json<BTreeMap<String, serde_json::Value>>,
) -> Result<Json<SettingsUpdated>, GrcError> {
    let updated = settings::write_settings(&state.store, &state.encrypter, &values).await?;
    let providers = configure_providers(
        RunContext::Web,
        &state.store,
        &state.encrypter,
        &state.config.app_url,
        &state.providers,
    )
    .await?;

    Ok(Json(SettingsUpdated { updated, providers }))
}
