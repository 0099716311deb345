use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Severity shown alongside a notification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Info,
    Warning,
    Danger,
}

/// User-visible notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub level: NotificationLevel,
    pub title: String,
    pub body: String,
    pub created_at: u64,
}

impl Notification {
    pub fn new(user_id: &str, level: NotificationLevel, title: &str, body: &str) -> Self {
        Self {
            id: format!("ntf_{}", uuid::Uuid::new_v4().simple()),
            user_id: user_id.to_string(),
            level,
            title: title.to_string(),
            body: body.to_string(),
            created_at: chrono::Utc::now().timestamp() as u64,
        }
    }
}
