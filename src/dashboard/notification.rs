use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationVariant {
    Default,
    Destructive,
}

/// Toast shown by the webview.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub description: String,
    pub variant: NotificationVariant,
    pub duration_ms: Option<u64>,
}

impl Notification {
    fn build(title: &str, description: impl Into<String>, variant: NotificationVariant) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: description.into(),
            variant,
            duration_ms: None,
        }
    }

    pub fn info(title: &str, description: impl Into<String>) -> Self {
        Self::build(title, description, NotificationVariant::Default)
    }

    pub fn destructive(title: &str, description: impl Into<String>) -> Self {
        Self::build(title, description, NotificationVariant::Destructive)
    }

    pub fn lasting(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}
