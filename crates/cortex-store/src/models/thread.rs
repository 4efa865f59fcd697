use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A conversation thread. Owns an ordered sequence of messages; deleting a
/// thread deletes its messages and their tool calls with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub user_id: String,
    /// Optional lab scoping; checked by the authorization seam on mutation.
    pub vlab_id: Option<String>,
    pub project_id: Option<String>,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Thread {
    pub fn new(
        user_id: impl Into<String>,
        vlab_id: Option<String>,
        project_id: Option<String>,
        title: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            vlab_id,
            project_id,
            title: title.unwrap_or_else(|| "New chat".to_string()),
            created_at: now,
            updated_at: now,
        }
    }
}
