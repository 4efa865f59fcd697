use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use axum::http::HeaderMap;

/// Identity established by the authentication collaborator.
#[derive(Debug, Clone)]
pub struct UserIdentity {
    pub user_id: String,
    /// Slash-delimited group paths, e.g. `/vlab/<id>/project/<id>/admin`.
    pub groups: Vec<String>,
}

/// Authentication is consumed as a black box. `None` is terminal: the
/// request gets a 401 and no further work happens.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, headers: &HeaderMap) -> Option<UserIdentity>;
}

/// Trusts `x-user-id` / `x-user-groups` headers as set by an upstream
/// gateway. Suitable behind a terminating proxy, and for tests.
pub struct HeaderAuthenticator;

#[async_trait]
impl Authenticator for HeaderAuthenticator {
    async fn authenticate(&self, headers: &HeaderMap) -> Option<UserIdentity> {
        let user_id = headers.get("x-user-id")?.to_str().ok()?.to_string();
        if user_id.is_empty() {
            return None;
        }
        let groups = headers
            .get("x-user-groups")
            .and_then(|v| v.to_str().ok())
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Some(UserIdentity { user_id, groups })
    }
}

fn group_has_segment(group: &str, wanted: &str) -> bool {
    group.split('/').any(|segment| segment == wanted)
}

/// Check that the identity's groups grant access to the given lab/project
/// scope. Matching is by exact path segment: an id that merely appears as a
/// substring of a longer segment does not pass.
pub fn authorize_project_scope(
    identity: &UserIdentity,
    vlab_id: Option<&str>,
    project_id: Option<&str>,
) -> ApiResult<()> {
    let mut wanted: Vec<&str> = Vec::new();
    if let Some(vlab_id) = vlab_id {
        wanted.push(vlab_id);
    }
    if let Some(project_id) = project_id {
        wanted.push(project_id);
    }
    if wanted.is_empty() {
        return Ok(());
    }

    let granted = identity
        .groups
        .iter()
        .any(|group| wanted.iter().all(|id| group_has_segment(group, id)));

    if granted {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "no group grants access to scope {}",
            wanted.join("/")
        )))
    }
}
