use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Default lifetime of presigned URLs, in seconds.
pub const PRESIGNED_URL_EXPIRY_SECS: u64 = 600;

/// Presigned-URL issuance, consumed as an external collaborator. Used only
/// when a tool result is too large to inline into message content.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn get_upload_url(&self, user_id: &str, object_id: &str, expiry_secs: u64)
        -> Result<String>;

    async fn get_download_url(
        &self,
        user_id: &str,
        object_id: &str,
        expiry_secs: u64,
    ) -> Result<String>;
}

/// Move an oversized tool result out-of-band, replacing it with a marker
/// payload that carries the object id and a presigned download URL. Any
/// storage failure keeps the result inline rather than losing it.
pub async fn offload_if_oversized(
    storage: Option<&Arc<dyn ObjectStorage>>,
    http: &reqwest::Client,
    user_id: &str,
    content: String,
    max_inline_bytes: usize,
) -> String {
    let Some(storage) = storage else {
        return content;
    };
    if content.len() <= max_inline_bytes {
        return content;
    }

    let object_id = uuid::Uuid::new_v4().to_string();
    let upload = async {
        let upload_url = storage
            .get_upload_url(user_id, &object_id, PRESIGNED_URL_EXPIRY_SECS)
            .await?;
        http.put(&upload_url)
            .body(content.clone())
            .send()
            .await?
            .error_for_status()?;
        storage
            .get_download_url(user_id, &object_id, PRESIGNED_URL_EXPIRY_SECS)
            .await
    };

    match upload.await {
        Ok(download_url) => serde_json::json!({
            "type": "stored_object",
            "object_id": object_id,
            "download_url": download_url,
        })
        .to_string(),
        Err(e) => {
            tracing::warn!("failed to offload tool result, keeping inline: {}", e);
            content
        }
    }
}
