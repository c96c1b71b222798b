use anyhow::Context;
use tracing::warn;

use crate::state::AppState;
use crate::users::dto::ImageUpload;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Writes the avatar of `code` to the upload area and returns its public URL
/// together with the object key. Re-uploads with the same extension replace
/// the previous file in place.
pub async fn store_avatar(
    st: &AppState,
    code: &str,
    img: ImageUpload,
) -> anyhow::Result<(String, String)> {
    let content_type = img.content_type.as_deref().unwrap_or(FALLBACK_CONTENT_TYPE);
    let key = object_key(code, img.file_name.as_deref(), content_type);
    st.storage
        .put_object(&key, img.body, content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;
    Ok((st.storage.public_url(&key), key))
}

/// Deletes the file behind `previous_url` unless the record, as persisted,
/// still refers to that same object. Failures are only logged.
pub async fn remove_stale(st: &AppState, previous_url: &str, current_url: &str) {
    let Some(old_key) = st.storage.key_from_url(previous_url) else {
        return;
    };
    if st.storage.key_from_url(current_url).as_deref() == Some(old_key.as_str()) {
        return;
    }
    if let Err(e) = st.storage.delete_object(&old_key).await {
        warn!(error = ?e, key = %old_key, "failed to remove stale image");
    }
}

pub fn object_key(code: &str, file_name: Option<&str>, content_type: &str) -> String {
    match file_name
        .and_then(ext_from_file_name)
        .or_else(|| ext_from_mime(content_type).map(str::to_string))
    {
        Some(ext) => format!("{}.{}", code, ext),
        None => code.to_string(),
    }
}

fn ext_from_file_name(name: &str) -> Option<String> {
    let ext = std::path::Path::new(name).extension()?.to_str()?;
    (!ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then(|| ext.to_ascii_lowercase())
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}
