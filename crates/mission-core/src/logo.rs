//! Mission logos are stored inline as `data:` URIs.

use std::fs;
use std::path::Path;

use anyhow::{Context, anyhow};
use base64::{Engine as _, engine::general_purpose};

pub fn data_uri(mime: &str, bytes: &[u8]) -> anyhow::Result<String> {
    let mime = mime.trim().to_ascii_lowercase();
    if !mime.starts_with("image/") {
        return Err(anyhow!("logo must be an image, got {mime:?}"));
    }
    Ok(format!(
        "data:{mime};base64,{}",
        general_purpose::STANDARD.encode(bytes)
    ))
}

/// MIME type guessed from the file extension.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "svg" => Some("image/svg+xml"),
        "webp" => Some("image/webp"),
        "ico" => Some("image/x-icon"),
        _ => None,
    }
}

#[tracing::instrument]
pub fn read_logo(path: &Path) -> anyhow::Result<String> {
    let mime = mime_for_path(path)
        .ok_or_else(|| anyhow!("{} is not a recognised image file", path.display()))?;
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    data_uri(mime, &bytes)
}
