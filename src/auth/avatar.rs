use std::path::Path;

use anyhow::Context;
use tracing::{debug, warn};
use uuid::Uuid;

pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

/// Public prefix the upload directory is served under.
pub const PUBLIC_PREFIX: &str = "/uploads";

pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Writes the image as `<user id>-<uuid>.<ext>` and returns its public path.
pub async fn store_avatar(
    upload_dir: &str,
    user_id: Uuid,
    ext: &str,
    data: &[u8],
) -> anyhow::Result<String> {
    tokio::fs::create_dir_all(upload_dir)
        .await
        .with_context(|| format!("create upload dir {upload_dir}"))?;

    let file = format!("{user_id}-{}.{ext}", Uuid::new_v4());
    let path = Path::new(upload_dir).join(&file);
    tokio::fs::write(&path, data)
        .await
        .with_context(|| format!("write avatar {}", path.display()))?;

    debug!(%user_id, bytes = data.len(), "avatar stored");
    Ok(format!("{PUBLIC_PREFIX}/{file}"))
}

/// Deletes a previously stored avatar. Paths outside the upload prefix (for
/// example provider-hosted images) are left alone.
pub async fn remove_avatar(upload_dir: &str, public_path: &str) {
    let Some(file) = public_path
        .strip_prefix(PUBLIC_PREFIX)
        .and_then(|p| p.strip_prefix('/'))
        .filter(|f| !f.is_empty() && !f.contains('/') && !f.contains(".."))
    else {
        return;
    };
    let path = Path::new(upload_dir).join(file);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => debug!(path = %path.display(), "previous avatar removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(error = %e, path = %path.display(), "previous avatar not removed"),
    }
}
