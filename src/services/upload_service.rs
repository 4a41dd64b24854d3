use std::path::{Path, PathBuf};

use crate::utils::{AppError, AppResult};

/// Largest accepted image, in bytes.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
/// URL prefix the upload directory is served under.
pub const PUBLIC_PREFIX: &str = "/uploads";
const RECIPE_DIR: &str = "recipes";

/// An image file received with a recipe form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Only JPEG and PNG are accepted.
pub fn extension_for(content_type: &str) -> AppResult<&'static str> {
    match content_type.trim().to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Ok("jpg"),
        "image/png" => Ok("png"),
        _ => Err(AppError::validation("Only JPEG and PNG images are allowed")),
    }
}

/// Recipe images on local disk.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        UploadStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_dirs(&self) -> AppResult<()> {
        tokio::fs::create_dir_all(self.root.join(RECIPE_DIR)).await?;
        Ok(())
    }

    /// Writes the image and returns its public path.
    pub async fn save_recipe_image(&self, upload: &ImageUpload) -> AppResult<String> {
        let extension = extension_for(&upload.content_type)?;
        if upload.bytes.is_empty() {
            return Err(AppError::validation("Image file is empty"));
        }
        if upload.bytes.len() > MAX_IMAGE_BYTES {
            return Err(AppError::validation("Image must be 5MB or smaller"));
        }

        let file_name = format!(
            "{}-{}.{}",
            chrono::Utc::now().timestamp_millis(),
            uuid::Uuid::new_v4(),
            extension
        );
        self.ensure_dirs().await?;
        tokio::fs::write(self.root.join(RECIPE_DIR).join(&file_name), &upload.bytes).await?;

        log::info!("📷 Stored recipe image {} ({} bytes)", file_name, upload.bytes.len());
        Ok(format!("{}/{}/{}", PUBLIC_PREFIX, RECIPE_DIR, file_name))
    }

    /// Maps a stored public path back to disk. Anything outside the recipe
    /// directory is refused.
    fn disk_path(&self, public_path: &str) -> Option<PathBuf> {
        let prefix = format!("{}/{}/", PUBLIC_PREFIX, RECIPE_DIR);
        let file_name = public_path.strip_prefix(&prefix)?;
        if file_name.is_empty() || file_name.contains('/') || file_name.contains("..") {
            return None;
        }
        Some(self.root.join(RECIPE_DIR).join(file_name))
    }

    /// Best effort. A missing file is not an error.
    pub async fn remove(&self, public_path: &str) {
        let Some(path) = self.disk_path(public_path) else {
            log::warn!("⚠️ Refusing to remove {}", public_path);
            return;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => log::info!("🗑️  Removed image {}", public_path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("⚠️ Could not remove {}: {}", path.display(), e),
        }
    }
}
