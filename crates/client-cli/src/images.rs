//! Image selection for new events: per-file validation and data-URL encoding.

use base64::Engine;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::ImageConfig;
use crate::error::{ConsoleError, Result};

/// A selected image that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePreview {
    /// Locally-unique token used to remove the image again
    pub id: String,
    pub path: PathBuf,
    pub media_type: String,
    pub size: u64,
    /// Displayable reference to the file, valid while the preview exists
    pub preview_url: String,
}

impl ImagePreview {
    pub fn file_name(&self) -> String {
        display_name(&self.path)
    }
}

/// Why one file of a batch was not accepted
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRejection {
    pub path: PathBuf,
    pub reason: String,
}

impl fmt::Display for ImageRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Declared media type of a file, from its extension
pub fn media_type_for(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
    .to_string()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn format_limit(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    if bytes >= MIB {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{} bytes", bytes)
    }
}

fn preview_url(path: &Path) -> String {
    let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    format!("file://{}", absolute.display())
}

/// Ordered set of images picked for a new event
#[derive(Debug, Clone)]
pub struct ImageSelection {
    rules: ImageConfig,
    previews: Vec<ImagePreview>,
}

impl ImageSelection {
    pub fn new(rules: ImageConfig) -> Self {
        Self {
            rules,
            previews: Vec::new(),
        }
    }

    /// Validate and add a batch of files.
    ///
    /// Each file is judged on its own: valid files are accepted in selection
    /// order even when others in the same batch are rejected.
    pub fn add_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Vec<ImageRejection> {
        let mut rejections = Vec::new();

        for path in paths {
            let path = path.as_ref();
            match self.check(path) {
                Ok(preview) => {
                    tracing::debug!("Selected image {} ({} bytes)", preview.file_name(), preview.size);
                    self.previews.push(preview);
                }
                Err(reason) => rejections.push(ImageRejection {
                    path: path.to_path_buf(),
                    reason,
                }),
            }
        }

        rejections
    }

    fn check(&self, path: &Path) -> std::result::Result<ImagePreview, String> {
        let name = display_name(path);

        if self.previews.len() >= self.rules.max_count {
            return Err(format!("Maximum {} images allowed.", self.rules.max_count));
        }

        let media_type = media_type_for(path);
        if !self.rules.allowed_types.iter().any(|t| t == &media_type) {
            return Err(format!("Unsupported format: {} ({})", media_type, name));
        }

        let metadata = std::fs::metadata(path).map_err(|e| format!("Cannot read {}: {}", name, e))?;
        if !metadata.is_file() {
            return Err(format!("Cannot read {}: not a file", name));
        }
        if metadata.len() > self.rules.max_bytes {
            return Err(format!("File {} is too large (max {}).", name, format_limit(self.rules.max_bytes)));
        }

        Ok(ImagePreview {
            id: uuid::Uuid::new_v4().simple().to_string()[..8].to_string(),
            path: path.to_path_buf(),
            media_type,
            size: metadata.len(),
            preview_url: preview_url(path),
        })
    }

    /// Drop a selected image; returns whether it was present
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.previews.len();
        self.previews.retain(|p| p.id != id);
        before != self.previews.len()
    }

    pub fn previews(&self) -> &[ImagePreview] {
        &self.previews
    }

    pub fn len(&self) -> usize {
        self.previews.len()
    }

    pub fn is_empty(&self) -> bool {
        self.previews.is_empty()
    }
}

/// Read and encode every preview as a `data:` URL, concurrently and in order.
/// One unreadable file fails the whole batch.
pub async fn encode_all(previews: &[ImagePreview]) -> Result<Vec<String>> {
    let reads = previews.iter().map(|preview| async move {
        let bytes = tokio::fs::read(&preview.path).await.map_err(|e| {
            ConsoleError::Validation(format!("Failed to read image {}: {}", preview.file_name(), e))
        })?;
        Ok::<_, ConsoleError>(to_data_url(&preview.media_type, &bytes))
    });
    futures::future::try_join_all(reads).await
}

pub fn to_data_url(media_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        media_type,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}
