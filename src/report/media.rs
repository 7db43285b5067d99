//! Media staged on a report form before upload.

use std::path::Path;
use tracing::debug;

use crate::error::ClientError;

/// A file selected or dropped by the user, held in memory until upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl MediaFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension.
    pub async fn from_path(path: &Path) -> Result<Self, ClientError> {
        let data = tokio::fs::read(path).await.map_err(|e| {
            ClientError::Storage(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        Ok(Self {
            file_name,
            content_type,
            data,
        })
    }

    /// Only images and videos may be attached to a report
    pub fn is_accepted(&self) -> bool {
        let ct = self.content_type.to_ascii_lowercase();
        ct.starts_with("image/") || ct.starts_with("video/")
    }

    pub fn size_kb(&self) -> usize {
        (self.data.len() + 512) / 1024
    }
}

/// Ordered list of staged files. Files are appended in the order they arrive,
/// from a picker or a drop; two files with the same name are both kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedMedia {
    files: Vec<MediaFile>,
}

impl StagedMedia {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the accepted files and return how many were rejected.
    pub fn stage(&mut self, files: impl IntoIterator<Item = MediaFile>) -> usize {
        let mut rejected = 0;
        for file in files {
            if file.is_accepted() {
                self.files.push(file);
            } else {
                debug!(
                    file = %file.file_name,
                    content_type = %file.content_type,
                    "Skipping non-media file"
                );
                rejected += 1;
            }
        }
        rejected
    }

    /// Remove the file at `index`, if there is one.
    pub fn remove(&mut self, index: usize) -> Option<MediaFile> {
        if index < self.files.len() {
            Some(self.files.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn files(&self) -> &[MediaFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
