//! Selected X-ray image held in memory for one session
//!
//! An upload becomes a [`SelectedImage`] only if it is an image: the declared
//! content type must start with `image/`. When the browser sends no usable
//! type, the leading bytes are sniffed instead.

use base64::{engine::general_purpose, Engine as _};
use serde::Serialize;
use thiserror::Error;

const GENERIC_BINARY: &str = "application/octet-stream";

/// Image selection errors
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Unsupported file type '{0}': please select a valid image file (JPEG, PNG, etc.)")]
    UnsupportedFileType(String),

    #[error("Uploaded file is empty")]
    Empty,
}

/// In-memory image selected for analysis
#[derive(Debug, Clone)]
pub struct SelectedImage {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
    data_url: String,
}

impl SelectedImage {
    /// Validate an upload and read it into memory
    pub fn from_upload(
        file_name: Option<String>,
        declared_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }

        let content_type = match declared_type {
            Some(t) if !t.trim().is_empty() && t != GENERIC_BINARY => t.trim().to_lowercase(),
            _ => infer::get(&bytes)
                .map(|kind| kind.mime_type().to_string())
                .unwrap_or_else(|| GENERIC_BINARY.to_string()),
        };

        if !is_image_type(&content_type) {
            return Err(ImageError::UnsupportedFileType(content_type));
        }

        let data_url = format!(
            "data:{};base64,{}",
            content_type,
            general_purpose::STANDARD.encode(&bytes)
        );

        Ok(Self {
            file_name: file_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "upload".to_string()),
            content_type,
            bytes,
            data_url,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// `data:` URL used as the result's image reference
    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    pub fn summary(&self) -> ImageSummary {
        ImageSummary {
            file_name: self.file_name.clone(),
            content_type: self.content_type.clone(),
            size_bytes: self.bytes.len(),
            data_url: self.data_url.clone(),
        }
    }
}

/// Whether a MIME type names an image
pub fn is_image_type(content_type: &str) -> bool {
    content_type.starts_with("image/")
}

/// Image description returned to the page
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSummary {
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: usize,
    pub data_url: String,
}
