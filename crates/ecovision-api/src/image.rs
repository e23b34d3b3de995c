//! Image uploads for classification.
//!
//! Files are checked before any network call: the content must be an image
//! and at most [`MAX_IMAGE_BYTES`] long.

use std::path::Path;

use bytes::Bytes;

use crate::errors::{ApiError, Result};

/// Largest accepted upload (5 MiB).
pub const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

/// Magic-byte prefixes of the image formats the backend accepts.
const SIGNATURES: &[(&[u8], &str)] = &[
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"\x89PNG\r\n\x1A\n", "image/png"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"BM", "image/bmp"),
];

/// A validated image ready for upload.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageUpload {
    file_name: String,
    mime: String,
    bytes: Bytes,
}

impl ImageUpload {
    /// Read and validate an image file.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let len = tokio::fs::metadata(path).await?.len();
        check_size(len)?;
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map_or_else(|| "image".to_string(), |n| n.to_string_lossy().into_owned());
        Self::from_bytes(file_name, bytes, None)
    }

    /// Validate in-memory bytes. `mime = None` detects the type.
    pub fn from_bytes(
        file_name: impl Into<String>,
        bytes: impl Into<Bytes>,
        mime: Option<&str>,
    ) -> Result<Self> {
        let file_name = file_name.into();
        let bytes = bytes.into();
        check_size(bytes.len() as u64)?;

        let mime = match mime {
            Some(m) => m.to_ascii_lowercase(),
            None => detect_mime(&file_name, &bytes).ok_or_else(|| {
                ApiError::InvalidImage(format!("{file_name} is not a recognized image"))
            })?,
        };
        if !mime.starts_with("image/") {
            return Err(ApiError::InvalidImage(format!(
                "{file_name} is {mime}, expected an image"
            )));
        }

        Ok(Self {
            file_name,
            mime,
            bytes,
        })
    }

    /// File name sent with the upload.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Content type sent with the upload.
    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// Raw bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }
}

fn check_size(len: u64) -> Result<()> {
    if len > MAX_IMAGE_BYTES {
        return Err(ApiError::InvalidImage(format!(
            "image is {len} bytes, the limit is 5 MiB"
        )));
    }
    Ok(())
}

/// Sniff the content, then fall back to the file extension.
fn detect_mime(file_name: &str, bytes: &[u8]) -> Option<String> {
    if let Some((_, mime)) = SIGNATURES.iter().find(|(sig, _)| bytes.starts_with(sig)) {
        return Some((*mime).to_string());
    }
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("image/webp".to_string());
    }

    let ext = Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "txt" => "text/plain",
        "pdf" => "application/pdf",
        _ => return None,
    };
    Some(mime.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
