//! Upload validation: allowed image formats and the size ceiling.

use axum::body::Bytes;
use thiserror::Error;

use super::AnalysisError;

/// Image formats the gateway knows how to label for the vision model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageFormat {
    /// `ext` is expected lowercase and without the leading dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown image extension: {0}")]
pub struct UnknownExtension(pub String);

/// A file received from the client, not yet validated.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub bytes: Bytes,
}

impl ImageUpload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// Allow-set of extensions plus the maximum accepted byte length.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    // Kept in configuration order so error messages are stable.
    allowed: Vec<(String, ImageFormat)>,
    max_bytes: usize,
}

impl UploadPolicy {
    /// Extensions may be given with or without a leading dot, in any case.
    pub fn new<S: AsRef<str>>(extensions: &[S], max_bytes: usize) -> Result<Self, UnknownExtension> {
        let mut allowed: Vec<(String, ImageFormat)> = Vec::with_capacity(extensions.len());

        for raw in extensions {
            let ext = normalize_extension(raw.as_ref());
            let format =
                ImageFormat::from_extension(&ext).ok_or_else(|| UnknownExtension(ext.clone()))?;
            if !allowed.iter().any(|(e, _)| *e == ext) {
                allowed.push((ext, format));
            }
        }

        Ok(Self { allowed, max_bytes })
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn allowed_extensions(&self) -> Vec<&str> {
        self.allowed.iter().map(|(e, _)| e.as_str()).collect()
    }

    /// Resolve the image format from the filename's extension.
    ///
    /// The extension is whatever follows the last `.`; a name without a dot
    /// has no extension and is always rejected.
    pub fn check_type(&self, filename: &str) -> Result<ImageFormat, AnalysisError> {
        let filename = filename.to_ascii_lowercase();
        let ext = filename.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");

        self.allowed
            .iter()
            .find(|(allowed, _)| allowed == ext)
            .map(|(_, format)| *format)
            .ok_or_else(|| AnalysisError::UnsupportedType {
                allowed: self.allowed_extensions().join(", "),
            })
    }

    pub fn check_size(&self, len: usize) -> Result<(), AnalysisError> {
        if len > self.max_bytes {
            return Err(self.too_large());
        }
        Ok(())
    }

    pub fn too_large(&self) -> AnalysisError {
        AnalysisError::PayloadTooLarge {
            limit: human_size(self.max_bytes),
        }
    }
}

fn normalize_extension(raw: &str) -> String {
    raw.trim().trim_start_matches('.').to_ascii_lowercase()
}

fn human_size(bytes: usize) -> String {
    const KIB: usize = 1024;
    const MIB: usize = 1024 * 1024;

    if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else if bytes >= KIB && bytes % KIB == 0 {
        format!("{}KB", bytes / KIB)
    } else {
        format!("{} bytes", bytes)
    }
}
