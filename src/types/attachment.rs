use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};

/// Supported image media types
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImageMediaType {
    #[serde(rename = "image/jpeg")]
    Jpeg,

    #[serde(rename = "image/png")]
    Png,

    #[serde(rename = "image/gif")]
    Gif,

    #[serde(rename = "image/webp")]
    Webp,
}

impl ImageMediaType {
    /// Determine the media type from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageMediaType::Jpeg),
            "png" => Some(ImageMediaType::Png),
            "gif" => Some(ImageMediaType::Gif),
            "webp" => Some(ImageMediaType::Webp),
            _ => None,
        }
    }

    /// The MIME string for this media type.
    pub fn as_mime(&self) -> &'static str {
        match self {
            ImageMediaType::Jpeg => "image/jpeg",
            ImageMediaType::Png => "image/png",
            ImageMediaType::Gif => "image/gif",
            ImageMediaType::Webp => "image/webp",
        }
    }
}

impl std::fmt::Display for ImageMediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_mime())
    }
}

/// An image supplied alongside the user's text for a single turn.
///
/// The image is sent with the submission it is attached to and never replayed with history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Raw image bytes.
    pub data: Vec<u8>,

    /// Declared media type of the bytes.
    pub media_type: ImageMediaType,

    /// Display name, usually the file name.
    pub name: Option<String>,
}

impl Attachment {
    /// Create an attachment from raw bytes.
    pub fn from_bytes(data: Vec<u8>, media_type: ImageMediaType) -> Self {
        Self {
            data,
            media_type,
            name: None,
        }
    }

    /// Create an attachment from a file path.
    ///
    /// The media type is determined from the file extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let media_type = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(ImageMediaType::from_extension)
            .ok_or_else(|| {
                Error::validation(
                    format!(
                        "unsupported attachment {}: must be jpeg, png, gif, or webp",
                        path.display()
                    ),
                    Some("attachment".to_string()),
                )
            })?;

        let mut file = File::open(path)
            .map_err(|err| Error::io(format!("failed to open {}", path.display()), err))?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)
            .map_err(|err| Error::io(format!("failed to read {}", path.display()), err))?;
        if buffer.is_empty() {
            return Err(Error::validation(
                format!("attachment {} is empty", path.display()),
                Some("attachment".to_string()),
            ));
        }

        Ok(Self {
            data: buffer,
            media_type,
            name: path
                .file_name()
                .and_then(|name| name.to_str())
                .map(String::from),
        })
    }

    /// Base64 encoding of the image bytes.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    /// A `data:` URL with the attachment's own media type.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type.as_mime(), self.to_base64())
    }

    /// Size of the image in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the attachment holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Name to show the user.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("(unnamed image)")
    }
}
