//! License photo and signature payloads.
//!
//! Images travel as base64 data URLs (`data:image/png;base64,...`) or bare
//! base64. The format is sniffed from the decoded bytes, never trusted from
//! the data URL prefix.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::ImageFormat;

use crate::constants::{PHOTO_BUCKET, SIGNATURE_BUCKET};
use crate::error::ImageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Photo,
    Signature,
}

impl ImageKind {
    pub fn bucket(&self) -> &'static str {
        match self {
            ImageKind::Photo => PHOTO_BUCKET,
            ImageKind::Signature => SIGNATURE_BUCKET,
        }
    }

    /// Form field the image belongs to.
    pub fn field(&self) -> &'static str {
        match self {
            ImageKind::Photo => "image",
            ImageKind::Signature => "signature",
        }
    }

    /// Object path inside the bucket: `{cnic}/photo_{millis}`.
    pub fn object_path(&self, cnic: &str, timestamp_millis: i64) -> String {
        let stem = match self {
            ImageKind::Photo => "photo",
            ImageKind::Signature => "signature",
        };
        format!("{cnic}/{stem}_{timestamp_millis}")
    }

    fn accepts(&self, format: ImageFormat) -> bool {
        match self {
            ImageKind::Photo => matches!(format, ImageFormat::Jpeg | ImageFormat::Png),
            ImageKind::Signature => format == ImageFormat::Png,
        }
    }

    fn expected(&self) -> &'static str {
        match self {
            ImageKind::Photo => "JPEG or PNG",
            ImageKind::Signature => "PNG",
        }
    }
}

/// Decoded image bytes whose size and format have been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedImage {
    pub kind: ImageKind,
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl CheckedImage {
    pub fn content_type(&self) -> &'static str {
        content_type(self.format)
    }
}

pub fn content_type(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Sniff a stored blob's content type from its first bytes.
pub fn sniff_content_type(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(content_type)
        .unwrap_or("application/octet-stream")
}

/// Strip an optional `data:...;base64,` prefix and decode the rest.
pub fn decode_data_url(input: &str) -> Result<Vec<u8>, ImageError> {
    let payload = match input.split_once(',') {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => input,
    };
    STANDARD
        .decode(payload.trim())
        .map_err(|e| ImageError::InvalidEncoding(e.to_string()))
}

pub fn encode_data_url(bytes: &[u8], format: ImageFormat) -> String {
    format!(
        "data:{};base64,{}",
        content_type(format),
        STANDARD.encode(bytes)
    )
}

/// Data URL for bytes of unknown type, labelled with the sniffed format.
pub fn to_data_url(bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        sniff_content_type(bytes),
        STANDARD.encode(bytes)
    )
}

pub fn check_image(kind: ImageKind, bytes: Vec<u8>, max_size: usize) -> Result<CheckedImage, ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }
    if bytes.len() > max_size {
        return Err(ImageError::TooLarge {
            size: bytes.len(),
            max: max_size,
        });
    }

    let expected = kind.expected();
    let format = image::guess_format(&bytes)
        .map_err(|_| ImageError::UnsupportedFormat { expected })?;
    if !kind.accepts(format) {
        return Err(ImageError::UnsupportedFormat { expected });
    }

    Ok(CheckedImage { kind, bytes, format })
}
