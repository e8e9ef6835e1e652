//! Image references found in manual fields.
//!
//! A field may be empty, hold an embedded `data:` URI, point at a local file
//! (plain path or `file://` URL) or name a remote `http(s)` resource.

use std::io;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::ImageFormat;
use url::Url;

/// Parsed form of an image field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageRef {
    /// The field is empty.
    None,
    /// Image bytes embedded in a `data:` URI.
    Embedded {
        /// Declared media type, e.g. `image/png`.
        media_type: String,
        /// Decoded payload.
        bytes: Vec<u8>,
    },
    /// Image stored on the local file system.
    File(PathBuf),
    /// Image hosted elsewhere; never fetched by this crate.
    Remote(String),
}

/// Why an image field could not be interpreted.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ImageRefError {
    #[error("data URI is missing the ',' separator")]
    MalformedDataUri,
    #[error("only base64 encoded data URIs are supported")]
    NotBase64,
    #[error("data URI payload is not valid base64: {0}")]
    InvalidBase64(String),
    #[error("unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),
}

impl ImageRef {
    /// Interprets the raw field value.
    pub fn parse(value: &str) -> Result<Self, ImageRefError> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(Self::None);
        }

        if let Some(rest) = strip_prefix_ignore_case(value, "data:") {
            return decode_data_uri(rest);
        }

        match Url::parse(value) {
            Ok(url) => match url.scheme() {
                "http" | "https" => Ok(Self::Remote(value.to_owned())),
                "file" => url
                    .to_file_path()
                    .map(Self::File)
                    .map_err(|()| ImageRefError::UnsupportedScheme("file".to_owned())),
                // Windows drive letters parse as single-letter schemes.
                scheme if scheme.len() == 1 => Ok(Self::File(PathBuf::from(value))),
                scheme => Err(ImageRefError::UnsupportedScheme(scheme.to_owned())),
            },
            Err(_) => Ok(Self::File(PathBuf::from(value))),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        value.get(prefix.len()..)
    } else {
        None
    }
}

fn decode_data_uri(rest: &str) -> Result<ImageRef, ImageRefError> {
    let (header, payload) = rest
        .split_once(',')
        .ok_or(ImageRefError::MalformedDataUri)?;
    let mut parts = header.split(';');
    let media_type = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
    if !parts.any(|part| part.trim().eq_ignore_ascii_case("base64")) {
        return Err(ImageRefError::NotBase64);
    }

    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|err| ImageRefError::InvalidBase64(err.to_string()))?;

    Ok(ImageRef::Embedded {
        media_type,
        bytes,
    })
}

/// Builds a `data:` URI for the given image bytes, sniffing the media type.
pub fn to_data_uri(bytes: &[u8]) -> String {
    let media_type = match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        Ok(ImageFormat::Gif) => "image/gif",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(ImageFormat::Bmp) => "image/bmp",
        Ok(ImageFormat::Tiff) => "image/tiff",
        Ok(ImageFormat::Ico) => "image/x-icon",
        _ => "application/octet-stream",
    };
    format!("data:{media_type};base64,{}", STANDARD.encode(bytes))
}

/// Reads an image file and embeds it as a `data:` URI, the way an upload
/// field stores a picked file.
pub fn embed_image_file(path: impl AsRef<Path>) -> io::Result<String> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    if image::guess_format(&bytes).is_err() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} is not a recognised image file", path.display()),
        ));
    }
    Ok(to_data_uri(&bytes))
}
