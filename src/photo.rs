use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{AgentError, AgentResult};
use crate::util;


pub const FILE_UPLOAD_LIMIT: usize = (8 * 1024 * 1024 / 3) * 4; // chars
pub const PHOTO_DIR: &str = "reports/";

const ALLOWED_EXTS: &[&str] = &["jpeg", "jpg", "png", "bmp", "webp"];


#[derive(Debug, PartialEq)]
pub struct DecodedPhoto {
    pub bytes: Vec<u8>,
    pub ext: String,
}

impl DecodedPhoto {
    pub fn content_type(&self) -> String {
        match self.ext.as_str() {
            "jpg" => "image/jpeg".into(),
            ext => format!("image/{}", ext),
        }
    }
}


/// Decodes a photo captured with the report. Takes either a data URI
/// (`data:image/png;base64,...`) or bare base64, which is taken as JPEG.
pub fn decode_photo(encoded: &str) -> AgentResult<DecodedPhoto> {
    if encoded.len() > FILE_UPLOAD_LIMIT {
        return Err(AgentError::InvalidPhoto("The file is too large".into()));
    }

    let (ext, b64) = match encoded.strip_prefix("data:") {
        Some(uri) => {
            let (header, b64) = uri.split_once(',')
                .ok_or_else(|| AgentError::InvalidPhoto("Invalid uri".into()))?;

            // Get file extension.
            let ext = header.split('/').nth(1)
                .and_then(|x| x.split(';').next())
                .ok_or_else(|| AgentError::InvalidPhoto("Invalid uri".into()))?;

            (ext.to_ascii_lowercase(), b64)
        },
        None => ("jpeg".to_owned(), encoded),
    };

    if !ALLOWED_EXTS.iter().any(|&x| x == ext) {
        return Err(AgentError::InvalidPhoto(format!("Invalid extension: {}", ext)));
    }

    let bytes = STANDARD.decode(b64.trim())
        .map_err(|err| AgentError::InvalidPhoto(err.to_string()))?;
    if bytes.is_empty() {
        return Err(AgentError::InvalidPhoto("Empty image".into()));
    }

    Ok(DecodedPhoto { bytes, ext })
}

/// Fresh object path for an uploaded photo.
pub fn photo_file_name(ext: &str) -> String {
    format!("{}{}.{}", PHOTO_DIR, util::generate_rand_id(32), ext)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_data_uri() {
        let photo = decode_photo("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(photo.bytes, b"hello");
        assert_eq!(photo.ext, "png");
        assert_eq!(photo.content_type(), "image/png");
    }

    #[test]
    fn bare_base64_is_jpeg() {
        let photo = decode_photo("aGVsbG8=").unwrap();
        assert_eq!(photo.ext, "jpeg");
        assert_eq!(photo.content_type(), "image/jpeg");
    }

    #[test]
    fn jpg_maps_to_jpeg_content_type() {
        let photo = decode_photo("data:image/jpg;base64,aGVsbG8=").unwrap();
        assert_eq!(photo.content_type(), "image/jpeg");
    }

    #[test]
    fn rejects_unknown_extension() {
        let err = decode_photo("data:image/svg+xml;base64,aGVsbG8=").unwrap_err();
        assert!(matches!(err, AgentError::InvalidPhoto(_)));
    }

    #[test]
    fn rejects_broken_base64() {
        assert!(decode_photo("data:image/png;base64,@@@").is_err());
        assert!(decode_photo("data:image/png;base64,").is_err());
        assert!(decode_photo("data:image/png").is_err());
    }

    #[test]
    fn rejects_oversized_payload() {
        let huge = "A".repeat(FILE_UPLOAD_LIMIT + 1);
        assert!(decode_photo(&huge).is_err());
    }

    #[test]
    fn file_names_are_fresh() {
        let a = photo_file_name("png");
        let b = photo_file_name("png");

        assert!(a.starts_with(PHOTO_DIR));
        assert!(a.ends_with(".png"));
        assert_eq!(a.len(), PHOTO_DIR.len() + 32 + 4);
        assert_ne!(a, b);
    }
}
