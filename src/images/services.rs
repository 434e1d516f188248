use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

lazy_static! {
    static ref DATA_URL_RE: Regex =
        Regex::new(r"^data:(image/(?:jpeg|png));base64,(.+)$").unwrap();
}

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("expected a jpeg or png data-URL")]
    NotADataUrl,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// A decoded inline image, ready to be shipped to the judgment service.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Bytes,
}

/// Parse a `data:image/...;base64,...` string as produced by a canvas
/// `toDataURL` call. Only jpeg and png are accepted.
pub fn parse_data_url(raw: &str) -> Result<InlineImage, ImageError> {
    let caps = DATA_URL_RE.captures(raw).ok_or(ImageError::NotADataUrl)?;
    let mime_type = caps[1].to_string();
    let data = BASE64.decode(&caps[2])?;
    Ok(InlineImage {
        mime_type,
        data: Bytes::from(data),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg_url() -> String {
        format!("data:image/jpeg;base64,{}", BASE64.encode(b"fake-jpeg-bytes"))
    }

    #[test]
    fn parses_jpeg_data_url() {
        let img = parse_data_url(&jpeg_url()).expect("jpeg should parse");
        assert_eq!(img.mime_type, "image/jpeg");
        assert_eq!(&img.data[..], b"fake-jpeg-bytes");
    }

    #[test]
    fn parses_png_data_url() {
        let url = format!("data:image/png;base64,{}", BASE64.encode(b"fake-png"));
        let img = parse_data_url(&url).expect("png should parse");
        assert_eq!(img.mime_type, "image/png");
    }

    #[test]
    fn rejects_other_mime_types() {
        let url = format!("data:image/gif;base64,{}", BASE64.encode(b"gif"));
        assert!(matches!(
            parse_data_url(&url),
            Err(ImageError::NotADataUrl)
        ));
    }

    #[test]
    fn rejects_missing_header() {
        let bare = BASE64.encode(b"no header at all");
        assert!(matches!(
            parse_data_url(&bare),
            Err(ImageError::NotADataUrl)
        ));
    }

    #[test]
    fn rejects_invalid_base64() {
        assert!(matches!(
            parse_data_url("data:image/jpeg;base64,@@not-base64@@"),
            Err(ImageError::Base64(_))
        ));
    }
}
