//! Image references carried by image elements.

use std::fmt;

/// Where an image element's pixels come from.
///
/// The three forms are mutually exclusive and recognized in this order:
/// inline `data:image/...` URLs, `http(s)://` URLs, and everything else as a
/// path relative to the asset storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    /// Inline base64 payload; `format` is the MIME subtype (`png`, `jpeg`, `svg+xml`).
    Base64 { format: String, payload: String },
    /// Remote image, fetched once per render.
    Remote(String),
    /// Storage-relative (or legacy-prefixed) path.
    Local(String),
}

impl ImageRef {
    /// Classify a reference string. Blank strings are no reference at all.
    pub fn parse(reference: &str) -> Option<ImageRef> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }

        if let Some(rest) = reference.strip_prefix("data:image/") {
            let (header, payload) = rest.split_once(',').unwrap_or(("png", ""));
            let format = header.split(';').next().unwrap_or("png").trim();
            let format = if format.is_empty() { "png" } else { format };
            return Some(ImageRef::Base64 {
                format: format.to_ascii_lowercase(),
                payload: payload.to_string(),
            });
        }

        let lower = reference.get(..8).unwrap_or(reference).to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Some(ImageRef::Remote(reference.to_string()));
        }

        Some(ImageRef::Local(reference.to_string()))
    }

    /// True for the forms that allocate a temp file when resolved.
    pub fn needs_temp_file(&self) -> bool {
        !matches!(self, ImageRef::Local(_))
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageRef::Base64 { format, payload } => {
                write!(f, "data:image/{} ({} base64 chars)", format, payload.len())
            }
            ImageRef::Remote(url) => f.write_str(url),
            ImageRef::Local(path) => f.write_str(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url() {
        let r = ImageRef::parse("data:image/jpeg;base64,AAAA").unwrap();
        assert_eq!(
            r,
            ImageRef::Base64 {
                format: "jpeg".into(),
                payload: "AAAA".into()
            }
        );
        assert!(r.needs_temp_file());
    }

    #[test]
    fn test_data_url_without_comma_has_empty_payload() {
        let r = ImageRef::parse("data:image/png;base64").unwrap();
        assert_eq!(
            r,
            ImageRef::Base64 {
                format: "png".into(),
                payload: String::new()
            }
        );
    }

    #[test]
    fn test_remote_and_local() {
        assert_eq!(
            ImageRef::parse("HTTPS://example.com/a.png"),
            Some(ImageRef::Remote("HTTPS://example.com/a.png".into()))
        );
        assert_eq!(
            ImageRef::parse("/uploads/flags/it.png"),
            Some(ImageRef::Local("/uploads/flags/it.png".into()))
        );
        assert!(!ImageRef::parse("logos/a.png").unwrap().needs_temp_file());
    }

    #[test]
    fn test_blank_is_none() {
        assert_eq!(ImageRef::parse("   "), None);
    }

    #[test]
    fn test_display_hides_payload() {
        let r = ImageRef::parse("data:image/png;base64,QUJD").unwrap();
        assert_eq!(r.to_string(), "data:image/png (4 base64 chars)");
    }
}
