//! # Resource Resolver
//!
//! Turns an [`ImageRef`] into a file on local disk that a backend can read.
//!
//! | Reference            | Result                                     |
//! |----------------------|--------------------------------------------|
//! | `data:image/...`     | decoded into `img_<uuid>.<fmt>` (temp)     |
//! | `http(s)://...`      | downloaded into `download_<uuid><ext>` (temp) |
//! | anything else        | existing file under the storage root       |
//!
//! Temp files are owned by the returned [`ResolvedImage`] and removed when it
//! is dropped, so a render call never leaks them, even on an early return.
//! [`sweep`] is the backstop for processes that die mid-render.

pub mod sweep;

use base64::Engine;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::RenderConfig;
use crate::document::ImageRef;
use crate::error::FlotillaError;

/// File name prefixes of the temp files this module creates.
pub(crate) const TEMP_PREFIXES: [&str; 2] = ["img_", "download_"];

/// Why an image reference produced no usable file.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("base64 payload is empty")]
    EmptyPayload,

    #[error("base64 payload is invalid: {0}")]
    InvalidBase64(String),

    #[error("download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    #[error("no file found for '{0}'")]
    NotFound(String),

    #[error("could not write temp file: {0}")]
    TempWrite(#[from] io::Error),
}

// ============================================================================
// RESOLVED FILES
// ============================================================================

/// A temp file deleted when dropped.
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    fn create(dir: &Path, name: String, bytes: &[u8]) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(name);
        fs::write(&path, bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "temp file created");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "temp file removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove temp file"),
        }
    }
}

/// A readable image file.
#[derive(Debug)]
pub enum ResolvedImage {
    /// An existing asset; nothing to clean up.
    Local(PathBuf),
    /// A file this resolver created for the current render.
    Temp(TempFile),
}

impl ResolvedImage {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedImage::Local(path) => path,
            ResolvedImage::Temp(file) => file.path(),
        }
    }

    pub fn is_temp(&self) -> bool {
        matches!(self, ResolvedImage::Temp(_))
    }

    pub fn read(&self) -> io::Result<Vec<u8>> {
        fs::read(self.path())
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Resolves image references against one storage root.
///
/// Holds a blocking HTTP client; build one per process (or per export) and
/// share it across render calls.
pub struct ResourceResolver {
    storage_root: PathBuf,
    legacy_prefixes: Vec<String>,
    asset_subfolders: Vec<String>,
    temp_dir: PathBuf,
    client: reqwest::blocking::Client,
}

impl ResourceResolver {
    pub fn new(config: &RenderConfig) -> Result<Self, FlotillaError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.http.user_agent.clone())
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| FlotillaError::Resource(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            storage_root: config.storage_root.clone(),
            legacy_prefixes: config.legacy_prefixes.clone(),
            asset_subfolders: config.asset_subfolders.clone(),
            temp_dir: config.temp_dir.clone(),
            client,
        })
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Resolve a reference to a readable file.
    pub fn resolve(&self, reference: &ImageRef) -> Result<ResolvedImage, ResolveError> {
        let resolved = match reference {
            ImageRef::Base64 { format, payload } => self.decode_base64(format, payload),
            ImageRef::Remote(url) => self.download(url),
            ImageRef::Local(path) => self.find_local(path),
        };
        match &resolved {
            Ok(image) => debug!(reference = %reference, path = %image.path().display(), "image resolved"),
            Err(e) => warn!(reference = %reference, error = %e, "image unresolved"),
        }
        resolved
    }

    fn decode_base64(&self, format: &str, payload: &str) -> Result<ResolvedImage, ResolveError> {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(ResolveError::EmptyPayload);
        }
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| ResolveError::InvalidBase64(e.to_string()))?;

        let name = format!("img_{}.{}", Uuid::new_v4(), file_extension(format));
        Ok(ResolvedImage::Temp(TempFile::create(
            &self.temp_dir,
            name,
            &bytes,
        )?))
    }

    /// Single attempt; any failure leaves the reference unresolved.
    fn download(&self, url: &str) -> Result<ResolvedImage, ResolveError> {
        let failed = |reason: String| ResolveError::Download {
            url: url.to_string(),
            reason,
        };

        let response = self.client.get(url).send().map_err(|e| failed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {}", status)));
        }
        let bytes = response.bytes().map_err(|e| failed(e.to_string()))?;

        let name = format!("download_{}{}", Uuid::new_v4(), url_extension(url));
        Ok(ResolvedImage::Temp(TempFile::create(
            &self.temp_dir,
            name,
            &bytes,
        )?))
    }

    fn find_local(&self, raw: &str) -> Result<ResolvedImage, ResolveError> {
        self.candidates(raw)
            .into_iter()
            .find(|p| p.is_file())
            .map(ResolvedImage::Local)
            .ok_or_else(|| ResolveError::NotFound(raw.to_string()))
    }

    /// Where a stored path should live under the canonical root.
    pub fn storage_path(&self, raw: &str) -> PathBuf {
        for prefix in &self.legacy_prefixes {
            if let Some(rest) = raw.strip_prefix(prefix.as_str()) {
                return self.storage_root.join(rest);
            }
        }

        let path = Path::new(raw);
        let root = strip_cur_dir(&self.storage_root);
        if path.is_absolute() || strip_cur_dir(path).starts_with(root) {
            path.to_path_buf()
        } else {
            self.storage_root.join(strip_cur_dir(path))
        }
    }

    /// Probe order for a storage path: canonical location, the raw string,
    /// then the basename in the root and in each asset subfolder.
    fn candidates(&self, raw: &str) -> Vec<PathBuf> {
        let mut out = vec![self.storage_path(raw), PathBuf::from(raw)];
        if let Some(name) = Path::new(raw).file_name() {
            out.push(self.storage_root.join(name));
            for sub in &self.asset_subfolders {
                out.push(self.storage_root.join(sub).join(name));
            }
        }
        out.dedup();
        out
    }
}

fn strip_cur_dir(path: &Path) -> &Path {
    path.strip_prefix(".").unwrap_or(path)
}

/// File extension for a data URL's MIME subtype.
fn file_extension(format: &str) -> String {
    match format {
        "svg+xml" => "svg".to_string(),
        f if !f.is_empty() && f.chars().all(|c| c.is_ascii_alphanumeric()) => f.to_string(),
        _ => "png".to_string(),
    }
}

/// Extension (with the dot) taken from the last path segment of a URL.
fn url_extension(url: &str) -> String {
    let segment = reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.path_segments().and_then(|s| s.last().map(str::to_string)));

    segment
        .as_deref()
        .and_then(|s| s.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_else(|| ".png".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(root: &Path) -> ResourceResolver {
        ResourceResolver::new(&RenderConfig::isolated(root)).unwrap()
    }

    fn temp_entries(dir: &Path) -> usize {
        fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    /// Answer exactly one HTTP request on a local port. The handle yields
    /// the request head as received.
    fn serve_once(
        status: &'static str,
        body: &'static [u8],
    ) -> (String, std::thread::JoinHandle<String>) {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            write!(
                stream,
                "HTTP/1.1 {}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            )
            .unwrap();
            stream.write_all(body).unwrap();
            stream.flush().unwrap();
            String::from_utf8_lossy(&head).into_owned()
        });
        (base, handle)
    }

    #[test]
    fn test_base64_round_trip_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolver(dir.path());
        let payload = b"\x89PNG not really an image";
        let encoded = base64::engine::general_purpose::STANDARD.encode(payload);

        let resolved = r
            .resolve(&ImageRef::Base64 {
                format: "png".into(),
                payload: encoded,
            })
            .unwrap();
        assert!(resolved.is_temp());
        let name = resolved.path().file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("img_") && name.ends_with(".png"));
        assert_eq!(resolved.read().unwrap(), payload.to_vec());

        let path = resolved.path().to_path_buf();
        drop(resolved);
        assert!(!path.exists());
        assert_eq!(temp_entries(r.temp_dir()), 0);
    }

    #[test]
    fn test_svg_payload_gets_svg_extension() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolver(dir.path());
        let resolved = r
            .resolve(&ImageRef::Base64 {
                format: "svg+xml".into(),
                payload: "PHN2Zy8+".into(),
            })
            .unwrap();
        assert_eq!(resolved.path().extension().unwrap(), "svg");
    }

    #[test]
    fn test_bad_base64_is_unresolved() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolver(dir.path());
        let err = r
            .resolve(&ImageRef::Base64 {
                format: "png".into(),
                payload: "!!!".into(),
            })
            .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidBase64(_)));

        let err = r
            .resolve(&ImageRef::Base64 {
                format: "png".into(),
                payload: String::new(),
            })
            .unwrap_err();
        assert!(matches!(err, ResolveError::EmptyPayload));
        assert_eq!(temp_entries(r.temp_dir()), 0);
    }

    #[test]
    fn test_local_lookup_and_legacy_prefixes() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolver(dir.path());
        let root = dir.path().join("uploads");
        fs::create_dir_all(root.join("flags")).unwrap();
        fs::write(root.join("flags/it.png"), b"x").unwrap();

        for reference in ["flags/it.png", "/uploads/flags/it.png", "/api/static/flags/it.png"] {
            let resolved = r.resolve(&ImageRef::Local(reference.into())).unwrap();
            assert_eq!(resolved.path(), root.join("flags/it.png"), "{}", reference);
            assert!(!resolved.is_temp());
        }
    }

    #[test]
    fn test_basename_fallback_in_subfolders() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolver(dir.path());
        let root = dir.path().join("uploads");
        fs::create_dir_all(root.join("silhouettes")).unwrap();
        fs::write(root.join("silhouettes/ship.png"), b"x").unwrap();

        let resolved = r
            .resolve(&ImageRef::Local("old/location/ship.png".into()))
            .unwrap();
        assert_eq!(resolved.path(), root.join("silhouettes/ship.png"));
    }

    #[test]
    fn test_missing_local_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolver(dir.path());
        let err = r.resolve(&ImageRef::Local("logos/none.png".into())).unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }

    #[test]
    fn test_unreachable_remote_is_unresolved() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolver(dir.path());
        let err = r
            .resolve(&ImageRef::Remote("http://127.0.0.1:9/logo.png".into()))
            .unwrap_err();
        assert!(matches!(err, ResolveError::Download { .. }));
        assert_eq!(temp_entries(r.temp_dir()), 0);
    }

    #[test]
    fn test_remote_download_to_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolver(dir.path());
        let (base, server) = serve_once("200 OK", b"remote logo bytes");

        let resolved = r
            .resolve(&ImageRef::Remote(format!("{}/crests/Logo.JPG?v=2", base)))
            .unwrap();
        let request = server.join().unwrap();

        assert!(request.starts_with("GET /crests/Logo.JPG?v=2 HTTP/1.1"));
        let agent = request
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("user-agent").then(|| value.trim().to_string())
            })
            .unwrap();
        assert_eq!(agent, crate::config::BROWSER_USER_AGENT);

        assert!(resolved.is_temp());
        let name = resolved.path().file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("download_") && name.ends_with(".jpg"), "{}", name);
        assert_eq!(resolved.path().parent().unwrap(), r.temp_dir());
        assert_eq!(resolved.read().unwrap(), b"remote logo bytes".to_vec());

        let path = resolved.path().to_path_buf();
        drop(resolved);
        assert!(!path.exists());
        assert_eq!(temp_entries(r.temp_dir()), 0);
    }

    #[test]
    fn test_remote_error_status_is_unresolved() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolver(dir.path());
        let (base, server) = serve_once("404 Not Found", b"missing");

        let err = r
            .resolve(&ImageRef::Remote(format!("{}/flags/xx.png", base)))
            .unwrap_err();
        server.join().unwrap();

        match err {
            ResolveError::Download { reason, .. } => assert!(reason.contains("404"), "{}", reason),
            other => panic!("expected download error, got {:?}", other),
        }
        assert_eq!(temp_entries(r.temp_dir()), 0);
    }

    #[test]
    fn test_url_extension() {
        assert_eq!(url_extension("https://x.org/a/b/logo.JPG?size=2"), ".jpg");
        assert_eq!(url_extension("https://x.org/a/b/"), ".png");
        assert_eq!(url_extension("https://x.org/image"), ".png");
        assert_eq!(url_extension("not a url"), ".png");
    }

    #[test]
    fn test_storage_path_keeps_rooted_paths() {
        let r = ResourceResolver::new(&RenderConfig::default()).unwrap();
        assert_eq!(
            r.storage_path("data/uploads/logos/a.png"),
            PathBuf::from("data/uploads/logos/a.png")
        );
        assert_eq!(
            r.storage_path("logos/a.png"),
            PathBuf::from("./data/uploads/logos/a.png")
        );
    }
}
