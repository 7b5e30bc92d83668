//! Filename derivation and sanitization.

use regex::Regex;
use url::Url;

use crate::error::{Error, Result};

/// Replace characters that are illegal in directory names.
pub fn sanitize_album_name(name: &str) -> String {
    let illegal = Regex::new(r#"[<>:"/\\|?*']|[\x00-\x1f]"#).unwrap();
    illegal.replace_all(name, "-").trim().to_string()
}

/// Last path segment of a URL, used as the on-disk filename when the
/// resolver did not supply a display name.
pub fn file_name_from_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url)?;
    let name = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| Error::InvalidFilename(format!("URL has no file name: {}", url)))?;

    Ok(name.to_string())
}

/// Lowercased extension of the URL's path, without the dot.
pub fn extension_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let path = parsed.path();
    let name = path.rsplit('/').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
