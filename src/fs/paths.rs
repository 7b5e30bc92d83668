//! Download directory management.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::fs::naming::sanitize_album_name;

/// Build and create the destination directory for an album.
pub fn prepare_download_dir(root: &Path, album_name: Option<&str>) -> Result<PathBuf> {
    let dir = match album_name {
        Some(name) => {
            let sanitized = sanitize_album_name(name);
            if sanitized.is_empty() {
                root.to_path_buf()
            } else {
                root.join(sanitized)
            }
        }
        None => root.to_path_buf(),
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
