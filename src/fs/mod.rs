//! File system helpers.

pub mod naming;
pub mod paths;

pub use naming::{extension_from_url, file_name_from_url, sanitize_album_name};
pub use paths::prepare_download_dir;
