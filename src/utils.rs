//! Utility functions for URLs, content types and destination files

use crate::config::FileCollisionAction;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use url::Url;

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Expand the search URL template for one page
///
/// The phrase is form-encoded (spaces become `+`).
///
/// # Examples
///
/// ```
/// use photo_grab::utils::search_url;
///
/// let url = search_url("http://example.com/s?q={query}&page={page}", "red panda", 2).unwrap();
/// assert_eq!(url.as_str(), "http://example.com/s?q=red+panda&page=2");
/// ```
pub fn search_url(template: &str, phrase: &str, page: u32) -> Result<Url> {
    let query: String = url::form_urlencoded::byte_serialize(phrase.as_bytes()).collect();
    let expanded = template
        .replace("{query}", &query)
        .replace("{page}", &page.to_string());

    Url::parse(&expanded).map_err(|e| Error::InvalidUrl {
        url: expanded.clone(),
        reason: e.to_string(),
    })
}

/// Check whether a Content-Type header value declares JSON
///
/// Parameters such as `charset` are ignored and the comparison is
/// case-insensitive.
#[must_use]
pub fn is_json_content_type(value: Option<&str>) -> bool {
    value
        .and_then(|v| v.split(';').next())
        .map(str::trim)
        .is_some_and(|essence| essence.eq_ignore_ascii_case("application/json"))
}

/// Reduce a remote file name to a safe local base name
///
/// Only the last path component survives; separators of either platform are
/// honored. Empty names and `.`/`..` are rejected.
///
/// # Examples
///
/// ```
/// use photo_grab::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("../../etc/passwd").unwrap(), "passwd");
/// assert!(sanitize_filename("..").is_err());
/// ```
pub fn sanitize_filename(name: &str) -> Result<String> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches('\0');

    if base.is_empty() || base == "." || base == ".." {
        return Err(Error::InvalidFilename(name.to_string()));
    }
    Ok(base.to_string())
}

/// Create the destination file, handling collisions according to the action
///
/// Rename and Skip rely on `create_new`, so two workers racing for the same
/// name never both get it.
///
/// # Returns
///
/// The open file and the path it was created at. For Rename this may carry a
/// ` (n)` suffix. For Skip an existing file yields [`Error::FileExists`].
pub async fn create_destination(
    path: &Path,
    action: FileCollisionAction,
) -> Result<(File, PathBuf)> {
    match action {
        FileCollisionAction::Overwrite => {
            let file = File::create(path).await?;
            Ok((file, path.to_path_buf()))
        }
        FileCollisionAction::Skip => match create_new(path).await {
            Ok(file) => Ok((file, path.to_path_buf())),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(Error::FileExists(path.to_path_buf()))
            }
            Err(e) => Err(e.into()),
        },
        FileCollisionAction::Rename => {
            match create_new(path).await {
                Ok(file) => return Ok((file, path.to_path_buf())),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }

            for i in 1..=MAX_RENAME_ATTEMPTS {
                let candidate = numbered_path(path, i)?;
                match create_new(&candidate).await {
                    Ok(file) => return Ok((file, candidate)),
                    Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                    Err(e) => return Err(e.into()),
                }
            }

            Err(Error::FileExists(path.to_path_buf()))
        }
    }
}

async fn create_new(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
}

/// `dir/stem (n).ext`, or `dir/stem (n)` without an extension
fn numbered_path(path: &Path, n: u32) -> Result<PathBuf> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::InvalidFilename(path.display().to_string()))?;
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{} ({}).{}", stem, n, ext),
        None => format!("{} ({})", stem, n),
    };
    Ok(parent.join(name))
}
