use std::io;
use std::path::{Path, PathBuf};

use axum::extract::multipart::Field;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{error, warn};

use crate::config::Config;

/// Why an upload was refused; each maps to a response signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadRejection {
    TypeNotSupported,
    SizeExceeded,
    Failed,
}

impl UploadRejection {
    pub fn signal(self) -> &'static str {
        match self {
            UploadRejection::TypeNotSupported => "file_type_not_supported",
            UploadRejection::SizeExceeded => "file_size_exceeded",
            UploadRejection::Failed => "file_upload_failed",
        }
    }
}

/// Checks the declared content type against `FILE_ALLOWED_TYPES`.
/// Parameters such as `; charset=utf-8` are ignored.
pub fn validate_content_type(config: &Config, content_type: Option<&str>) -> Result<(), UploadRejection> {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();
    if config
        .file_allowed_types
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&mime))
    {
        Ok(())
    } else {
        Err(UploadRejection::TypeNotSupported)
    }
}

/// Keeps `[A-Za-z0-9._-]`, turns spaces into `_` and drops everything else,
/// including any directory part of the client supplied name.
pub fn clean_file_name(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original)
        .trim();
    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') => Some(c),
            _ => None,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// Creates the file that will hold an upload inside `dir`. Taken names get
/// `_1`, `_2`, ... before the extension; `create_new` makes the open itself
/// claim the name. Returns the open file, its path and the stored asset name.
pub async fn create_unique_file(dir: &Path, original: &str) -> io::Result<(File, PathBuf, String)> {
    let cleaned = clean_file_name(original);
    let (stem, ext) = match cleaned.rfind('.') {
        Some(idx) if idx > 0 => (&cleaned[..idx], &cleaned[idx..]),
        _ => (cleaned.as_str(), ""),
    };

    let mut name = cleaned.clone();
    let mut counter = 1u32;
    loop {
        let path = dir.join(&name);
        match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => return Ok((file, path, name)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                name = format!("{stem}_{counter}{ext}");
                counter += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Streams a multipart field into `file` in `FILE_DEFAULT_CHUNK_SIZE` slices.
/// On any failure the partial file at `path` is removed. Returns the written size.
pub async fn save_field(
    config: &Config,
    mut field: Field<'_>,
    mut file: File,
    path: &Path,
) -> Result<u64, UploadRejection> {
    let result = write_field(config, &mut field, &mut file).await;
    drop(file);
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Could not remove partial upload {}: {e}", path.display());
            }
        }
    }
    result
}

async fn write_field(
    config: &Config,
    field: &mut Field<'_>,
    file: &mut File,
) -> Result<u64, UploadRejection> {
    let max_bytes = config.max_file_bytes();
    let slice_size = config.file_default_chunk_size.max(1);

    let mut written = 0u64;
    loop {
        let bytes = match field.chunk().await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => break,
            Err(e) => {
                error!("Error while receiving upload: {e}");
                return Err(UploadRejection::Failed);
            }
        };
        written += bytes.len() as u64;
        if written > max_bytes {
            return Err(UploadRejection::SizeExceeded);
        }
        for slice in bytes.chunks(slice_size) {
            file.write_all(slice).await.map_err(|e| {
                error!("Error while writing upload: {e}");
                UploadRejection::Failed
            })?;
        }
    }

    file.flush().await.map_err(|e| {
        error!("Error while flushing upload: {e}");
        UploadRejection::Failed
    })?;
    Ok(written)
}
