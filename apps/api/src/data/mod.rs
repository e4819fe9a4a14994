//! Document ingestion: project files on disk, and the chunks cut from them.

pub mod chunker;
pub mod extract;
pub mod handlers;
pub mod store;
pub mod upload;

use std::path::{Path, PathBuf};

use tracing::info;

use crate::errors::AppError;
use crate::state::AppState;

/// `FILES_DIR/<project_id>`
pub fn project_dir(files_dir: &str, project_id: i32) -> PathBuf {
    Path::new(files_dir).join(project_id.to_string())
}

/// Removes everything a project owns outside its database rows: the vector
/// collection and the uploaded files.
pub async fn purge_project_artifacts(state: &AppState, project_id: i32) -> Result<(), AppError> {
    state.vectors.delete_collection(project_id).await?;

    let dir = project_dir(&state.config.files_dir, project_id);
    match tokio::fs::remove_dir_all(&dir).await {
        Ok(()) => info!("Removed project directory {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(AppError::Storage(e)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_dir() {
        assert_eq!(
            project_dir("assets/files", 7),
            PathBuf::from("assets/files/7")
        );
    }
}
