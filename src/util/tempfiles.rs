use std::{
    env, io,
    path::{Path, PathBuf},
};
use tokio::fs;
use tracing::{debug, warn};

use super::random::{generate_30_alphanumeric, unique_file_name};

#[derive(Debug, Clone)]
pub struct TempFileProvider {
    directory: PathBuf,
}

impl TempFileProvider {
    pub async fn build(directory: impl Into<PathBuf>) -> io::Result<TempFileProvider> {
        let directory = directory.into();
        fs::create_dir_all(&directory).await?;
        Ok(TempFileProvider { directory })
    }

    /// Uses the system temp directory, which always exists.
    pub fn system() -> TempFileProvider {
        TempFileProvider { directory: env::temp_dir() }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn get_path(&self) -> PathBuf {
        self.directory.join(generate_30_alphanumeric())
    }

    pub fn get_named_path(&self, original_name: &str) -> PathBuf {
        self.directory.join(unique_file_name(&sanitize_file_name(original_name)))
    }
}

/// Best-effort delete. Returns whether a file was actually removed.
pub async fn remove_quietly(path: &Path) -> bool {
    match fs::remove_file(path).await {
        Ok(()) => true,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!("Temp file {} was already gone", path.display());
            false
        }
        Err(err) => {
            warn!("Error occured, while deleting temp file {}: {}", path.display(), &err);
            false
        }
    }
}

/// Keeps only the final path component so client supplied names can't
/// point outside the temp directory or break header quoting.
pub fn sanitize_file_name(original_name: &str) -> String {
    let name = original_name.rsplit(['/', '\\']).next().unwrap_or_default();
    let name: String = name.chars().filter(|c| !c.is_control() && *c != '"').collect();
    match name.as_str() {
        "" | "." | ".." => "file".to_string(),
        _ => name,
    }
}
