//! Small filesystem helpers shared by the archive.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Result;

/// Writes `data` next to `path`, syncs it and renames it into place.
///
/// Readers see either the old file or the complete new one. The temporary
/// file is unlinked when any step fails.
pub async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let tmp = tmp_path(path);
    if let Err(err) = write_synced(&tmp, path, data).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(err.into());
    }
    Ok(())
}

async fn write_synced(tmp: &Path, path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(tmp, path).await
}

/// Reads a file, mapping absence to `None`.
pub async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(data) => Ok(Some(data)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Removes a file, ignoring absence. Returns true if it existed.
pub async fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// Moves a file into `dir`, keeping its name. Missing sources are skipped.
pub async fn move_into(path: &Path, dir: &Path) -> Result<bool> {
    let Some(name) = path.file_name() else {
        return Ok(false);
    };
    fs::create_dir_all(dir).await?;
    match fs::rename(path, dir.join(name)).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// Returns the entry names of a directory, or nothing if it does not exist.
pub async fn list_dir(dir: &Path) -> Result<Vec<(String, bool)>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let is_dir = entry.file_type().await?.is_dir();
        if let Some(name) = entry.file_name().to_str() {
            names.push((name.to_string(), is_dir));
        }
    }
    Ok(names)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn atomic_write_leaves_no_tmp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/1.meta");
        write_atomic(&path, b"{}").await.unwrap();
        write_atomic(&path, b"{\"x\":1}").await.unwrap();

        assert_eq!(fs::read(&path).await.unwrap(), b"{\"x\":1}");
        let names = list_dir(&dir.path().join("a/b")).await.unwrap();
        assert_eq!(names, vec![("1.meta".to_string(), false)]);
    }

    #[tokio::test]
    async fn failed_rename_cleans_up_tmp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("1.meta");
        fs::create_dir_all(path.join("occupied")).await.unwrap();

        assert!(write_atomic(&path, b"{}").await.is_err());
        let names = list_dir(dir.path()).await.unwrap();
        assert_eq!(names, vec![("1.meta".to_string(), true)]);
    }

    #[tokio::test]
    async fn absent_files_are_not_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert_eq!(read_optional(&missing).await.unwrap(), None);
        assert!(!remove_if_exists(&missing).await.unwrap());
        assert!(!move_into(&missing, &dir.path().join("q")).await.unwrap());
        assert!(list_dir(&missing).await.unwrap().is_empty());
    }
}
