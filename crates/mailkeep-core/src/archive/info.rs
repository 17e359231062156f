//! The `.info` area: version marker, owner, settings, key and checkpoints.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::files::{read_optional, remove_if_exists, write_atomic};
use super::layout::Area;
use crate::message::GmailId;
use crate::Result;

/// Archive format version.
pub const DB_VERSION: &str = "1.0";

const VERSION_FILE: &str = ".mailkeep_db_version";
const OWNER_FILE: &str = ".owner_account.info";
const SETTINGS_FILE: &str = ".store_settings.json";
const KEY_FILE: &str = ".storage_key.sec";

/// Body pipeline settings, fixed when the archive is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Gzip bodies.
    pub compress: bool,
    /// Encrypt bodies.
    pub encrypt: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct Checkpoint {
    last_id: GmailId,
}

/// Accessors for the files under `.info`.
#[derive(Debug, Clone)]
pub struct Info {
    dir: PathBuf,
}

impl Info {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub async fn version(&self) -> Result<Option<String>> {
        self.read_line(VERSION_FILE).await
    }

    pub async fn write_version(&self) -> Result<()> {
        write_atomic(&self.dir.join(VERSION_FILE), DB_VERSION.as_bytes()).await
    }

    pub async fn owner(&self) -> Result<Option<String>> {
        self.read_line(OWNER_FILE).await
    }

    pub async fn write_owner(&self, owner: &str) -> Result<()> {
        write_atomic(&self.dir.join(OWNER_FILE), format!("{owner}\n").as_bytes()).await
    }

    pub async fn settings(&self) -> Result<Option<StoreSettings>> {
        match read_optional(&self.dir.join(SETTINGS_FILE)).await? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn write_settings(&self, settings: StoreSettings) -> Result<()> {
        write_atomic(&self.dir.join(SETTINGS_FILE), &serde_json::to_vec(&settings)?).await
    }

    pub async fn key(&self) -> Result<Option<String>> {
        self.read_line(KEY_FILE).await
    }

    pub async fn write_key(&self, encoded: &str) -> Result<()> {
        write_atomic(&self.dir.join(KEY_FILE), encoded.as_bytes()).await
    }

    pub async fn checkpoint(&self, area: Area) -> Result<Option<GmailId>> {
        match read_optional(&self.checkpoint_path(area)).await? {
            Some(raw) => Ok(Some(serde_json::from_slice::<Checkpoint>(&raw)?.last_id)),
            None => Ok(None),
        }
    }

    pub async fn write_checkpoint(&self, area: Area, last_id: GmailId) -> Result<()> {
        let raw = serde_json::to_vec(&Checkpoint { last_id })?;
        write_atomic(&self.checkpoint_path(area), &raw).await
    }

    pub async fn clear_checkpoint(&self, area: Area) -> Result<()> {
        remove_if_exists(&self.checkpoint_path(area)).await?;
        Ok(())
    }

    fn checkpoint_path(&self, area: Area) -> PathBuf {
        self.dir.join(format!(".restore_{area}_lastid.info"))
    }

    async fn read_line(&self, name: &str) -> Result<Option<String>> {
        Ok(read_optional(&self.dir.join(name))
            .await?
            .map(|raw| String::from_utf8_lossy(&raw).trim().to_string())
            .filter(|line| !line.is_empty()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn fresh_info_is_empty() {
        let dir = TempDir::new().unwrap();
        let info = Info::new(dir.path().join(".info"));
        assert_eq!(info.version().await.unwrap(), None);
        assert_eq!(info.owner().await.unwrap(), None);
        assert_eq!(info.settings().await.unwrap(), None);
        assert_eq!(info.key().await.unwrap(), None);
        assert_eq!(info.checkpoint(Area::Db).await.unwrap(), None);
    }

    #[tokio::test]
    async fn records_persist() {
        let dir = TempDir::new().unwrap();
        let info = Info::new(dir.path().join(".info"));
        info.write_version().await.unwrap();
        info.write_owner("Me@Gmail.com").await.unwrap();
        info.write_settings(StoreSettings {
            compress: true,
            encrypt: false,
        })
        .await
        .unwrap();

        assert_eq!(info.version().await.unwrap().as_deref(), Some("1.0"));
        assert_eq!(info.owner().await.unwrap().as_deref(), Some("Me@Gmail.com"));
        assert!(info.settings().await.unwrap().unwrap().compress);
        assert!(dir.path().join(".info/.owner_account.info").exists());
    }

    #[tokio::test]
    async fn checkpoints_are_per_area() {
        let dir = TempDir::new().unwrap();
        let info = Info::new(dir.path().to_path_buf());
        info.write_checkpoint(Area::Db, 42).await.unwrap();
        info.write_checkpoint(Area::Chats, 7).await.unwrap();
        assert_eq!(info.checkpoint(Area::Db).await.unwrap(), Some(42));
        assert_eq!(info.checkpoint(Area::Chats).await.unwrap(), Some(7));

        let raw = std::fs::read_to_string(dir.path().join(".restore_db_lastid.info")).unwrap();
        assert_eq!(raw, r#"{"last_id":42}"#);

        info.clear_checkpoint(Area::Db).await.unwrap();
        info.clear_checkpoint(Area::Db).await.unwrap();
        assert_eq!(info.checkpoint(Area::Db).await.unwrap(), None);
        assert_eq!(info.checkpoint(Area::Chats).await.unwrap(), Some(7));
    }
}
