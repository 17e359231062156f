//! Local archive store.
//!
//! One `.meta` JSON file and one body file per message, sharded by the
//! year-month of the internal date. The body is written before the
//! metadata, so the presence of a `.meta` file means the record is
//! complete.

mod codec;
mod files;
mod index;
mod info;
mod layout;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{Retention, Settings};
use crate::message::{GmailId, MessageRecord, Metadata, Shard};
use crate::{Error, Result};

pub use codec::Cipher;
pub use index::Location;
pub use info::{DB_VERSION, StoreSettings};
pub use layout::{Area, BodyFormat, Dir};

use files::{list_dir, move_into, read_optional, remove_if_exists, write_atomic};
use index::Index;
use info::Info;
use layout::{Layout, meta_file_name, parse_meta_file_name};

/// Options that shape an open archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveOptions {
    /// What `delete` does with files.
    pub retention: Retention,
    /// Chat records per bucket.
    pub chats_per_bucket: usize,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for ArchiveOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            retention: settings.retention,
            chats_per_bucket: settings.chats_per_bucket.max(1),
        }
    }
}

/// Record counts per area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveStats {
    /// Ordinary messages.
    pub messages: usize,
    /// Chat records.
    pub chats: usize,
    /// Quarantined records.
    pub quarantined: usize,
    /// Records kept in the bin.
    pub binned: usize,
}

/// An archive directory opened for reading and writing.
#[derive(Debug)]
pub struct Archive {
    layout: Layout,
    info: Info,
    options: ArchiveOptions,
    settings: StoreSettings,
    cipher: Option<Cipher>,
    db: Index,
    chats: Index,
}

impl Archive {
    /// Opens the archive at `root`, indexing whatever it already holds.
    ///
    /// Nothing is created on disk until the first write.
    ///
    /// # Errors
    ///
    /// Returns an error if the info area or a directory cannot be read.
    pub async fn open(root: impl Into<PathBuf>, options: ArchiveOptions) -> Result<Self> {
        let layout = Layout::new(root.into());
        let info = Info::new(layout.info());

        let settings = info.settings().await?.unwrap_or_default();
        let cipher = match info.key().await? {
            Some(key) => Some(Cipher::from_base64(&key)?),
            None => None,
        };
        let db = Index::scan(&layout.area(Area::Db), Area::Db).await?;
        let chats = Index::scan(&layout.area(Area::Chats), Area::Chats).await?;

        info!(
            root = %layout.root().display(),
            messages = db.len(),
            chats = chats.len(),
            "archive opened"
        );

        Ok(Self {
            layout,
            info,
            options,
            settings,
            cipher,
            db,
            chats,
        })
    }

    /// Archive root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// Body pipeline settings in effect.
    #[must_use]
    pub const fn settings(&self) -> StoreSettings {
        self.settings
    }

    /// Records the owner and settings of a new archive, or checks them.
    ///
    /// The owner comparison ignores case. Settings recorded earlier win over
    /// `requested`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OwnerMismatch`] if the archive belongs to another
    /// mailbox.
    pub async fn initialize(&mut self, owner: &str, requested: StoreSettings) -> Result<()> {
        match self.info.owner().await? {
            Some(recorded) if !recorded.eq_ignore_ascii_case(owner) => {
                return Err(Error::OwnerMismatch {
                    archive_owner: recorded,
                    requested: owner.to_string(),
                });
            }
            Some(_) => {}
            None => {
                info!(owner, "recording archive owner");
                self.info.write_owner(owner).await?;
            }
        }

        if self.info.version().await?.is_none() {
            self.info.write_version().await?;
        }

        match self.info.settings().await? {
            Some(recorded) => {
                if recorded != requested {
                    warn!(
                        ?recorded,
                        ?requested,
                        "archive settings were fixed at creation; keeping them"
                    );
                }
                self.settings = recorded;
            }
            None => {
                self.info.write_settings(requested).await?;
                self.settings = requested;
            }
        }

        Ok(())
    }

    /// Stores a message in its shard. Returns its id.
    ///
    /// A record already stored under the same id is replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be written.
    pub async fn store(&mut self, record: &MessageRecord) -> Result<GmailId> {
        let dir = Dir::shard(record.metadata.shard());
        self.put(Area::Db, dir, record).await
    }

    /// Stores a chat record in the current bucket of its shard.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be written.
    pub async fn store_chat(&mut self, record: &MessageRecord) -> Result<GmailId> {
        let id = record.gmail_id();
        let dir = match self.chats.get(id) {
            Some(location) if location.dir.shard == record.metadata.shard() => {
                location.dir.clone()
            }
            _ => self
                .chats
                .open_bucket(&record.metadata.shard(), self.options.chats_per_bucket),
        };
        self.put(Area::Chats, dir, record).await
    }

    async fn put(&mut self, area: Area, dir: Dir, record: &MessageRecord) -> Result<GmailId> {
        let id = record.gmail_id();
        let format = BodyFormat {
            compressed: self.settings.compress,
            encrypted: self.settings.encrypt,
        };
        if format.encrypted {
            self.ensure_cipher().await?;
        }

        let stored = codec::encode(&record.body, format, self.cipher.as_ref())?;
        let path = self.layout.dir(area, &dir);
        write_atomic(&path.join(format.file_name(id)), &stored).await?;
        write_atomic(
            &path.join(meta_file_name(id)),
            &serde_json::to_vec(&record.metadata)?,
        )
        .await?;

        let dir_name = dir.name();
        let location = Location {
            dir,
            body: Some(format),
        };
        if let Some(previous) = self.index_mut(area).insert(id, location.clone()) {
            if previous != location {
                self.remove_stale(area, id, &previous, &location).await?;
            }
        }

        debug!(%area, gmail_id = id, dir = %dir_name, "stored");
        Ok(id)
    }

    /// Reads a record back, undoing compression and encryption.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`], [`Error::MalformedMetadata`],
    /// [`Error::MissingBody`] or a crypto error.
    pub async fn retrieve(&mut self, area: Area, id: GmailId) -> Result<MessageRecord> {
        let location = self.locate(area, id).await?;
        let metadata = self.read_metadata(area, id, &location).await?;

        let format = location.body.ok_or(Error::MissingBody(id))?;
        let path = self.layout.dir(area, &location.dir).join(format.file_name(id));
        let stored = read_optional(&path).await?.ok_or(Error::MissingBody(id))?;
        let body = codec::decode(&stored, format, self.cipher.as_ref())?;

        Ok(MessageRecord { metadata, body })
    }

    /// Reads only the metadata of a record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] or [`Error::MalformedMetadata`].
    pub async fn retrieve_metadata_only(&mut self, area: Area, id: GmailId) -> Result<Metadata> {
        let location = self.locate(area, id).await?;
        self.read_metadata(area, id, &location).await
    }

    /// Rewrites the metadata of an existing record. The body is untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the record does not exist.
    pub async fn update_metadata(&mut self, area: Area, metadata: &Metadata) -> Result<()> {
        let id = metadata.gmail_id;
        let location = self.locate(area, id).await?;
        let path = self.layout.dir(area, &location.dir).join(meta_file_name(id));
        write_atomic(&path, &serde_json::to_vec(metadata)?).await
    }

    /// Returns true if the record is indexed.
    #[must_use]
    pub fn contains(&self, area: Area, id: GmailId) -> bool {
        self.index(area).get(id).is_some()
    }

    /// Returns true if the record has both its metadata and its body.
    #[must_use]
    pub fn is_complete(&self, area: Area, id: GmailId) -> bool {
        self.index(area)
            .get(id)
            .is_some_and(|location| location.body.is_some())
    }

    /// Ids of the db area with their shard, ascending.
    ///
    /// With a pivot, shards before it are left out.
    #[must_use]
    pub fn enumerate_ids(&self, pivot: Option<&Shard>) -> BTreeMap<GmailId, Shard> {
        self.db.ids(pivot)
    }

    /// Ids of the chats area with their shard, ascending.
    #[must_use]
    pub fn enumerate_chat_ids(&self, pivot: Option<&Shard>) -> BTreeMap<GmailId, Shard> {
        self.chats.ids(pivot)
    }

    /// Moves a record to the quarantine area, replacing an older copy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] or an I/O error.
    pub async fn quarantine(&mut self, area: Area, id: GmailId) -> Result<()> {
        let location = self.locate(area, id).await?;
        let target = self.layout.quarantine();

        clear_record_files(&target, id).await?;
        self.move_record(area, id, &location, &target).await?;
        self.index_mut(area).remove(id);

        warn!(%area, gmail_id = id, "record quarantined");
        Ok(())
    }

    /// Removes a record, or moves it to the bin under [`Retention::Bin`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] or an I/O error.
    pub async fn delete(&mut self, area: Area, id: GmailId) -> Result<()> {
        let location = self.locate(area, id).await?;
        let dir = self.layout.dir(area, &location.dir);

        match self.options.retention {
            Retention::Delete => {
                remove_if_exists(&dir.join(meta_file_name(id))).await?;
                if let Some(format) = location.body {
                    remove_if_exists(&dir.join(format.file_name(id))).await?;
                }
            }
            Retention::Bin => {
                let target = self.layout.bin(&location.dir);
                clear_record_files(&target, id).await?;
                self.move_record(area, id, &location, &target).await?;
            }
        }

        self.index_mut(area).remove(id);
        debug!(%area, gmail_id = id, retention = ?self.options.retention, "record deleted");
        Ok(())
    }

    /// Persists the last restored id of an area.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save_checkpoint(&self, area: Area, id: GmailId) -> Result<()> {
        self.info.write_checkpoint(area, id).await
    }

    /// Reads the last restored id of an area.
    ///
    /// # Errors
    ///
    /// Returns an error if the checkpoint exists but cannot be read.
    pub async fn load_checkpoint(&self, area: Area) -> Result<Option<GmailId>> {
        self.info.checkpoint(area).await
    }

    /// Forgets the checkpoint of an area.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be removed.
    pub async fn clear_checkpoint(&self, area: Area) -> Result<()> {
        self.info.clear_checkpoint(area).await
    }

    /// Counts records per area.
    ///
    /// # Errors
    ///
    /// Returns an error if the quarantine or bin cannot be listed.
    pub async fn stats(&self) -> Result<ArchiveStats> {
        let quarantined = count_metas(&self.layout.quarantine()).await?;

        let mut binned = 0;
        for (name, is_dir) in list_dir(&self.layout.root().join("bin")).await? {
            if is_dir {
                binned += count_metas(&self.layout.root().join("bin").join(name)).await?;
            }
        }

        Ok(ArchiveStats {
            messages: self.db.len(),
            chats: self.chats.len(),
            quarantined,
            binned,
        })
    }

    /// Finds a record, rescanning the area once on an index miss.
    async fn locate(&mut self, area: Area, id: GmailId) -> Result<Location> {
        if let Some(location) = self.index(area).get(id) {
            return Ok(location.clone());
        }

        debug!(%area, gmail_id = id, "index miss, rescanning");
        let rescanned = Index::scan(&self.layout.area(area), area).await?;
        *self.index_mut(area) = rescanned;
        self.index(area).get(id).cloned().ok_or(Error::NotFound(id))
    }

    async fn read_metadata(&self, area: Area, id: GmailId, location: &Location) -> Result<Metadata> {
        let path = self.layout.dir(area, &location.dir).join(meta_file_name(id));
        let raw = read_optional(&path).await?.ok_or(Error::NotFound(id))?;
        serde_json::from_slice(&raw).map_err(|e| Error::MalformedMetadata {
            path,
            reason: e.to_string(),
        })
    }

    async fn move_record(
        &self,
        area: Area,
        id: GmailId,
        location: &Location,
        target: &Path,
    ) -> Result<()> {
        let dir = self.layout.dir(area, &location.dir);
        // Body first: a moved `.meta` without its body would look complete.
        if let Some(format) = location.body {
            move_into(&dir.join(format.file_name(id)), target).await?;
        }
        move_into(&dir.join(meta_file_name(id)), target).await?;
        Ok(())
    }

    async fn remove_stale(
        &self,
        area: Area,
        id: GmailId,
        previous: &Location,
        current: &Location,
    ) -> Result<()> {
        let dir = self.layout.dir(area, &previous.dir);
        if previous.dir != current.dir {
            remove_if_exists(&dir.join(meta_file_name(id))).await?;
        }
        if let Some(format) = previous.body {
            if previous.dir != current.dir || Some(format) != current.body {
                remove_if_exists(&dir.join(format.file_name(id))).await?;
            }
        }
        Ok(())
    }

    async fn ensure_cipher(&mut self) -> Result<()> {
        if self.cipher.is_none() {
            let (cipher, key) = Cipher::generate();
            self.info.write_key(&key).await?;
            info!("generated archive storage key");
            self.cipher = Some(cipher);
        }
        Ok(())
    }

    const fn index(&self, area: Area) -> &Index {
        match area {
            Area::Db => &self.db,
            Area::Chats => &self.chats,
        }
    }

    const fn index_mut(&mut self, area: Area) -> &mut Index {
        match area {
            Area::Db => &mut self.db,
            Area::Chats => &mut self.chats,
        }
    }
}

/// Removes every file of `id` from a flat directory.
async fn clear_record_files(dir: &Path, id: GmailId) -> Result<()> {
    remove_if_exists(&dir.join(meta_file_name(id))).await?;
    for format in BodyFormat::ALL {
        remove_if_exists(&dir.join(format.file_name(id))).await?;
    }
    Ok(())
}

async fn count_metas(dir: &Path) -> Result<usize> {
    Ok(list_dir(dir)
        .await?
        .iter()
        .filter(|(name, is_dir)| !is_dir && parse_meta_file_name(name).is_some())
        .count())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    const JAN_2021: i64 = 1_609_459_200;
    const FEB_2021: i64 = 1_612_137_600;

    fn record(id: GmailId, internal_date: i64, body: &[u8]) -> MessageRecord {
        MessageRecord {
            metadata: Metadata {
                gmail_id: id,
                thread_id: id,
                labels: vec!["Work/Reports".to_string()],
                flags: vec!["\\Seen".to_string()],
                internal_date,
                subject: Some("hello".to_string()),
                message_id: Some(format!("<{id}@example.com>")),
                x_gmail_received: None,
            },
            body: body.to_vec(),
        }
    }

    async fn open(dir: &TempDir, options: ArchiveOptions) -> Archive {
        Archive::open(dir.path(), options).await.unwrap()
    }

    async fn initialized(dir: &TempDir, compress: bool, encrypt: bool) -> Archive {
        let mut archive = open(dir, ArchiveOptions::default()).await;
        archive
            .initialize("me@gmail.com", StoreSettings { compress, encrypt })
            .await
            .unwrap();
        archive
    }

    #[tokio::test]
    async fn compressed_body_round_trip_uses_gz_suffix() {
        let dir = TempDir::new().unwrap();
        let mut archive = initialized(&dir, true, false).await;

        let rec = record(100, JAN_2021, b"hello");
        assert_eq!(archive.store(&rec).await.unwrap(), 100);

        let shard_dir = dir.path().join("db/2021-01");
        assert!(shard_dir.join("100.eml.gz").exists());
        assert!(shard_dir.join("100.meta").exists());
        assert!(!shard_dir.join("100.eml").exists());
        assert!(!shard_dir.join("100.eml.gz.crypt").exists());

        let back = archive.retrieve(Area::Db, 100).await.unwrap();
        assert_eq!(back.body, b"hello");
        assert_eq!(back.metadata, rec.metadata);
    }

    #[tokio::test]
    async fn encrypted_archive_persists_key() {
        let dir = TempDir::new().unwrap();
        {
            let mut archive = initialized(&dir, true, true).await;
            archive.store(&record(7, FEB_2021, b"secret body")).await.unwrap();
        }
        assert!(dir.path().join(".info/.storage_key.sec").exists());
        let stored = std::fs::read(dir.path().join("db/2021-02/7.eml.gz.crypt")).unwrap();
        assert!(!stored.windows(6).any(|w| w == b"secret"));

        let mut reopened = open(&dir, ArchiveOptions::default()).await;
        let back = reopened.retrieve(Area::Db, 7).await.unwrap();
        assert_eq!(back.body, b"secret body");
    }

    #[tokio::test]
    async fn legacy_suffixes_are_read_by_name() {
        let dir = TempDir::new().unwrap();
        let mut archive = initialized(&dir, false, false).await;
        archive.store(&record(1, JAN_2021, b"plain")).await.unwrap();

        // A record written by an older, compressing configuration.
        let packed = codec::compress(b"old").unwrap();
        std::fs::write(dir.path().join("db/2021-01/2.eml.gz"), packed).unwrap();
        std::fs::write(
            dir.path().join("db/2021-01/2.meta"),
            serde_json::to_vec(&record(2, JAN_2021, b"").metadata).unwrap(),
        )
        .unwrap();

        let mut reopened = open(&dir, ArchiveOptions::default()).await;
        assert_eq!(reopened.retrieve(Area::Db, 1).await.unwrap().body, b"plain");
        assert_eq!(reopened.retrieve(Area::Db, 2).await.unwrap().body, b"old");
    }

    #[tokio::test]
    async fn owner_mismatch_is_refused() {
        let dir = TempDir::new().unwrap();
        initialized(&dir, false, false).await;

        let mut archive = open(&dir, ArchiveOptions::default()).await;
        archive
            .initialize("ME@GMAIL.COM", StoreSettings::default())
            .await
            .unwrap();

        let err = archive
            .initialize("someone@gmail.com", StoreSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OwnerMismatch { ref archive_owner, .. } if archive_owner == "me@gmail.com"));
    }

    #[tokio::test]
    async fn first_settings_win() {
        let dir = TempDir::new().unwrap();
        initialized(&dir, true, false).await;

        let mut archive = open(&dir, ArchiveOptions::default()).await;
        archive
            .initialize("me@gmail.com", StoreSettings { compress: false, encrypt: true })
            .await
            .unwrap();
        assert_eq!(
            archive.settings(),
            StoreSettings {
                compress: true,
                encrypt: false
            }
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join(".info/.mailkeep_db_version")).unwrap(),
            DB_VERSION
        );
    }

    #[tokio::test]
    async fn metadata_only_and_update() {
        let dir = TempDir::new().unwrap();
        let mut archive = initialized(&dir, false, false).await;
        archive.store(&record(5, JAN_2021, b"body")).await.unwrap();

        let mut meta = archive.retrieve_metadata_only(Area::Db, 5).await.unwrap();
        meta.labels = vec!["Archive".to_string()];
        archive.update_metadata(Area::Db, &meta).await.unwrap();

        let back = archive.retrieve(Area::Db, 5).await.unwrap();
        assert_eq!(back.metadata.labels, vec!["Archive"]);
        assert_eq!(back.body, b"body");
    }

    #[tokio::test]
    async fn malformed_metadata_is_distinct() {
        let dir = TempDir::new().unwrap();
        let mut archive = initialized(&dir, false, false).await;
        archive.store(&record(9, JAN_2021, b"body")).await.unwrap();
        std::fs::write(dir.path().join("db/2021-01/9.meta"), "{not json").unwrap();

        let err = archive.retrieve_metadata_only(Area::Db, 9).await.unwrap_err();
        assert!(matches!(err, Error::MalformedMetadata { .. }));
    }

    #[tokio::test]
    async fn missing_record_and_missing_body() {
        let dir = TempDir::new().unwrap();
        let mut archive = initialized(&dir, false, false).await;
        assert!(matches!(
            archive.retrieve(Area::Db, 1).await.unwrap_err(),
            Error::NotFound(1)
        ));

        archive.store(&record(3, JAN_2021, b"body")).await.unwrap();
        std::fs::remove_file(dir.path().join("db/2021-01/3.eml")).unwrap();
        assert!(matches!(
            archive.retrieve(Area::Db, 3).await.unwrap_err(),
            Error::MissingBody(3)
        ));
    }

    #[tokio::test]
    async fn index_miss_rescans_once() {
        let dir = TempDir::new().unwrap();
        let mut archive = initialized(&dir, false, false).await;

        std::fs::create_dir_all(dir.path().join("db/2020-05")).unwrap();
        std::fs::write(dir.path().join("db/2020-05/11.eml"), b"late").unwrap();
        std::fs::write(
            dir.path().join("db/2020-05/11.meta"),
            serde_json::to_vec(&record(11, 1_589_000_000, b"").metadata).unwrap(),
        )
        .unwrap();

        assert!(!archive.contains(Area::Db, 11));
        assert_eq!(archive.retrieve(Area::Db, 11).await.unwrap().body, b"late");
        assert!(archive.contains(Area::Db, 11));
    }

    #[tokio::test]
    async fn enumeration_is_ordered_and_pivoted() {
        let dir = TempDir::new().unwrap();
        let mut archive = initialized(&dir, false, false).await;
        archive.store(&record(200, FEB_2021, b"b")).await.unwrap();
        archive.store(&record(100, JAN_2021, b"a")).await.unwrap();

        let all = archive.enumerate_ids(None);
        assert_eq!(all.keys().copied().collect::<Vec<_>>(), vec![100, 200]);
        assert_eq!(all[&100].as_str(), "2021-01");

        let pivot = Shard::parse("2021-02").unwrap();
        let recent = archive.enumerate_ids(Some(&pivot));
        assert_eq!(recent.keys().copied().collect::<Vec<_>>(), vec![200]);
    }

    #[tokio::test]
    async fn quarantine_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut archive = initialized(&dir, true, false).await;

        archive.store(&record(42, JAN_2021, b"v1")).await.unwrap();
        archive.quarantine(Area::Db, 42).await.unwrap();
        archive.store(&record(42, JAN_2021, b"v2")).await.unwrap();
        archive.quarantine(Area::Db, 42).await.unwrap();

        let quarantine = dir.path().join("quarantine");
        let mut names: Vec<_> = std::fs::read_dir(&quarantine)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec!["42.eml.gz", "42.meta"]);
        let body = codec::decompress(&std::fs::read(quarantine.join("42.eml.gz")).unwrap()).unwrap();
        assert_eq!(body, b"v2");

        assert!(!archive.contains(Area::Db, 42));
        assert_eq!(archive.stats().await.unwrap().quarantined, 1);
    }

    #[tokio::test]
    async fn delete_unlinks_by_default() {
        let dir = TempDir::new().unwrap();
        let mut archive = initialized(&dir, false, false).await;
        archive.store(&record(100, JAN_2021, b"a")).await.unwrap();
        archive.store(&record(200, FEB_2021, b"b")).await.unwrap();

        archive.delete(Area::Db, 100).await.unwrap();
        assert!(!dir.path().join("db/2021-01/100.meta").exists());
        assert!(!dir.path().join("db/2021-01/100.eml").exists());
        assert!(dir.path().join("db/2021-02/200.meta").exists());
        assert!(!dir.path().join("bin").exists());
    }

    #[tokio::test]
    async fn keep_in_bin_moves_files() {
        let dir = TempDir::new().unwrap();
        let options = ArchiveOptions {
            retention: Retention::Bin,
            ..ArchiveOptions::default()
        };
        let mut archive = open(&dir, options).await;
        archive
            .initialize("me@gmail.com", StoreSettings::default())
            .await
            .unwrap();
        archive.store(&record(100, JAN_2021, b"a")).await.unwrap();

        archive.delete(Area::Db, 100).await.unwrap();
        assert!(!dir.path().join("db/2021-01/100.meta").exists());
        assert!(dir.path().join("bin/2021-01/100.meta").exists());
        assert!(dir.path().join("bin/2021-01/100.eml").exists());

        let stats = archive.stats().await.unwrap();
        assert_eq!(stats.messages, 0);
        assert_eq!(stats.binned, 1);
    }

    #[tokio::test]
    async fn restoring_a_record_to_a_new_shard_moves_it() {
        let dir = TempDir::new().unwrap();
        let mut archive = initialized(&dir, false, false).await;
        archive.store(&record(1, JAN_2021, b"a")).await.unwrap();
        archive.store(&record(1, FEB_2021, b"a")).await.unwrap();

        assert!(!dir.path().join("db/2021-01/1.meta").exists());
        assert!(!dir.path().join("db/2021-01/1.eml").exists());
        assert!(dir.path().join("db/2021-02/1.meta").exists());
        assert_eq!(archive.enumerate_ids(None).len(), 1);
    }

    #[tokio::test]
    async fn chats_fill_buckets() {
        let dir = TempDir::new().unwrap();
        let options = ArchiveOptions {
            chats_per_bucket: 2,
            ..ArchiveOptions::default()
        };
        let mut archive = open(&dir, options).await;
        archive
            .initialize("me@gmail.com", StoreSettings::default())
            .await
            .unwrap();

        for id in 1..=3 {
            archive.store_chat(&record(id, JAN_2021, b"chat")).await.unwrap();
        }
        // Re-storing keeps the record in its bucket.
        archive.store_chat(&record(1, JAN_2021, b"chat")).await.unwrap();

        assert!(dir.path().join("chats/2021-01-1/1.meta").exists());
        assert!(dir.path().join("chats/2021-01-1/2.meta").exists());
        assert!(dir.path().join("chats/2021-01-2/3.meta").exists());
        assert_eq!(archive.enumerate_chat_ids(None).len(), 3);
        assert!(archive.enumerate_ids(None).is_empty());

        let reopened = open(&dir, options).await;
        assert_eq!(reopened.stats().await.unwrap().chats, 3);
    }

    #[tokio::test]
    async fn checkpoints() {
        let dir = TempDir::new().unwrap();
        let archive = initialized(&dir, false, false).await;
        assert_eq!(archive.load_checkpoint(Area::Db).await.unwrap(), None);
        archive.save_checkpoint(Area::Db, 20).await.unwrap();
        assert_eq!(archive.load_checkpoint(Area::Db).await.unwrap(), Some(20));
        archive.clear_checkpoint(Area::Db).await.unwrap();
        assert_eq!(archive.load_checkpoint(Area::Db).await.unwrap(), None);
    }

    #[tokio::test]
    async fn metadata_without_body_is_incomplete() {
        let dir = TempDir::new().unwrap();
        let mut archive = initialized(&dir, false, false).await;
        archive.store(&record(5, JAN_2021, b"x")).await.unwrap();
        std::fs::remove_file(dir.path().join("db/2021-01/5.eml")).unwrap();

        let mut reopened = open(&dir, ArchiveOptions::default()).await;
        assert!(reopened.contains(Area::Db, 5));
        assert!(!reopened.is_complete(Area::Db, 5));
        let err = reopened.retrieve(Area::Db, 5).await.unwrap_err();
        assert!(matches!(err, Error::MissingBody(5)));

        reopened.store(&record(5, JAN_2021, b"x")).await.unwrap();
        assert!(reopened.is_complete(Area::Db, 5));
    }
}
