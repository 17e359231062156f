//! On-disk layout of an archive.
//!
//! ```text
//! <root>/db/<YYYY-MM>/<id>.meta
//! <root>/db/<YYYY-MM>/<id>.eml[.gz][.crypt]
//! <root>/chats/<YYYY-MM>-<n>/...
//! <root>/quarantine/<id>.*
//! <root>/bin/<dir>/<id>.*
//! <root>/.info/...
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use crate::message::{GmailId, Shard};

/// Part of the archive holding live records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Area {
    /// Ordinary messages.
    Db,
    /// Chat transcripts.
    Chats,
}

impl Area {
    /// Directory name under the root.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Db => "db",
            Self::Chats => "chats",
        }
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// How a body file was transformed, as spelled by its suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BodyFormat {
    /// Gzip applied.
    pub compressed: bool,
    /// AES-256-GCM applied after compression.
    pub encrypted: bool,
}

impl BodyFormat {
    /// Every suffix combination, in lookup order.
    pub const ALL: [Self; 4] = [
        Self { compressed: false, encrypted: false },
        Self { compressed: true, encrypted: false },
        Self { compressed: false, encrypted: true },
        Self { compressed: true, encrypted: true },
    ];

    /// File suffix: `.eml`, `.eml.gz`, `.eml.crypt` or `.eml.gz.crypt`.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match (self.compressed, self.encrypted) {
            (false, false) => ".eml",
            (true, false) => ".eml.gz",
            (false, true) => ".eml.crypt",
            (true, true) => ".eml.gz.crypt",
        }
    }

    /// Body file name for `id`.
    #[must_use]
    pub fn file_name(self, id: GmailId) -> String {
        format!("{id}{}", self.suffix())
    }

    /// Splits a body file name into its id and format.
    #[must_use]
    pub fn parse_file_name(name: &str) -> Option<(GmailId, Self)> {
        let (stem, rest) = name.split_once('.')?;
        let id = stem.parse().ok()?;
        Self::ALL
            .into_iter()
            .find(|format| &format.suffix()[1..] == rest)
            .map(|format| (id, format))
    }
}

/// Metadata file name for `id`.
#[must_use]
pub fn meta_file_name(id: GmailId) -> String {
    format!("{id}.meta")
}

/// Extracts the id of a metadata file name.
#[must_use]
pub fn parse_meta_file_name(name: &str) -> Option<GmailId> {
    name.strip_suffix(".meta")?.parse().ok()
}

/// Directory of a record inside its area.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Dir {
    /// Year-month of the internal date.
    pub shard: Shard,
    /// Chat bucket number.
    pub bucket: Option<u32>,
}

impl Dir {
    /// A plain shard directory.
    #[must_use]
    pub const fn shard(shard: Shard) -> Self {
        Self { shard, bucket: None }
    }

    /// Directory name: `YYYY-MM` or `YYYY-MM-n`.
    #[must_use]
    pub fn name(&self) -> String {
        match self.bucket {
            Some(n) => format!("{}-{n}", self.shard),
            None => self.shard.to_string(),
        }
    }

    /// Parses a directory name as it appears in `area`.
    #[must_use]
    pub fn parse(area: Area, name: &str) -> Option<Self> {
        match area {
            Area::Db => Shard::parse(name).ok().map(Self::shard),
            Area::Chats => {
                let (shard, bucket) = (name.get(..7)?, name.get(7..)?);
                let bucket = bucket.strip_prefix('-')?.parse().ok()?;
                Some(Self {
                    shard: Shard::parse(shard).ok()?,
                    bucket: Some(bucket),
                })
            }
        }
    }
}

/// Path arithmetic for one archive root.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    /// Creates a layout rooted at `root`.
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Archive root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Area directory.
    #[must_use]
    pub fn area(&self, area: Area) -> PathBuf {
        self.root.join(area.dir_name())
    }

    /// Directory of a record.
    #[must_use]
    pub fn dir(&self, area: Area, dir: &Dir) -> PathBuf {
        self.area(area).join(dir.name())
    }

    /// Quarantine area.
    #[must_use]
    pub fn quarantine(&self) -> PathBuf {
        self.root.join("quarantine")
    }

    /// Retention area for a record directory.
    #[must_use]
    pub fn bin(&self, dir: &Dir) -> PathBuf {
        self.root.join("bin").join(dir.name())
    }

    /// Info area.
    #[must_use]
    pub fn info(&self) -> PathBuf {
        self.root.join(".info")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn suffixes() {
        let gz = BodyFormat {
            compressed: true,
            encrypted: false,
        };
        assert_eq!(gz.file_name(100), "100.eml.gz");
        assert_eq!(BodyFormat::default().file_name(1), "1.eml");
        assert_eq!(BodyFormat::ALL[3].file_name(1), "1.eml.gz.crypt");
    }

    #[test]
    fn parse_body_names() {
        assert_eq!(
            BodyFormat::parse_file_name("17.eml.gz.crypt"),
            Some((17, BodyFormat::ALL[3]))
        );
        assert_eq!(
            BodyFormat::parse_file_name("17.eml.crypt"),
            Some((17, BodyFormat::ALL[2]))
        );
        assert_eq!(BodyFormat::parse_file_name("17.meta"), None);
        assert_eq!(BodyFormat::parse_file_name("17.eml.tmp"), None);
        assert_eq!(BodyFormat::parse_file_name("x.eml"), None);
    }

    #[test]
    fn parse_meta_names() {
        assert_eq!(parse_meta_file_name("1234.meta"), Some(1234));
        assert_eq!(parse_meta_file_name("1234.meta.tmp"), None);
        assert_eq!(parse_meta_file_name("1234.eml"), None);
    }

    #[test]
    fn dir_names() {
        let db = Dir::parse(Area::Db, "2021-01").unwrap();
        assert_eq!(db.name(), "2021-01");
        assert!(Dir::parse(Area::Db, "2021-01-1").is_none());

        let chat = Dir::parse(Area::Chats, "2021-01-3").unwrap();
        assert_eq!(chat.bucket, Some(3));
        assert_eq!(chat.name(), "2021-01-3");
        assert!(Dir::parse(Area::Chats, "2021-01").is_none());
        assert!(Dir::parse(Area::Chats, "2021-01-x").is_none());
    }

    #[test]
    fn paths() {
        let layout = Layout::new(PathBuf::from("/archive"));
        let dir = Dir::parse(Area::Db, "2021-02").unwrap();
        assert_eq!(layout.dir(Area::Db, &dir), PathBuf::from("/archive/db/2021-02"));
        assert_eq!(layout.bin(&dir), PathBuf::from("/archive/bin/2021-02"));
        assert_eq!(layout.info(), PathBuf::from("/archive/.info"));
    }
}
