//! In-memory map from gmail id to record location.
//!
//! Built from one directory walk at open and kept current by every write,
//! so lookups never touch the filesystem.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use tracing::{debug, warn};

use super::files::list_dir;
use super::layout::{Area, BodyFormat, Dir, parse_meta_file_name};
use crate::message::{GmailId, Shard};
use crate::Result;

/// Where a record lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Directory inside the area.
    pub dir: Dir,
    /// Format of the body file, if one exists.
    pub body: Option<BodyFormat>,
}

/// Location index of one area.
#[derive(Debug, Default)]
pub struct Index {
    entries: BTreeMap<GmailId, Location>,
    dir_counts: HashMap<Dir, usize>,
}

impl Index {
    /// Walks an area directory.
    ///
    /// Only records with a `.meta` file are indexed: the metadata is the
    /// commit marker of a record.
    pub async fn scan(area_dir: &Path, area: Area) -> Result<Self> {
        let mut index = Self::default();

        for (name, is_dir) in list_dir(area_dir).await? {
            if !is_dir {
                continue;
            }
            let Some(dir) = Dir::parse(area, &name) else {
                debug!(%area, dir = %name, "skipping foreign directory");
                continue;
            };

            let mut metas = Vec::new();
            let mut bodies = HashMap::new();
            for (file, _) in list_dir(&area_dir.join(&name)).await? {
                if let Some(id) = parse_meta_file_name(&file) {
                    metas.push(id);
                } else if let Some((id, format)) = BodyFormat::parse_file_name(&file) {
                    bodies.insert(id, format);
                }
            }

            for id in metas {
                let location = Location {
                    dir: dir.clone(),
                    body: bodies.remove(&id),
                };
                if location.body.is_none() {
                    warn!(%area, gmail_id = id, dir = %name, "metadata without body");
                }
                if let Some(previous) = index.insert(id, location) {
                    warn!(%area, gmail_id = id, dir = %previous.dir.name(), "record stored twice");
                }
            }
        }

        debug!(%area, records = index.len(), "index built");
        Ok(index)
    }

    /// Looks up a record.
    pub fn get(&self, id: GmailId) -> Option<&Location> {
        self.entries.get(&id)
    }

    /// Adds or moves a record. Returns the previous location.
    pub fn insert(&mut self, id: GmailId, location: Location) -> Option<Location> {
        *self.dir_counts.entry(location.dir.clone()).or_default() += 1;
        let previous = self.entries.insert(id, location);
        if let Some(previous) = &previous {
            self.decrement(&previous.dir);
        }
        previous
    }

    /// Forgets a record.
    pub fn remove(&mut self, id: GmailId) -> Option<Location> {
        let previous = self.entries.remove(&id);
        if let Some(previous) = &previous {
            self.decrement(&previous.dir);
        }
        previous
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Ids with their shard, ascending, optionally from `pivot` on.
    pub fn ids(&self, pivot: Option<&Shard>) -> BTreeMap<GmailId, Shard> {
        self.entries
            .iter()
            .filter(|(_, location)| pivot.is_none_or(|pivot| location.dir.shard >= *pivot))
            .map(|(id, location)| (*id, location.dir.shard.clone()))
            .collect()
    }

    /// The chat bucket a new record of `shard` goes into.
    ///
    /// Reuses the highest bucket until it holds `capacity` records.
    pub fn open_bucket(&self, shard: &Shard, capacity: usize) -> Dir {
        let highest = self
            .dir_counts
            .iter()
            .filter(|(dir, _)| dir.shard == *shard)
            .filter_map(|(dir, count)| dir.bucket.map(|bucket| (bucket, *count)))
            .max_by_key(|(bucket, _)| *bucket);

        let bucket = match highest {
            Some((bucket, count)) if count >= capacity => bucket + 1,
            Some((bucket, _)) => bucket,
            None => 1,
        };
        Dir {
            shard: shard.clone(),
            bucket: Some(bucket),
        }
    }

    fn decrement(&mut self, dir: &Dir) {
        if let Some(count) = self.dir_counts.get_mut(dir) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.dir_counts.remove(dir);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn shard(s: &str) -> Shard {
        Shard::parse(s).unwrap()
    }

    fn at(s: &str) -> Location {
        Location {
            dir: Dir::shard(shard(s)),
            body: Some(BodyFormat::default()),
        }
    }

    #[tokio::test]
    async fn scan_indexes_committed_records() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("db");
        std::fs::create_dir_all(db.join("2021-01")).unwrap();
        std::fs::create_dir_all(db.join("2021-02")).unwrap();
        std::fs::create_dir_all(db.join("junk")).unwrap();
        std::fs::write(db.join("2021-01/100.meta"), "{}").unwrap();
        std::fs::write(db.join("2021-01/100.eml.gz"), "x").unwrap();
        std::fs::write(db.join("2021-02/200.meta"), "{}").unwrap();
        std::fs::write(db.join("2021-02/200.eml"), "x").unwrap();
        // Body without metadata: an interrupted write.
        std::fs::write(db.join("2021-02/300.eml"), "x").unwrap();
        std::fs::write(db.join("2021-02/400.meta.tmp"), "x").unwrap();
        std::fs::write(db.join("junk/500.meta"), "{}").unwrap();

        let index = Index::scan(&db, Area::Db).await.unwrap();
        assert_eq!(index.len(), 2);
        assert!(index.get(100).unwrap().body.unwrap().compressed);
        assert_eq!(index.get(200).unwrap().dir.shard, shard("2021-02"));
        assert!(index.get(300).is_none());
        assert!(index.get(500).is_none());
    }

    #[tokio::test]
    async fn scan_of_missing_area_is_empty() {
        let dir = TempDir::new().unwrap();
        let index = Index::scan(&dir.path().join("chats"), Area::Chats).await.unwrap();
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn pivot_bounds_enumeration() {
        let mut index = Index::default();
        index.insert(300, at("2021-03"));
        index.insert(100, at("2021-01"));
        index.insert(200, at("2021-02"));

        let all: Vec<_> = index.ids(None).into_keys().collect();
        assert_eq!(all, vec![100, 200, 300]);

        let recent: Vec<_> = index.ids(Some(&shard("2021-02"))).into_keys().collect();
        assert_eq!(recent, vec![200, 300]);
    }

    #[test]
    fn buckets_fill_then_roll_over() {
        let mut index = Index::default();
        let jan = shard("2021-01");

        let first = index.open_bucket(&jan, 2);
        assert_eq!(first.name(), "2021-01-1");
        index.insert(1, Location { dir: first.clone(), body: None });
        assert_eq!(index.open_bucket(&jan, 2), first);
        index.insert(2, Location { dir: first.clone(), body: None });

        let second = index.open_bucket(&jan, 2);
        assert_eq!(second.name(), "2021-01-2");
        assert_eq!(index.open_bucket(&shard("2021-02"), 2).name(), "2021-02-1");

        index.remove(2);
        assert_eq!(index.open_bucket(&jan, 2), first);
    }

    #[test]
    fn moving_a_record_updates_counts() {
        let mut index = Index::default();
        index.insert(1, at("2021-01"));
        let previous = index.insert(1, at("2021-02")).unwrap();
        assert_eq!(previous.dir.shard, shard("2021-01"));
        assert_eq!(index.len(), 1);
        assert!(!index.dir_counts.contains_key(&Dir::shard(shard("2021-01"))));
    }
}
