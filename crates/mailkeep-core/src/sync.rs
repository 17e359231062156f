//! Remote to local synchronization.
//!
//! A run searches the remote folder once, then makes two passes over the
//! result. The create/update pass archives new messages and rewrites
//! metadata whose labels or flags changed. The delete pass removes local
//! records the remote no longer has, and only runs when the search saw the
//! whole mailbox.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::archive::{Archive, Area, StoreSettings};
use crate::config::Settings;
use crate::interrupt::StopSignal;
use crate::message::{GmailId, MessageRecord, Metadata, Shard};
use crate::remote::labels::CHATS_LABEL;
use crate::remote::{FetchFields, FetchedMessage, Folder, RemoteStore, SearchFilter, Uid};
use crate::report::ErrorReport;
use crate::{Error, Result};

/// Parameters of one sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    /// Which remote messages the run sees.
    pub filter: SearchFilter,
    /// Gzip new bodies. Only honored when the archive is created.
    pub compress: bool,
    /// Encrypt new bodies. Only honored when the archive is created.
    pub encrypt: bool,
    /// Remove local records that are gone remotely.
    pub delete_enabled: bool,
    /// Delete even though the filter is restrictive.
    pub force_delete: bool,
    /// Oldest shard the delete pass looks at.
    pub pivot: Option<Shard>,
    /// Also sync the chats folder.
    pub include_chats: bool,
}

impl Default for SyncRequest {
    fn default() -> Self {
        Self {
            filter: SearchFilter::All,
            compress: false,
            encrypt: false,
            delete_enabled: true,
            force_delete: false,
            pivot: None,
            include_chats: false,
        }
    }
}

impl SyncRequest {
    /// A sync of the last `days` days before `today`.
    ///
    /// The delete pass is limited to shards from the start of the window,
    /// and stays off unless forced.
    #[must_use]
    pub fn quick(today: NaiveDate, days: u32) -> Self {
        let since = today - Duration::days(i64::from(days));
        Self {
            filter: SearchFilter::Since(since),
            pivot: Some(Shard::from_date(since.and_time(NaiveTime::MIN).and_utc())),
            ..Self::default()
        }
    }

    /// Returns true if this run may delete local records.
    ///
    /// A restrictive filter hides messages that still exist remotely, so it
    /// turns deletion off unless `force_delete` is set.
    #[must_use]
    pub const fn deletes(&self) -> bool {
        self.force_delete || (self.delete_enabled && !self.filter.is_restrictive())
    }
}

/// What a sync run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    /// Records archived for the first time.
    pub created: usize,
    /// Records whose metadata was rewritten.
    pub updated: usize,
    /// Records already up to date.
    pub unchanged: usize,
    /// Records removed because the remote no longer has them.
    pub deleted: usize,
    /// Per-message problems.
    pub report: ErrorReport,
    /// The run was stopped before finishing.
    pub interrupted: bool,
}

/// Brings an archive up to date with a remote mailbox.
pub struct SyncEngine<'a, R: RemoteStore> {
    remote: &'a mut R,
    archive: &'a mut Archive,
    batch_size: usize,
    stop: StopSignal,
}

impl<'a, R: RemoteStore> SyncEngine<'a, R> {
    /// Creates an engine over an open archive.
    pub fn new(remote: &'a mut R, archive: &'a mut Archive, settings: &Settings) -> Self {
        Self {
            remote,
            archive,
            batch_size: settings.batch_size.max(1),
            stop: StopSignal::new(),
        }
    }

    /// Uses `stop` to end the run early.
    #[must_use]
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Runs one sync.
    ///
    /// # Errors
    ///
    /// Authentication failures, transient failures that outlived the retry
    /// policy, owner mismatches and local I/O errors abort the run.
    /// Per-message problems end up in the outcome's report instead.
    pub async fn run(&mut self, request: &SyncRequest) -> Result<SyncOutcome> {
        let reconnections = self.remote.reconnections();
        self.archive
            .initialize(
                self.remote.email(),
                StoreSettings {
                    compress: request.compress,
                    encrypt: request.encrypt,
                },
            )
            .await?;

        let mut outcome = SyncOutcome::default();

        self.remote.select_folder(Folder::AllMail).await?;
        self.sync_area(Area::Db, request, &mut outcome).await?;

        if request.include_chats && !outcome.interrupted {
            if self.remote.has_chats() {
                self.remote.select_folder(Folder::Chats).await?;
                let result = self.sync_area(Area::Chats, request, &mut outcome).await;
                self.remote.select_folder(Folder::AllMail).await?;
                result?;
            } else {
                warn!("chats requested but the account has no Chats folder");
            }
        }

        outcome.report.reconnections = self.remote.reconnections().saturating_sub(reconnections);
        info!(
            created = outcome.created,
            updated = outcome.updated,
            unchanged = outcome.unchanged,
            deleted = outcome.deleted,
            interrupted = outcome.interrupted,
            report = %outcome.report.summary(),
            "sync finished"
        );
        Ok(outcome)
    }

    async fn sync_area(
        &mut self,
        area: Area,
        request: &SyncRequest,
        outcome: &mut SyncOutcome,
    ) -> Result<()> {
        let uids = self.remote.search(&request.filter).await?;
        info!(%area, found = uids.len(), filter = ?request.filter, "remote search done");

        self.create_update_pass(area, &uids, outcome).await?;

        if outcome.interrupted {
            warn!(%area, "interrupted, skipping delete pass");
        } else if request.deletes() {
            self.delete_pass(area, &uids, request.pivot.as_ref(), outcome)
                .await?;
        } else {
            debug!(%area, "deletion disabled for this run");
        }
        Ok(())
    }

    async fn create_update_pass(
        &mut self,
        area: Area,
        uids: &[Uid],
        outcome: &mut SyncOutcome,
    ) -> Result<()> {
        for batch in uids.chunks(self.batch_size) {
            if self.stop.is_stopped() {
                outcome.interrupted = true;
                return Ok(());
            }

            for message in self.fetch_metadata(batch, &mut outcome.report).await? {
                if self.stop.is_stopped() {
                    outcome.interrupted = true;
                    return Ok(());
                }
                self.reconcile(area, message, outcome).await?;
            }
        }
        Ok(())
    }

    /// Metadata of a batch. A refused batch is retried one UID at a time
    /// so that a single bad message cannot hide its neighbours.
    async fn fetch_metadata(
        &mut self,
        batch: &[Uid],
        report: &mut ErrorReport,
    ) -> Result<Vec<FetchedMessage>> {
        let mut failed = HashSet::new();
        let fetched = match self.remote.fetch(batch, FetchFields::Metadata).await {
            Ok(fetched) => fetched,
            Err(err) if err.is_auth() || err.is_transient() => return Err(err),
            Err(err) => {
                warn!(size = batch.len(), error = %err, "batch fetch refused, fetching one by one");
                let mut fetched = Vec::with_capacity(batch.len());
                for &uid in batch {
                    match self.remote.fetch(&[uid], FetchFields::Metadata).await {
                        Ok(one) => fetched.extend(one),
                        Err(err) if err.is_auth() || err.is_transient() => return Err(err),
                        Err(err) => {
                            warn!(%uid, error = %err, "message metadata is irretrievable");
                            report.unfetchable_uid(uid.get(), err.to_string());
                            failed.insert(uid);
                        }
                    }
                }
                fetched
            }
        };

        let returned: HashSet<Uid> = fetched.iter().map(|message| message.uid).collect();
        for uid in batch {
            if !returned.contains(uid) && !failed.contains(uid) {
                warn!(%uid, "server returned no data");
                report.empty_uid(uid.get(), "no data returned for metadata fetch");
            }
        }
        Ok(fetched)
    }

    async fn reconcile(
        &mut self,
        area: Area,
        message: FetchedMessage,
        outcome: &mut SyncOutcome,
    ) -> Result<()> {
        let mut fresh = message.metadata();
        if area == Area::Chats {
            fresh.add_label(CHATS_LABEL);
        }
        let id = fresh.gmail_id;

        if self.archive.is_complete(area, id) {
            match self.archive.retrieve_metadata_only(area, id).await {
                Ok(local) if local.needs_update(&fresh) => {
                    self.archive.update_metadata(area, &fresh).await?;
                    debug!(%area, gmail_id = id, "metadata updated");
                    outcome.updated += 1;
                    return Ok(());
                }
                Ok(_) => {
                    outcome.unchanged += 1;
                    return Ok(());
                }
                Err(err @ Error::MalformedMetadata { .. }) => {
                    warn!(%area, gmail_id = id, error = %err, "quarantining local record");
                    self.archive.quarantine(area, id).await?;
                    outcome.report.quarantined(id, err.to_string());
                }
                Err(err) => return Err(err),
            }
        }

        self.archive_new(area, message.uid, fresh, outcome).await
    }

    async fn archive_new(
        &mut self,
        area: Area,
        uid: Uid,
        metadata: Metadata,
        outcome: &mut SyncOutcome,
    ) -> Result<()> {
        let id = metadata.gmail_id;
        let fetched = match self.remote.fetch(&[uid], FetchFields::Full).await {
            Ok(fetched) => fetched,
            Err(err) if err.is_auth() || err.is_transient() => return Err(err),
            Err(err) => {
                warn!(gmail_id = id, %uid, error = %err, "body fetch failed");
                outcome.report.unfetchable(id, err.to_string());
                return Ok(());
            }
        };

        let body = fetched
            .into_iter()
            .find(|message| message.uid == uid)
            .and_then(|message| message.body)
            .filter(|body| !body.is_empty());
        let Some(body) = body else {
            warn!(gmail_id = id, %uid, "server returned an empty body");
            outcome.report.empty(id, "no body returned");
            return Ok(());
        };

        let record = MessageRecord { metadata, body };
        match area {
            Area::Db => self.archive.store(&record).await?,
            Area::Chats => self.archive.store_chat(&record).await?,
        };
        debug!(%area, gmail_id = id, shard = %record.metadata.shard(), "archived");
        outcome.created += 1;
        Ok(())
    }

    async fn delete_pass(
        &mut self,
        area: Area,
        uids: &[Uid],
        pivot: Option<&Shard>,
        outcome: &mut SyncOutcome,
    ) -> Result<()> {
        let mut remote_ids: HashSet<GmailId> = HashSet::with_capacity(uids.len());
        for batch in uids.chunks(self.batch_size) {
            match self.remote.fetch(batch, FetchFields::GmailId).await {
                Ok(fetched) => remote_ids.extend(fetched.iter().map(|message| message.gmail_id)),
                Err(err) if err.is_auth() => return Err(err),
                Err(err) => {
                    warn!(%area, error = %err, "remote view incomplete, skipping delete pass");
                    return Ok(());
                }
            }
        }

        let local = match area {
            Area::Db => self.archive.enumerate_ids(pivot),
            Area::Chats => self.archive.enumerate_chat_ids(pivot),
        };
        let stale: Vec<GmailId> = local
            .into_keys()
            .filter(|id| !remote_ids.contains(id))
            .collect();
        if stale.is_empty() {
            debug!(%area, "nothing to delete");
            return Ok(());
        }

        info!(%area, count = stale.len(), "deleting records gone from the mailbox");
        for id in stale {
            self.archive.delete(area, id).await?;
            outcome.deleted += 1;
        }
        Ok(())
    }
}
