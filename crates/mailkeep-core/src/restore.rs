//! Local to remote restore.
//!
//! Records are pushed in ascending gmail id order, which is also the order
//! the checkpoint is resumed in.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::archive::{Archive, Area};
use crate::config::Settings;
use crate::interrupt::StopSignal;
use crate::message::{GmailId, MessageRecord, Shard, is_session_flag};
use crate::remote::labels::{hierarchy, is_reserved};
use crate::remote::{Folder, Reconnect, RemoteStore, Uid};
use crate::report::ErrorReport;
use crate::{Error, Result};

/// Parameters of one restore run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreRequest {
    /// Oldest shard to restore.
    pub pivot: Option<Shard>,
    /// Labels added to every restored message.
    pub extra_labels: Vec<String>,
    /// Continue after the last checkpoint instead of starting over.
    pub resume: bool,
    /// Also restore the chats area.
    pub include_chats: bool,
}

/// What a restore run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreOutcome {
    /// Records appended and labelled.
    pub restored: usize,
    /// Records at or before the checkpoint.
    pub skipped: usize,
    /// Per-record problems.
    pub report: ErrorReport,
    /// The run was stopped before finishing.
    pub interrupted: bool,
}

/// Pushes an archive into a remote mailbox.
pub struct RestoreEngine<'a, R: RemoteStore> {
    remote: &'a mut R,
    archive: &'a mut Archive,
    checkpoint_interval: usize,
    stop: StopSignal,
    /// Labels created or found during this run.
    seen_labels: HashSet<String>,
}

impl<'a, R: RemoteStore> RestoreEngine<'a, R> {
    /// Creates an engine over an open archive.
    pub fn new(remote: &'a mut R, archive: &'a mut Archive, settings: &Settings) -> Self {
        Self {
            remote,
            archive,
            checkpoint_interval: settings.checkpoint_interval.max(1),
            stop: StopSignal::new(),
            seen_labels: HashSet::new(),
        }
    }

    /// Uses `stop` to end the run early.
    #[must_use]
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Runs one restore.
    ///
    /// # Errors
    ///
    /// Anything that is not a per-record problem aborts the run, after the
    /// last processed id has been written as the checkpoint.
    pub async fn run(&mut self, request: &RestoreRequest) -> Result<RestoreOutcome> {
        let reconnections = self.remote.reconnections();
        let mut outcome = RestoreOutcome::default();

        self.remote.select_folder(Folder::AllMail).await?;
        self.restore_area(Area::Db, request, &mut outcome).await?;
        if request.include_chats && !outcome.interrupted {
            self.restore_area(Area::Chats, request, &mut outcome).await?;
        }

        outcome.report.reconnections = self.remote.reconnections().saturating_sub(reconnections);
        info!(
            restored = outcome.restored,
            skipped = outcome.skipped,
            interrupted = outcome.interrupted,
            report = %outcome.report.summary(),
            "restore finished"
        );
        Ok(outcome)
    }

    async fn restore_area(
        &mut self,
        area: Area,
        request: &RestoreRequest,
        outcome: &mut RestoreOutcome,
    ) -> Result<()> {
        let checkpoint = if request.resume {
            self.archive.load_checkpoint(area).await?
        } else {
            self.archive.clear_checkpoint(area).await?;
            None
        };
        if let Some(last) = checkpoint {
            info!(%area, last_id = last, "resuming after checkpoint");
        }

        let ids = match area {
            Area::Db => self.archive.enumerate_ids(request.pivot.as_ref()),
            Area::Chats => self.archive.enumerate_chat_ids(request.pivot.as_ref()),
        };
        info!(%area, records = ids.len(), "restoring");

        let mut last_done = None;
        let mut pending = 0;
        for id in ids.into_keys() {
            if checkpoint.is_some_and(|last| id <= last) {
                outcome.skipped += 1;
                continue;
            }
            if self.stop.is_stopped() {
                outcome.interrupted = true;
                break;
            }

            match self.restore_record(area, id, request, outcome).await {
                Ok(()) => {
                    last_done = Some(id);
                    pending += 1;
                    if pending >= self.checkpoint_interval {
                        self.archive.save_checkpoint(area, id).await?;
                        pending = 0;
                    }
                }
                Err(err) => {
                    if let Some(last) = last_done {
                        self.archive.save_checkpoint(area, last).await?;
                    }
                    return Err(err);
                }
            }
        }

        if let Some(last) = last_done {
            self.archive.save_checkpoint(area, last).await?;
            debug!(%area, last_id = last, "checkpoint saved");
        }
        Ok(())
    }

    /// Pushes one record. Problems confined to the record are reported and
    /// swallowed; everything else is returned.
    async fn restore_record(
        &mut self,
        area: Area,
        id: GmailId,
        request: &RestoreRequest,
        outcome: &mut RestoreOutcome,
    ) -> Result<()> {
        let record = match self.archive.retrieve(area, id).await {
            Ok(record) => record,
            Err(err) if err.is_corrupt_record() => {
                warn!(%area, gmail_id = id, error = %err, "unreadable record");
                self.archive.quarantine(area, id).await?;
                outcome.report.quarantined(id, err.to_string());
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        let mut labels = record.metadata.labels.clone();
        for extra in &request.extra_labels {
            if !labels.contains(extra) {
                labels.push(extra.clone());
            }
        }
        self.ensure_labels(&labels).await?;

        let mut appended = None;
        let err = match self.push(&record, &labels, &mut appended).await {
            Ok(()) => {
                outcome.restored += 1;
                return Ok(());
            }
            Err(err) if err.is_transient() => {
                warn!(
                    gmail_id = id,
                    appended = appended.is_some(),
                    error = %err,
                    "push failed, reconnecting for one more try"
                );
                if let Err(reconnect_err) = self.remote.reconnect().await {
                    if reconnect_err.is_auth() {
                        return Err(reconnect_err);
                    }
                    warn!(error = %reconnect_err, "reconnect failed");
                }
                match self.push(&record, &labels, &mut appended).await {
                    Ok(()) => {
                        outcome.restored += 1;
                        return Ok(());
                    }
                    Err(err) if err.is_transient() => {
                        warn!(gmail_id = id, error = %err, "giving up on message");
                        outcome.report.unpushable(id, err.to_string());
                        return Ok(());
                    }
                    Err(err) => err,
                }
            }
            Err(err) => err,
        };

        match err {
            Error::PushRejected(reason) => {
                warn!(%area, gmail_id = id, %reason, "server rejected message, quarantining");
                self.archive.quarantine(area, id).await?;
                outcome.report.quarantined(id, reason);
                Ok(())
            }
            Error::MissingAppendUid => {
                warn!(gmail_id = id, "appended without a UID, labels not applied");
                outcome.report.unpushable(id, Error::MissingAppendUid.to_string());
                Ok(())
            }
            err => Err(err),
        }
    }

    /// Appends the message unless `appended` already holds its UID, then
    /// stores its labels.
    async fn push(
        &mut self,
        record: &MessageRecord,
        labels: &[String],
        appended: &mut Option<Uid>,
    ) -> Result<()> {
        let uid = match *appended {
            Some(uid) => uid,
            None => {
                let flags: Vec<String> = record
                    .metadata
                    .flags
                    .iter()
                    .filter(|flag| !is_session_flag(flag))
                    .cloned()
                    .collect();
                let uid = self
                    .remote
                    .append(
                        Folder::AllMail,
                        &record.body,
                        &flags,
                        record.metadata.internal_date,
                    )
                    .await?;
                *appended = Some(uid);
                uid
            }
        };
        self.remote.set_labels(uid, labels).await?;
        debug!(gmail_id = record.gmail_id(), %uid, "restored");
        Ok(())
    }

    /// Creates every hierarchy prefix of `labels` not seen yet this run.
    async fn ensure_labels(&mut self, labels: &[String]) -> Result<()> {
        for label in labels {
            for prefix in hierarchy(label) {
                if is_reserved(&prefix) || self.seen_labels.contains(&prefix) {
                    continue;
                }
                self.remote.create_label(&prefix).await?;
                self.seen_labels.insert(prefix);
            }
        }
        Ok(())
    }
}
