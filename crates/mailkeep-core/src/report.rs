//! Per-run error report.

use serde::{Deserialize, Serialize};

/// Which identifier a [`ReportEntry`] carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdKind {
    /// `X-GM-MSGID`.
    #[default]
    Gmail,
    /// UID in the selected folder, used before the gmail id is known.
    Uid,
}

/// One message that could not be handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// The message identifier, interpreted per `kind`.
    pub id: u64,
    /// Which identifier `id` is.
    #[serde(default)]
    pub kind: IdKind,
    /// What went wrong.
    pub reason: String,
}

/// Problems collected during a run.
///
/// Per-message failures land here instead of aborting the run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// The server answered with no data.
    pub empty: Vec<ReportEntry>,
    /// The server failed to return the message.
    pub unfetchable: Vec<ReportEntry>,
    /// Records moved to the quarantine area.
    pub quarantined: Vec<ReportEntry>,
    /// Records that could not be pushed to the server.
    pub unpushable: Vec<ReportEntry>,
    /// Sessions re-established after a failure.
    pub reconnections: u32,
}

impl ErrorReport {
    /// Records an empty answer.
    pub fn empty(&mut self, id: u64, reason: impl Into<String>) {
        self.empty.push(entry(id, IdKind::Gmail, reason));
    }

    /// Records an empty answer for a message known only by its UID.
    pub fn empty_uid(&mut self, uid: u32, reason: impl Into<String>) {
        self.empty.push(entry(u64::from(uid), IdKind::Uid, reason));
    }

    /// Records an irretrievable message.
    pub fn unfetchable(&mut self, id: u64, reason: impl Into<String>) {
        self.unfetchable.push(entry(id, IdKind::Gmail, reason));
    }

    /// Records an irretrievable message known only by its UID.
    pub fn unfetchable_uid(&mut self, uid: u32, reason: impl Into<String>) {
        self.unfetchable.push(entry(u64::from(uid), IdKind::Uid, reason));
    }

    /// Records a quarantined record.
    pub fn quarantined(&mut self, id: u64, reason: impl Into<String>) {
        self.quarantined.push(entry(id, IdKind::Gmail, reason));
    }

    /// Records a failed push.
    pub fn unpushable(&mut self, id: u64, reason: impl Into<String>) {
        self.unpushable.push(entry(id, IdKind::Gmail, reason));
    }

    /// Returns true if no message failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.empty.is_empty()
            && self.unfetchable.is_empty()
            && self.quarantined.is_empty()
            && self.unpushable.is_empty()
    }

    /// One-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} empty, {} unfetchable, {} quarantined, {} unpushable, {} reconnections",
            self.empty.len(),
            self.unfetchable.len(),
            self.quarantined.len(),
            self.unpushable.len(),
            self.reconnections
        )
    }
}

fn entry(id: u64, kind: IdKind, reason: impl Into<String>) -> ReportEntry {
    ReportEntry {
        id,
        kind,
        reason: reason.into(),
    }
}
